//! Export pipeline
//!
//! Drives a [`HostScene`] through skeleton linearization, mesh resolution
//! and animation sampling, then streams the result. Everything that can
//! fail on bad input runs before the destination is opened.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::animation::sample_action;
use crate::error::{ExportError, Result};
use crate::formats::{write_apg, ApgDocument};
use crate::host::{HostScene, MeshCopy};
use crate::mesh::build_mesh;
use crate::options::ExportOptions;
use crate::skeleton::{linearize, Skeleton};

/// What an export produced
#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub mesh_name: String,
    pub triangles: usize,
    /// `@vert_count`
    pub emitted_vertices: usize,
    pub unique_vertices: usize,
    pub bones: usize,
    pub animation: Option<String>,
    pub frames: usize,
    pub bounding_radius: f32,
}

impl ExportSummary {
    fn new(mesh_name: String, doc: &ApgDocument, bounding_radius: f32) -> Self {
        Self {
            mesh_name,
            triangles: doc.mesh.triangle_count,
            emitted_vertices: doc.mesh.emitted_count(),
            unique_vertices: doc.mesh.vertices.len(),
            bones: doc.skeleton.as_ref().map_or(0, Skeleton::len),
            animation: doc.animation.as_ref().map(|a| a.name.clone()),
            frames: doc.animation.as_ref().map_or(0, |a| a.frame_count()),
            bounding_radius,
        }
    }
}

/// Mesh copy borrowed from a scene, handed back on drop
struct WorkingCopy<'s, S: HostScene + ?Sized> {
    scene: &'s mut S,
    copy: MeshCopy,
}

impl<'s, S: HostScene + ?Sized> WorkingCopy<'s, S> {
    fn take(scene: &'s mut S) -> Result<Self> {
        let copy = scene.mesh_copy().ok_or(ExportError::NoMeshFound)?;
        Ok(Self { scene, copy })
    }

    fn mesh(&self) -> &MeshCopy {
        &self.copy
    }
}

impl<S: HostScene + ?Sized> Drop for WorkingCopy<'_, S> {
    fn drop(&mut self) {
        let copy = std::mem::take(&mut self.copy);
        self.scene.release_mesh_copy(copy);
    }
}

/// Resolve everything an APG file needs without writing anything.
///
/// Returns the document and the source mesh name.
pub fn export_document<S: HostScene + ?Sized>(
    scene: &mut S,
    options: &ExportOptions,
) -> Result<(ApgDocument, String)> {
    // An armature without bones has nothing for bone ids to point at
    let armature = match scene.armature() {
        Some(armature) if armature.bones.is_empty() => {
            tracing::warn!("Armature '{}' has no bones, ignoring it", armature.name);
            None
        }
        armature => armature,
    };
    if options.require_skeleton && armature.is_none() {
        return Err(ExportError::NoArmatureFound);
    }

    let skeleton = match (options.skeleton, armature) {
        (true, Some(armature)) => Some(linearize(&armature)?),
        (true, None) => {
            tracing::warn!("No armature in scene, exporting static mesh");
            None
        }
        (false, _) => None,
    };

    let (mesh, mesh_name) = {
        let working = WorkingCopy::take(scene)?;
        let mesh = build_mesh(working.mesh(), options, skeleton.as_ref().map(Skeleton::len))?;
        (mesh, working.mesh().name.clone())
    };

    let animation = match &skeleton {
        Some(skeleton) if options.animation => match scene.first_action() {
            Some(action) => {
                let rate = options.frame_rate.resolve(scene.frame_rate())?;
                Some(sample_action(scene, &action, skeleton, rate)?)
            }
            None => {
                tracing::debug!("Armature has no action, skipping animation");
                None
            }
        },
        _ => None,
    };

    Ok((
        ApgDocument::new(mesh, options, skeleton, animation),
        mesh_name,
    ))
}

/// Export the scene to any writer
pub fn export_to_writer<S, W>(scene: &mut S, options: &ExportOptions, w: &mut W) -> Result<ExportSummary>
where
    S: HostScene + ?Sized,
    W: Write,
{
    let (doc, mesh_name) = export_document(scene, options)?;
    let radius = write_apg(w, &doc)?;
    Ok(ExportSummary::new(mesh_name, &doc, radius))
}

/// Export the scene to `path`.
///
/// The file is only created once the whole document has been resolved, so
/// a validation error leaves nothing on disk.
pub fn export_to_file<S: HostScene + ?Sized>(
    scene: &mut S,
    options: &ExportOptions,
    path: &Path,
) -> Result<ExportSummary> {
    let (doc, mesh_name) = export_document(scene, options)?;

    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let radius = write_apg(&mut writer, &doc)?;
    writer.flush()?;

    let summary = ExportSummary::new(mesh_name, &doc, radius);
    tracing::info!(
        "Exported mesh '{}': {} triangles, {} vertices ({} unique), {} bones, radius {:.2}",
        summary.mesh_name,
        summary.triangles,
        summary.emitted_vertices,
        summary.unique_vertices,
        summary.bones,
        summary.bounding_radius
    );
    if let Some(name) = &summary.animation {
        tracing::info!("  animation '{}': {} frames", name, summary.frames);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{Action, Armature, CornerLayer, HostBone, MemoryScene, SourceFace, SourceVertex};

    fn skinned_triangle() -> MemoryScene {
        let mesh = MeshCopy {
            name: "Tri".into(),
            vertices: vec![
                SourceVertex::new([0.0, 0.0, 0.0]).with_weight(0, 1.0),
                SourceVertex::new([1.0, 0.0, 0.0]).with_weight(1, 1.0),
                SourceVertex::new([0.0, 1.0, 0.0]),
            ],
            faces: vec![SourceFace::flat(&[0, 1, 2], [0.0, 0.0, 1.0])],
            uv_layer: Some(CornerLayer::new(
                "UVMap",
                vec![vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]],
            )),
            color_layer: None,
            tangents: Some(vec![[1.0, 0.0, 0.0, 1.0]; 3]),
        };
        MemoryScene::new()
            .with_mesh(mesh)
            .with_armature(Armature {
                name: "Armature".into(),
                bones: vec![HostBone::root("Root"), HostBone::child("Tip", "Root")],
            })
            .with_action(Action {
                name: "Idle".into(),
                frame_start: 0,
                frame_end: 12,
            })
    }

    #[test]
    fn test_full_export() {
        let mut scene = skinned_triangle();
        let mut out = Vec::new();
        let summary = export_to_writer(&mut scene, &ExportOptions::default(), &mut out).unwrap();

        assert_eq!(summary.triangles, 1);
        assert_eq!(summary.emitted_vertices, 3);
        assert_eq!(summary.bones, 2);
        assert_eq!(summary.animation.as_deref(), Some("Idle"));
        assert_eq!(summary.frames, 13);
        assert_eq!(scene.outstanding_copies(), 0);
        assert_eq!(scene.current_frame(), Some(12));

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("@vb_comps 1\n0\n1\n0\n"));
        assert!(text.contains("@animation name Idle duration 0.500\n"));
    }

    #[test]
    fn test_copy_released_on_error() {
        let mut scene = skinned_triangle();
        if let Some(mesh) = scene.mesh.as_mut() {
            mesh.uv_layer = None;
        }
        let err = export_document(&mut scene, &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::MissingUvLayer { .. }));
        assert_eq!(scene.outstanding_copies(), 0);
    }

    #[test]
    fn test_no_mesh() {
        let mut scene = MemoryScene::new();
        let err = export_document(&mut scene, &ExportOptions::static_mesh()).unwrap_err();
        assert!(matches!(err, ExportError::NoMeshFound));
    }

    #[test]
    fn test_missing_armature_degrades() {
        let mut scene = skinned_triangle();
        scene.armature = None;
        let (doc, _) = export_document(&mut scene, &ExportOptions::default()).unwrap();
        assert!(doc.skeleton.is_none());
        assert!(doc.animation.is_none());
        assert!(!doc.blocks.contains(&crate::formats::VertexBlock::BoneId));
        assert_eq!(scene.current_frame(), None);
    }

    #[test]
    fn test_required_armature() {
        let mut scene = skinned_triangle();
        scene.armature = None;
        let options = ExportOptions {
            require_skeleton: true,
            ..ExportOptions::default()
        };
        let err = export_document(&mut scene, &options).unwrap_err();
        assert!(matches!(err, ExportError::NoArmatureFound));
        assert_eq!(scene.outstanding_copies(), 0);
    }

    #[test]
    fn test_empty_armature_is_static() {
        let mut scene = skinned_triangle();
        if let Some(armature) = scene.armature.as_mut() {
            armature.bones.clear();
        }
        if let Some(mesh) = scene.mesh.as_mut() {
            mesh.vertices.iter_mut().for_each(|v| v.weights.clear());
        }
        let mut out = Vec::new();
        let summary = export_to_writer(&mut scene, &ExportOptions::default(), &mut out).unwrap();
        assert_eq!(summary.bones, 0);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("@vb_comps"));
        assert!(!text.contains("@skeleton"));

        let options = ExportOptions {
            require_skeleton: true,
            ..ExportOptions::default()
        };
        let err = export_document(&mut scene, &options).unwrap_err();
        assert!(matches!(err, ExportError::NoArmatureFound));
    }

    #[test]
    fn test_skeleton_without_animation() {
        let mut scene = skinned_triangle();
        let options = ExportOptions {
            animation: false,
            ..ExportOptions::default()
        };
        let mut out = Vec::new();
        export_to_writer(&mut scene, &options, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("@skeleton bones 2 animations 0\n"));
        assert!(!text.contains("@animation"));
        assert_eq!(scene.current_frame(), None);
    }

    #[test]
    fn test_scene_frame_rate() {
        let mut scene = skinned_triangle();
        scene.scene_frame_rate = Some(12.0);
        let options = ExportOptions {
            frame_rate: crate::options::FrameRate::Scene,
            ..ExportOptions::default()
        };
        let (doc, _) = export_document(&mut scene, &options).unwrap();
        let animation = doc.animation.unwrap();
        assert_eq!(animation.frame_rate, 12.0);
        assert_eq!(animation.duration, 1.0);
    }

    #[test]
    fn test_no_file_on_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tri.apg");
        let mut scene = skinned_triangle();
        if let Some(mesh) = scene.mesh.as_mut() {
            mesh.faces.push(SourceFace::flat(&[0, 1], [0.0, 0.0, 1.0]));
        }
        let err = export_to_file(&mut scene, &ExportOptions::default(), &path).unwrap_err();
        assert!(matches!(err, ExportError::MalformedFace { .. }));
        assert!(!path.exists());
    }
}
