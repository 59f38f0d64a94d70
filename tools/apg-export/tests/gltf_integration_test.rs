//! Integration tests for the glTF/GLB import pipeline.
//!
//! Tests the complete flow:
//! 1. Generate a skinned, animated GLB programmatically
//! 2. Load it as a host scene and export it
//! 3. Parse the APG output back and check its contents

mod glb_builder;

use apg_common::{ApgFile, KeyChannel, VertexBlock};
use apg_export::{export_to_file, ExportOptions, GltfScene, HostScene};
use tempfile::tempdir;

fn write_glb(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("quad.glb");
    std::fs::write(&path, glb_builder::generate_skinned_quad_glb()).expect("Failed to write GLB");
    path
}

fn gltf_options() -> ExportOptions {
    // The generated file has no TANGENT attribute
    ExportOptions {
        tangents: false,
        ..ExportOptions::default()
    }
}

#[test]
fn test_generated_glb_is_valid() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = write_glb(dir.path());

    let (document, _buffers, _) = gltf::import(&path).expect("Failed to import GLB");
    assert_eq!(document.meshes().count(), 1);
    assert_eq!(document.skins().count(), 1);
    assert_eq!(document.animations().count(), 1);
}

#[test]
fn test_gltf_scene_contents() {
    let dir = tempdir().expect("Failed to create temp dir");
    let mut scene = GltfScene::load(&write_glb(dir.path())).expect("Failed to load scene");

    let mesh = scene.mesh_copy().expect("scene should have a mesh");
    assert_eq!(mesh.name, "Quad");
    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.faces.len(), 2);
    assert!(mesh.faces.iter().all(|f| f.use_smooth));
    // Dominant influence comes first
    assert_eq!(mesh.vertices[2].weights[0].bone, 1);
    assert!(mesh.uv_layer.is_some());
    assert!(mesh.tangents.is_none());

    let armature = scene.armature().expect("scene should have an armature");
    let names: Vec<&str> = armature.bones.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["Root", "Tip"]);
    assert_eq!(armature.bones[0].parent, None);
    assert_eq!(armature.bones[1].parent.as_deref(), Some("Root"));

    let action = scene.first_action().expect("scene should have an action");
    assert_eq!(action.name, "Wave");
    assert_eq!((action.frame_start, action.frame_end), (0, 24));

    let pose = scene.evaluate_at_frame(12).unwrap();
    assert_eq!(pose.bones[0].translation, glb_builder::ROOT_TRANSLATION);
    assert_eq!(pose.bones[1].translation, [0.0, 1.5, 0.0]);
}

#[test]
fn test_gltf_export_roundtrip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let glb_path = write_glb(dir.path());
    let apg_path = dir.path().join("quad.apg");

    let mut scene = GltfScene::load(&glb_path).expect("Failed to load scene");
    let summary = export_to_file(&mut scene, &gltf_options(), &apg_path).expect("Export failed");
    assert_eq!(summary.triangles, 2);
    assert_eq!(summary.emitted_vertices, 6);
    assert_eq!(summary.unique_vertices, 4);
    assert_eq!(summary.bones, 2);
    assert_eq!(summary.frames, 25);
    assert_eq!(scene.current_frame(), Some(24));

    let text = std::fs::read_to_string(&apg_path).expect("Failed to read output");
    let file = ApgFile::parse(&text).expect("Output should parse");

    assert_eq!(file.vert_count, 6);
    assert!(file.block(VertexBlock::Normal).is_some());
    assert!(file.block(VertexBlock::TexCoord).is_some());
    assert!(file.block(VertexBlock::Tangent).is_none());
    assert_eq!(file.bone_ids(), Some(vec![0, 0, 1, 0, 1, 1]));

    let skeleton = file.skeleton.as_ref().expect("skeleton block");
    assert_eq!(skeleton.bone_count, 2);
    assert_eq!(skeleton.animation_count, 1);
    assert_eq!(skeleton.hierarchy, vec![(-1, 0), (0, 1)]);

    assert_eq!(file.animations.len(), 1);
    let anim = &file.animations[0];
    assert_eq!(anim.name, "Wave");
    assert_eq!(anim.duration, 1.0);
    assert_eq!(anim.tracks.len(), 6);

    let tip = anim
        .tracks_for(KeyChannel::Translation)
        .find(|t| t.node == 1)
        .expect("tip translation track");
    assert_eq!(tip.times.len(), 25);
    assert_eq!(tip.times[12], 0.5);
    assert_eq!(&tip.values[36..39], &[0.0, 1.5, 0.0]);
    assert_eq!(&tip.values[72..75], &[0.0, 2.0, 0.0]);

    let root_rot = anim
        .tracks_for(KeyChannel::Rotation)
        .find(|t| t.node == 0)
        .expect("root rotation track");
    assert_eq!(&root_rot.values[0..4], &[0.0, 0.0, 0.0, 1.0]);

    assert!(text.contains("t 0.500 TRA 0.000 1.500 0.000\n"));
    assert_eq!(file.bounding_radius, Some(1.41));
}

#[test]
fn test_gltf_frame_rate_override() {
    let dir = tempdir().expect("Failed to create temp dir");
    let scene = GltfScene::load_with_frame_rate(&write_glb(dir.path()), 10.0)
        .expect("Failed to load scene");
    assert_eq!(scene.frame_rate(), Some(10.0));
    assert_eq!(scene.first_action().map(|a| a.frame_end), Some(10));
}

#[test]
fn test_gltf_tangents_requested() {
    let dir = tempdir().expect("Failed to create temp dir");
    let glb_path = write_glb(dir.path());
    let apg_path = dir.path().join("quad.apg");

    let mut scene = GltfScene::load(&glb_path).expect("Failed to load scene");
    let err = export_to_file(&mut scene, &ExportOptions::default(), &apg_path).unwrap_err();
    assert!(matches!(err, apg_export::ExportError::MissingTangents { .. }));
    assert!(!apg_path.exists());
}
