//! Per-corner attribute resolution

use glam::{Mat4, Vec3};

use crate::error::{ExportError, Result};
use crate::host::{CornerLayer, MeshCopy, SourceVertex};
use crate::options::ExportOptions;

use super::types::ResolvedCorner;

/// Position/normal/tangent transform, skipped entirely for identity
#[derive(Debug, Clone, Copy)]
struct CornerTransform {
    matrix: Mat4,
    normal_matrix: Mat4,
}

impl CornerTransform {
    fn new(matrix: Mat4) -> Option<Self> {
        if matrix == Mat4::IDENTITY {
            return None;
        }
        // Inverse-transpose keeps normals perpendicular under non-uniform scale
        Some(Self {
            matrix,
            normal_matrix: matrix.inverse().transpose(),
        })
    }

    fn point(&self, p: [f32; 3]) -> [f32; 3] {
        self.matrix.transform_point3(Vec3::from(p)).to_array()
    }

    fn normal(&self, n: [f32; 3]) -> [f32; 3] {
        self.normal_matrix
            .transform_vector3(Vec3::from(n))
            .normalize_or_zero()
            .to_array()
    }

    fn tangent(&self, t: [f32; 4]) -> [f32; 4] {
        let xyz = self
            .matrix
            .transform_vector3(Vec3::new(t[0], t[1], t[2]))
            .normalize_or_zero();
        [xyz.x, xyz.y, xyz.z, t[3]]
    }
}

/// Resolves normal, UV, color, tangent and bone id for a (face, corner) pair.
///
/// Construction validates everything that can be checked up front (missing
/// layers, missing tangent table), so no output exists yet when those fail.
pub struct AttributeResolver<'a> {
    mesh: &'a MeshCopy,
    uv_layer: Option<&'a CornerLayer<[f32; 2]>>,
    color_layer: Option<&'a CornerLayer<[f32; 3]>>,
    tangents: Option<&'a [[f32; 4]]>,
    normals: bool,
    /// Bone count of the exported skeleton, `None` when no skeleton is exported
    bone_count: Option<usize>,
    transform: Option<CornerTransform>,
}

impl<'a> AttributeResolver<'a> {
    pub fn new(
        mesh: &'a MeshCopy,
        options: &ExportOptions,
        bone_count: Option<usize>,
    ) -> Result<Self> {
        if options.needs_uv_layer() && mesh.uv_layer.is_none() {
            return Err(ExportError::MissingUvLayer {
                mesh: mesh.name.clone(),
            });
        }
        if options.colors && mesh.color_layer.is_none() {
            return Err(ExportError::MissingColorLayer {
                mesh: mesh.name.clone(),
            });
        }
        let tangents = if options.tangents {
            let table = mesh.tangents.as_deref().ok_or_else(|| ExportError::MissingTangents {
                mesh: mesh.name.clone(),
            })?;
            Some(table)
        } else {
            None
        };

        Ok(Self {
            mesh,
            uv_layer: if options.uvs { mesh.uv_layer.as_ref() } else { None },
            color_layer: if options.colors { mesh.color_layer.as_ref() } else { None },
            tangents,
            normals: options.normals,
            bone_count,
            transform: CornerTransform::new(options.transform),
        })
    }

    /// Source vertex of a face corner, range-checked
    pub fn source_vertex(&self, face: usize, corner: usize) -> Result<(u32, &'a SourceVertex)> {
        let faces = self.mesh.faces();
        let index = faces
            .get(face)
            .and_then(|f| f.vertices.get(corner))
            .copied()
            .ok_or(ExportError::CornerLayerMismatch {
                layer: "face",
                face,
                corner,
            })?;
        let vertices = self.mesh.vertices();
        let vertex = vertices
            .get(index as usize)
            .ok_or(ExportError::VertexOutOfRange {
                face,
                vertex: index,
                vertex_count: vertices.len(),
            })?;
        Ok((index, vertex))
    }

    pub fn resolve(&self, face: usize, corner: usize) -> Result<ResolvedCorner> {
        let (index, vertex) = self.source_vertex(face, corner)?;
        let source_face = &self.mesh.faces()[face];

        let normal = if self.normals {
            let n = if source_face.use_smooth {
                vertex.normal.ok_or(ExportError::MissingVertexNormal {
                    face,
                    vertex: index,
                })?
            } else {
                source_face.normal
            };
            Some(n)
        } else {
            None
        };

        let uv = self
            .uv_layer
            .map(|layer| lookup(layer, "uv", face, corner))
            .transpose()?;
        let color = self
            .color_layer
            .map(|layer| lookup(layer, "color", face, corner))
            .transpose()?;

        let tangent = self
            .tangents
            .map(|table| {
                table
                    .get(index as usize)
                    .copied()
                    .ok_or(ExportError::CornerLayerMismatch {
                        layer: "tangent",
                        face,
                        corner,
                    })
            })
            .transpose()?;

        let bone = self
            .bone_count
            .map(|bone_count| {
                // Only the first binding is exported; unbound vertices use bone 0
                match vertex.weights.first() {
                    None => Ok(0),
                    Some(w) if (w.bone as usize) < bone_count => Ok(w.bone),
                    Some(w) => Err(ExportError::BoneOutOfRange {
                        vertex: index,
                        bone: w.bone,
                        bone_count,
                    }),
                }
            })
            .transpose()?;

        let corner = match self.transform {
            None => ResolvedCorner {
                vertex: index,
                position: vertex.position,
                normal,
                uv,
                tangent,
                color,
                bone,
            },
            Some(xf) => ResolvedCorner {
                vertex: index,
                position: xf.point(vertex.position),
                normal: normal.map(|n| xf.normal(n)),
                uv,
                tangent: tangent.map(|t| xf.tangent(t)),
                color,
                bone,
            },
        };
        Ok(corner)
    }
}

fn lookup<T: Copy>(
    layer: &CornerLayer<T>,
    name: &'static str,
    face: usize,
    corner: usize,
) -> Result<T> {
    layer.get(face, corner).ok_or(ExportError::CornerLayerMismatch {
        layer: name,
        face,
        corner,
    })
}
