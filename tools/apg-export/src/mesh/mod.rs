//! Mesh resolution: triangulation, attribute resolution and deduplication

mod attributes;
mod dedup;
mod triangulate;
mod types;

use smallvec::SmallVec;
use tracing::debug;

use crate::error::Result;
use crate::host::MeshCopy;
use crate::options::ExportOptions;

pub use attributes::AttributeResolver;
pub use dedup::VertexIndex;
pub use triangulate::{triangulate, FaceTriangles};
pub use types::{CornerAttributeKey, OutputVertex, ResolvedCorner, ResolvedMesh};

/// Triangulate and deduplicate a mesh copy.
///
/// `bone_count` is the size of the exported skeleton; `None` means no bone
/// ids are resolved. Fails before producing anything if a face or layer is
/// malformed.
pub fn build_mesh(
    mesh: &MeshCopy,
    options: &ExportOptions,
    bone_count: Option<usize>,
) -> Result<ResolvedMesh> {
    let resolver = AttributeResolver::new(mesh, options, bone_count)?;
    let mut index = VertexIndex::with_source_vertices(mesh.vertices().len());
    let mut indices = Vec::with_capacity(mesh.faces().len() * 6);
    let mut triangle_count = 0;

    for (face_index, face) in mesh.faces().iter().enumerate() {
        let slots: SmallVec<[usize; 4]> = (0..face.vertices.len()).collect();
        let triangles = triangulate(face_index, &slots)?;

        let corners = slots
            .iter()
            .map(|&slot| resolver.resolve(face_index, slot))
            .collect::<Result<SmallVec<[ResolvedCorner; 4]>>>()?;

        for triangle in &triangles {
            for &slot in triangle {
                indices.push(index.resolve(corners[slot]));
            }
        }
        triangle_count += triangles.len();
    }

    debug!(
        "Resolved mesh '{}': {} faces -> {} triangles, {} unique vertices",
        mesh.name,
        mesh.faces().len(),
        triangle_count,
        index.len()
    );

    Ok(ResolvedMesh {
        vertices: index.into_vertices(),
        indices,
        triangle_count,
    })
}
