//! Resolved mesh data

/// Identity of a face corner's non-positional attributes
///
/// Compared and hashed over raw `f32` bits, so two corners only share an
/// output vertex when their attributes are bit-for-bit identical. Disabled
/// attributes are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CornerAttributeKey {
    pub normal: Option<[u32; 3]>,
    pub uv: Option<[u32; 2]>,
    pub color: Option<[u32; 3]>,
}

impl CornerAttributeKey {
    pub fn new(normal: Option<[f32; 3]>, uv: Option<[f32; 2]>, color: Option<[f32; 3]>) -> Self {
        Self {
            normal: normal.map(|n| n.map(f32::to_bits)),
            uv: uv.map(|t| t.map(f32::to_bits)),
            color: color.map(|c| c.map(f32::to_bits)),
        }
    }
}

/// Every attribute of one face corner after resolution
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedCorner {
    /// Index of the source vertex
    pub vertex: u32,
    pub position: [f32; 3],
    pub normal: Option<[f32; 3]>,
    pub uv: Option<[f32; 2]>,
    /// xyz + bitangent sign
    pub tangent: Option<[f32; 4]>,
    pub color: Option<[f32; 3]>,
    pub bone: Option<u32>,
}

impl ResolvedCorner {
    pub fn key(&self) -> CornerAttributeKey {
        CornerAttributeKey::new(self.normal, self.uv, self.color)
    }
}

/// A unique output vertex
///
/// One per distinct (source vertex, [`CornerAttributeKey`]) pair, in the
/// order the pairs were first seen.
pub type OutputVertex = ResolvedCorner;

/// Triangulated, deduplicated mesh ready for writing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedMesh {
    pub vertices: Vec<OutputVertex>,
    /// One output index per emitted corner, triangle-list order
    pub indices: Vec<u32>,
    pub triangle_count: usize,
}

impl ResolvedMesh {
    /// Number of vertices the writer emits (`@vert_count`)
    pub fn emitted_count(&self) -> usize {
        self.indices.len()
    }

    /// Emitted corners in stream order
    pub fn corners(&self) -> impl Iterator<Item = &OutputVertex> {
        self.indices.iter().map(|&i| &self.vertices[i as usize])
    }
}
