//! Vertex deduplication index

use hashbrown::HashMap;

use super::types::{CornerAttributeKey, OutputVertex, ResolvedCorner};

/// Assigns dense output indices to unique (source vertex, attribute key)
/// pairs in first-encountered order.
#[derive(Debug, Default)]
pub struct VertexIndex {
    /// One map per source vertex, grown on demand
    maps: Vec<HashMap<CornerAttributeKey, u32>>,
    vertices: Vec<OutputVertex>,
}

impl VertexIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for a known source vertex count
    pub fn with_source_vertices(count: usize) -> Self {
        Self {
            maps: vec![HashMap::new(); count],
            vertices: Vec::with_capacity(count),
        }
    }

    /// Output index for a resolved corner, appending a new vertex the first
    /// time its (source vertex, key) pair is seen.
    pub fn resolve(&mut self, corner: ResolvedCorner) -> u32 {
        let slot = corner.vertex as usize;
        if slot >= self.maps.len() {
            self.maps.resize_with(slot + 1, HashMap::new);
        }

        let next = self.vertices.len() as u32;
        let index = *self.maps[slot].entry(corner.key()).or_insert(next);
        if index == next {
            self.vertices.push(corner);
        }
        index
    }

    /// Number of unique vertices so far
    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn into_vertices(self) -> Vec<OutputVertex> {
        self.vertices
    }
}
