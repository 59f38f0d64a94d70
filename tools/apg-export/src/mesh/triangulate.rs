//! Quad-to-triangle conversion

use smallvec::{smallvec, SmallVec};

use crate::error::{ExportError, Result};

/// Triangles produced by one face (1 or 2)
pub type FaceTriangles<T> = SmallVec<[[T; 3]; 2]>;

/// Split a face into triangles.
///
/// Triangles pass through unchanged. A quad `[a, b, c, d]` always splits on
/// the `b-d` diagonal into `[a, b, d]` and `[b, c, d]`. Any other corner
/// count is rejected.
///
/// Works on whatever the caller keys corners by (corner slots, vertex
/// indices), so winding and corner association are preserved as-is.
pub fn triangulate<T: Copy>(face: usize, corners: &[T]) -> Result<FaceTriangles<T>> {
    match *corners {
        [a, b, c] => Ok(smallvec![[a, b, c]]),
        [a, b, c, d] => Ok(smallvec![[a, b, d], [b, c, d]]),
        _ => Err(ExportError::MalformedFace {
            face,
            corners: corners.len(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_passthrough() {
        let tris = triangulate(0, &[7u32, 8, 9]).unwrap();
        assert_eq!(tris.as_slice(), &[[7, 8, 9]]);
    }

    #[test]
    fn test_quad_fixed_diagonal() {
        let tris = triangulate(0, &[0usize, 1, 2, 3]).unwrap();
        assert_eq!(tris.as_slice(), &[[0, 1, 3], [1, 2, 3]]);
    }

    #[test]
    fn test_reject_other_sizes() {
        for n in [0usize, 1, 2, 5, 8] {
            let corners: Vec<usize> = (0..n).collect();
            match triangulate(4, &corners) {
                Err(ExportError::MalformedFace { face, corners }) => {
                    assert_eq!(face, 4);
                    assert_eq!(corners, n);
                }
                other => panic!("expected MalformedFace for {n} corners, got {other:?}"),
            }
        }
    }
}
