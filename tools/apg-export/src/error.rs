//! Export error kinds
//!
//! Every variant except [`ExportError::Io`] is raised before the destination
//! file is created, so a failed validation never leaves output behind.

use thiserror::Error;

/// Errors raised by the export pipeline
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no mesh object found in scene")]
    NoMeshFound,

    #[error("no armature object found in scene")]
    NoArmatureFound,

    #[error("UVs or tangents requested but mesh '{mesh}' has no active UV layer")]
    MissingUvLayer { mesh: String },

    #[error("vertex colors requested but mesh '{mesh}' has no active color layer")]
    MissingColorLayer { mesh: String },

    #[error("tangents requested but mesh '{mesh}' has no tangent data")]
    MissingTangents { mesh: String },

    #[error("face {face} is smooth-shaded but vertex {vertex} has no normal")]
    MissingVertexNormal { face: usize, vertex: u32 },

    #[error("face {face} has {corners} corners (only triangles and quads are supported)")]
    MalformedFace { face: usize, corners: usize },

    #[error("face {face} references vertex {vertex}, but the mesh has {vertex_count} vertices")]
    VertexOutOfRange {
        face: usize,
        vertex: u32,
        vertex_count: usize,
    },

    #[error("{layer} layer has no entry for face {face} corner {corner}")]
    CornerLayerMismatch {
        layer: &'static str,
        face: usize,
        corner: usize,
    },

    #[error("vertex {vertex} is bound to bone {bone}, but the skeleton has {bone_count} bones")]
    BoneOutOfRange {
        vertex: u32,
        bone: u32,
        bone_count: usize,
    },

    #[error("bone '{bone}' is part of a cyclic parent chain")]
    CyclicHierarchy { bone: String },

    #[error("bone '{bone}' has parent '{parent}', which is not in the armature")]
    UnknownParentBone { bone: String, parent: String },

    #[error("armature has more than one bone named '{bone}'")]
    DuplicateBoneName { bone: String },

    #[error("action '{action}' has invalid frame range [{start}, {end}]")]
    InvalidFrameRange { action: String, start: i32, end: i32 },

    #[error("invalid frame rate {0} (must be positive and finite)")]
    InvalidFrameRate(f32),

    #[error("pose at frame {frame} has {found} bones, expected {expected}")]
    PoseMismatch {
        frame: i32,
        expected: usize,
        found: usize,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
