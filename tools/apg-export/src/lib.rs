//! apg-export library
//!
//! Converts polygon meshes, skeletons and animations from a host scene into
//! the APG text interchange format.

pub mod animation;
pub mod error;
pub mod export;
pub mod formats;
pub mod host;
pub mod import;
pub mod manifest;
pub mod mesh;
pub mod options;
pub mod skeleton;

pub use animation::{sample_action, BoneTrack, Keyframe, SampledAnimation};
pub use error::{ExportError, Result};
pub use export::{export_document, export_to_file, export_to_writer, ExportSummary};
pub use formats::{write_apg, write_upgraded, ApgDocument};
pub use host::{
    Action, Armature, BonePose, BoneWeight, CornerLayer, HostBone, HostScene, MemoryScene,
    MeshCopy, Pose, SourceFace, SourceVertex,
};
pub use import::{load_scene, GltfScene, ObjScene};
pub use manifest::ApgManifest;
pub use mesh::{build_mesh, triangulate, AttributeResolver, ResolvedMesh, VertexIndex};
pub use options::{ExportOptions, FrameRate, DEFAULT_FRAME_RATE};
pub use skeleton::{linearize, Bone, Skeleton};
