//! File-backed host scenes (glTF/GLB, OBJ)

mod gltf;
mod obj;

use anyhow::{bail, Result};
use std::path::Path;

use crate::host::HostScene;

pub use self::gltf::GltfScene;
pub use self::obj::ObjScene;

/// Input extensions [`load_scene`] understands
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["gltf", "glb", "obj"];

/// Whether `path` has an extension [`load_scene`] can read
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

/// Open a scene file, picking the importer by extension.
///
/// `frame_rate` is the timeline rate for formats that store animation in
/// seconds.
pub fn load_scene(path: &Path, frame_rate: f32) -> Result<Box<dyn HostScene>> {
    match extension(path).as_deref() {
        Some("gltf") | Some("glb") => Ok(Box::new(GltfScene::load_with_frame_rate(
            path, frame_rate,
        )?)),
        Some("obj") => Ok(Box::new(ObjScene::load(path)?)),
        _ => bail!("Unsupported file format: {:?}", path),
    }
}
