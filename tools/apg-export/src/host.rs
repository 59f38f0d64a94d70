//! Host scene access
//!
//! The exporter never touches a host application's object graph directly.
//! Everything it needs goes through [`HostScene`]: a disposable copy of the
//! mesh, a snapshot of the armature, the first action's frame range and a
//! pose evaluated at an explicit frame.

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::error::Result;

/// Vertex indices of one face (3 or 4 for valid input)
pub type Corners = SmallVec<[u32; 4]>;

/// A single skin binding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneWeight {
    /// Bone id (declaration position in the armature)
    pub bone: u32,
    pub weight: f32,
}

/// Host mesh vertex
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceVertex {
    pub position: [f32; 3],
    /// Smooth (per-vertex) normal
    pub normal: Option<[f32; 3]>,
    /// Skin bindings in host order
    pub weights: Vec<BoneWeight>,
}

impl SourceVertex {
    pub fn new(position: [f32; 3]) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_normal(mut self, normal: [f32; 3]) -> Self {
        self.normal = Some(normal);
        self
    }

    pub fn with_weight(mut self, bone: u32, weight: f32) -> Self {
        self.weights.push(BoneWeight { bone, weight });
        self
    }
}

/// Host mesh face
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFace {
    pub vertices: Corners,
    /// Flat face normal
    pub normal: [f32; 3],
    pub use_smooth: bool,
}

impl SourceFace {
    pub fn flat(vertices: &[u32], normal: [f32; 3]) -> Self {
        Self {
            vertices: Corners::from_slice(vertices),
            normal,
            use_smooth: false,
        }
    }

    pub fn smooth(vertices: &[u32], normal: [f32; 3]) -> Self {
        Self {
            use_smooth: true,
            ..Self::flat(vertices, normal)
        }
    }
}

/// Per-face-corner data layer (UVs, colors), indexed `[face][corner]`
#[derive(Debug, Clone, PartialEq)]
pub struct CornerLayer<T> {
    pub name: String,
    pub data: Vec<SmallVec<[T; 4]>>,
}

impl<T: Copy> CornerLayer<T> {
    pub fn new(name: impl Into<String>, data: Vec<Vec<T>>) -> Self {
        Self {
            name: name.into(),
            data: data.into_iter().map(SmallVec::from_vec).collect(),
        }
    }

    pub fn get(&self, face: usize, corner: usize) -> Option<T> {
        self.data.get(face).and_then(|c| c.get(corner)).copied()
    }
}

/// Disposable working copy of a host mesh
///
/// Created by [`HostScene::mesh_copy`] and handed back through
/// [`HostScene::release_mesh_copy`] when the export is done with it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshCopy {
    pub name: String,
    pub vertices: Vec<SourceVertex>,
    pub faces: Vec<SourceFace>,
    /// Active UV layer
    pub uv_layer: Option<CornerLayer<[f32; 2]>>,
    /// Active vertex color layer (RGB)
    pub color_layer: Option<CornerLayer<[f32; 3]>>,
    /// Per-vertex tangent table: xyz + bitangent sign
    pub tangents: Option<Vec<[f32; 4]>>,
}

impl MeshCopy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn vertices(&self) -> &[SourceVertex] {
        &self.vertices
    }

    pub fn faces(&self) -> &[SourceFace] {
        &self.faces
    }
}

/// Host bone as declared in the armature
#[derive(Debug, Clone, PartialEq)]
pub struct HostBone {
    pub name: String,
    /// Parent bone name, `None` for roots
    pub parent: Option<String>,
}

impl HostBone {
    pub fn root(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
        }
    }

    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
        }
    }
}

/// Snapshot of a host armature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Armature {
    pub name: String,
    pub bones: Vec<HostBone>,
}

impl Armature {
    pub fn bones(&self) -> &[HostBone] {
        &self.bones
    }
}

/// An animation action and its inclusive integer frame range
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub frame_start: i32,
    pub frame_end: i32,
}

/// Local transform of one bone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BonePose {
    pub translation: [f32; 3],
    /// Quaternion in the host's own component order
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl BonePose {
    /// Rest pose with a `w, x, y, z` identity rotation
    pub const REST_WXYZ: BonePose = BonePose {
        translation: [0.0; 3],
        rotation: [1.0, 0.0, 0.0, 0.0],
        scale: [1.0; 3],
    };

    /// Rest pose with an `x, y, z, w` identity rotation
    pub const REST_XYZW: BonePose = BonePose {
        translation: [0.0; 3],
        rotation: [0.0, 0.0, 0.0, 1.0],
        scale: [1.0; 3],
    };
}

/// Local transforms of every bone, in armature declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    pub bones: Vec<BonePose>,
}

/// Capability interface onto a host scene
pub trait HostScene {
    /// Create a working copy of the first mesh in the scene
    fn mesh_copy(&mut self) -> Option<MeshCopy>;

    /// Give a working copy back to the host for disposal
    fn release_mesh_copy(&mut self, copy: MeshCopy) {
        drop(copy);
    }

    /// Snapshot of the first armature in the scene
    fn armature(&self) -> Option<Armature>;

    /// First animation action, if any
    fn first_action(&self) -> Option<Action>;

    /// The scene's own playback rate, if the host has one
    fn frame_rate(&self) -> Option<f32> {
        None
    }

    /// Move the scene to `frame` and read back the resulting pose.
    ///
    /// This is the only call that changes host state. The frame cursor is
    /// left wherever the last call put it.
    fn evaluate_at_frame(&mut self, frame: i32) -> Result<Pose>;
}

/// In-memory host scene
///
/// Poses are looked up per frame; frames without an explicit pose evaluate
/// to the rest pose for every bone.
#[derive(Debug, Clone)]
pub struct MemoryScene {
    pub mesh: Option<MeshCopy>,
    pub armature: Option<Armature>,
    pub action: Option<Action>,
    pub poses: HashMap<i32, Pose>,
    pub scene_frame_rate: Option<f32>,
    pub rest: BonePose,
    current_frame: Option<i32>,
    copies_made: usize,
    copies_released: usize,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self {
            mesh: None,
            armature: None,
            action: None,
            poses: HashMap::new(),
            scene_frame_rate: None,
            rest: BonePose::REST_WXYZ,
            current_frame: None,
            copies_made: 0,
            copies_released: 0,
        }
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mesh(mut self, mesh: MeshCopy) -> Self {
        self.mesh = Some(mesh);
        self
    }

    pub fn with_armature(mut self, armature: Armature) -> Self {
        self.armature = Some(armature);
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn set_pose(&mut self, frame: i32, pose: Pose) {
        self.poses.insert(frame, pose);
    }

    /// Frame the scene was last evaluated at
    pub fn current_frame(&self) -> Option<i32> {
        self.current_frame
    }

    /// Working copies handed out but not yet released
    pub fn outstanding_copies(&self) -> usize {
        self.copies_made - self.copies_released
    }
}

impl HostScene for MemoryScene {
    fn mesh_copy(&mut self) -> Option<MeshCopy> {
        let copy = self.mesh.clone()?;
        self.copies_made += 1;
        Some(copy)
    }

    fn release_mesh_copy(&mut self, copy: MeshCopy) {
        self.copies_released += 1;
        drop(copy);
    }

    fn armature(&self) -> Option<Armature> {
        self.armature.clone()
    }

    fn first_action(&self) -> Option<Action> {
        self.action.clone()
    }

    fn frame_rate(&self) -> Option<f32> {
        self.scene_frame_rate
    }

    fn evaluate_at_frame(&mut self, frame: i32) -> Result<Pose> {
        self.current_frame = Some(frame);
        if let Some(pose) = self.poses.get(&frame) {
            return Ok(pose.clone());
        }
        let bone_count = self.armature.as_ref().map(|a| a.bones.len()).unwrap_or(0);
        Ok(Pose {
            bones: vec![self.rest; bone_count],
        })
    }
}
