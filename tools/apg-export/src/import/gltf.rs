//! glTF / GLB scene
//!
//! The first primitive of the first mesh becomes the mesh copy, the first
//! skin's joints become the armature and the first animation becomes the
//! action. Animation channels are evaluated on demand at integer frames.

use anyhow::{bail, Context, Result};
use glam::{Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use hashbrown::HashMap;
use std::path::Path;

use crate::host::{
    Action, Armature, BonePose, BoneWeight, CornerLayer, HostBone, HostScene, MeshCopy, Pose,
    SourceFace, SourceVertex,
};
use crate::options::DEFAULT_FRAME_RATE;

/// How a channel interpolates between keys
#[derive(Debug, Clone, Copy, PartialEq)]
enum Interpolation {
    Step,
    /// Also used for cubic splines, sampled through their key values
    Linear,
}

/// One animated property of one bone
#[derive(Debug, Clone)]
struct Channel<T> {
    times: Vec<f32>,
    values: Vec<T>,
    interpolation: Interpolation,
}

impl<T: Copy> Channel<T> {
    /// Key index at or before `t` and the blend factor toward the next key
    fn locate(&self, t: f32) -> Option<(usize, usize, f32)> {
        let last = self.times.len().min(self.values.len()).checked_sub(1)?;
        let times = &self.times[..=last];
        if t <= times[0] {
            return Some((0, 0, 0.0));
        }
        if t >= times[last] {
            return Some((last, last, 0.0));
        }
        let i = times.partition_point(|&k| k <= t) - 1;
        let (t0, t1) = (times[i], times[i + 1]);
        let factor = if t1 > t0 { (t - t0) / (t1 - t0) } else { 0.0 };
        match self.interpolation {
            Interpolation::Step => Some((i, i, 0.0)),
            Interpolation::Linear => Some((i, i + 1, factor.clamp(0.0, 1.0))),
        }
    }

    fn sample(&self, t: f32, blend: impl Fn(T, T, f32) -> T) -> Option<T> {
        let (a, b, factor) = self.locate(t)?;
        if a == b {
            Some(self.values[a])
        } else {
            Some(blend(self.values[a], self.values[b], factor))
        }
    }
}

#[derive(Debug, Clone, Default)]
struct BoneChannels {
    translation: Option<Channel<Vec3>>,
    rotation: Option<Channel<Quat>>,
    scale: Option<Channel<Vec3>>,
}

/// A scene loaded from a glTF or GLB file
#[derive(Debug, Clone)]
pub struct GltfScene {
    mesh: Option<MeshCopy>,
    armature: Option<Armature>,
    /// Rest pose per bone, rotations in `x, y, z, w` order
    rest: Vec<BonePose>,
    action: Option<Action>,
    channels: Vec<BoneChannels>,
    frame_rate: f32,
    current_frame: Option<i32>,
}

impl GltfScene {
    /// Load a scene with the default timeline rate
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_frame_rate(path, DEFAULT_FRAME_RATE)
    }

    /// Load a scene whose timeline runs at `frame_rate` frames per second
    pub fn load_with_frame_rate(path: &Path, frame_rate: f32) -> Result<Self> {
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            bail!("Invalid frame rate {}", frame_rate);
        }
        let (document, buffers, _images) =
            gltf::import(path).with_context(|| format!("Failed to load glTF: {:?}", path))?;

        let mesh = match document.meshes().next() {
            Some(mesh) => Some(read_mesh(&mesh, &buffers)?),
            None => None,
        };

        let mut scene = Self {
            mesh,
            armature: None,
            rest: Vec::new(),
            action: None,
            channels: Vec::new(),
            frame_rate,
            current_frame: None,
        };

        let Some(skin) = document.skins().next() else {
            return Ok(scene);
        };
        let joints: Vec<gltf::Node> = skin.joints().collect();
        let joint_map: HashMap<usize, usize> = joints
            .iter()
            .enumerate()
            .map(|(bone, node)| (node.index(), bone))
            .collect();

        let mut parents: HashMap<usize, usize> = HashMap::new();
        for node in document.nodes() {
            for child in node.children() {
                parents.insert(child.index(), node.index());
            }
        }

        let bone_name = |node: &gltf::Node| {
            node.name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("joint_{}", node.index()))
        };
        let node_names: HashMap<usize, String> = joints
            .iter()
            .map(|node| (node.index(), bone_name(node)))
            .collect();

        let bones = joints
            .iter()
            .map(|node| HostBone {
                name: node_names[&node.index()].clone(),
                parent: parents
                    .get(&node.index())
                    .and_then(|parent| node_names.get(parent))
                    .cloned(),
            })
            .collect();
        scene.armature = Some(Armature {
            name: skin.name().unwrap_or("Armature").to_string(),
            bones,
        });

        scene.rest = joints
            .iter()
            .map(|node| {
                let (translation, rotation, scale) = node.transform().decomposed();
                BonePose {
                    translation,
                    rotation,
                    scale,
                }
            })
            .collect();

        if let Some(animation) = document.animations().next() {
            let mut channels = vec![BoneChannels::default(); joints.len()];
            let mut max_time = 0.0f32;
            for channel in animation.channels() {
                let Some(&bone) = joint_map.get(&channel.target().node().index()) else {
                    continue;
                };
                let interpolation = match channel.sampler().interpolation() {
                    gltf::animation::Interpolation::Step => Interpolation::Step,
                    _ => Interpolation::Linear,
                };
                let cubic = channel.sampler().interpolation()
                    == gltf::animation::Interpolation::CubicSpline;

                let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
                let times: Vec<f32> = reader
                    .read_inputs()
                    .context("Animation channel has no input times")?
                    .collect();
                if let Some(&t) = times.last() {
                    max_time = max_time.max(t);
                }

                match reader
                    .read_outputs()
                    .context("Animation channel has no output values")?
                {
                    ReadOutputs::Translations(iter) => {
                        let values = key_values(iter.map(Vec3::from).collect(), cubic);
                        channels[bone].translation = Some(Channel {
                            times,
                            values,
                            interpolation,
                        });
                    }
                    ReadOutputs::Rotations(iter) => {
                        let values =
                            key_values(iter.into_f32().map(Quat::from_array).collect(), cubic);
                        channels[bone].rotation = Some(Channel {
                            times,
                            values,
                            interpolation,
                        });
                    }
                    ReadOutputs::Scales(iter) => {
                        let values = key_values(iter.map(Vec3::from).collect(), cubic);
                        channels[bone].scale = Some(Channel {
                            times,
                            values,
                            interpolation,
                        });
                    }
                    ReadOutputs::MorphTargetWeights(_) => {}
                }
            }

            let name = animation
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("animation_{}", animation.index()));
            scene.action = Some(Action {
                name,
                frame_start: 0,
                frame_end: (max_time * frame_rate).round() as i32,
            });
            scene.channels = channels;
        }

        tracing::debug!(
            "Loaded glTF scene {:?}: {} bones, action {:?}",
            path,
            scene.rest.len(),
            scene.action.as_ref().map(|a| &a.name)
        );
        Ok(scene)
    }

    /// Pose at an arbitrary time in seconds
    fn pose_at(&self, t: f32) -> Pose {
        let bones = self
            .rest
            .iter()
            .enumerate()
            .map(|(bone, rest)| {
                let Some(channels) = self.channels.get(bone) else {
                    return *rest;
                };
                let translation = channels
                    .translation
                    .as_ref()
                    .and_then(|c| c.sample(t, |a, b, f| a.lerp(b, f)))
                    .map_or(rest.translation, |v| v.to_array());
                let rotation = channels
                    .rotation
                    .as_ref()
                    .and_then(|c| c.sample(t, |a, b, f| a.slerp(b, f)))
                    .map_or(rest.rotation, |q| q.normalize().to_array());
                let scale = channels
                    .scale
                    .as_ref()
                    .and_then(|c| c.sample(t, |a, b, f| a.lerp(b, f)))
                    .map_or(rest.scale, |v| v.to_array());
                BonePose {
                    translation,
                    rotation,
                    scale,
                }
            })
            .collect();
        Pose { bones }
    }

    pub fn current_frame(&self) -> Option<i32> {
        self.current_frame
    }
}

impl HostScene for GltfScene {
    fn mesh_copy(&mut self) -> Option<MeshCopy> {
        self.mesh.clone()
    }

    fn armature(&self) -> Option<Armature> {
        self.armature.clone()
    }

    fn first_action(&self) -> Option<Action> {
        self.action.clone()
    }

    fn frame_rate(&self) -> Option<f32> {
        Some(self.frame_rate)
    }

    fn evaluate_at_frame(&mut self, frame: i32) -> crate::error::Result<Pose> {
        self.current_frame = Some(frame);
        Ok(self.pose_at(frame as f32 / self.frame_rate))
    }
}

/// Cubic spline outputs are (in-tangent, value, out-tangent) triplets
fn key_values<T: Copy>(values: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        values.chunks_exact(3).map(|c| c[1]).collect()
    } else {
        values
    }
}

fn read_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<MeshCopy> {
    let name = mesh
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("mesh_{}", mesh.index()));
    let primitive = mesh
        .primitives()
        .next()
        .context("No primitives found in mesh")?;
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        bail!(
            "Mesh '{}' uses {:?} primitives, only triangle lists are supported",
            name,
            primitive.mode()
        );
    }

    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .context("No positions in mesh")?
        .collect();
    let count = positions.len();

    let normals: Option<Vec<[f32; 3]>> = reader
        .read_normals()
        .map(|iter| iter.collect())
        .filter(|n: &Vec<[f32; 3]>| n.len() == count);
    let uvs: Option<Vec<[f32; 2]>> = reader
        .read_tex_coords(0)
        .map(|iter| iter.into_f32().collect())
        .filter(|t: &Vec<[f32; 2]>| t.len() == count);
    let colors: Option<Vec<[f32; 3]>> = reader
        .read_colors(0)
        .map(|iter| iter.into_rgb_f32().collect())
        .filter(|c: &Vec<[f32; 3]>| c.len() == count);
    let tangents: Option<Vec<[f32; 4]>> = reader
        .read_tangents()
        .map(|iter| iter.collect())
        .filter(|t: &Vec<[f32; 4]>| t.len() == count);

    let joints: Option<Vec<[u16; 4]>> = reader.read_joints(0).map(|iter| iter.into_u16().collect());
    let weights: Option<Vec<[f32; 4]>> =
        reader.read_weights(0).map(|iter| iter.into_f32().collect());
    let skinning = match (joints, weights) {
        (Some(j), Some(w)) if j.len() == count && w.len() == count => Some((j, w)),
        (Some(_), None) | (None, Some(_)) => {
            tracing::warn!(
                "Mesh has partial skinning data (joints or weights missing), ignoring skinning"
            );
            None
        }
        _ => None,
    };

    let indices: Vec<u32> = match reader.read_indices() {
        Some(iter) => iter.into_u32().collect(),
        None => (0..count as u32).collect(),
    };
    if indices.len() % 3 != 0 {
        bail!(
            "Mesh '{}' has {} indices, not a multiple of 3",
            name,
            indices.len()
        );
    }

    let vertices = (0..count)
        .map(|i| {
            let mut weights: Vec<BoneWeight> = skinning
                .as_ref()
                .map(|(j, w)| {
                    j[i].iter()
                        .zip(&w[i])
                        .filter(|(_, &weight)| weight > 0.0)
                        .map(|(&bone, &weight)| BoneWeight {
                            bone: bone as u32,
                            weight,
                        })
                        .collect()
                })
                .unwrap_or_default();
            // Dominant influence first
            weights.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            SourceVertex {
                position: positions[i],
                normal: normals.as_ref().map(|n| n[i]),
                weights,
            }
        })
        .collect();

    let smooth = normals.is_some();
    let faces = indices
        .chunks_exact(3)
        .map(|tri| {
            let corner = |k: usize| {
                positions
                    .get(tri[k] as usize)
                    .map_or(Vec3::ZERO, |&p| Vec3::from(p))
            };
            let normal = (corner(1) - corner(0))
                .cross(corner(2) - corner(0))
                .normalize_or_zero()
                .to_array();
            if smooth {
                SourceFace::smooth(tri, normal)
            } else {
                SourceFace::flat(tri, normal)
            }
        })
        .collect();

    let uv_layer = uvs.map(|uvs| corner_layer("TEXCOORD_0", &indices, &uvs));
    let color_layer = colors.map(|colors| corner_layer("COLOR_0", &indices, &colors));

    Ok(MeshCopy {
        name,
        vertices,
        faces,
        uv_layer,
        color_layer,
        tangents,
    })
}

/// Expand a per-vertex attribute into a per-corner layer
fn corner_layer<T: Copy + Default>(name: &str, indices: &[u32], data: &[T]) -> CornerLayer<T> {
    CornerLayer::new(
        name,
        indices
            .chunks_exact(3)
            .map(|tri| {
                tri.iter()
                    .map(|&v| data.get(v as usize).copied().unwrap_or_default())
                    .collect()
            })
            .collect(),
    )
}
