//! APG text writer
//!
//! Re-exports the shared format constants from apg-common.

pub use apg_common::format::*;

use std::io::Write;

use apg_common::ApgFile;

use glam::Vec3;

use crate::animation::{Keyframe, SampledAnimation};
use crate::error::Result;
use crate::mesh::{OutputVertex, ResolvedMesh};
use crate::options::ExportOptions;
use crate::skeleton::Skeleton;

/// First token of the header line
pub const EXPORTER_ID: &str = "apg_export";

/// `@apg_export v<version>`
pub fn header_line() -> String {
    format!("@{} v{}", EXPORTER_ID, env!("CARGO_PKG_VERSION"))
}

/// Everything that goes into one `.apg` file
#[derive(Debug, Clone, PartialEq)]
pub struct ApgDocument {
    pub mesh: ResolvedMesh,
    /// Vertex blocks to write, in file order
    pub blocks: Vec<VertexBlock>,
    pub skeleton: Option<Skeleton>,
    pub animation: Option<SampledAnimation>,
}

impl ApgDocument {
    /// Pick the vertex blocks from the options; bone ids follow the skeleton
    pub fn new(
        mesh: ResolvedMesh,
        options: &ExportOptions,
        skeleton: Option<Skeleton>,
        animation: Option<SampledAnimation>,
    ) -> Self {
        let blocks = VertexBlock::ALL
            .into_iter()
            .filter(|block| match block {
                VertexBlock::Position => true,
                VertexBlock::Normal => options.normals,
                VertexBlock::TexCoord => options.uvs,
                VertexBlock::Tangent => options.tangents,
                VertexBlock::Color => options.colors,
                VertexBlock::BoneId => skeleton.is_some(),
            })
            .collect();
        Self {
            mesh,
            blocks,
            skeleton,
            animation,
        }
    }
}

/// Animation names are written as a single token
pub fn animation_token(name: &str) -> String {
    let token: String = name
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if token.is_empty() {
        "unnamed".to_string()
    } else {
        token
    }
}

fn block_values(vertex: &OutputVertex, block: VertexBlock) -> [f32; 4] {
    match block {
        VertexBlock::Position => pad(&vertex.position),
        VertexBlock::Normal => pad(&vertex.normal.unwrap_or_default()),
        VertexBlock::TexCoord => pad(&vertex.uv.unwrap_or_default()),
        VertexBlock::Tangent => vertex.tangent.unwrap_or_default(),
        VertexBlock::Color => pad(&vertex.color.unwrap_or_default()),
        VertexBlock::BoneId => [vertex.bone.unwrap_or(0) as f32, 0.0, 0.0, 0.0],
    }
}

fn pad(values: &[f32]) -> [f32; 4] {
    let mut out = [0.0; 4];
    out[..values.len()].copy_from_slice(values);
    out
}

fn write_row<W: Write>(w: &mut W, values: &[f32], precision: usize) -> Result<()> {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            w.write_all(b" ")?;
        }
        write!(w, "{:.*}", precision, v)?;
    }
    w.write_all(b"\n")?;
    Ok(())
}

/// Write a complete APG file.
///
/// Vertex blocks stream one row per emitted corner. Returns the bounding
/// radius, the largest distance from the origin over the emitted positions.
pub fn write_apg<W: Write>(w: &mut W, doc: &ApgDocument) -> Result<f32> {
    let mesh = &doc.mesh;
    writeln!(w, "{}", header_line())?;
    writeln!(w, "@{} {}", VERT_COUNT_TAG, mesh.emitted_count())?;

    let mut radius = 0.0f32;
    for &block in &doc.blocks {
        writeln!(w, "{}", block.directive())?;
        for vertex in mesh.corners() {
            if block == VertexBlock::Position {
                radius = radius.max(Vec3::from(vertex.position).length());
            }
            if block == VertexBlock::BoneId {
                writeln!(w, "{}", vertex.bone.unwrap_or(0))?;
            } else {
                let values = block_values(vertex, block);
                write_row(w, &values[..block.comps()], block.precision())?;
            }
        }
    }

    if let Some(skeleton) = &doc.skeleton {
        write_skeleton(w, skeleton, doc.animation.as_ref())?;
    }

    writeln!(w, "@{} {:.*}", BOUNDING_RADIUS_TAG, RADIUS_PRECISION, radius)?;
    Ok(radius)
}

fn write_skeleton<W: Write>(
    w: &mut W,
    skeleton: &Skeleton,
    animation: Option<&SampledAnimation>,
) -> Result<()> {
    writeln!(
        w,
        "@{} bones {} animations {}",
        SKELETON_TAG,
        skeleton.len(),
        usize::from(animation.is_some())
    )?;
    writeln!(w, "@{} nodes {}", HIERARCHY_TAG, skeleton.len())?;
    for bone in &skeleton.bones {
        writeln!(w, "parent {} bone_id {}", bone.parent_id(), bone.id)?;
    }

    if let Some(animation) = animation {
        writeln!(
            w,
            "@{} name {} duration {:.*}",
            ANIMATION_TAG,
            animation_token(&animation.name),
            ATTRIBUTE_PRECISION,
            animation.duration
        )?;
        for channel in KeyChannel::ALL {
            for (node, track) in animation.tracks.iter().enumerate() {
                match channel {
                    KeyChannel::Translation => write_keys(w, channel, node, &track.translations)?,
                    KeyChannel::Rotation => write_keys(w, channel, node, &track.rotations)?,
                    KeyChannel::Scale => write_keys(w, channel, node, &track.scales)?,
                }
            }
        }
    }
    Ok(())
}

fn write_keys<W: Write, const N: usize>(
    w: &mut W,
    channel: KeyChannel,
    node: usize,
    keys: &[Keyframe<[f32; N]>],
) -> Result<()> {
    write_key_header(w, channel, node, keys.len())?;
    for key in keys {
        write!(w, "t {:.*} {} ", ATTRIBUTE_PRECISION, key.time, channel.label())?;
        write_row(w, &key.value, ATTRIBUTE_PRECISION)?;
    }
    Ok(())
}

fn write_key_header<W: Write>(
    w: &mut W,
    channel: KeyChannel,
    node: usize,
    count: usize,
) -> Result<()> {
    writeln!(
        w,
        "@{}_keys node {} count {} comps {}",
        channel.tag(),
        node,
        count,
        KEY_BLOCK_COMPS
    )?;
    Ok(())
}

/// Rewrite a parsed file in the current layout.
///
/// Vertex blocks come out in canonical order with their current component
/// counts and precisions. Missing components and NaNs become zero. Blocks
/// the reader only skips (`@vw`, `@root_transform`, `@offset_mat`) are
/// dropped. The bounding radius is recomputed from the positions and
/// returned.
pub fn write_upgraded<W: Write>(w: &mut W, file: &ApgFile) -> Result<f32> {
    writeln!(w, "{}", header_line())?;
    writeln!(w, "@{} {}", VERT_COUNT_TAG, file.vert_count)?;

    for block in VertexBlock::ALL {
        let Some(data) = file.block(block) else {
            continue;
        };
        writeln!(w, "{}", block.directive())?;
        for i in 0..file.vert_count {
            let row = data.values.get(i * data.comps..).unwrap_or_default();
            let values: [f32; 4] = std::array::from_fn(|c| {
                row.get(c)
                    .copied()
                    .filter(|v| c < data.comps && !v.is_nan())
                    .unwrap_or(0.0)
            });
            write_row(w, &values[..block.comps()], block.precision())?;
        }
    }

    if let Some(skeleton) = &file.skeleton {
        writeln!(
            w,
            "@{} bones {} animations {}",
            SKELETON_TAG,
            skeleton.bone_count,
            file.animations.len()
        )?;
        writeln!(w, "@{} nodes {}", HIERARCHY_TAG, skeleton.hierarchy.len())?;
        for (parent, bone) in &skeleton.hierarchy {
            writeln!(w, "parent {} bone_id {}", parent, bone)?;
        }
    }

    for animation in &file.animations {
        writeln!(
            w,
            "@{} name {} duration {:.*}",
            ANIMATION_TAG,
            animation_token(&animation.name),
            ATTRIBUTE_PRECISION,
            animation.duration
        )?;
        for track in &animation.tracks {
            let comps = track.channel.value_comps();
            write_key_header(w, track.channel, track.node, track.times.len())?;
            for (time, values) in track.times.iter().zip(track.values.chunks(comps)) {
                write!(w, "t {:.*} {} ", ATTRIBUTE_PRECISION, time, track.channel.label())?;
                write_row(w, values, ATTRIBUTE_PRECISION)?;
            }
        }
    }

    let radius = file
        .positions()
        .into_iter()
        .map(|p| Vec3::from(p).length())
        .filter(|d| !d.is_nan())
        .fold(0.0f32, f32::max);
    writeln!(w, "@{} {:.*}", BOUNDING_RADIUS_TAG, RADIUS_PRECISION, radius)?;
    Ok(radius)
}
