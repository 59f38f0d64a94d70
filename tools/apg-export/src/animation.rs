//! Animation sampling
//!
//! Samples the first action at every integer frame of its range and records
//! translation, rotation and scale keys for every bone.

use tracing::debug;

use crate::error::{ExportError, Result};
use crate::host::{Action, HostScene};
use crate::skeleton::Skeleton;

/// Keys reserved up front per channel; longer actions grow as they sample
const RESERVE_LIMIT: usize = 1024;

/// One sampled key
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe<T> {
    /// Seconds from the start of the action
    pub time: f32,
    pub value: T,
}

/// All keys of one bone, per channel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    pub translations: Vec<Keyframe<[f32; 3]>>,
    /// Quaternions in host component order
    pub rotations: Vec<Keyframe<[f32; 4]>>,
    pub scales: Vec<Keyframe<[f32; 3]>>,
}

/// A sampled action
#[derive(Debug, Clone, PartialEq)]
pub struct SampledAnimation {
    pub name: String,
    /// Seconds
    pub duration: f32,
    pub frame_rate: f32,
    /// One track per bone, indexed by bone id
    pub tracks: Vec<BoneTrack>,
}

impl SampledAnimation {
    /// Keys per bone per channel
    pub fn frame_count(&self) -> usize {
        self.tracks.first().map_or(0, |t| t.translations.len())
    }
}

/// Sample `action` over its inclusive frame range at `frame_rate`.
///
/// Calls [`HostScene::evaluate_at_frame`] once per frame, in order. The
/// scene is left at the last frame of the range.
pub fn sample_action<S: HostScene + ?Sized>(
    scene: &mut S,
    action: &Action,
    skeleton: &Skeleton,
    frame_rate: f32,
) -> Result<SampledAnimation> {
    let (start, end) = (action.frame_start, action.frame_end);
    if end < start {
        return Err(ExportError::InvalidFrameRange {
            action: action.name.clone(),
            start,
            end,
        });
    }
    if !(frame_rate.is_finite() && frame_rate > 0.0) {
        return Err(ExportError::InvalidFrameRate(frame_rate));
    }

    // Ranges can span more than i32::MAX frames
    let span = i64::from(end) - i64::from(start);
    let duration = span as f32 / frame_rate;
    let reserve = usize::try_from(span).map_or(RESERVE_LIMIT, |s| s.min(RESERVE_LIMIT) + 1);

    let mut tracks = vec![
        BoneTrack {
            translations: Vec::with_capacity(reserve),
            rotations: Vec::with_capacity(reserve),
            scales: Vec::with_capacity(reserve),
        };
        skeleton.len()
    ];

    for frame in start..=end {
        let pose = scene.evaluate_at_frame(frame)?;
        if pose.bones.len() != skeleton.len() {
            return Err(ExportError::PoseMismatch {
                frame,
                expected: skeleton.len(),
                found: pose.bones.len(),
            });
        }

        let time = if end == start {
            0.0
        } else {
            (i64::from(frame) - i64::from(start)) as f32 / span as f32 * duration
        };

        for (track, bone) in tracks.iter_mut().zip(&pose.bones) {
            track.translations.push(Keyframe {
                time,
                value: bone.translation,
            });
            track.rotations.push(Keyframe {
                time,
                value: bone.rotation,
            });
            track.scales.push(Keyframe {
                time,
                value: bone.scale,
            });
        }
    }

    debug!(
        "Sampled action '{}': frames {}..={} at {} fps ({:.3}s)",
        action.name, start, end, frame_rate, duration
    );

    Ok(SampledAnimation {
        name: action.name.clone(),
        duration,
        frame_rate,
        tracks,
    })
}
