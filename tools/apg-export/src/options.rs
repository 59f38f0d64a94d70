//! Export options

use glam::Mat4;

use crate::error::{ExportError, Result};

/// Sampling rate used when nothing else is configured
pub const DEFAULT_FRAME_RATE: f32 = 24.0;

/// Where the animation sampler gets its frames-per-second from
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FrameRate {
    /// A fixed rate
    Fixed(f32),
    /// The host scene's own rate, falling back to [`DEFAULT_FRAME_RATE`]
    Scene,
}

impl Default for FrameRate {
    fn default() -> Self {
        FrameRate::Fixed(DEFAULT_FRAME_RATE)
    }
}

impl FrameRate {
    /// Resolve to a concrete rate given what the host reports
    pub fn resolve(self, scene_rate: Option<f32>) -> Result<f32> {
        let rate = match self {
            FrameRate::Fixed(rate) => rate,
            FrameRate::Scene => scene_rate.unwrap_or(DEFAULT_FRAME_RATE),
        };
        if rate.is_finite() && rate > 0.0 {
            Ok(rate)
        } else {
            Err(ExportError::InvalidFrameRate(rate))
        }
    }
}

/// Which blocks to emit and how to sample
#[derive(Debug, Clone, PartialEq)]
pub struct ExportOptions {
    pub normals: bool,
    pub uvs: bool,
    pub tangents: bool,
    pub colors: bool,
    /// Export skeleton and bone ids when an armature is present
    pub skeleton: bool,
    /// Export the first action when a skeleton is exported
    pub animation: bool,
    /// Fail with `NoArmatureFound` instead of exporting a static mesh
    pub require_skeleton: bool,
    pub frame_rate: FrameRate,
    /// Applied to positions, normals and tangents
    pub transform: Mat4,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            normals: true,
            uvs: true,
            tangents: true,
            colors: false,
            skeleton: true,
            animation: true,
            require_skeleton: false,
            frame_rate: FrameRate::default(),
            transform: Mat4::IDENTITY,
        }
    }
}

impl ExportOptions {
    /// Positions, flat/smooth normals and UVs only
    pub fn static_mesh() -> Self {
        Self {
            tangents: false,
            skeleton: false,
            animation: false,
            ..Self::default()
        }
    }

    /// Whether any corner needs the active UV layer
    pub fn needs_uv_layer(&self) -> bool {
        self.uvs || self.tangents
    }

    /// Uniform scale on top of the current transform
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.transform = Mat4::from_scale(glam::Vec3::splat(scale)) * self.transform;
        self
    }
}
