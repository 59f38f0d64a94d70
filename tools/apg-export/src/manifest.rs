//! apg.toml batch manifest
//!
//! ```toml
//! [output]
//! dir = "build"
//!
//! [defaults]
//! colors = true
//!
//! [[meshes]]
//! id = "hero"
//! path = "models/hero.glb"
//! frame_rate = 30.0
//! ```
//!
//! Paths are relative to the manifest's directory.

use anyhow::{bail, Context, Result};
use hashbrown::HashSet;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::export::{export_to_file, ExportSummary};
use crate::formats::APG_EXTENSION;
use crate::import::{is_supported, load_scene};
use crate::options::{ExportOptions, FrameRate, DEFAULT_FRAME_RATE};

/// apg.toml manifest structure
#[derive(Debug, Default, Deserialize)]
pub struct ApgManifest {
    #[serde(default)]
    pub output: OutputSection,
    #[serde(default)]
    pub defaults: MeshSettings,
    #[serde(default)]
    pub meshes: Vec<MeshEntry>,
}

/// Output configuration section
#[derive(Debug, Default, Deserialize)]
pub struct OutputSection {
    /// Output directory. Default: next to each input file
    pub dir: Option<PathBuf>,
}

/// Export settings; unset fields fall back to `[defaults]`, then to the
/// built-in defaults
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct MeshSettings {
    pub normals: Option<bool>,
    pub uvs: Option<bool>,
    pub tangents: Option<bool>,
    pub colors: Option<bool>,
    pub skeleton: Option<bool>,
    pub animation: Option<bool>,
    pub require_skeleton: Option<bool>,
    /// Sampling rate (frames per second)
    pub frame_rate: Option<f32>,
    /// Sample at the scene's own rate instead of `frame_rate`
    pub scene_frame_rate: Option<bool>,
    /// Uniform scale applied to positions
    pub scale: Option<f32>,
}

/// Single mesh entry
#[derive(Debug, Deserialize)]
pub struct MeshEntry {
    pub id: String,
    pub path: PathBuf,
    /// Output file name. Default: `<id>.apg`
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(flatten)]
    pub settings: MeshSettings,
}

impl MeshSettings {
    /// `self` with unset fields taken from `fallback`
    pub fn or(&self, fallback: &MeshSettings) -> MeshSettings {
        MeshSettings {
            normals: self.normals.or(fallback.normals),
            uvs: self.uvs.or(fallback.uvs),
            tangents: self.tangents.or(fallback.tangents),
            colors: self.colors.or(fallback.colors),
            skeleton: self.skeleton.or(fallback.skeleton),
            animation: self.animation.or(fallback.animation),
            require_skeleton: self.require_skeleton.or(fallback.require_skeleton),
            frame_rate: self.frame_rate.or(fallback.frame_rate),
            scene_frame_rate: self.scene_frame_rate.or(fallback.scene_frame_rate),
            scale: self.scale.or(fallback.scale),
        }
    }

    /// Timeline rate used when loading the scene
    pub fn timeline_rate(&self) -> f32 {
        self.frame_rate.unwrap_or(DEFAULT_FRAME_RATE)
    }

    pub fn to_options(&self) -> ExportOptions {
        let defaults = ExportOptions::default();
        let frame_rate = if self.scene_frame_rate.unwrap_or(false) {
            FrameRate::Scene
        } else {
            FrameRate::Fixed(self.timeline_rate())
        };
        let options = ExportOptions {
            normals: self.normals.unwrap_or(defaults.normals),
            uvs: self.uvs.unwrap_or(defaults.uvs),
            tangents: self.tangents.unwrap_or(defaults.tangents),
            colors: self.colors.unwrap_or(defaults.colors),
            skeleton: self.skeleton.unwrap_or(defaults.skeleton),
            animation: self.animation.unwrap_or(defaults.animation),
            require_skeleton: self.require_skeleton.unwrap_or(defaults.require_skeleton),
            frame_rate,
            transform: defaults.transform,
        };
        match self.scale {
            Some(scale) => options.with_scale(scale),
            None => options,
        }
    }

    fn validate(&self, id: &str) -> Result<()> {
        if let Some(rate) = self.frame_rate {
            if !(rate.is_finite() && rate > 0.0) {
                bail!("Mesh '{}': frame_rate must be positive, got {}", id, rate);
            }
        }
        if let Some(scale) = self.scale {
            if !(scale.is_finite() && scale > 0.0) {
                bail!("Mesh '{}': scale must be positive, got {}", id, scale);
            }
        }
        Ok(())
    }
}

impl ApgManifest {
    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        Self::parse(&content)
    }

    /// Parse manifest from string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse apg.toml")
    }

    /// Effective settings for one entry
    pub fn settings_for(&self, entry: &MeshEntry) -> MeshSettings {
        entry.settings.or(&self.defaults)
    }

    /// Check ids, input paths and settings without exporting anything
    pub fn validate(&self, base_dir: &Path) -> Result<()> {
        if self.meshes.is_empty() {
            tracing::warn!("Manifest declares no meshes");
        }

        let mut ids = HashSet::new();
        for entry in &self.meshes {
            if entry.id.trim().is_empty() {
                bail!("Mesh entry with path {:?} has an empty id", entry.path);
            }
            if !ids.insert(entry.id.as_str()) {
                bail!("Duplicate mesh id '{}'", entry.id);
            }

            let input = base_dir.join(&entry.path);
            if !input.exists() {
                bail!("Mesh '{}': input not found: {}", entry.id, input.display());
            }
            if !is_supported(&input) {
                bail!(
                    "Mesh '{}': unsupported format {:?} (use .obj, .gltf, or .glb)",
                    entry.id,
                    input
                );
            }
            self.settings_for(entry).validate(&entry.id)?;
        }
        Ok(())
    }

    /// Where an entry's file is written
    pub fn output_path(
        &self,
        entry: &MeshEntry,
        base_dir: &Path,
        output_override: Option<&Path>,
    ) -> PathBuf {
        let file_name = entry
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{}.{}", entry.id, APG_EXTENSION)));
        let dir = match (output_override, &self.output.dir) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(dir)) => base_dir.join(dir),
            (None, None) => base_dir
                .join(&entry.path)
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| base_dir.to_path_buf()),
        };
        dir.join(file_name)
    }

    /// Validate, then export every entry
    pub fn build_all(
        &self,
        base_dir: &Path,
        output_override: Option<&Path>,
    ) -> Result<Vec<ExportSummary>> {
        self.validate(base_dir)?;

        let mut summaries = Vec::with_capacity(self.meshes.len());
        for entry in &self.meshes {
            let settings = self.settings_for(entry);
            let input = base_dir.join(&entry.path);
            let output = self.output_path(entry, base_dir, output_override);

            if let Some(dir) = output.parent() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
            }

            tracing::info!("Exporting '{}': {:?} -> {:?}", entry.id, input, output);
            let mut scene = load_scene(&input, settings.timeline_rate())?;
            let summary = export_to_file(scene.as_mut(), &settings.to_options(), &output)
                .with_context(|| format!("Failed to export mesh '{}'", entry.id))?;
            summaries.push(summary);
        }

        tracing::info!("Exported {} meshes", summaries.len());
        Ok(summaries)
    }
}
