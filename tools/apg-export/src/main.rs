//! apg-export - APG mesh export tool
//!
//! Converts glTF/GLB and OBJ scenes to the APG text interchange format
//! (.apg): triangulated vertex streams, skeleton hierarchy and sampled
//! animation keys.

use anyhow::{bail, Context, Result};
use apg_common::{ApgFile, KeyChannel, VertexBlock, APG_EXTENSION};
use clap::{Parser, Subcommand};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use apg_export::{
    export_to_file, load_scene, write_upgraded, ApgManifest, ExportOptions, FrameRate,
    DEFAULT_FRAME_RATE,
};

#[derive(Parser)]
#[command(name = "apg-export")]
#[command(about = "APG mesh export tool")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a single mesh file
    Mesh {
        /// Input mesh file (glTF/GLB/OBJ)
        input: PathBuf,

        /// Output .apg file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Omit the normal block
        #[arg(long)]
        no_normals: bool,

        /// Omit the texture coordinate block
        #[arg(long)]
        no_uvs: bool,

        /// Omit the tangent block
        #[arg(long)]
        no_tangents: bool,

        /// Export vertex colors
        #[arg(long)]
        colors: bool,

        /// Ignore the armature (no bone ids, skeleton or animation)
        #[arg(long)]
        no_skeleton: bool,

        /// Export the skeleton but not the animation
        #[arg(long)]
        no_animation: bool,

        /// Fail if the scene has no armature
        #[arg(long)]
        require_skeleton: bool,

        /// Frame rate for sampling (default: 24)
        #[arg(short, long)]
        frame_rate: Option<f32>,

        /// Sample at the scene's own frame rate
        #[arg(long, conflicts_with = "frame_rate")]
        scene_frame_rate: bool,

        /// Uniform scale applied to positions
        #[arg(short, long)]
        scale: Option<f32>,
    },

    /// Export meshes from a manifest file
    Build {
        /// Path to apg.toml manifest
        #[arg(default_value = "apg.toml")]
        manifest: PathBuf,

        /// Output directory (overrides manifest)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate manifest without exporting
    Check {
        /// Path to apg.toml manifest
        #[arg(default_value = "apg.toml")]
        manifest: PathBuf,
    },

    /// Print a summary of an .apg file
    Inspect {
        /// Input .apg file
        input: PathBuf,
    },

    /// Rewrite an older .apg file in the current layout
    Upgrade {
        /// Input .apg file
        input: PathBuf,

        /// Output .apg file (default: updated/<name> next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Mesh {
            input,
            output,
            no_normals,
            no_uvs,
            no_tangents,
            colors,
            no_skeleton,
            no_animation,
            require_skeleton,
            frame_rate,
            scene_frame_rate,
            scale,
        } => {
            let output = output.unwrap_or_else(|| input.with_extension(APG_EXTENSION));
            tracing::info!("Converting {:?} -> {:?}", input, output);

            let timeline_rate = frame_rate.unwrap_or(DEFAULT_FRAME_RATE);
            let mut options = ExportOptions {
                normals: !no_normals,
                uvs: !no_uvs,
                tangents: !no_tangents,
                colors,
                skeleton: !no_skeleton,
                animation: !no_animation,
                require_skeleton,
                frame_rate: if scene_frame_rate {
                    FrameRate::Scene
                } else {
                    FrameRate::Fixed(timeline_rate)
                },
                ..ExportOptions::default()
            };
            if let Some(scale) = scale {
                if !(scale.is_finite() && scale > 0.0) {
                    bail!("Scale must be positive, got {}", scale);
                }
                options = options.with_scale(scale);
            }

            let mut scene = load_scene(&input, timeline_rate)?;
            export_to_file(scene.as_mut(), &options, &output)
                .with_context(|| format!("Failed to export {:?}", input))?;
            tracing::info!("Done!");
        }

        Commands::Build {
            manifest,
            output,
            verbose,
        } => {
            if verbose {
                tracing::info!("Building meshes from {:?}", manifest);
            }
            let config = ApgManifest::load(&manifest)?;
            config.build_all(manifest_dir(&manifest), output.as_deref())?;
            tracing::info!("Build complete!");
        }

        Commands::Check { manifest } => {
            tracing::info!("Checking manifest {:?}", manifest);
            let config = ApgManifest::load(&manifest)?;
            config.validate(manifest_dir(&manifest))?;
            tracing::info!("Manifest is valid!");
        }

        Commands::Inspect { input } => {
            let text = std::fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {:?}", input))?;
            let file =
                ApgFile::parse(&text).with_context(|| format!("Failed to parse {:?}", input))?;
            print_summary(&input, &file);
        }

        Commands::Upgrade { input, output } => {
            let output = output.unwrap_or_else(|| upgraded_path(&input));
            tracing::info!("Upgrading {:?} -> {:?}", input, output);
            upgrade(&input, &output)?;
            tracing::info!("Done!");
        }
    }

    Ok(())
}

fn manifest_dir(manifest: &Path) -> &Path {
    manifest.parent().unwrap_or(Path::new("."))
}

fn upgraded_path(input: &Path) -> PathBuf {
    let dir = input.parent().unwrap_or(Path::new("."));
    match input.file_name() {
        Some(name) => dir.join("updated").join(name),
        None => dir.join("updated").join(format!("mesh.{}", APG_EXTENSION)),
    }
}

fn upgrade(input: &Path, output: &Path) -> Result<()> {
    let text =
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {:?}", input))?;
    let file = ApgFile::parse(&text).with_context(|| format!("Failed to parse {:?}", input))?;

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory: {:?}", dir))?;
    }
    let out = File::create(output).with_context(|| format!("Failed to create {:?}", output))?;
    let mut writer = BufWriter::new(out);
    let radius = write_upgraded(&mut writer, &file)?;
    writer.flush()?;

    tracing::info!(
        "  {} vertices, {} blocks, bounding radius {:.2}",
        file.vert_count,
        file.blocks.len(),
        radius
    );
    Ok(())
}

fn print_summary(path: &Path, file: &ApgFile) {
    tracing::info!("{:?}: @{}", path, file.header);
    tracing::info!("  vertices: {}", file.vert_count);

    let blocks: Vec<&str> = VertexBlock::ALL
        .into_iter()
        .filter(|&b| file.block(b).is_some())
        .map(VertexBlock::tag)
        .collect();
    tracing::info!("  blocks: {}", blocks.join(" "));

    if let Some(skeleton) = &file.skeleton {
        let roots = skeleton.hierarchy.iter().filter(|(p, _)| *p < 0).count();
        tracing::info!(
            "  skeleton: {} bones ({} roots), {} animations",
            skeleton.bone_count,
            roots,
            skeleton.animation_count
        );
    }
    for animation in &file.animations {
        let keys = animation
            .tracks_for(KeyChannel::Translation)
            .next()
            .map_or(0, |t| t.times.len());
        tracing::info!(
            "  animation '{}': {:.3}s, {} tracks, {} keys per track",
            animation.name,
            animation.duration,
            animation.tracks.len(),
            keys
        );
    }
    if let Some(radius) = file.bounding_radius {
        tracing::info!("  bounding radius: {:.2}", radius);
    }
}
