//! Shared definitions for the APG mesh format
//!
//! This crate is used by:
//! - `apg-export` (writer side: mesh, skeleton and animation export)
//! - tools that need to read `.apg` files back (inspection, tests)
//!
//! # Modules
//!
//! - [`format`] - Block tags, component counts and number precisions
//! - [`reader`] - Line-oriented parser for `.apg` text files

pub mod format;
pub mod reader;

pub use format::{
    APG_EXTENSION, ATTRIBUTE_PRECISION, KeyChannel, POSITION_PRECISION, RADIUS_PRECISION,
    VertexBlock,
};
pub use reader::{AnimationInfo, ApgFile, KeyTrack, ParseError, SkeletonInfo, VertexData};
