//! APG text format (.apg)
//!
//! Line-oriented UTF-8 text. Every block starts with a directive line
//! beginning with `@`, followed by its records, one per line.
//!
//! # Layout
//! ```text
//! @<exporter-identifier> <version-string>
//! @vert_count <int>
//! @vp_comps 3          positions        (2 decimals)
//! @vn_comps 3          normals          (3 decimals, optional)
//! @vt_comps 2          texture coords   (3 decimals, optional)
//! @vtan_comps 4        tangent + sign   (3 decimals, optional)
//! @vc_comps 3          vertex colors    (3 decimals, optional)
//! @vb_comps 1          bone id          (integer, optional)
//! @skeleton bones <int> animations <int>
//! @hierarchy nodes <int>
//! parent <int> bone_id <int>
//! @animation name <string> duration <float>
//! @tra_keys node <int> count <int> comps 3
//! t <float> TRA <float> <float> <float>
//! @rot_keys node <int> count <int> comps 3
//! t <float> ROT <float> <float> <float> <float>
//! @sca_keys node <int> count <int> comps 3
//! t <float> SCA <float> <float> <float>
//! @bounding_radius <float>  (2 decimals)
//! ```

/// File extension without dot
pub const APG_EXTENSION: &str = "apg";

/// Decimal places for vertex positions (centimeter resolution for meter units)
pub const POSITION_PRECISION: usize = 2;

/// Decimal places for every other float (normals, UVs, tangents, colors, keys)
pub const ATTRIBUTE_PRECISION: usize = 3;

/// Decimal places for the bounding radius
pub const RADIUS_PRECISION: usize = 2;

/// Component count declared on every keyframe block header
pub const KEY_BLOCK_COMPS: usize = 3;

pub const VERT_COUNT_TAG: &str = "vert_count";
pub const SKELETON_TAG: &str = "skeleton";
pub const HIERARCHY_TAG: &str = "hierarchy";
pub const ANIMATION_TAG: &str = "animation";
pub const BOUNDING_RADIUS_TAG: &str = "bounding_radius";

/// Per-vertex attribute blocks, in the order they appear in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexBlock {
    Position,
    Normal,
    TexCoord,
    Tangent,
    Color,
    BoneId,
}

impl VertexBlock {
    /// All blocks in file order
    pub const ALL: [VertexBlock; 6] = [
        VertexBlock::Position,
        VertexBlock::Normal,
        VertexBlock::TexCoord,
        VertexBlock::Tangent,
        VertexBlock::Color,
        VertexBlock::BoneId,
    ];

    /// Short tag used in the directive line (`@<tag>_comps`)
    pub const fn tag(self) -> &'static str {
        match self {
            VertexBlock::Position => "vp",
            VertexBlock::Normal => "vn",
            VertexBlock::TexCoord => "vt",
            VertexBlock::Tangent => "vtan",
            VertexBlock::Color => "vc",
            VertexBlock::BoneId => "vb",
        }
    }

    /// Number of values per vertex
    pub const fn comps(self) -> usize {
        match self {
            VertexBlock::Position | VertexBlock::Normal | VertexBlock::Color => 3,
            VertexBlock::TexCoord => 2,
            VertexBlock::Tangent => 4,
            VertexBlock::BoneId => 1,
        }
    }

    /// Decimal places used when writing this block (bone ids are integers)
    pub const fn precision(self) -> usize {
        match self {
            VertexBlock::Position => POSITION_PRECISION,
            VertexBlock::BoneId => 0,
            _ => ATTRIBUTE_PRECISION,
        }
    }

    /// Directive line without trailing newline, e.g. `@vt_comps 2`
    pub fn directive(self) -> String {
        format!("@{}_comps {}", self.tag(), self.comps())
    }

    /// Look up a block by its tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.tag() == tag)
    }
}

/// Animation keyframe channels, in the order their blocks are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyChannel {
    Translation,
    Rotation,
    Scale,
}

impl KeyChannel {
    pub const ALL: [KeyChannel; 3] = [
        KeyChannel::Translation,
        KeyChannel::Rotation,
        KeyChannel::Scale,
    ];

    /// Block tag (`@<tag>_keys`)
    pub const fn tag(self) -> &'static str {
        match self {
            KeyChannel::Translation => "tra",
            KeyChannel::Rotation => "rot",
            KeyChannel::Scale => "sca",
        }
    }

    /// Record label on each keyframe line
    pub const fn label(self) -> &'static str {
        match self {
            KeyChannel::Translation => "TRA",
            KeyChannel::Rotation => "ROT",
            KeyChannel::Scale => "SCA",
        }
    }

    /// Number of values on each keyframe line
    pub const fn value_comps(self) -> usize {
        match self {
            KeyChannel::Rotation => 4,
            KeyChannel::Translation | KeyChannel::Scale => 3,
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.tag() == tag)
    }
}
