//! Reader for `.apg` text files
//!
//! Parses every block the exporter writes. Also accepts the older
//! `@vp comps 3` directive spelling and skips the legacy `@vw`,
//! `@root_transform` and `@offset_mat` blocks, so files produced by earlier
//! converter versions can still be inspected.

use std::str::FromStr;

use crate::format::{
    ANIMATION_TAG, BOUNDING_RADIUS_TAG, HIERARCHY_TAG, KeyChannel, SKELETON_TAG, VERT_COUNT_TAG,
    VertexBlock,
};

/// Errors produced while parsing an APG file
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("file is empty or does not start with an '@' header line")]
    MissingHeader,

    #[error("line {line}: unknown directive '@{directive}'")]
    UnknownDirective { line: usize, directive: String },

    #[error("line {line}: expected {expected}, found '{found}'")]
    Malformed {
        line: usize,
        expected: &'static str,
        found: String,
    },

    #[error("unexpected end of file while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("line {line}: vertex block appears before @vert_count")]
    MissingVertCount { line: usize },

    #[error("line {line}: keyframe block outside of an @animation")]
    OrphanKeys { line: usize },
}

/// One per-vertex attribute block
#[derive(Debug, Clone, PartialEq)]
pub struct VertexData {
    pub block: VertexBlock,
    /// Declared component count
    pub comps: usize,
    /// Flat values, `vert_count * comps` long
    pub values: Vec<f32>,
}

impl VertexData {
    /// Iterate values vertex by vertex
    pub fn rows(&self) -> std::slice::Chunks<'_, f32> {
        self.values.chunks(self.comps.max(1))
    }
}

/// `@skeleton` + `@hierarchy` contents
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkeletonInfo {
    pub bone_count: usize,
    pub animation_count: usize,
    /// `(parent, bone_id)` pairs in file order
    pub hierarchy: Vec<(i32, i32)>,
}

/// One keyframe block
#[derive(Debug, Clone, PartialEq)]
pub struct KeyTrack {
    pub channel: KeyChannel,
    pub node: usize,
    pub times: Vec<f32>,
    /// Flat values, `times.len() * channel.value_comps()` long
    pub values: Vec<f32>,
}

/// One `@animation` block with its keyframe tracks
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationInfo {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<KeyTrack>,
}

impl AnimationInfo {
    /// Tracks of one channel, in file order
    pub fn tracks_for(&self, channel: KeyChannel) -> impl Iterator<Item = &KeyTrack> {
        self.tracks.iter().filter(move |t| t.channel == channel)
    }
}

/// A parsed APG file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApgFile {
    /// Header text after the leading `@`
    pub header: String,
    pub vert_count: usize,
    pub blocks: Vec<VertexData>,
    pub skeleton: Option<SkeletonInfo>,
    pub animations: Vec<AnimationInfo>,
    pub bounding_radius: Option<f32>,
}

impl ApgFile {
    /// Parse APG text
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        Parser::new(text).parse()
    }

    /// Get a vertex block if present
    pub fn block(&self, block: VertexBlock) -> Option<&VertexData> {
        self.blocks.iter().find(|b| b.block == block)
    }

    /// Positions as `[x, y, z]`
    pub fn positions(&self) -> Vec<[f32; 3]> {
        self.block(VertexBlock::Position)
            .map(|b| {
                b.rows()
                    .map(|r| std::array::from_fn(|i| r.get(i).copied().unwrap_or(0.0)))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Bone ids, if the file carries a `@vb_comps` block
    pub fn bone_ids(&self) -> Option<Vec<i32>> {
        self.block(VertexBlock::BoneId)
            .map(|b| b.values.iter().map(|&v| v as i32).collect())
    }
}

/// Upper bound on up-front reservations sized from header counts
const RESERVE_LIMIT: usize = 4096;

struct Parser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
    /// Tokens left over from a partially consumed record line
    pending: Vec<&'a str>,
    line: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
            pending: Vec::new(),
            line: 0,
        }
    }

    /// Next non-empty line, 1-based line number
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        for (i, line) in self.lines.by_ref() {
            let line = line.trim();
            if !line.is_empty() {
                self.line = i + 1;
                return Some((i + 1, line));
            }
        }
        None
    }

    fn next_record(&mut self, context: &'static str) -> Result<(usize, &'a str), ParseError> {
        self.next_line()
            .ok_or(ParseError::UnexpectedEof { context })
    }

    /// Read `count` whitespace-separated numbers that may span several lines
    fn read_numbers(&mut self, count: usize, context: &'static str) -> Result<Vec<f32>, ParseError> {
        let mut values = Vec::with_capacity(count.min(RESERVE_LIMIT));
        while values.len() < count {
            if self.pending.is_empty() {
                let (_, line) = self.next_record(context)?;
                self.pending = line.split_whitespace().rev().collect();
            }
            while values.len() < count {
                let Some(token) = self.pending.pop() else {
                    break;
                };
                values.push(parse_num(token, self.line, "a number")?);
            }
        }
        if !self.pending.is_empty() {
            return Err(ParseError::Malformed {
                line: self.line,
                expected: "end of record",
                found: self.pending.iter().rev().copied().collect::<Vec<_>>().join(" "),
            });
        }
        Ok(values)
    }

    fn parse(mut self) -> Result<ApgFile, ParseError> {
        let (_, first) = self.next_line().ok_or(ParseError::MissingHeader)?;
        let header = first.strip_prefix('@').ok_or(ParseError::MissingHeader)?;

        let mut file = ApgFile {
            header: header.trim().to_string(),
            ..ApgFile::default()
        };
        let mut vert_count: Option<usize> = None;

        while let Some((line, text)) = self.next_line() {
            let Some(directive) = text.strip_prefix('@') else {
                return Err(ParseError::Malformed {
                    line,
                    expected: "a '@' directive",
                    found: text.to_string(),
                });
            };
            let tokens: Vec<&str> = directive.split_whitespace().collect();
            let name = tokens.first().copied().unwrap_or_default();

            match name {
                VERT_COUNT_TAG => {
                    let count = parse_num(token_at(&tokens, 1, line)?, line, "vertex count")?;
                    vert_count = Some(count);
                    file.vert_count = count;
                }
                SKELETON_TAG => {
                    expect_keyword(&tokens, 1, "bones", line)?;
                    let bone_count = parse_num(token_at(&tokens, 2, line)?, line, "bone count")?;
                    expect_keyword(&tokens, 3, "animations", line)?;
                    let animation_count =
                        parse_num(token_at(&tokens, 4, line)?, line, "animation count")?;
                    file.skeleton = Some(SkeletonInfo {
                        bone_count,
                        animation_count,
                        hierarchy: Vec::new(),
                    });
                }
                HIERARCHY_TAG => {
                    expect_keyword(&tokens, 1, "nodes", line)?;
                    let nodes: usize = parse_num(token_at(&tokens, 2, line)?, line, "node count")?;
                    let mut hierarchy = Vec::new();
                    for _ in 0..nodes {
                        let (rec_line, rec) = self.next_record("hierarchy")?;
                        let rec_tokens: Vec<&str> = rec.split_whitespace().collect();
                        expect_keyword(&rec_tokens, 0, "parent", rec_line)?;
                        let parent = parse_num(token_at(&rec_tokens, 1, rec_line)?, rec_line, "parent id")?;
                        expect_keyword(&rec_tokens, 2, "bone_id", rec_line)?;
                        let bone = parse_num(token_at(&rec_tokens, 3, rec_line)?, rec_line, "bone id")?;
                        hierarchy.push((parent, bone));
                    }
                    file.skeleton.get_or_insert_with(SkeletonInfo::default).hierarchy = hierarchy;
                }
                ANIMATION_TAG => {
                    expect_keyword(&tokens, 1, "name", line)?;
                    let name = token_at(&tokens, 2, line)?.to_string();
                    expect_keyword(&tokens, 3, "duration", line)?;
                    let duration = parse_num(token_at(&tokens, 4, line)?, line, "duration")?;
                    file.animations.push(AnimationInfo {
                        name,
                        duration,
                        tracks: Vec::new(),
                    });
                }
                BOUNDING_RADIUS_TAG => {
                    file.bounding_radius =
                        Some(parse_num(token_at(&tokens, 1, line)?, line, "bounding radius")?);
                }
                // Early exporter drafts wrote "@bounding radius"
                "bounding" => {
                    expect_keyword(&tokens, 1, "radius", line)?;
                    file.bounding_radius =
                        Some(parse_num(token_at(&tokens, 2, line)?, line, "bounding radius")?);
                }
                _ => {
                    if let Some(tag) = name.strip_suffix("_keys") {
                        let track = self.parse_key_block(tag, &tokens, line)?;
                        let animation = file
                            .animations
                            .last_mut()
                            .ok_or(ParseError::OrphanKeys { line })?;
                        animation.tracks.push(track);
                    } else {
                        self.parse_attribute_block(&mut file, vert_count, name, &tokens, line)?;
                    }
                }
            }
        }

        Ok(file)
    }

    fn parse_attribute_block(
        &mut self,
        file: &mut ApgFile,
        vert_count: Option<usize>,
        name: &str,
        tokens: &[&str],
        line: usize,
    ) -> Result<(), ParseError> {
        // "@vt_comps 2" or the older "@vt comps 2"
        let (tag, comps_token) = match name.strip_suffix("_comps") {
            Some(tag) => (tag, token_at(tokens, 1, line)?),
            None => {
                expect_keyword(tokens, 1, "comps", line)?;
                (name, token_at(tokens, 2, line)?)
            }
        };
        let comps: usize = parse_num(comps_token, line, "component count")?;
        if comps == 0 {
            return Err(ParseError::Malformed {
                line,
                expected: "a positive component count",
                found: comps_token.to_string(),
            });
        }

        match (VertexBlock::from_tag(tag), tag) {
            (Some(block), _) => {
                let count = vert_count.ok_or(ParseError::MissingVertCount { line })?;
                let total = block_len(count, comps, line)?;
                let values = self.read_numbers(total, "vertex block")?;
                file.blocks.push(VertexData {
                    block,
                    comps,
                    values,
                });
            }
            (None, "vw") => {
                let count = vert_count.ok_or(ParseError::MissingVertCount { line })?;
                self.read_numbers(block_len(count, comps, line)?, "bone weight block")?;
            }
            (None, "root_transform") => {
                self.read_numbers(comps, "root transform")?;
            }
            (None, "offset_mat") => {
                let bones = file.skeleton.as_ref().map(|s| s.bone_count).unwrap_or(0);
                self.read_numbers(block_len(bones, comps, line)?, "offset matrices")?;
            }
            _ => {
                return Err(ParseError::UnknownDirective {
                    line,
                    directive: name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn parse_key_block(
        &mut self,
        tag: &str,
        tokens: &[&str],
        line: usize,
    ) -> Result<KeyTrack, ParseError> {
        let channel = KeyChannel::from_tag(tag).ok_or_else(|| ParseError::UnknownDirective {
            line,
            directive: format!("{tag}_keys"),
        })?;
        expect_keyword(tokens, 1, "node", line)?;
        let node = parse_num(token_at(tokens, 2, line)?, line, "node id")?;
        expect_keyword(tokens, 3, "count", line)?;
        let count: usize = parse_num(token_at(tokens, 4, line)?, line, "key count")?;

        let comps = channel.value_comps();
        let mut times = Vec::new();
        let mut values = Vec::new();
        for _ in 0..count {
            let (rec_line, rec) = self.next_record("keyframes")?;
            let rec_tokens: Vec<&str> = rec.split_whitespace().collect();
            expect_keyword(&rec_tokens, 0, "t", rec_line)?;
            times.push(parse_num(token_at(&rec_tokens, 1, rec_line)?, rec_line, "key time")?);
            expect_keyword(&rec_tokens, 2, channel.label(), rec_line)?;
            for i in 0..comps {
                values.push(parse_num(
                    token_at(&rec_tokens, 3 + i, rec_line)?,
                    rec_line,
                    "key value",
                )?);
            }
        }

        Ok(KeyTrack {
            channel,
            node,
            times,
            values,
        })
    }
}

/// Value count of a block, `rows * comps`, rejecting counts that overflow
fn block_len(rows: usize, comps: usize, line: usize) -> Result<usize, ParseError> {
    rows.checked_mul(comps).ok_or_else(|| ParseError::Malformed {
        line,
        expected: "a block size that fits in memory",
        found: format!("{rows} x {comps}"),
    })
}

fn token_at<'t>(tokens: &[&'t str], index: usize, line: usize) -> Result<&'t str, ParseError> {
    tokens.get(index).copied().ok_or_else(|| ParseError::Malformed {
        line,
        expected: "more fields",
        found: tokens.join(" "),
    })
}

fn expect_keyword(
    tokens: &[&str],
    index: usize,
    keyword: &'static str,
    line: usize,
) -> Result<(), ParseError> {
    match tokens.get(index) {
        Some(&t) if t == keyword => Ok(()),
        other => Err(ParseError::Malformed {
            line,
            expected: keyword,
            found: other.copied().unwrap_or_default().to_string(),
        }),
    }
}

fn parse_num<T: FromStr>(token: &str, line: usize, expected: &'static str) -> Result<T, ParseError> {
    token.parse().map_err(|_| ParseError::Malformed {
        line,
        expected,
        found: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKINNED: &str = "\
@apg_export v0.1.0
@vert_count 3
@vp_comps 3
0.00 0.00 0.00
1.00 0.00 0.00
0.00 1.00 0.00
@vn_comps 3
0.000 0.000 1.000
0.000 0.000 1.000
0.000 0.000 1.000
@vb_comps 1
0
1
1
@skeleton bones 2 animations 1
@hierarchy nodes 2
parent -1 bone_id 0
parent 0 bone_id 1
@animation name Wave duration 1.000
@tra_keys node 0 count 2 comps 3
t 0.000 TRA 0.000 0.000 0.000
t 1.000 TRA 0.000 1.000 0.000
@tra_keys node 1 count 2 comps 3
t 0.000 TRA 0.000 0.000 0.000
t 1.000 TRA 0.000 0.000 0.000
@rot_keys node 0 count 2 comps 3
t 0.000 ROT 1.000 0.000 0.000 0.000
t 1.000 ROT 0.707 0.707 0.000 0.000
@rot_keys node 1 count 2 comps 3
t 0.000 ROT 1.000 0.000 0.000 0.000
t 1.000 ROT 1.000 0.000 0.000 0.000
@sca_keys node 0 count 2 comps 3
t 0.000 SCA 1.000 1.000 1.000
t 1.000 SCA 1.000 1.000 1.000
@sca_keys node 1 count 2 comps 3
t 0.000 SCA 1.000 1.000 1.000
t 1.000 SCA 2.000 2.000 2.000
@bounding_radius 1.00
";

    #[test]
    fn test_parse_skinned_file() {
        let file = ApgFile::parse(SKINNED).unwrap();
        assert_eq!(file.header, "apg_export v0.1.0");
        assert_eq!(file.vert_count, 3);
        assert_eq!(file.positions()[1], [1.0, 0.0, 0.0]);
        assert!(file.block(VertexBlock::TexCoord).is_none());
        assert_eq!(file.bone_ids(), Some(vec![0, 1, 1]));

        let skeleton = file.skeleton.as_ref().unwrap();
        assert_eq!(skeleton.bone_count, 2);
        assert_eq!(skeleton.animation_count, 1);
        assert_eq!(skeleton.hierarchy, vec![(-1, 0), (0, 1)]);

        assert_eq!(file.animations.len(), 1);
        let anim = &file.animations[0];
        assert_eq!(anim.name, "Wave");
        assert_eq!(anim.duration, 1.0);
        assert_eq!(anim.tracks.len(), 6);
        let rot: Vec<_> = anim.tracks_for(KeyChannel::Rotation).collect();
        assert_eq!(rot.len(), 2);
        assert_eq!(rot[0].values.len(), 8);
        assert_eq!(rot[0].values[4], 0.707);

        assert_eq!(file.bounding_radius, Some(1.0));
    }

    #[test]
    fn test_parse_legacy_spelling() {
        let text = "\
@Anton's mesh format v.27DEC2014
@vert_count 2
@vp comps 3
0.00 0.00 0.00
1.00 2.00 3.00
@vt comps 2
0.000 0.000
1.000 1.000
@bounding radius 3.74
";
        let file = ApgFile::parse(text).unwrap();
        assert_eq!(file.vert_count, 2);
        assert_eq!(file.positions()[1], [1.0, 2.0, 3.0]);
        assert_eq!(file.block(VertexBlock::TexCoord).unwrap().values.len(), 4);
        assert_eq!(file.bounding_radius, Some(3.74));
    }

    #[test]
    fn test_values_may_span_lines() {
        let text = "@x\n@vert_count 2\n@vp_comps 3\n0 0\n0 1 1\n1\n";
        let file = ApgFile::parse(text).unwrap();
        assert_eq!(file.positions(), vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]]);
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(ApgFile::parse(""), Err(ParseError::MissingHeader));
        assert_eq!(
            ApgFile::parse("vert_count 3\n"),
            Err(ParseError::MissingHeader)
        );
    }

    #[test]
    fn test_block_before_vert_count() {
        let err = ApgFile::parse("@x\n@vp_comps 3\n0 0 0\n").unwrap_err();
        assert_eq!(err, ParseError::MissingVertCount { line: 2 });
    }

    #[test]
    fn test_truncated_block() {
        let err = ApgFile::parse("@x\n@vert_count 2\n@vp_comps 3\n0 0 0\n").unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_keys_without_animation() {
        let text = "@x\n@tra_keys node 0 count 1 comps 3\nt 0.0 TRA 0 0 0\n";
        assert_eq!(
            ApgFile::parse(text),
            Err(ParseError::OrphanKeys { line: 2 })
        );
    }

    #[test]
    fn test_unknown_directive() {
        let err = ApgFile::parse("@x\n@vert_count 1\n@vq_comps 3\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownDirective { line: 3, .. }));
    }

    #[test]
    fn test_block_size_overflow() {
        let text = "@x\n@vert_count 4611686018427387904\n@vp_comps 8\n0 0 0\n";
        let err = ApgFile::parse(text).unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_huge_counts_hit_eof() {
        let text = "@x\n@vert_count 1000000000000\n@vp_comps 3\n0 0 0\n";
        assert!(matches!(
            ApgFile::parse(text),
            Err(ParseError::UnexpectedEof { .. })
        ));

        let text = "@x\n@hierarchy nodes 18446744073709551615\nparent -1 bone_id 0\n";
        assert!(matches!(
            ApgFile::parse(text),
            Err(ParseError::UnexpectedEof { .. })
        ));

        let text = "@x\n@animation name a duration 1.0\n\
                    @tra_keys node 0 count 18446744073709551615 comps 3\n";
        assert!(matches!(
            ApgFile::parse(text),
            Err(ParseError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_zero_components_rejected() {
        let err = ApgFile::parse("@x\n@vert_count 5\n@vp_comps 0\n").unwrap_err();
        assert!(matches!(err, ParseError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_two_component_positions() {
        let text = "@x\n@vert_count 2\n@vp comps 2\n1 2\n3 4\n";
        let file = ApgFile::parse(text).unwrap();
        assert_eq!(file.positions(), vec![[1.0, 2.0, 0.0], [3.0, 4.0, 0.0]]);
    }
}
