//! Wavefront OBJ scene
//!
//! Faces keep their original corner count (quads stay quads). Supports
//! per-corner `vt`, `vn`, smoothing groups (`s`) and the common
//! `v x y z r g b` vertex color extension. Normals missing from the file are
//! generated, and tangents are generated whenever the mesh has UVs.

use anyhow::{bail, Context, Result};
use glam::{Vec2, Vec3};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::host::{Action, Armature, CornerLayer, HostScene, MeshCopy, Pose, SourceFace, SourceVertex};

/// A scene holding a single OBJ mesh
#[derive(Debug, Clone)]
pub struct ObjScene {
    mesh: MeshCopy,
}

/// One parsed `f` corner: vertex, optional vt, optional vn (0-based)
type CornerRef = (usize, Option<usize>, Option<usize>);

impl ObjScene {
    /// Load an OBJ file; the mesh is named after the first `o` line or the
    /// file stem.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open OBJ: {:?}", path))?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("mesh");
        Self::parse(BufReader::new(file), stem)
            .with_context(|| format!("Failed to parse OBJ: {:?}", path))
    }

    pub fn parse<R: BufRead>(reader: R, default_name: &str) -> Result<Self> {
        let mut name: Option<String> = None;
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut colors: Vec<Option<[f32; 3]>> = Vec::new();
        let mut tex_coords: Vec<[f32; 2]> = Vec::new();
        let mut normals_raw: Vec<[f32; 3]> = Vec::new();
        let mut faces: Vec<(Vec<CornerRef>, bool)> = Vec::new();
        let mut smooth = false;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            let line_no = line_no + 1;

            match parts[0] {
                "o" if name.is_none() && parts.len() >= 2 => {
                    name = Some(parts[1..].join(" "));
                }
                "v" => {
                    let values = parse_floats(&parts[1..], line_no)?;
                    match values.len() {
                        3 | 4 => {
                            positions.push([values[0], values[1], values[2]]);
                            colors.push(None);
                        }
                        6 | 7 => {
                            positions.push([values[0], values[1], values[2]]);
                            colors.push(Some([values[3], values[4], values[5]]));
                        }
                        n => bail!("line {}: 'v' with {} values", line_no, n),
                    }
                }
                "vt" => {
                    let values = parse_floats(&parts[1..], line_no)?;
                    if values.len() < 2 {
                        bail!("line {}: 'vt' needs at least 2 values", line_no);
                    }
                    tex_coords.push([values[0], values[1]]);
                }
                "vn" => {
                    let values = parse_floats(&parts[1..], line_no)?;
                    if values.len() != 3 {
                        bail!("line {}: 'vn' needs 3 values", line_no);
                    }
                    normals_raw.push([values[0], values[1], values[2]]);
                }
                "s" => {
                    smooth = !matches!(parts.get(1).copied(), Some("off") | Some("0") | None);
                }
                "f" => {
                    let corners = parts[1..]
                        .iter()
                        .map(|c| {
                            parse_obj_vertex(c)
                                .with_context(|| format!("line {}: bad face corner '{}'", line_no, c))
                        })
                        .collect::<Result<Vec<_>>>()?;
                    for &(_, vt, vn) in &corners {
                        if vt.is_some_and(|i| i >= tex_coords.len()) {
                            bail!("line {}: texture coordinate index out of range", line_no);
                        }
                        if vn.is_some_and(|i| i >= normals_raw.len()) {
                            bail!("line {}: normal index out of range", line_no);
                        }
                    }
                    faces.push((corners, smooth));
                }
                _ => {}
            }
        }

        if positions.is_empty() {
            bail!("No vertices found in OBJ file");
        }

        let name = name.unwrap_or_else(|| default_name.to_string());
        let mesh = build_mesh_copy(name, &positions, &colors, &tex_coords, &normals_raw, &faces)?;
        Ok(Self { mesh })
    }

    pub fn mesh(&self) -> &MeshCopy {
        &self.mesh
    }
}

impl HostScene for ObjScene {
    fn mesh_copy(&mut self) -> Option<MeshCopy> {
        Some(self.mesh.clone())
    }

    fn armature(&self) -> Option<Armature> {
        None
    }

    fn first_action(&self) -> Option<Action> {
        None
    }

    fn evaluate_at_frame(&mut self, _frame: i32) -> crate::error::Result<Pose> {
        Ok(Pose::default())
    }
}

fn build_mesh_copy(
    name: String,
    positions: &[[f32; 3]],
    colors: &[Option<[f32; 3]>],
    tex_coords: &[[f32; 2]],
    normals_raw: &[[f32; 3]],
    faces: &[(Vec<CornerRef>, bool)],
) -> Result<MeshCopy> {
    let with_uv = faces.iter().filter(|(c, _)| c.iter().all(|r| r.1.is_some())).count();
    let has_uvs = !faces.is_empty() && with_uv == faces.len();
    if with_uv != 0 && !has_uvs {
        bail!("Some faces have texture coordinates and some do not");
    }

    // Flat normals (Newell), unnormalized for area weighting
    let face_normals: Vec<Vec3> = faces
        .iter()
        .map(|(corners, _)| newell_normal(corners, positions))
        .collect();

    // Smooth normals: file normals where given, otherwise area-weighted face normals
    let mut file_sums = vec![Vec3::ZERO; positions.len()];
    let mut face_sums = vec![Vec3::ZERO; positions.len()];
    for ((corners, _), &n) in faces.iter().zip(&face_normals) {
        for &(v, _, vn) in corners {
            if v >= positions.len() {
                continue;
            }
            if let Some(vn) = vn {
                file_sums[v] += Vec3::from(normals_raw[vn]);
            }
            face_sums[v] += n;
        }
    }
    let smooth_normals: Vec<Option<Vec3>> = file_sums
        .iter()
        .zip(&face_sums)
        .map(|(&file, &face)| {
            let n = if file != Vec3::ZERO { file } else { face };
            n.try_normalize()
        })
        .collect();

    let vertices = positions
        .iter()
        .zip(&smooth_normals)
        .map(|(&p, n)| SourceVertex {
            position: p,
            normal: n.map(|n| n.to_array()),
            weights: Vec::new(),
        })
        .collect();

    let source_faces: Vec<SourceFace> = faces
        .iter()
        .zip(&face_normals)
        .map(|((corners, smooth), n)| {
            let indices: Vec<u32> = corners.iter().map(|c| c.0 as u32).collect();
            let normal = n.normalize_or_zero().to_array();
            if *smooth {
                SourceFace::smooth(&indices, normal)
            } else {
                SourceFace::flat(&indices, normal)
            }
        })
        .collect();

    let uv_layer = has_uvs.then(|| {
        CornerLayer::new(
            "UVMap",
            faces
                .iter()
                .map(|(corners, _)| {
                    corners
                        .iter()
                        .map(|c| c.1.map_or([0.0, 0.0], |t| tex_coords[t]))
                        .collect()
                })
                .collect(),
        )
    });

    let color_count = colors.iter().filter(|c| c.is_some()).count();
    let color_layer = if color_count == colors.len() {
        Some(CornerLayer::new(
            "Col",
            faces
                .iter()
                .map(|(corners, _)| {
                    corners
                        .iter()
                        .map(|c| colors.get(c.0).copied().flatten().unwrap_or([1.0; 3]))
                        .collect()
                })
                .collect(),
        ))
    } else {
        if color_count > 0 {
            tracing::warn!(
                "Only {} of {} vertices have colors, ignoring vertex colors",
                color_count,
                colors.len()
            );
        }
        None
    };

    let tangents = uv_layer
        .as_ref()
        .map(|uvs| generate_tangents(positions, &smooth_normals, &source_faces, uvs));

    Ok(MeshCopy {
        name,
        vertices,
        faces: source_faces,
        uv_layer,
        color_layer,
        tangents,
    })
}

fn newell_normal(corners: &[CornerRef], positions: &[[f32; 3]]) -> Vec3 {
    let mut normal = Vec3::ZERO;
    for (i, &(a, _, _)) in corners.iter().enumerate() {
        let (b, _, _) = corners[(i + 1) % corners.len()];
        let (Some(&pa), Some(&pb)) = (positions.get(a), positions.get(b)) else {
            continue;
        };
        let (pa, pb) = (Vec3::from(pa), Vec3::from(pb));
        normal += Vec3::new(
            (pa.y - pb.y) * (pa.z + pb.z),
            (pa.z - pb.z) * (pa.x + pb.x),
            (pa.x - pb.x) * (pa.y + pb.y),
        );
    }
    normal * 0.5
}

/// Per-vertex tangents from UV derivatives, Gram-Schmidt against the smooth
/// normal. `w` is the bitangent sign.
fn generate_tangents(
    positions: &[[f32; 3]],
    normals: &[Option<Vec3>],
    faces: &[SourceFace],
    uvs: &CornerLayer<[f32; 2]>,
) -> Vec<[f32; 4]> {
    let mut tan = vec![Vec3::ZERO; positions.len()];
    let mut bitan = vec![Vec3::ZERO; positions.len()];

    for (face_index, face) in faces.iter().enumerate() {
        let corners = face.vertices.len();
        if corners < 3 {
            continue;
        }
        for i in 1..corners - 1 {
            let slots = [0, i, i + 1];
            let verts = slots.map(|s| face.vertices[s] as usize);
            if verts.iter().any(|&v| v >= positions.len()) {
                continue;
            }
            let p = verts.map(|v| Vec3::from(positions[v]));
            let t = slots.map(|s| Vec2::from(uvs.get(face_index, s).unwrap_or_default()));

            let (e1, e2) = (p[1] - p[0], p[2] - p[0]);
            let (d1, d2) = (t[1] - t[0], t[2] - t[0]);
            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let sdir = (e1 * d2.y - e2 * d1.y) * r;
            let tdir = (e2 * d1.x - e1 * d2.x) * r;
            for v in verts {
                tan[v] += sdir;
                bitan[v] += tdir;
            }
        }
    }

    (0..positions.len())
        .map(|v| {
            let n = normals[v].unwrap_or(Vec3::Z);
            let t = (tan[v] - n * n.dot(tan[v]))
                .try_normalize()
                .unwrap_or_else(|| n.any_orthonormal_vector());
            let w = if n.cross(t).dot(bitan[v]) < 0.0 { -1.0 } else { 1.0 };
            [t.x, t.y, t.z, w]
        })
        .collect()
}

fn parse_floats(tokens: &[&str], line_no: usize) -> Result<Vec<f32>> {
    tokens
        .iter()
        .map(|t| {
            t.parse::<f32>()
                .with_context(|| format!("line {}: invalid number '{}'", line_no, t))
        })
        .collect()
}

/// Parse OBJ vertex reference: "v", "v/vt", "v/vt/vn", or "v//vn"
fn parse_obj_vertex(s: &str) -> Option<CornerRef> {
    let parts: Vec<&str> = s.split('/').collect();

    let vi = parts.first()?.parse::<usize>().ok()?.checked_sub(1)?; // OBJ indices are 1-based

    let index = |i: usize| -> Option<Option<usize>> {
        match parts.get(i) {
            None | Some(&"") => Some(None),
            Some(s) => s.parse::<usize>().ok()?.checked_sub(1).map(Some),
        }
    };

    Some((vi, index(1)?, index(2)?))
}
