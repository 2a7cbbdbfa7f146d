//! Procedural meshes and the embedded rock model
//!
//! Everything here is CPU-side data; the rendering backend turns a
//! [`MeshData`] into GPU buffers once at startup.

use common::MeshVertex;
use rand::Rng;
use std::f32::consts::TAU;
use thiserror::Error;

use crate::backend::Primitive;

/// CPU-side geometry ready for upload.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Option<Vec<u32>>,
    pub primitive: Primitive,
}

impl MeshData {
    /// Number of elements a draw covers: indices when indexed, vertices otherwise.
    pub fn element_count(&self) -> u32 {
        match &self.indices {
            Some(indices) => indices.len() as u32,
            None => self.vertices.len() as u32,
        }
    }
}

/// Unit cube spanning `[-1, 1]³`: 24 vertices, 36 indices, untextured.
pub fn build_cube() -> MeshData {
    // Four corners per face, counter-clockwise seen from outside.
    const FACES: [([f32; 3], [[f32; 3]; 4]); 6] = [
        ([0.0, 0.0, 1.0], [[-1.0, -1.0, 1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0]]),
        ([0.0, 0.0, -1.0], [[-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, -1.0, -1.0]]),
        ([0.0, 1.0, 0.0], [[-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0]]),
        ([0.0, -1.0, 0.0], [[-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [-1.0, -1.0, 1.0]]),
        ([1.0, 0.0, 0.0], [[1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0]]),
        ([-1.0, 0.0, 0.0], [[-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [-1.0, 1.0, -1.0]]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, corners) in FACES {
        let base = vertices.len() as u32;
        for corner in corners {
            vertices.push(MeshVertex::new(corner, normal, [0.0, 0.0]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData {
        vertices,
        indices: Some(indices),
        primitive: Primitive::Triangles,
    }
}

/// Radial extent of the star shell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarShell {
    pub inner_radius: f32,
    pub thickness: f32,
}

/// `count` points uniformly distributed over solid angle inside the shell.
pub fn build_starfield<R: Rng + ?Sized>(count: usize, shell: StarShell, rng: &mut R) -> MeshData {
    let vertices = (0..count)
        .map(|_| {
            let r = shell.inner_radius + rng.gen::<f32>() * shell.thickness;
            let theta = rng.gen::<f32>() * TAU;
            // acos(2u - 1) keeps the density uniform per steradian
            let phi = (2.0 * rng.gen::<f32>() - 1.0).clamp(-1.0, 1.0).acos();

            MeshVertex::point([
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            ])
        })
        .collect();

    MeshData {
        vertices,
        indices: None,
        primitive: Primitive::Points,
    }
}

/// Failures while parsing embedded model text.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("line {line}: malformed number {token:?}")]
    BadNumber { line: usize, token: String },
    #[error("line {line}: `{directive}` needs {expected} components")]
    MissingComponents {
        line: usize,
        directive: &'static str,
        expected: usize,
    },
    #[error("line {line}: malformed face reference {token:?}")]
    BadReference { line: usize, token: String },
    #[error("line {line}: {kind} index {index} out of range (1..={available})")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: usize,
        available: usize,
    },
    #[error("line {line}: face needs at least 3 vertices, got {count}")]
    DegenerateFace { line: usize, count: usize },
    #[error("model contains no faces")]
    Empty,
}

/// Parse the `v`/`vt`/`vn`/`f` subset of the OBJ text format into a flat
/// triangle list.
///
/// Indices are 1-based. Faces with more than three corners are fanned from
/// their first corner. Corners without a texture or normal reference get
/// `(0, 0)` and `(0, 1, 0)`. Other directives are ignored.
pub fn parse_model(text: &str) -> Result<MeshData, ModelError> {
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut tex_coords: Vec<[f32; 2]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut vertices = Vec::new();

    for (number, raw) in text.lines().enumerate() {
        let line = number + 1;
        let mut tokens = raw.split_whitespace();
        let Some(directive) = tokens.next() else {
            continue;
        };

        match directive {
            "v" => positions.push(parse_floats::<3>(line, "v", tokens)?),
            "vt" => tex_coords.push(parse_floats::<2>(line, "vt", tokens)?),
            "vn" => normals.push(parse_floats::<3>(line, "vn", tokens)?),
            "f" => {
                let corners = tokens
                    .map(|token| {
                        let corner = FaceCorner::parse(line, token)?;
                        corner.resolve(line, &positions, &tex_coords, &normals)
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                if corners.len() < 3 {
                    return Err(ModelError::DegenerateFace {
                        line,
                        count: corners.len(),
                    });
                }

                for i in 1..corners.len() - 1 {
                    vertices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if vertices.is_empty() {
        return Err(ModelError::Empty);
    }

    Ok(MeshData {
        vertices,
        indices: None,
        primitive: Primitive::Triangles,
    })
}

fn parse_floats<'a, const N: usize>(
    line: usize,
    directive: &'static str,
    mut tokens: impl Iterator<Item = &'a str>,
) -> Result<[f32; N], ModelError> {
    let mut out = [0.0; N];
    for slot in out.iter_mut() {
        let token = tokens.next().ok_or(ModelError::MissingComponents {
            line,
            directive,
            expected: N,
        })?;
        *slot = token.parse().map_err(|_| ModelError::BadNumber {
            line,
            token: token.to_string(),
        })?;
    }
    Ok(out)
}

/// One `p`, `p/t`, `p//n` or `p/t/n` face token.
struct FaceCorner {
    position: usize,
    tex_coord: Option<usize>,
    normal: Option<usize>,
}

impl FaceCorner {
    fn parse(line: usize, token: &str) -> Result<Self, ModelError> {
        let bad = || ModelError::BadReference {
            line,
            token: token.to_string(),
        };
        let index = |part: Option<&str>| -> Result<Option<usize>, ModelError> {
            match part {
                None | Some("") => Ok(None),
                Some(s) => s.parse::<usize>().map(Some).map_err(|_| bad()),
            }
        };

        let mut parts = token.split('/');
        let position = index(parts.next())?.ok_or_else(|| bad())?;
        let tex_coord = index(parts.next())?;
        let normal = index(parts.next())?;
        if parts.next().is_some() {
            return Err(bad());
        }

        Ok(Self {
            position,
            tex_coord,
            normal,
        })
    }

    fn resolve(
        &self,
        line: usize,
        positions: &[[f32; 3]],
        tex_coords: &[[f32; 2]],
        normals: &[[f32; 3]],
    ) -> Result<MeshVertex, ModelError> {
        let position = lookup(line, "position", positions, self.position)?;
        let uv = match self.tex_coord {
            Some(index) => lookup(line, "texture", tex_coords, index)?,
            None => [0.0, 0.0],
        };
        let normal = match self.normal {
            Some(index) => lookup(line, "normal", normals, index)?,
            None => MeshVertex::DEFAULT_NORMAL,
        };
        Ok(MeshVertex::new(position, normal, uv))
    }
}

fn lookup<T: Copy>(line: usize, kind: &'static str, items: &[T], index: usize) -> Result<T, ModelError> {
    index
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .copied()
        .ok_or(ModelError::IndexOutOfRange {
            line,
            kind,
            index,
            available: items.len(),
        })
}

/// Lumpy icosahedron used for every asteroid.
pub const ROCK_MODEL: &str = "
v -0.525731 0.000000 0.850651
v 0.483673 0.000000 0.782599
v -0.567789 0.000000 -0.918703
v 0.499444 0.000000 -0.808118
v 0.000000 0.893184 0.552018
v 0.000000 0.765586 -0.473158
v 0.000000 -0.935716 0.578304
v 0.000000 -0.825131 -0.509959
v 0.876171 0.541503 0.000000
v -0.799612 0.494187 0.000000
v 0.901690 -0.557275 0.000000
v -0.842144 -0.520474 0.000000
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vn -0.525731 0.000000 0.850651
vn 0.525731 0.000000 0.850651
vn -0.525731 0.000000 -0.850651
vn 0.525731 0.000000 -0.850651
vn 0.000000 0.850651 0.525731
vn 0.000000 0.850651 -0.525731
vn 0.000000 -0.850651 0.525731
vn 0.000000 -0.850651 -0.525731
vn 0.850651 0.525731 0.000000
vn -0.850651 0.525731 0.000000
vn 0.850651 -0.525731 0.000000
vn -0.850651 -0.525731 0.000000
f 1/1/1 2/2/2 5/3/5
f 1/1/1 5/3/5 10/4/10
f 10/1/10 5/2/5 6/3/6
f 5/1/5 9/3/9 6/4/6
f 5/1/5 2/2/2 9/3/9
f 9/1/9 2/3/2 11/4/11
f 9/1/9 11/2/11 4/3/4
f 6/1/6 9/3/9 4/4/4
f 6/1/6 4/2/4 3/3/3
f 3/1/3 4/3/4 8/4/8
f 8/1/8 4/2/4 11/3/11
f 8/1/8 11/3/11 7/4/7
f 8/1/8 7/2/7 12/3/12
f 12/1/12 7/3/7 1/4/1
f 1/1/1 7/2/7 2/3/2
f 7/1/7 11/3/11 2/4/2
f 10/1/10 12/2/12 1/3/1
f 10/1/10 3/3/3 12/4/12
f 10/1/10 6/2/6 3/3/3
f 8/1/8 12/3/12 3/4/3
";

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use rand::{rngs::StdRng, SeedableRng};

    /// Triangles as vertex triples, resolving indices if present.
    fn triangles(mesh: &MeshData) -> Vec<[MeshVertex; 3]> {
        match &mesh.indices {
            Some(indices) => indices
                .chunks_exact(3)
                .map(|t| {
                    [
                        mesh.vertices[t[0] as usize],
                        mesh.vertices[t[1] as usize],
                        mesh.vertices[t[2] as usize],
                    ]
                })
                .collect(),
            None => mesh.vertices.chunks_exact(3).map(|t| [t[0], t[1], t[2]]).collect(),
        }
    }

    const SHELL: StarShell = StarShell {
        inner_radius: 55.0,
        thickness: 75.0,
    };

    #[test]
    fn cube_has_24_vertices_and_36_indices() {
        let cube = build_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.as_ref().map(Vec::len), Some(36));
        assert_eq!(cube.element_count(), 36);
        assert!(cube.vertices.iter().all(|v| v.uv == [0.0, 0.0]));
    }

    #[test]
    fn cube_triangles_face_outward() {
        for [a, b, c] in triangles(&build_cube()) {
            let (a, b, c) = (Vec3::from(a.position), Vec3::from(b.position), Vec3::from(c.position));
            let winding = (b - a).cross(c - a);
            let centroid = (a + b + c) / 3.0;
            assert!(winding.dot(centroid) > 0.0);
        }
    }

    #[test]
    fn starfield_points_lie_in_shell() {
        let mut rng = StdRng::seed_from_u64(7);
        let stars = build_starfield(2800, SHELL, &mut rng);
        assert_eq!(stars.vertices.len(), 2800);
        assert_eq!(stars.primitive, Primitive::Points);
        for v in &stars.vertices {
            let r = Vec3::from(v.position).length();
            assert!(r >= SHELL.inner_radius - 1e-3, "{r}");
            assert!(r <= SHELL.inner_radius + SHELL.thickness + 1e-3, "{r}");
        }
    }

    #[test]
    fn starfield_covers_both_hemispheres() {
        let mut rng = StdRng::seed_from_u64(11);
        let stars = build_starfield(1000, SHELL, &mut rng);
        let above = stars.vertices.iter().filter(|v| v.position[2] > 0.0).count();
        assert!(above > 400 && above < 600, "{above}");
    }

    #[test]
    fn empty_starfield() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(build_starfield(0, SHELL, &mut rng).vertices.is_empty());
    }

    #[test]
    fn fan_triangulates_polygons() {
        let text = "
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            v -1 1 0
            f 1 2 3 4 5
        ";
        let mesh = parse_model(text).unwrap();
        let tris = triangles(&mesh);
        assert_eq!(tris.len(), 3);
        for triangle in &tris {
            assert_eq!(triangle[0].position, [0.0, 0.0, 0.0]);
        }
        assert_eq!(tris[2][1].position, [0.0, 1.0, 0.0]);
        assert_eq!(tris[2][2].position, [-1.0, 1.0, 0.0]);
    }

    #[test]
    fn missing_channels_get_defaults() {
        let mesh = parse_model("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n").unwrap();
        assert!(mesh
            .vertices
            .iter()
            .all(|v| v.uv == [0.0, 0.0] && v.normal == [0.0, 1.0, 0.0]));
    }

    #[test]
    fn normal_only_references() {
        let mesh = parse_model("v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1//1 2//1 3//1\n").unwrap();
        assert!(mesh.vertices.iter().all(|v| v.normal == [0.0, 0.0, 1.0]));
        assert!(mesh.vertices.iter().all(|v| v.uv == [0.0, 0.0]));
    }

    #[test]
    fn out_of_range_index_fails() {
        let err = parse_model("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert_eq!(
            err,
            ModelError::IndexOutOfRange {
                line: 3,
                kind: "position",
                index: 3,
                available: 2
            }
        );
    }

    #[test]
    fn zero_index_fails() {
        let err = parse_model("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 0 1 2\n").unwrap_err();
        assert!(matches!(err, ModelError::IndexOutOfRange { index: 0, .. }));
    }

    #[test]
    fn texture_reference_without_vt_lines_fails() {
        let err = parse_model("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1/1 2/1 3/1\n").unwrap_err();
        assert!(matches!(err, ModelError::IndexOutOfRange { kind: "texture", .. }));
    }

    #[test]
    fn malformed_lines_fail() {
        assert!(matches!(
            parse_model("v 0 zero 0\n"),
            Err(ModelError::BadNumber { line: 1, .. })
        ));
        assert!(matches!(
            parse_model("vt 0.5\n"),
            Err(ModelError::MissingComponents { directive: "vt", .. })
        ));
        assert!(matches!(
            parse_model("v 0 0 0\nv 1 0 0\nf 1 2\n"),
            Err(ModelError::DegenerateFace { line: 3, count: 2 })
        ));
        assert!(matches!(
            parse_model("v 0 0 0\nf a b c\n"),
            Err(ModelError::BadReference { .. })
        ));
        assert_eq!(parse_model("# nothing\nv 0 0 0\n"), Err(ModelError::Empty));
    }

    #[test]
    fn rock_model_is_closed_and_outward() {
        let rock = parse_model(ROCK_MODEL).unwrap();
        assert_eq!(rock.vertices.len(), 60);
        for [a, b, c] in triangles(&rock) {
            let (a, b, c) = (Vec3::from(a.position), Vec3::from(b.position), Vec3::from(c.position));
            let centroid = (a + b + c) / 3.0;
            assert!((b - a).cross(c - a).dot(centroid) > 0.0);
        }
    }
}
