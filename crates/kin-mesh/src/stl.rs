//! STL (Stereolithography) codec, binary and ASCII.
//!
//! Binary layout:
//!
//! ```text
//! UINT8[80]    – header (ignored on read, fixed tag on write)
//! UINT32       – number of triangles
//! foreach triangle
//!     REAL32[3] – normal
//!     REAL32[3] – vertex 1
//!     REAL32[3] – vertex 2
//!     REAL32[3] – vertex 3
//!     UINT16    – attribute byte count (written as 0)
//! end
//! ```
//!
//! ASCII files start with `solid` and list `facet normal` / `vertex`
//! records. The loader auto-detects the variant.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use kin_types::MeshData;

use crate::error::{MeshError, Result};

/// STL binary header size in bytes.
const HEADER_SIZE: usize = 80;

/// Size of one triangle record in binary STL.
const TRIANGLE_SIZE: usize = 50;

/// Load a mesh from an STL file, auto-detecting binary vs ASCII.
///
/// STL is a triangle soup: vertices are not shared, so the result carries
/// three vertices per face.
///
/// # Errors
///
/// [`MeshError::FileNotFound`] if the path does not exist, or
/// [`MeshError::InvalidContent`] / [`MeshError::UnexpectedEof`] for
/// malformed files.
pub fn load_stl<P: AsRef<Path>>(path: P) -> Result<MeshData> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MeshError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            MeshError::Io(e)
        }
    })?;

    if bytes.len() < 6 {
        return Err(MeshError::invalid_content("file too small to be valid STL"));
    }

    if looks_ascii(&bytes) {
        parse_ascii(&bytes)
    } else {
        parse_binary(&bytes)
    }
}

/// ASCII files start with "solid", but so do some binary headers; require
/// an actual "facet" keyword before treating the file as text.
fn looks_ascii(bytes: &[u8]) -> bool {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    head.trim_start().starts_with("solid") && head.contains("facet")
}

fn parse_binary(bytes: &[u8]) -> Result<MeshData> {
    if bytes.len() < HEADER_SIZE + 4 {
        return Err(MeshError::UnexpectedEof {
            position: bytes.len() as u64,
        });
    }
    let count = u32::from_le_bytes([
        bytes[HEADER_SIZE],
        bytes[HEADER_SIZE + 1],
        bytes[HEADER_SIZE + 2],
        bytes[HEADER_SIZE + 3],
    ]) as usize;

    let expected = HEADER_SIZE + 4 + count * TRIANGLE_SIZE;
    if bytes.len() < expected {
        return Err(MeshError::UnexpectedEof {
            position: bytes.len() as u64,
        });
    }

    let mut mesh = MeshData::empty();
    let mut offset = HEADER_SIZE + 4;
    for face in 0..count {
        let normal = read_vec3_f32(bytes, offset);
        for corner in 0..3 {
            let v = read_vec3_f32(bytes, offset + 12 + corner * 12);
            mesh.vertices.push(Point3::new(v.x, v.y, v.z));
            mesh.normals.push(normal);
        }
        let base = (face * 3) as u32;
        mesh.faces.push([base, base + 1, base + 2]);
        offset += TRIANGLE_SIZE;
    }
    Ok(mesh)
}

fn read_vec3_f32(bytes: &[u8], offset: usize) -> Vector3<f64> {
    let f = |o: usize| {
        f64::from(f32::from_le_bytes([
            bytes[o],
            bytes[o + 1],
            bytes[o + 2],
            bytes[o + 3],
        ]))
    };
    Vector3::new(f(offset), f(offset + 4), f(offset + 8))
}

fn parse_ascii(bytes: &[u8]) -> Result<MeshData> {
    let text = std::str::from_utf8(bytes)
        .map_err(|e| MeshError::invalid_content(format!("not valid UTF-8: {e}")))?;

    let mut mesh = MeshData::empty();
    let mut normal = Vector3::zeros();
    let mut corners: Vec<Point3<f64>> = Vec::with_capacity(3);

    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("facet") => {
                // "facet normal ni nj nk"
                let _ = tokens.next();
                normal = parse_three(&mut tokens, "facet normal")?.coords;
            }
            Some("vertex") => {
                corners.push(parse_three(&mut tokens, "vertex")?);
            }
            Some("endfacet") => {
                if corners.len() != 3 {
                    return Err(MeshError::invalid_content(format!(
                        "facet with {} vertices",
                        corners.len()
                    )));
                }
                let base = mesh.vertices.len() as u32;
                for corner in corners.drain(..) {
                    mesh.vertices.push(corner);
                    mesh.normals.push(normal);
                }
                mesh.faces.push([base, base + 1, base + 2]);
            }
            _ => {}
        }
    }

    if !corners.is_empty() {
        return Err(MeshError::invalid_content("unterminated facet"));
    }
    Ok(mesh)
}

fn parse_three<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    context: &str,
) -> Result<Point3<f64>> {
    let mut out = [0.0f64; 3];
    for slot in &mut out {
        let token = tokens
            .next()
            .ok_or_else(|| MeshError::invalid_content(format!("truncated {context}")))?;
        *slot = token.parse()?;
    }
    Ok(Point3::new(out[0], out[1], out[2]))
}

/// Save a mesh as STL.
///
/// Output is deterministic for a given mesh: the binary header is a fixed
/// tag and attribute bytes are zero, so writing the same mesh twice
/// produces identical bytes.
///
/// # Errors
///
/// I/O errors from the destination.
pub fn save_stl<P: AsRef<Path>>(mesh: &MeshData, path: P, binary: bool) -> Result<()> {
    let file = fs::File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);
    if binary {
        write_binary(mesh, &mut w)?;
    } else {
        write_ascii(mesh, &mut w)?;
    }
    w.flush()?;
    Ok(())
}

fn face_normal(mesh: &MeshData, face: &[u32; 3]) -> Vector3<f64> {
    // Prefer a stored normal; fall back to the face plane.
    if let Some(n) = mesh.normals.get(face[0] as usize)
        && n.norm() > 0.0
    {
        return *n;
    }
    let [a, b, c] = face.map(|i| mesh.vertices[i as usize]);
    let n = (b - a).cross(&(c - a));
    let len = n.norm();
    if len > 0.0 { n / len } else { Vector3::zeros() }
}

fn write_binary<W: Write>(mesh: &MeshData, w: &mut W) -> Result<()> {
    let mut header = [0u8; HEADER_SIZE];
    let tag = b"kinconv binary STL";
    header[..tag.len()].copy_from_slice(tag);
    w.write_all(&header)?;
    w.write_all(&(mesh.faces.len() as u32).to_le_bytes())?;

    for face in &mesh.faces {
        let normal = face_normal(mesh, face);
        write_vec3_f32(w, normal.x, normal.y, normal.z)?;
        for &i in face {
            let v = mesh.vertices[i as usize];
            write_vec3_f32(w, v.x, v.y, v.z)?;
        }
        w.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

fn write_vec3_f32<W: Write>(w: &mut W, x: f64, y: f64, z: f64) -> Result<()> {
    for v in [x, y, z] {
        w.write_all(&(v as f32).to_le_bytes())?;
    }
    Ok(())
}

fn write_ascii<W: Write>(mesh: &MeshData, w: &mut W) -> Result<()> {
    writeln!(w, "solid kinconv")?;
    for face in &mesh.faces {
        let n = face_normal(mesh, face);
        writeln!(w, "  facet normal {} {} {}", n.x, n.y, n.z)?;
        writeln!(w, "    outer loop")?;
        for &i in face {
            let v = mesh.vertices[i as usize];
            writeln!(w, "      vertex {} {} {}", v.x, v.y, v.z)?;
        }
        writeln!(w, "    endloop")?;
        writeln!(w, "  endfacet")?;
    }
    writeln!(w, "endsolid kinconv")?;
    Ok(())
}
