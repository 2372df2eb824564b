//! Collada (`.dae`) codec for the triangle-geometry subset.
//!
//! Reads `library_geometries` / `mesh` / `source` / `triangles` with
//! `VERTEX` and `NORMAL` inputs at arbitrary offsets; everything else in
//! the document (animations, controllers, effects) is ignored. Writing
//! emits a minimal COLLADA 1.4.1 document with one geometry.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use nalgebra::{Point3, Vector3};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::warn;

use kin_types::MeshData;

use crate::AssetHandler;
use crate::error::{MeshError, Result};

/// One `<triangles>` block: its inputs and flattened `<p>` indices.
#[derive(Debug, Default)]
struct TriangleBlock {
    /// (semantic, source id without '#', offset)
    inputs: Vec<(String, String, usize)>,
    indices: Vec<usize>,
    /// Per-face corner counts from a polylist's `<vcount>`; empty for
    /// `<triangles>` blocks.
    vcount: Vec<usize>,
}

/// One `<geometry>` element.
#[derive(Debug, Default)]
struct Geometry {
    id: String,
    name: String,
    triangles: Vec<TriangleBlock>,
}

/// Raw document content relevant to triangle extraction.
#[derive(Debug, Default)]
struct Document {
    /// float_array / source id to float data.
    arrays: HashMap<String, Vec<f64>>,
    /// vertices element id to its POSITION source id.
    vertices: HashMap<String, String>,
    geometries: Vec<Geometry>,
    /// Image URIs from library_images, in document order.
    images: Vec<String>,
}

/// Load a mesh from a Collada file.
///
/// `submesh` selects a single geometry by id or name; `None` merges all
/// geometries in document order. Texture bytes for the first referenced
/// image are fetched through `assets` when a handler is supplied.
///
/// # Errors
///
/// [`MeshError::FileNotFound`], [`MeshError::XmlParse`] for malformed XML,
/// [`MeshError::SubmeshNotFound`] if the requested geometry is absent.
pub fn load_collada<P: AsRef<Path>>(
    path: P,
    submesh: Option<&str>,
    assets: Option<&AssetHandler>,
) -> Result<MeshData> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            MeshError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            MeshError::Io(e)
        }
    })?;
    load_collada_str(&xml, submesh, assets)
}

/// Load a mesh from Collada XML text. See [`load_collada`].
///
/// # Errors
///
/// Same as [`load_collada`], minus file-system failures.
pub fn load_collada_str(
    xml: &str,
    submesh: Option<&str>,
    assets: Option<&AssetHandler>,
) -> Result<MeshData> {
    let doc = parse_document(xml)?;

    let selected: Vec<&Geometry> = match submesh {
        Some(name) => {
            let found = doc
                .geometries
                .iter()
                .find(|g| g.id == name || g.name == name)
                .ok_or_else(|| MeshError::SubmeshNotFound {
                    name: name.to_string(),
                })?;
            vec![found]
        }
        None => doc.geometries.iter().collect(),
    };

    let mut mesh = MeshData::empty();
    for geometry in selected {
        for block in &geometry.triangles {
            append_triangles(&doc, block, &mut mesh)?;
        }
    }

    if let Some(uri) = doc.images.first() {
        match assets {
            Some(handler) => {
                mesh.texture = Some(handler(uri)?);
            }
            None => warn!(uri = %uri, "document references an image but no asset handler was supplied"),
        }
    }

    Ok(mesh)
}

fn parse_document(xml: &str) -> Result<Document> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut doc = Document::default();
    let mut current_source: Option<String> = None;
    let mut current_array: Option<String> = None;
    let mut current_vertices: Option<String> = None;
    let mut current_geometry: Option<Geometry> = None;
    let mut in_triangles = false;
    let mut pending_p = false;
    let mut pending_vcount = false;
    let mut in_image = false;
    let mut pending_init_from = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                match e.local_name().as_ref() {
                    b"geometry" => {
                        current_geometry = Some(Geometry {
                            id: attr(e, "id").unwrap_or_default(),
                            name: attr(e, "name").unwrap_or_default(),
                            triangles: Vec::new(),
                        });
                    }
                    b"source" => {
                        current_source = attr(e, "id");
                    }
                    b"float_array" => {
                        current_array = attr(e, "id");
                    }
                    b"vertices" => {
                        current_vertices = attr(e, "id");
                    }
                    b"triangles" | b"polylist" => {
                        if let Some(geom) = current_geometry.as_mut() {
                            geom.triangles.push(TriangleBlock::default());
                            in_triangles = true;
                        }
                    }
                    b"input" => {
                        let semantic = attr(e, "semantic").unwrap_or_default();
                        let source = attr(e, "source")
                            .unwrap_or_default()
                            .trim_start_matches('#')
                            .to_string();
                        if in_triangles {
                            let offset: usize = attr(e, "offset")
                                .unwrap_or_else(|| "0".into())
                                .parse()?;
                            if let Some(block) = current_geometry
                                .as_mut()
                                .and_then(|g| g.triangles.last_mut())
                            {
                                block.inputs.push((semantic, source, offset));
                            }
                        } else if semantic == "POSITION"
                            && let Some(id) = current_vertices.clone()
                        {
                            doc.vertices.insert(id, source);
                        }
                    }
                    b"p" => pending_p = true,
                    b"vcount" => pending_vcount = in_triangles,
                    b"image" => in_image = true,
                    b"init_from" => pending_init_from = in_image,
                    _ => {}
                }
            }
            Ok(Event::Text(ref t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| MeshError::XmlParse(e.to_string()))?;
                if let Some(id) = current_array.take() {
                    let floats = parse_floats(&text)?;
                    if let Some(source_id) = current_source.clone() {
                        doc.arrays.insert(source_id, floats.clone());
                    }
                    doc.arrays.insert(id, floats);
                } else if pending_vcount {
                    pending_vcount = false;
                    if let Some(block) = current_geometry
                        .as_mut()
                        .and_then(|g| g.triangles.last_mut())
                    {
                        for token in text.split_whitespace() {
                            block.vcount.push(token.parse()?);
                        }
                    }
                } else if pending_p {
                    pending_p = false;
                    if let Some(block) = current_geometry
                        .as_mut()
                        .and_then(|g| g.triangles.last_mut())
                    {
                        for token in text.split_whitespace() {
                            block.indices.push(token.parse()?);
                        }
                    }
                } else if pending_init_from {
                    pending_init_from = false;
                    doc.images.push(text.trim().to_string());
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"geometry" => {
                    if let Some(geom) = current_geometry.take() {
                        doc.geometries.push(geom);
                    }
                }
                b"source" => current_source = None,
                b"vertices" => current_vertices = None,
                b"triangles" | b"polylist" => in_triangles = false,
                b"image" => in_image = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(MeshError::XmlParse(e.to_string())),
        }
    }

    Ok(doc)
}

fn append_triangles(doc: &Document, block: &TriangleBlock, mesh: &mut MeshData) -> Result<()> {
    let stride = block
        .inputs
        .iter()
        .map(|(_, _, offset)| offset + 1)
        .max()
        .unwrap_or(1);

    let vertex_input = block
        .inputs
        .iter()
        .find(|(semantic, _, _)| semantic == "VERTEX")
        .ok_or_else(|| MeshError::invalid_content("triangles without VERTEX input"))?;
    let position_source = doc
        .vertices
        .get(&vertex_input.1)
        .cloned()
        .unwrap_or_else(|| vertex_input.1.clone());
    let positions = doc
        .arrays
        .get(&position_source)
        .ok_or_else(|| MeshError::invalid_content(format!("missing source '{position_source}'")))?;

    let normal_input = block
        .inputs
        .iter()
        .find(|(semantic, _, _)| semantic == "NORMAL");
    let normals = normal_input
        .map(|(_, source, _)| {
            doc.arrays
                .get(source)
                .ok_or_else(|| MeshError::invalid_content(format!("missing source '{source}'")))
        })
        .transpose()?;

    let uv_input = block
        .inputs
        .iter()
        .find(|(semantic, _, _)| semantic == "TEXCOORD");
    let uvs = uv_input
        .map(|(_, source, _)| {
            doc.arrays
                .get(source)
                .ok_or_else(|| MeshError::invalid_content(format!("missing source '{source}'")))
        })
        .transpose()?;

    // A polylist declares each face's corner count up front; anything
    // but triangles cannot be mapped onto the soup.
    if let Some(sides) = block.vcount.iter().find(|&&c| c != 3) {
        return Err(MeshError::invalid_content(format!(
            "polylist face with {sides} corners, only triangles are supported"
        )));
    }

    if block.indices.len() % (stride * 3) != 0 {
        return Err(MeshError::invalid_content(format!(
            "index count {} not divisible by 3*stride {}",
            block.indices.len(),
            stride
        )));
    }

    for corner_group in block.indices.chunks(stride * 3) {
        let base = mesh.vertices.len() as u32;
        for corner in corner_group.chunks(stride) {
            let pi = corner[vertex_input.2] * 3;
            let p = positions.get(pi..pi + 3).ok_or_else(|| {
                MeshError::invalid_content(format!("position index {pi} out of range"))
            })?;
            mesh.vertices.push(Point3::new(p[0], p[1], p[2]));

            if let (Some(normals), Some((_, _, off))) = (normals, normal_input) {
                let ni = corner[*off] * 3;
                let n = normals.get(ni..ni + 3).ok_or_else(|| {
                    MeshError::invalid_content(format!("normal index {ni} out of range"))
                })?;
                mesh.normals.push(Vector3::new(n[0], n[1], n[2]));
            }

            if let (Some(uvs), Some((_, _, off))) = (uvs, uv_input) {
                let ti = corner[*off] * 2;
                let t = uvs.get(ti..ti + 2).ok_or_else(|| {
                    MeshError::invalid_content(format!("texcoord index {ti} out of range"))
                })?;
                mesh.uvs.push([t[0], t[1]]);
            }
        }
        mesh.faces.push([base, base + 1, base + 2]);
    }
    Ok(())
}

fn parse_floats(text: &str) -> Result<Vec<f64>> {
    text.split_whitespace()
        .map(|t| t.parse::<f64>().map_err(MeshError::from))
        .collect()
}

fn attr(e: &BytesStart, name: &str) -> Option<String> {
    for a in e.attributes().flatten() {
        if a.key.as_ref() == name.as_bytes() {
            return String::from_utf8(a.value.to_vec()).ok();
        }
    }
    None
}

/// Save a mesh as a minimal COLLADA 1.4.1 document with one geometry.
///
/// Output is deterministic for a given mesh.
///
/// # Errors
///
/// I/O errors from the destination.
pub fn save_collada<P: AsRef<Path>>(mesh: &MeshData, path: P) -> Result<()> {
    let bytes = render_collada(mesh)?;
    fs::write(path.as_ref(), bytes)?;
    Ok(())
}

fn render_collada(mesh: &MeshData) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut w = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;

    let mut collada = BytesStart::new("COLLADA");
    collada.push_attribute(("xmlns", "http://www.collada.org/2005/11/COLLADASchema"));
    collada.push_attribute(("version", "1.4.1"));
    w.write_event(Event::Start(collada)).map_err(io_err)?;

    w.write_event(Event::Start(BytesStart::new("asset")))
        .map_err(io_err)?;
    text_element(&mut w, "up_axis", "Z_UP")?;
    w.write_event(Event::End(BytesEnd::new("asset")))
        .map_err(io_err)?;

    w.write_event(Event::Start(BytesStart::new("library_geometries")))
        .map_err(io_err)?;
    let mut geometry = BytesStart::new("geometry");
    geometry.push_attribute(("id", "shape"));
    geometry.push_attribute(("name", "shape"));
    w.write_event(Event::Start(geometry)).map_err(io_err)?;
    w.write_event(Event::Start(BytesStart::new("mesh")))
        .map_err(io_err)?;

    let positions: Vec<f64> = mesh
        .vertices
        .iter()
        .flat_map(|v| [v.x, v.y, v.z])
        .collect();
    write_source(&mut w, "shape-positions", &positions, &["X", "Y", "Z"])?;

    let has_normals = mesh.normals.len() == mesh.vertices.len() && !mesh.normals.is_empty();
    if has_normals {
        let normals: Vec<f64> = mesh
            .normals
            .iter()
            .flat_map(|n| [n.x, n.y, n.z])
            .collect();
        write_source(&mut w, "shape-normals", &normals, &["X", "Y", "Z"])?;
    }

    let has_uvs = mesh.uvs.len() == mesh.vertices.len() && !mesh.uvs.is_empty();
    if has_uvs {
        let uvs: Vec<f64> = mesh.uvs.iter().flat_map(|t| [t[0], t[1]]).collect();
        write_source(&mut w, "shape-texcoords", &uvs, &["S", "T"])?;
    }

    let mut vertices = BytesStart::new("vertices");
    vertices.push_attribute(("id", "shape-vertices"));
    w.write_event(Event::Start(vertices)).map_err(io_err)?;
    let mut input = BytesStart::new("input");
    input.push_attribute(("semantic", "POSITION"));
    input.push_attribute(("source", "#shape-positions"));
    w.write_event(Event::Empty(input)).map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("vertices")))
        .map_err(io_err)?;

    let mut triangles = BytesStart::new("triangles");
    triangles.push_attribute(("count", mesh.faces.len().to_string().as_str()));
    w.write_event(Event::Start(triangles)).map_err(io_err)?;
    let mut vertex_input = BytesStart::new("input");
    vertex_input.push_attribute(("semantic", "VERTEX"));
    vertex_input.push_attribute(("source", "#shape-vertices"));
    vertex_input.push_attribute(("offset", "0"));
    w.write_event(Event::Empty(vertex_input)).map_err(io_err)?;
    if has_normals {
        // Normals are per-vertex and aligned with positions, so they share
        // the same index stream.
        let mut normal_input = BytesStart::new("input");
        normal_input.push_attribute(("semantic", "NORMAL"));
        normal_input.push_attribute(("source", "#shape-normals"));
        normal_input.push_attribute(("offset", "0"));
        w.write_event(Event::Empty(normal_input)).map_err(io_err)?;
    }
    if has_uvs {
        let mut uv_input = BytesStart::new("input");
        uv_input.push_attribute(("semantic", "TEXCOORD"));
        uv_input.push_attribute(("source", "#shape-texcoords"));
        uv_input.push_attribute(("offset", "0"));
        uv_input.push_attribute(("set", "0"));
        w.write_event(Event::Empty(uv_input)).map_err(io_err)?;
    }
    let indices = mesh
        .faces
        .iter()
        .flat_map(|f| f.iter().map(|i| i.to_string()))
        .collect::<Vec<_>>()
        .join(" ");
    text_element(&mut w, "p", &indices)?;
    w.write_event(Event::End(BytesEnd::new("triangles")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new("mesh")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("geometry")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("library_geometries")))
        .map_err(io_err)?;

    w.write_event(Event::Start(BytesStart::new("library_visual_scenes")))
        .map_err(io_err)?;
    let mut scene = BytesStart::new("visual_scene");
    scene.push_attribute(("id", "scene"));
    w.write_event(Event::Start(scene)).map_err(io_err)?;
    let mut node = BytesStart::new("node");
    node.push_attribute(("id", "shape-node"));
    w.write_event(Event::Start(node)).map_err(io_err)?;
    let mut instance = BytesStart::new("instance_geometry");
    instance.push_attribute(("url", "#shape"));
    w.write_event(Event::Empty(instance)).map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("node")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("visual_scene")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("library_visual_scenes")))
        .map_err(io_err)?;

    w.write_event(Event::Start(BytesStart::new("scene")))
        .map_err(io_err)?;
    let mut ivs = BytesStart::new("instance_visual_scene");
    ivs.push_attribute(("url", "#scene"));
    w.write_event(Event::Empty(ivs)).map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("scene")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new("COLLADA")))
        .map_err(io_err)?;
    Ok(buffer)
}

fn write_source<W: std::io::Write>(
    w: &mut Writer<W>,
    id: &str,
    data: &[f64],
    params: &[&str],
) -> Result<()> {
    let array_id = format!("{id}-array");
    let mut source = BytesStart::new("source");
    source.push_attribute(("id", id));
    w.write_event(Event::Start(source)).map_err(io_err)?;

    let mut array = BytesStart::new("float_array");
    array.push_attribute(("id", array_id.as_str()));
    array.push_attribute(("count", data.len().to_string().as_str()));
    w.write_event(Event::Start(array)).map_err(io_err)?;
    let text = data
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    w.write_event(Event::Text(BytesText::new(&text)))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("float_array")))
        .map_err(io_err)?;

    w.write_event(Event::Start(BytesStart::new("technique_common")))
        .map_err(io_err)?;
    let mut accessor = BytesStart::new("accessor");
    accessor.push_attribute(("source", format!("#{array_id}").as_str()));
    accessor.push_attribute(("count", (data.len() / params.len()).to_string().as_str()));
    accessor.push_attribute(("stride", params.len().to_string().as_str()));
    w.write_event(Event::Start(accessor)).map_err(io_err)?;
    for name in params {
        let mut param = BytesStart::new("param");
        param.push_attribute(("name", *name));
        param.push_attribute(("type", "float"));
        w.write_event(Event::Empty(param)).map_err(io_err)?;
    }
    w.write_event(Event::End(BytesEnd::new("accessor")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("technique_common")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new("source")))
        .map_err(io_err)?;
    Ok(())
}

fn text_element<W: std::io::Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(io_err)?;
    w.write_event(Event::Text(BytesText::new(text)))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(io_err)?;
    Ok(())
}

fn io_err(e: std::io::Error) -> MeshError {
    MeshError::Io(e)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    fn quad() -> MeshData {
        MeshData {
            vertices: vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            normals: vec![Vector3::z(); 6],
            uvs: Vec::new(),
            faces: vec![[0, 1, 2], [3, 4, 5]],
            texture: None,
        }
    }

    #[test]
    fn test_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("quad.dae");

        save_collada(&quad(), &path).expect("save");
        let loaded = load_collada(&path, None, None).expect("load");

        assert_eq!(loaded.faces.len(), 2);
        assert_eq!(loaded.vertices.len(), 6);
        assert_relative_eq!(loaded.vertices[2], Point3::new(1.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(loaded.normals[0], Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_submesh_selection() {
        let xml = r##"<?xml version="1.0"?>
            <COLLADA version="1.4.1">
              <library_geometries>
                <geometry id="wheel" name="wheel">
                  <mesh>
                    <source id="wheel-positions">
                      <float_array id="wheel-positions-array" count="9">0 0 0 1 0 0 0 1 0</float_array>
                    </source>
                    <vertices id="wheel-vertices">
                      <input semantic="POSITION" source="#wheel-positions"/>
                    </vertices>
                    <triangles count="1">
                      <input semantic="VERTEX" source="#wheel-vertices" offset="0"/>
                      <p>0 1 2</p>
                    </triangles>
                  </mesh>
                </geometry>
                <geometry id="hub" name="hub">
                  <mesh>
                    <source id="hub-positions">
                      <float_array id="hub-positions-array" count="9">0 0 1 1 0 1 0 1 1</float_array>
                    </source>
                    <vertices id="hub-vertices">
                      <input semantic="POSITION" source="#hub-positions"/>
                    </vertices>
                    <triangles count="1">
                      <input semantic="VERTEX" source="#hub-vertices" offset="0"/>
                      <p>0 1 2</p>
                    </triangles>
                  </mesh>
                </geometry>
              </library_geometries>
            </COLLADA>
        "##;

        let all = load_collada_str(xml, None, None).expect("load all");
        assert_eq!(all.faces.len(), 2);

        let hub = load_collada_str(xml, Some("hub"), None).expect("load hub");
        assert_eq!(hub.faces.len(), 1);
        assert_relative_eq!(hub.vertices[0], Point3::new(0.0, 0.0, 1.0), epsilon = 1e-12);

        let missing = load_collada_str(xml, Some("axle"), None);
        assert!(matches!(missing, Err(MeshError::SubmeshNotFound { .. })));
    }

    #[test]
    fn test_offset_separated_normals() {
        let xml = r##"<?xml version="1.0"?>
            <COLLADA version="1.4.1">
              <library_geometries>
                <geometry id="tri" name="tri">
                  <mesh>
                    <source id="tri-positions">
                      <float_array id="tri-positions-array" count="9">0 0 0 1 0 0 0 1 0</float_array>
                    </source>
                    <source id="tri-normals">
                      <float_array id="tri-normals-array" count="3">0 0 1</float_array>
                    </source>
                    <vertices id="tri-vertices">
                      <input semantic="POSITION" source="#tri-positions"/>
                    </vertices>
                    <triangles count="1">
                      <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
                      <input semantic="NORMAL" source="#tri-normals" offset="1"/>
                      <p>0 0 1 0 2 0</p>
                    </triangles>
                  </mesh>
                </geometry>
              </library_geometries>
            </COLLADA>
        "##;

        let mesh = load_collada_str(xml, None, None).expect("load");
        assert_eq!(mesh.faces.len(), 1);
        assert_eq!(mesh.vertices.len(), 3);
        assert_relative_eq!(mesh.normals[1], Vector3::z(), epsilon = 1e-12);
    }

    #[test]
    fn test_texture_fetched_through_asset_handler() {
        let xml = r##"<?xml version="1.0"?>
            <COLLADA version="1.4.1">
              <library_images>
                <image id="skin"><init_from>textures/skin.png</init_from></image>
              </library_images>
              <library_geometries>
                <geometry id="tri" name="tri">
                  <mesh>
                    <source id="tri-positions">
                      <float_array id="tri-positions-array" count="9">0 0 0 1 0 0 0 1 0</float_array>
                    </source>
                    <vertices id="tri-vertices">
                      <input semantic="POSITION" source="#tri-positions"/>
                    </vertices>
                    <triangles count="1">
                      <input semantic="VERTEX" source="#tri-vertices" offset="0"/>
                      <p>0 1 2</p>
                    </triangles>
                  </mesh>
                </geometry>
              </library_geometries>
            </COLLADA>
        "##;

        let handler = |uri: &str| -> std::io::Result<Vec<u8>> {
            assert_eq!(uri, "textures/skin.png");
            Ok(vec![0xAA, 0xBB])
        };
        let mesh = load_collada_str(xml, None, Some(&handler)).expect("load");
        assert_eq!(mesh.texture, Some(vec![0xAA, 0xBB]));
    }

    #[test]
    fn test_uv_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("uv.dae");

        let mut mesh = quad();
        mesh.uvs = (0..6).map(|i| [f64::from(i) * 0.1, 0.5]).collect();

        save_collada(&mesh, &path).expect("save");
        let loaded = load_collada(&path, None, None).expect("load");

        assert_eq!(loaded.uvs.len(), 6);
        assert_relative_eq!(loaded.uvs[3][0], 0.3, epsilon = 1e-12);
        assert_relative_eq!(loaded.uvs[3][1], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_deterministic_output() {
        let a = render_collada(&quad()).expect("render");
        let b = render_collada(&quad()).expect("render");
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_vertex_input() {
        let xml = r##"<COLLADA><library_geometries><geometry id="g" name="g"><mesh>
            <triangles count="1"><p>0 1 2</p></triangles>
        </mesh></geometry></library_geometries></COLLADA>"##;
        let result = load_collada_str(xml, None, None);
        assert!(matches!(result, Err(MeshError::InvalidContent { .. })));
    }

    #[test]
    fn test_polylist_of_triangles_is_accepted() {
        let xml = r##"<COLLADA><library_geometries><geometry id="g" name="g"><mesh>
            <source id="g-positions">
              <float_array id="g-positions-array" count="12">0 0 0 1 0 0 1 1 0 0 1 0</float_array>
            </source>
            <vertices id="g-vertices">
              <input semantic="POSITION" source="#g-positions"/>
            </vertices>
            <polylist count="2">
              <input semantic="VERTEX" source="#g-vertices" offset="0"/>
              <vcount>3 3</vcount>
              <p>0 1 2 0 2 3</p>
            </polylist>
        </mesh></geometry></library_geometries></COLLADA>"##;

        let mesh = load_collada_str(xml, None, None).expect("load");
        assert_eq!(mesh.faces.len(), 2);
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn test_polylist_quads_are_rejected() {
        // Twelve indices split 3 * stride evenly, so only the vcount
        // entries reveal these faces are quads.
        let xml = r##"<COLLADA><library_geometries><geometry id="g" name="g"><mesh>
            <source id="g-positions">
              <float_array id="g-positions-array" count="18">
                0 0 0 1 0 0 1 1 0 0 1 0 2 0 0 2 1 0
              </float_array>
            </source>
            <vertices id="g-vertices">
              <input semantic="POSITION" source="#g-positions"/>
            </vertices>
            <polylist count="3">
              <input semantic="VERTEX" source="#g-vertices" offset="0"/>
              <vcount>4 4 4</vcount>
              <p>0 1 2 3 1 4 5 2 0 3 2 5</p>
            </polylist>
        </mesh></geometry></library_geometries></COLLADA>"##;

        let result = load_collada_str(xml, None, None);
        assert!(matches!(result, Err(MeshError::InvalidContent { .. })));
    }
}
