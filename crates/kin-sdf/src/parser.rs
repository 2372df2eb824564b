//! SDF XML parser.
//!
//! Parses an SDF model (standalone or embedded in a world document) into
//! a [`BodyModel`] with the absolute pose convention: every pose element
//! places its frame in the model frame. Referenced mesh files are
//! decoded eagerly through `kin-mesh`.

use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use tracing::{debug, warn};

use kin_mesh::{AssetHandler, read_mesh};
use kin_types::{
    BodyModel, Inertia, JointLimit, JointModel, JointType, LinkModel, Pose, PoseConvention,
    SensorModel, ShapeGeometry, ShapeModel, validate,
};

use crate::error::{Result, SdfError};

/// Parse an SDF file into a body model.
///
/// Mesh URIs inside the document are resolved relative to the
/// document's directory. World documents are accepted; the first
/// `<model>` element is taken.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the XML is malformed,
/// a referenced mesh cannot be decoded, or the model fails validation.
pub fn load_sdf<P: AsRef<Path>>(path: P) -> Result<BodyModel> {
    load_sdf_with_assets(path, None)
}

/// Parse an SDF file, fetching texture bytes through `assets`.
///
/// # Errors
///
/// Same as [`load_sdf`], plus asset handler failures.
pub fn load_sdf_with_assets<P: AsRef<Path>>(
    path: P,
    assets: Option<&AssetHandler>,
) -> Result<BodyModel> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    let mesh_root = path.parent().map(Path::to_path_buf);
    parse_sdf_str_with(&xml, mesh_root.as_deref(), assets)
}

/// Parse an SDF string into a body model.
///
/// `mesh_root` is the directory mesh URIs are resolved against; with
/// `None` they are used as written.
///
/// # Errors
///
/// Returns an error if the XML is malformed or missing required
/// elements, a mesh cannot be decoded, or the model fails validation.
pub fn parse_sdf_str(xml: &str, mesh_root: Option<&Path>) -> Result<BodyModel> {
    parse_sdf_str_with(xml, mesh_root, None)
}

/// Parse an SDF string, fetching texture bytes through `assets`.
///
/// # Errors
///
/// Same as [`parse_sdf_str`], plus asset handler failures.
pub fn parse_sdf_str_with(
    xml: &str,
    mesh_root: Option<&Path>,
    assets: Option<&AssetHandler>,
) -> Result<BodyModel> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let ctx = MeshContext { mesh_root, assets };
    let mut buf = Vec::new();
    let mut body: Option<BodyModel> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"model" => {
                if body.is_none() {
                    body = Some(parse_model(&mut reader, e, &ctx)?);
                } else {
                    warn!("multiple models in document, keeping the first");
                    skip_element(&mut reader, b"model")?;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let body = body.ok_or_else(|| SdfError::missing_element("model", "SDF document"))?;
    validate(&body)?;
    debug!(
        model = %body.name,
        links = body.links.len(),
        joints = body.joints.len(),
        sensors = body.sensors.len(),
        "parsed SDF document"
    );
    Ok(body)
}

/// Mesh resolution context threaded down to geometry parsing.
struct MeshContext<'a> {
    mesh_root: Option<&'a Path>,
    assets: Option<&'a AssetHandler>,
}

fn parse_model<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &MeshContext<'_>,
) -> Result<BodyModel> {
    let name = get_attribute(start, "name")?;
    let mut body = BodyModel::new(name, PoseConvention::Absolute);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => body.pose = parse_pose_text(reader, b"pose")?,
                    b"link" => {
                        let (link, sensors) = parse_link(reader, e, ctx)?;
                        body.links.push(link);
                        body.sensors.extend(sensors);
                    }
                    b"joint" => body.joints.push(parse_joint(reader, e)?),
                    // static, plugin, gripper and friends
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"link" {
                    let name = get_attribute(e, "name")?;
                    body.links.push(LinkModel::new(name));
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"model" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in model".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(body)
}

fn parse_link<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &MeshContext<'_>,
) -> Result<(LinkModel, Vec<SensorModel>)> {
    let name = get_attribute(start, "name")?;
    let mut link = LinkModel::new(name);
    let mut sensors = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => link.pose = parse_pose_text(reader, b"pose")?,
                    b"inertial" => parse_inertial(reader, &mut link)?,
                    b"visual" => {
                        let index = link.visuals.len();
                        let shape = parse_shape(reader, e, &link.name, "visual", index, ctx)?;
                        link.visuals.push(shape);
                    }
                    b"collision" => {
                        let index = link.collisions.len();
                        let shape =
                            parse_shape(reader, e, &link.name, "collision", index, ctx)?;
                        link.collisions.push(shape);
                    }
                    b"sensor" => sensors.push(parse_sensor(reader, e, &link.name)?),
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"link" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in link".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok((link, sensors))
}

fn parse_inertial<R: BufRead>(reader: &mut Reader<R>, link: &mut LinkModel) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => {
                        // Translation only; an inertial frame rotation is
                        // not representable in the model.
                        let pose = parse_pose_text(reader, b"pose")?;
                        link.center_of_mass = Some(pose.position.coords);
                    }
                    b"mass" => {
                        link.mass = Some(parse_float_text(reader, b"mass")?);
                    }
                    b"inertia" => {
                        link.inertia = Some(parse_inertia_block(reader)?);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"inertial" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in inertial".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

fn parse_inertia_block<R: BufRead>(reader: &mut Reader<R>) -> Result<Inertia> {
    let mut inertia = Inertia::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"ixx" => inertia.ixx = parse_float_text(reader, b"ixx")?,
                b"ixy" => inertia.ixy = parse_float_text(reader, b"ixy")?,
                b"ixz" => inertia.ixz = parse_float_text(reader, b"ixz")?,
                b"iyy" => inertia.iyy = parse_float_text(reader, b"iyy")?,
                b"iyz" => inertia.iyz = parse_float_text(reader, b"iyz")?,
                b"izz" => inertia.izz = parse_float_text(reader, b"izz")?,
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"inertia" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in inertia".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(inertia)
}

fn parse_shape<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    link_name: &str,
    kind: &'static str,
    index: usize,
    ctx: &MeshContext<'_>,
) -> Result<ShapeModel> {
    let mut name =
        get_attribute_opt(start, "name").unwrap_or_else(|| format!("{link_name}-{kind}{index}"));
    let mut pose = Pose::identity();
    let mut geometry: Option<ShapeGeometry> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"pose" => pose = parse_pose_text(reader, b"pose")?,
                    b"geometry" => {
                        let (geom, submesh) = parse_geometry(reader, ctx)?;
                        // A submesh pick narrows the shape, so the name
                        // reflects which piece was taken.
                        if let Some(sub) = submesh {
                            name = format!("{name}-{sub}");
                        }
                        geometry = Some(geom);
                    }
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == kind.as_bytes() => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse(format!("unexpected EOF in {kind}"))),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let geometry = geometry.ok_or_else(|| SdfError::missing_element("geometry", kind))?;
    Ok(ShapeModel::new(name, geometry).with_pose(pose))
}

fn parse_geometry<R: BufRead>(
    reader: &mut Reader<R>,
    ctx: &MeshContext<'_>,
) -> Result<(ShapeGeometry, Option<String>)> {
    let mut buf = Vec::new();
    let mut geometry: Option<ShapeGeometry> = None;
    let mut submesh: Option<String> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"box" => {
                        let size = parse_vector3_child(reader, b"box", b"size")?;
                        geometry = Some(ShapeGeometry::Box {
                            x: size.x,
                            y: size.y,
                            z: size.z,
                        });
                    }
                    b"cylinder" => {
                        let (radius, height) = parse_radius_length(reader, b"cylinder")?;
                        geometry = Some(ShapeGeometry::Cylinder { radius, height });
                    }
                    b"cone" => {
                        let (radius, height) = parse_radius_length(reader, b"cone")?;
                        geometry = Some(ShapeGeometry::Cone { radius, height });
                    }
                    b"sphere" => {
                        let radius = parse_float_child(reader, b"sphere", b"radius")?;
                        geometry = Some(ShapeGeometry::Sphere { radius });
                    }
                    b"plane" => {
                        let normal = parse_vector3_child(reader, b"plane", b"normal")?;
                        geometry = Some(ShapeGeometry::Plane { normal });
                    }
                    b"mesh" => {
                        let (geom, sub) = parse_mesh_geometry(reader, ctx)?;
                        geometry = Some(geom);
                        submesh = sub;
                    }
                    other => {
                        return Err(SdfError::UnknownGeometry(
                            String::from_utf8_lossy(other).into_owned(),
                        ));
                    }
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"geometry" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in geometry".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let geometry = geometry.ok_or_else(|| SdfError::missing_element("shape", "geometry"))?;
    Ok((geometry, submesh))
}

fn parse_mesh_geometry<R: BufRead>(
    reader: &mut Reader<R>,
    ctx: &MeshContext<'_>,
) -> Result<(ShapeGeometry, Option<String>)> {
    let mut uri: Option<String> = None;
    let mut scale: Option<f64> = None;
    let mut submesh: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"uri" => uri = Some(read_text(reader, b"uri")?),
                    b"scale" => scale = Some(uniform_scale(&read_text(reader, b"scale")?)?),
                    b"submesh" => submesh = parse_submesh_name(reader)?,
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"mesh" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in mesh".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let uri = uri.ok_or_else(|| SdfError::missing_element("uri", "mesh"))?;
    let resolved = resolve_mesh_path(&uri, ctx.mesh_root);
    let mesh = read_mesh(&resolved, submesh.as_deref(), ctx.assets)?;
    Ok((ShapeGeometry::Mesh { mesh, scale }, submesh))
}

fn parse_submesh_name<R: BufRead>(reader: &mut Reader<R>) -> Result<Option<String>> {
    let mut name: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                if elem_name == b"name" {
                    name = Some(read_text(reader, b"name")?);
                } else {
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"submesh" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in submesh".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(name)
}

fn parse_sensor<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    link_name: &str,
) -> Result<SensorModel> {
    let name = get_attribute(start, "name")?;
    let sensor_type = get_attribute(start, "type")?;
    let mut pose = Pose::identity();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                if elem_name == b"pose" {
                    pose = parse_pose_text(reader, b"pose")?;
                } else {
                    skip_element(reader, &elem_name)?;
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"sensor" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in sensor".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(SensorModel {
        name,
        sensor_type,
        parent: link_name.to_string(),
        pose,
    })
}

fn parse_joint<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<JointModel> {
    let name = get_attribute(start, "name")?;
    let type_str = get_attribute(start, "type")?;
    let joint_type = JointType::from_keyword(&type_str)
        .ok_or_else(|| SdfError::UnknownJointType(type_str))?;

    let mut parent: Option<String> = None;
    let mut child: Option<String> = None;
    let mut pose = Pose::identity();
    let mut axis: Option<AxisBlock> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"parent" => parent = Some(read_text(reader, b"parent")?),
                    b"child" => child = Some(read_text(reader, b"child")?),
                    b"pose" => pose = parse_pose_text(reader, b"pose")?,
                    b"axis" => axis = Some(parse_axis(reader)?),
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"joint" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in joint".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let parent =
        parent.ok_or_else(|| SdfError::missing_element("parent", format!("joint '{name}'")))?;
    let child =
        child.ok_or_else(|| SdfError::missing_element("child", format!("joint '{name}'")))?;

    let mut joint = JointModel::new(name, joint_type, parent, child).with_pose(pose);
    if let Some(block) = axis {
        if joint_type.has_axis() {
            joint = joint.with_axis(block.xyz);
        }
        joint.damping = block.damping;
        joint.friction = block.friction;
        joint.limit = block.limit;
        joint.velocity_limit = block.velocity_limit;
    }
    Ok(joint)
}

/// Contents of an `<axis>` element.
struct AxisBlock {
    xyz: Vector3<f64>,
    damping: Option<f64>,
    friction: Option<f64>,
    limit: Option<JointLimit>,
    velocity_limit: Option<(f64, f64)>,
}

fn parse_axis<R: BufRead>(reader: &mut Reader<R>) -> Result<AxisBlock> {
    let mut block = AxisBlock {
        xyz: Vector3::z(),
        damping: None,
        friction: None,
        limit: None,
        velocity_limit: None,
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"xyz" => block.xyz = parse_vector3(&read_text(reader, b"xyz")?)?,
                b"damping" => block.damping = Some(parse_float_text(reader, b"damping")?),
                b"friction" => block.friction = Some(parse_float_text(reader, b"friction")?),
                b"lower" => {
                    block.limit.get_or_insert_default().lower =
                        parse_float_text(reader, b"lower")?;
                }
                b"upper" => {
                    block.limit.get_or_insert_default().upper =
                        parse_float_text(reader, b"upper")?;
                }
                b"velocity" => {
                    let v = parse_float_text(reader, b"velocity")?;
                    // One signed bound in the document, symmetric pair in
                    // the model.
                    block.velocity_limit = Some((v, -v));
                }
                // dynamics / limit wrappers and effort-style extras
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"axis" => break,
            Ok(Event::Eof) => return Err(SdfError::XmlParse("unexpected EOF in axis".into())),
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(block)
}

// ============================================================================
// Helper functions
// ============================================================================

fn resolve_mesh_path(uri: &str, mesh_root: Option<&Path>) -> PathBuf {
    let trimmed = uri
        .strip_prefix("file://")
        .or_else(|| uri.strip_prefix("model://"))
        .unwrap_or(uri);
    let candidate = Path::new(trimmed);
    match mesh_root {
        Some(root) if candidate.is_relative() => root.join(candidate),
        _ => candidate.to_path_buf(),
    }
}

fn uniform_scale(s: &str) -> Result<f64> {
    let v = parse_vector3(s)?;
    if (v.x - v.y).abs() > f64::EPSILON || (v.x - v.z).abs() > f64::EPSILON {
        warn!(scale = %s, "non-uniform mesh scale, using the X component");
    }
    Ok(v.x)
}

/// Read the text content of the current element up to its end tag.
fn read_text<R: BufRead>(reader: &mut Reader<R>, name: &'static [u8]) -> Result<String> {
    let mut buf = Vec::new();
    let mut out = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(ref t)) => {
                let text = t.unescape().map_err(|e| SdfError::XmlParse(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == name => break,
            Ok(Event::Eof) => {
                return Err(SdfError::XmlParse(format!(
                    "unexpected EOF in {}",
                    String::from_utf8_lossy(name)
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(out.trim().to_string())
}

fn parse_float_text<R: BufRead>(reader: &mut Reader<R>, name: &'static [u8]) -> Result<f64> {
    let text = read_text(reader, name)?;
    text.parse().map_err(|_| {
        SdfError::invalid_element("value", format!("expected a number, got '{text}'"))
    })
}

fn parse_pose_text<R: BufRead>(reader: &mut Reader<R>, name: &'static [u8]) -> Result<Pose> {
    let text = read_text(reader, name)?;
    let parts: Vec<f64> = text
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| SdfError::invalid_element("pose", format!("invalid pose: {text}")))?;

    if parts.len() != 6 {
        return Err(SdfError::invalid_element(
            "pose",
            format!("expected 6 values, got {}: {text}", parts.len()),
        ));
    }

    Ok(Pose::from_euler(
        Vector3::new(parts[0], parts[1], parts[2]),
        Vector3::new(parts[3], parts[4], parts[5]),
    ))
}

/// Parse a single float child element (e.g. `<sphere><radius>`).
fn parse_float_child<R: BufRead>(
    reader: &mut Reader<R>,
    parent: &'static [u8],
    child: &'static [u8],
) -> Result<f64> {
    let mut value: Option<f64> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == child => {
                value = Some(parse_float_text(reader, child)?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == parent => break,
            Ok(Event::Eof) => {
                return Err(SdfError::XmlParse(format!(
                    "unexpected EOF in {}",
                    String::from_utf8_lossy(parent)
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    value.ok_or_else(|| SdfError::invalid_element("geometry", "missing dimension element"))
}

/// Parse a vector3 child element (e.g. `<box><size>`).
fn parse_vector3_child<R: BufRead>(
    reader: &mut Reader<R>,
    parent: &'static [u8],
    child: &'static [u8],
) -> Result<Vector3<f64>> {
    let mut value: Option<Vector3<f64>> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == child => {
                value = Some(parse_vector3(&read_text(reader, child)?)?);
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == parent => break,
            Ok(Event::Eof) => {
                return Err(SdfError::XmlParse(format!(
                    "unexpected EOF in {}",
                    String::from_utf8_lossy(parent)
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    value.ok_or_else(|| SdfError::invalid_element("geometry", "missing dimension element"))
}

/// Parse `<radius>` and `<length>` children of a cylinder or cone.
fn parse_radius_length<R: BufRead>(
    reader: &mut Reader<R>,
    parent: &'static [u8],
) -> Result<(f64, f64)> {
    let mut radius: Option<f64> = None;
    let mut length: Option<f64> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.name().as_ref() {
                b"radius" => radius = Some(parse_float_text(reader, b"radius")?),
                b"length" => length = Some(parse_float_text(reader, b"length")?),
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == parent => break,
            Ok(Event::Eof) => {
                return Err(SdfError::XmlParse(format!(
                    "unexpected EOF in {}",
                    String::from_utf8_lossy(parent)
                )));
            }
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let radius =
        radius.ok_or_else(|| SdfError::invalid_element("geometry", "missing radius element"))?;
    let length =
        length.ok_or_else(|| SdfError::invalid_element("geometry", "missing length element"))?;
    Ok((radius, length))
}

fn parse_vector3(s: &str) -> Result<Vector3<f64>> {
    let parts: Vec<f64> = s
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| SdfError::XmlParse(format!("invalid vector3: {s}")))?;

    if parts.len() != 3 {
        return Err(SdfError::XmlParse(format!(
            "expected 3 values in vector, got {}: {s}",
            parts.len()
        )));
    }

    Ok(Vector3::new(parts[0], parts[1], parts[2]))
}

fn get_attribute(e: &BytesStart, name: &'static str) -> Result<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).map_err(|_| {
                SdfError::missing_attribute(name, String::from_utf8_lossy(e.name().as_ref()))
            });
        }
    }
    Err(SdfError::missing_attribute(
        name,
        String::from_utf8_lossy(e.name().as_ref()),
    ))
}

fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).ok();
        }
    }
    None
}

fn skip_element<R: BufRead>(reader: &mut Reader<R>, name: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) if e.name().as_ref() == name => depth += 1,
            Ok(Event::End(ref e)) if e.name().as_ref() == name => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(SdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn test_parse_simple_model() {
        let xml = r#"
            <sdf version="1.5">
              <model name="cart">
                <pose>0 0 0.05 0 0 0</pose>
                <link name="base">
                  <pose>0 0 0.1 0 0 0</pose>
                  <inertial>
                    <pose>0 0 0.02 0 0 0</pose>
                    <mass>2.5</mass>
                    <inertia>
                      <ixx>0.1</ixx><iyy>0.1</iyy><izz>0.1</izz>
                    </inertia>
                  </inertial>
                </link>
                <link name="pole">
                  <pose>0 0 0.3 0 0 0</pose>
                </link>
                <joint name="pivot" type="revolute">
                  <pose>0 0 0.3 0 0 0</pose>
                  <parent>base</parent>
                  <child>pole</child>
                  <axis>
                    <xyz>0 1 0</xyz>
                    <dynamics><damping>0.5</damping><friction>0.1</friction></dynamics>
                    <limit><lower>-1.57</lower><upper>1.57</upper><velocity>2.0</velocity></limit>
                  </axis>
                </joint>
              </model>
            </sdf>
        "#;

        let body = parse_sdf_str(xml, None).expect("should parse");
        assert_eq!(body.name, "cart");
        assert_eq!(body.convention, PoseConvention::Absolute);
        assert_relative_eq!(
            body.pose.position,
            Point3::new(0.0, 0.0, 0.05),
            epsilon = 1e-12
        );

        let base = body.link("base").expect("base link");
        assert_relative_eq!(base.mass.unwrap(), 2.5);
        assert_relative_eq!(
            base.center_of_mass.unwrap(),
            Vector3::new(0.0, 0.0, 0.02),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            base.pose.position,
            Point3::new(0.0, 0.0, 0.1),
            epsilon = 1e-12
        );

        let pivot = body.joint("pivot").expect("pivot joint");
        assert_eq!(pivot.joint_type, JointType::Revolute);
        assert_relative_eq!(
            pivot.axis.unwrap(),
            Vector3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(pivot.damping.unwrap(), 0.5);
        assert_relative_eq!(pivot.friction.unwrap(), 0.1);
        let limit = pivot.limit.unwrap();
        assert_relative_eq!(limit.lower, -1.57);
        assert_relative_eq!(limit.upper, 1.57);
        assert_eq!(pivot.velocity_limit, Some((2.0, -2.0)));
    }

    #[test]
    fn test_parse_sensor_attached_to_link() {
        let xml = r#"
            <sdf version="1.5">
              <model name="bot">
                <link name="head">
                  <sensor name="eye" type="camera">
                    <pose>0.1 0 0 0 0 0</pose>
                    <camera><horizontal_fov>1.0</horizontal_fov></camera>
                  </sensor>
                </link>
              </model>
            </sdf>
        "#;

        let body = parse_sdf_str(xml, None).expect("should parse");
        assert_eq!(body.sensors.len(), 1);
        let eye = &body.sensors[0];
        assert_eq!(eye.name, "eye");
        assert_eq!(eye.sensor_type, "camera");
        assert_eq!(eye.parent, "head");
        assert_relative_eq!(
            eye.pose.position,
            Point3::new(0.1, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_parse_primitive_geometry() {
        let xml = r#"
            <sdf version="1.5">
              <model name="shapes">
                <link name="base">
                  <visual name="crate">
                    <geometry><box><size>0.2 0.3 0.4</size></box></geometry>
                  </visual>
                  <collision name="ground">
                    <geometry><plane><normal>0 0 1</normal></plane></geometry>
                  </collision>
                  <visual name="funnel">
                    <geometry><cone><radius>0.2</radius><length>0.5</length></cone></geometry>
                  </visual>
                </link>
              </model>
            </sdf>
        "#;

        let body = parse_sdf_str(xml, None).expect("should parse");
        let base = body.link("base").expect("base link");
        assert_eq!(
            base.visuals[0].geometry,
            ShapeGeometry::Box {
                x: 0.2,
                y: 0.3,
                z: 0.4
            }
        );
        assert_eq!(
            base.collisions[0].geometry,
            ShapeGeometry::Plane {
                normal: Vector3::z()
            }
        );
        assert_eq!(
            base.visuals[1].geometry,
            ShapeGeometry::Cone {
                radius: 0.2,
                height: 0.5
            }
        );
    }

    #[test]
    fn test_model_inside_world_document() {
        let xml = r#"
            <sdf version="1.5">
              <world name="default">
                <model name="bot">
                  <link name="base"/>
                </model>
              </world>
            </sdf>
        "#;

        let body = parse_sdf_str(xml, None).expect("should parse");
        assert_eq!(body.name, "bot");
        assert_eq!(body.links.len(), 1);
    }

    #[test]
    fn test_malformed_pose_is_rejected() {
        let xml = r#"
            <sdf version="1.5">
              <model name="bad">
                <link name="base">
                  <pose>1 2 3</pose>
                </link>
              </model>
            </sdf>
        "#;

        let result = parse_sdf_str(xml, None);
        assert!(matches!(result, Err(SdfError::InvalidElement { .. })));
    }

    #[test]
    fn test_unsupported_geometry_is_rejected() {
        let xml = r#"
            <sdf version="1.5">
              <model name="r">
                <link name="base">
                  <collision name="body">
                    <geometry>
                      <capsule>
                        <radius>0.1</radius>
                        <length>0.5</length>
                      </capsule>
                    </geometry>
                  </collision>
                </link>
              </model>
            </sdf>
        "#;

        let result = parse_sdf_str(xml, None);
        assert!(matches!(
            result,
            Err(SdfError::UnknownGeometry(ref tag)) if tag == "capsule"
        ));
    }

    #[test]
    fn test_unknown_joint_type_is_rejected() {
        let xml = r#"
            <sdf version="1.5">
              <model name="r">
                <link name="a"/>
                <link name="b"/>
                <joint name="j" type="gearbox">
                  <parent>a</parent>
                  <child>b</child>
                </joint>
              </model>
            </sdf>
        "#;

        let result = parse_sdf_str(xml, None);
        assert!(matches!(
            result,
            Err(SdfError::UnknownJointType(ref t)) if t == "gearbox"
        ));
    }

    #[test]
    fn test_screw_joint_keyword() {
        let xml = r#"
            <sdf version="1.5">
              <model name="r">
                <link name="a"/>
                <link name="b"/>
                <joint name="j" type="screw">
                  <parent>a</parent>
                  <child>b</child>
                  <axis><xyz>0 0 1</xyz></axis>
                </joint>
              </model>
            </sdf>
        "#;

        let body = parse_sdf_str(xml, None).expect("should parse");
        assert_eq!(body.joints[0].joint_type, JointType::Screw);
    }

    #[test]
    fn test_submesh_selection_renames_shape() {
        use tempfile::tempdir;

        let dir = tempdir().expect("tempdir");
        let dae = r##"<?xml version="1.0"?>
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
        std::fs::write(dir.path().join("wheel.dae"), dae).expect("write fixture");

        let xml = r#"
            <sdf version="1.5">
              <model name="r">
                <link name="axle">
                  <visual name="rim">
                    <geometry>
                      <mesh>
                        <uri>wheel.dae</uri>
                        <submesh><name>hub</name></submesh>
                      </mesh>
                    </geometry>
                  </visual>
                </link>
              </model>
            </sdf>
        "#;

        let body = parse_sdf_str(xml, Some(dir.path())).expect("should parse");
        let visual = &body.links[0].visuals[0];
        assert_eq!(visual.name, "rim-hub");
        match &visual.geometry {
            ShapeGeometry::Mesh { mesh, .. } => assert_eq!(mesh.faces.len(), 1),
            other => panic!("expected mesh geometry, got {other:?}"),
        }
    }
}
