//! URDF XML parser.
//!
//! Parses URDF XML into a [`BodyModel`] with the relative pose
//! convention: every joint origin is the child frame expressed in the
//! parent frame. Referenced mesh files are decoded eagerly through
//! `kin-mesh`, so the returned model carries no unresolved paths.

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
    ShapeGeometry, ShapeModel, validate,
};

use crate::error::{Result, UrdfError};

/// Parse a URDF file into a body model.
///
/// Mesh filenames inside the document are resolved relative to the
/// document's directory.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the XML is malformed,
/// a referenced mesh cannot be decoded, or the model fails validation.
pub fn load_urdf<P: AsRef<Path>>(path: P) -> Result<BodyModel> {
    load_urdf_with_assets(path, None)
}

/// Parse a URDF file, fetching texture bytes through `assets`.
///
/// # Errors
///
/// Same as [`load_urdf`], plus asset handler failures.
pub fn load_urdf_with_assets<P: AsRef<Path>>(
    path: P,
    assets: Option<&AssetHandler>,
) -> Result<BodyModel> {
    let path = path.as_ref();
    let xml = fs::read_to_string(path)?;
    let mesh_root = path.parent().map(Path::to_path_buf);
    parse_urdf_str_with(&xml, mesh_root.as_deref(), assets)
}

/// Parse a URDF string into a body model.
///
/// `mesh_root` is the directory mesh filenames are resolved against;
/// with `None` they are used as written.
///
/// # Errors
///
/// Returns an error if the XML is malformed or missing required
/// elements, a mesh cannot be decoded, or the model fails validation.
pub fn parse_urdf_str(xml: &str, mesh_root: Option<&Path>) -> Result<BodyModel> {
    parse_urdf_str_with(xml, mesh_root, None)
}

/// Parse a URDF string, fetching texture bytes through `assets`.
///
/// # Errors
///
/// Same as [`parse_urdf_str`], plus asset handler failures.
pub fn parse_urdf_str_with(
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
            Ok(Event::Start(ref e)) if e.name().as_ref() == b"robot" => {
                body = Some(parse_robot(&mut reader, e, &ctx)?);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let body = body.ok_or_else(|| UrdfError::missing_element("robot", "URDF document"))?;
    validate(&body)?;
    debug!(
        model = %body.name,
        links = body.links.len(),
        joints = body.joints.len(),
        "parsed URDF document"
    );
    Ok(body)
}

/// Mesh resolution context threaded down to geometry parsing.
struct MeshContext<'a> {
    mesh_root: Option<&'a Path>,
    assets: Option<&'a AssetHandler>,
}

fn parse_robot<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &MeshContext<'_>,
) -> Result<BodyModel> {
    let name = get_attribute(start, "name")?;
    let mut body = BodyModel::new(name, PoseConvention::Relative);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"link" => body.links.push(parse_link(reader, e, ctx)?),
                    b"joint" => body.joints.push(parse_joint(reader, e)?),
                    // material, gazebo, transmission and friends
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) => {
                if e.name().as_ref() == b"link" {
                    let name = get_attribute(e, "name")?;
                    body.links.push(LinkModel::new(name));
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"robot" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in robot".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(body)
}

fn parse_link<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    ctx: &MeshContext<'_>,
) -> Result<LinkModel> {
    let name = get_attribute(start, "name")?;
    let mut link = LinkModel::new(name);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
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
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == b"link" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in link".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(link)
}

fn parse_inertial<R: BufRead>(reader: &mut Reader<R>, link: &mut LinkModel) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"origin" => {
                    // Only the translation matters here; an inertial frame
                    // rotation is not representable in the model.
                    link.center_of_mass = Some(parse_origin(e)?.position.coords);
                }
                b"mass" => {
                    let value = get_attribute(e, "value")?;
                    link.mass = Some(value.parse().map_err(|_| {
                        UrdfError::invalid_attribute("value", "mass", "expected a number")
                    })?);
                }
                b"inertia" => {
                    link.inertia = Some(Inertia {
                        ixx: parse_float_attr(e, "ixx")?.unwrap_or(0.0),
                        ixy: parse_float_attr(e, "ixy")?.unwrap_or(0.0),
                        ixz: parse_float_attr(e, "ixz")?.unwrap_or(0.0),
                        iyy: parse_float_attr(e, "iyy")?.unwrap_or(0.0),
                        iyz: parse_float_attr(e, "iyz")?.unwrap_or(0.0),
                        izz: parse_float_attr(e, "izz")?.unwrap_or(0.0),
                    });
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"inertial" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in inertial".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}

fn parse_shape<R: BufRead>(
    reader: &mut Reader<R>,
    start: &BytesStart,
    link_name: &str,
    kind: &'static str,
    index: usize,
    ctx: &MeshContext<'_>,
) -> Result<ShapeModel> {
    // Unnamed shapes get a deterministic name so companion mesh files
    // land at stable paths.
    let name =
        get_attribute_opt(start, "name").unwrap_or_else(|| format!("{link_name}-{kind}{index}"));
    let mut pose = Pose::identity();
    let mut geometry: Option<ShapeGeometry> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let elem_name = e.name().as_ref().to_vec();
                match elem_name.as_slice() {
                    b"origin" => pose = parse_origin(e)?,
                    b"geometry" => geometry = Some(parse_geometry(reader, ctx)?),
                    _ => skip_element(reader, &elem_name)?,
                }
            }
            Ok(Event::Empty(ref e)) if e.name().as_ref() == b"origin" => {
                pose = parse_origin(e)?;
            }
            Ok(Event::End(ref e)) if e.name().as_ref() == kind.as_bytes() => break,
            Ok(Event::Eof) => {
                return Err(UrdfError::XmlParse(format!("unexpected EOF in {kind}")));
            }
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let geometry = geometry.ok_or_else(|| UrdfError::missing_element("geometry", kind))?;
    Ok(ShapeModel::new(name, geometry).with_pose(pose))
}

fn parse_geometry<R: BufRead>(
    reader: &mut Reader<R>,
    ctx: &MeshContext<'_>,
) -> Result<ShapeGeometry> {
    let mut buf = Vec::new();
    let mut geometry: Option<ShapeGeometry> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"box" => {
                    let size = get_attribute(e, "size")?;
                    let size = parse_vector3(&size)?;
                    geometry = Some(ShapeGeometry::Box {
                        x: size.x,
                        y: size.y,
                        z: size.z,
                    });
                }
                b"cylinder" => {
                    let radius = parse_float_attr(e, "radius")?
                        .ok_or_else(|| UrdfError::missing_attribute("radius", "cylinder"))?;
                    let height = parse_float_attr(e, "length")?
                        .ok_or_else(|| UrdfError::missing_attribute("length", "cylinder"))?;
                    geometry = Some(ShapeGeometry::Cylinder { radius, height });
                }
                b"sphere" => {
                    let radius = parse_float_attr(e, "radius")?
                        .ok_or_else(|| UrdfError::missing_attribute("radius", "sphere"))?;
                    geometry = Some(ShapeGeometry::Sphere { radius });
                }
                b"mesh" => {
                    let filename = get_attribute(e, "filename")?;
                    let scale = get_attribute_opt(e, "scale")
                        .map(|s| uniform_scale(&s))
                        .transpose()?;
                    let resolved = resolve_mesh_path(&filename, ctx.mesh_root);
                    let mesh = read_mesh(&resolved, None, ctx.assets)?;
                    geometry = Some(ShapeGeometry::Mesh { mesh, scale });
                }
                other => {
                    return Err(UrdfError::UnknownGeometry(
                        String::from_utf8_lossy(other).into_owned(),
                    ));
                }
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"geometry" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in geometry".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    geometry.ok_or_else(|| UrdfError::missing_element("shape", "geometry"))
}

fn parse_joint<R: BufRead>(reader: &mut Reader<R>, start: &BytesStart) -> Result<JointModel> {
    let name = get_attribute(start, "name")?;
    let type_str = get_attribute(start, "type")?;
    let joint_type = JointType::from_keyword(&type_str)
        .ok_or_else(|| UrdfError::UnknownJointType(type_str))?;

    let mut parent: Option<String> = None;
    let mut child: Option<String> = None;
    let mut pose = Pose::identity();
    // URDF's implicit axis when no <axis> element appears.
    let mut axis = Vector3::x();
    let mut limit: Option<JointLimit> = None;
    let mut velocity_limit: Option<(f64, f64)> = None;
    let mut damping: Option<f64> = None;
    let mut friction: Option<f64> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.name().as_ref() {
                b"parent" => parent = Some(get_attribute(e, "link")?),
                b"child" => child = Some(get_attribute(e, "link")?),
                b"origin" => pose = parse_origin(e)?,
                b"axis" => {
                    if let Some(xyz) = get_attribute_opt(e, "xyz") {
                        axis = parse_vector3(&xyz)?;
                    }
                }
                b"limit" => {
                    limit = Some(JointLimit {
                        upper: parse_float_attr(e, "upper")?.unwrap_or(0.0),
                        lower: parse_float_attr(e, "lower")?.unwrap_or(0.0),
                    });
                    // URDF carries one signed speed bound; it applies
                    // symmetrically in both directions.
                    if let Some(v) = parse_float_attr(e, "velocity")? {
                        velocity_limit = Some((v, -v));
                    }
                }
                b"dynamics" => {
                    damping = parse_float_attr(e, "damping")?;
                    friction = parse_float_attr(e, "friction")?;
                }
                _ => {}
            },
            Ok(Event::End(ref e)) if e.name().as_ref() == b"joint" => break,
            Ok(Event::Eof) => return Err(UrdfError::XmlParse("unexpected EOF in joint".into())),
            Ok(_) => {}
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    let parent =
        parent.ok_or_else(|| UrdfError::missing_element("parent", format!("joint '{name}'")))?;
    let child =
        child.ok_or_else(|| UrdfError::missing_element("child", format!("joint '{name}'")))?;

    let mut joint = JointModel::new(name, joint_type, parent, child).with_pose(pose);
    if joint_type.has_axis() {
        joint = joint.with_axis(axis);
    }
    joint.damping = damping;
    joint.friction = friction;
    joint.limit = limit;
    joint.velocity_limit = velocity_limit;
    Ok(joint)
}

// ============================================================================
// Helper functions
// ============================================================================

fn resolve_mesh_path(filename: &str, mesh_root: Option<&Path>) -> PathBuf {
    let trimmed = filename.strip_prefix("file://").unwrap_or(filename);
    let candidate = Path::new(trimmed);
    match mesh_root {
        Some(root) if candidate.is_relative() => root.join(candidate),
        _ => candidate.to_path_buf(),
    }
}

/// Collapse a URDF per-axis scale vector to the uniform factor the model
/// carries.
fn uniform_scale(s: &str) -> Result<f64> {
    let v = parse_vector3(s)?;
    if (v.x - v.y).abs() > f64::EPSILON || (v.x - v.z).abs() > f64::EPSILON {
        warn!(scale = %s, "non-uniform mesh scale, using the X component");
    }
    Ok(v.x)
}

fn parse_origin(e: &BytesStart) -> Result<Pose> {
    let xyz = get_attribute_opt(e, "xyz")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);

    let rpy = get_attribute_opt(e, "rpy")
        .map(|s| parse_vector3(&s))
        .transpose()?
        .unwrap_or_else(Vector3::zeros);

    Ok(Pose::from_euler(xyz, rpy))
}

fn get_attribute(e: &BytesStart, name: &'static str) -> Result<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec())
                .map_err(|_| UrdfError::invalid_attribute(name, element_name(e), "invalid UTF-8"));
        }
    }
    Err(UrdfError::missing_attribute(name, element_name(e)))
}

fn get_attribute_opt(e: &BytesStart, name: &str) -> Option<String> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == name.as_bytes() {
            return String::from_utf8(attr.value.to_vec()).ok();
        }
    }
    None
}

/// Read an optional float attribute. Absence is `None`; a value that is
/// present but not a number is an error, never a default.
fn parse_float_attr(e: &BytesStart, name: &'static str) -> Result<Option<f64>> {
    match get_attribute_opt(e, name) {
        Some(s) => s.parse().map(Some).map_err(|_| {
            UrdfError::invalid_attribute(
                name,
                element_name(e),
                format!("expected a number, got '{s}'"),
            )
        }),
        None => Ok(None),
    }
}

fn parse_vector3(s: &str) -> Result<Vector3<f64>> {
    let parts: Vec<f64> = s
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| UrdfError::XmlParse(format!("invalid vector3: {s}")))?;

    if parts.len() != 3 {
        return Err(UrdfError::XmlParse(format!(
            "expected 3 values in vector, got {}: {s}",
            parts.len()
        )));
    }

    Ok(Vector3::new(parts[0], parts[1], parts[2]))
}

fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
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
            Err(e) => return Err(UrdfError::XmlParse(e.to_string())),
        }
        buf.clear();
    }

    Ok(())
}
