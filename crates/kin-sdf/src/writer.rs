//! SDF XML writer.
//!
//! Emits a [`BodyModel`] as either a standalone `.sdf` model document or
//! a Gazebo `.world` bundle. A model carrying relative poses is
//! normalized to the absolute convention first. Mesh shapes are written
//! out as companion `.dae` and `.stl` files, with the `.dae` referenced
//! from the geometry element.
//!
//! The `.world` layout follows the Gazebo model-database convention:
//! next to `robot.world` a `robot/` directory holds `model.config` and
//! `robot/robot.sdf`, and the world file pulls the model in through a
//! `model://` include.

use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use kin_tree::FrameConverter;
use kin_types::{
    BodyModel, JointModel, LinkModel, Pose, PoseConvention, SensorModel, ShapeGeometry, ShapeModel,
};

use crate::error::{Result, SdfError};

const SDF_VERSION: &str = "1.5";

/// Write a body model as an SDF file.
///
/// A `.world` destination produces the Gazebo bundle layout with the
/// model renamed to the world file's stem; any other destination gets a
/// single model document. Documents are written to a temporary sibling
/// and renamed into place, so a failure never leaves a truncated file.
///
/// # Errors
///
/// Returns an error if pose normalization fails on a malformed model or
/// if any file cannot be written.
pub fn write_sdf<P: AsRef<Path>>(body: &BodyModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let normalized;
    let (body, link_poses) = match body.convention {
        PoseConvention::Absolute => (body, kin_tree::link_world_poses(body)?),
        PoseConvention::Relative => {
            debug!(model = %body.name, "normalizing relative poses for SDF output");
            let (converted, poses) = FrameConverter::new().to_absolute(body)?;
            normalized = converted;
            (&normalized, poses)
        }
    };

    let is_world = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("world"));
    if is_world {
        write_world_bundle(body, &link_poses, path)
    } else {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        write_mesh_companions(body, dir)?;
        write_atomic(path, &render_model_doc(body, &link_poses)?)
    }
}

/// Write the `.world` file plus its `<stem>/` model directory.
fn write_world_bundle(
    body: &BodyModel,
    link_poses: &HashMap<String, Pose>,
    path: &Path,
) -> Result<()> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SdfError::invalid_element("world", "destination has no file stem"))?;

    let mut model = body.clone();
    model.name = stem.to_string();

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let model_dir = dir.join(stem);
    fs::create_dir_all(&model_dir)?;

    write_mesh_companions(&model, &model_dir)?;
    write_atomic(
        &model_dir.join("model.config"),
        &render_model_config(&model)?,
    )?;
    write_atomic(
        &model_dir.join(format!("{stem}.sdf")),
        &render_model_doc(&model, link_poses)?,
    )?;
    write_atomic(path, &render_world_doc(stem)?)?;

    debug!(model = %model.name, dir = %model_dir.display(), "wrote world bundle");
    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn write_mesh_companions(body: &BodyModel, dir: &Path) -> Result<()> {
    for link in &body.links {
        for shape in link.visuals.iter().chain(link.collisions.iter()) {
            if let ShapeGeometry::Mesh { mesh, .. } = &shape.geometry {
                kin_mesh::write_mesh(mesh, dir.join(format!("{}.dae", shape.name)))?;
                kin_mesh::write_mesh(mesh, dir.join(format!("{}.stl", shape.name)))?;
            }
        }
    }
    Ok(())
}

/// Render the model-database manifest.
fn render_model_config(body: &BodyModel) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut w = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;
    w.write_event(Event::Start(BytesStart::new("model")))
        .map_err(io_err)?;
    text_element(&mut w, "name", &body.name)?;
    text_element(&mut w, "version", "1.0")?;

    let mut sdf = BytesStart::new("sdf");
    sdf.push_attribute(("version", SDF_VERSION));
    w.write_event(Event::Start(sdf)).map_err(io_err)?;
    w.write_event(Event::Text(BytesText::new(&format!("{}.sdf", body.name))))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("sdf")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new("model")))
        .map_err(io_err)?;
    Ok(buffer)
}

/// Render the world wrapper document.
fn render_world_doc(stem: &str) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut w = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;
    let mut sdf = BytesStart::new("sdf");
    sdf.push_attribute(("version", SDF_VERSION));
    w.write_event(Event::Start(sdf)).map_err(io_err)?;

    let mut world = BytesStart::new("world");
    world.push_attribute(("name", "default"));
    w.write_event(Event::Start(world)).map_err(io_err)?;

    w.write_event(Event::Start(BytesStart::new("include")))
        .map_err(io_err)?;
    text_element(&mut w, "uri", &format!("model://{stem}"))?;
    w.write_event(Event::End(BytesEnd::new("include")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new("world")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("sdf")))
        .map_err(io_err)?;
    Ok(buffer)
}

/// Render the standalone model document.
///
/// `link_poses` carries each link's frame in world coordinates; the
/// document places links by it, so a model whose links were authored at
/// the origin still lands every link where its joint chain puts it.
pub(crate) fn render_model_doc(
    body: &BodyModel,
    link_poses: &HashMap<String, Pose>,
) -> Result<Vec<u8>> {
    // Sensors hang off their parent link in the document, so group them
    // up front.
    let mut sensors_of: HashMap<&str, Vec<&SensorModel>> = HashMap::new();
    for sensor in &body.sensors {
        sensors_of.entry(sensor.parent.as_str()).or_default().push(sensor);
    }

    let mut buffer = Vec::new();
    let mut w = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;
    let mut sdf = BytesStart::new("sdf");
    sdf.push_attribute(("version", SDF_VERSION));
    w.write_event(Event::Start(sdf)).map_err(io_err)?;

    let mut model = BytesStart::new("model");
    model.push_attribute(("name", body.name.as_str()));
    w.write_event(Event::Start(model)).map_err(io_err)?;

    write_pose(&mut w, &body.pose)?;

    for link in &body.links {
        write_link(&mut w, link, link_poses, &sensors_of)?;
    }
    for joint in &body.joints {
        write_joint(&mut w, joint)?;
    }

    w.write_event(Event::End(BytesEnd::new("model")))
        .map_err(io_err)?;
    w.write_event(Event::End(BytesEnd::new("sdf")))
        .map_err(io_err)?;
    Ok(buffer)
}

fn write_link<W: std::io::Write>(
    w: &mut Writer<W>,
    link: &LinkModel,
    link_poses: &HashMap<String, Pose>,
    sensors_of: &HashMap<&str, Vec<&SensorModel>>,
) -> Result<()> {
    let mut start = BytesStart::new("link");
    start.push_attribute(("name", link.name.as_str()));
    w.write_event(Event::Start(start)).map_err(io_err)?;

    write_pose(w, link_poses.get(&link.name).unwrap_or(&link.pose))?;

    if link.mass.is_some() || link.inertia.is_some() || link.center_of_mass.is_some() {
        w.write_event(Event::Start(BytesStart::new("inertial")))
            .map_err(io_err)?;
        if let Some(com) = &link.center_of_mass {
            text_element(w, "pose", &format!("{} {} {} 0 0 0", com.x, com.y, com.z))?;
        }
        if let Some(mass) = link.mass {
            text_element(w, "mass", &mass.to_string())?;
        }
        if let Some(inertia) = &link.inertia {
            w.write_event(Event::Start(BytesStart::new("inertia")))
                .map_err(io_err)?;
            text_element(w, "ixx", &inertia.ixx.to_string())?;
            text_element(w, "ixy", &inertia.ixy.to_string())?;
            text_element(w, "ixz", &inertia.ixz.to_string())?;
            text_element(w, "iyy", &inertia.iyy.to_string())?;
            text_element(w, "iyz", &inertia.iyz.to_string())?;
            text_element(w, "izz", &inertia.izz.to_string())?;
            w.write_event(Event::End(BytesEnd::new("inertia")))
                .map_err(io_err)?;
        }
        w.write_event(Event::End(BytesEnd::new("inertial")))
            .map_err(io_err)?;
    }

    for shape in &link.visuals {
        write_shape(w, shape, "visual")?;
    }
    for shape in &link.collisions {
        write_shape(w, shape, "collision")?;
    }
    if let Some(sensors) = sensors_of.get(link.name.as_str()) {
        for sensor in sensors {
            write_sensor(w, sensor)?;
        }
    }

    w.write_event(Event::End(BytesEnd::new("link")))
        .map_err(io_err)?;
    Ok(())
}

fn write_shape<W: std::io::Write>(
    w: &mut Writer<W>,
    shape: &ShapeModel,
    kind: &'static str,
) -> Result<()> {
    let mut start = BytesStart::new(kind);
    start.push_attribute(("name", shape.name.as_str()));
    w.write_event(Event::Start(start)).map_err(io_err)?;

    write_pose(w, &shape.pose)?;

    w.write_event(Event::Start(BytesStart::new("geometry")))
        .map_err(io_err)?;
    match &shape.geometry {
        ShapeGeometry::Mesh { scale, .. } => {
            w.write_event(Event::Start(BytesStart::new("mesh")))
                .map_err(io_err)?;
            text_element(w, "uri", &format!("{}.dae", shape.name))?;
            if let Some(s) = scale {
                text_element(w, "scale", &format!("{s} {s} {s}"))?;
            }
            w.write_event(Event::End(BytesEnd::new("mesh")))
                .map_err(io_err)?;
        }
        ShapeGeometry::Box { x, y, z } => {
            w.write_event(Event::Start(BytesStart::new("box")))
                .map_err(io_err)?;
            text_element(w, "size", &format!("{x} {y} {z}"))?;
            w.write_event(Event::End(BytesEnd::new("box")))
                .map_err(io_err)?;
        }
        ShapeGeometry::Cylinder { radius, height } => {
            write_radius_length(w, "cylinder", *radius, *height)?;
        }
        ShapeGeometry::Cone { radius, height } => {
            write_radius_length(w, "cone", *radius, *height)?;
        }
        ShapeGeometry::Sphere { radius } => {
            w.write_event(Event::Start(BytesStart::new("sphere")))
                .map_err(io_err)?;
            text_element(w, "radius", &radius.to_string())?;
            w.write_event(Event::End(BytesEnd::new("sphere")))
                .map_err(io_err)?;
        }
        ShapeGeometry::Plane { normal } => {
            w.write_event(Event::Start(BytesStart::new("plane")))
                .map_err(io_err)?;
            text_element(w, "normal", &format!("{} {} {}", normal.x, normal.y, normal.z))?;
            w.write_event(Event::End(BytesEnd::new("plane")))
                .map_err(io_err)?;
        }
    }
    w.write_event(Event::End(BytesEnd::new("geometry")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new(kind)))
        .map_err(io_err)?;
    Ok(())
}

fn write_radius_length<W: std::io::Write>(
    w: &mut Writer<W>,
    name: &'static str,
    radius: f64,
    length: f64,
) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
        .map_err(io_err)?;
    text_element(w, "radius", &radius.to_string())?;
    text_element(w, "length", &length.to_string())?;
    w.write_event(Event::End(BytesEnd::new(name)))
        .map_err(io_err)?;
    Ok(())
}

fn write_sensor<W: std::io::Write>(w: &mut Writer<W>, sensor: &SensorModel) -> Result<()> {
    let mut start = BytesStart::new("sensor");
    start.push_attribute(("name", sensor.name.as_str()));
    start.push_attribute(("type", sensor.sensor_type.as_str()));
    w.write_event(Event::Start(start)).map_err(io_err)?;
    write_pose(w, &sensor.pose)?;
    w.write_event(Event::End(BytesEnd::new("sensor")))
        .map_err(io_err)?;
    Ok(())
}

fn write_joint<W: std::io::Write>(w: &mut Writer<W>, joint: &JointModel) -> Result<()> {
    let mut start = BytesStart::new("joint");
    start.push_attribute(("name", joint.name.as_str()));
    start.push_attribute(("type", joint.joint_type.keyword()));
    w.write_event(Event::Start(start)).map_err(io_err)?;

    write_pose(w, &joint.pose)?;
    text_element(w, "parent", &joint.parent)?;
    text_element(w, "child", &joint.child)?;

    let has_dynamics = joint.damping.is_some() || joint.friction.is_some();
    let has_limit = joint.limit.is_some() || joint.velocity_limit.is_some();
    if joint.axis.is_some() || has_dynamics || has_limit {
        w.write_event(Event::Start(BytesStart::new("axis")))
            .map_err(io_err)?;
        if let Some(axis) = &joint.axis {
            text_element(w, "xyz", &format!("{} {} {}", axis.x, axis.y, axis.z))?;
        }
        if has_dynamics {
            w.write_event(Event::Start(BytesStart::new("dynamics")))
                .map_err(io_err)?;
            if let Some(d) = joint.damping {
                text_element(w, "damping", &d.to_string())?;
            }
            if let Some(f) = joint.friction {
                text_element(w, "friction", &f.to_string())?;
            }
            w.write_event(Event::End(BytesEnd::new("dynamics")))
                .map_err(io_err)?;
        }
        if has_limit {
            w.write_event(Event::Start(BytesStart::new("limit")))
                .map_err(io_err)?;
            if let Some(limit) = &joint.limit {
                text_element(w, "lower", &limit.lower.to_string())?;
                text_element(w, "upper", &limit.upper.to_string())?;
            }
            // The forward bound wins; the dialect takes one value.
            if let Some((forward, _)) = joint.velocity_limit {
                text_element(w, "velocity", &forward.to_string())?;
            }
            w.write_event(Event::End(BytesEnd::new("limit")))
                .map_err(io_err)?;
        }
        w.write_event(Event::End(BytesEnd::new("axis")))
            .map_err(io_err)?;
    }

    w.write_event(Event::End(BytesEnd::new("joint")))
        .map_err(io_err)?;
    Ok(())
}

fn write_pose<W: std::io::Write>(w: &mut Writer<W>, pose: &Pose) -> Result<()> {
    let rpy = pose.to_euler();
    text_element(
        w,
        "pose",
        &format!(
            "{} {} {} {} {} {}",
            pose.position.x, pose.position.y, pose.position.z, rpy.x, rpy.y, rpy.z
        ),
    )
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

fn io_err(e: std::io::Error) -> SdfError {
    SdfError::Io(e)
}
