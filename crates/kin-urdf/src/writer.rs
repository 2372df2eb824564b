//! URDF XML writer.
//!
//! Emits a [`BodyModel`] as a URDF document. A model carrying absolute
//! poses is normalized to the relative convention first, so callers can
//! hand over whatever they have. Mesh shapes are written out as
//! companion `.dae` and `.stl` files next to the document, with the
//! `.dae` referenced from the geometry element.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use tracing::debug;

use kin_tree::FrameConverter;
use kin_types::{BodyModel, JointModel, LinkModel, Pose, PoseConvention, ShapeGeometry, ShapeModel};

use crate::error::{Result, UrdfError};

/// Write a body model as a URDF file.
///
/// Mesh companion files are placed in the document's directory. The
/// document itself is written to a temporary sibling and renamed into
/// place, so a failure never leaves a truncated file at `path`.
///
/// # Errors
///
/// Returns an error if pose normalization fails on a malformed model or
/// if any file cannot be written.
pub fn write_urdf<P: AsRef<Path>>(body: &BodyModel, path: P) -> Result<()> {
    let path = path.as_ref();
    let normalized;
    let body = match body.convention {
        PoseConvention::Relative => body,
        PoseConvention::Absolute => {
            debug!(model = %body.name, "normalizing absolute poses for URDF output");
            let (converted, _) = FrameConverter::new().to_relative(body)?;
            normalized = converted;
            &normalized
        }
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    write_mesh_companions(body, dir)?;

    let bytes = render_urdf(body)?;
    let tmp = path.with_extension("urdf.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write the `.dae`/`.stl` pair for every mesh shape in the model.
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

/// Render the document to bytes without touching the filesystem.
pub(crate) fn render_urdf(body: &BodyModel) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut w = Writer::new_with_indent(Cursor::new(&mut buffer), b' ', 2);

    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(io_err)?;

    let mut robot = BytesStart::new("robot");
    robot.push_attribute(("name", body.name.as_str()));
    w.write_event(Event::Start(robot)).map_err(io_err)?;

    for link in &body.links {
        write_link(&mut w, link)?;
    }
    for joint in &body.joints {
        write_joint(&mut w, joint)?;
    }

    w.write_event(Event::End(BytesEnd::new("robot")))
        .map_err(io_err)?;
    Ok(buffer)
}

fn write_link<W: std::io::Write>(w: &mut Writer<W>, link: &LinkModel) -> Result<()> {
    let mut start = BytesStart::new("link");
    start.push_attribute(("name", link.name.as_str()));

    let has_inertial = link.mass.is_some() || link.inertia.is_some();
    if !has_inertial && link.visuals.is_empty() && link.collisions.is_empty() {
        w.write_event(Event::Empty(start)).map_err(io_err)?;
        return Ok(());
    }
    w.write_event(Event::Start(start)).map_err(io_err)?;

    if has_inertial {
        w.write_event(Event::Start(BytesStart::new("inertial")))
            .map_err(io_err)?;
        if let Some(com) = &link.center_of_mass {
            let mut origin = BytesStart::new("origin");
            origin.push_attribute(("xyz", fmt_triple(com.x, com.y, com.z).as_str()));
            w.write_event(Event::Empty(origin)).map_err(io_err)?;
        }
        if let Some(mass) = link.mass {
            let mut e = BytesStart::new("mass");
            e.push_attribute(("value", fmt_f(mass).as_str()));
            w.write_event(Event::Empty(e)).map_err(io_err)?;
        }
        if let Some(inertia) = &link.inertia {
            let mut e = BytesStart::new("inertia");
            e.push_attribute(("ixx", fmt_f(inertia.ixx).as_str()));
            e.push_attribute(("ixy", fmt_f(inertia.ixy).as_str()));
            e.push_attribute(("ixz", fmt_f(inertia.ixz).as_str()));
            e.push_attribute(("iyy", fmt_f(inertia.iyy).as_str()));
            e.push_attribute(("iyz", fmt_f(inertia.iyz).as_str()));
            e.push_attribute(("izz", fmt_f(inertia.izz).as_str()));
            w.write_event(Event::Empty(e)).map_err(io_err)?;
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

    write_origin(w, &shape.pose)?;

    w.write_event(Event::Start(BytesStart::new("geometry")))
        .map_err(io_err)?;
    match &shape.geometry {
        ShapeGeometry::Mesh { scale, .. } => {
            let mut e = BytesStart::new("mesh");
            let filename = format!("{}.dae", shape.name);
            e.push_attribute(("filename", filename.as_str()));
            if let Some(s) = scale {
                e.push_attribute(("scale", fmt_triple(*s, *s, *s).as_str()));
            }
            w.write_event(Event::Empty(e)).map_err(io_err)?;
        }
        ShapeGeometry::Box { x, y, z } => {
            let mut e = BytesStart::new("box");
            e.push_attribute(("size", fmt_triple(*x, *y, *z).as_str()));
            w.write_event(Event::Empty(e)).map_err(io_err)?;
        }
        ShapeGeometry::Cylinder { radius, height } | ShapeGeometry::Cone { radius, height } => {
            // URDF has no cone primitive; a bounding cylinder is the
            // closest representable shape.
            let mut e = BytesStart::new("cylinder");
            e.push_attribute(("radius", fmt_f(*radius).as_str()));
            e.push_attribute(("length", fmt_f(*height).as_str()));
            w.write_event(Event::Empty(e)).map_err(io_err)?;
        }
        ShapeGeometry::Sphere { radius } => {
            let mut e = BytesStart::new("sphere");
            e.push_attribute(("radius", fmt_f(*radius).as_str()));
            w.write_event(Event::Empty(e)).map_err(io_err)?;
        }
        ShapeGeometry::Plane { .. } => {
            // No URDF plane primitive; a thin box stands in.
            let mut e = BytesStart::new("box");
            e.push_attribute(("size", fmt_triple(10.0, 10.0, 0.001).as_str()));
            w.write_event(Event::Empty(e)).map_err(io_err)?;
        }
    }
    w.write_event(Event::End(BytesEnd::new("geometry")))
        .map_err(io_err)?;

    w.write_event(Event::End(BytesEnd::new(kind)))
        .map_err(io_err)?;
    Ok(())
}

fn write_joint<W: std::io::Write>(w: &mut Writer<W>, joint: &JointModel) -> Result<()> {
    let mut start = BytesStart::new("joint");
    start.push_attribute(("name", joint.name.as_str()));
    start.push_attribute(("type", joint.joint_type.keyword()));
    w.write_event(Event::Start(start)).map_err(io_err)?;

    write_origin(w, &joint.pose)?;

    let mut parent = BytesStart::new("parent");
    parent.push_attribute(("link", joint.parent.as_str()));
    w.write_event(Event::Empty(parent)).map_err(io_err)?;

    let mut child = BytesStart::new("child");
    child.push_attribute(("link", joint.child.as_str()));
    w.write_event(Event::Empty(child)).map_err(io_err)?;

    if let Some(axis) = &joint.axis {
        let mut e = BytesStart::new("axis");
        e.push_attribute(("xyz", fmt_triple(axis.x, axis.y, axis.z).as_str()));
        w.write_event(Event::Empty(e)).map_err(io_err)?;
    }

    if joint.limit.is_some() || joint.velocity_limit.is_some() {
        let mut e = BytesStart::new("limit");
        if let Some(limit) = &joint.limit {
            e.push_attribute(("lower", fmt_f(limit.lower).as_str()));
            e.push_attribute(("upper", fmt_f(limit.upper).as_str()));
        }
        // The forward bound wins; URDF cannot express an asymmetric pair.
        if let Some((forward, _)) = joint.velocity_limit {
            e.push_attribute(("velocity", fmt_f(forward).as_str()));
        }
        w.write_event(Event::Empty(e)).map_err(io_err)?;
    }

    if joint.damping.is_some() || joint.friction.is_some() {
        let mut e = BytesStart::new("dynamics");
        if let Some(d) = joint.damping {
            e.push_attribute(("damping", fmt_f(d).as_str()));
        }
        if let Some(f) = joint.friction {
            e.push_attribute(("friction", fmt_f(f).as_str()));
        }
        w.write_event(Event::Empty(e)).map_err(io_err)?;
    }

    w.write_event(Event::End(BytesEnd::new("joint")))
        .map_err(io_err)?;
    Ok(())
}

fn write_origin<W: std::io::Write>(w: &mut Writer<W>, pose: &Pose) -> Result<()> {
    let rpy = pose.to_euler();
    let mut e = BytesStart::new("origin");
    e.push_attribute((
        "xyz",
        fmt_triple(pose.position.x, pose.position.y, pose.position.z).as_str(),
    ));
    e.push_attribute(("rpy", fmt_triple(rpy.x, rpy.y, rpy.z).as_str()));
    w.write_event(Event::Empty(e)).map_err(io_err)?;
    Ok(())
}

fn fmt_f(v: f64) -> String {
    v.to_string()
}

fn fmt_triple(a: f64, b: f64, c: f64) -> String {
    format!("{a} {b} {c}")
}

fn io_err(e: std::io::Error) -> UrdfError {
    UrdfError::Io(e)
}
