//! End-to-end dialect conversion tests.
//!
//! Drives a model through the full pipeline in both directions:
//! URDF in, SDF out, and back again, checking that joint poses land in
//! the convention the destination dialect expects.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use tempfile::tempdir;

use kin_sdf::{load_sdf, write_sdf};
use kin_types::{JointType, PoseConvention};
use kin_urdf::{load_urdf, parse_urdf_str, write_urdf};

const ARM_URDF: &str = r#"
    <robot name="arm">
        <link name="base">
            <inertial>
                <mass value="4.0"/>
                <inertia ixx="0.05" iyy="0.05" izz="0.02"/>
            </inertial>
        </link>
        <link name="upper"/>
        <link name="lower"/>
        <joint name="shoulder" type="revolute">
            <parent link="base"/>
            <child link="upper"/>
            <origin xyz="0 0 0.5"/>
            <axis xyz="0 1 0"/>
            <limit lower="-2.0" upper="2.0" velocity="1.5"/>
        </joint>
        <joint name="elbow" type="revolute">
            <parent link="upper"/>
            <child link="lower"/>
            <origin xyz="0 0 0.4"/>
            <axis xyz="0 1 0"/>
            <limit lower="-2.5" upper="0.0" velocity="1.5"/>
        </joint>
    </robot>
"#;

#[test]
fn urdf_to_sdf_accumulates_poses() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("arm.sdf");

    let body = parse_urdf_str(ARM_URDF, None).expect("parse URDF");
    assert_eq!(body.convention, PoseConvention::Relative);

    write_sdf(&body, &out).expect("write SDF");
    let converted = load_sdf(&out).expect("load SDF");

    assert_eq!(converted.convention, PoseConvention::Absolute);
    // Relative steps 0.5 and 0.4 along Z stack up in the model frame.
    assert_relative_eq!(
        converted.joint("shoulder").unwrap().pose.position,
        Point3::new(0.0, 0.0, 0.5),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        converted.joint("elbow").unwrap().pose.position,
        Point3::new(0.0, 0.0, 0.9),
        epsilon = 1e-9
    );
    // The dialects share the symmetric speed bound.
    assert_eq!(
        converted.joint("shoulder").unwrap().velocity_limit,
        Some((1.5, -1.5))
    );
    // Link frames land at the same accumulated world positions.
    assert_relative_eq!(
        converted.link("upper").unwrap().pose.position,
        Point3::new(0.0, 0.0, 0.5),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        converted.link("lower").unwrap().pose.position,
        Point3::new(0.0, 0.0, 0.9),
        epsilon = 1e-9
    );
}

#[test]
fn sdf_back_to_urdf_restores_steps() {
    let dir = tempdir().expect("tempdir");
    let sdf_path = dir.path().join("arm.sdf");
    let urdf_path = dir.path().join("arm_back.urdf");

    let body = parse_urdf_str(ARM_URDF, None).expect("parse URDF");
    write_sdf(&body, &sdf_path).expect("write SDF");

    let absolute = load_sdf(&sdf_path).expect("load SDF");
    write_urdf(&absolute, &urdf_path).expect("write URDF");
    let back = load_urdf(&urdf_path).expect("load URDF");

    assert_eq!(back.convention, PoseConvention::Relative);
    assert_relative_eq!(
        back.joint("shoulder").unwrap().pose.position,
        Point3::new(0.0, 0.0, 0.5),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        back.joint("elbow").unwrap().pose.position,
        Point3::new(0.0, 0.0, 0.4),
        epsilon = 1e-9
    );
    assert_relative_eq!(
        back.joint("elbow").unwrap().axis.unwrap(),
        Vector3::y(),
        epsilon = 1e-9
    );
    assert_relative_eq!(back.link("base").unwrap().mass.unwrap(), 4.0);
}

#[test]
fn lone_fixed_joint_becomes_revolute_in_sdf() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("welded.sdf");

    let xml = r#"
        <robot name="welded">
            <link name="a"/>
            <link name="b"/>
            <joint name="mount" type="fixed">
                <parent link="a"/>
                <child link="b"/>
                <origin xyz="0.1 0 0"/>
            </joint>
        </robot>
    "#;

    let body = parse_urdf_str(xml, None).expect("parse URDF");
    write_sdf(&body, &out).expect("write SDF");
    let converted = load_sdf(&out).expect("load SDF");

    let mount = converted.joint("mount").expect("mount");
    assert_eq!(mount.joint_type, JointType::Revolute);
    assert_relative_eq!(
        mount.pose.position,
        Point3::new(0.1, 0.0, 0.0),
        epsilon = 1e-9
    );
}

#[test]
fn fixed_joint_among_others_is_kept_fixed() {
    let dir = tempdir().expect("tempdir");
    let out = dir.path().join("mixed.sdf");

    let xml = r#"
        <robot name="mixed">
            <link name="a"/>
            <link name="b"/>
            <link name="c"/>
            <joint name="mount" type="fixed">
                <parent link="a"/>
                <child link="b"/>
            </joint>
            <joint name="spin" type="continuous">
                <parent link="b"/>
                <child link="c"/>
                <axis xyz="0 0 1"/>
            </joint>
        </robot>
    "#;

    let body = parse_urdf_str(xml, None).expect("parse URDF");
    write_sdf(&body, &out).expect("write SDF");
    let converted = load_sdf(&out).expect("load SDF");

    assert_eq!(
        converted.joint("mount").unwrap().joint_type,
        JointType::Fixed
    );
    assert_eq!(
        converted.joint("spin").unwrap().joint_type,
        JointType::Continuous
    );
}
