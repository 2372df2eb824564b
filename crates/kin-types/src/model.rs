//! Canonical model entities: body, link, joint, shape, sensor.
//!
//! These types are the single representation every dialect adapter reads
//! from and writes to. They own their contents; one instance lives for one
//! conversion run.

use nalgebra::{Matrix3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mesh::MeshData;
use crate::pose::Pose;

/// Which frame the joint poses of a body are currently expressed in.
///
/// URDF expresses each joint pose in the parent link's frame; SDF expresses
/// it in the world frame. The frame converter in `kin-tree` translates
/// between the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PoseConvention {
    /// Each pose is relative to its immediate parent's frame.
    Relative,
    /// Each pose is expressed in the world frame.
    Absolute,
}

/// A multi-body kinematic structure.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyModel {
    /// Body name, unique within a project.
    pub name: String,
    /// Root pose of the body.
    pub pose: Pose,
    /// Convention the joint poses are expressed in.
    pub convention: PoseConvention,
    /// Links, in document order.
    pub links: Vec<LinkModel>,
    /// Joints, in document order.
    pub joints: Vec<JointModel>,
    /// Sensors, in document order.
    pub sensors: Vec<SensorModel>,
}

impl BodyModel {
    /// Create an empty body with the given name and convention.
    #[must_use]
    pub fn new(name: impl Into<String>, convention: PoseConvention) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            convention,
            links: Vec::new(),
            joints: Vec::new(),
            sensors: Vec::new(),
        }
    }

    /// Add a link (builder style).
    #[must_use]
    pub fn with_link(mut self, link: LinkModel) -> Self {
        self.links.push(link);
        self
    }

    /// Add a joint (builder style).
    #[must_use]
    pub fn with_joint(mut self, joint: JointModel) -> Self {
        self.joints.push(joint);
        self
    }

    /// Add a sensor (builder style).
    #[must_use]
    pub fn with_sensor(mut self, sensor: SensorModel) -> Self {
        self.sensors.push(sensor);
        self
    }

    /// Look up a link by name.
    #[must_use]
    pub fn link(&self, name: &str) -> Option<&LinkModel> {
        self.links.iter().find(|l| l.name == name)
    }

    /// Look up a joint by name.
    #[must_use]
    pub fn joint(&self, name: &str) -> Option<&JointModel> {
        self.joints.iter().find(|j| j.name == name)
    }
}

/// A single rigid link.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkModel {
    /// Link name, unique within a body.
    pub name: String,
    /// Link pose under the body's declared convention.
    pub pose: Pose,
    /// Mass in kilograms, if declared.
    pub mass: Option<f64>,
    /// Center of mass relative to the link frame, if declared.
    pub center_of_mass: Option<Vector3<f64>>,
    /// Inertia about the center of mass, if declared.
    pub inertia: Option<Inertia>,
    /// Visual shapes, relative to the link frame.
    pub visuals: Vec<ShapeModel>,
    /// Collision shapes, relative to the link frame.
    pub collisions: Vec<ShapeModel>,
}

impl LinkModel {
    /// Create a bare link with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            mass: None,
            center_of_mass: None,
            inertia: None,
            visuals: Vec::new(),
            collisions: Vec::new(),
        }
    }

    /// Set the link pose (builder style).
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the mass (builder style).
    #[must_use]
    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = Some(mass);
        self
    }

    /// Add a visual shape (builder style).
    #[must_use]
    pub fn with_visual(mut self, shape: ShapeModel) -> Self {
        self.visuals.push(shape);
        self
    }

    /// Add a collision shape (builder style).
    #[must_use]
    pub fn with_collision(mut self, shape: ShapeModel) -> Self {
        self.collisions.push(shape);
        self
    }
}

/// Symmetric inertia tensor, six independent components.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Inertia {
    /// Ixx component.
    pub ixx: f64,
    /// Ixy component.
    pub ixy: f64,
    /// Ixz component.
    pub ixz: f64,
    /// Iyy component.
    pub iyy: f64,
    /// Iyz component.
    pub iyz: f64,
    /// Izz component.
    pub izz: f64,
}

impl Inertia {
    /// Expand to the full symmetric 3x3 matrix.
    #[must_use]
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.ixx, self.ixy, self.ixz, //
            self.ixy, self.iyy, self.iyz, //
            self.ixz, self.iyz, self.izz,
        )
    }
}

/// Joint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JointType {
    /// No relative motion.
    Fixed,
    /// Rotation about the axis, with limits.
    Revolute,
    /// Translation along the axis.
    Prismatic,
    /// Coupled rotation and translation about the axis.
    Screw,
    /// Unlimited rotation about the axis.
    Continuous,
}

impl JointType {
    /// Parse the dialect keyword. Both dialects use the same set.
    #[must_use]
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "fixed" => Some(Self::Fixed),
            "revolute" => Some(Self::Revolute),
            "prismatic" => Some(Self::Prismatic),
            "screw" => Some(Self::Screw),
            "continuous" => Some(Self::Continuous),
            _ => None,
        }
    }

    /// The dialect keyword for this type.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::Revolute => "revolute",
            Self::Prismatic => "prismatic",
            Self::Screw => "screw",
            Self::Continuous => "continuous",
        }
    }

    /// True for types whose axis is meaningful.
    #[must_use]
    pub const fn has_axis(&self) -> bool {
        !matches!(self, Self::Fixed)
    }
}

/// Joint position limit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointLimit {
    /// Upper position limit in radians or meters.
    pub upper: f64,
    /// Lower position limit in radians or meters.
    pub lower: f64,
}

/// A joint connecting a parent link to a child link.
///
/// Under the relative convention the pose is the joint frame relative to
/// the parent link's frame; under the absolute convention it is expressed
/// in the world frame.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointModel {
    /// Joint name, unique within a body.
    pub name: String,
    /// Joint type.
    pub joint_type: JointType,
    /// Name of the parent link.
    pub parent: String,
    /// Name of the child link.
    pub child: String,
    /// Joint frame pose under the body's declared convention.
    pub pose: Pose,
    /// Motion axis, expressed in the same convention as the pose.
    pub axis: Option<Vector3<f64>>,
    /// Viscous damping coefficient.
    pub damping: Option<f64>,
    /// Static friction.
    pub friction: Option<f64>,
    /// Position limit.
    pub limit: Option<JointLimit>,
    /// Velocity limit as a signed (upper, lower) pair.
    pub velocity_limit: Option<(f64, f64)>,
}

impl JointModel {
    /// Create a joint with no pose, axis, limits or dynamics.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        joint_type: JointType,
        parent: impl Into<String>,
        child: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            joint_type,
            parent: parent.into(),
            child: child.into(),
            pose: Pose::identity(),
            axis: None,
            damping: None,
            friction: None,
            limit: None,
            velocity_limit: None,
        }
    }

    /// Set the joint pose (builder style).
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// Set the motion axis (builder style).
    #[must_use]
    pub fn with_axis(mut self, axis: Vector3<f64>) -> Self {
        self.axis = Some(axis);
        self
    }

    /// Set the position limit (builder style).
    #[must_use]
    pub fn with_limit(mut self, limit: JointLimit) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Shape geometry payload.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ShapeGeometry {
    /// Mesh geometry; the shape owns the data exclusively.
    Mesh {
        /// Decoded mesh payload.
        mesh: MeshData,
        /// Uniform scale factor, if the source declared one.
        scale: Option<f64>,
    },
    /// Axis-aligned box with full extents.
    Box {
        /// Extent along X in meters.
        x: f64,
        /// Extent along Y in meters.
        y: f64,
        /// Extent along Z in meters.
        z: f64,
    },
    /// Cylinder along the local Z axis.
    Cylinder {
        /// Radius in meters.
        radius: f64,
        /// Full height in meters.
        height: f64,
    },
    /// Cone along the local Z axis.
    Cone {
        /// Base radius in meters.
        radius: f64,
        /// Full height in meters.
        height: f64,
    },
    /// Sphere.
    Sphere {
        /// Radius in meters.
        radius: f64,
    },
    /// Infinite plane.
    Plane {
        /// Plane normal.
        normal: Vector3<f64>,
    },
}

/// A visual or collision shape attached to a link.
///
/// The shape pose stays relative to the owning link in both conventions;
/// only joint poses are re-expressed by the frame converter.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeModel {
    /// Display name; mesh companion files are named after it.
    pub name: String,
    /// Pose relative to the owning link.
    pub pose: Pose,
    /// Geometry payload.
    pub geometry: ShapeGeometry,
}

impl ShapeModel {
    /// Create a shape at the link origin.
    #[must_use]
    pub fn new(name: impl Into<String>, geometry: ShapeGeometry) -> Self {
        Self {
            name: name.into(),
            pose: Pose::identity(),
            geometry,
        }
    }

    /// Set the shape pose (builder style).
    #[must_use]
    pub fn with_pose(mut self, pose: Pose) -> Self {
        self.pose = pose;
        self
    }

    /// True for mesh-typed shapes.
    #[must_use]
    pub const fn is_mesh(&self) -> bool {
        matches!(self.geometry, ShapeGeometry::Mesh { .. })
    }
}

/// A sensor attached to a link.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SensorModel {
    /// Sensor name.
    pub name: String,
    /// Sensor type keyword, passed through untouched.
    pub sensor_type: String,
    /// Name of the link the sensor is mounted on.
    pub parent: String,
    /// Pose relative to the parent link.
    pub pose: Pose,
}
