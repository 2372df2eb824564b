//! Rigid-body pose as translation plus unit quaternion.

use nalgebra::{Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid-body pose: translation and rotation.
///
/// Immutable value type. Whether the pose is expressed in the parent frame
/// or the world frame is a property of the owning model
/// (see `PoseConvention`), not of the pose itself.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Translation in meters.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// The identity pose (origin, no rotation).
    #[must_use]
    pub fn identity() -> Self {
        Self {
            position: Point3::origin(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from a translation (identity rotation).
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Create a pose from translation and rotation.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// Create a pose from a translation and roll-pitch-yaw Euler angles.
    ///
    /// Euler input from the XML dialects is converted to a quaternion here,
    /// once at ingestion, and never re-derived afterwards.
    #[must_use]
    pub fn from_euler(xyz: Vector3<f64>, rpy: Vector3<f64>) -> Self {
        Self {
            position: Point3::from(xyz),
            rotation: UnitQuaternion::from_euler_angles(rpy.x, rpy.y, rpy.z),
        }
    }

    /// Roll-pitch-yaw Euler angles of the rotation.
    #[must_use]
    pub fn to_euler(&self) -> Vector3<f64> {
        let (roll, pitch, yaw) = self.rotation.euler_angles();
        Vector3::new(roll, pitch, yaw)
    }

    /// Compose: apply `inner` in this pose's frame.
    ///
    /// The rotation is renormalized so that quaternion drift stays bounded
    /// over long composition chains.
    #[must_use]
    pub fn compose(&self, inner: &Self) -> Self {
        let rotation =
            UnitQuaternion::new_normalize((self.rotation * inner.rotation).into_inner());
        Self {
            position: self.position + self.rotation * inner.position.coords,
            rotation,
        }
    }

    /// The inverse pose: `pose.compose(&pose.inverse())` is identity.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            position: Point3::from(-(inv_rotation * self.position.coords)),
            rotation: inv_rotation,
        }
    }

    /// Transform a point from this pose's frame to the outer frame.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Transform a direction (rotation only; directions are
    /// translation-invariant).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }
}
