//! Canonical model types for the kinconv robot-model converter.
//!
//! Every format adapter reads from and writes to the types in this crate:
//! a [`BodyModel`] owns its links, joints and sensors, and records which
//! pose convention ([`PoseConvention`]) its joint poses are currently
//! expressed in. Mesh-typed shapes own their geometry payload
//! ([`MeshData`]) exclusively.
//!
//! This crate is pure data plus validation; the frame-conversion
//! algorithms live in `kin-tree` and the dialect adapters in `kin-urdf`
//! and `kin-sdf`.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod mesh;
mod model;
mod pose;
mod validation;

pub use error::{ModelError, Result};
pub use mesh::MeshData;
pub use model::{
    BodyModel, Inertia, JointLimit, JointModel, JointType, LinkModel, PoseConvention,
    SensorModel, ShapeGeometry, ShapeModel,
};
pub use pose::Pose;
pub use validation::validate;
