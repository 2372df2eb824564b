//! Kinematic tree construction and frame conversion.
//!
//! A body's joints induce a directed graph over its links. This crate
//! builds that graph ([`KinematicTree`]), finds its unique root, and
//! converts joint poses and axes between the relative convention (each
//! pose in the parent link's frame, as URDF uses) and the absolute
//! convention (world frame, as SDF uses).
//!
//! Conversion is purely functional: [`FrameConverter::to_absolute`] and
//! [`FrameConverter::to_relative`] return a converted copy plus the
//! link-to-world-pose map, and never mutate the model the caller holds.
//! That keeps several writers safe to run from one parsed model.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod frame;
mod tree;

pub use error::{Result, TreeError};
pub use frame::{FrameConverter, link_world_poses};
pub use tree::KinematicTree;
