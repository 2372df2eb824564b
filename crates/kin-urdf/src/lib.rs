//! URDF reader and writer for kinconv.
//!
//! URDF documents use the relative pose convention: each joint origin
//! places the child frame in the parent frame. Parsing produces a
//! [`kin_types::BodyModel`] tagged [`kin_types::PoseConvention::Relative`];
//! writing accepts either convention and normalizes absolute poses
//! through `kin-tree` before emission.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod parser;
mod writer;

pub use error::{Result, UrdfError};
pub use parser::{load_urdf, load_urdf_with_assets, parse_urdf_str, parse_urdf_str_with};
pub use writer::write_urdf;
