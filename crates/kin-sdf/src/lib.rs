//! SDF reader and writer for kinconv.
//!
//! SDF documents use the absolute pose convention: every pose element
//! places its frame in the model frame. Parsing produces a
//! [`kin_types::BodyModel`] tagged [`kin_types::PoseConvention::Absolute`];
//! writing accepts either convention and normalizes relative poses
//! through `kin-tree` before emission. A `.world` destination produces
//! the Gazebo model-database bundle layout.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod error;
mod parser;
mod writer;

pub use error::{Result, SdfError};
pub use parser::{load_sdf, load_sdf_with_assets, parse_sdf_str, parse_sdf_str_with};
pub use writer::write_sdf;
