//! Graph-shape and conversion errors.

use thiserror::Error;

use kin_types::ModelError;

/// Errors from kinematic-tree construction and frame conversion.
#[derive(Debug, Error)]
pub enum TreeError {
    /// More than one link has no incoming joint edge.
    #[error("multiple root links found: {0:?}")]
    MultipleRoots(Vec<String>),

    /// No link qualifies as root.
    #[error("no root link found")]
    NoRoot,

    /// The joint graph contains a cycle or an unreachable sub-graph.
    #[error("kinematic cycle detected: {0}")]
    Cycle(String),

    /// A link is the child of more than one joint.
    #[error("link '{link}' is the child of joints '{first}' and '{second}'")]
    SharedChild {
        /// The link with two parents.
        link: String,
        /// Name of the first joint claiming it.
        first: String,
        /// Name of the second joint claiming it.
        second: String,
    },

    /// The model failed validation before conversion.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;
