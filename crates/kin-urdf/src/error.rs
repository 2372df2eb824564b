//! Error types for URDF reading and writing.

use thiserror::Error;

/// Result type for URDF operations.
pub type Result<T> = std::result::Result<T, UrdfError>;

/// Errors that can occur while reading or writing URDF documents.
#[derive(Debug, Error)]
pub enum UrdfError {
    /// XML parsing error.
    #[error("XML parse error: {0}")]
    XmlParse(String),

    /// Missing required element.
    #[error("missing required element: {element} in {context}")]
    MissingElement {
        /// The missing element name.
        element: &'static str,
        /// Where the element was expected.
        context: String,
    },

    /// Missing required attribute.
    #[error("missing required attribute: {attribute} on {element}")]
    MissingAttribute {
        /// The missing attribute name.
        attribute: &'static str,
        /// The element that should have the attribute.
        element: String,
    },

    /// Invalid attribute value.
    #[error("invalid value for {attribute} on {element}: {message}")]
    InvalidAttribute {
        /// The attribute with the invalid value.
        attribute: &'static str,
        /// The element containing the attribute.
        element: String,
        /// Description of why the value is invalid.
        message: String,
    },

    /// Unknown joint type keyword.
    #[error("unknown joint type: {0}")]
    UnknownJointType(String),

    /// Geometry element that is not a supported shape.
    #[error("unsupported geometry: {0}")]
    UnknownGeometry(String),

    /// Model-level validation failure.
    #[error(transparent)]
    Model(#[from] kin_types::ModelError),

    /// Kinematic structure failure during pose normalization.
    #[error(transparent)]
    Tree(#[from] kin_tree::TreeError),

    /// Mesh codec failure for a referenced geometry file.
    #[error(transparent)]
    Mesh(#[from] kin_mesh::MeshError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UrdfError {
    /// Create a `MissingElement` error.
    #[must_use]
    pub fn missing_element(element: &'static str, context: impl Into<String>) -> Self {
        Self::MissingElement {
            element,
            context: context.into(),
        }
    }

    /// Create a `MissingAttribute` error.
    #[must_use]
    pub fn missing_attribute(attribute: &'static str, element: impl Into<String>) -> Self {
        Self::MissingAttribute {
            attribute,
            element: element.into(),
        }
    }

    /// Create an `InvalidAttribute` error.
    #[must_use]
    pub fn invalid_attribute(
        attribute: &'static str,
        element: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            attribute,
            element: element.into(),
            message: message.into(),
        }
    }
}
