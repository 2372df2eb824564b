//! Model validation errors.

use thiserror::Error;

/// Errors raised by canonical-model validation.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Missing or empty required name.
    #[error("empty {field} name in {context}")]
    EmptyName {
        /// Which field is empty.
        field: &'static str,
        /// The entity the field belongs to.
        context: String,
    },

    /// Duplicate link name within one body.
    #[error("duplicate link name: {0}")]
    DuplicateLink(String),

    /// Duplicate joint name within one body.
    #[error("duplicate joint name: {0}")]
    DuplicateJoint(String),

    /// Joint references a link that does not exist in the body.
    #[error("reference to undefined link: {link_name} in joint {joint_name}")]
    UndefinedLink {
        /// The referenced link name.
        link_name: String,
        /// The joint that referenced it.
        joint_name: String,
    },

    /// Joint whose parent and child are the same link.
    #[error("joint {0} connects a link to itself")]
    SelfLoop(String),

    /// Sensor references a link that does not exist in the body.
    #[error("reference to undefined link: {link_name} in sensor {sensor_name}")]
    UndefinedSensorParent {
        /// The referenced link name.
        link_name: String,
        /// The sensor that referenced it.
        sensor_name: String,
    },

    /// Scalar field with a negative or non-finite value.
    #[error("invalid {field} for {entity}: {value}")]
    InvalidScalar {
        /// The entity carrying the field.
        entity: String,
        /// The field name.
        field: &'static str,
        /// The offending value.
        value: f64,
    },
}

impl ModelError {
    /// Create an empty-name error.
    pub fn empty_name(field: &'static str, context: impl Into<String>) -> Self {
        Self::EmptyName {
            field,
            context: context.into(),
        }
    }

    /// Create an undefined-link error.
    pub fn undefined_link(link_name: impl Into<String>, joint_name: impl Into<String>) -> Self {
        Self::UndefinedLink {
            link_name: link_name.into(),
            joint_name: joint_name.into(),
        }
    }

    /// Create an invalid-scalar error.
    pub fn invalid_scalar(entity: impl Into<String>, field: &'static str, value: f64) -> Self {
        Self::InvalidScalar {
            entity: entity.into(),
            field,
            value,
        }
    }
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = ModelError::undefined_link("arm", "elbow");
        assert!(err.to_string().contains("arm"));
        assert!(err.to_string().contains("elbow"));

        let err = ModelError::invalid_scalar("link 'base'", "mass", -2.0);
        assert!(err.to_string().contains("mass"));
        assert!(err.to_string().contains("-2"));
    }
}
