//! Canonical-model validation.
//!
//! Readers run this after construction and writers before rendering, so a
//! model that crosses a crate boundary has already been checked once.

use std::collections::HashSet;

use crate::error::{ModelError, Result};
use crate::model::BodyModel;

/// Validate a body model.
///
/// Checks, in order:
/// - body and entity names are non-empty, link/joint names unique
/// - every joint's parent and child resolve to links of the same body
/// - no joint connects a link to itself
/// - every sensor's parent resolves
/// - mass, damping and friction are finite and non-negative
///
/// # Errors
///
/// Returns the first violation found, naming the offending entity and
/// field.
pub fn validate(body: &BodyModel) -> Result<()> {
    if body.name.is_empty() {
        return Err(ModelError::empty_name("body", "model"));
    }

    let mut link_names: HashSet<&str> = HashSet::new();
    for link in &body.links {
        if link.name.is_empty() {
            return Err(ModelError::empty_name("link", format!("body '{}'", body.name)));
        }
        if !link_names.insert(&link.name) {
            return Err(ModelError::DuplicateLink(link.name.clone()));
        }
        if let Some(mass) = link.mass {
            if !mass.is_finite() || mass < 0.0 {
                return Err(ModelError::invalid_scalar(
                    format!("link '{}'", link.name),
                    "mass",
                    mass,
                ));
            }
        }
    }

    let mut joint_names: HashSet<&str> = HashSet::new();
    for joint in &body.joints {
        if joint.name.is_empty() {
            return Err(ModelError::empty_name("joint", format!("body '{}'", body.name)));
        }
        if !joint_names.insert(&joint.name) {
            return Err(ModelError::DuplicateJoint(joint.name.clone()));
        }
        if joint.parent == joint.child {
            return Err(ModelError::SelfLoop(joint.name.clone()));
        }
        if !link_names.contains(joint.parent.as_str()) {
            return Err(ModelError::undefined_link(&joint.parent, &joint.name));
        }
        if !link_names.contains(joint.child.as_str()) {
            return Err(ModelError::undefined_link(&joint.child, &joint.name));
        }
        for (field, value) in [("damping", joint.damping), ("friction", joint.friction)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(ModelError::invalid_scalar(
                        format!("joint '{}'", joint.name),
                        field,
                        v,
                    ));
                }
            }
        }
    }

    for sensor in &body.sensors {
        if !link_names.contains(sensor.parent.as_str()) {
            return Err(ModelError::UndefinedSensorParent {
                link_name: sensor.parent.clone(),
                sensor_name: sensor.name.clone(),
            });
        }
    }

    Ok(())
}
