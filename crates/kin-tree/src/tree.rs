//! Kinematic graph construction and root finding.

use std::collections::HashMap;

use kin_types::BodyModel;

use crate::error::{Result, TreeError};

/// Derived adjacency of a body's joint graph.
///
/// Built fresh from a body's joints for each conversion; never persisted.
/// Maps are keyed by link name: `parent_joint` finds the joint a link
/// hangs from, `children` drives top-down traversal.
#[derive(Debug)]
pub struct KinematicTree {
    /// The unique link with no incoming joint edge.
    pub root: String,
    /// Child link name to index of the joint whose child it is.
    pub parent_joint: HashMap<String, usize>,
    /// Parent link name to indices of its outgoing joints, in joint order.
    pub children: HashMap<String, Vec<usize>>,
}

impl KinematicTree {
    /// Build the adjacency maps and find the root link.
    ///
    /// # Errors
    ///
    /// - [`TreeError::SharedChild`] if a link has two parent joints
    /// - [`TreeError::MultipleRoots`] if more than one link has no parent
    /// - [`TreeError::Cycle`] if no link qualifies as root while joints
    ///   exist (in a finite graph where every link is some joint's child,
    ///   a directed cycle must exist)
    /// - [`TreeError::NoRoot`] if the body has no links at all
    pub fn build(body: &BodyModel) -> Result<Self> {
        let mut parent_joint: HashMap<String, usize> = HashMap::new();
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();

        for (idx, joint) in body.joints.iter().enumerate() {
            if let Some(&first) = parent_joint.get(&joint.child) {
                return Err(TreeError::SharedChild {
                    link: joint.child.clone(),
                    first: body.joints[first].name.clone(),
                    second: joint.name.clone(),
                });
            }
            parent_joint.insert(joint.child.clone(), idx);
            children
                .entry(joint.parent.clone())
                .or_default()
                .push(idx);
        }

        let roots: Vec<&str> = body
            .links
            .iter()
            .filter(|l| !parent_joint.contains_key(&l.name))
            .map(|l| l.name.as_str())
            .collect();

        let root = match roots.as_slice() {
            [one] => (*one).to_string(),
            [] if body.links.is_empty() => return Err(TreeError::NoRoot),
            [] => {
                // Every link is some joint's child, so following parent
                // edges from any link must eventually revisit one.
                return Err(TreeError::Cycle(format!(
                    "every link has a parent joint (starting from '{}')",
                    body.joints.first().map_or("", |j| j.child.as_str())
                )));
            }
            many => {
                return Err(TreeError::MultipleRoots(
                    many.iter().map(|s| (*s).to_string()).collect(),
                ));
            }
        };

        Ok(Self {
            root,
            parent_joint,
            children,
        })
    }

    /// Outgoing joint indices of a link, empty for leaves.
    #[must_use]
    pub fn children_of(&self, link: &str) -> &[usize] {
        self.children.get(link).map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use kin_types::{JointModel, JointType, LinkModel, PoseConvention};

    fn body(links: &[&str], joints: &[(&str, &str, &str)]) -> BodyModel {
        let mut b = BodyModel::new("test", PoseConvention::Relative);
        for l in links {
            b = b.with_link(LinkModel::new(*l));
        }
        for (name, parent, child) in joints {
            b = b.with_joint(JointModel::new(*name, JointType::Revolute, *parent, *child));
        }
        b
    }

    #[test]
    fn test_chain_root() {
        let b = body(
            &["base", "link1", "link2"],
            &[("j1", "base", "link1"), ("j2", "link1", "link2")],
        );
        let tree = KinematicTree::build(&b).expect("should build");
        assert_eq!(tree.root, "base");
        assert_eq!(tree.children_of("base"), &[0]);
        assert_eq!(tree.children_of("link2"), &[] as &[usize]);
        assert_eq!(tree.parent_joint["link2"], 1);
    }

    #[test]
    fn test_branching() {
        let b = body(
            &["base", "left", "right"],
            &[("jl", "base", "left"), ("jr", "base", "right")],
        );
        let tree = KinematicTree::build(&b).expect("should build");
        assert_eq!(tree.root, "base");
        assert_eq!(tree.children_of("base"), &[0, 1]);
    }

    #[test]
    fn test_two_disjoint_trees() {
        let b = body(
            &["a", "b", "c", "d"],
            &[("j1", "a", "b"), ("j2", "c", "d")],
        );
        match KinematicTree::build(&b) {
            Err(TreeError::MultipleRoots(roots)) => {
                assert_eq!(roots, vec!["a".to_string(), "c".to_string()]);
            }
            other => panic!("expected MultipleRoots, got {other:?}"),
        }
    }

    #[test]
    fn test_three_cycle() {
        let b = body(
            &["a", "b", "c"],
            &[("j1", "a", "b"), ("j2", "b", "c"), ("j3", "c", "a")],
        );
        assert!(matches!(
            KinematicTree::build(&b),
            Err(TreeError::Cycle(_))
        ));
    }

    #[test]
    fn test_shared_child() {
        let b = body(
            &["a", "b", "c"],
            &[("j1", "a", "c"), ("j2", "b", "c")],
        );
        assert!(matches!(
            KinematicTree::build(&b),
            Err(TreeError::SharedChild { .. })
        ));
    }

    #[test]
    fn test_single_link_no_joints() {
        let b = body(&["only"], &[]);
        let tree = KinematicTree::build(&b).expect("should build");
        assert_eq!(tree.root, "only");
    }

    #[test]
    fn test_empty_body() {
        let b = body(&[], &[]);
        assert!(matches!(KinematicTree::build(&b), Err(TreeError::NoRoot)));
    }
}
