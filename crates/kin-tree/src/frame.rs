//! Relative/absolute frame conversion over the kinematic tree.

use std::collections::HashMap;

use tracing::debug;

use kin_types::{BodyModel, JointType, Pose, PoseConvention, validate};

use crate::error::{Result, TreeError};
use crate::tree::KinematicTree;

/// Frame converter configuration.
///
/// Conversion composes or decomposes joint poses across the tree. Both
/// directions return a fresh model plus the link-to-world-pose map; the
/// input is never mutated.
#[derive(Debug, Clone)]
pub struct FrameConverter {
    /// World pose the root link is seeded with (identity by default).
    pub root_offset: Pose,
    /// Retype a lone fixed joint to revolute before converting to the
    /// absolute convention (on by default; see `to_absolute`).
    pub promote_lone_fixed: bool,
}

impl Default for FrameConverter {
    fn default() -> Self {
        Self {
            root_offset: Pose::identity(),
            promote_lone_fixed: true,
        }
    }
}

impl FrameConverter {
    /// Create a converter with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the world pose of the root link (builder style).
    #[must_use]
    pub fn with_root_offset(mut self, offset: Pose) -> Self {
        self.root_offset = offset;
        self
    }

    /// Enable or disable lone-fixed-joint promotion (builder style).
    #[must_use]
    pub fn with_promote_lone_fixed(mut self, promote: bool) -> Self {
        self.promote_lone_fixed = promote;
        self
    }

    /// Convert joint poses from the relative to the absolute convention.
    ///
    /// Walks depth-first from the root, composing each joint's pose onto
    /// its parent's world pose and re-expressing each axis in the world
    /// frame. Link-local visual, collision and inertial poses deliberately
    /// stay relative to their own link; the absolute dialect keeps local
    /// shape frames even though joints are world-frame.
    ///
    /// A body whose single joint is `fixed` has that joint retyped to
    /// `revolute` first, so consumers that require at least one mobile
    /// degree of freedom stay satisfiable. Compatibility behavior, not a
    /// physical transformation; disable via `promote_lone_fixed`.
    ///
    /// Returns the converted copy and the map from link name to world
    /// pose, ready to thread into a renderer.
    ///
    /// # Errors
    ///
    /// Graph-shape errors from [`KinematicTree::build`], or
    /// [`TreeError::Cycle`] if traversal reaches a link twice or leaves
    /// links unreached.
    pub fn to_absolute(&self, body: &BodyModel) -> Result<(BodyModel, HashMap<String, Pose>)> {
        validate(body)?;
        let mut out = body.clone();

        if self.promote_lone_fixed
            && let [only] = out.joints.as_mut_slice()
            && only.joint_type == JointType::Fixed
        {
            debug!(joint = %only.name, "promoting lone fixed joint to revolute");
            only.joint_type = JointType::Revolute;
        }

        let tree = KinematicTree::build(&out)?;
        let mut world: HashMap<String, Pose> = HashMap::new();
        world.insert(tree.root.clone(), self.root_offset);

        let mut stack: Vec<usize> = tree.children_of(&tree.root).to_vec();
        while let Some(idx) = stack.pop() {
            let (parent, child) = {
                let j = &out.joints[idx];
                (j.parent.clone(), j.child.clone())
            };
            let parent_pose = world
                .get(&parent)
                .copied()
                .ok_or_else(|| TreeError::Cycle(format!("parent '{parent}' not yet placed")))?;
            if world.contains_key(&child) {
                return Err(TreeError::Cycle(format!(
                    "link '{child}' reached by more than one path"
                )));
            }

            let joint = &mut out.joints[idx];
            let abs = parent_pose.compose(&joint.pose);
            joint.pose = abs;
            if let Some(axis) = joint.axis.as_mut() {
                *axis = parent_pose.transform_vector(axis);
            }
            world.insert(child.clone(), abs);
            stack.extend_from_slice(tree.children_of(&child));
        }

        check_all_reached(&out, &world)?;
        out.convention = PoseConvention::Absolute;
        debug!(body = %out.name, links = out.links.len(), "converted to absolute convention");
        Ok((out, world))
    }

    /// Convert joint poses from the absolute to the relative convention.
    ///
    /// Structural inverse of [`Self::to_absolute`]: each joint's relative
    /// pose becomes `world[parent]⁻¹ ∘ world[child]`, each axis is rotated
    /// back into the parent link's frame.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Self::to_absolute`].
    pub fn to_relative(&self, body: &BodyModel) -> Result<(BodyModel, HashMap<String, Pose>)> {
        validate(body)?;
        let mut out = body.clone();
        let tree = KinematicTree::build(&out)?;
        let world = world_poses_of_absolute(&out, &tree, self.root_offset)?;

        for joint in &mut out.joints {
            let parent_pose = &world[&joint.parent];
            let child_pose = &world[&joint.child];
            joint.pose = parent_pose.inverse().compose(child_pose);
            if let Some(axis) = joint.axis.as_mut() {
                *axis = parent_pose.inverse().transform_vector(axis);
            }
        }

        out.convention = PoseConvention::Relative;
        debug!(body = %out.name, links = out.links.len(), "converted to relative convention");
        Ok((out, world))
    }
}

/// World pose of every link of a body already in the absolute convention.
///
/// Under that convention each joint's pose *is* the world pose of its
/// child's frame, so this only walks the tree to pick them up (and to
/// reject cycles and shared structure on the way).
///
/// # Errors
///
/// Graph-shape errors from [`KinematicTree::build`] or [`TreeError::Cycle`].
pub fn link_world_poses(body: &BodyModel) -> Result<HashMap<String, Pose>> {
    let tree = KinematicTree::build(body)?;
    world_poses_of_absolute(body, &tree, Pose::identity())
}

fn world_poses_of_absolute(
    body: &BodyModel,
    tree: &KinematicTree,
    root_pose: Pose,
) -> Result<HashMap<String, Pose>> {
    let mut world: HashMap<String, Pose> = HashMap::new();
    world.insert(tree.root.clone(), root_pose);

    let mut stack: Vec<usize> = tree.children_of(&tree.root).to_vec();
    while let Some(idx) = stack.pop() {
        let joint = &body.joints[idx];
        if world.contains_key(&joint.child) {
            return Err(TreeError::Cycle(format!(
                "link '{}' reached by more than one path",
                joint.child
            )));
        }
        world.insert(joint.child.clone(), joint.pose);
        stack.extend_from_slice(tree.children_of(&joint.child));
    }

    check_all_reached(body, &world)?;
    Ok(world)
}

fn check_all_reached(body: &BodyModel, world: &HashMap<String, Pose>) -> Result<()> {
    if world.len() != body.links.len() {
        let missing: Vec<&str> = body
            .links
            .iter()
            .filter(|l| !world.contains_key(&l.name))
            .map(|l| l.name.as_str())
            .collect();
        return Err(TreeError::Cycle(format!(
            "links unreachable from root: {missing:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Point3, Vector3};

    use kin_types::{JointLimit, JointModel, LinkModel};

    fn translated(x: f64, y: f64, z: f64) -> Pose {
        Pose::from_position(Point3::new(x, y, z))
    }

    fn two_link_chain() -> BodyModel {
        BodyModel::new("arm", PoseConvention::Relative)
            .with_link(LinkModel::new("base"))
            .with_link(LinkModel::new("link1"))
            .with_joint(
                JointModel::new("j1", JointType::Revolute, "base", "link1")
                    .with_pose(translated(1.0, 0.0, 0.0))
                    .with_axis(Vector3::z()),
            )
    }

    #[test]
    fn test_two_link_chain_absolute() {
        let body = two_link_chain();
        let (out, world) = FrameConverter::new().to_absolute(&body).expect("convert");

        assert_eq!(out.convention, PoseConvention::Absolute);
        assert_relative_eq!(
            world["link1"].position,
            Point3::new(1.0, 0.0, 0.0),
            epsilon = 1e-12
        );
        // Input untouched.
        assert_eq!(body.convention, PoseConvention::Relative);
    }

    #[test]
    fn test_three_link_chain_translations_accumulate() {
        let body = two_link_chain().with_link(LinkModel::new("link2")).with_joint(
            JointModel::new("j2", JointType::Revolute, "link1", "link2")
                .with_pose(translated(0.0, 1.0, 0.0))
                .with_axis(Vector3::z()),
        );
        let (_, world) = FrameConverter::new().to_absolute(&body).expect("convert");
        assert_relative_eq!(
            world["link2"].position,
            Point3::new(1.0, 1.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rotated_parent_rotates_child_offset_and_axis() {
        let yaw90 = Pose::from_euler(
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, std::f64::consts::FRAC_PI_2),
        );
        let body = BodyModel::new("arm", PoseConvention::Relative)
            .with_link(LinkModel::new("base"))
            .with_link(LinkModel::new("link1"))
            .with_link(LinkModel::new("link2"))
            .with_joint(
                JointModel::new("j1", JointType::Revolute, "base", "link1")
                    .with_pose(yaw90)
                    .with_axis(Vector3::z()),
            )
            .with_joint(
                JointModel::new("j2", JointType::Revolute, "link1", "link2")
                    .with_pose(translated(1.0, 0.0, 0.0))
                    .with_axis(Vector3::x()),
            );

        let (out, world) = FrameConverter::new().to_absolute(&body).expect("convert");
        // link2 offset (1,0,0) in link1's yawed frame lands at +Y.
        assert_relative_eq!(
            world["link2"].position,
            Point3::new(0.0, 1.0, 0.0),
            epsilon = 1e-12
        );
        // j2's X axis re-expressed in the world frame becomes +Y.
        let axis = out.joint("j2").and_then(|j| j.axis).expect("axis");
        assert_relative_eq!(axis, Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_lone_fixed_joint_promoted() {
        let body = BodyModel::new("fixture", PoseConvention::Relative)
            .with_link(LinkModel::new("base"))
            .with_link(LinkModel::new("arm"))
            .with_joint(
                JointModel::new("weld", JointType::Fixed, "base", "arm")
                    .with_pose(translated(0.0, 0.0, 0.5)),
            );

        let (out, world) = FrameConverter::new().to_absolute(&body).expect("convert");
        assert_eq!(
            out.joint("weld").map(|j| j.joint_type),
            Some(JointType::Revolute)
        );
        // Pose composition unaffected by the retype.
        assert_relative_eq!(
            world["arm"].position,
            Point3::new(0.0, 0.0, 0.5),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_promotion_disabled() {
        let body = BodyModel::new("fixture", PoseConvention::Relative)
            .with_link(LinkModel::new("base"))
            .with_link(LinkModel::new("arm"))
            .with_joint(JointModel::new("weld", JointType::Fixed, "base", "arm"));

        let converter = FrameConverter::new().with_promote_lone_fixed(false);
        let (out, _) = converter.to_absolute(&body).expect("convert");
        assert_eq!(out.joint("weld").map(|j| j.joint_type), Some(JointType::Fixed));
    }

    #[test]
    fn test_fixed_joint_not_promoted_among_others() {
        let body = two_link_chain().with_link(LinkModel::new("tool")).with_joint(
            JointModel::new("mount", JointType::Fixed, "link1", "tool"),
        );
        let (out, _) = FrameConverter::new().to_absolute(&body).expect("convert");
        assert_eq!(
            out.joint("mount").map(|j| j.joint_type),
            Some(JointType::Fixed)
        );
    }

    #[test]
    fn test_root_offset() {
        let body = two_link_chain();
        let converter =
            FrameConverter::new().with_root_offset(translated(0.0, 0.0, 0.3));
        let (_, world) = converter.to_absolute(&body).expect("convert");
        assert_relative_eq!(
            world["link1"].position,
            Point3::new(1.0, 0.0, 0.3),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_roundtrip_identity() {
        let rpy = Vector3::new(0.2, -0.4, 1.1);
        let body = BodyModel::new("arm", PoseConvention::Relative)
            .with_link(LinkModel::new("base"))
            .with_link(LinkModel::new("link1"))
            .with_link(LinkModel::new("link2"))
            .with_joint(
                JointModel::new("j1", JointType::Revolute, "base", "link1")
                    .with_pose(Pose::from_euler(Vector3::new(1.0, 0.5, -0.2), rpy))
                    .with_axis(Vector3::new(0.0, 1.0, 0.0))
                    .with_limit(JointLimit { upper: 1.5, lower: -1.5 }),
            )
            .with_joint(
                JointModel::new("j2", JointType::Prismatic, "link1", "link2")
                    .with_pose(Pose::from_euler(
                        Vector3::new(0.0, 0.8, 0.1),
                        Vector3::new(-0.3, 0.0, 0.6),
                    ))
                    .with_axis(Vector3::x()),
            );

        let converter = FrameConverter::new();
        let (absolute, _) = converter.to_absolute(&body).expect("to absolute");
        let (back, _) = converter.to_relative(&absolute).expect("to relative");

        assert_eq!(back.convention, PoseConvention::Relative);
        for (orig, round) in body.joints.iter().zip(back.joints.iter()) {
            assert_relative_eq!(orig.pose.position, round.pose.position, epsilon = 1e-9);
            assert_relative_eq!(
                orig.pose.rotation.angle_to(&round.pose.rotation),
                0.0,
                epsilon = 1e-9
            );
            let (a, b) = (orig.axis.expect("axis"), round.axis.expect("axis"));
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_disjoint_trees_fail() {
        let body = BodyModel::new("pair", PoseConvention::Relative)
            .with_link(LinkModel::new("a"))
            .with_link(LinkModel::new("b"))
            .with_link(LinkModel::new("c"))
            .with_link(LinkModel::new("d"))
            .with_joint(JointModel::new("j1", JointType::Revolute, "a", "b"))
            .with_joint(JointModel::new("j2", JointType::Revolute, "c", "d"));

        assert!(matches!(
            FrameConverter::new().to_absolute(&body),
            Err(TreeError::MultipleRoots(_))
        ));
    }

    #[test]
    fn test_cycle_fails_without_looping() {
        let body = BodyModel::new("ring", PoseConvention::Relative)
            .with_link(LinkModel::new("a"))
            .with_link(LinkModel::new("b"))
            .with_link(LinkModel::new("c"))
            .with_joint(JointModel::new("j1", JointType::Revolute, "a", "b"))
            .with_joint(JointModel::new("j2", JointType::Revolute, "b", "c"))
            .with_joint(JointModel::new("j3", JointType::Revolute, "c", "a"));

        assert!(matches!(
            FrameConverter::new().to_absolute(&body),
            Err(TreeError::Cycle(_))
        ));
    }

    #[test]
    fn test_cycle_detached_from_root_fails() {
        // Valid root plus a ring the root cannot reach.
        let body = BodyModel::new("orphan", PoseConvention::Relative)
            .with_link(LinkModel::new("root"))
            .with_link(LinkModel::new("a"))
            .with_link(LinkModel::new("b"))
            .with_joint(JointModel::new("j1", JointType::Revolute, "a", "b"))
            .with_joint(JointModel::new("j2", JointType::Revolute, "b", "a"));

        assert!(matches!(
            FrameConverter::new().to_absolute(&body),
            Err(TreeError::SharedChild { .. }) | Err(TreeError::Cycle(_))
        ));
    }

    #[test]
    fn test_link_world_poses_of_absolute_body() {
        let body = two_link_chain();
        let (absolute, expected) = FrameConverter::new().to_absolute(&body).expect("convert");
        let world = link_world_poses(&absolute).expect("poses");
        assert_relative_eq!(
            world["link1"].position,
            expected["link1"].position,
            epsilon = 1e-12
        );
        assert_relative_eq!(world["base"].position, Point3::origin(), epsilon = 1e-12);
    }

    #[test]
    fn test_local_shape_poses_untouched() {
        use kin_types::{ShapeGeometry, ShapeModel};
        let shape_pose = translated(0.0, 0.0, 0.25);
        let body = BodyModel::new("arm", PoseConvention::Relative)
            .with_link(LinkModel::new("base"))
            .with_link(
                LinkModel::new("link1").with_visual(
                    ShapeModel::new("link1-visual0", ShapeGeometry::Sphere { radius: 0.1 })
                        .with_pose(shape_pose),
                ),
            )
            .with_joint(
                JointModel::new("j1", JointType::Revolute, "base", "link1")
                    .with_pose(translated(1.0, 0.0, 0.0)),
            );

        let (out, _) = FrameConverter::new().to_absolute(&body).expect("convert");
        let visual = &out.link("link1").expect("link").visuals[0];
        assert_relative_eq!(visual.pose.position, shape_pose.position, epsilon = 1e-12);
    }
}
