//! Gradient descent inverse kinematics for [`Skeleton`].

use log::{debug, trace};

use crate::{Error, JointId, Result, Skeleton, Vector};

/// Settings for [`Skeleton::solve_pose_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct SolverConfig {
    /// The solver stops once the magnitude of the gradient is at or below
    /// this value.
    pub tolerance: f64,
    /// The initial step size. The step size is halved every time an iteration
    /// ends up with a higher cost than the iteration before it.
    pub step_size: f64,
    /// The maximum number of iterations to perform. `None` iterates until the
    /// gradient is within `tolerance`.
    pub max_iterations: Option<usize>,
    /// When true, the root position is never moved by the solver.
    pub pin_root: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.05,
            step_size: 0.1,
            max_iterations: None,
            pin_root: false,
        }
    }
}

impl SolverConfig {
    /// Limits the solver to `max_iterations` and returns self.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Sets the convergence tolerance and returns self.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Sets the initial step size and returns self.
    #[must_use]
    pub fn with_step_size(mut self, step_size: f64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Keeps the root in place while solving and returns self.
    #[must_use]
    pub fn pinned_root(mut self) -> Self {
        self.pin_root = true;
        self
    }
}

/// A summary of a finished [`Skeleton::solve_pose`] call.
///
/// Not converging is an expected outcome for unreachable targets; the pose is
/// left wherever the last iteration moved it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    /// The number of iterations performed.
    pub iterations: usize,
    /// True if the gradient magnitude reached the tolerance.
    pub converged: bool,
    /// The cost evaluated by the final iteration, before its update was
    /// applied. Infinite if no iterations were performed.
    pub cost: f64,
    /// The gradient magnitude of the final iteration. Infinite if no
    /// iterations were performed.
    pub gradient_magnitude: f64,
    /// The step size used by the final iteration.
    pub step_size: f64,
}

#[derive(Debug)]
struct Gradient {
    root: Vector,
    angles: Vec<f64>,
}

impl Gradient {
    fn new(joint_count: usize) -> Self {
        Self {
            root: Vector::ZERO,
            angles: vec![0.; joint_count],
        }
    }

    fn clear(&mut self) {
        self.root = Vector::ZERO;
        self.angles.fill(0.);
    }

    fn magnitude(&self, include_root: bool) -> f64 {
        let angles = self.angles.iter().map(|slope| slope * slope).sum::<f64>();
        let root = if include_root {
            self.root.squared_magnitude()
        } else {
            0.
        };
        (root + angles).sqrt()
    }
}

impl Skeleton {
    /// Moves the root and rotates joints so that each joint in `targets` gets
    /// as close as possible to its target position.
    ///
    /// Runs until the gradient is small, or for at most `max_iterations` when
    /// provided. Interactive callers should always provide a limit. Without a
    /// limit at least one update is applied; `Some(0)` performs no updates and
    /// leaves the skeleton untouched.
    ///
    /// Unknown joints and non-finite target positions are rejected before the
    /// skeleton is modified.
    pub fn solve_pose(
        &mut self,
        targets: &[(JointId, Vector)],
        max_iterations: Option<usize>,
    ) -> Result<Solution> {
        self.solve_pose_with(
            targets,
            &SolverConfig {
                max_iterations,
                ..SolverConfig::default()
            },
        )
    }

    /// Solves for `targets` using the settings in `config`. See
    /// [`Skeleton::solve_pose`].
    pub fn solve_pose_with(
        &mut self,
        targets: &[(JointId, Vector)],
        config: &SolverConfig,
    ) -> Result<Solution> {
        self.check_targets(targets)?;

        let mut gradient = Gradient::new(self.joints.len());
        let mut step_size = config.step_size;
        let mut previous_cost = f64::INFINITY;
        let mut cost = f64::INFINITY;
        let mut gradient_magnitude = f64::INFINITY;
        let mut iterations = 0;

        while !config
            .max_iterations
            .is_some_and(|max_iterations| iterations >= max_iterations)
        {
            let positions = self.positions()?;
            cost = pose_cost(&positions, targets);
            self.accumulate_gradient(&positions, targets, &mut gradient);

            if cost > previous_cost {
                step_size /= 2.;
            }

            if !config.pin_root {
                self.root_position -= step_size * gradient.root;
            }
            for (joint, slope) in self.joints.iter_mut().zip(&gradient.angles).skip(1) {
                joint.angle = joint.angle - step_size * slope;
            }

            gradient_magnitude = gradient.magnitude(!config.pin_root);
            previous_cost = cost;
            iterations += 1;
            trace!("iteration {iterations}: cost {cost}, gradient {gradient_magnitude}, step {step_size}");

            if gradient_magnitude <= config.tolerance {
                break;
            }
        }

        let converged = gradient_magnitude <= config.tolerance;
        debug!(
            "pose solver stopped after {iterations} iterations (converged: {converged}, cost: {cost})"
        );
        Ok(Solution {
            iterations,
            converged,
            cost,
            gradient_magnitude,
            step_size,
        })
    }

    /// Returns the sum of the squared distances between each joint in
    /// `targets` and its target position.
    pub fn cost(&self, targets: &[(JointId, Vector)]) -> Result<f64> {
        self.check_targets(targets)?;
        Ok(pose_cost(&self.positions()?, targets))
    }

    fn check_targets(&self, targets: &[(JointId, Vector)]) -> Result<()> {
        for &(joint, target) in targets {
            if joint.0 >= self.joints.len() {
                return Err(Error::UnknownJoint(joint));
            }
            if !target.is_finite() {
                return Err(Error::InvalidTarget(joint));
            }
        }
        Ok(())
    }

    fn accumulate_gradient(
        &self,
        positions: &[Vector],
        targets: &[(JointId, Vector)],
        gradient: &mut Gradient,
    ) {
        gradient.clear();
        for &(joint, target) in targets {
            let effector = positions[joint.0];
            let error = 2. * (effector - target);
            gradient.root += error;

            // Rotating a joint swings every descendant around the joint's
            // parent, so only the target's own lineage is affected.
            for ancestor in self.lineage(joint) {
                if let Some(pivot) = self.joints[ancestor.0].parent {
                    let swing = (effector - positions[pivot.0]).perpendicular();
                    gradient.angles[ancestor.0] += error.dot(swing);
                }
            }
        }
    }
}

fn pose_cost(positions: &[Vector], targets: &[(JointId, Vector)]) -> f64 {
    targets
        .iter()
        .map(|&(joint, target)| (positions[joint.0] - target).squared_magnitude())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Angle;

    fn arm(lengths: &[f64]) -> (Skeleton, Vec<JointId>) {
        let mut skeleton = Skeleton::default();
        let mut joints = Vec::new();
        let mut parent = JointId::ROOT;
        for &length in lengths {
            parent = skeleton
                .add_joint(parent, length, Angle::ZERO)
                .expect("parent exists");
            joints.push(parent);
        }
        (skeleton, joints)
    }

    #[test]
    fn unreachable_target_with_pinned_root() {
        let (mut skeleton, joints) = arm(&[1.]);
        let target = Vector::new(3., 3.);
        let solution = skeleton
            .solve_pose_with(
                &[(joints[0], target)],
                &SolverConfig::default().pinned_root().with_max_iterations(1_000),
            )
            .expect("valid targets");
        assert!(solution.converged, "{solution:?}");

        let position = skeleton.position_of(joints[0]).expect("valid");
        assert_eq!(skeleton.root_position(), Vector::ZERO);
        assert!((position.magnitude() - 1.).abs() < 1e-9);
        let direction = target.normalized().expect("non-zero");
        assert!(position.distance(direction) < 0.01, "{position:?}");
    }

    #[test]
    fn free_root_reaches_target() {
        let (mut skeleton, joints) = arm(&[1.]);
        let target = Vector::new(4., 3.);
        let solution = skeleton
            .solve_pose(&[(joints[0], target)], Some(1_000))
            .expect("valid targets");
        assert!(solution.converged, "{solution:?}");

        let positions = skeleton.positions().expect("valid");
        assert!((positions[1].distance(positions[0]) - 1.).abs() < 1e-9);
        assert!(positions[1].distance(target) < 0.05, "{positions:?}");
    }

    #[test]
    fn locked_joint_stays_near_its_target() {
        let (mut skeleton, joints) = arm(&[1., 1., 1.]);
        let tip = joints[2];
        let targets = [(JointId::ROOT, Vector::ZERO), (tip, Vector::new(1.5, 1.5))];
        let before = skeleton.cost(&targets).expect("valid targets");
        let solution = skeleton
            .solve_pose(&targets, Some(500))
            .expect("valid targets");
        assert!(solution.iterations <= 500);
        let after = skeleton.cost(&targets).expect("valid targets");
        assert!(after < before / 10., "{before} -> {after}");
        assert!(skeleton.root_position().magnitude() < 0.2);
        assert_eq!(skeleton[JointId::ROOT].angle(), Angle::ZERO);
    }

    #[test]
    fn iteration_cap() {
        let (mut skeleton, joints) = arm(&[1., 1.]);
        let solution = skeleton
            .solve_pose(&[(joints[1], Vector::new(10., -10.))], Some(3))
            .expect("valid targets");
        assert_eq!(solution.iterations, 3);
        assert!(!solution.converged);

        let untouched = skeleton.clone();
        let solution = skeleton
            .solve_pose(&[(joints[1], Vector::new(10., -10.))], Some(0))
            .expect("valid targets");
        assert_eq!(solution.iterations, 0);
        assert_eq!(skeleton, untouched);
    }

    #[test]
    fn step_size_only_shrinks() {
        let (skeleton, joints) = arm(&[1., 1.]);
        let targets = [(joints[1], Vector::new(-1., 0.5))];
        // A run capped at n iterations is a prefix of the run capped at n + 1.
        let mut previous = 2.;
        for max_iterations in 1..=60 {
            let config = SolverConfig::default()
                .with_step_size(2.)
                .with_max_iterations(max_iterations);
            let solution = skeleton
                .clone()
                .solve_pose_with(&targets, &config)
                .expect("valid targets");
            assert!(
                solution.step_size <= previous,
                "step grew from {previous} to {} at iteration {max_iterations}",
                solution.step_size
            );
            let halvings = (2. / solution.step_size).log2();
            assert!((halvings - halvings.round()).abs() < 1e-12);
            previous = solution.step_size;
        }
        assert!(previous < 2.);
    }

    #[test]
    fn no_targets_is_a_no_op() {
        let (mut skeleton, _) = arm(&[1., 1.]);
        let before = skeleton.clone();
        let solution = skeleton.solve_pose(&[], None).expect("valid targets");
        assert!(solution.converged);
        assert_eq!(solution.iterations, 1);
        assert_eq!(skeleton, before);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let (mut skeleton, joints) = arm(&[1., 0.5, 2.]);
        skeleton.set_angle(joints[0], Angle::radians(0.4)).expect("not root");
        skeleton.set_angle(joints[1], Angle::radians(-1.1)).expect("not root");
        skeleton.set_angle(joints[2], Angle::radians(2.3)).expect("not root");
        let targets = [(joints[1], Vector::new(1., 1.)), (joints[2], Vector::new(-2., 0.5))];

        let positions = skeleton.positions().expect("valid");
        let mut gradient = Gradient::new(skeleton.joint_count());
        skeleton.accumulate_gradient(&positions, &targets, &mut gradient);

        let epsilon = 1e-6;
        for &joint in &joints {
            let mut nudged = skeleton.clone();
            let angle = nudged[joint].angle();
            nudged.set_angle(joint, angle + epsilon).expect("not root");
            let numeric = (nudged.cost(&targets).expect("valid")
                - skeleton.cost(&targets).expect("valid"))
                / epsilon;
            assert!(
                (numeric - gradient.angles[joint.index()]).abs() < 1e-3,
                "{joint}: {numeric} vs {}",
                gradient.angles[joint.index()]
            );
        }
        assert_eq!(gradient.angles[0], 0.);
    }

    #[test]
    fn unknown_target_is_rejected() {
        let (mut skeleton, _) = arm(&[1.]);
        let before = skeleton.clone();
        assert_eq!(
            skeleton.solve_pose(&[(JointId::new(7), Vector::ZERO)], Some(10)),
            Err(Error::UnknownJoint(JointId::new(7)))
        );
        assert_eq!(skeleton, before);
    }

    #[test]
    fn non_finite_target_is_rejected() {
        let (mut skeleton, joints) = arm(&[1., 1.]);
        let before = skeleton.clone();
        for target in [
            Vector::new(f64::NAN, 0.),
            Vector::new(f64::INFINITY, 0.),
            Vector::new(0., f64::NEG_INFINITY),
        ] {
            assert_eq!(
                skeleton.solve_pose(&[(joints[0], Vector::ZERO), (joints[1], target)], None),
                Err(Error::InvalidTarget(joints[1]))
            );
            assert_eq!(
                skeleton.cost(&[(joints[1], target)]),
                Err(Error::InvalidTarget(joints[1]))
            );
        }
        assert_eq!(skeleton, before);
        assert!(skeleton.positions().expect("valid").iter().all(|p| p.is_finite()));
    }
}
