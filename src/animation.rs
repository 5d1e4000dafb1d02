//! Playback of recorded [`Skeleton`] poses.
//!
//! An [`Animation`] is a list of snapshots. Playing it moves from each
//! snapshot to the next over a fixed keyframe duration, rotating every joint
//! along the shorter arc and sliding the root in a straight line.
#![allow(missing_docs)]
use std::{ops::Deref, sync::Arc, time::Duration};

use easing_function::{easings::StandardEasing, Easing};
use log::debug;

use crate::{Angle, Error, Result, Skeleton, Vector};

/// An ordered list of poses of the same skeleton.
///
/// Cloning an animation is cheap; the snapshots are shared until modified.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct Animation(Arc<AnimationData>);

#[derive(Debug, PartialEq, Clone)]
struct AnimationData {
    keyframe_duration: Duration,
    easing: StandardEasing,
    snapshots: Vec<Skeleton>,
}

impl Default for AnimationData {
    fn default() -> Self {
        Self {
            keyframe_duration: Animation::DEFAULT_KEYFRAME_DURATION,
            easing: StandardEasing::Linear,
            snapshots: Vec::new(),
        }
    }
}

impl Animation {
    /// The time spent moving between two snapshots unless configured
    /// otherwise.
    pub const DEFAULT_KEYFRAME_DURATION: Duration = Duration::from_millis(500);

    fn data_mut(&mut self) -> &mut AnimationData {
        Arc::make_mut(&mut self.0)
    }

    /// Appends a snapshot.
    ///
    /// Fails if the snapshot has a different number of joints than the
    /// snapshots already recorded.
    pub fn push(&mut self, snapshot: Skeleton) -> Result<()> {
        self.check_shape(&snapshot)?;
        self.data_mut().snapshots.push(snapshot);
        Ok(())
    }

    /// Inserts a snapshot at `index`. See [`Animation::push`].
    pub fn insert(&mut self, index: usize, snapshot: Skeleton) -> Result<()> {
        self.check_shape(&snapshot)?;
        self.data_mut().snapshots.insert(index, snapshot);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Skeleton {
        self.data_mut().snapshots.remove(index)
    }

    pub fn clear(&mut self) {
        self.data_mut().snapshots.clear();
    }

    fn check_shape(&self, snapshot: &Skeleton) -> Result<()> {
        match self.0.snapshots.first() {
            Some(first) if first.joint_count() != snapshot.joint_count() => {
                Err(Error::MismatchedSnapshot {
                    expected: first.joint_count(),
                    actual: snapshot.joint_count(),
                })
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn with_keyframe_duration(mut self, duration: Duration) -> Self {
        self.data_mut().keyframe_duration = duration;
        self
    }

    #[must_use]
    pub fn keyframe_duration(&self) -> Duration {
        self.0.keyframe_duration
    }

    /// Applies `easing` to the progress between every pair of snapshots and
    /// returns self.
    #[must_use]
    pub fn with_easing(mut self, easing: StandardEasing) -> Self {
        self.data_mut().easing = easing;
        self
    }

    #[must_use]
    pub fn easing(&self) -> StandardEasing {
        self.0.easing
    }

    /// Returns the time it takes to play every snapshot.
    #[must_use]
    pub fn duration(&self) -> Duration {
        let segments = u32::try_from(self.segments()).unwrap_or(u32::MAX);
        self.0.keyframe_duration.saturating_mul(segments)
    }

    fn segments(&self) -> usize {
        self.0.snapshots.len().saturating_sub(1)
    }

    /// Returns the pose `elapsed` after the first snapshot.
    ///
    /// Returns `None` if there are fewer than two snapshots. Times past the
    /// end return the final snapshot.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample(&self, elapsed: Duration) -> Option<Skeleton> {
        let segments = self.segments();
        if segments == 0 {
            return None;
        }
        let last = self.0.snapshots.last()?;
        if self.0.keyframe_duration.is_zero() {
            return Some(last.clone());
        }

        let position = elapsed.as_secs_f64() / self.0.keyframe_duration.as_secs_f64();
        let frame = position.floor() as usize;
        if frame >= segments {
            return Some(last.clone());
        }
        let factor = self.ease(position - position.floor());
        Some(blend(
            &self.0.snapshots[frame],
            &self.0.snapshots[frame + 1],
            factor,
        ))
    }

    #[allow(clippy::cast_possible_truncation)]
    fn ease(&self, percent: f64) -> f64 {
        f64::from(self.0.easing.ease(percent as f32))
    }

    #[must_use]
    pub fn start(&self) -> RunningAnimation {
        RunningAnimation {
            animation: self.clone(),
            frame: 0,
            frame_elapsed: Duration::ZERO,
            repeat: false,
        }
    }
}

impl Deref for Animation {
    type Target = [Skeleton];

    fn deref(&self) -> &Self::Target {
        &self.0.snapshots
    }
}

/// Returns the pose `percent` of the way from `from` to `to`.
///
/// Joint angles travel along the shorter arc and the root position moves in a
/// straight line. The returned skeleton has the structure of `from`.
pub fn interpolate(from: &Skeleton, to: &Skeleton, percent: f64) -> Result<Skeleton> {
    if from.joint_count() == to.joint_count() {
        Ok(blend(from, to, percent))
    } else {
        Err(Error::MismatchedSnapshot {
            expected: from.joint_count(),
            actual: to.joint_count(),
        })
    }
}

fn blend(from: &Skeleton, to: &Skeleton, percent: f64) -> Skeleton {
    let mut pose = from.clone();
    for (joint, target) in pose.joints.iter_mut().zip(&to.joints).skip(1) {
        joint.angle = joint.angle.lerp(target.angle, percent);
    }
    pose.root_position = from.root_position.lerp(to.root_position, percent);
    pose
}

/// An [`Animation`] being played back.
pub struct RunningAnimation {
    animation: Animation,
    frame: usize,
    frame_elapsed: Duration,
    repeat: bool,
}

impl RunningAnimation {
    /// Restarts from the first snapshot after reaching the last one.
    #[must_use]
    pub fn looping(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Advances playback by `elapsed` and replaces `skeleton` with the current
    /// pose.
    ///
    /// Returns false once the animation has finished, after applying the final
    /// snapshot. An animation with fewer than two snapshots is finished
    /// immediately.
    pub fn update(&mut self, elapsed: Duration, skeleton: &mut Skeleton) -> bool {
        let segments = self.animation.segments();
        let keyframe = self.animation.keyframe_duration();
        if self.frame >= segments || keyframe.is_zero() {
            return self.finish(skeleton);
        }

        self.frame_elapsed += elapsed;
        while let Some(after_frame) = self.frame_elapsed.checked_sub(keyframe) {
            self.frame_elapsed = after_frame;
            self.frame += 1;
            if self.frame == segments {
                if self.repeat {
                    self.frame = 0;
                } else {
                    return self.finish(skeleton);
                }
            }
        }

        let factor = self
            .animation
            .ease(self.frame_elapsed.as_secs_f64() / keyframe.as_secs_f64());
        *skeleton = blend(
            &self.animation[self.frame],
            &self.animation[self.frame + 1],
            factor,
        );
        true
    }

    fn finish(&mut self, skeleton: &mut Skeleton) -> bool {
        self.frame = self.animation.segments();
        if let Some(last) = self.animation.last() {
            skeleton.clone_from(last);
        }
        debug!("animation finished");
        false
    }
}

trait Lerp: Sized {
    fn lerp(self, target: Self, percent: f64) -> Self;
}

impl Lerp for f64 {
    fn lerp(self, target: Self, percent: f64) -> Self {
        let delta = target - self;
        self + delta * percent
    }
}

impl Lerp for Vector {
    fn lerp(self, target: Self, percent: f64) -> Self {
        Vector::new(
            self.x.lerp(target.x, percent),
            self.y.lerp(target.y, percent),
        )
    }
}

impl Lerp for Angle {
    fn lerp(self, target: Self, percent: f64) -> Self {
        self.interpolate_inner(target, percent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JointId;

    fn pose(first: f64, second: f64, root: Vector) -> Skeleton {
        let mut skeleton = Skeleton::new(root, Vector::new(0., 1.));
        let a = skeleton
            .add_joint(JointId::ROOT, 1., Angle::degrees(first))
            .expect("root exists");
        skeleton
            .add_joint(a, 1., Angle::degrees(second))
            .expect("a exists");
        skeleton
    }

    fn degrees(skeleton: &Skeleton) -> Vec<f64> {
        skeleton
            .joints()
            .iter()
            .map(|joint| joint.angle().to_degrees())
            .collect()
    }

    fn assert_degrees(skeleton: &Skeleton, expected: &[f64]) {
        let actual = degrees(skeleton);
        for (actual, expected) in actual.iter().zip(expected) {
            let delta = (actual - expected).rem_euclid(360.);
            assert!(delta.min(360. - delta) < 1e-6, "{actual} != {expected}");
        }
    }

    #[test]
    fn interpolation_takes_the_short_way() {
        let from = pose(350., 90., Vector::ZERO);
        let to = pose(30., 0., Vector::new(2., -4.));
        let halfway = interpolate(&from, &to, 0.5).expect("same shape");
        assert_degrees(&halfway, &[0., 10., 45.]);
        assert_eq!(halfway.root_position(), Vector::new(1., -2.));
        assert_eq!(halfway.joint_count(), 3);
    }

    #[test]
    fn mismatched_snapshots() {
        let mut animation = Animation::default();
        animation.push(pose(0., 0., Vector::ZERO)).expect("first");
        let err = animation
            .push(Skeleton::default())
            .expect_err("different shape");
        assert_eq!(
            err,
            Error::MismatchedSnapshot {
                expected: 3,
                actual: 1
            }
        );
        assert!(interpolate(&Skeleton::default(), &pose(0., 0., Vector::ZERO), 0.5).is_err());
        assert_eq!(animation.len(), 1);
    }

    #[test]
    fn sampling() {
        let mut animation =
            Animation::default().with_keyframe_duration(Duration::from_secs(1));
        assert_eq!(animation.sample(Duration::ZERO), None);
        animation.push(pose(0., 0., Vector::ZERO)).expect("same shape");
        animation.push(pose(90., 0., Vector::ZERO)).expect("same shape");
        animation
            .push(pose(90., 270., Vector::new(4., 0.)))
            .expect("same shape");
        assert_eq!(animation.duration(), Duration::from_secs(2));

        let start = animation.sample(Duration::ZERO).expect("two snapshots");
        assert_eq!(start, animation[0]);
        let quarter = animation
            .sample(Duration::from_millis(500))
            .expect("two snapshots");
        assert_degrees(&quarter, &[0., 45., 0.]);
        let later = animation
            .sample(Duration::from_millis(1_250))
            .expect("two snapshots");
        assert_degrees(&later, &[0., 90., 337.5]);
        assert_eq!(later.root_position(), Vector::new(1., 0.));
        let end = animation
            .sample(Duration::from_secs(10))
            .expect("two snapshots");
        assert_eq!(end, animation[2]);
    }

    #[test]
    fn playback() {
        let mut animation = Animation::default();
        animation.push(pose(0., 0., Vector::ZERO)).expect("same shape");
        animation.push(pose(60., 0., Vector::ZERO)).expect("same shape");
        animation.push(pose(60., 60., Vector::ZERO)).expect("same shape");

        let mut skeleton = Skeleton::default();
        let mut running = animation.start();
        assert!(running.update(Duration::from_millis(250), &mut skeleton));
        assert_degrees(&skeleton, &[0., 30., 0.]);
        assert!(running.update(Duration::from_millis(500), &mut skeleton));
        assert_degrees(&skeleton, &[0., 60., 30.]);
        assert!(!running.update(Duration::from_millis(500), &mut skeleton));
        assert_eq!(skeleton, animation[2]);
        assert!(!running.update(Duration::from_millis(500), &mut skeleton));
    }

    #[test]
    fn looping_playback() {
        let mut animation = Animation::default();
        animation.push(pose(0., 0., Vector::ZERO)).expect("same shape");
        animation.push(pose(0., 40., Vector::ZERO)).expect("same shape");

        let mut skeleton = Skeleton::default();
        let mut running = animation.start().looping();
        assert!(running.update(Duration::from_millis(1_100), &mut skeleton));
        assert_degrees(&skeleton, &[0., 0., 8.]);
    }

    #[test]
    fn eased_sampling() {
        let mut animation = Animation::default().with_easing(StandardEasing::InOutQuadradic);
        animation.push(pose(0., 0., Vector::ZERO)).expect("same shape");
        animation.push(pose(0., 80., Vector::ZERO)).expect("same shape");
        let early = animation
            .sample(Duration::from_millis(100))
            .expect("two snapshots");
        assert!(early[JointId::new(2)].angle().to_degrees() < 4.);
    }
}
