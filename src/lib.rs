#![doc = include_str!(".crate-docs.md")]

use std::{
    collections::HashMap,
    f64::consts::{PI, TAU},
    fmt::{Debug, Display},
    ops::{Add, AddAssign, Div, Index, Mul, Neg, Sub, SubAssign},
    sync::Arc,
};

pub mod animation;
#[cfg(feature = "serde")]
mod serde;
mod solver;

pub use solver::{Solution, SolverConfig};

/// A two dimensional position or displacement.
#[derive(Default, Clone, Copy, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct Vector {
    /// The x-axis component of this vector.
    pub x: f64,
    /// The y-axis component of this vector.
    pub y: f64,
}

impl Vector {
    /// A vector with both components set to zero.
    pub const ZERO: Self = Self::new(0., 0.);

    /// Returns a new vector from the x and y values.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the dot product of `self` and `other`.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Returns the squared magnitude of this vector.
    #[must_use]
    pub fn squared_magnitude(self) -> f64 {
        self.dot(self)
    }

    /// Returns the magnitude of this vector.
    #[must_use]
    pub fn magnitude(self) -> f64 {
        self.squared_magnitude().sqrt()
    }

    /// Returns the distance between `self` and `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).magnitude()
    }

    /// Returns true if both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns a vector pointing in the same direction with a magnitude of 1.
    ///
    /// Returns `None` if this vector has no direction.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let magnitude = self.magnitude();
        if magnitude > 0. {
            Some(self / magnitude)
        } else {
            None
        }
    }

    /// Returns this vector rotated counter-clockwise by `angle`.
    #[must_use]
    pub fn rotated_ccw(self, angle: Angle) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self {
            x: cos * self.x - sin * self.y,
            y: sin * self.x + cos * self.y,
        }
    }

    /// Returns this vector rotated counter-clockwise by a quarter turn.
    ///
    /// This is the derivative of [`Vector::rotated_ccw`] with respect to the
    /// angle of rotation.
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }
}

impl Neg for Vector {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Add for Vector {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Vector {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        self + -rhs
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl Mul<f64> for Vector {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x * rhs,
            y: self.y * rhs,
        }
    }
}

impl Mul<Vector> for f64 {
    type Output = Vector;

    fn mul(self, rhs: Vector) -> Self::Output {
        rhs * self
    }
}

impl Div<f64> for Vector {
    type Output = Self;

    fn div(self, rhs: f64) -> Self::Output {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}

/// Reduces `radians` into the range `0..2π`.
///
/// A full turn is represented by 0. Non-finite inputs produce NaN.
#[must_use]
pub fn normalize(radians: f64) -> f64 {
    let radians = radians.rem_euclid(TAU);
    // rem_euclid rounds tiny negative inputs up to TAU.
    if radians >= TAU {
        0.
    } else {
        // Adding zero turns -0.0 into 0.0.
        radians + 0.
    }
}

/// A rotation, stored as its representative between no rotation and a full
/// rotation.
///
/// Every operation produces a canonical angle: two angles that differ by a
/// multiple of a full turn compare equal.
#[derive(Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(
    feature = "serde",
    derive(::serde::Serialize, ::serde::Deserialize),
    serde(from = "f64", into = "f64")
)]
pub struct Angle {
    radians: f64,
}

impl Angle {
    /// An angle of no rotation.
    pub const ZERO: Self = Self { radians: 0. };
    /// An angle of a half turn.
    pub const HALF_TURN: Self = Self { radians: PI };

    /// Returns an angle representing the given radians.
    #[must_use]
    pub fn radians(radians: f64) -> Self {
        Self {
            radians: normalize(radians),
        }
    }

    /// Returns an angle representing the given degrees.
    #[must_use]
    pub fn degrees(degrees: f64) -> Self {
        Self::radians(degrees.to_radians())
    }

    /// Returns this angle represented in radians.
    ///
    /// This value will always be greater than or equal to 0 and will always be
    /// less than `2π`.
    #[must_use]
    pub const fn to_radians(self) -> f64 {
        self.radians
    }

    /// Returns this angle represented in degrees.
    ///
    /// This value will always be greater than or equal to 0 and will always be
    /// less than 360.0.
    #[must_use]
    pub fn to_degrees(self) -> f64 {
        self.radians.to_degrees()
    }

    /// Returns the cosine of this angle.
    #[must_use]
    pub fn cos(self) -> f64 {
        self.radians.cos()
    }

    /// Returns the sine of this angle.
    #[must_use]
    pub fn sin(self) -> f64 {
        self.radians.sin()
    }

    /// Returns the sine and cosine of this angle.
    #[must_use]
    pub fn sin_cos(self) -> (f64, f64) {
        self.radians.sin_cos()
    }

    /// Interpolates from `self` towards `target` along the shorter of the two
    /// arcs between them.
    ///
    /// `percent` is expected to be between 0 and 1. The result never travels
    /// more than a half turn away from `self`.
    #[must_use]
    pub fn interpolate_inner(self, target: Self, percent: f64) -> Self {
        let ccw_delta = (target - self).radians;
        if ccw_delta <= PI {
            self + Self::radians(ccw_delta * percent)
        } else {
            self + Self::radians((ccw_delta - TAU) * percent)
        }
    }

    /// Returns true if sweeping counter-clockwise from `ccw_from` reaches
    /// `self` no later than `cw_from`.
    ///
    /// Both bounds are inclusive.
    #[must_use]
    pub fn is_between(self, ccw_from: Self, cw_from: Self) -> bool {
        (self - ccw_from).radians <= (cw_from - ccw_from).radians
    }
}

impl Debug for Angle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Angle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}°", self.to_degrees())
    }
}

impl Default for Angle {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for Angle {
    fn from(radians: f64) -> Self {
        Self::radians(radians)
    }
}

impl From<Angle> for f64 {
    fn from(angle: Angle) -> Self {
        angle.radians
    }
}

impl Add for Angle {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::radians(self.radians + rhs.radians)
    }
}

impl Sub for Angle {
    type Output = Self;

    // Equivalent to `self + -rhs`, but an angle minus itself is exactly zero.
    fn sub(self, rhs: Self) -> Self::Output {
        Self::radians(self.radians - rhs.radians)
    }
}

impl Neg for Angle {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::radians(-self.radians)
    }
}

impl Add<f64> for Angle {
    type Output = Self;

    fn add(self, rhs: f64) -> Self::Output {
        Self::radians(self.radians + rhs)
    }
}

impl Sub<f64> for Angle {
    type Output = Self;

    fn sub(self, rhs: f64) -> Self::Output {
        Self::radians(self.radians - rhs)
    }
}

impl Add<Angle> for f64 {
    type Output = Angle;

    fn add(self, rhs: Angle) -> Self::Output {
        rhs + self
    }
}

impl Sub<Angle> for f64 {
    type Output = Angle;

    fn sub(self, rhs: Angle) -> Self::Output {
        -rhs + self
    }
}

/// Errors raised while building or evaluating a [`Skeleton`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// The joint does not exist in the skeleton.
    #[error("joint {0} does not exist")]
    UnknownJoint(JointId),
    /// A link length was negative or not finite.
    #[error("link length {0} must be finite and non-negative")]
    InvalidLength(f64),
    /// Another joint already uses this label.
    #[error("label {0:?} is already in use")]
    DuplicateLabel(String),
    /// The root joint has no angle to assign.
    #[error("the root joint has no angle")]
    RootAngle,
    /// The direction a joint is measured from could not be determined because
    /// its parent and grandparent are at the same position.
    #[error("joint {joint} has no reference direction: its parent and grandparent coincide")]
    DegenerateDirection {
        /// The joint whose position could not be computed.
        joint: JointId,
    },
    /// A target position for the joint was not finite.
    #[error("target for joint {0} is not a finite position")]
    InvalidTarget(JointId),
    /// Two poses of differently shaped skeletons were combined.
    #[error("snapshot has {actual} joints, expected {expected}")]
    MismatchedSnapshot {
        /// The number of joints of the existing snapshots.
        expected: usize,
        /// The number of joints of the rejected snapshot.
        actual: usize,
    },
}

/// The result type returned by this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The unique ID of a [`Joint`] in a [`Skeleton`].
///
/// Ids are the joint's index: the root is 0 and every joint added afterwards
/// receives the next index.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
pub struct JointId(usize);

impl JointId {
    /// The id of the root joint of every skeleton.
    pub const ROOT: Self = Self(0);

    /// Returns the id of the joint at `index`.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the index of this joint.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<JointId> for usize {
    fn from(id: JointId) -> Self {
        id.0
    }
}

impl Display for JointId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A node in a [`Skeleton`].
///
/// Every joint except the root is connected to its parent by a rigid link.
#[derive(Debug, Clone, PartialEq)]
pub struct Joint {
    label: Option<Arc<str>>,
    parent: Option<JointId>,
    length: f64,
    angle: Angle,
}

impl Joint {
    /// Returns the parent of this joint, or `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<JointId> {
        self.parent
    }

    /// Returns the length of the link connecting this joint to its parent.
    ///
    /// The root always has a length of 0.
    #[must_use]
    pub const fn length(&self) -> f64 {
        self.length
    }

    /// Returns the rotation of this joint relative to its reference direction.
    ///
    /// The root is always [`Angle::ZERO`].
    #[must_use]
    pub const fn angle(&self) -> Angle {
        self.angle
    }

    /// Returns the label this joint was created with.
    #[must_use]
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or("")
    }
}

/// A tree of [`Joint`]s connected by rigid links, rooted at a single joint.
///
/// Each joint's angle is measured against the direction its parent was
/// reached from. Joints attached to the root are measured against the root's
/// reference direction instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    root_position: Vector,
    root_direction: Vector,
    joints: Vec<Joint>,
    joints_by_label: HashMap<Arc<str>, JointId>,
}

impl Default for Skeleton {
    /// Returns a skeleton rooted at the origin whose reference direction
    /// points along the positive y-axis.
    fn default() -> Self {
        Self::new(Vector::ZERO, Vector::new(0., 1.))
    }
}

impl Skeleton {
    /// Returns a skeleton containing only a root joint at `root_position`.
    ///
    /// Joints attached directly to the root measure their angles from
    /// `root_direction`, and their link lengths are scaled by its magnitude.
    #[must_use]
    pub fn new(root_position: Vector, root_direction: Vector) -> Self {
        Self {
            root_position,
            root_direction,
            joints: vec![Joint {
                label: None,
                parent: None,
                length: 0.,
                angle: Angle::ZERO,
            }],
            joints_by_label: HashMap::new(),
        }
    }

    /// Appends a joint connected to `parent` by a link of `length`, rotated by
    /// `angle`. Returns the unique id of the created joint.
    pub fn add_joint(&mut self, parent: JointId, length: f64, angle: Angle) -> Result<JointId> {
        self.push_joint(None, parent, length, angle)
    }

    /// Appends a labeled joint. See [`Skeleton::add_joint`].
    ///
    /// An empty label leaves the joint unlabeled.
    pub fn add_labeled_joint(
        &mut self,
        label: impl Into<String>,
        parent: JointId,
        length: f64,
        angle: Angle,
    ) -> Result<JointId> {
        let label = label.into();
        if label.is_empty() {
            return self.push_joint(None, parent, length, angle);
        }
        if self.joints_by_label.contains_key(label.as_str()) {
            return Err(Error::DuplicateLabel(label));
        }
        self.push_joint(Some(Arc::from(label)), parent, length, angle)
    }

    fn push_joint(
        &mut self,
        label: Option<Arc<str>>,
        parent: JointId,
        length: f64,
        angle: Angle,
    ) -> Result<JointId> {
        if parent.0 >= self.joints.len() {
            return Err(Error::UnknownJoint(parent));
        }
        if !length.is_finite() || length < 0. {
            return Err(Error::InvalidLength(length));
        }

        let id = JointId(self.joints.len());
        if let Some(label) = &label {
            self.joints_by_label.insert(label.clone(), id);
        }
        self.joints.push(Joint {
            label,
            parent: Some(parent),
            length,
            angle,
        });
        Ok(id)
    }

    /// Returns the number of joints in this skeleton, including the root.
    #[must_use]
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Returns the list of joints in this skeleton, indexed by [`JointId`].
    #[must_use]
    pub fn joints(&self) -> &[Joint] {
        &self.joints
    }

    /// Returns the joint with `id`, if it exists.
    #[must_use]
    pub fn joint(&self, id: JointId) -> Option<&Joint> {
        self.joints.get(id.0)
    }

    /// Returns an iterator over the ids of every joint in this skeleton.
    pub fn joint_ids(&self) -> impl Iterator<Item = JointId> {
        (0..self.joints.len()).map(JointId)
    }

    /// Finds an existing [`Joint`] by its label.
    #[must_use]
    pub fn find_joint_by_label(&self, label: &str) -> Option<JointId> {
        self.joints_by_label.get(label).copied()
    }

    /// Returns the position of the root joint.
    #[must_use]
    pub const fn root_position(&self) -> Vector {
        self.root_position
    }

    /// Moves the root joint, translating the entire skeleton.
    pub fn set_root_position(&mut self, position: Vector) {
        self.root_position = position;
    }

    /// Returns the direction that joints attached to the root are measured
    /// from.
    #[must_use]
    pub const fn root_direction(&self) -> Vector {
        self.root_direction
    }

    /// Sets the angle of a non-root joint.
    pub fn set_angle(&mut self, joint: JointId, angle: Angle) -> Result<()> {
        if joint == JointId::ROOT {
            return Err(Error::RootAngle);
        }
        let joint = self
            .joints
            .get_mut(joint.0)
            .ok_or(Error::UnknownJoint(joint))?;
        joint.angle = angle;
        Ok(())
    }

    /// Returns an iterator that starts at `joint` and follows parent links up
    /// to and including the root.
    #[must_use]
    pub fn lineage(&self, joint: JointId) -> Lineage<'_> {
        Lineage {
            skeleton: self,
            next: self.joint(joint).map(|_| joint),
        }
    }

    /// Returns true if rotating `ancestor` moves `joint`.
    ///
    /// Every joint is a descendant of itself. The root is never a descendant
    /// of any joint, including itself, because it has no angle.
    #[must_use]
    pub fn is_descendant(&self, joint: JointId, ancestor: JointId) -> bool {
        joint != JointId::ROOT && self.lineage(joint).any(|id| id == ancestor)
    }

    /// Returns the position of every joint, indexed by [`JointId`].
    ///
    /// Fails with [`Error::DegenerateDirection`] if a joint's parent and
    /// grandparent occupy the same position.
    pub fn positions(&self) -> Result<Vec<Vector>> {
        let mut positions: Vec<Vector> = Vec::with_capacity(self.joints.len());
        for (index, joint) in self.joints.iter().enumerate() {
            let Some(parent) = joint.parent else {
                positions.push(self.root_position);
                continue;
            };

            // Parents always precede their children.
            let parent_position = positions[parent.0];
            let reference = match self.joints[parent.0].parent {
                Some(grandparent) => (parent_position - positions[grandparent.0])
                    .normalized()
                    .ok_or(Error::DegenerateDirection {
                        joint: JointId(index),
                    })?,
                None => self.root_direction,
            };
            positions.push(parent_position + joint.length * reference.rotated_ccw(joint.angle));
        }
        Ok(positions)
    }

    /// Returns the position of a single joint.
    pub fn position_of(&self, joint: JointId) -> Result<Vector> {
        if joint.0 >= self.joints.len() {
            return Err(Error::UnknownJoint(joint));
        }
        let mut positions = self.positions()?;
        Ok(positions.swap_remove(joint.0))
    }

    /// Returns the joint closest to `point`, along with the joint's position
    /// and its distance from `point`.
    pub fn closest_joint(&self, point: Vector) -> Result<(JointId, Vector, f64)> {
        let positions = self.positions()?;
        // The root always exists, so it seeds the search.
        let closest = positions.iter().copied().enumerate().skip(1).fold(
            (0, positions[0], positions[0].distance(point)),
            |closest, (index, position)| {
                let distance = position.distance(point);
                if distance < closest.2 {
                    (index, position, distance)
                } else {
                    closest
                }
            },
        );
        Ok((JointId(closest.0), closest.1, closest.2))
    }
}

impl Index<JointId> for Skeleton {
    type Output = Joint;

    fn index(&self, index: JointId) -> &Self::Output {
        &self.joints[index.0]
    }
}

/// An iterator over a joint and its ancestors. See [`Skeleton::lineage`].
#[derive(Debug, Clone)]
pub struct Lineage<'a> {
    skeleton: &'a Skeleton,
    next: Option<JointId>,
}

impl Iterator for Lineage<'_> {
    type Item = JointId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.skeleton.joints[current.0].parent;
        Some(current)
    }
}

#[cfg(test)]
fn assert_close(actual: Vector, expected: Vector) {
    assert!(
        actual.distance(expected) < 1e-9,
        "{actual:?} is not close to {expected:?}"
    );
}

#[cfg(test)]
fn angle_distance(a: Angle, b: Angle) -> f64 {
    let delta = (a - b).to_radians();
    delta.min(TAU - delta)
}

#[test]
fn normalization() {
    for value in [-100.5, -TAU, -PI, -1e-20, 0., 1., PI, TAU, 3. * TAU + 0.25, 1e6] {
        let normalized = normalize(value);
        assert!((0. ..TAU).contains(&normalized), "{value} -> {normalized}");
        let turns = (value - normalized) / TAU;
        assert!((turns - turns.round()).abs() < 1e-6, "{value} -> {normalized}");
    }
    assert_eq!(normalize(TAU), 0.);
    assert_eq!(normalize(-0.), 0.);
    assert_eq!(Angle::radians(TAU + 1.), Angle::radians(1.));
}

#[test]
#[allow(clippy::cast_possible_truncation)]
fn angle_arithmetic() {
    assert_eq!(
        (Angle::degrees(90.) + Angle::degrees(180.))
            .to_degrees()
            .round() as i32,
        270,
    );
    assert_eq!(
        (Angle::degrees(90.) + Angle::degrees(-180.))
            .to_degrees()
            .round() as i32,
        270,
    );
    assert_eq!((Angle::degrees(10.) - 20f64.to_radians()).to_degrees().round() as i32, 350);
    assert!(angle_distance(1. - Angle::radians(2.), Angle::radians(-1.)) < 1e-12);
    for radians in [0., 0.3, 1., PI, 4.5, 6.2] {
        let angle = Angle::radians(radians);
        assert!(angle_distance(angle + -angle, Angle::ZERO) < 1e-12);
    }
}

#[test]
fn inner_interpolation() {
    let pairs = [(0.1, 0.2), (0.2, 6.1), (6.1, 0.2), (1., 4.), (4., 1.), (0., PI)];
    for (from, to) in pairs {
        let (from, to) = (Angle::radians(from), Angle::radians(to));
        assert_eq!(from.interpolate_inner(from, 0.7), from);
        assert!(angle_distance(from.interpolate_inner(to, 0.), from) < 1e-12);
        assert!(angle_distance(from.interpolate_inner(to, 1.), to) < 1e-12);
        // Every intermediate step stays on the short arc.
        for step in 0..=10 {
            let middle = from.interpolate_inner(to, f64::from(step) / 10.);
            assert!(angle_distance(middle, from) <= angle_distance(to, from) + 1e-12);
        }
    }
    // Crossing zero takes the short way around.
    let halfway = Angle::radians(6.1).interpolate_inner(Angle::radians(0.2), 0.5);
    assert!(angle_distance(halfway, Angle::radians(0.2 - (TAU - 6.1 + 0.2) / 2.)) < 1e-9);
}

#[test]
fn angle_betweenness() {
    let (ccw_from, cw_from) = (Angle::degrees(350.), Angle::degrees(20.));
    assert!(Angle::degrees(0.).is_between(ccw_from, cw_from));
    assert!(Angle::degrees(10.).is_between(ccw_from, cw_from));
    assert!(!Angle::degrees(180.).is_between(ccw_from, cw_from));
    for other in [0., 1., 3., 5.] {
        let other = Angle::radians(other);
        assert!(ccw_from.is_between(ccw_from, other));
        assert!(other.is_between(ccw_from, other));
    }
}

#[test]
fn vector_rotation() {
    let vector = Vector::new(3., -2.);
    for radians in [0., 0.5, 2., PI, 5.] {
        let angle = Angle::radians(radians);
        let rotated = vector.rotated_ccw(angle);
        assert!((rotated.magnitude() - vector.magnitude()).abs() < 1e-12);
        assert_close(rotated.rotated_ccw(-angle), vector);
    }
    assert_close(
        Vector::new(1., 0.).rotated_ccw(Angle::degrees(90.)),
        Vector::new(0., 1.),
    );
    assert_close(vector.perpendicular(), vector.rotated_ccw(Angle::radians(PI / 2.)));
}

#[test]
fn vector_arithmetic() {
    let a = Vector::new(1., 2.);
    let b = Vector::new(-3., 0.5);
    assert_eq!(a + b, Vector::new(-2., 2.5));
    assert_eq!(a - b, Vector::new(4., 1.5));
    assert_eq!(2. * a, a * 2.);
    assert_eq!(a * 2., Vector::new(2., 4.));
    assert_eq!(a.dot(b), -2.);
    assert_eq!(Vector::new(3., 4.).magnitude(), 5.);
    assert_eq!(Vector::ZERO.magnitude(), 0.);
    assert_eq!(Vector::ZERO.normalized(), None);
    assert_close(
        Vector::new(0., -7.).normalized().expect("non-zero"),
        Vector::new(0., -1.),
    );
}

#[test]
fn single_joint_positions() {
    let mut skeleton = Skeleton::default();
    let joint = skeleton
        .add_joint(JointId::ROOT, 2.5, Angle::ZERO)
        .expect("root exists");
    let positions = skeleton.positions().expect("valid skeleton");
    assert_eq!(positions.len(), 2);
    assert_close(positions[0], Vector::ZERO);
    assert_close(positions[joint.index()], Vector::new(0., 2.5));
}

#[test]
fn chain_positions() {
    let mut skeleton = Skeleton::default();
    let first = skeleton
        .add_joint(JointId::ROOT, 1., Angle::ZERO)
        .expect("root exists");
    let second = skeleton
        .add_joint(first, 1., Angle::ZERO)
        .expect("first exists");
    assert_close(
        skeleton.position_of(second).expect("valid"),
        Vector::new(0., 2.),
    );

    // Angles are relative to the direction the parent was reached from.
    skeleton
        .set_angle(first, Angle::degrees(90.))
        .expect("not root");
    skeleton
        .set_angle(second, Angle::degrees(90.))
        .expect("not root");
    let positions = skeleton.positions().expect("valid");
    assert_close(positions[first.index()], Vector::new(-1., 0.));
    assert_close(positions[second.index()], Vector::new(-1., -1.));

    // Siblings attached to the root share the root's reference direction.
    let sibling = skeleton
        .add_joint(JointId::ROOT, 2., Angle::degrees(-90.))
        .expect("root exists");
    skeleton.set_root_position(Vector::new(1., 1.));
    assert_close(
        skeleton.position_of(sibling).expect("valid"),
        Vector::new(3., 1.),
    );
}

#[test]
fn construction_errors() {
    let mut skeleton = Skeleton::default();
    assert_eq!(
        skeleton.add_joint(JointId::new(1), 1., Angle::ZERO),
        Err(Error::UnknownJoint(JointId::new(1)))
    );
    assert_eq!(
        skeleton.add_joint(JointId::ROOT, -1., Angle::ZERO),
        Err(Error::InvalidLength(-1.))
    );
    assert!(matches!(
        skeleton.add_joint(JointId::ROOT, f64::NAN, Angle::ZERO),
        Err(Error::InvalidLength(_))
    ));
    assert_eq!(
        skeleton.set_angle(JointId::ROOT, Angle::degrees(5.)),
        Err(Error::RootAngle)
    );
    assert_eq!(
        skeleton.set_angle(JointId::new(4), Angle::degrees(5.)),
        Err(Error::UnknownJoint(JointId::new(4)))
    );
    assert_eq!(skeleton.joint_count(), 1);
    assert_eq!(skeleton[JointId::ROOT].angle(), Angle::ZERO);
}

#[test]
fn labels() {
    let mut skeleton = Skeleton::default();
    let hip = skeleton
        .add_labeled_joint("hip", JointId::ROOT, 1., Angle::ZERO)
        .expect("root exists");
    let unlabeled = skeleton
        .add_labeled_joint("", hip, 1., Angle::ZERO)
        .expect("hip exists");
    assert_eq!(skeleton.find_joint_by_label("hip"), Some(hip));
    assert_eq!(skeleton[hip].label(), "hip");
    assert_eq!(skeleton[unlabeled].label(), "");
    assert_eq!(
        skeleton.add_labeled_joint("hip", unlabeled, 1., Angle::ZERO),
        Err(Error::DuplicateLabel(String::from("hip")))
    );
    assert_eq!(skeleton.joint_count(), 3);
}

#[test]
fn degenerate_direction() {
    let mut skeleton = Skeleton::default();
    let collapsed = skeleton
        .add_joint(JointId::ROOT, 0., Angle::ZERO)
        .expect("root exists");
    let leaf = skeleton
        .add_joint(collapsed, 1., Angle::ZERO)
        .expect("collapsed exists");
    assert_eq!(
        skeleton.positions(),
        Err(Error::DegenerateDirection { joint: leaf })
    );
}

#[test]
fn descendants() {
    let mut skeleton = Skeleton::default();
    let a = skeleton.add_joint(JointId::ROOT, 1., Angle::ZERO).expect("valid");
    let b = skeleton.add_joint(a, 1., Angle::ZERO).expect("valid");
    let c = skeleton.add_joint(JointId::ROOT, 1., Angle::ZERO).expect("valid");
    assert_eq!(
        skeleton.lineage(b).collect::<Vec<_>>(),
        [b, a, JointId::ROOT]
    );
    assert!(skeleton.is_descendant(b, b));
    assert!(skeleton.is_descendant(b, a));
    assert!(skeleton.is_descendant(b, JointId::ROOT));
    assert!(!skeleton.is_descendant(b, c));
    assert!(!skeleton.is_descendant(a, b));
    assert!(!skeleton.is_descendant(JointId::ROOT, JointId::ROOT));
    assert!(!skeleton.is_descendant(JointId::new(9), JointId::ROOT));
}

#[test]
fn closest_joint() {
    let mut skeleton = Skeleton::default();
    let tip = skeleton
        .add_joint(JointId::ROOT, 2., Angle::ZERO)
        .expect("valid");
    let (joint, position, distance) = skeleton
        .closest_joint(Vector::new(0.5, 1.8))
        .expect("valid");
    assert_eq!(joint, tip);
    assert_close(position, Vector::new(0., 2.));
    assert!((distance - Vector::new(0.5, -0.2).magnitude()).abs() < 1e-12);

    // Ties keep the lowest id.
    let (joint, position, distance) = skeleton
        .closest_joint(Vector::new(0., 1.))
        .expect("valid");
    assert_eq!(joint, JointId::ROOT);
    assert_close(position, Vector::ZERO);
    assert!((distance - 1.).abs() < 1e-12);
}

#[test]
fn clones_are_independent() {
    let mut original = Skeleton::default();
    let joint = original
        .add_joint(JointId::ROOT, 1., Angle::degrees(30.))
        .expect("valid");
    let mut snapshot = original.clone();
    snapshot
        .set_angle(joint, Angle::degrees(120.))
        .expect("not root");
    snapshot.set_root_position(Vector::new(5., 5.));
    assert_eq!(original[joint].angle(), Angle::degrees(30.));
    assert_eq!(original.root_position(), Vector::ZERO);
    assert_eq!(snapshot[joint].angle(), Angle::degrees(120.));
}
