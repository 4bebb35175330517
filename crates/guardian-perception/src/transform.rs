//! Transform Frame (TF) Engine.
//!
//! Maintains a graph of named reference frames and the 3-D rigid-body
//! transforms (translation + quaternion rotation) that relate them.  Given a
//! target frame, a source frame and a timestamp the engine composes a chain
//! of transforms via BFS and returns the [`Transform3D`] that maps points
//! expressed in the source frame into the target frame.
//!
//! Edges come in two flavours:
//!
//! - **static** – valid for all time (e.g. a LiDAR bolted to the roof);
//! - **stamped** – a bounded, time-ordered history of samples.  A lookup
//!   interpolates between the two samples that bracket the requested time,
//!   or uses the nearest sample when it lies within the engine's tolerance.
//!
//! Edges are stored parent → child but can be walked in either direction;
//! walking child → parent uses the inverse transform.
//!
//! # Example
//!
//! ```rust
//! use guardian_perception::transform::{TfEngine, Transform3D, Vec3, Quaternion};
//!
//! let mut tf = TfEngine::new();
//!
//! // The LiDAR sits 1.5 m above the vehicle origin.
//! tf.set_static_transform("novatel", "velodyne128",
//!     Transform3D::new(Vec3::new(0.0, 0.0, 1.5), Quaternion::identity()));
//!
//! let t = tf.lookup_at(0.0, "novatel", "velodyne128").unwrap();
//! assert!((t.translation.z - 1.5).abs() < 1e-5);
//!
//! // The inverse direction is resolved as well.
//! let back = tf.lookup_at(0.0, "velodyne128", "novatel").unwrap();
//! assert!((back.translation.z + 1.5).abs() < 1e-5);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use guardian_types::{GuardianError, Point3};

/// Default number of stamped samples kept per edge.
const DEFAULT_HISTORY: usize = 100;

/// Default tolerance (seconds) when the lookup time falls outside the stamped
/// history of an edge.
const DEFAULT_TOLERANCE_SEC: f64 = 0.1;

// ────────────────────────────────────────────────────────────────────────────
// Primitive types
// ────────────────────────────────────────────────────────────────────────────

/// A 3-D translation vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Create a new vector.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn scale(self, k: f32) -> Self {
        Self::new(self.x * k, self.y * k, self.z * k)
    }

    /// Linear interpolation: `self` at `alpha = 0`, `rhs` at `alpha = 1`.
    pub fn lerp(self, rhs: Self, alpha: f32) -> Self {
        self.scale(1.0 - alpha).add(rhs.scale(alpha))
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        Self::new(p.x, p.y, p.z)
    }
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Point3::new(v.x, v.y, v.z)
    }
}

/// A unit quaternion representing a 3-D rotation (w, x, y, z convention).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub w: f32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Quaternion {
    /// Create a quaternion.  The caller is responsible for providing a unit
    /// quaternion (|q| = 1); see [`normalized`][Self::normalized].
    pub fn new(w: f32, x: f32, y: f32, z: f32) -> Self {
        Self { w, x, y, z }
    }

    /// The identity rotation (no rotation).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    /// Rotation of `yaw_rad` around the +Z axis.
    pub fn from_yaw(yaw_rad: f32) -> Self {
        let half = yaw_rad * 0.5;
        Self::new(half.cos(), 0.0, 0.0, half.sin())
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.w * rhs.w + self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    /// Scale to unit length.  A zero quaternion becomes the identity.
    pub fn normalized(self) -> Self {
        let norm = self.dot(self).sqrt();
        if norm <= f32::EPSILON || !norm.is_finite() {
            return Self::identity();
        }
        Self::new(self.w / norm, self.x / norm, self.y / norm, self.z / norm)
    }

    /// Hamilton product: compose two rotations.
    pub fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
        )
    }

    /// Conjugate (== inverse for a unit quaternion).
    pub fn conjugate(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    /// Rotate a vector by this quaternion: p' = q * p * q*.
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let p = Self::new(0.0, v.x, v.y, v.z);
        let rotated = self.mul(p).mul(self.conjugate());
        Vec3::new(rotated.x, rotated.y, rotated.z)
    }

    /// Normalised linear interpolation along the shorter arc.
    pub fn nlerp(self, rhs: Self, alpha: f32) -> Self {
        // q and -q are the same rotation; flip to take the short way round.
        let rhs = if self.dot(rhs) < 0.0 {
            Self::new(-rhs.w, -rhs.x, -rhs.y, -rhs.z)
        } else {
            rhs
        };
        let a = 1.0 - alpha;
        Self::new(
            self.w * a + rhs.w * alpha,
            self.x * a + rhs.x * alpha,
            self.y * a + rhs.y * alpha,
            self.z * a + rhs.z * alpha,
        )
        .normalized()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transform3D
// ────────────────────────────────────────────────────────────────────────────

/// A rigid-body 3-D transform: rotation followed by translation.
///
/// Represents the pose of frame B relative to frame A: to convert a point
/// expressed in frame B into frame A, rotate it by `rotation` then add
/// `translation`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quaternion,
}

impl Transform3D {
    /// Create a transform from a translation and rotation.
    pub fn new(translation: Vec3, rotation: Quaternion) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    /// The identity transform (no translation, no rotation).
    pub fn identity() -> Self {
        Self::new(Vec3::zero(), Quaternion::identity())
    }

    /// Compose two transforms: `self` applied first, then `other`.
    ///
    /// If `self` = T_A_B and `other` = T_B_C, the result is T_A_C.
    pub fn compose(self, other: Self) -> Self {
        let translated = self.translation.add(self.rotation.rotate(other.translation));
        let rotated = self.rotation.mul(other.rotation);
        Self::new(translated, rotated)
    }

    /// T_A_B → T_B_A.
    pub fn inverse(self) -> Self {
        let inv_rotation = self.rotation.conjugate();
        let inv_translation = inv_rotation.rotate(self.translation).scale(-1.0);
        Self::new(inv_translation, inv_rotation)
    }

    /// Map a point from frame B into frame A.
    pub fn apply_point(&self, p: Point3) -> Point3 {
        self.rotation.rotate(Vec3::from(p)).add(self.translation).into()
    }

    fn interpolate(self, other: Self, alpha: f32) -> Self {
        Self::new(
            self.translation.lerp(other.translation, alpha),
            self.rotation.nlerp(other.rotation, alpha),
        )
    }
}

/// A transform sample valid at `stamp_sec`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StampedTransform {
    pub stamp_sec: f64,
    pub transform: Transform3D,
}

// ────────────────────────────────────────────────────────────────────────────
// Resolver seam
// ────────────────────────────────────────────────────────────────────────────

/// Anything that can answer "which transform maps `source_frame` into
/// `target_frame` at `timestamp`?".
///
/// Implementations must be cheap, in-memory lookups: the guardian calls this
/// once per point-cloud frame on the hot path.
pub trait TransformResolver: Send + Sync {
    fn resolve(
        &self,
        timestamp: f64,
        target_frame: &str,
        source_frame: &str,
    ) -> Result<Transform3D, GuardianError>;
}

impl<R: TransformResolver + ?Sized> TransformResolver for Arc<R> {
    fn resolve(
        &self,
        timestamp: f64,
        target_frame: &str,
        source_frame: &str,
    ) -> Result<Transform3D, GuardianError> {
        (**self).resolve(timestamp, target_frame, source_frame)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// TfEngine
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Edge {
    Static(Transform3D),
    Stamped(VecDeque<StampedTransform>),
}

impl Edge {
    fn sample_at(&self, timestamp: f64, tolerance_sec: f64) -> Option<Transform3D> {
        let history = match self {
            Edge::Static(t) => return Some(*t),
            Edge::Stamped(history) => history,
        };
        if !timestamp.is_finite() {
            return None;
        }
        let first = history.front()?;
        let last = history.back()?;

        if timestamp <= first.stamp_sec {
            return (first.stamp_sec - timestamp <= tolerance_sec).then_some(first.transform);
        }
        if timestamp >= last.stamp_sec {
            return (timestamp - last.stamp_sec <= tolerance_sec).then_some(last.transform);
        }

        // `history` is sorted, so the first sample past `timestamp` and its
        // predecessor bracket the requested time.
        let idx = history.partition_point(|s| s.stamp_sec <= timestamp);
        let before = history[idx - 1];
        let after = history[idx];
        let span = after.stamp_sec - before.stamp_sec;
        if span <= f64::EPSILON {
            return Some(after.transform);
        }
        let alpha = ((timestamp - before.stamp_sec) / span) as f32;
        Some(before.transform.interpolate(after.transform, alpha))
    }
}

/// A graph of named reference frames and the [`Transform3D`]s that relate
/// them.
///
/// Frames are identified by arbitrary string names (e.g. `"novatel"`,
/// `"velodyne128"`).  [`TfEngine::lookup_at`] performs BFS to find the
/// shortest path from target to source and returns the composed transform.
#[derive(Debug, Clone)]
pub struct TfEngine {
    /// `edges[parent][child]`
    edges: HashMap<String, HashMap<String, Edge>>,
    /// `parents[child]` – reverse index so the graph can be walked upwards.
    parents: HashMap<String, HashSet<String>>,
    history: usize,
    tolerance_sec: f64,
}

impl Default for TfEngine {
    fn default() -> Self {
        Self {
            edges: HashMap::new(),
            parents: HashMap::new(),
            history: DEFAULT_HISTORY,
            tolerance_sec: DEFAULT_TOLERANCE_SEC,
        }
    }
}

impl TfEngine {
    /// Create an empty TF engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override how far (seconds) outside its stamped history an edge may
    /// still be used.
    pub fn with_tolerance(mut self, tolerance_sec: f64) -> Self {
        self.tolerance_sec = tolerance_sec.max(0.0);
        self
    }

    /// Override the number of stamped samples retained per edge (minimum 1).
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history.max(1);
        self
    }

    /// Register or replace a time-invariant transform from `parent_frame` to
    /// `child_frame`.
    pub fn set_static_transform(
        &mut self,
        parent_frame: &str,
        child_frame: &str,
        transform: Transform3D,
    ) {
        self.link(parent_frame, child_frame);
        self.edges
            .entry(parent_frame.to_string())
            .or_default()
            .insert(child_frame.to_string(), Edge::Static(transform));
    }

    /// Record a transform sample from `parent_frame` to `child_frame` valid
    /// at `stamp_sec`.
    ///
    /// Samples may arrive out of order; the history is kept sorted and
    /// trimmed to the configured length (oldest samples dropped first).  A
    /// sample replaces a previously registered static transform.
    pub fn set_transform(
        &mut self,
        parent_frame: &str,
        child_frame: &str,
        stamp_sec: f64,
        transform: Transform3D,
    ) {
        self.link(parent_frame, child_frame);
        let history = self.history;
        let edge = self
            .edges
            .entry(parent_frame.to_string())
            .or_default()
            .entry(child_frame.to_string())
            .or_insert_with(|| Edge::Stamped(VecDeque::new()));
        if let Edge::Static(_) = edge {
            *edge = Edge::Stamped(VecDeque::new());
        }
        if let Edge::Stamped(samples) = edge {
            let idx = samples.partition_point(|s| s.stamp_sec <= stamp_sec);
            samples.insert(idx, StampedTransform { stamp_sec, transform });
            while samples.len() > history {
                samples.pop_front();
            }
        }
    }

    /// Compute the composed [`Transform3D`] that maps points in
    /// `source_frame` into `target_frame` at `timestamp`.
    ///
    /// Returns `None` if the frames are not connected or any stamped edge on
    /// the path has no sample usable at `timestamp`.
    pub fn lookup_at(
        &self,
        timestamp: f64,
        target_frame: &str,
        source_frame: &str,
    ) -> Option<Transform3D> {
        if source_frame == target_frame {
            return Some(Transform3D::identity());
        }

        // BFS from the target; each queue item carries T_target_current.
        let mut queue: VecDeque<(&str, Transform3D)> = VecDeque::new();
        let mut visited: HashSet<&str> = HashSet::new();

        queue.push_back((target_frame, Transform3D::identity()));
        visited.insert(target_frame);

        while let Some((current, accumulated)) = queue.pop_front() {
            for (next, step) in self.neighbours(current, timestamp) {
                if visited.contains(next) {
                    continue;
                }
                let composed = accumulated.compose(step);
                if next == source_frame {
                    return Some(composed);
                }
                visited.insert(next);
                queue.push_back((next, composed));
            }
        }

        None
    }

    /// True when `frame` appears in any edge.
    pub fn has_frame(&self, frame: &str) -> bool {
        self.edges.contains_key(frame) || self.parents.contains_key(frame)
    }

    fn link(&mut self, parent_frame: &str, child_frame: &str) {
        self.parents
            .entry(child_frame.to_string())
            .or_default()
            .insert(parent_frame.to_string());
    }

    /// Frames adjacent to `frame` with the transform T_frame_next, skipping
    /// edges that have no usable sample at `timestamp`.
    fn neighbours<'a>(&'a self, frame: &str, timestamp: f64) -> Vec<(&'a str, Transform3D)> {
        let tolerance = self.tolerance_sec;
        let mut out = Vec::new();

        if let Some(children) = self.edges.get(frame) {
            for (child, edge) in children {
                if let Some(t) = edge.sample_at(timestamp, tolerance) {
                    out.push((child.as_str(), t));
                }
            }
        }
        if let Some(parents) = self.parents.get(frame) {
            for parent in parents {
                let edge = self.edges.get(parent).and_then(|c| c.get(frame));
                if let Some(t) = edge.and_then(|e| e.sample_at(timestamp, tolerance)) {
                    out.push((parent.as_str(), t.inverse()));
                }
            }
        }
        out
    }
}

impl TransformResolver for TfEngine {
    fn resolve(
        &self,
        timestamp: f64,
        target_frame: &str,
        source_frame: &str,
    ) -> Result<Transform3D, GuardianError> {
        self.lookup_at(timestamp, target_frame, source_frame)
            .ok_or_else(|| GuardianError::TransformUnavailable {
                timestamp,
                target_frame: target_frame.to_string(),
                source_frame: source_frame.to_string(),
            })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
