//! # World-Space Math
//!
//! Double-precision bounding boxes and TRS transforms. Geometry buffers are
//! stored in `f32` (see [`crate::geometry`]); everything that accumulates or
//! compares world-space positions runs in `f64` to keep large scientific
//! scenes (micrometer soma positions inside meter-scale circuits) stable.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

// ============================================================================
// Bounding Box
// ============================================================================

/// Axis-aligned bounding box in `f64` world space.
///
/// A default-constructed box is empty: `min` starts at `+INFINITY` and `max`
/// at `-INFINITY`, so the first [`Boxd::merge_point`] initializes both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boxd {
    pub min: DVec3,
    pub max: DVec3,
}

impl Default for Boxd {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Boxd {
    /// The empty box. Merging anything into it yields that thing's bounds.
    pub const EMPTY: Self = Self {
        min: DVec3::splat(f64::INFINITY),
        max: DVec3::splat(f64::NEG_INFINITY),
    };

    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// True while no point has ever been merged.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Forget all merged points, returning to the empty state.
    pub fn reset(&mut self) {
        *self = Self::EMPTY;
    }

    /// Grow the box to contain `point`.
    pub fn merge_point(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Grow the box to contain `other`. Merging an empty box is a no-op.
    pub fn merge(&mut self, other: &Boxd) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// The eight corner points. Meaningless for an empty box.
    pub fn corners(&self) -> [DVec3; 8] {
        let (mn, mx) = (self.min, self.max);
        [
            DVec3::new(mn.x, mn.y, mn.z),
            DVec3::new(mx.x, mn.y, mn.z),
            DVec3::new(mn.x, mx.y, mn.z),
            DVec3::new(mx.x, mx.y, mn.z),
            DVec3::new(mn.x, mn.y, mx.z),
            DVec3::new(mx.x, mn.y, mx.z),
            DVec3::new(mn.x, mx.y, mx.z),
            DVec3::new(mx.x, mx.y, mx.z),
        ]
    }

    /// Bounds of this box under `transform`, computed by merging the eight
    /// transformed corners. Returns the empty box unchanged.
    pub fn transformed(&self, transform: &Transformation) -> Boxd {
        if self.is_empty() {
            return *self;
        }
        let mut out = Boxd::EMPTY;
        for corner in self.corners() {
            out.merge_point(transform.transform_point(corner));
        }
        out
    }
}

// ============================================================================
// Transformation
// ============================================================================

/// Rigid placement of a model in world space: scale, rotation about a pivot,
/// then translation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transformation {
    pub translation: DVec3,
    pub scale: DVec3,
    pub rotation: DQuat,
    pub rotation_center: DVec3,
}

impl Default for Transformation {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            scale: DVec3::ONE,
            rotation: DQuat::IDENTITY,
            rotation_center: DVec3::ZERO,
        }
    }
}

impl Transformation {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Apply scale, rotation about `rotation_center`, then translation.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        let scaled = self.scale * point;
        let rotated = self.rotation * (scaled - self.rotation_center) + self.rotation_center;
        rotated + self.translation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_empty_box_merges_to_point() {
        let mut b = Boxd::default();
        assert!(b.is_empty());
        b.merge_point(DVec3::new(1.0, 2.0, 3.0));
        assert!(!b.is_empty());
        assert_eq!(b.min, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.max, DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_merge_empty_box_is_noop() {
        let mut b = Boxd::new(DVec3::ZERO, DVec3::ONE);
        b.merge(&Boxd::EMPTY);
        assert_eq!(b.min, DVec3::ZERO);
        assert_eq!(b.max, DVec3::ONE);
    }

    #[test]
    fn test_center_and_size() {
        let b = Boxd::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(b.center(), DVec3::ZERO);
        assert_eq!(b.size(), DVec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_identity_transform_keeps_points() {
        let t = Transformation::identity();
        let p = DVec3::new(4.0, 5.0, 6.0);
        assert_eq!(t.transform_point(p), p);
    }

    #[test]
    fn test_rotation_about_center() {
        // Quarter turn around Y through pivot (1,0,0) maps (2,0,0) to (1,0,-1)
        let t = Transformation {
            rotation: DQuat::from_rotation_y(FRAC_PI_2),
            rotation_center: DVec3::new(1.0, 0.0, 0.0),
            ..Default::default()
        };
        let p = t.transform_point(DVec3::new(2.0, 0.0, 0.0));
        assert!((p - DVec3::new(1.0, 0.0, -1.0)).length() < 1e-9);
    }

    #[test]
    fn test_transformed_bounds_grow_with_translation() {
        let b = Boxd::new(DVec3::ZERO, DVec3::ONE);
        let t = Transformation {
            translation: DVec3::new(10.0, 0.0, 0.0),
            ..Default::default()
        };
        let moved = b.transformed(&t);
        assert_eq!(moved.min, DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(moved.max, DVec3::new(11.0, 1.0, 1.0));
    }
}
