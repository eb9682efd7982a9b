//! # Geometry Primitives
//!
//! Element types stored in a model's shared geometry block. Primitive shapes
//! (spheres, cylinders, cones) are `#[repr(C)]` plain-old-data so the binary
//! scene cache can write whole arrays with a single zero-copy cast; world
//! bounds are computed in `f64` (see [`crate::math`]).

use std::collections::BTreeMap;

use bytemuck::{Pod, Zeroable};
use glam::{DVec3, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::material::MaterialId;
use crate::math::Boxd;

// ============================================================================
// Primitive Shapes
// ============================================================================

/// Soma or point-cloud element.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn bounds(&self) -> Boxd {
        let c = self.center.as_dvec3();
        let r = DVec3::splat(f64::from(self.radius));
        Boxd::new(c - r, c + r)
    }
}

/// Constant-radius segment, e.g. an axon section.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Cylinder {
    pub center: Vec3,
    pub up: Vec3,
    pub radius: f32,
}

impl Cylinder {
    pub fn new(center: Vec3, up: Vec3, radius: f32) -> Self {
        Self { center, up, radius }
    }

    pub fn bounds(&self) -> Boxd {
        let r = DVec3::splat(f64::from(self.radius));
        let mut b = Boxd::EMPTY;
        b.merge_point(self.center.as_dvec3() - r);
        b.merge_point(self.center.as_dvec3() + r);
        b.merge_point(self.up.as_dvec3() - r);
        b.merge_point(self.up.as_dvec3() + r);
        b
    }
}

/// Tapered segment, e.g. a dendrite section thinning towards the tip.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Cone {
    pub center: Vec3,
    pub up: Vec3,
    pub center_radius: f32,
    pub up_radius: f32,
}

impl Cone {
    pub fn new(center: Vec3, up: Vec3, center_radius: f32, up_radius: f32) -> Self {
        Self {
            center,
            up,
            center_radius,
            up_radius,
        }
    }

    pub fn bounds(&self) -> Boxd {
        let rc = DVec3::splat(f64::from(self.center_radius));
        let ru = DVec3::splat(f64::from(self.up_radius));
        let mut b = Boxd::EMPTY;
        b.merge_point(self.center.as_dvec3() - rc);
        b.merge_point(self.center.as_dvec3() + rc);
        b.merge_point(self.up.as_dvec3() - ru);
        b.merge_point(self.up.as_dvec3() + ru);
        b
    }
}

// ============================================================================
// Meshes
// ============================================================================

/// Indexed triangle mesh. Normals, colors and texture coordinates are
/// optional and, when present, run parallel to `vertices`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriangleMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    #[serde(default)]
    pub normals: Vec<Vec3>,
    #[serde(default)]
    pub colors: Vec<Vec4>,
    #[serde(default)]
    pub texture_coords: Vec<[f32; 2]>,
}

impl TriangleMesh {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn bounds(&self) -> Boxd {
        let mut b = Boxd::EMPTY;
        for v in &self.vertices {
            b.merge_point(v.as_dvec3());
        }
        b
    }
}

/// Polyline bundle for fiber tracts. `points` holds xyz plus per-point
/// radius in `w`; `indices` marks the first point of each polyline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Streamline {
    pub points: Vec<Vec4>,
    #[serde(default)]
    pub colors: Vec<Vec4>,
    pub indices: Vec<u32>,
}

impl Streamline {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Boxd {
        let mut b = Boxd::EMPTY;
        for p in &self.points {
            let c = DVec3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z));
            let r = DVec3::splat(f64::from(p.w));
            b.merge_point(c - r);
            b.merge_point(c + r);
        }
        b
    }
}

// ============================================================================
// Curves
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CurveType {
    Flat,
    Round,
    Ribbon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplineType {
    Linear,
    Bezier,
    Bspline,
    CatmullRom,
}

/// Smooth dendrite/axon centerline. Same xyz+radius packing as streamlines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Curve {
    pub curve_type: CurveType,
    pub spline: SplineType,
    pub points: Vec<Vec4>,
    pub indices: Vec<u32>,
}

impl Curve {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn bounds(&self) -> Boxd {
        let mut b = Boxd::EMPTY;
        for p in &self.points {
            let c = DVec3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z));
            let r = DVec3::splat(f64::from(p.w));
            b.merge_point(c - r);
            b.merge_point(c + r);
        }
        b
    }
}

// ============================================================================
// Signed-Distance Geometry
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdfType {
    Sphere,
    Pill,
    ConePill,
    ConePillSigmoid,
}

/// One analytic SDF element. Interpretation of the fields depends on `kind`:
/// spheres use `p0`/`r0` only, pills run from `p0` to `p1`, cone pills taper
/// from `r0` at `p0` to `r1` at `p1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SdfGeometry {
    pub kind: SdfType,
    pub p0: Vec3,
    pub p1: Vec3,
    pub r0: f32,
    pub r1: f32,
    /// Application-defined tag (e.g. the source neuron section id).
    pub user_data: u64,
}

impl SdfGeometry {
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self {
            kind: SdfType::Sphere,
            p0: center,
            p1: center,
            r0: radius,
            r1: radius,
            user_data: 0,
        }
    }

    pub fn pill(kind: SdfType, p0: Vec3, p1: Vec3, r0: f32, r1: f32) -> Self {
        Self {
            kind,
            p0,
            p1,
            r0,
            r1,
            user_data: 0,
        }
    }

    pub fn bounds(&self) -> Boxd {
        let r0 = DVec3::splat(f64::from(self.r0));
        let r1 = DVec3::splat(f64::from(self.r1));
        let mut b = Boxd::EMPTY;
        b.merge_point(self.p0.as_dvec3() - r0);
        b.merge_point(self.p0.as_dvec3() + r0);
        if self.kind != SdfType::Sphere {
            b.merge_point(self.p1.as_dvec3() - r1);
            b.merge_point(self.p1.as_dvec3() + r1);
        }
        b
    }
}

/// All SDF elements of one model plus the blending topology between them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SdfGeometryData {
    pub geometries: Vec<SdfGeometry>,
    /// Element indices grouped per material.
    pub indices: BTreeMap<MaterialId, Vec<u64>>,
    /// Per-element neighbour lists; neighbouring elements blend smoothly.
    pub neighbours: Vec<Vec<u64>>,
}

impl SdfGeometryData {
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    pub fn bounds(&self) -> Boxd {
        let mut b = Boxd::EMPTY;
        for g in &self.geometries {
            b.merge(&g.bounds());
        }
        b
    }

    pub fn size_in_bytes(&self) -> u64 {
        let elements = self.geometries.len() * std::mem::size_of::<SdfGeometry>();
        let indices: usize = self.indices.values().map(|v| v.len() * 8).sum();
        let neighbours: usize = self.neighbours.iter().map(|v| v.len() * 8).sum();
        (elements + indices + neighbours) as u64
    }
}

// ============================================================================
// Volumes
// ============================================================================

/// Volumetric data block (e.g. a calcium concentration grid). Concrete
/// representations (bricked, shared-memory, out-of-core) live with the
/// loaders that produce them; the scene only needs spatial extent and size.
pub trait Volume: std::fmt::Debug + Send + Sync {
    fn bounds(&self) -> Boxd;

    fn size_in_bytes(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sphere_bounds() {
        let b = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 0.5).bounds();
        assert_eq!(b.min, DVec3::new(0.5, 1.5, 2.5));
        assert_eq!(b.max, DVec3::new(1.5, 2.5, 3.5));
    }

    #[test]
    fn test_cylinder_bounds_cover_both_caps() {
        let c = Cylinder::new(Vec3::ZERO, Vec3::new(0.0, 10.0, 0.0), 1.0);
        let b = c.bounds();
        assert_eq!(b.min, DVec3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.max, DVec3::new(1.0, 11.0, 1.0));
    }

    #[test]
    fn test_streamline_bounds_include_radius() {
        let s = Streamline {
            points: vec![Vec4::new(0.0, 0.0, 0.0, 2.0), Vec4::new(5.0, 0.0, 0.0, 1.0)],
            colors: vec![],
            indices: vec![0],
        };
        let b = s.bounds();
        assert_eq!(b.min, DVec3::new(-2.0, -2.0, -2.0));
        assert_eq!(b.max, DVec3::new(6.0, 1.0, 1.0));
    }

    #[test]
    fn test_sdf_sphere_ignores_second_endpoint() {
        let mut g = SdfGeometry::sphere(Vec3::ZERO, 1.0);
        g.p1 = Vec3::new(100.0, 0.0, 0.0);
        let b = g.bounds();
        assert_eq!(b.max, DVec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_sdf_cone_pill_uses_both_radii() {
        let g = SdfGeometry::pill(
            SdfType::ConePill,
            Vec3::ZERO,
            Vec3::new(4.0, 0.0, 0.0),
            2.0,
            0.5,
        );
        let b = g.bounds();
        assert_eq!(b.min, DVec3::new(-2.0, -2.0, -2.0));
        assert_eq!(b.max, DVec3::new(4.5, 2.0, 2.0));
    }

    #[test]
    fn test_primitive_layouts_are_cache_safe() {
        // The cache writes these arrays via bytemuck casts; layout changes
        // would silently corrupt existing files.
        assert_eq!(std::mem::size_of::<Sphere>(), 16);
        assert_eq!(std::mem::size_of::<Cylinder>(), 28);
        assert_eq!(std::mem::size_of::<Cone>(), 32);
    }
}
