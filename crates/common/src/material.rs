//! # Materials
//!
//! Shading parameters keyed per model. Material ids are plain `u64`s chosen
//! by loaders; two values at the top of the range are reserved.

use glam::DVec3;

use crate::property::PropertyMap;

pub type MaterialId = u64;

/// Geometry that should not be shaded against any material.
pub const NO_MATERIAL: MaterialId = MaterialId::MAX;

/// Reserved material for synthesized bounding-box helper geometry.
pub const BOUNDINGBOX_MATERIAL_ID: MaterialId = MaterialId::MAX - 1;

/// Shading parameters plus a free-form extension map for renderer-specific
/// settings (shading modes, clipping behavior and the like).
#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    pub diffuse_color: DVec3,
    pub specular_color: DVec3,
    pub specular_exponent: f64,
    pub reflection_index: f64,
    pub opacity: f64,
    pub refraction_index: f64,
    pub emission: f64,
    pub glossiness: f64,
    /// Whether surfaces shaded with this material sample simulation data.
    pub casts_simulation_data: bool,
    pub properties: PropertyMap,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            diffuse_color: DVec3::ONE,
            specular_color: DVec3::ONE,
            specular_exponent: 10.0,
            reflection_index: 0.0,
            opacity: 1.0,
            refraction_index: 1.0,
            emission: 0.0,
            glossiness: 1.0,
            casts_simulation_data: false,
            properties: PropertyMap::new(),
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}
