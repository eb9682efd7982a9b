//! # Lights
//!
//! Scene light sources. The scene stores lights as `Arc<Light>` and
//! deduplicates by pointer identity, so the same light object can be handed
//! to several scenes and removed again without any notion of a light id.

use glam::DVec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LightKind {
    Directional {
        direction: DVec3,
        /// Apparent source size in degrees; 0 gives hard shadows.
        angular_diameter: f64,
    },
    Sphere {
        position: DVec3,
        radius: f64,
    },
    Quad {
        position: DVec3,
        edge1: DVec3,
        edge2: DVec3,
    },
    Spot {
        position: DVec3,
        direction: DVec3,
        opening_angle: f64,
        penumbra_angle: f64,
        radius: f64,
    },
    Ambient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Light {
    #[serde(flatten)]
    pub kind: LightKind,
    pub color: DVec3,
    pub intensity: f64,
    /// Whether the source geometry itself is rendered.
    pub is_visible: bool,
}

impl Light {
    pub fn new(kind: LightKind, color: DVec3, intensity: f64) -> Self {
        Self {
            kind,
            color,
            intensity,
            is_visible: true,
        }
    }
}
