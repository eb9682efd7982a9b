//! # Transfer Function
//!
//! Maps simulation values (e.g. membrane voltages) to color and opacity.
//! Colors are sampled uniformly across the value range; opacity comes from
//! piecewise-linear control points over normalized [0, 1].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunction {
    colors: Vec<[f32; 3]>,
    /// `[position, opacity]` pairs with position in [0, 1], sorted ascending.
    control_points: Vec<[f64; 2]>,
    values_range: [f64; 2],
    #[serde(skip)]
    modified: bool,
}

impl Default for TransferFunction {
    fn default() -> Self {
        // Blue-to-red voltage ramp, fully opaque
        Self {
            colors: vec![[0.0, 0.0, 1.0], [1.0, 0.0, 0.0]],
            control_points: vec![[0.0, 1.0], [1.0, 1.0]],
            values_range: [0.0, 255.0],
            modified: true,
        }
    }
}

impl TransferFunction {
    pub fn colors(&self) -> &[[f32; 3]] {
        &self.colors
    }

    pub fn set_colors(&mut self, colors: Vec<[f32; 3]>) {
        self.colors = colors;
        self.modified = true;
    }

    pub fn control_points(&self) -> &[[f64; 2]] {
        &self.control_points
    }

    /// Control points are re-sorted by position on assignment.
    pub fn set_control_points(&mut self, mut points: Vec<[f64; 2]>) {
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));
        self.control_points = points;
        self.modified = true;
    }

    pub fn values_range(&self) -> [f64; 2] {
        self.values_range
    }

    pub fn set_values_range(&mut self, range: [f64; 2]) {
        self.values_range = range;
        self.modified = true;
    }

    /// Opacity sampled at `count` uniform positions across [0, 1] by linear
    /// interpolation between control points.
    pub fn interpolated_opacities(&self, count: usize) -> Vec<f32> {
        if count == 0 {
            return Vec::new();
        }
        if self.control_points.is_empty() {
            return vec![1.0; count];
        }
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let x = if count == 1 {
                0.0
            } else {
                i as f64 / (count - 1) as f64
            };
            out.push(self.opacity_at(x) as f32);
        }
        out
    }

    fn opacity_at(&self, x: f64) -> f64 {
        let points = &self.control_points;
        if x <= points[0][0] {
            return points[0][1];
        }
        for pair in points.windows(2) {
            let ([x0, y0], [x1, y1]) = (pair[0], pair[1]);
            if x <= x1 {
                if x1 - x0 <= f64::EPSILON {
                    return y1;
                }
                let t = (x - x0) / (x1 - x0);
                return y0 + t * (y1 - y0);
            }
        }
        points[points.len() - 1][1]
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn reset_modified(&mut self) {
        self.modified = false;
    }
}
