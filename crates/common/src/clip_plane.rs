//! # Clip Planes
//!
//! World-space clipping planes in Hessian normal form. Ids are generated by
//! the owning scene and never reused within it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlane {
    id: u64,
    /// `[a, b, c, d]` of the plane equation `a*x + b*y + c*z + d = 0`.
    pub plane: [f64; 4],
}

impl ClipPlane {
    pub(crate) fn new(id: u64, plane: [f64; 4]) -> Self {
        Self { id, plane }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}
