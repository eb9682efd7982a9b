//! # Render Backend Contract
//!
//! The seam between the engine core and a concrete renderer. The core owns
//! geometry, materials and simulation state; a backend consumes them into
//! GPU buffers when asked and draws frames. Backends are shared as
//! `Arc<dyn RenderBackend>` and must tolerate being called from the main
//! loop thread only.

use std::sync::Arc;

use crate::error::SceneResult;
use crate::model::Model;

pub trait RenderBackend: Send + Sync {
    /// Backend identifier for logs.
    fn name(&self) -> &str;

    /// Consume a model's geometry. Called when a model enters the scene and
    /// again whenever the model is dirty at commit time; after a successful
    /// return the caller marks the model's geometry clean.
    fn commit_geometry(&self, model: &Model) -> SceneResult<()>;

    /// Consume transfer-function colors, sampled opacities and value range.
    fn commit_transfer_function(
        &self,
        colors: &[[f32; 3]],
        opacities: &[f32],
        range: [f64; 2],
    ) -> SceneResult<()> {
        let _ = (colors, opacities, range);
        Ok(())
    }

    /// Consume one frame of simulation samples.
    fn commit_simulation_data(&self, frame: &[f32]) -> SceneResult<()> {
        let _ = frame;
        Ok(())
    }

    /// Draw one frame.
    fn render(&self) -> SceneResult<()>;
}

pub type RenderBackendRef = Arc<dyn RenderBackend>;
