//! # Headless Backend
//!
//! The render backend this binary ships: it consumes commits, keeps
//! counters for the statistics entrypoint and draws nothing. A GPU
//! backend would slot in behind the same [`RenderBackend`] trait.

use std::sync::atomic::{AtomicU64, Ordering};

use cajal_common::{Model, RenderBackend, SceneResult};
use tracing::debug;

#[derive(Default)]
pub struct HeadlessBackend {
    frames: AtomicU64,
    geometry_commits: AtomicU64,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn geometry_commits(&self) -> u64 {
        self.geometry_commits.load(Ordering::Relaxed)
    }
}

impl RenderBackend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn commit_geometry(&self, model: &Model) -> SceneResult<()> {
        self.geometry_commits.fetch_add(1, Ordering::Relaxed);
        let g = model.geometries();
        debug!(
            spheres = g.spheres.values().map(Vec::len).sum::<usize>(),
            cylinders = g.cylinders.values().map(Vec::len).sum::<usize>(),
            cones = g.cones.values().map(Vec::len).sum::<usize>(),
            meshes = g.triangle_meshes.len(),
            "geometry committed"
        );
        Ok(())
    }

    fn commit_transfer_function(
        &self,
        colors: &[[f32; 3]],
        opacities: &[f32],
        range: [f64; 2],
    ) -> SceneResult<()> {
        debug!(
            colors = colors.len(),
            opacities = opacities.len(),
            ?range,
            "transfer function committed"
        );
        Ok(())
    }

    fn commit_simulation_data(&self, frame: &[f32]) -> SceneResult<()> {
        debug!(samples = frame.len(), "simulation frame committed");
        Ok(())
    }

    fn render(&self) -> SceneResult<()> {
        self.frames.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cajal_common::geometry::Sphere;
    use glam::Vec3;

    #[test]
    fn test_counters_track_commits_and_frames() {
        let backend = HeadlessBackend::new();
        assert_eq!(backend.frames_rendered(), 0);

        let mut model = Model::new();
        model.add_sphere(0, Sphere::new(Vec3::ZERO, 1.0));
        backend.commit_geometry(&model).unwrap();
        backend.commit_geometry(&model).unwrap();
        backend.render().unwrap();

        assert_eq!(backend.geometry_commits(), 2);
        assert_eq!(backend.frames_rendered(), 1);
    }
}
