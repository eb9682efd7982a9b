//! # Scene
//!
//! The root container every other subsystem hangs off: model descriptors,
//! lights, clip planes, the transfer function and simulation handlers.
//!
//! ## Concurrency
//!
//! The scene is shared as `Arc<Scene>` between the main loop and request
//! handlers. Each collection sits behind its own reader/writer lock and is
//! accessed through closures ([`Scene::with_model`] and friends), so lock
//! guards never escape and lock order stays trivial. The modified flag is an
//! atomic consumed once per change by the render loop.
//!
//! Model ids are strictly increasing and never reused within a scene, even
//! after removal, so a stale id from a client can never alias a new model.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use glam::DVec3;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::RenderBackendRef;
use crate::cache;
use crate::clip_plane::ClipPlane;
use crate::error::{SceneError, SceneResult};
use crate::light::Light;
use crate::loader::LoaderRegistry;
use crate::math::{Boxd, Transformation};
use crate::model::{ModelDescriptor, ModelInstance};
use crate::simulation::{AnimationParametersRef, SimulationHandlerRef};
use crate::transfer_function::TransferFunction;

pub struct Scene {
    backend: RenderBackendRef,
    loaders: LoaderRegistry,
    descriptors: RwLock<Vec<ModelDescriptor>>,
    next_model_id: AtomicU64,
    lights: RwLock<Vec<Arc<Light>>>,
    clip_planes: RwLock<Vec<ClipPlane>>,
    next_clip_plane_id: AtomicU64,
    transfer_function: RwLock<TransferFunction>,
    simulation_handler: RwLock<Option<SimulationHandlerRef>>,
    ca_diffusion_handler: RwLock<Option<SimulationHandlerRef>>,
    bounds: RwLock<Boxd>,
    modified: AtomicBool,
}

impl Scene {
    pub fn new(backend: RenderBackendRef) -> Self {
        Self {
            backend,
            loaders: LoaderRegistry::new(),
            descriptors: RwLock::new(Vec::new()),
            // id 0 is reserved for "not yet added"
            next_model_id: AtomicU64::new(1),
            lights: RwLock::new(Vec::new()),
            clip_planes: RwLock::new(Vec::new()),
            next_clip_plane_id: AtomicU64::new(1),
            transfer_function: RwLock::new(TransferFunction::default()),
            simulation_handler: RwLock::new(None),
            ca_diffusion_handler: RwLock::new(None),
            bounds: RwLock::new(Boxd::EMPTY),
            modified: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &RenderBackendRef {
        &self.backend
    }

    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    // ------------------------------------------------------------------
    // Models
    // ------------------------------------------------------------------

    /// Insert a loaded model into the scene.
    ///
    /// Rejects models with no geometry. On success the model's bounds are
    /// built, its geometry is committed to the backend, a fresh id is
    /// assigned, a default identity instance is synthesized when the
    /// descriptor has none, and the scene counts as modified.
    pub fn add_model(&self, mut descriptor: ModelDescriptor) -> SceneResult<u64> {
        if descriptor.model().empty() {
            return Err(SceneError::EmptyModel);
        }

        descriptor.model_mut().update_bounds();
        descriptor
            .model_mut()
            .commit_geometry(self.backend.as_ref())?;

        let id = self.next_model_id.fetch_add(1, Ordering::SeqCst);
        descriptor.assign_id(id);
        if descriptor.instances().is_empty() {
            descriptor.add_instance(ModelInstance::new(true, false, Transformation::default()));
        }
        descriptor.compute_bounds();

        self.descriptors.write().push(descriptor);
        self.mark_modified();
        Ok(id)
    }

    /// Remove a model by id, firing its removal callback before the
    /// descriptor is dropped. Removing an unknown id is a no-op returning
    /// `false`; ids are never reused either way.
    pub fn remove_model(&self, id: u64) -> bool {
        let removed = {
            let mut descriptors = self.descriptors.write();
            descriptors
                .iter()
                .position(|d| d.model_id() == id)
                .map(|i| descriptors.remove(i))
        };
        match removed {
            Some(descriptor) => {
                descriptor.invoke_removal_callback();
                self.mark_modified();
                true
            }
            None => false,
        }
    }

    /// Run `f` against a model under the shared lock. `None` for unknown ids.
    pub fn with_model<R>(&self, id: u64, f: impl FnOnce(&ModelDescriptor) -> R) -> Option<R> {
        let descriptors = self.descriptors.read();
        descriptors.iter().find(|d| d.model_id() == id).map(f)
    }

    /// Run `f` against a model under the exclusive lock. Callers that change
    /// anything observable should also call [`Scene::mark_modified`].
    pub fn with_model_mut<R>(
        &self,
        id: u64,
        f: impl FnOnce(&mut ModelDescriptor) -> R,
    ) -> Option<R> {
        let mut descriptors = self.descriptors.write();
        descriptors.iter_mut().find(|d| d.model_id() == id).map(f)
    }

    /// Visit every model under the shared lock.
    pub fn for_each_model(&self, mut f: impl FnMut(&ModelDescriptor)) {
        for d in self.descriptors.read().iter() {
            f(d);
        }
    }

    pub fn model_ids(&self) -> Vec<u64> {
        self.descriptors.read().iter().map(|d| d.model_id()).collect()
    }

    pub fn model_count(&self) -> usize {
        self.descriptors.read().len()
    }

    /// True when the scene holds no geometry (no models, or only empty ones).
    pub fn is_empty(&self) -> bool {
        self.descriptors.read().iter().all(|d| d.model().empty())
    }

    // ------------------------------------------------------------------
    // Lights
    // ------------------------------------------------------------------

    /// Add a light, deduplicated by pointer identity (not value): the same
    /// `Arc` twice is one light, two equal lights behind different `Arc`s
    /// are two.
    pub fn add_light(&self, light: Arc<Light>) {
        let mut lights = self.lights.write();
        if !lights.iter().any(|l| Arc::ptr_eq(l, &light)) {
            lights.push(light);
            drop(lights);
            self.mark_modified();
        }
    }

    /// Remove by pointer identity. Unknown lights are a no-op.
    pub fn remove_light(&self, light: &Arc<Light>) {
        let mut lights = self.lights.write();
        let before = lights.len();
        lights.retain(|l| !Arc::ptr_eq(l, light));
        if lights.len() != before {
            drop(lights);
            self.mark_modified();
        }
    }

    pub fn clear_lights(&self) {
        let mut lights = self.lights.write();
        if !lights.is_empty() {
            lights.clear();
            drop(lights);
            self.mark_modified();
        }
    }

    pub fn lights(&self) -> Vec<Arc<Light>> {
        self.lights.read().clone()
    }

    // ------------------------------------------------------------------
    // Clip planes
    // ------------------------------------------------------------------

    /// Add a clip plane under a fresh auto-generated id.
    pub fn add_clip_plane(&self, plane: [f64; 4]) -> u64 {
        let id = self.next_clip_plane_id.fetch_add(1, Ordering::SeqCst);
        self.clip_planes.write().push(ClipPlane::new(id, plane));
        self.mark_modified();
        id
    }

    pub fn clip_plane(&self, id: u64) -> Option<ClipPlane> {
        self.clip_planes.read().iter().find(|p| p.id() == id).copied()
    }

    pub fn update_clip_plane(&self, id: u64, plane: [f64; 4]) -> SceneResult<()> {
        let mut planes = self.clip_planes.write();
        let p = planes
            .iter_mut()
            .find(|p| p.id() == id)
            .ok_or(SceneError::ClipPlaneNotFound(id))?;
        p.plane = plane;
        drop(planes);
        self.mark_modified();
        Ok(())
    }

    pub fn remove_clip_plane(&self, id: u64) -> bool {
        let mut planes = self.clip_planes.write();
        let before = planes.len();
        planes.retain(|p| p.id() != id);
        let removed = planes.len() != before;
        drop(planes);
        if removed {
            self.mark_modified();
        }
        removed
    }

    pub fn clip_planes(&self) -> Vec<ClipPlane> {
        self.clip_planes.read().clone()
    }

    // ------------------------------------------------------------------
    // Transfer function and simulation
    // ------------------------------------------------------------------

    pub fn transfer_function(&self) -> RwLockReadGuard<'_, TransferFunction> {
        self.transfer_function.read()
    }

    pub fn transfer_function_mut(&self) -> RwLockWriteGuard<'_, TransferFunction> {
        self.transfer_function.write()
    }

    pub fn set_simulation_handler(&self, handler: Option<SimulationHandlerRef>) {
        *self.simulation_handler.write() = handler;
        self.mark_modified();
    }

    pub fn simulation_handler(&self) -> Option<SimulationHandlerRef> {
        self.simulation_handler.read().clone()
    }

    pub fn set_ca_diffusion_handler(&self, handler: Option<SimulationHandlerRef>) {
        *self.ca_diffusion_handler.write() = handler;
        self.mark_modified();
    }

    pub fn ca_diffusion_handler(&self) -> Option<SimulationHandlerRef> {
        self.ca_diffusion_handler.read().clone()
    }

    // ------------------------------------------------------------------
    // Bounds and accounting
    // ------------------------------------------------------------------

    /// Recompute every model's bounds and cache the world union. An empty
    /// union collapses to a point at the origin so cameras always have a
    /// target to frame.
    pub fn compute_bounds(&self) {
        let mut union = Boxd::EMPTY;
        {
            let mut descriptors = self.descriptors.write();
            for d in descriptors.iter_mut() {
                d.model_mut().update_bounds();
                d.compute_bounds();
                union.merge(&d.bounds());
            }
        }
        if union.is_empty() {
            union.merge_point(DVec3::ZERO);
        }
        *self.bounds.write() = union;
    }

    /// World bounds as of the last [`Scene::compute_bounds`].
    pub fn bounds(&self) -> Boxd {
        *self.bounds.read()
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.descriptors
            .read()
            .iter()
            .map(|d| d.model().size_in_bytes())
            .sum()
    }

    // ------------------------------------------------------------------
    // Commit
    // ------------------------------------------------------------------

    /// Push pending state to the backend: dirty model geometry, dirty
    /// instance lists, a modified transfer function and the current
    /// simulation frame of models carrying data.
    pub fn commit(&self, animation: &AnimationParametersRef) -> SceneResult<()> {
        {
            let mut descriptors = self.descriptors.write();
            for d in descriptors.iter_mut() {
                if d.model().is_dirty() {
                    d.model_mut().commit_geometry(self.backend.as_ref())?;
                }
                if d.instances_dirty() {
                    d.mark_instances_clean();
                }
                if d.model().simulation_handler().is_some() {
                    d.model_mut()
                        .commit_simulation_data(self.backend.as_ref(), animation)?;
                }
            }
        }

        let mut tf = self.transfer_function.write();
        if tf.is_modified() {
            let colors = tf.colors().to_vec();
            let opacities = tf.interpolated_opacities(colors.len().max(2));
            self.backend
                .commit_transfer_function(&colors, &opacities, tf.values_range())?;
            tf.reset_modified();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Binary cache
    // ------------------------------------------------------------------

    /// Serialize every model's geometry and materials to `path`.
    pub fn save_to_cache_file(&self, path: impl AsRef<Path>) -> SceneResult<()> {
        let descriptors = self.descriptors.read();
        cache::save_to_file(descriptors.as_slice(), path)?;
        Ok(())
    }

    /// Append every model stored in the cache file at `path` to this scene.
    /// A file written under a different [`cache::CACHE_VERSION`] is refused
    /// before the scene is touched.
    pub fn load_from_cache_file(&self, path: impl AsRef<Path>) -> SceneResult<Vec<u64>> {
        let models = cache::load_from_file(path)?;
        let mut ids = Vec::with_capacity(models.len());
        for descriptor in models {
            // cached models may hold only uncached kinds; skip those
            if descriptor.model().empty() {
                continue;
            }
            ids.push(self.add_model(descriptor)?);
        }
        Ok(ids)
    }

    // ------------------------------------------------------------------
    // Modified flag
    // ------------------------------------------------------------------

    pub fn mark_modified(&self) {
        self.modified.store(true, Ordering::SeqCst);
    }

    pub fn is_modified(&self) -> bool {
        self.modified.load(Ordering::SeqCst)
    }

    /// Consume the modified flag: returns `true` at most once per change.
    pub fn take_modified(&self) -> bool {
        self.modified.swap(false, Ordering::SeqCst)
    }

    // ------------------------------------------------------------------
    // Wholesale replacement
    // ------------------------------------------------------------------

    /// Replace this scene's content with a copy of `other`'s: models (sharing
    /// geometry blocks), lights, clip planes and transfer function. The id
    /// counters adopt `other`'s so ids stay unique afterwards.
    pub fn copy_from(&self, other: &Scene) {
        {
            let mut mine = self.descriptors.write();
            let theirs = other.descriptors.read();
            *mine = theirs.clone();
        }
        *self.lights.write() = other.lights.read().clone();
        *self.clip_planes.write() = other.clip_planes.read().clone();
        *self.transfer_function.write() = other.transfer_function.read().clone();
        self.next_model_id
            .store(other.next_model_id.load(Ordering::SeqCst), Ordering::SeqCst);
        self.next_clip_plane_id.store(
            other.next_clip_plane_id.load(Ordering::SeqCst),
            Ordering::SeqCst,
        );
        self.compute_bounds();
        self.mark_modified();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RenderBackend;
    use crate::geometry::Sphere;
    use crate::light::LightKind;
    use crate::model::Model;
    use crate::simulation::SimulationHandler;
    use glam::Vec3;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingBackend {
        commits: AtomicUsize,
    }

    impl RenderBackend for CountingBackend {
        fn name(&self) -> &str {
            "counting"
        }

        fn commit_geometry(&self, _model: &Model) -> SceneResult<()> {
            self.commits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn render(&self) -> SceneResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FlatHandler {
        frame: Vec<f32>,
    }

    impl SimulationHandler for FlatHandler {
        fn frame_count(&self) -> u32 {
            1
        }

        fn frame_size(&self) -> u64 {
            self.frame.len() as u64
        }

        fn dt(&self) -> f64 {
            1.0
        }

        fn unit(&self) -> &str {
            "ms"
        }

        fn frame_data(&mut self, _frame: u32) -> Option<&[f32]> {
            Some(&self.frame)
        }
    }

    struct FailingBackend;

    impl RenderBackend for FailingBackend {
        fn name(&self) -> &str {
            "failing"
        }

        fn commit_geometry(&self, _model: &Model) -> SceneResult<()> {
            Err(SceneError::CommitFailed("device lost".to_string()))
        }

        fn render(&self) -> SceneResult<()> {
            Ok(())
        }
    }

    fn test_scene() -> (Arc<CountingBackend>, Scene) {
        let backend = Arc::new(CountingBackend::default());
        let scene = Scene::new(backend.clone());
        (backend, scene)
    }

    fn sphere_descriptor(name: &str, x: f32) -> ModelDescriptor {
        let mut m = Model::new();
        m.add_sphere(0, Sphere::new(Vec3::new(x, 0.0, 0.0), 1.0));
        ModelDescriptor::new(m, name)
    }

    #[test]
    fn test_add_model_rejects_empty() {
        let (_, scene) = test_scene();
        let err = scene
            .add_model(ModelDescriptor::new(Model::new(), "void"))
            .unwrap_err();
        assert!(matches!(err, SceneError::EmptyModel));
        assert_eq!(scene.model_count(), 0);
        assert!(!scene.is_modified());
    }

    #[test]
    fn test_backend_commit_failure_aborts_insert() {
        let scene = Scene::new(Arc::new(FailingBackend));
        let err = scene.add_model(sphere_descriptor("a", 0.0)).unwrap_err();
        assert!(matches!(err, SceneError::CommitFailed(_)));
        assert_eq!(scene.model_count(), 0);
        assert!(!scene.is_modified());
    }

    #[test]
    fn test_model_ids_increase_and_are_never_reused() {
        let (_, scene) = test_scene();
        let a = scene.add_model(sphere_descriptor("a", 0.0)).unwrap();
        let b = scene.add_model(sphere_descriptor("b", 5.0)).unwrap();
        assert!(b > a);

        assert!(scene.remove_model(a));
        let c = scene.add_model(sphere_descriptor("c", 9.0)).unwrap();
        assert!(c > b);

        // the removed id stays dead
        assert!(scene.with_model(a, |_| ()).is_none());
        assert!(!scene.remove_model(a));
    }

    #[test]
    fn test_add_model_synthesizes_default_instance() {
        let (_, scene) = test_scene();
        let id = scene.add_model(sphere_descriptor("a", 0.0)).unwrap();
        let count = scene.with_model(id, |d| d.instances().len()).unwrap();
        assert_eq!(count, 1);
        let inst = scene
            .with_model(id, |d| d.instances()[0].clone())
            .unwrap();
        assert!(inst.visible);
        assert_eq!(inst.model_id, id);
        assert!(inst.transformation.is_identity());
    }

    #[test]
    fn test_removal_callback_fires_exactly_once() {
        let (_, scene) = test_scene();
        let hits = Arc::new(AtomicUsize::new(0));
        let mut d = sphere_descriptor("a", 0.0);
        let h = hits.clone();
        d.on_removed(Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));
        let id = scene.add_model(d).unwrap();

        assert!(scene.remove_model(id));
        assert!(!scene.remove_model(id));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_modified_flag_is_consumed_once() {
        let (_, scene) = test_scene();
        scene.add_model(sphere_descriptor("a", 0.0)).unwrap();
        assert!(scene.take_modified());
        assert!(!scene.take_modified());

        scene.add_clip_plane([0.0, 1.0, 0.0, 0.0]);
        assert!(scene.is_modified());
        assert!(scene.take_modified());
    }

    #[test]
    fn test_empty_scene_bounds_collapse_to_origin() {
        let (_, scene) = test_scene();
        scene.compute_bounds();
        let b = scene.bounds();
        assert_eq!(b.min, DVec3::ZERO);
        assert_eq!(b.max, DVec3::ZERO);
    }

    #[test]
    fn test_world_bounds_union_all_instances() {
        let (_, scene) = test_scene();
        scene.add_model(sphere_descriptor("a", 0.0)).unwrap();
        let id = scene.add_model(sphere_descriptor("b", 0.0)).unwrap();
        scene.with_model_mut(id, |d| {
            d.add_instance(ModelInstance::new(
                true,
                false,
                Transformation {
                    translation: DVec3::new(20.0, 0.0, 0.0),
                    ..Default::default()
                },
            ));
        });

        scene.compute_bounds();
        let b = scene.bounds();
        assert_eq!(b.min, DVec3::new(-1.0, -1.0, -1.0));
        assert_eq!(b.max, DVec3::new(21.0, 1.0, 1.0));
    }

    #[test]
    fn test_commit_skips_clean_models() {
        let (backend, scene) = test_scene();
        let animation: AnimationParametersRef = Arc::new(parking_lot::Mutex::new(
            crate::simulation::AnimationParameters::new(),
        ));
        let id = scene.add_model(sphere_descriptor("a", 0.0)).unwrap();
        assert_eq!(backend.commits.load(Ordering::SeqCst), 1); // from add_model

        scene.commit(&animation).unwrap();
        assert_eq!(backend.commits.load(Ordering::SeqCst), 1); // still clean

        scene.with_model_mut(id, |d| {
            d.model_mut()
                .add_sphere(0, Sphere::new(Vec3::new(2.0, 0.0, 0.0), 1.0));
        });
        scene.commit(&animation).unwrap();
        assert_eq!(backend.commits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lights_deduplicate_by_pointer_identity() {
        let (_, scene) = test_scene();
        let light = Arc::new(Light::new(LightKind::Ambient, DVec3::ONE, 1.0));
        scene.add_light(light.clone());
        scene.add_light(light.clone());
        assert_eq!(scene.lights().len(), 1);

        // an equal value behind a different pointer is a different light
        let twin = Arc::new(Light::new(LightKind::Ambient, DVec3::ONE, 1.0));
        scene.add_light(twin.clone());
        assert_eq!(scene.lights().len(), 2);

        scene.remove_light(&light);
        assert_eq!(scene.lights().len(), 1);
        assert!(Arc::ptr_eq(&scene.lights()[0], &twin));
    }

    #[test]
    fn test_scene_level_simulation_handler_slots() {
        let (_, scene) = test_scene();
        assert!(scene.simulation_handler().is_none());
        assert!(scene.ca_diffusion_handler().is_none());

        let handler: SimulationHandlerRef = Arc::new(Mutex::new(FlatHandler::default()));
        scene.set_simulation_handler(Some(handler.clone()));
        scene.set_ca_diffusion_handler(Some(handler));
        assert!(scene.simulation_handler().is_some());
        assert!(scene.ca_diffusion_handler().is_some());

        // the slots are independent
        scene.set_ca_diffusion_handler(None);
        assert!(scene.ca_diffusion_handler().is_none());
        assert!(scene.simulation_handler().is_some());
    }

    #[test]
    fn test_clip_plane_ids_and_updates() {
        let (_, scene) = test_scene();
        let a = scene.add_clip_plane([1.0, 0.0, 0.0, 0.0]);
        let b = scene.add_clip_plane([0.0, 1.0, 0.0, -2.0]);
        assert!(b > a);

        scene.update_clip_plane(a, [1.0, 0.0, 0.0, 5.0]).unwrap();
        assert_eq!(scene.clip_plane(a).unwrap().plane[3], 5.0);

        assert!(scene.remove_clip_plane(a));
        assert!(!scene.remove_clip_plane(a));
        assert!(scene.clip_plane(a).is_none());
        assert!(scene.update_clip_plane(a, [0.0; 4]).is_err());
        assert_eq!(scene.clip_planes().len(), 1);
    }

    #[test]
    fn test_cache_round_trip_reproduces_models() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene.cache");

        let (_, scene) = test_scene();
        let mut d = sphere_descriptor("a", 0.0);
        d.model_mut()
            .add_sphere(2, Sphere::new(Vec3::new(4.0, 0.0, 0.0), 0.5));
        scene.add_model(d).unwrap();
        scene.add_model(sphere_descriptor("b", 8.0)).unwrap();
        scene.save_to_cache_file(&path).unwrap();

        let (_, restored) = test_scene();
        let ids = restored.load_from_cache_file(&path).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(restored.model_count(), 2);

        let counts: Vec<usize> = restored
            .model_ids()
            .iter()
            .map(|id| {
                restored
                    .with_model(*id, |d| {
                        d.model().geometries().spheres.values().map(Vec::len).sum()
                    })
                    .unwrap()
            })
            .collect();
        assert_eq!(counts, vec![2, 1]);
    }

    #[test]
    fn test_copy_from_adopts_content_and_counters() {
        let (_, source) = test_scene();
        source.add_model(sphere_descriptor("a", 0.0)).unwrap();
        let last = source.add_model(sphere_descriptor("b", 3.0)).unwrap();
        source.add_clip_plane([0.0, 1.0, 0.0, 0.0]);

        let (_, target) = test_scene();
        target.copy_from(&source);
        assert_eq!(target.model_count(), 2);
        assert_eq!(target.clip_planes().len(), 1);
        assert!(!target.bounds().is_empty());

        // new ids continue past the copied ones
        let next = target.add_model(sphere_descriptor("c", 6.0)).unwrap();
        assert!(next > last);
    }
}
