//! # Models
//!
//! The unit of loaded content. A [`Model`] owns geometry containers behind a
//! shared lock, per-kind dirty flags and cached sub-bounds; a
//! [`ModelDescriptor`] wraps a model with identity, placement, instances and
//! loader provenance for the scene.
//!
//! ## Sharing and dirtiness
//!
//! Cloning a model is cheap: the geometry block is shared, the dirty flags
//! and bounds are copied. Two clones therefore see each other's geometry
//! edits but track their own dirtiness and bounds, which is what lets a
//! render backend keep a private clone in flight while loaders keep
//! appending. Mutable geometry access pessimistically marks the touched kind
//! dirty; only [`Model::mark_geometries_clean`] (called after a backend
//! consumed the data) clears the flags. `update_bounds` recomputes bounds of
//! dirty kinds but never clears dirtiness.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::RenderBackend;
use crate::error::SceneResult;
use crate::geometry::{
    Cone, Curve, Cylinder, SdfGeometry, SdfGeometryData, Sphere, Streamline, TriangleMesh, Volume,
};
use crate::material::{Material, MaterialId};
use crate::math::{Boxd, Transformation};
use crate::property::PropertyMap;
use crate::simulation::{AnimationParametersRef, SimulationHandlerRef};

// ============================================================================
// Geometry Kinds
// ============================================================================

/// The eight kinds of geometry a model can carry. Dirty flags and cached
/// sub-bounds are tracked per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryKind {
    Spheres,
    Cylinders,
    Cones,
    TriangleMeshes,
    Streamlines,
    Sdf,
    Curves,
    Volumes,
}

impl GeometryKind {
    pub const COUNT: usize = 8;

    pub const ALL: [GeometryKind; Self::COUNT] = [
        GeometryKind::Spheres,
        GeometryKind::Cylinders,
        GeometryKind::Cones,
        GeometryKind::TriangleMeshes,
        GeometryKind::Streamlines,
        GeometryKind::Sdf,
        GeometryKind::Curves,
        GeometryKind::Volumes,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

// ============================================================================
// Geometry Containers
// ============================================================================

/// All geometry of one model, grouped per material. This is the block shared
/// between model clones; mutate it through [`Model`] accessors so dirtiness
/// is tracked.
#[derive(Debug, Default)]
pub struct Geometries {
    pub spheres: BTreeMap<MaterialId, Vec<Sphere>>,
    pub cylinders: BTreeMap<MaterialId, Vec<Cylinder>>,
    pub cones: BTreeMap<MaterialId, Vec<Cone>>,
    pub triangle_meshes: BTreeMap<MaterialId, TriangleMesh>,
    pub streamlines: BTreeMap<MaterialId, Streamline>,
    pub sdf: SdfGeometryData,
    pub curves: BTreeMap<MaterialId, Vec<Curve>>,
    pub volumes: Vec<Arc<dyn Volume>>,
}

impl Geometries {
    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
            && self.cylinders.is_empty()
            && self.cones.is_empty()
            && self.triangle_meshes.is_empty()
            && self.streamlines.is_empty()
            && self.sdf.is_empty()
            && self.curves.is_empty()
            && self.volumes.is_empty()
    }

    /// Model-local bounds of one geometry kind (instance transforms are
    /// applied later, per descriptor).
    pub fn compute_bounds(&self, kind: GeometryKind) -> Boxd {
        let mut b = Boxd::EMPTY;
        match kind {
            GeometryKind::Spheres => {
                for s in self.spheres.values().flatten() {
                    b.merge(&s.bounds());
                }
            }
            GeometryKind::Cylinders => {
                for c in self.cylinders.values().flatten() {
                    b.merge(&c.bounds());
                }
            }
            GeometryKind::Cones => {
                for c in self.cones.values().flatten() {
                    b.merge(&c.bounds());
                }
            }
            GeometryKind::TriangleMeshes => {
                for m in self.triangle_meshes.values() {
                    b.merge(&m.bounds());
                }
            }
            GeometryKind::Streamlines => {
                for s in self.streamlines.values() {
                    b.merge(&s.bounds());
                }
            }
            GeometryKind::Sdf => b.merge(&self.sdf.bounds()),
            GeometryKind::Curves => {
                for c in self.curves.values().flatten() {
                    b.merge(&c.bounds());
                }
            }
            GeometryKind::Volumes => {
                for v in &self.volumes {
                    b.merge(&v.bounds());
                }
            }
        }
        b
    }

    pub fn size_in_bytes(&self) -> u64 {
        use std::mem::size_of;
        let mut total = 0usize;
        for v in self.spheres.values() {
            total += v.len() * size_of::<Sphere>();
        }
        for v in self.cylinders.values() {
            total += v.len() * size_of::<Cylinder>();
        }
        for v in self.cones.values() {
            total += v.len() * size_of::<Cone>();
        }
        for m in self.triangle_meshes.values() {
            total += m.vertices.len() * 12
                + m.indices.len() * 12
                + m.normals.len() * 12
                + m.colors.len() * 16
                + m.texture_coords.len() * 8;
        }
        for s in self.streamlines.values() {
            total += s.points.len() * 16 + s.colors.len() * 16 + s.indices.len() * 4;
        }
        for c in self.curves.values().flatten() {
            total += c.points.len() * 16 + c.indices.len() * 4;
        }
        total += self.sdf.size_in_bytes() as usize;
        let volume_bytes: u64 = self.volumes.iter().map(|v| v.size_in_bytes()).sum();
        total as u64 + volume_bytes
    }
}

// ============================================================================
// Model
// ============================================================================

/// Geometry, materials and simulation binding of one loaded asset.
pub struct Model {
    geometries: Arc<RwLock<Geometries>>,
    dirty: [bool; GeometryKind::COUNT],
    sub_bounds: [Boxd; GeometryKind::COUNT],
    bounds: Boxd,
    materials: BTreeMap<MaterialId, Material>,
    simulation_handler: Option<SimulationHandlerRef>,
    animation_parameters: Option<AnimationParametersRef>,
    is_ready_registered: bool,
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    pub fn new() -> Self {
        Self {
            geometries: Arc::new(RwLock::new(Geometries::default())),
            dirty: [false; GeometryKind::COUNT],
            sub_bounds: [Boxd::EMPTY; GeometryKind::COUNT],
            bounds: Boxd::EMPTY,
            materials: BTreeMap::new(),
            simulation_handler: None,
            animation_parameters: None,
            is_ready_registered: false,
        }
    }

    /// Shared read access to the geometry block.
    pub fn geometries(&self) -> RwLockReadGuard<'_, Geometries> {
        self.geometries.read()
    }

    /// True when the model holds no geometry at all.
    pub fn empty(&self) -> bool {
        self.geometries.read().is_empty()
    }

    // ------------------------------------------------------------------
    // Geometry mutation. Every path marks the touched kind dirty, even if
    // the caller ends up writing nothing.
    // ------------------------------------------------------------------

    pub fn add_sphere(&mut self, material: MaterialId, sphere: Sphere) -> u64 {
        self.mark_dirty(GeometryKind::Spheres);
        let mut g = self.geometries.write();
        let list = g.spheres.entry(material).or_default();
        list.push(sphere);
        (list.len() - 1) as u64
    }

    pub fn add_cylinder(&mut self, material: MaterialId, cylinder: Cylinder) -> u64 {
        self.mark_dirty(GeometryKind::Cylinders);
        let mut g = self.geometries.write();
        let list = g.cylinders.entry(material).or_default();
        list.push(cylinder);
        (list.len() - 1) as u64
    }

    pub fn add_cone(&mut self, material: MaterialId, cone: Cone) -> u64 {
        self.mark_dirty(GeometryKind::Cones);
        let mut g = self.geometries.write();
        let list = g.cones.entry(material).or_default();
        list.push(cone);
        (list.len() - 1) as u64
    }

    pub fn add_streamline(&mut self, material: MaterialId, streamline: Streamline) {
        self.mark_dirty(GeometryKind::Streamlines);
        self.geometries.write().streamlines.insert(material, streamline);
    }

    pub fn add_sdf_geometry(
        &mut self,
        material: MaterialId,
        geometry: SdfGeometry,
        neighbours: Vec<u64>,
    ) -> u64 {
        self.mark_dirty(GeometryKind::Sdf);
        let mut g = self.geometries.write();
        let index = g.sdf.geometries.len() as u64;
        g.sdf.geometries.push(geometry);
        g.sdf.neighbours.push(neighbours);
        g.sdf.indices.entry(material).or_default().push(index);
        index
    }

    pub fn add_curve(&mut self, material: MaterialId, curve: Curve) {
        self.mark_dirty(GeometryKind::Curves);
        self.geometries.write().curves.entry(material).or_default().push(curve);
    }

    pub fn add_volume(&mut self, volume: Arc<dyn Volume>) {
        self.mark_dirty(GeometryKind::Volumes);
        self.geometries.write().volumes.push(volume);
    }

    /// Write access to the triangle meshes, marking them dirty.
    pub fn triangle_meshes_mut(
        &mut self,
    ) -> MappedRwLockWriteGuard<'_, BTreeMap<MaterialId, TriangleMesh>> {
        self.mark_dirty(GeometryKind::TriangleMeshes);
        RwLockWriteGuard::map(self.geometries.write(), |g| &mut g.triangle_meshes)
    }

    /// Write access to the sphere containers, marking them dirty.
    pub fn spheres_mut(&mut self) -> MappedRwLockWriteGuard<'_, BTreeMap<MaterialId, Vec<Sphere>>> {
        self.mark_dirty(GeometryKind::Spheres);
        RwLockWriteGuard::map(self.geometries.write(), |g| &mut g.spheres)
    }

    /// Write access to the cylinder containers, marking them dirty.
    pub fn cylinders_mut(
        &mut self,
    ) -> MappedRwLockWriteGuard<'_, BTreeMap<MaterialId, Vec<Cylinder>>> {
        self.mark_dirty(GeometryKind::Cylinders);
        RwLockWriteGuard::map(self.geometries.write(), |g| &mut g.cylinders)
    }

    /// Write access to the cone containers, marking them dirty.
    pub fn cones_mut(&mut self) -> MappedRwLockWriteGuard<'_, BTreeMap<MaterialId, Vec<Cone>>> {
        self.mark_dirty(GeometryKind::Cones);
        RwLockWriteGuard::map(self.geometries.write(), |g| &mut g.cones)
    }

    fn mark_dirty(&mut self, kind: GeometryKind) {
        self.dirty[kind.index()] = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.iter().any(|d| *d)
    }

    pub fn is_kind_dirty(&self, kind: GeometryKind) -> bool {
        self.dirty[kind.index()]
    }

    /// Clear all dirty flags. Called after a render backend consumed the
    /// geometry; nothing else transitions flags back to clean.
    pub fn mark_geometries_clean(&mut self) {
        self.dirty = [false; GeometryKind::COUNT];
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    /// Recompute cached sub-bounds of dirty kinds and fold the union.
    /// Deliberately does not clear dirtiness: bounds maintenance and GPU
    /// upload are independent consumers of the same flags.
    pub fn update_bounds(&mut self) {
        {
            let g = self.geometries.read();
            for kind in GeometryKind::ALL {
                if self.dirty[kind.index()] {
                    self.sub_bounds[kind.index()] = g.compute_bounds(kind);
                }
            }
        }
        let mut b = Boxd::EMPTY;
        for sb in &self.sub_bounds {
            b.merge(sb);
        }
        self.bounds = b;
    }

    /// Model-local bounds as of the last [`Model::update_bounds`].
    pub fn bounds(&self) -> Boxd {
        self.bounds
    }

    /// Upload geometry to the backend, then mark it clean.
    pub fn commit_geometry(&mut self, backend: &dyn RenderBackend) -> SceneResult<()> {
        backend.commit_geometry(self)?;
        self.mark_geometries_clean();
        Ok(())
    }

    // ------------------------------------------------------------------
    // Materials
    // ------------------------------------------------------------------

    /// Create (or reset) the material for `id` and return it for setup.
    pub fn create_material(&mut self, id: MaterialId, name: &str) -> &mut Material {
        let material = self.materials.entry(id).or_insert_with(Material::default);
        *material = Material::new(name);
        material
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(&id)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(&id)
    }

    pub fn materials(&self) -> &BTreeMap<MaterialId, Material> {
        &self.materials
    }

    // ------------------------------------------------------------------
    // Simulation binding
    // ------------------------------------------------------------------

    pub fn set_simulation_handler(&mut self, handler: SimulationHandlerRef) {
        self.simulation_handler = Some(handler);
    }

    pub fn simulation_handler(&self) -> Option<&SimulationHandlerRef> {
        self.simulation_handler.as_ref()
    }

    /// Push the current frame of simulation data to the backend.
    ///
    /// On first use this registers the animation is-ready callback (one slot,
    /// first binder wins) and publishes the handler's frame metadata; the
    /// registration is undone when this model is dropped.
    pub fn commit_simulation_data(
        &mut self,
        backend: &dyn RenderBackend,
        animation: &AnimationParametersRef,
    ) -> SceneResult<()> {
        let Some(handler) = self.simulation_handler.clone() else {
            return Ok(());
        };

        if !self.is_ready_registered {
            let (frames, dt, unit) = {
                let h = handler.lock();
                (h.frame_count(), h.dt(), h.unit().to_string())
            };
            let mut ap = animation.lock();
            let cb_handler = handler.clone();
            if ap.set_is_ready_callback(Arc::new(move || cb_handler.lock().is_ready())) {
                self.is_ready_registered = true;
                self.animation_parameters = Some(animation.clone());
            }
            let frame_count = ap.frame_count().max(frames);
            ap.set_frame_count(frame_count);
            ap.set_dt(dt);
            ap.set_unit(unit);
        }

        let frame = animation.lock().current_frame();
        let mut h = handler.lock();
        if let Some(data) = h.frame_data(frame) {
            backend.commit_simulation_data(data)?;
        }
        Ok(())
    }

    pub fn size_in_bytes(&self) -> u64 {
        let mut total = self.geometries.read().size_in_bytes();
        if let Some(h) = &self.simulation_handler {
            total += h.lock().size_in_bytes();
        }
        total
    }
}

impl Clone for Model {
    /// Shares the geometry block; dirty flags and bounds are copied and then
    /// evolve independently. The clone never owns the is-ready registration.
    fn clone(&self) -> Self {
        Self {
            geometries: Arc::clone(&self.geometries),
            dirty: self.dirty,
            sub_bounds: self.sub_bounds,
            bounds: self.bounds,
            materials: self.materials.clone(),
            simulation_handler: self.simulation_handler.clone(),
            animation_parameters: None,
            is_ready_registered: false,
        }
    }
}

impl Drop for Model {
    fn drop(&mut self) {
        if self.is_ready_registered {
            if let Some(ap) = &self.animation_parameters {
                ap.lock().remove_is_ready_callback();
            }
        }
    }
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("bounds", &self.bounds)
            .field("dirty", &self.dirty)
            .field("materials", &self.materials.len())
            .field("has_simulation", &self.simulation_handler.is_some())
            .finish()
    }
}

// ============================================================================
// Instances
// ============================================================================

/// One placement of a model in the world.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ModelInstance {
    pub model_id: u64,
    pub instance_id: u64,
    pub visible: bool,
    /// Render the bounding-box helper for this placement.
    pub bounding_box: bool,
    pub transformation: Transformation,
}

impl ModelInstance {
    pub fn new(visible: bool, bounding_box: bool, transformation: Transformation) -> Self {
        Self {
            model_id: 0,
            instance_id: 0,
            visible,
            bounding_box,
            transformation,
        }
    }
}

// ============================================================================
// Model Descriptor
// ============================================================================

/// Callback fired right before a descriptor leaves the scene.
pub type RemovalCallback = Arc<dyn Fn(&ModelDescriptor) + Send + Sync>;

/// A model plus everything the scene needs to place and identify it: id,
/// name, loader provenance, a primary placement and any number of extra
/// instances.
pub struct ModelDescriptor {
    model_id: u64,
    pub name: String,
    pub path: String,
    pub loader_name: String,
    pub loader_properties: PropertyMap,
    pub metadata: BTreeMap<String, String>,
    pub visible: bool,
    /// Render the bounding-box helper for the primary placement.
    pub bounding_box: bool,
    /// Primary placement, applied on top of every instance transform.
    pub transformation: Transformation,
    /// Runtime-tunable properties exposed over the network.
    pub properties: PropertyMap,
    instances: Vec<ModelInstance>,
    next_instance_id: u64,
    instances_dirty: bool,
    bounds: Boxd,
    model: Model,
    removal_callback: Option<RemovalCallback>,
}

impl ModelDescriptor {
    pub fn new(model: Model, name: impl Into<String>) -> Self {
        Self {
            model_id: 0,
            name: name.into(),
            path: String::new(),
            loader_name: String::new(),
            loader_properties: PropertyMap::new(),
            metadata: BTreeMap::new(),
            visible: true,
            bounding_box: false,
            transformation: Transformation::default(),
            properties: PropertyMap::new(),
            instances: Vec::new(),
            next_instance_id: 0,
            instances_dirty: false,
            bounds: Boxd::EMPTY,
            model,
            removal_callback: None,
        }
    }

    pub fn model_id(&self) -> u64 {
        self.model_id
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.model_id = id;
        for i in &mut self.instances {
            i.model_id = id;
        }
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    // ------------------------------------------------------------------
    // Instances
    // ------------------------------------------------------------------

    /// Add a placement; ids are assigned by the descriptor.
    pub fn add_instance(&mut self, instance: ModelInstance) -> u64 {
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        let mut instance = instance;
        instance.model_id = self.model_id;
        instance.instance_id = id;
        self.instances.push(instance);
        self.instances_dirty = true;
        id
    }

    /// Remove a placement. Unknown ids are a no-op; either way the instance
    /// list counts as dirty only when something changed.
    pub fn remove_instance(&mut self, instance_id: u64) {
        let before = self.instances.len();
        self.instances.retain(|i| i.instance_id != instance_id);
        if self.instances.len() != before {
            self.instances_dirty = true;
        }
    }

    pub fn instance(&self, instance_id: u64) -> Option<&ModelInstance> {
        self.instances.iter().find(|i| i.instance_id == instance_id)
    }

    /// Mutable placement access; marks the instance list dirty.
    pub fn instance_mut(&mut self, instance_id: u64) -> Option<&mut ModelInstance> {
        self.instances_dirty = true;
        self.instances.iter_mut().find(|i| i.instance_id == instance_id)
    }

    pub fn instances(&self) -> &[ModelInstance] {
        &self.instances
    }

    pub fn instances_dirty(&self) -> bool {
        self.instances_dirty
    }

    pub fn mark_instances_clean(&mut self) {
        self.instances_dirty = false;
    }

    // ------------------------------------------------------------------
    // Bounds
    // ------------------------------------------------------------------

    /// World bounds: the model's local bounds pushed through every instance
    /// transform, then the primary transform. With no instances yet, the
    /// primary transform alone applies.
    pub fn compute_bounds(&mut self) {
        let local = self.model.bounds();
        let mut b = Boxd::EMPTY;
        if local.is_empty() {
            self.bounds = b;
            return;
        }
        if self.instances.is_empty() {
            b.merge(&local.transformed(&self.transformation));
        } else {
            for inst in &self.instances {
                for corner in local.corners() {
                    let placed = inst.transformation.transform_point(corner);
                    b.merge_point(self.transformation.transform_point(placed));
                }
            }
        }
        self.bounds = b;
    }

    /// World bounds as of the last [`ModelDescriptor::compute_bounds`].
    pub fn bounds(&self) -> Boxd {
        self.bounds
    }

    // ------------------------------------------------------------------
    // Removal notification
    // ------------------------------------------------------------------

    /// Register a listener fired right before removal from the scene.
    /// A second registration replaces the first.
    pub fn on_removed(&mut self, callback: RemovalCallback) {
        self.removal_callback = Some(callback);
    }

    pub(crate) fn invoke_removal_callback(&self) {
        if let Some(cb) = self.removal_callback.clone() {
            cb(self);
        }
    }
}

impl Clone for ModelDescriptor {
    /// Shares the model's geometry block; bounds, properties and instances
    /// are deep-copied. The removal callback stays with the original.
    fn clone(&self) -> Self {
        Self {
            model_id: self.model_id,
            name: self.name.clone(),
            path: self.path.clone(),
            loader_name: self.loader_name.clone(),
            loader_properties: self.loader_properties.clone(),
            metadata: self.metadata.clone(),
            visible: self.visible,
            bounding_box: self.bounding_box,
            transformation: self.transformation,
            properties: self.properties.clone(),
            instances: self.instances.clone(),
            next_instance_id: self.next_instance_id,
            instances_dirty: self.instances_dirty,
            bounds: self.bounds,
            model: self.model.clone(),
            removal_callback: None,
        }
    }
}

impl std::fmt::Debug for ModelDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDescriptor")
            .field("model_id", &self.model_id)
            .field("name", &self.name)
            .field("visible", &self.visible)
            .field("instances", &self.instances.len())
            .field("bounds", &self.bounds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::{AnimationParameters, SimulationHandler};
    use glam::{DVec3, Vec3};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullBackend;

    impl RenderBackend for NullBackend {
        fn name(&self) -> &str {
            "null"
        }

        fn commit_geometry(&self, _model: &Model) -> SceneResult<()> {
            Ok(())
        }

        fn render(&self) -> SceneResult<()> {
            Ok(())
        }
    }

    struct RampHandler {
        frame: Vec<f32>,
    }

    impl SimulationHandler for RampHandler {
        fn frame_count(&self) -> u32 {
            4
        }

        fn frame_size(&self) -> u64 {
            self.frame.len() as u64
        }

        fn dt(&self) -> f64 {
            0.1
        }

        fn unit(&self) -> &str {
            "ms"
        }

        fn frame_data(&mut self, _frame: u32) -> Option<&[f32]> {
            Some(&self.frame)
        }
    }

    fn sphere_model() -> Model {
        let mut m = Model::new();
        m.add_sphere(0, Sphere::new(Vec3::ZERO, 1.0));
        m
    }

    #[test]
    fn test_mutation_marks_dirty_and_clean_is_explicit() {
        let mut m = Model::new();
        assert!(!m.is_dirty());

        m.add_sphere(0, Sphere::new(Vec3::ZERO, 1.0));
        assert!(m.is_kind_dirty(GeometryKind::Spheres));

        // bounds maintenance must not consume the dirty flags
        m.update_bounds();
        assert!(m.is_dirty());
        assert_eq!(m.bounds().min, DVec3::splat(-1.0));

        m.mark_geometries_clean();
        assert!(!m.is_dirty());
    }

    #[test]
    fn test_update_bounds_skips_clean_kinds() {
        let mut m = sphere_model();
        m.update_bounds();
        m.mark_geometries_clean();

        // edit through a clone's accessor: the shared block changes but only
        // the clone's dirty flags know about it
        let mut clone = m.clone();
        clone.spheres_mut().get_mut(&0).unwrap()[0].radius = 10.0;

        m.update_bounds();
        assert_eq!(m.bounds().max, DVec3::splat(1.0)); // cached sub-bounds kept

        clone.update_bounds();
        assert_eq!(clone.bounds().max, DVec3::splat(10.0));
    }

    #[test]
    fn test_clone_shares_geometry_but_not_dirtiness() {
        let mut original = sphere_model();
        original.update_bounds();
        original.mark_geometries_clean();

        let clone = original.clone();
        assert!(!clone.is_dirty());

        let mut writer = clone.clone();
        writer.add_sphere(0, Sphere::new(Vec3::new(5.0, 0.0, 0.0), 1.0));

        // the write is visible through every clone...
        assert_eq!(original.geometries().spheres[&0].len(), 2);
        // ...but only the writer tracked it as dirty
        assert!(writer.is_dirty());
        assert!(!original.is_dirty());
    }

    #[test]
    fn test_commit_clears_dirty() {
        let mut m = sphere_model();
        m.commit_geometry(&NullBackend).unwrap();
        assert!(!m.is_dirty());
    }

    #[test]
    fn test_simulation_binding_registers_and_drop_deregisters() {
        let animation: AnimationParametersRef =
            Arc::new(Mutex::new(AnimationParameters::new()));
        let handler: SimulationHandlerRef =
            Arc::new(Mutex::new(RampHandler { frame: vec![0.0; 8] }));

        {
            let mut m = sphere_model();
            m.set_simulation_handler(handler);
            m.commit_simulation_data(&NullBackend, &animation).unwrap();

            let ap = animation.lock();
            assert!(ap.has_is_ready_callback());
            assert_eq!(ap.frame_count(), 4);
            assert_eq!(ap.unit(), "ms");
            drop(ap);

            // a second commit must not re-register
            m.commit_simulation_data(&NullBackend, &animation).unwrap();
            assert!(animation.lock().has_is_ready_callback());
        }

        // model dropped: the slot is free again
        assert!(!animation.lock().has_is_ready_callback());
    }

    #[test]
    fn test_descriptor_instance_bounds_and_dirty() {
        let mut m = sphere_model();
        m.update_bounds();
        let mut d = ModelDescriptor::new(m, "soma");

        d.add_instance(ModelInstance::new(true, false, Transformation::default()));
        let far = Transformation {
            translation: DVec3::new(10.0, 0.0, 0.0),
            ..Default::default()
        };
        let far_id = d.add_instance(ModelInstance::new(true, false, far));
        assert!(d.instances_dirty());
        d.mark_instances_clean();

        d.compute_bounds();
        assert_eq!(d.bounds().min, DVec3::new(-1.0, -1.0, -1.0));
        assert_eq!(d.bounds().max, DVec3::new(11.0, 1.0, 1.0));

        d.remove_instance(far_id);
        assert!(d.instances_dirty());
        d.compute_bounds();
        assert_eq!(d.bounds().max, DVec3::new(1.0, 1.0, 1.0));

        // removing an unknown id is a quiet no-op
        d.mark_instances_clean();
        d.remove_instance(999);
        assert!(!d.instances_dirty());
    }

    #[test]
    fn test_descriptor_clone_is_independent_but_shares_geometry() {
        let mut m = sphere_model();
        m.update_bounds();
        let mut d = ModelDescriptor::new(m, "original");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        d.on_removed(Arc::new(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        }));

        let mut c = d.clone();
        c.name = "copy".to_string();
        c.model_mut()
            .add_sphere(0, Sphere::new(Vec3::new(3.0, 0.0, 0.0), 1.0));

        // geometry is shared, bounds are not
        assert_eq!(d.model().geometries().spheres[&0].len(), 2);
        c.model_mut().update_bounds();
        c.compute_bounds();
        d.compute_bounds();
        assert_eq!(d.bounds().max, DVec3::splat(1.0));
        assert_eq!(c.bounds().max, DVec3::new(4.0, 1.0, 1.0));

        // the clone did not inherit the removal callback
        c.invoke_removal_callback();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        d.invoke_removal_callback();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
