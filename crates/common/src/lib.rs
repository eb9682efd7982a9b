//! # Cajal Common
//!
//! Scene graph, runtime-typed property system and binary scene cache shared
//! across all Cajal crates.
//!
//! ## Modules
//!
//! - `any`: tagged runtime-typed values and enum properties
//! - `conversion`: the (from, to) converter registry behind property updates
//! - `property`: named, documented, observable properties and property maps
//! - `math`: double-precision bounds and affine transformations
//! - `geometry`: renderable primitives (spheres, cylinders, cones, meshes, ...)
//! - `material`, `light`, `clip_plane`, `transfer_function`: shading state
//! - `model`, `scene`: the concurrent scene graph and its dirty tracking
//! - `simulation`: animation parameters and simulation data handlers
//! - `loader`: pluggable model importers and their registry
//! - `cache`: the version-locked binary scene cache
//! - `backend`: the hooks a render backend implements
//!
//! ## Architecture
//!
//! - **Properties**: loaders and entrypoints describe tunables as
//!   [`property::PropertyMap`]s; values change type-safely through the
//!   [`conversion`] registry.
//! - **Scene graph**: one [`scene::Scene`] owns [`model::ModelDescriptor`]s
//!   behind a reader/writer lock; per-kind dirty flags defer GPU upload to
//!   commit time.
//! - **Backends**: rendering is reached only through
//!   [`backend::RenderBackend`], so the scene layer stays renderer-agnostic.

pub mod any;
pub mod backend;
pub mod cache;
pub mod clip_plane;
pub mod conversion;
pub mod error;
pub mod geometry;
pub mod light;
pub mod loader;
pub mod material;
pub mod math;
pub mod model;
pub mod property;
pub mod scene;
pub mod simulation;
pub mod transfer_function;

// Re-export the property system for convenience
pub use any::{EnumProperty, PropertyData, PropertyType, PropertyValue};
pub use conversion::{converters, ConverterRegistry};
pub use property::{Property, PropertyMap};

// Re-export the scene graph types
pub use clip_plane::ClipPlane;
pub use light::{Light, LightKind};
pub use material::{Material, MaterialId, BOUNDINGBOX_MATERIAL_ID, NO_MATERIAL};
pub use math::{Boxd, Transformation};
pub use model::{GeometryKind, Model, ModelDescriptor, ModelInstance};
pub use scene::Scene;
pub use transfer_function::TransferFunction;

// Re-export simulation and loading
pub use loader::{Blob, Loader, LoaderProgress, LoaderRegistry};
pub use simulation::{
    AnimationParameters, AnimationParametersRef, SimulationHandler, SimulationHandlerRef,
};

// Re-export the backend seam and error types
pub use backend::{RenderBackend, RenderBackendRef};
pub use error::{
    CacheError, CacheResult, PropertyError, PropertyResult, SceneError, SceneResult,
};
