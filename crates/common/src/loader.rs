//! # Loader Contract
//!
//! File-format importers plug in here. The engine core ships no real
//! importers; it defines how loaders are found (by explicit name, then by
//! file extension), how they report progress, and what they produce.

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{SceneError, SceneResult};
use crate::model::ModelDescriptor;
use crate::property::PropertyMap;

/// Raw file content pushed over the network instead of a path.
#[derive(Debug, Clone)]
pub struct Blob {
    /// Format hint, usually the file extension (e.g. `"xyz"`).
    pub kind: String,
    pub name: String,
    pub data: Vec<u8>,
}

/// Progress sink handed to a running import. Loaders call
/// [`LoaderProgress::update`] with a message and a completed fraction in
/// [0, 1]; the network layer forwards these as progress notifications.
#[derive(Clone, Default)]
pub struct LoaderProgress {
    callback: Option<Arc<dyn Fn(&str, f64) + Send + Sync>>,
}

impl LoaderProgress {
    pub fn new(callback: Arc<dyn Fn(&str, f64) + Send + Sync>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    /// A progress sink that drops every update.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn update(&self, message: &str, fraction: f64) {
        if let Some(cb) = &self.callback {
            cb(message, fraction.clamp(0.0, 1.0));
        }
    }
}

/// A file-format importer.
pub trait Loader: Send + Sync {
    fn name(&self) -> &str;

    /// Supported file extensions, lower-case, without the dot.
    fn extensions(&self) -> &[&str];

    /// Properties the loader understands, with their defaults. Callers merge
    /// user-supplied values over these before importing.
    fn default_properties(&self) -> PropertyMap {
        PropertyMap::new()
    }

    fn import_from_file(
        &self,
        path: &Path,
        progress: &LoaderProgress,
        properties: &PropertyMap,
    ) -> SceneResult<ModelDescriptor>;

    fn import_from_blob(
        &self,
        blob: Blob,
        progress: &LoaderProgress,
        properties: &PropertyMap,
    ) -> SceneResult<ModelDescriptor>;
}

/// Registry of available loaders. Registration happens at startup; lookups
/// are cheap and lock briefly.
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: RwLock<Vec<Arc<dyn Loader>>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, loader: Arc<dyn Loader>) {
        self.loaders.write().push(loader);
    }

    pub fn names(&self) -> Vec<String> {
        self.loaders
            .read()
            .iter()
            .map(|l| l.name().to_string())
            .collect()
    }

    pub fn loader_by_name(&self, name: &str) -> Option<Arc<dyn Loader>> {
        self.loaders
            .read()
            .iter()
            .find(|l| l.name() == name)
            .cloned()
    }

    pub fn is_supported(&self, path: &Path) -> bool {
        self.loader_for_file(path).is_some()
    }

    pub fn loader_for_file(&self, path: &Path) -> Option<Arc<dyn Loader>> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)?;
        self.loaders
            .read()
            .iter()
            .find(|l| l.extensions().contains(&ext.as_str()))
            .cloned()
    }

    /// Resolve the loader for an import request: an explicit, non-empty
    /// loader name wins; otherwise the file extension decides.
    pub fn suitable_loader(&self, path: &Path, loader_name: &str) -> SceneResult<Arc<dyn Loader>> {
        if !loader_name.is_empty() {
            return self
                .loader_by_name(loader_name)
                .ok_or_else(|| SceneError::NoLoader(loader_name.to_string()));
        }
        self.loader_for_file(path)
            .ok_or_else(|| SceneError::NoLoader(path.display().to_string()))
    }
}
