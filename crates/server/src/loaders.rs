//! # Built-in Loaders
//!
//! The one importer the core ships: ASCII XYZ point clouds, one `x y z`
//! triple per line, rendered as spheres. Real mesh/volume/circuit importers
//! live in plugins; this loader exists so a bare server can ingest data and
//! as the reference implementation of the [`Loader`] contract.

use std::path::Path;
use std::sync::Arc;

use cajal_common::geometry::Sphere;
use cajal_common::{
    Blob, Loader, LoaderProgress, Model, ModelDescriptor, Property, PropertyMap, SceneError,
    SceneResult,
};
use glam::Vec3;
use tracing::info;

/// Lines per progress update during parsing.
const PROGRESS_CHUNK: usize = 10_000;

#[derive(Default)]
pub struct XyzLoader;

impl XyzLoader {
    fn parse(
        &self,
        name: &str,
        text: &str,
        progress: &LoaderProgress,
        properties: &PropertyMap,
    ) -> SceneResult<Model> {
        let radius = properties
            .value_or("radius", 1.0)
            .map_err(|e| SceneError::LoadFailed(e.to_string()))?;
        let total = text.lines().count().max(1);

        let mut model = Model::new();
        model.create_material(0, name);
        let mut points = 0u64;
        for (index, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let center = parse_point(line).ok_or_else(|| {
                SceneError::LoadFailed(format!("{name} line {}: expected 'x y z'", index + 1))
            })?;
            model.add_sphere(0, Sphere::new(center, radius as f32));
            points += 1;
            if (index + 1) % PROGRESS_CHUNK == 0 {
                progress.update("loading points", index as f64 / total as f64);
            }
        }
        progress.update("loading points", 1.0);
        info!(name, points, "xyz import parsed");
        Ok(model)
    }
}

fn parse_point(line: &str) -> Option<Vec3> {
    let mut parts = line.split_whitespace();
    let x = parts.next()?.parse().ok()?;
    let y = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    Some(Vec3::new(x, y, z))
}

impl Loader for XyzLoader {
    fn name(&self) -> &str {
        "xyz"
    }

    fn extensions(&self) -> &[&str] {
        &["xyz"]
    }

    fn default_properties(&self) -> PropertyMap {
        let mut map = PropertyMap::new();
        let radius = Property::new("radius", 1.0)
            .with_label("Point radius")
            .with_description("Radius of the sphere drawn for each point")
            .with_limits(0.0001, 1000.0);
        let _ = map.add(radius);
        map
    }

    fn import_from_file(
        &self,
        path: &Path,
        progress: &LoaderProgress,
        properties: &PropertyMap,
    ) -> SceneResult<ModelDescriptor> {
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("points")
            .to_string();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SceneError::LoadFailed(format!("{}: {e}", path.display())))?;
        let model = self.parse(&name, &text, progress, properties)?;

        let mut descriptor = ModelDescriptor::new(model, name);
        descriptor.path = path.display().to_string();
        descriptor.loader_name = self.name().to_string();
        descriptor.loader_properties = properties.clone();
        Ok(descriptor)
    }

    fn import_from_blob(
        &self,
        blob: Blob,
        progress: &LoaderProgress,
        properties: &PropertyMap,
    ) -> SceneResult<ModelDescriptor> {
        if !self.extensions().contains(&blob.kind.to_lowercase().as_str()) {
            return Err(SceneError::LoadFailed(format!(
                "xyz loader cannot read '{}' data",
                blob.kind
            )));
        }
        let text = String::from_utf8(blob.data)
            .map_err(|_| SceneError::LoadFailed(format!("{}: not valid UTF-8", blob.name)))?;
        let model = self.parse(&blob.name, &text, progress, properties)?;

        let mut descriptor = ModelDescriptor::new(model, blob.name);
        descriptor.loader_name = self.name().to_string();
        descriptor.loader_properties = properties.clone();
        Ok(descriptor)
    }
}

/// Register every built-in loader on `registry`.
pub fn register_builtin(registry: &cajal_common::LoaderRegistry) {
    registry.register(Arc::new(XyzLoader));
}

#[cfg(test)]
mod tests {
    use super::*;
    use cajal_common::PropertyValue;
    use std::io::Write;

    fn blob(text: &str) -> Blob {
        Blob {
            kind: "xyz".to_string(),
            name: "somata".to_string(),
            data: text.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_blob_import_builds_one_sphere_per_point() {
        let loader = XyzLoader;
        let mut properties = loader.default_properties();
        properties
            .update("radius", &PropertyValue::Double(0.5))
            .unwrap();

        let text = "0 0 0\n1 2 3\n# a comment\n\n4 5 6\n";
        let descriptor = loader
            .import_from_blob(blob(text), &LoaderProgress::silent(), &properties)
            .unwrap();

        let model = descriptor.model();
        let geometries = model.geometries();
        let spheres = &geometries.spheres[&0];
        assert_eq!(spheres.len(), 3);
        assert_eq!(spheres[1].center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(spheres[2].radius, 0.5);
        assert_eq!(descriptor.name, "somata");
        assert_eq!(descriptor.loader_name, "xyz");
    }

    #[test]
    fn test_bad_line_reports_its_number() {
        let loader = XyzLoader;
        let err = loader
            .import_from_blob(
                blob("0 0 0\n1 x 3\n"),
                &LoaderProgress::silent(),
                &loader.default_properties(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }

    #[test]
    fn test_unknown_blob_kind_is_rejected() {
        let loader = XyzLoader;
        let mut data = blob("0 0 0");
        data.kind = "obj".to_string();
        assert!(loader
            .import_from_blob(data, &LoaderProgress::silent(), &loader.default_properties())
            .is_err());
    }

    #[test]
    fn test_file_import_fills_descriptor_fields() {
        let mut file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();
        writeln!(file, "1 1 1\n2 2 2").unwrap();

        let loader = XyzLoader;
        let descriptor = loader
            .import_from_file(
                file.path(),
                &LoaderProgress::silent(),
                &loader.default_properties(),
            )
            .unwrap();

        assert_eq!(descriptor.path, file.path().display().to_string());
        assert_eq!(descriptor.loader_name, "xyz");
        assert!(!descriptor.model().empty());
    }

    #[test]
    fn test_progress_finishes_at_one() {
        let fractions = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = fractions.clone();
        let progress = LoaderProgress::new(Arc::new(move |_msg, f| sink.lock().push(f)));

        let loader = XyzLoader;
        loader
            .import_from_blob(blob("0 0 0\n"), &progress, &loader.default_properties())
            .unwrap();

        let fractions = fractions.lock();
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }
}
