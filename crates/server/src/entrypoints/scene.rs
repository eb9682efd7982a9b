//! # Scene Entrypoints
//!
//! Scene-wide state: the model directory with world bounds, clip planes and
//! the binary scene cache. [`scene_summary`] is shared with the main loop,
//! which broadcasts it as the `scene` notification whenever a tick commits
//! observable changes.

use std::path::PathBuf;

use cajal_common::{ModelDescriptor, Scene};
use cajal_networking::json_schema::{JsonSchema, JsonType};
use cajal_networking::{EntrypointResult, NetworkRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{object_schema, parse_params, Entrypoint, EntrypointContext, EntrypointRegistry};

pub(super) fn register(registry: &mut EntrypointRegistry) {
    registry.register(Box::new(GetSceneEntrypoint));
    registry.register(Box::new(AddClipPlaneEntrypoint));
    registry.register(Box::new(GetClipPlanesEntrypoint));
    registry.register(Box::new(RemoveClipPlanesEntrypoint));
    registry.register(Box::new(SaveToCacheEntrypoint));
    registry.register(Box::new(LoadFromCacheEntrypoint));
}

// ============================================================================
// Summaries
// ============================================================================

/// The scene as clients see it: world bounds plus one entry per model.
pub fn scene_summary(scene: &Scene) -> Value {
    let models: Vec<Value> = scene
        .model_ids()
        .into_iter()
        .filter_map(|id| scene.with_model(id, model_summary))
        .collect();
    json!({
        "bounds": scene.bounds(),
        "models": models,
    })
}

/// One model entry of [`scene_summary`], also the `add-model` reply.
pub fn model_summary(descriptor: &ModelDescriptor) -> Value {
    json!({
        "id": descriptor.model_id(),
        "name": descriptor.name,
        "path": descriptor.path,
        "loader_name": descriptor.loader_name,
        "visible": descriptor.visible,
        "bounding_box": descriptor.bounding_box,
        "transformation": descriptor.transformation,
        "bounds": descriptor.bounds(),
        "metadata": descriptor.metadata,
    })
}

// ============================================================================
// get-scene
// ============================================================================

struct GetSceneEntrypoint;

impl Entrypoint for GetSceneEntrypoint {
    fn method(&self) -> &'static str {
        "get-scene"
    }

    fn description(&self) -> &'static str {
        "Return the world bounds and every model in the scene"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        Ok(Some(scene_summary(&ctx.scene)))
    }
}

// ============================================================================
// Clip Planes
// ============================================================================

#[derive(Deserialize)]
struct AddClipPlaneParams {
    plane: [f64; 4],
}

struct AddClipPlaneEntrypoint;

impl Entrypoint for AddClipPlaneEntrypoint {
    fn method(&self) -> &'static str {
        "add-clip-plane"
    }

    fn description(&self) -> &'static str {
        "Add a clipping plane in Hessian normal form and return it with its id"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[(
                "plane",
                JsonSchema::array_of(JsonSchema::typed(JsonType::Number)),
            )],
            &["plane"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: AddClipPlaneParams = parse_params(request)?;
        let id = ctx.scene.add_clip_plane(params.plane);
        Ok(Some(json!({"id": id, "plane": params.plane})))
    }
}

struct GetClipPlanesEntrypoint;

impl Entrypoint for GetClipPlanesEntrypoint {
    fn method(&self) -> &'static str {
        "get-clip-planes"
    }

    fn description(&self) -> &'static str {
        "List all clipping planes"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        Ok(Some(json!(ctx.scene.clip_planes())))
    }
}

#[derive(Deserialize)]
struct RemoveClipPlanesParams {
    ids: Vec<u64>,
}

struct RemoveClipPlanesEntrypoint;

impl Entrypoint for RemoveClipPlanesEntrypoint {
    fn method(&self) -> &'static str {
        "remove-clip-planes"
    }

    fn description(&self) -> &'static str {
        "Remove clipping planes by id; unknown ids are ignored"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[(
                "ids",
                JsonSchema::array_of(JsonSchema::typed(JsonType::Integer)),
            )],
            &["ids"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: RemoveClipPlanesParams = parse_params(request)?;
        for id in params.ids {
            ctx.scene.remove_clip_plane(id);
        }
        Ok(Some(json!(true)))
    }
}

// ============================================================================
// Scene Cache
// ============================================================================

#[derive(Deserialize)]
struct CacheParams {
    path: PathBuf,
}

fn cache_params_schema() -> JsonSchema {
    object_schema(
        &[("path", JsonSchema::typed(JsonType::String))],
        &["path"],
    )
}

struct SaveToCacheEntrypoint;

impl Entrypoint for SaveToCacheEntrypoint {
    fn method(&self) -> &'static str {
        "save-to-cache"
    }

    fn description(&self) -> &'static str {
        "Write the scene geometry to a binary cache file"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(cache_params_schema())
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: CacheParams = parse_params(request)?;
        ctx.scene.save_to_cache_file(&params.path)?;
        Ok(Some(json!(true)))
    }
}

struct LoadFromCacheEntrypoint;

impl Entrypoint for LoadFromCacheEntrypoint {
    fn method(&self) -> &'static str {
        "load-from-cache"
    }

    fn description(&self) -> &'static str {
        "Load models from a binary cache file and return their ids"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(cache_params_schema())
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: CacheParams = parse_params(request)?;
        let ids = ctx.scene.load_from_cache_file(&params.path)?;
        Ok(Some(json!({"ids": ids})))
    }
}
