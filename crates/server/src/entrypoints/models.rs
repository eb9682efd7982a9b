//! # Model Entrypoints
//!
//! Importing, tuning and removing models, plus the chunked binary upload
//! path. `add-model` imports from a path the server can reach;
//! `request-model-upload` registers a [`PendingUpload`] instead and the
//! reply waits until enough binary frames arrived to run the blob import.

use std::path::PathBuf;
use std::sync::Arc;

use cajal_common::{Blob, LoaderProgress, SceneError, Transformation};
use cajal_networking::json_schema::{JsonSchema, JsonType};
use cajal_networking::property_json;
use cajal_networking::{ConnectionHandle, EntrypointError, EntrypointResult, NetworkRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::scene::model_summary;
use super::{object_schema, parse_params, Entrypoint, EntrypointContext, EntrypointRegistry};

pub(super) fn register(registry: &mut EntrypointRegistry) {
    registry.register(Box::new(AddModelEntrypoint));
    registry.register(Box::new(RemoveModelEntrypoint));
    registry.register(Box::new(UpdateModelEntrypoint));
    registry.register(Box::new(GetInstancesEntrypoint));
    registry.register(Box::new(UpdateInstanceEntrypoint));
    registry.register(Box::new(GetModelPropertiesEntrypoint));
    registry.register(Box::new(SetModelPropertiesEntrypoint));
    registry.register(Box::new(RequestModelUploadEntrypoint));
}

/// Forward import progress of `request` as progress notifications.
fn progress_for(request: &NetworkRequest) -> LoaderProgress {
    let request = request.clone();
    LoaderProgress::new(Arc::new(move |message: &str, amount: f64| {
        request.progress(message, amount);
    }))
}

fn unknown_model(id: u64) -> EntrypointError {
    SceneError::ModelNotFound(id).into()
}

// ============================================================================
// add-model
// ============================================================================

#[derive(Deserialize)]
struct AddModelParams {
    path: PathBuf,
    name: Option<String>,
    #[serde(default)]
    loader_name: String,
    loader_properties: Option<Value>,
    visible: Option<bool>,
    bounding_box: Option<bool>,
    transformation: Option<Transformation>,
}

struct AddModelEntrypoint;

impl Entrypoint for AddModelEntrypoint {
    fn method(&self) -> &'static str {
        "add-model"
    }

    fn description(&self) -> &'static str {
        "Import a file into the scene and return the new model"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[
                ("path", JsonSchema::typed(JsonType::String)),
                ("name", JsonSchema::typed(JsonType::String)),
                ("loader_name", JsonSchema::typed(JsonType::String)),
                ("loader_properties", JsonSchema::typed(JsonType::Object)),
                ("visible", JsonSchema::typed(JsonType::Boolean)),
                ("bounding_box", JsonSchema::typed(JsonType::Boolean)),
                ("transformation", JsonSchema::typed(JsonType::Object)),
            ],
            &["path"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: AddModelParams = parse_params(request)?;
        let loader = ctx
            .scene
            .loaders()
            .suitable_loader(&params.path, &params.loader_name)?;

        let mut properties = loader.default_properties();
        if let Some(supplied) = &params.loader_properties {
            property_json::update_from_json(&mut properties, supplied)?;
        }

        let progress = progress_for(request);
        let mut descriptor = loader.import_from_file(&params.path, &progress, &properties)?;
        if let Some(name) = params.name {
            descriptor.name = name;
        }
        if let Some(visible) = params.visible {
            descriptor.visible = visible;
        }
        if let Some(bounding_box) = params.bounding_box {
            descriptor.bounding_box = bounding_box;
        }
        if let Some(transformation) = params.transformation {
            descriptor.transformation = transformation;
        }

        let id = ctx.scene.add_model(descriptor)?;
        ctx.scene.compute_bounds();
        Ok(Some(
            ctx.scene.with_model(id, model_summary).unwrap_or(Value::Null),
        ))
    }
}

// ============================================================================
// remove-model
// ============================================================================

#[derive(Deserialize)]
struct ModelIdParams {
    id: u64,
}

fn model_id_schema() -> JsonSchema {
    object_schema(&[("id", JsonSchema::typed(JsonType::Integer))], &["id"])
}

struct RemoveModelEntrypoint;

impl Entrypoint for RemoveModelEntrypoint {
    fn method(&self) -> &'static str {
        "remove-model"
    }

    fn description(&self) -> &'static str {
        "Remove a model by id"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(model_id_schema())
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: ModelIdParams = parse_params(request)?;
        let removed = ctx.scene.remove_model(params.id);
        if removed {
            ctx.scene.compute_bounds();
        }
        Ok(Some(json!({"removed": removed})))
    }
}

// ============================================================================
// update-model
// ============================================================================

#[derive(Deserialize)]
struct UpdateModelParams {
    id: u64,
    name: Option<String>,
    visible: Option<bool>,
    bounding_box: Option<bool>,
    transformation: Option<Transformation>,
}

struct UpdateModelEntrypoint;

impl Entrypoint for UpdateModelEntrypoint {
    fn method(&self) -> &'static str {
        "update-model"
    }

    fn description(&self) -> &'static str {
        "Change a model's name, visibility, bounding box or transform"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[
                ("id", JsonSchema::typed(JsonType::Integer)),
                ("name", JsonSchema::typed(JsonType::String)),
                ("visible", JsonSchema::typed(JsonType::Boolean)),
                ("bounding_box", JsonSchema::typed(JsonType::Boolean)),
                ("transformation", JsonSchema::typed(JsonType::Object)),
            ],
            &["id"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: UpdateModelParams = parse_params(request)?;
        let id = params.id;
        let applied = ctx.scene.with_model_mut(id, |descriptor| {
            if let Some(name) = params.name {
                descriptor.name = name;
            }
            if let Some(visible) = params.visible {
                descriptor.visible = visible;
            }
            if let Some(bounding_box) = params.bounding_box {
                descriptor.bounding_box = bounding_box;
            }
            if let Some(transformation) = params.transformation {
                descriptor.transformation = transformation;
            }
            descriptor.compute_bounds();
        });
        if applied.is_none() {
            return Err(unknown_model(id));
        }
        ctx.scene.compute_bounds();
        ctx.scene.mark_modified();
        Ok(Some(json!(true)))
    }
}

// ============================================================================
// Instances
// ============================================================================

struct GetInstancesEntrypoint;

impl Entrypoint for GetInstancesEntrypoint {
    fn method(&self) -> &'static str {
        "get-instances"
    }

    fn description(&self) -> &'static str {
        "List every placement of a model"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(model_id_schema())
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: ModelIdParams = parse_params(request)?;
        ctx.scene
            .with_model(params.id, |descriptor| json!(descriptor.instances()))
            .map(Some)
            .ok_or_else(|| unknown_model(params.id))
    }
}

#[derive(Deserialize)]
struct UpdateInstanceParams {
    model_id: u64,
    instance_id: u64,
    visible: Option<bool>,
    bounding_box: Option<bool>,
    transformation: Option<Transformation>,
}

struct UpdateInstanceEntrypoint;

impl Entrypoint for UpdateInstanceEntrypoint {
    fn method(&self) -> &'static str {
        "update-instance"
    }

    fn description(&self) -> &'static str {
        "Change one placement of a model"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[
                ("model_id", JsonSchema::typed(JsonType::Integer)),
                ("instance_id", JsonSchema::typed(JsonType::Integer)),
                ("visible", JsonSchema::typed(JsonType::Boolean)),
                ("bounding_box", JsonSchema::typed(JsonType::Boolean)),
                ("transformation", JsonSchema::typed(JsonType::Object)),
            ],
            &["model_id", "instance_id"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: UpdateInstanceParams = parse_params(request)?;
        let found = ctx.scene.with_model_mut(params.model_id, |descriptor| {
            let Some(instance) = descriptor.instance_mut(params.instance_id) else {
                return false;
            };
            if let Some(visible) = params.visible {
                instance.visible = visible;
            }
            if let Some(bounding_box) = params.bounding_box {
                instance.bounding_box = bounding_box;
            }
            if let Some(transformation) = params.transformation {
                instance.transformation = transformation;
            }
            descriptor.compute_bounds();
            true
        });
        match found {
            Some(true) => {
                ctx.scene.compute_bounds();
                ctx.scene.mark_modified();
                Ok(Some(json!(true)))
            }
            Some(false) => Err(SceneError::InstanceNotFound {
                model_id: params.model_id,
                instance_id: params.instance_id,
            }
            .into()),
            None => Err(unknown_model(params.model_id)),
        }
    }
}

// ============================================================================
// Model Properties
// ============================================================================

struct GetModelPropertiesEntrypoint;

impl Entrypoint for GetModelPropertiesEntrypoint {
    fn method(&self) -> &'static str {
        "get-model-properties"
    }

    fn description(&self) -> &'static str {
        "Return a model's runtime properties as a JSON object"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(model_id_schema())
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: ModelIdParams = parse_params(request)?;
        ctx.scene
            .with_model(params.id, |descriptor| {
                property_json::to_json(&descriptor.properties)
            })
            .map(Some)
            .ok_or_else(|| unknown_model(params.id))
    }
}

#[derive(Deserialize)]
struct SetModelPropertiesParams {
    id: u64,
    properties: Value,
}

struct SetModelPropertiesEntrypoint;

impl Entrypoint for SetModelPropertiesEntrypoint {
    fn method(&self) -> &'static str {
        "set-model-properties"
    }

    fn description(&self) -> &'static str {
        "Update a model's runtime properties; a bad value leaves them untouched"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[
                ("id", JsonSchema::typed(JsonType::Integer)),
                ("properties", JsonSchema::typed(JsonType::Object)),
            ],
            &["id", "properties"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: SetModelPropertiesParams = parse_params(request)?;
        let outcome = ctx.scene.with_model_mut(params.id, |descriptor| {
            property_json::update_from_json(&mut descriptor.properties, &params.properties)
        });
        match outcome {
            Some(Ok(())) => {
                ctx.scene.mark_modified();
                Ok(Some(json!(true)))
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(unknown_model(params.id)),
        }
    }
}

// ============================================================================
// Binary Upload
// ============================================================================

/// Uploads announcing more than this are refused outright.
const MAX_UPLOAD_BYTES: u64 = 1 << 30;

/// A `request-model-upload` waiting for its binary frames. The original
/// request is kept alive so the reply lands on the right id once the last
/// chunk arrived, however many ticks later.
pub struct PendingUpload {
    request: NetworkRequest,
    name: String,
    kind: String,
    loader_name: String,
    loader_properties: Option<Value>,
    size: u64,
    received: Vec<u8>,
}

#[derive(Deserialize)]
struct RequestModelUploadParams {
    name: String,
    /// Format hint, usually a file extension.
    #[serde(rename = "type")]
    kind: String,
    size: u64,
    #[serde(default)]
    loader_name: String,
    loader_properties: Option<Value>,
}

struct RequestModelUploadEntrypoint;

impl Entrypoint for RequestModelUploadEntrypoint {
    fn method(&self) -> &'static str {
        "request-model-upload"
    }

    fn description(&self) -> &'static str {
        "Announce a binary model upload; the reply follows the last chunk"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[
                ("name", JsonSchema::typed(JsonType::String)),
                ("type", JsonSchema::typed(JsonType::String)),
                ("size", JsonSchema::typed(JsonType::Integer)),
                ("loader_name", JsonSchema::typed(JsonType::String)),
                ("loader_properties", JsonSchema::typed(JsonType::Object)),
            ],
            &["name", "type", "size"],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: RequestModelUploadParams = parse_params(request)?;
        if !request.should_be_replied() {
            return Err(EntrypointError::invalid_params(
                "model uploads need a request id to reply to",
            ));
        }
        if params.size == 0 {
            return Err(EntrypointError::invalid_params("size must not be zero"));
        }
        if params.size > MAX_UPLOAD_BYTES {
            return Err(EntrypointError::invalid_params(format!(
                "upload size {} exceeds the {} byte limit",
                params.size, MAX_UPLOAD_BYTES
            )));
        }

        let handle = request.connection().handle().clone();
        let mut uploads = ctx.uploads.lock();
        if uploads.contains_key(&handle) {
            return Err(EntrypointError::invalid_params(
                "an upload is already in flight on this connection",
            ));
        }
        debug!(name = %params.name, kind = %params.kind, size = params.size, "upload registered");
        uploads.insert(
            handle,
            PendingUpload {
                request: request.clone(),
                name: params.name,
                kind: params.kind,
                loader_name: params.loader_name,
                loader_properties: params.loader_properties,
                size: params.size,
                received: Vec::new(),
            },
        );
        Ok(None)
    }
}

/// Route one binary frame into the connection's pending upload. Frames
/// without a pending upload are logged and dropped.
pub(super) fn feed_upload_chunk(ctx: &EntrypointContext, handle: &ConnectionHandle, data: &[u8]) {
    let finished = {
        let mut uploads = ctx.uploads.lock();
        let Some(upload) = uploads.get_mut(handle) else {
            warn!(
                ?handle,
                bytes = data.len(),
                "binary frame without a pending upload, ignoring"
            );
            return;
        };
        upload.received.extend_from_slice(data);
        let received = upload.received.len() as u64;
        if received < upload.size {
            upload
                .request
                .progress("uploading model", received as f64 / upload.size as f64);
            return;
        }
        uploads.remove(handle)
    };
    let Some(upload) = finished else { return };

    if upload.received.len() as u64 > upload.size {
        upload.request.error(&EntrypointError::invalid_params(format!(
            "upload exceeded the announced size of {} bytes",
            upload.size
        )));
        return;
    }
    let request = upload.request.clone();
    match import_blob(ctx, upload) {
        Ok(summary) => request.reply(summary),
        Err(e) => {
            warn!(code = e.code, error = %e.message, "model upload failed");
            request.error(&e);
        }
    }
}

fn import_blob(ctx: &EntrypointContext, upload: PendingUpload) -> EntrypointResult<Value> {
    let file_hint = PathBuf::from(format!("{}.{}", upload.name, upload.kind));
    let loader = ctx
        .scene
        .loaders()
        .suitable_loader(&file_hint, &upload.loader_name)?;

    let mut properties = loader.default_properties();
    if let Some(supplied) = &upload.loader_properties {
        property_json::update_from_json(&mut properties, supplied)?;
    }

    let progress = progress_for(&upload.request);
    let blob = Blob {
        kind: upload.kind,
        name: upload.name,
        data: upload.received,
    };
    let descriptor = loader.import_from_blob(blob, &progress, &properties)?;
    let id = ctx.scene.add_model(descriptor)?;
    ctx.scene.compute_bounds();
    Ok(ctx.scene.with_model(id, model_summary).unwrap_or(Value::Null))
}
