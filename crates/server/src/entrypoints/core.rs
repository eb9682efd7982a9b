//! # Core Entrypoints
//!
//! Introspection and lifecycle: version, the method directory, per-method
//! schemas, runtime statistics and remote shutdown.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use cajal_networking::json_schema::{JsonSchema, JsonType};
use cajal_networking::{EntrypointError, EntrypointResult, NetworkRequest};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::{object_schema, parse_params, Entrypoint, EntrypointContext, EntrypointRegistry};

pub(super) fn register(registry: &mut EntrypointRegistry) {
    registry.register(Box::new(GetVersionEntrypoint));
    registry.register(Box::new(GetStatisticsEntrypoint));
    registry.register(Box::new(QuitEntrypoint));
}

/// Snapshot the directory and expose it through `registry` and `schema`.
/// Must run after every other entrypoint is registered.
pub(super) fn register_introspection(registry: &mut EntrypointRegistry) {
    let mut directory: Vec<EntrypointInfo> = registry
        .iter()
        .map(|e| EntrypointInfo {
            method: e.method(),
            description: e.description(),
            params: e.params_schema(),
        })
        .collect();
    directory.push(EntrypointInfo {
        method: REGISTRY_METHOD,
        description: REGISTRY_DESCRIPTION,
        params: None,
    });
    directory.push(EntrypointInfo {
        method: SCHEMA_METHOD,
        description: SCHEMA_DESCRIPTION,
        params: Some(schema_params()),
    });
    directory.sort_by_key(|info| info.method);

    let directory = Arc::new(directory);
    registry.register(Box::new(RegistryEntrypoint {
        directory: directory.clone(),
    }));
    registry.register(Box::new(SchemaEntrypoint { directory }));
}

/// What the introspection entrypoints report about one method.
struct EntrypointInfo {
    method: &'static str,
    description: &'static str,
    params: Option<JsonSchema>,
}

// ============================================================================
// get-version
// ============================================================================

struct GetVersionEntrypoint;

impl Entrypoint for GetVersionEntrypoint {
    fn method(&self) -> &'static str {
        "get-version"
    }

    fn description(&self) -> &'static str {
        "Report the server version"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        _ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        Ok(Some(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "major": component(env!("CARGO_PKG_VERSION_MAJOR")),
            "minor": component(env!("CARGO_PKG_VERSION_MINOR")),
            "patch": component(env!("CARGO_PKG_VERSION_PATCH")),
        })))
    }
}

fn component(raw: &str) -> u64 {
    raw.parse().unwrap_or(0)
}

// ============================================================================
// get-statistics
// ============================================================================

struct GetStatisticsEntrypoint;

impl Entrypoint for GetStatisticsEntrypoint {
    fn method(&self) -> &'static str {
        "get-statistics"
    }

    fn description(&self) -> &'static str {
        "Report model count, scene footprint and render throughput"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        Ok(Some(json!({
            "models": ctx.scene.model_count(),
            "scene_size_in_bytes": ctx.scene.size_in_bytes(),
            "frames_rendered": ctx.backend.frames_rendered(),
            "uptime_seconds": ctx.started.elapsed().as_secs_f64(),
        })))
    }
}

// ============================================================================
// quit
// ============================================================================

struct QuitEntrypoint;

impl Entrypoint for QuitEntrypoint {
    fn method(&self) -> &'static str {
        "quit"
    }

    fn description(&self) -> &'static str {
        "Shut the server down after the current tick"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        info!("quit requested over the wire");
        ctx.running.store(false, Ordering::SeqCst);
        Ok(Some(Value::Null))
    }
}

// ============================================================================
// registry
// ============================================================================

const REGISTRY_METHOD: &str = "registry";
const REGISTRY_DESCRIPTION: &str = "List every method this server exposes";

struct RegistryEntrypoint {
    directory: Arc<Vec<EntrypointInfo>>,
}

impl Entrypoint for RegistryEntrypoint {
    fn method(&self) -> &'static str {
        REGISTRY_METHOD
    }

    fn description(&self) -> &'static str {
        REGISTRY_DESCRIPTION
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        _ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let methods: Vec<Value> = self
            .directory
            .iter()
            .map(|info| json!({"method": info.method, "description": info.description}))
            .collect();
        Ok(Some(Value::from(methods)))
    }
}

// ============================================================================
// schema
// ============================================================================

const SCHEMA_METHOD: &str = "schema";
const SCHEMA_DESCRIPTION: &str = "Describe one method and the params it expects";

fn schema_params() -> JsonSchema {
    object_schema(
        &[("method", JsonSchema::typed(JsonType::String))],
        &["method"],
    )
}

#[derive(Deserialize)]
struct SchemaParams {
    method: String,
}

struct SchemaEntrypoint {
    directory: Arc<Vec<EntrypointInfo>>,
}

impl Entrypoint for SchemaEntrypoint {
    fn method(&self) -> &'static str {
        SCHEMA_METHOD
    }

    fn description(&self) -> &'static str {
        SCHEMA_DESCRIPTION
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(schema_params())
    }

    fn call(
        &self,
        request: &NetworkRequest,
        _ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: SchemaParams = parse_params(request)?;
        let Some(info) = self.directory.iter().find(|i| i.method == params.method) else {
            return Err(EntrypointError::method_not_found(&params.method));
        };
        let schema = match &info.params {
            Some(schema) => serde_json::to_value(schema)
                .map_err(|e| EntrypointError::internal(e.to_string()))?,
            None => Value::Null,
        };
        Ok(Some(json!({
            "method": info.method,
            "description": info.description,
            "params": schema,
        })))
    }
}
