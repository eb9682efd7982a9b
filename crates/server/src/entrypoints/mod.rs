//! # Entrypoints
//!
//! The JSON-RPC surface of the server. Every method a client can call is an
//! [`Entrypoint`]: a named handler with a human-readable description, an
//! optional params schema checked before dispatch, and the handler body.
//!
//! ## Dispatch
//!
//! [`Dispatcher`] is the [`ConnectionListener`] the main loop drives. Text
//! frames are parsed, validated and routed here; the outcome funnels into
//! exactly one of reply, error reply, or (for malformed frames without an
//! id) a logged invalid-request message. Binary frames feed the requesting
//! connection's pending model upload. Nothing a single client sends can
//! take the process down: every failure path ends in an error reply or a
//! log line.

mod core;
mod models;
mod params;
mod scene;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use cajal_common::{AnimationParametersRef, Scene};
use cajal_networking::json_schema::{self, JsonSchema, JsonType};
use cajal_networking::messages::MessageFactory;
use cajal_networking::{
    ConnectionHandle, ConnectionListener, ConnectionManager, ConnectionRef, EntrypointError,
    EntrypointResult, NetworkRequest, Packet, RequestMessage,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::engine::HeadlessBackend;
pub use models::PendingUpload;
pub use scene::scene_summary;

// ============================================================================
// Entrypoint Contract
// ============================================================================

/// One method of the JSON-RPC surface.
pub trait Entrypoint: Send + Sync {
    /// Wire method name, e.g. `"add-model"`.
    fn method(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Schema validated against `params` before [`Entrypoint::call`] runs.
    /// `None` accepts any params.
    fn params_schema(&self) -> Option<JsonSchema> {
        None
    }

    /// Handle one request. `Ok(Some(result))` replies immediately;
    /// `Ok(None)` means the handler replies later on its own (a model
    /// upload replies only once the final binary chunk arrived).
    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>>;
}

/// Everything a handler may touch.
pub struct EntrypointContext {
    pub scene: Arc<Scene>,
    pub animation: AnimationParametersRef,
    pub manager: Arc<ConnectionManager>,
    pub backend: Arc<HeadlessBackend>,
    /// Cleared by the `quit` entrypoint and by ctrl-c; the main loop exits
    /// once it observes `false`.
    pub running: Arc<AtomicBool>,
    pub started: Instant,
    /// At most one pending binary model upload per connection.
    pub uploads: Mutex<HashMap<ConnectionHandle, PendingUpload>>,
}

impl EntrypointContext {
    pub fn new(
        scene: Arc<Scene>,
        animation: AnimationParametersRef,
        manager: Arc<ConnectionManager>,
        backend: Arc<HeadlessBackend>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            scene,
            animation,
            manager,
            backend,
            running,
            started: Instant::now(),
            uploads: Mutex::new(HashMap::new()),
        }
    }
}

// ============================================================================
// Registry
// ============================================================================

/// All registered entrypoints, ordered by method name.
#[derive(Default)]
pub struct EntrypointRegistry {
    entrypoints: BTreeMap<&'static str, Box<dyn Entrypoint>>,
}

impl EntrypointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full surface this binary serves.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        core::register(&mut registry);
        scene::register(&mut registry);
        models::register(&mut registry);
        params::register(&mut registry);
        // last, so the directory snapshot sees the whole surface
        core::register_introspection(&mut registry);
        registry
    }

    pub fn register(&mut self, entrypoint: Box<dyn Entrypoint>) {
        let method = entrypoint.method();
        if self.entrypoints.insert(method, entrypoint).is_some() {
            warn!(method, "entrypoint registered twice, keeping the last");
        }
    }

    pub fn get(&self, method: &str) -> Option<&dyn Entrypoint> {
        self.entrypoints.get(method).map(|e| e.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Entrypoint> {
        self.entrypoints.values().map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.entrypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entrypoints.is_empty()
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes drained packets into entrypoints. Driven once per tick by
/// `ConnectionManager::update` on the main thread.
pub struct Dispatcher {
    registry: EntrypointRegistry,
    context: EntrypointContext,
}

impl Dispatcher {
    pub fn new(registry: EntrypointRegistry, context: EntrypointContext) -> Self {
        Self { registry, context }
    }

    pub fn context(&self) -> &EntrypointContext {
        &self.context
    }

    fn dispatch(&self, handle: &ConnectionHandle, text: &str) {
        let connection = ConnectionRef::new(self.context.manager.clone(), handle.clone());
        let message = match RequestMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "rejecting malformed request");
                connection.send(&MessageFactory::invalid_request(&e));
                return;
            }
        };

        let request = NetworkRequest::new(connection, message);
        debug!(method = request.method(), "dispatching request");

        let Some(entrypoint) = self.registry.get(request.method()) else {
            request.error(&EntrypointError::method_not_found(request.method()));
            return;
        };
        if let Some(schema) = entrypoint.params_schema() {
            let violations = json_schema::validate(request.params(), &schema);
            if !violations.is_empty() {
                request.error(&EntrypointError::invalid_params(violations.join("; ")));
                return;
            }
        }
        match entrypoint.call(&request, &self.context) {
            Ok(Some(result)) => request.reply(result),
            Ok(None) => {}
            Err(e) => {
                warn!(
                    method = request.method(),
                    code = e.code,
                    error = %e.message,
                    "request failed"
                );
                request.error(&e);
            }
        }
    }
}

impl ConnectionListener for Dispatcher {
    fn on_connect(&mut self, handle: &ConnectionHandle) {
        info!(?handle, "client connected");
    }

    fn on_disconnect(&mut self, handle: &ConnectionHandle) {
        if self.context.uploads.lock().remove(handle).is_some() {
            debug!(?handle, "dropping unfinished model upload");
        }
        info!(?handle, "client disconnected");
    }

    fn on_request(&mut self, handle: &ConnectionHandle, packet: Packet) {
        match packet {
            Packet::Text(text) => self.dispatch(handle, &text),
            Packet::Binary(data) => models::feed_upload_chunk(&self.context, handle, &data),
        }
    }
}

// ============================================================================
// Handler Helpers
// ============================================================================

/// Deserialize request params into a typed struct.
pub fn parse_params<T: DeserializeOwned>(request: &NetworkRequest) -> EntrypointResult<T> {
    serde_json::from_value(request.params().clone())
        .map_err(|e| EntrypointError::invalid_params(e.to_string()))
}

/// Shorthand for the flat object schemas most entrypoints declare.
pub(crate) fn object_schema(fields: &[(&str, JsonSchema)], required: &[&str]) -> JsonSchema {
    JsonSchema {
        kind: Some(JsonType::Object),
        properties: fields
            .iter()
            .map(|(name, schema)| (name.to_string(), schema.clone()))
            .collect(),
        required: required.iter().map(|r| r.to_string()).collect(),
        ..JsonSchema::default()
    }
}

// ============================================================================
// Tests
// ============================================================================
