//! # Playback Entrypoints
//!
//! The simulation playback surface: the shared animation clock and the
//! transfer function. Setters confirm with `true` to the caller and push
//! the new state to every other client as a notification, so concurrent
//! UIs stay in sync without polling.

use cajal_common::AnimationParameters;
use cajal_networking::json_schema::{JsonSchema, JsonType};
use cajal_networking::messages::MessageFactory;
use cajal_networking::{EntrypointError, EntrypointResult, NetworkRequest};
use serde::Deserialize;
use serde_json::{json, Value};

use super::{object_schema, parse_params, Entrypoint, EntrypointContext, EntrypointRegistry};

pub(super) fn register(registry: &mut EntrypointRegistry) {
    registry.register(Box::new(GetAnimationParametersEntrypoint));
    registry.register(Box::new(SetAnimationParametersEntrypoint));
    registry.register(Box::new(GetTransferFunctionEntrypoint));
    registry.register(Box::new(SetTransferFunctionEntrypoint));
}

// ============================================================================
// Animation Parameters
// ============================================================================

fn animation_json(animation: &AnimationParameters) -> Value {
    json!({
        "current": animation.current_frame(),
        "frame_count": animation.frame_count(),
        "dt": animation.dt(),
        "unit": animation.unit(),
    })
}

struct GetAnimationParametersEntrypoint;

impl Entrypoint for GetAnimationParametersEntrypoint {
    fn method(&self) -> &'static str {
        "get-animation-parameters"
    }

    fn description(&self) -> &'static str {
        "Return the playback clock: current frame, frame count, dt and unit"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        Ok(Some(animation_json(&ctx.animation.lock())))
    }
}

#[derive(Deserialize)]
struct SetAnimationParametersParams {
    current: Option<u32>,
    frame_count: Option<u32>,
    dt: Option<f64>,
    unit: Option<String>,
}

struct SetAnimationParametersEntrypoint;

impl Entrypoint for SetAnimationParametersEntrypoint {
    fn method(&self) -> &'static str {
        "set-animation-parameters"
    }

    fn description(&self) -> &'static str {
        "Update the playback clock and notify every other client"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        Some(object_schema(
            &[
                ("current", JsonSchema::typed(JsonType::Integer)),
                ("frame_count", JsonSchema::typed(JsonType::Integer)),
                ("dt", JsonSchema::typed(JsonType::Number)),
                ("unit", JsonSchema::typed(JsonType::String)),
            ],
            &[],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: SetAnimationParametersParams = parse_params(request)?;
        let summary = {
            let mut animation = ctx.animation.lock();
            // frame count first, so the current frame clamps against it
            if let Some(frame_count) = params.frame_count {
                animation.set_frame_count(frame_count);
            }
            if let Some(current) = params.current {
                animation.set_current_frame(current);
            }
            if let Some(dt) = params.dt {
                animation.set_dt(dt);
            }
            if let Some(unit) = params.unit {
                animation.set_unit(unit);
            }
            animation_json(&animation)
        };
        request
            .connection()
            .broadcast_to_others(&MessageFactory::notification(
                "animation-parameters",
                summary,
            ));
        Ok(Some(json!(true)))
    }
}

// ============================================================================
// Transfer Function
// ============================================================================

struct GetTransferFunctionEntrypoint;

impl Entrypoint for GetTransferFunctionEntrypoint {
    fn method(&self) -> &'static str {
        "get-transfer-function"
    }

    fn description(&self) -> &'static str {
        "Return the transfer function mapping simulation values to color"
    }

    fn call(
        &self,
        _request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        serde_json::to_value(&*ctx.scene.transfer_function())
            .map(Some)
            .map_err(|e| EntrypointError::internal(e.to_string()))
    }
}

#[derive(Deserialize)]
struct SetTransferFunctionParams {
    colors: Option<Vec<[f32; 3]>>,
    control_points: Option<Vec<[f64; 2]>>,
    values_range: Option<[f64; 2]>,
}

struct SetTransferFunctionEntrypoint;

impl Entrypoint for SetTransferFunctionEntrypoint {
    fn method(&self) -> &'static str {
        "set-transfer-function"
    }

    fn description(&self) -> &'static str {
        "Update the transfer function and notify every other client"
    }

    fn params_schema(&self) -> Option<JsonSchema> {
        let number_pair = JsonSchema::array_of(JsonSchema::typed(JsonType::Number));
        Some(object_schema(
            &[
                ("colors", JsonSchema::array_of(number_pair.clone())),
                ("control_points", JsonSchema::array_of(number_pair.clone())),
                ("values_range", number_pair),
            ],
            &[],
        ))
    }

    fn call(
        &self,
        request: &NetworkRequest,
        ctx: &EntrypointContext,
    ) -> EntrypointResult<Option<Value>> {
        let params: SetTransferFunctionParams = parse_params(request)?;
        let summary = {
            let mut tf = ctx.scene.transfer_function_mut();
            if let Some(colors) = params.colors {
                tf.set_colors(colors);
            }
            if let Some(control_points) = params.control_points {
                tf.set_control_points(control_points);
            }
            if let Some(values_range) = params.values_range {
                tf.set_values_range(values_range);
            }
            serde_json::to_value(&*tf).map_err(|e| EntrypointError::internal(e.to_string()))?
        };
        request
            .connection()
            .broadcast_to_others(&MessageFactory::notification("transfer-function", summary));
        Ok(Some(json!(true)))
    }
}
