//! JSON-RPC request handlers, split by domain.

mod datasets;
mod jobs;
mod pretrained;
mod status;
mod training;

use crate::server::AppState;
use crate::wrapper::wrap_response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};
use vctrain_core::TrainerError;

// ============================================================================
// JSON-RPC types
// ============================================================================

/// JSON-RPC 2.0 request structure.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 error structure.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message,
                data: None,
            }),
            id,
        }
    }
}

// ============================================================================
// Parameter extraction helpers
// ============================================================================

fn param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a Value> {
    params
        .get(snake)
        .or_else(|| params.get(camel))
        .filter(|v| !v.is_null())
}

/// Extract an optional string parameter, supporting both snake_case and camelCase.
pub(crate) fn get_str_param<'a>(params: &'a Value, snake: &str, camel: &str) -> Option<&'a str> {
    param(params, snake, camel).and_then(|v| v.as_str())
}

/// Extract a required string parameter or return an error.
pub(crate) fn require_str_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> vctrain_core::Result<String> {
    get_str_param(params, snake, camel)
        .map(String::from)
        .ok_or_else(|| TrainerError::InvalidParams {
            message: format!("Missing required parameter: {}", snake),
        })
}

/// Extract an optional bool parameter. `"True"`/`"False"` strings are accepted.
pub(crate) fn get_bool_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> vctrain_core::Result<Option<bool>> {
    match param(params, snake, camel) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
        Some(other) => Err(TrainerError::InvalidParams {
            message: format!("{} must be a boolean, got {}", snake, other),
        }),
    }
}

/// Extract an optional u32 parameter. Numeric strings are accepted; anything
/// negative, fractional or too large is an error rather than a default.
pub(crate) fn get_u32_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> vctrain_core::Result<Option<u32>> {
    let invalid = |v: &Value| TrainerError::InvalidParams {
        message: format!("{} must be a non-negative integer, got {}", snake, v),
    };
    match param(params, snake, camel) {
        None => Ok(None),
        Some(v @ Value::Number(n)) => n
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(v)),
        Some(v @ Value::String(s)) => s.trim().parse::<u32>().map(Some).map_err(|_| invalid(v)),
        Some(v) => Err(invalid(v)),
    }
}

/// Extract a required array of strings.
pub(crate) fn require_str_array_param(
    params: &Value,
    snake: &str,
    camel: &str,
) -> vctrain_core::Result<Vec<String>> {
    let missing = || TrainerError::InvalidParams {
        message: format!("Missing required parameter: {} (array of strings)", snake),
    };
    param(params, snake, camel)
        .and_then(|v| v.as_array())
        .ok_or_else(missing)?
        .iter()
        .map(|v| v.as_str().map(String::from).ok_or_else(missing))
        .collect()
}

// ============================================================================
// Health check & main RPC handler
// ============================================================================

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// Main JSON-RPC handler.
pub async fn handle_rpc(
    State(state): State<Arc<AppState>>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let method = &request.method;
    let params = request.params.unwrap_or(Value::Object(Default::default()));
    let id = request.id.clone();

    debug!("RPC call: {}({:?})", method, params);

    if method == "health_check" {
        return (
            StatusCode::OK,
            Json(JsonRpcResponse::success(id, json!({"status": "ok"}))),
        );
    }

    let result = dispatch_method(&state, method, &params).await;

    match result {
        Ok(value) => {
            let wrapped = wrap_response(method, value);
            (StatusCode::OK, Json(JsonRpcResponse::success(id, wrapped)))
        }
        Err(e) => {
            error!("RPC error for {}: {}", method, e);
            let code = e.to_rpc_error_code();
            (
                StatusCode::OK,
                Json(JsonRpcResponse::error(id, code, e.to_string())),
            )
        }
    }
}

// ============================================================================
// Method dispatch
// ============================================================================

async fn dispatch_method(
    state: &AppState,
    method: &str,
    params: &Value,
) -> vctrain_core::Result<Value> {
    match method {
        // Status & GPU
        "get_status" => status::get_status(state, params).await,
        "get_gpu_info" => status::get_gpu_info(state, params).await,

        // Datasets
        "list_datasets" => datasets::list_datasets(state, params).await,
        "add_dataset_files" => datasets::add_dataset_files(state, params).await,

        // Pretrained weights
        "list_pretrained" => pretrained::list_pretrained(state, params).await,
        "refresh_pretrained" => pretrained::refresh_pretrained(state, params).await,
        "upload_pretrained" => pretrained::upload_pretrained(state, params).await,

        // Projects & pipeline stages
        "list_projects" => training::list_projects(state, params).await,
        "get_project_info" => training::get_project_info(state, params).await,
        "preprocess_dataset" => training::preprocess_dataset(state, params).await,
        "extract_features" => training::extract_features(state, params).await,
        "start_training" => training::start_training(state, params).await,
        "generate_index" => training::generate_index(state, params).await,

        // Jobs
        "list_jobs" => jobs::list_jobs(state, params).await,
        "get_job" => jobs::get_job(state, params).await,
        "cancel_job" => jobs::cancel_job(state, params).await,

        // Unknown method
        _ => {
            warn!("Method not found: {}", method);
            Err(TrainerError::Other(format!("Method not found: {}", method)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
