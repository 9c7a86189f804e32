//! Job handlers.

use super::require_str_param;
use crate::server::AppState;
use serde_json::{json, Value};

pub async fn list_jobs(state: &AppState, _params: &Value) -> vctrain_core::Result<Value> {
    Ok(serde_json::to_value(state.api.list_jobs())?)
}

pub async fn get_job(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let job_id = require_str_param(params, "job_id", "jobId")?;
    Ok(serde_json::to_value(state.api.get_job(&job_id)?)?)
}

pub async fn cancel_job(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let job_id = require_str_param(params, "job_id", "jobId")?;
    let cancelled = state.api.cancel_job(&job_id)?;
    Ok(json!({ "job_id": job_id, "cancelled": cancelled }))
}
