//! Status & GPU handlers.

use crate::server::AppState;
use serde_json::Value;

pub async fn get_status(state: &AppState, _params: &Value) -> vctrain_core::Result<Value> {
    let response = state.api.get_status()?;
    Ok(serde_json::to_value(response)?)
}

pub async fn get_gpu_info(state: &AppState, _params: &Value) -> vctrain_core::Result<Value> {
    let report = state.api.get_gpu_info().await?;
    Ok(serde_json::to_value(report)?)
}
