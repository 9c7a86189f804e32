//! Pretrained weight handlers.

use super::{get_str_param, require_str_param};
use crate::server::AppState;
use serde_json::Value;
use std::path::PathBuf;
use vctrain_core::{PretrainedRole, TrainerError};

fn role_param(params: &Value) -> vctrain_core::Result<PretrainedRole> {
    let role = get_str_param(params, "role", "role").ok_or_else(|| TrainerError::InvalidParams {
        message: "Missing required parameter: role (G or D)".into(),
    })?;
    PretrainedRole::from_marker(role.trim()).ok_or_else(|| TrainerError::InvalidParams {
        message: format!("role must be G or D, got {role:?}"),
    })
}

pub async fn list_pretrained(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let role = role_param(params)?;
    Ok(serde_json::to_value(state.api.list_pretrained(role))?)
}

pub async fn refresh_pretrained(state: &AppState, _params: &Value) -> vctrain_core::Result<Value> {
    Ok(serde_json::to_value(state.api.refresh_pretrained())?)
}

pub async fn upload_pretrained(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let file = require_str_param(params, "file", "file")?;
    let outcome = state.api.upload_pretrained(PathBuf::from(file)).await?;
    Ok(serde_json::to_value(outcome)?)
}
