//! Dataset handlers.

use super::{require_str_array_param, require_str_param};
use crate::server::AppState;
use serde_json::Value;
use std::path::PathBuf;

pub async fn list_datasets(state: &AppState, _params: &Value) -> vctrain_core::Result<Value> {
    Ok(serde_json::to_value(state.api.list_datasets())?)
}

pub async fn add_dataset_files(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let files = require_str_array_param(params, "files", "files")?
        .into_iter()
        .map(PathBuf::from)
        .collect();
    let dataset_name = require_str_param(params, "dataset_name", "datasetName")?;

    let outcome = state.api.add_dataset_files(files, dataset_name).await?;
    Ok(serde_json::to_value(outcome)?)
}
