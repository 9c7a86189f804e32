//! Project and pipeline stage handlers.
//!
//! Parameter names follow the trainer CLI (`model_name`, `rvc_version`,
//! `f0method`, `total_epoch`, ...); camelCase variants are accepted too.

use super::{get_bool_param, get_str_param, get_u32_param, require_str_param};
use crate::server::AppState;
use serde_json::Value;
use vctrain_core::config::TrainingDefaults;
use vctrain_core::pipeline::{
    CheckpointPolicy, ExtractRequest, HopLength, IndexRequest, ModelVersion, PitchExtractor,
    PreprocessRequest, ProjectName, SampleRate, TrainRequest,
};
use vctrain_core::{GpuSelection, PretrainedSource, TrainerError};

fn project_param(params: &Value) -> vctrain_core::Result<ProjectName> {
    ProjectName::new(require_str_param(params, "model_name", "modelName")?)
}

fn version_param(params: &Value) -> vctrain_core::Result<ModelVersion> {
    get_str_param(params, "rvc_version", "rvcVersion")
        .map(ModelVersion::parse)
        .unwrap_or(Ok(ModelVersion::default()))
}

fn sample_rate_param(params: &Value) -> vctrain_core::Result<SampleRate> {
    get_u32_param(params, "sampling_rate", "samplingRate")?
        .map(SampleRate::try_from)
        .unwrap_or(Ok(SampleRate::default()))
}

fn hop_length_param(params: &Value) -> vctrain_core::Result<HopLength> {
    let Some(hop) = get_u32_param(params, "hop_length", "hopLength")? else {
        return Ok(HopLength::default());
    };
    let hop = u16::try_from(hop).map_err(|_| {
        TrainerError::validation("hop_length", format!("{hop} is out of range"))
    })?;
    HopLength::try_from(hop)
}

fn pretrained_param(params: &Value) -> vctrain_core::Result<PretrainedSource> {
    let pretrained = get_bool_param(params, "pretrained", "pretrained")?.unwrap_or(true);
    let custom = get_bool_param(params, "custom_pretrained", "customPretrained")?.unwrap_or(false);

    Ok(match (pretrained, custom) {
        (false, _) => PretrainedSource::None,
        (true, false) => PretrainedSource::Default,
        (true, true) => PretrainedSource::Custom {
            generator: require_str_param(params, "g_pretrained_path", "gPretrainedPath")?,
            discriminator: require_str_param(params, "d_pretrained_path", "dPretrainedPath")?,
        },
    })
}

pub async fn list_projects(state: &AppState, _params: &Value) -> vctrain_core::Result<Value> {
    Ok(serde_json::to_value(state.api.list_projects()?)?)
}

pub async fn get_project_info(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let name = require_str_param(params, "model_name", "modelName")?;
    Ok(serde_json::to_value(state.api.project_info(&name)?)?)
}

pub async fn preprocess_dataset(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let request = PreprocessRequest {
        model_name: project_param(params)?,
        dataset_path: require_str_param(params, "dataset_path", "datasetPath")?,
        sample_rate: sample_rate_param(params)?,
    };
    let report = state.api.preprocess_dataset(request).await?;
    Ok(serde_json::to_value(report)?)
}

pub async fn extract_features(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let f0_method = get_str_param(params, "f0method", "f0Method")
        .map(PitchExtractor::parse)
        .unwrap_or(Ok(PitchExtractor::default()))?;

    let request = ExtractRequest {
        model_name: project_param(params)?,
        version: version_param(params)?,
        f0_method,
        hop_length: hop_length_param(params)?,
        sample_rate: sample_rate_param(params)?,
    };
    let report = state.api.extract_features(request).await?;
    Ok(serde_json::to_value(report)?)
}

pub async fn start_training(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let checkpoints = CheckpointPolicy {
        save_every_epoch: get_u32_param(params, "save_every_epoch", "saveEveryEpoch")?
            .unwrap_or(TrainingDefaults::SAVE_EVERY_EPOCH_DEFAULT),
        save_only_latest: get_bool_param(params, "save_only_latest", "saveOnlyLatest")?
            .unwrap_or(false),
        save_every_weights: get_bool_param(params, "save_every_weights", "saveEveryWeights")?
            .unwrap_or(true),
    };

    let batch_size = match get_u32_param(params, "batch_size", "batchSize")? {
        Some(size) => size,
        None => state.api.get_gpu_info().await?.default_batch_size,
    };

    let gpus = GpuSelection::parse(
        get_str_param(params, "gpu", "gpu").unwrap_or(TrainingDefaults::DEFAULT_GPUS),
    )?;

    let request = TrainRequest {
        model_name: project_param(params)?,
        version: version_param(params)?,
        checkpoints,
        total_epochs: get_u32_param(params, "total_epoch", "totalEpoch")?
            .unwrap_or(TrainingDefaults::TOTAL_EPOCH_DEFAULT),
        sample_rate: sample_rate_param(params)?,
        batch_size,
        gpus,
        pitch_guidance: get_bool_param(params, "pitch_guidance", "pitchGuidance")?
            .unwrap_or(true),
        pretrained: pretrained_param(params)?,
        resolved_pretrained: None,
    };

    let report = state.api.start_training(request).await?;
    Ok(serde_json::to_value(report)?)
}

pub async fn generate_index(state: &AppState, params: &Value) -> vctrain_core::Result<Value> {
    let request = IndexRequest {
        model_name: project_param(params)?,
        version: version_param(params)?,
    };
    let report = state.api.generate_index(request).await?;
    Ok(serde_json::to_value(report)?)
}
