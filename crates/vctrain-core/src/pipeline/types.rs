//! Typed requests and results for the training pipeline.

use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointPolicy;
use crate::config::TrainingDefaults;
use crate::error::{Result, TrainerError};
use crate::fsops::is_contained;
use crate::pretrained::{PretrainedPair, PretrainedSource};
use crate::system::GpuSelection;

/// One of the four pipeline stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Preprocess,
    Extract,
    Train,
    Index,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Preprocess => "preprocess",
            PipelineStage::Extract => "extract",
            PipelineStage::Train => "train",
            PipelineStage::Index => "index",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Model architecture version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelVersion {
    V1,
    #[default]
    V2,
}

impl ModelVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVersion::V1 => "v1",
            ModelVersion::V2 => "v2",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "v1" => Ok(ModelVersion::V1),
            "v2" => Ok(ModelVersion::V2),
            other => Err(TrainerError::validation(
                "version",
                format!("expected v1 or v2, got {other:?}"),
            )),
        }
    }
}

impl std::fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported audio sample rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SampleRate {
    Hz32000,
    #[default]
    Hz40000,
    Hz48000,
}

impl SampleRate {
    pub fn hz(&self) -> u32 {
        match self {
            SampleRate::Hz32000 => 32_000,
            SampleRate::Hz40000 => 40_000,
            SampleRate::Hz48000 => 48_000,
        }
    }

    pub fn khz(&self) -> u32 {
        self.hz() / 1000
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = TrainerError;

    fn try_from(hz: u32) -> Result<Self> {
        match hz {
            32_000 => Ok(SampleRate::Hz32000),
            40_000 => Ok(SampleRate::Hz40000),
            48_000 => Ok(SampleRate::Hz48000),
            other => Err(TrainerError::validation(
                "sampling_rate",
                format!("expected 32000, 40000 or 48000, got {other}"),
            )),
        }
    }
}

impl From<SampleRate> for u32 {
    fn from(rate: SampleRate) -> Self {
        rate.hz()
    }
}

/// Pitch extraction algorithm used by the extract stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PitchExtractor {
    Pm,
    Dio,
    Crepe,
    CrepeTiny,
    Harvest,
    #[default]
    Rmvpe,
}

impl PitchExtractor {
    pub const ALL: [PitchExtractor; 6] = [
        PitchExtractor::Pm,
        PitchExtractor::Dio,
        PitchExtractor::Crepe,
        PitchExtractor::CrepeTiny,
        PitchExtractor::Harvest,
        PitchExtractor::Rmvpe,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PitchExtractor::Pm => "pm",
            PitchExtractor::Dio => "dio",
            PitchExtractor::Crepe => "crepe",
            PitchExtractor::CrepeTiny => "crepe-tiny",
            PitchExtractor::Harvest => "harvest",
            PitchExtractor::Rmvpe => "rmvpe",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| {
                TrainerError::validation(
                    "f0method",
                    format!("unknown pitch extraction algorithm {s:?}"),
                )
            })
    }
}

/// Frame advance for pitch/feature extraction, 1..=512.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct HopLength(u16);

impl HopLength {
    pub fn get(&self) -> u16 {
        self.0
    }
}

impl Default for HopLength {
    fn default() -> Self {
        HopLength(TrainingDefaults::HOP_LENGTH_DEFAULT)
    }
}

impl TryFrom<u16> for HopLength {
    type Error = TrainerError;

    fn try_from(value: u16) -> Result<Self> {
        if (TrainingDefaults::HOP_LENGTH_MIN..=TrainingDefaults::HOP_LENGTH_MAX).contains(&value)
        {
            Ok(HopLength(value))
        } else {
            Err(TrainerError::validation(
                "hop_length",
                format!(
                    "must be between {} and {}, got {}",
                    TrainingDefaults::HOP_LENGTH_MIN,
                    TrainingDefaults::HOP_LENGTH_MAX,
                    value
                ),
            ))
        }
    }
}

impl From<HopLength> for u16 {
    fn from(hop: HopLength) -> Self {
        hop.0
    }
}

/// A project (model) name: the directory name under `logs/`.
///
/// Must be non-empty and a single path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectName(String);

impl ProjectName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(TrainerError::validation("model_name", "must not be empty"));
        }
        let single_component = !name.contains(['/', '\\'])
            && is_contained(std::path::Path::new(&name))
            && name != ".";
        if !single_component {
            return Err(TrainerError::validation(
                "model_name",
                format!("{name:?} must be a plain directory name"),
            ));
        }
        Ok(ProjectName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectName {
    type Error = TrainerError;

    fn try_from(value: String) -> Result<Self> {
        ProjectName::new(value)
    }
}

impl From<ProjectName> for String {
    fn from(name: ProjectName) -> Self {
        name.0
    }
}

impl std::fmt::Display for ProjectName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request for the preprocess stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessRequest {
    pub model_name: ProjectName,
    /// Dataset directory, relative to the workspace root or absolute.
    pub dataset_path: String,
    pub sample_rate: SampleRate,
}

/// Request for the extract stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractRequest {
    pub model_name: ProjectName,
    pub version: ModelVersion,
    pub f0_method: PitchExtractor,
    pub hop_length: HopLength,
    pub sample_rate: SampleRate,
}

/// Request for the train stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub model_name: ProjectName,
    pub version: ModelVersion,
    pub checkpoints: CheckpointPolicy,
    pub total_epochs: u32,
    pub sample_rate: SampleRate,
    pub batch_size: u32,
    pub gpus: GpuSelection,
    pub pitch_guidance: bool,
    pub pretrained: PretrainedSource,
    /// Concrete weight files, filled in from `pretrained` before the run.
    #[serde(skip)]
    pub resolved_pretrained: Option<PretrainedPair>,
}

impl TrainRequest {
    /// Check numeric ranges that the types alone do not enforce.
    pub fn validate(&self) -> Result<()> {
        self.checkpoints.validate()?;

        if !(TrainingDefaults::TOTAL_EPOCH_MIN..=TrainingDefaults::TOTAL_EPOCH_MAX)
            .contains(&self.total_epochs)
        {
            return Err(TrainerError::validation(
                "total_epoch",
                format!(
                    "must be between {} and {}, got {}",
                    TrainingDefaults::TOTAL_EPOCH_MIN,
                    TrainingDefaults::TOTAL_EPOCH_MAX,
                    self.total_epochs
                ),
            ));
        }

        if !(TrainingDefaults::BATCH_SIZE_MIN..=TrainingDefaults::BATCH_SIZE_MAX)
            .contains(&self.batch_size)
        {
            return Err(TrainerError::validation(
                "batch_size",
                format!(
                    "must be between {} and {}, got {}",
                    TrainingDefaults::BATCH_SIZE_MIN,
                    TrainingDefaults::BATCH_SIZE_MAX,
                    self.batch_size
                ),
            ));
        }

        Ok(())
    }

    pub fn uses_pretrained(&self) -> bool {
        !matches!(self.pretrained, PretrainedSource::None)
    }

    pub fn uses_custom_pretrained(&self) -> bool {
        matches!(self.pretrained, PretrainedSource::Custom { .. })
    }
}

/// Request for the index stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRequest {
    pub model_name: ProjectName,
    pub version: ModelVersion,
}

/// Any pipeline request.
#[derive(Debug, Clone, PartialEq)]
pub enum StageRequest {
    Preprocess(PreprocessRequest),
    Extract(ExtractRequest),
    Train(TrainRequest),
    Index(IndexRequest),
}

impl StageRequest {
    pub fn stage(&self) -> PipelineStage {
        match self {
            StageRequest::Preprocess(_) => PipelineStage::Preprocess,
            StageRequest::Extract(_) => PipelineStage::Extract,
            StageRequest::Train(_) => PipelineStage::Train,
            StageRequest::Index(_) => PipelineStage::Index,
        }
    }

    pub fn project(&self) -> &ProjectName {
        match self {
            StageRequest::Preprocess(r) => &r.model_name,
            StageRequest::Extract(r) => &r.model_name,
            StageRequest::Train(r) => &r.model_name,
            StageRequest::Index(r) => &r.model_name,
        }
    }
}

/// Outcome of a stage that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Succeeded,
    Failed,
}

/// Structured result of one pipeline operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub job_id: String,
    pub stage: PipelineStage,
    pub project: String,
    pub status: StageStatus,
    /// Human-readable summary line.
    pub message: String,
    /// Captured trainer output, most recent lines last.
    #[serde(default)]
    pub output: Vec<String>,
    /// Planned G/D checkpoints found on disk after a training run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub checkpoints: Vec<String>,
}

impl StageReport {
    pub fn succeeded(&self) -> bool {
        self.status == StageStatus::Succeeded
    }
}
