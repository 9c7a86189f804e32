//! Training pipeline boundary.
//!
//! The four stages (preprocess, extract, train, index) are delegated to a
//! [`TrainingPipeline`]. [`ScriptPipeline`] drives the external trainer CLI;
//! [`PipelineRunner`] wraps any pipeline with job tracking and per-project
//! exclusivity.

mod checkpoint;
mod jobs;
mod runner;
mod script;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::cancel::CancellationToken;
use crate::error::Result;

pub use checkpoint::{CheckpointPlan, CheckpointPolicy, CheckpointTag, LATEST_CHECKPOINT_STEP};
pub use jobs::{JobRecord, JobStatus, JobTracker, ScriptProgressLine};
pub use runner::PipelineRunner;
pub use script::ScriptPipeline;
pub use types::{
    ExtractRequest, HopLength, IndexRequest, ModelVersion, PipelineStage, PitchExtractor,
    PreprocessRequest, ProjectName, SampleRate, StageReport, StageRequest, StageStatus,
    TrainRequest,
};

/// Per-job handle passed to a pipeline call.
#[derive(Clone)]
pub struct StageContext {
    job_id: String,
    cancel: CancellationToken,
    jobs: Arc<JobTracker>,
}

impl StageContext {
    pub fn new(job_id: impl Into<String>, cancel: CancellationToken, jobs: Arc<JobTracker>) -> Self {
        Self {
            job_id: job_id.into(),
            cancel,
            jobs,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Record a progress update on this job.
    pub fn report(&self, line: &ScriptProgressLine) {
        self.jobs.update_from_script(&self.job_id, line);
    }
}

/// The external training engine.
///
/// Each call blocks until the stage finishes, fails or is cancelled through
/// the context's token. A stage that ran but did not succeed is an `Ok`
/// report with [`StageStatus::Failed`]; `Err` is reserved for failures to
/// run at all and for cancellation.
#[async_trait]
pub trait TrainingPipeline: Send + Sync {
    async fn preprocess(&self, request: &PreprocessRequest, ctx: &StageContext)
        -> Result<StageReport>;

    async fn extract(&self, request: &ExtractRequest, ctx: &StageContext) -> Result<StageReport>;

    async fn train(&self, request: &TrainRequest, ctx: &StageContext) -> Result<StageReport>;

    async fn build_index(&self, request: &IndexRequest, ctx: &StageContext)
        -> Result<StageReport>;
}
