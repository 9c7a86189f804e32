//! Pipeline stage and job methods on TrainerApi.

use tracing::{debug, warn};

use crate::error::{Result, TrainerError};
use crate::fsops::resolve_under;
use crate::pipeline::{
    ExtractRequest, IndexRequest, JobRecord, PreprocessRequest, StageReport, StageRequest,
    TrainRequest,
};
use crate::system::GpuSelection;
use crate::TrainerApi;

impl TrainerApi {
    // ========================================
    // Pipeline stages
    // ========================================

    /// Slice and resample a dataset into the project directory.
    pub async fn preprocess_dataset(&self, request: PreprocessRequest) -> Result<StageReport> {
        if request.dataset_path.trim().is_empty() {
            return Err(TrainerError::validation(
                "dataset_path",
                "select a dataset first",
            ));
        }
        let dataset_dir = resolve_under(&self.workspace_root, &request.dataset_path);
        let inside_workspace = match (
            tokio::fs::canonicalize(&dataset_dir).await,
            tokio::fs::canonicalize(&self.workspace_root).await,
        ) {
            (Ok(dir), Ok(root)) => dir.is_dir() && dir.starts_with(&root),
            _ => false,
        };
        if !inside_workspace {
            return Err(TrainerError::validation(
                "dataset_path",
                format!(
                    "dataset directory not found in workspace: {}",
                    request.dataset_path
                ),
            ));
        }

        self.runner.run(StageRequest::Preprocess(request)).await
    }

    pub async fn extract_features(&self, request: ExtractRequest) -> Result<StageReport> {
        self.runner.run(StageRequest::Extract(request)).await
    }

    /// Validate, resolve pretrained weights, and run the train stage.
    ///
    /// A successful report lists the planned checkpoints the trainer left on
    /// disk.
    pub async fn start_training(&self, mut request: TrainRequest) -> Result<StageReport> {
        request.validate()?;
        self.check_gpus_present(&request.gpus).await?;

        request.resolved_pretrained = self.pretrained.resolve(
            &request.pretrained,
            request.version,
            request.sample_rate,
            request.pitch_guidance,
        )?;

        let expected = request.checkpoints.expected_checkpoints(request.total_epochs);
        let project_dir = self.projects.logs_root().join(request.model_name.as_str());

        let mut report = self.runner.run(StageRequest::Train(request)).await?;
        if report.succeeded() {
            let (found, missing): (Vec<String>, Vec<String>) = expected
                .into_iter()
                .partition(|file| project_dir.join(file).is_file());
            if !missing.is_empty() {
                warn!(
                    "Training for {} finished without checkpoints: {}",
                    report.project,
                    missing.join(", ")
                );
            }
            report.checkpoints = found;
        }
        Ok(report)
    }

    pub async fn generate_index(&self, request: IndexRequest) -> Result<StageReport> {
        self.runner.run(StageRequest::Index(request)).await
    }

    /// Reject device indices the inventory does not know about.
    ///
    /// Skipped when no inventory is available.
    async fn check_gpus_present(&self, selection: &GpuSelection) -> Result<()> {
        if !self.gpu_monitor.is_available() {
            return Ok(());
        }
        let devices = self.gpu_devices(false).await?;
        if devices.is_empty() {
            debug!("GPU inventory empty, skipping device check");
            return Ok(());
        }

        for index in selection.devices() {
            if !devices.iter().any(|d| d.index == *index) {
                return Err(TrainerError::InvalidGpuSelection {
                    input: selection.to_string(),
                    message: format!("GPU {index} is not present"),
                });
            }
        }
        Ok(())
    }

    // ========================================
    // Jobs
    // ========================================

    /// Running and recent jobs, newest first.
    pub fn list_jobs(&self) -> Vec<JobRecord> {
        self.runner.jobs().list_all()
    }

    pub fn get_job(&self, job_id: &str) -> Result<JobRecord> {
        self.runner
            .jobs()
            .get(job_id)
            .ok_or_else(|| TrainerError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Cancel a running job. `Ok(false)` when it already finished.
    pub fn cancel_job(&self, job_id: &str) -> Result<bool> {
        self.runner.cancel(job_id)
    }
}
