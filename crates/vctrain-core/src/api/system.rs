//! Status and GPU methods on TrainerApi.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerError};
use crate::pipeline::JobRecord;
use crate::system::{GpuDevice, GpuReport};
use crate::TrainerApi;

/// Overall workspace status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub workspace_root: String,
    pub dataset_count: usize,
    pub project_count: usize,
    pub gpu_available: bool,
    pub running_jobs: Vec<JobRecord>,
}

impl TrainerApi {
    pub fn get_status(&self) -> Result<StatusResponse> {
        Ok(StatusResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            workspace_root: self.workspace_root.display().to_string(),
            dataset_count: self.datasets.list_datasets().len(),
            project_count: self.projects.list_projects()?.len(),
            gpu_available: self.gpu_monitor.is_available(),
            running_jobs: self.runner.jobs().running(),
        })
    }

    /// Device inventory, info text and suggested batch size.
    pub async fn get_gpu_info(&self) -> Result<GpuReport> {
        let devices = self.gpu_devices(true).await?;
        Ok(GpuReport::from_devices(
            self.gpu_monitor.is_available(),
            devices,
        ))
    }

    /// Query the inventory off the async runtime; `nvidia-smi` blocks.
    pub(crate) async fn gpu_devices(&self, refresh: bool) -> Result<Vec<GpuDevice>> {
        let monitor = Arc::clone(&self.gpu_monitor);
        tokio::task::spawn_blocking(move || {
            if refresh {
                monitor.refresh();
            }
            monitor.list_devices()
        })
        .await
        .map_err(|e| TrainerError::Other(format!("GPU query task failed: {}", e)))?
    }
}
