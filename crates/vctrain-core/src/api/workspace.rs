//! Dataset, pretrained and project methods on TrainerApi.

use std::path::PathBuf;

use tracing::info;

use crate::datasets::AddFilesOutcome;
use crate::error::{Result, TrainerError};
use crate::pipeline::ProjectName;
use crate::pretrained::{PretrainedLists, PretrainedRole, UploadOutcome};
use crate::projects::ProjectInfo;
use crate::TrainerApi;

impl TrainerApi {
    // ========================================
    // Datasets
    // ========================================

    /// Directories under `assets/datasets/` holding supported audio.
    pub fn list_datasets(&self) -> Vec<String> {
        self.datasets.list_datasets()
    }

    /// Move uploaded audio into a dataset. Problems with individual files
    /// come back as notices.
    pub async fn add_dataset_files(
        &self,
        files: Vec<PathBuf>,
        dataset_name: String,
    ) -> Result<AddFilesOutcome> {
        let datasets = self.datasets.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            datasets.add_files(files.as_slice(), &dataset_name)
        })
        .await
        .map_err(|e| TrainerError::Other(format!("Dataset upload task failed: {}", e)))??;

        if let Some(path) = &outcome.dataset_path {
            info!("Dataset {} now has {} new file(s)", path, outcome.added.len());
        }
        Ok(outcome)
    }

    // ========================================
    // Pretrained weights
    // ========================================

    pub fn list_pretrained(&self, role: PretrainedRole) -> Vec<String> {
        self.pretrained.list_pretrained(role)
    }

    /// Rescan the custom pretrained directory.
    pub fn refresh_pretrained(&self) -> PretrainedLists {
        self.pretrained.refresh()
    }

    pub async fn upload_pretrained(&self, file: PathBuf) -> Result<UploadOutcome> {
        let pretrained = self.pretrained.clone();
        tokio::task::spawn_blocking(move || pretrained.accept_upload(&file))
            .await
            .map_err(|e| TrainerError::Other(format!("Pretrained upload task failed: {}", e)))?
    }

    // ========================================
    // Projects
    // ========================================

    pub fn list_projects(&self) -> Result<Vec<String>> {
        self.projects.list_projects()
    }

    pub fn project_info(&self, name: &str) -> Result<ProjectInfo> {
        let name = ProjectName::new(name)?;
        self.projects.project_info(&name)
    }
}
