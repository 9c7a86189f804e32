//! Dataset registry.
//!
//! Datasets are plain directories of audio files under
//! `<root>/assets/datasets/`. Nothing is cached: every listing walks the disk.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::config::{is_supported_audio_extension, PathsConfig};
use crate::error::Result;
use crate::fsops::{move_file_overwrite, relative_display};
use crate::naming::{file_extension, normalize_filename, normalize_name};
use crate::notice::Notice;

/// Result of adding uploaded files to a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AddFilesOutcome {
    /// Dataset directory relative to the workspace root, set when at least
    /// one file was stored.
    pub dataset_path: Option<String>,
    /// Stored files, relative to the workspace root.
    pub added: Vec<String>,
    pub notices: Vec<Notice>,
}

/// Lists datasets and stores uploaded audio into them.
#[derive(Debug, Clone)]
pub struct DatasetRegistry {
    workspace_root: PathBuf,
    datasets_root: PathBuf,
}

impl DatasetRegistry {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let datasets_root = workspace_root
            .join(PathsConfig::ASSETS_DIR_NAME)
            .join(PathsConfig::DATASETS_DIR_NAME);
        Self {
            workspace_root,
            datasets_root,
        }
    }

    /// Absolute path of the datasets root directory.
    pub fn datasets_root(&self) -> &Path {
        &self.datasets_root
    }

    /// List every directory under the datasets root that directly holds at
    /// least one supported audio file.
    ///
    /// Paths are relative to the workspace root and sorted ascending.
    pub fn list_datasets(&self) -> Vec<String> {
        if !self.datasets_root.is_dir() {
            return Vec::new();
        }

        let mut dirs = BTreeSet::new();
        for entry in WalkDir::new(&self.datasets_root)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let supported = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(is_supported_audio_extension);
            if !supported {
                continue;
            }
            if let Some(parent) = entry.path().parent() {
                dirs.insert(relative_display(&self.workspace_root, parent));
            }
        }

        debug!("Found {} dataset directories", dirs.len());
        dirs.into_iter().collect()
    }

    /// Move uploaded audio files into the dataset named `dataset_name`.
    ///
    /// The dataset name and each filename are normalized first. A file with
    /// an unsupported extension is left where it is and reported as a notice;
    /// an empty dataset name rejects the whole batch without touching disk.
    /// Same-named files already in the dataset are overwritten.
    pub fn add_files<P: AsRef<Path>>(
        &self,
        files: &[P],
        dataset_name: &str,
    ) -> Result<AddFilesOutcome> {
        let mut outcome = AddFilesOutcome::default();

        let normalized = normalize_name(dataset_name);
        if normalized.is_empty() {
            outcome.notices.push(Notice::warning(
                "Please enter a valid dataset name. Please try again.",
            ));
            return Ok(outcome);
        }

        let dataset_dir = self.datasets_root.join(&normalized);

        for file in files {
            let file = file.as_ref();
            let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
                outcome.notices.push(Notice::warning(format!(
                    "Invalid upload path: {}",
                    file.display()
                )));
                continue;
            };

            let supported = file_extension(file_name)
                .as_deref()
                .is_some_and(is_supported_audio_extension);
            if !supported {
                outcome.notices.push(Notice::warning(format!(
                    "The file you dropped is not a valid audio file ({}). Please try again.",
                    file_name
                )));
                continue;
            }

            if !file.is_file() {
                outcome.notices.push(Notice::warning(format!(
                    "Uploaded file not found: {}",
                    file.display()
                )));
                continue;
            }

            let destination = dataset_dir.join(normalize_filename(file_name));
            move_file_overwrite(file, &destination)?;
            info!(
                "Added {} to dataset {}",
                file.display(),
                destination.display()
            );

            outcome
                .added
                .push(relative_display(&self.workspace_root, &destination));
            outcome.notices.push(Notice::info(
                "The audio file has been successfully added to the dataset. Please click the preprocess button.",
            ));
        }

        if !outcome.added.is_empty() {
            outcome.dataset_path = Some(relative_display(&self.workspace_root, &dataset_dir));
        }

        Ok(outcome)
    }
}
