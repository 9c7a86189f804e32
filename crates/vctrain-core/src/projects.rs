//! Read-only view of training projects under `<root>/logs/`.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use crate::config::PathsConfig;
use crate::error::{IoResultExt, Result, TrainerError};
use crate::fsops::relative_display;
use crate::pipeline::{ModelVersion, ProjectName};

static CHECKPOINT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[GD]_\d+\.pth$").unwrap());

/// Directory the preprocess stage writes audio slices into.
const SLICED_AUDIO_DIR: &str = "sliced_audios";

/// What the pipeline has produced so far for one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    /// Project directory relative to the workspace root.
    pub path: String,
    pub preprocessed: bool,
    /// Versions with extracted features, e.g. `["v2"]`.
    pub extracted_versions: Vec<ModelVersion>,
    /// `G_<n>.pth` / `D_<n>.pth` training checkpoints.
    pub checkpoints: Vec<String>,
    /// Other `.pth` files: exported inference weights.
    pub weights: Vec<String>,
    pub index_files: Vec<String>,
}

/// Lists projects and inspects their stage outputs.
#[derive(Debug, Clone)]
pub struct ProjectStore {
    workspace_root: PathBuf,
    logs_root: PathBuf,
}

impl ProjectStore {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let logs_root = workspace_root.join(PathsConfig::LOGS_DIR_NAME);
        Self {
            workspace_root,
            logs_root,
        }
    }

    pub fn logs_root(&self) -> &Path {
        &self.logs_root
    }

    /// Names of all project directories, sorted.
    pub fn list_projects(&self) -> Result<Vec<String>> {
        if !self.logs_root.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.logs_root).with_path(&self.logs_root)? {
            let entry = entry.with_path(&self.logs_root)?;
            if entry.file_type().with_path(entry.path())?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Inspect one project directory.
    pub fn project_info(&self, name: &ProjectName) -> Result<ProjectInfo> {
        let dir = self.logs_root.join(name.as_str());
        if !dir.is_dir() {
            return Err(TrainerError::ProjectNotFound {
                name: name.to_string(),
            });
        }

        let preprocessed = dir.join(SLICED_AUDIO_DIR).is_dir();
        let extracted_versions = [ModelVersion::V1, ModelVersion::V2]
            .into_iter()
            .filter(|v| dir.join(format!("{}_extracted", v.as_str())).is_dir())
            .collect();

        let mut checkpoints = Vec::new();
        let mut weights = Vec::new();
        let mut index_files = Vec::new();

        for entry in WalkDir::new(&dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let Some(file_name) = entry.file_name().to_str() else {
                continue;
            };
            let extension = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase());

            match extension.as_deref() {
                Some(PathsConfig::PRETRAINED_EXTENSION) if CHECKPOINT_RE.is_match(file_name) => {
                    checkpoints.push(file_name.to_string());
                }
                Some(PathsConfig::PRETRAINED_EXTENSION) => weights.push(file_name.to_string()),
                Some(PathsConfig::INDEX_EXTENSION) => index_files.push(file_name.to_string()),
                _ => {}
            }
        }

        checkpoints.sort();
        weights.sort();
        index_files.sort();
        debug!(
            "Project {}: {} checkpoints, {} weights, {} index files",
            name,
            checkpoints.len(),
            weights.len(),
            index_files.len()
        );

        Ok(ProjectInfo {
            name: name.to_string(),
            path: relative_display(&self.workspace_root, &dir),
            preprocessed,
            extracted_versions,
            checkpoints,
            weights,
            index_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_list_projects_empty_and_sorted() {
        let temp = TempDir::new().unwrap();
        let store = ProjectStore::new(temp.path());
        assert!(store.list_projects().unwrap().is_empty());

        std::fs::create_dir_all(store.logs_root().join("zeta")).unwrap();
        std::fs::create_dir_all(store.logs_root().join("alpha")).unwrap();
        touch(&store.logs_root().join("stray.txt"));

        assert_eq!(store.list_projects().unwrap(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_project_info_classifies_outputs() {
        let temp = TempDir::new().unwrap();
        let store = ProjectStore::new(temp.path());
        let dir = store.logs_root().join("voice");

        std::fs::create_dir_all(dir.join("sliced_audios")).unwrap();
        std::fs::create_dir_all(dir.join("v2_extracted")).unwrap();
        touch(&dir.join("G_20.pth"));
        touch(&dir.join("D_20.pth"));
        touch(&dir.join("G_2333333.pth"));
        touch(&dir.join("voice_20e_400s.pth"));
        touch(&dir.join("added_voice_v2.index"));
        touch(&dir.join("config.json"));

        let info = store
            .project_info(&ProjectName::new("voice").unwrap())
            .unwrap();

        assert_eq!(info.path, "logs/voice");
        assert!(info.preprocessed);
        assert_eq!(info.extracted_versions, vec![ModelVersion::V2]);
        assert_eq!(info.checkpoints, vec!["D_20.pth", "G_20.pth", "G_2333333.pth"]);
        assert_eq!(info.weights, vec!["voice_20e_400s.pth"]);
        assert_eq!(info.index_files, vec!["added_voice_v2.index"]);
    }

    #[test]
    fn test_project_info_missing_project() {
        let temp = TempDir::new().unwrap();
        let store = ProjectStore::new(temp.path());
        let result = store.project_info(&ProjectName::new("ghost").unwrap());
        assert!(matches!(result, Err(TrainerError::ProjectNotFound { .. })));
    }
}
