//! Builder for configuring TrainerApi initialization.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::PathsConfig;
use crate::datasets::DatasetRegistry;
use crate::error::{Result, TrainerError};
use crate::pipeline::{PipelineRunner, ScriptPipeline, TrainingPipeline};
use crate::pretrained::PretrainedRegistry;
use crate::projects::ProjectStore;
use crate::system::{self, GpuMonitor, NoOpGpuMonitor};
use crate::TrainerApi;

/// Builder for [`TrainerApi`].
///
/// ```rust,no_run
/// use vctrain_core::TrainerApi;
///
/// # async fn run() -> vctrain_core::Result<()> {
/// let api = TrainerApi::builder("./workspace")
///     .auto_create_dirs(true)
///     .interpreter("python3")
///     .build()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TrainerApiBuilder {
    workspace_root: PathBuf,
    auto_create_dirs: bool,
    interpreter: Option<PathBuf>,
    core_script: Option<PathBuf>,
    pipeline: Option<Arc<dyn TrainingPipeline>>,
    gpu_monitor: Option<Box<dyn GpuMonitor>>,
    detect_gpus: bool,
}

impl TrainerApiBuilder {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            auto_create_dirs: false,
            interpreter: None,
            core_script: None,
            pipeline: None,
            gpu_monitor: None,
            detect_gpus: true,
        }
    }

    /// Create the workspace layout if missing:
    /// - `assets/datasets/`
    /// - `rvc/pretraineds/pretraineds_custom/`
    /// - `logs/`
    ///
    /// Default: `false` (the workspace root must exist)
    pub fn auto_create_dirs(mut self, enable: bool) -> Self {
        self.auto_create_dirs = enable;
        self
    }

    /// Interpreter used to run the trainer entry point. Default: `python`.
    pub fn interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Trainer entry point, relative to the workspace root or absolute.
    /// Default: `core.py`.
    pub fn core_script(mut self, core_script: impl Into<PathBuf>) -> Self {
        self.core_script = Some(core_script.into());
        self
    }

    /// Use a custom pipeline instead of the script-backed one.
    /// `interpreter` and `core_script` are then ignored.
    pub fn with_pipeline(mut self, pipeline: Arc<dyn TrainingPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn with_gpu_monitor(mut self, monitor: Box<dyn GpuMonitor>) -> Self {
        self.gpu_monitor = Some(monitor);
        self
    }

    /// Detect `nvidia-smi` at build time. Default: `true`.
    pub fn detect_gpus(mut self, enable: bool) -> Self {
        self.detect_gpus = enable;
        self
    }

    async fn create_directory_structure(root: &Path) -> Result<()> {
        let dirs = [
            root.join(PathsConfig::ASSETS_DIR_NAME)
                .join(PathsConfig::DATASETS_DIR_NAME),
            root.join(PathsConfig::RVC_DIR_NAME)
                .join(PathsConfig::PRETRAINEDS_DIR_NAME)
                .join(PathsConfig::PRETRAINEDS_CUSTOM_DIR_NAME),
            root.join(PathsConfig::LOGS_DIR_NAME),
        ];

        for dir in &dirs {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| TrainerError::Io {
                    message: format!("Failed to create directory: {}", dir.display()),
                    path: Some(dir.clone()),
                    source: Some(e),
                })?;
        }
        Ok(())
    }

    pub async fn build(self) -> Result<TrainerApi> {
        if self.auto_create_dirs {
            Self::create_directory_structure(&self.workspace_root).await?;
        } else if !self.workspace_root.is_dir() {
            return Err(TrainerError::Config {
                message: format!(
                    "Workspace root does not exist: {}",
                    self.workspace_root.display()
                ),
            });
        }

        let workspace_root = self.workspace_root;

        let pipeline: Arc<dyn TrainingPipeline> = match self.pipeline {
            Some(pipeline) => pipeline,
            None => {
                let mut script = ScriptPipeline::new(&workspace_root);
                if let Some(interpreter) = self.interpreter {
                    script = script.with_interpreter(interpreter);
                }
                if let Some(core_script) = self.core_script {
                    script = script.with_core_script(core_script);
                }
                debug!("Trainer entry point: {}", script.script_path().display());
                Arc::new(script)
            }
        };

        let gpu_monitor: Arc<dyn GpuMonitor> = match self.gpu_monitor {
            Some(monitor) => Arc::from(monitor),
            None if self.detect_gpus => {
                let monitor = tokio::task::spawn_blocking(system::create_gpu_monitor)
                    .await
                    .map_err(|e| TrainerError::Other(format!("GPU detection failed: {}", e)))?;
                Arc::from(monitor)
            }
            None => Arc::new(NoOpGpuMonitor),
        };

        info!("Workspace ready at {}", workspace_root.display());

        Ok(TrainerApi {
            datasets: DatasetRegistry::new(&workspace_root),
            pretrained: PretrainedRegistry::new(&workspace_root),
            projects: ProjectStore::new(&workspace_root),
            runner: PipelineRunner::new(pipeline),
            gpu_monitor,
            workspace_root,
        })
    }
}
