//! vctrain core - headless library behind the voice-conversion training panel.
//!
//! Manages a training workspace on disk (datasets, pretrained weights,
//! project outputs) and drives the four training stages through a
//! [`TrainingPipeline`]. No HTTP/RPC layer lives here; see `vctrain-rpc`.
//!
//! # Example
//!
//! ```rust,no_run
//! use vctrain_core::pipeline::{IndexRequest, ModelVersion, ProjectName};
//! use vctrain_core::TrainerApi;
//!
//! #[tokio::main]
//! async fn main() -> vctrain_core::Result<()> {
//!     let api = TrainerApi::builder("./workspace")
//!         .auto_create_dirs(true)
//!         .build()
//!         .await?;
//!
//!     println!("Datasets: {:?}", api.list_datasets());
//!
//!     let report = api
//!         .generate_index(IndexRequest {
//!             model_name: ProjectName::new("my-project")?,
//!             version: ModelVersion::V2,
//!         })
//!         .await?;
//!     println!("{}", report.message);
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod datasets;
pub mod error;
pub mod naming;
pub mod notice;
pub mod pipeline;
pub mod pretrained;
pub mod projects;
pub mod system;

mod api;
mod fsops;

pub use api::{StatusResponse, TrainerApiBuilder};
pub use cancel::{CancellationToken, CancelledError};
pub use datasets::{AddFilesOutcome, DatasetRegistry};
pub use error::{Result, TrainerError};
pub use notice::{Notice, NoticeLevel};
pub use pipeline::{
    JobRecord, JobStatus, PipelineStage, ScriptPipeline, StageContext, StageReport, StageStatus,
    TrainingPipeline,
};
pub use pretrained::{
    PretrainedLists, PretrainedPair, PretrainedRegistry, PretrainedRole, PretrainedSource,
    UploadOutcome,
};
pub use projects::{ProjectInfo, ProjectStore};
pub use system::{GpuDevice, GpuMonitor, GpuReport, GpuSelection};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use pipeline::PipelineRunner;

/// Entry point for programmatic access to a training workspace.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct TrainerApi {
    workspace_root: PathBuf,
    datasets: DatasetRegistry,
    pretrained: PretrainedRegistry,
    projects: ProjectStore,
    runner: PipelineRunner,
    gpu_monitor: Arc<dyn GpuMonitor>,
}

impl TrainerApi {
    /// Create a builder. See [`TrainerApiBuilder`] for the options.
    pub fn builder(workspace_root: impl Into<PathBuf>) -> TrainerApiBuilder {
        TrainerApiBuilder::new(workspace_root)
    }

    /// Open an existing workspace with default settings.
    pub async fn new(workspace_root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(workspace_root).build().await
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}
