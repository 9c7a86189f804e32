//! Job tracking and per-project exclusivity around a [`TrainingPipeline`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, warn};
use uuid::Uuid;

use super::jobs::{JobRecord, JobStatus, JobTracker};
use super::types::{PipelineStage, StageReport, StageRequest};
use super::{StageContext, TrainingPipeline};
use crate::cancel::CancellationToken;
use crate::error::{Result, TrainerError};

#[derive(Debug, Clone)]
struct ActiveJob {
    job_id: String,
    stage: PipelineStage,
    cancel: CancellationToken,
}

type ActiveMap = Arc<Mutex<HashMap<String, ActiveJob>>>;

/// Holds a project's slot for the lifetime of one run.
///
/// Dropping it frees the project. A job still marked running at that point
/// was abandoned mid-flight and is recorded as cancelled.
struct ProjectSlot {
    active: ActiveMap,
    jobs: Arc<JobTracker>,
    project: String,
    job_id: String,
}

impl Drop for ProjectSlot {
    fn drop(&mut self) {
        self.active
            .lock()
            .expect("active job lock poisoned")
            .remove(&self.project);

        if let Some(job) = self.jobs.get(&self.job_id) {
            if job.status == JobStatus::Running {
                warn!("Job {} abandoned before completion", self.job_id);
                self.jobs.finish(
                    &self.job_id,
                    JobStatus::Cancelled,
                    Some("Request dropped before completion".into()),
                );
            }
        }
    }
}

/// Runs pipeline stages, at most one per project at a time.
pub struct PipelineRunner {
    pipeline: Arc<dyn TrainingPipeline>,
    jobs: Arc<JobTracker>,
    active: ActiveMap,
}

impl PipelineRunner {
    pub fn new(pipeline: Arc<dyn TrainingPipeline>) -> Self {
        Self::with_tracker(pipeline, Arc::new(JobTracker::new()))
    }

    pub fn with_tracker(pipeline: Arc<dyn TrainingPipeline>, jobs: Arc<JobTracker>) -> Self {
        Self {
            pipeline,
            jobs,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    /// Stage currently running for `project`, if any.
    pub fn busy_stage(&self, project: &str) -> Option<PipelineStage> {
        self.active
            .lock()
            .expect("active job lock poisoned")
            .get(project)
            .map(|job| job.stage)
    }

    fn acquire(
        &self,
        project: &str,
        stage: PipelineStage,
        job_id: &str,
        cancel: CancellationToken,
    ) -> Result<ProjectSlot> {
        let mut active = self.active.lock().expect("active job lock poisoned");
        if let Some(running) = active.get(project) {
            return Err(TrainerError::ProjectBusy {
                project: project.to_string(),
                stage: running.stage,
            });
        }
        active.insert(
            project.to_string(),
            ActiveJob {
                job_id: job_id.to_string(),
                stage,
                cancel,
            },
        );
        Ok(ProjectSlot {
            active: Arc::clone(&self.active),
            jobs: Arc::clone(&self.jobs),
            project: project.to_string(),
            job_id: job_id.to_string(),
        })
    }

    /// Run one stage to completion.
    ///
    /// Fails fast with [`TrainerError::ProjectBusy`] when the project already
    /// has a job in flight.
    pub async fn run(&self, request: StageRequest) -> Result<StageReport> {
        let stage = request.stage();
        let project = request.project().to_string();
        let job_id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();

        let _slot = self.acquire(&project, stage, &job_id, cancel.clone())?;
        self.jobs
            .insert(JobRecord::start(&job_id, stage, &project));
        info!("Job {} started: {} for {}", job_id, stage, project);

        let ctx = StageContext::new(&job_id, cancel, Arc::clone(&self.jobs));
        let result = match &request {
            StageRequest::Preprocess(r) => self.pipeline.preprocess(r, &ctx).await,
            StageRequest::Extract(r) => self.pipeline.extract(r, &ctx).await,
            StageRequest::Train(r) => self.pipeline.train(r, &ctx).await,
            StageRequest::Index(r) => self.pipeline.build_index(r, &ctx).await,
        };

        match &result {
            Ok(report) if report.succeeded() => {
                self.jobs
                    .finish(&job_id, JobStatus::Succeeded, Some(report.message.clone()));
            }
            Ok(report) => {
                self.jobs
                    .finish(&job_id, JobStatus::Failed, Some(report.message.clone()));
            }
            Err(TrainerError::Cancelled) => {
                info!("Job {} cancelled", job_id);
                self.jobs
                    .finish(&job_id, JobStatus::Cancelled, Some("Cancelled by user".into()));
            }
            Err(e) => {
                self.jobs.finish(&job_id, JobStatus::Failed, Some(e.to_string()));
            }
        }

        result.map(|mut report| {
            report.job_id = job_id;
            report
        })
    }

    /// Request cancellation of a running job.
    ///
    /// Returns `false` when the job exists but already finished.
    pub fn cancel(&self, job_id: &str) -> Result<bool> {
        let active = self.active.lock().expect("active job lock poisoned");
        if let Some(job) = active.values().find(|j| j.job_id == job_id) {
            info!("Cancellation requested for job {}", job_id);
            job.cancel.cancel();
            return Ok(true);
        }
        drop(active);

        match self.jobs.get(job_id) {
            Some(_) => Ok(false),
            None => Err(TrainerError::JobNotFound {
                job_id: job_id.to_string(),
            }),
        }
    }
}
