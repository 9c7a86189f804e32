//! Thread-safe tracking of running and recently finished pipeline jobs.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::PipelineStage;
use crate::config::AppConfig;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}

/// Snapshot of one pipeline job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub stage: PipelineStage,
    pub project: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// 0.0..=1.0 when the trainer reports enough to compute it.
    pub progress: Option<f32>,
    pub epoch: Option<u32>,
    pub total_epochs: Option<u32>,
    pub message: Option<String>,
    pub error: Option<String>,
}

impl JobRecord {
    pub fn start(job_id: impl Into<String>, stage: PipelineStage, project: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
            project: project.into(),
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            progress: None,
            epoch: None,
            total_epochs: None,
            message: None,
            error: None,
        }
    }
}

/// One JSON line the trainer prints on stdout.
///
/// `stage` is one of `progress`, `epoch`, `complete` or `error`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptProgressLine {
    pub stage: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub epoch: Option<u32>,
    #[serde(default)]
    pub total_epochs: Option<u32>,
    #[serde(default)]
    pub progress: Option<f32>,
}

/// Tracks every job of this process, pruning old finished ones.
pub struct JobTracker {
    state: Mutex<HashMap<String, JobRecord>>,
    history_limit: usize,
}

impl Default for JobTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl JobTracker {
    pub fn new() -> Self {
        Self::with_history_limit(AppConfig::JOB_HISTORY_LIMIT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(HashMap::new()),
            history_limit,
        }
    }

    pub fn insert(&self, record: JobRecord) {
        let mut state = self.state.lock().expect("job lock poisoned");
        state.insert(record.job_id.clone(), record);
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        let state = self.state.lock().expect("job lock poisoned");
        state.get(job_id).cloned()
    }

    /// All tracked jobs, newest first.
    pub fn list_all(&self) -> Vec<JobRecord> {
        let state = self.state.lock().expect("job lock poisoned");
        let mut jobs: Vec<JobRecord> = state.values().cloned().collect();
        jobs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        jobs
    }

    /// Jobs still running.
    pub fn running(&self) -> Vec<JobRecord> {
        self.list_all()
            .into_iter()
            .filter(|j| j.status == JobStatus::Running)
            .collect()
    }

    /// Apply a trainer progress line.
    pub fn update_from_script(&self, job_id: &str, line: &ScriptProgressLine) {
        let mut state = self.state.lock().expect("job lock poisoned");
        let Some(job) = state.get_mut(job_id) else {
            return;
        };

        if line.message.is_some() {
            job.message = line.message.clone();
        }

        match line.stage.as_str() {
            "progress" => {
                if let Some(p) = line.progress {
                    job.progress = Some(p.clamp(0.0, 1.0));
                }
            }
            "epoch" => {
                job.epoch = line.epoch.or(job.epoch);
                job.total_epochs = line.total_epochs.or(job.total_epochs);
                if let (Some(epoch), Some(total)) = (job.epoch, job.total_epochs) {
                    if total > 0 {
                        job.progress = Some((epoch as f32 / total as f32).min(1.0));
                    }
                }
            }
            "complete" => {
                job.progress = Some(1.0);
            }
            "error" => {
                job.error = line.message.clone();
            }
            _ => {}
        }
    }

    /// Mark a job finished and prune history beyond the limit.
    pub fn finish(&self, job_id: &str, status: JobStatus, message: Option<String>) {
        let mut state = self.state.lock().expect("job lock poisoned");
        if let Some(job) = state.get_mut(job_id) {
            job.status = status;
            job.finished_at = Some(Utc::now());
            match status {
                JobStatus::Succeeded => {
                    job.progress = Some(1.0);
                    if message.is_some() {
                        job.message = message;
                    }
                }
                JobStatus::Failed | JobStatus::Cancelled => {
                    if job.error.is_none() {
                        job.error = message;
                    }
                }
                JobStatus::Running => {}
            }
        }
        Self::prune(&mut state, self.history_limit);
    }

    fn prune(state: &mut HashMap<String, JobRecord>, limit: usize) {
        let mut finished: Vec<(String, DateTime<Utc>)> = state
            .values()
            .filter(|j| j.status.is_finished())
            .map(|j| (j.job_id.clone(), j.finished_at.unwrap_or(j.started_at)))
            .collect();
        if finished.len() <= limit {
            return;
        }
        finished.sort_by(|a, b| a.1.cmp(&b.1));
        let excess = finished.len() - limit;
        for (job_id, _) in finished.into_iter().take(excess) {
            state.remove(&job_id);
        }
    }
}
