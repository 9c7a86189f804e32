//! Checkpoint cadence and retention policy for training runs.
//!
//! The trainer consults the plan at the end of every epoch. Save points are
//! every `save_every_epoch`-th epoch plus the final epoch.

use serde::{Deserialize, Serialize};

use crate::config::TrainingDefaults;
use crate::error::{Result, TrainerError};

/// Step number the trainer uses for the overwritten "latest" checkpoint.
pub const LATEST_CHECKPOINT_STEP: u32 = 2_333_333;

/// Cadence plus the three retention toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointPolicy {
    pub save_every_epoch: u32,
    /// Keep a single G/D checkpoint pair, overwritten at each save point.
    pub save_only_latest: bool,
    /// Export inference weights at every save point, not only at the end.
    pub save_every_weights: bool,
}

impl Default for CheckpointPolicy {
    fn default() -> Self {
        Self {
            save_every_epoch: TrainingDefaults::SAVE_EVERY_EPOCH_DEFAULT,
            save_only_latest: false,
            save_every_weights: true,
        }
    }
}

/// Name of the G/D checkpoint written at a save point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointTag {
    Latest,
    Epoch(u32),
}

impl CheckpointTag {
    /// Generator and discriminator filenames for this tag.
    pub fn file_names(&self) -> (String, String) {
        let step = match self {
            CheckpointTag::Latest => LATEST_CHECKPOINT_STEP,
            CheckpointTag::Epoch(epoch) => *epoch,
        };
        (format!("G_{step}.pth"), format!("D_{step}.pth"))
    }
}

/// What to persist at the end of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointPlan {
    /// G/D checkpoint to write, if any.
    pub checkpoint: Option<CheckpointTag>,
    pub export_weights: bool,
}

impl CheckpointPolicy {
    pub fn validate(&self) -> Result<()> {
        let range =
            TrainingDefaults::SAVE_EVERY_EPOCH_MIN..=TrainingDefaults::SAVE_EVERY_EPOCH_MAX;
        if !range.contains(&self.save_every_epoch) {
            return Err(TrainerError::validation(
                "save_every_epoch",
                format!(
                    "must be between {} and {}, got {}",
                    range.start(),
                    range.end(),
                    self.save_every_epoch
                ),
            ));
        }
        Ok(())
    }

    /// Whether `epoch` (1-based) is a save point in a run of `total_epochs`.
    pub fn is_save_point(&self, epoch: u32, total_epochs: u32) -> bool {
        epoch > 0
            && epoch <= total_epochs
            && (epoch % self.save_every_epoch.max(1) == 0 || epoch == total_epochs)
    }

    /// Plan the end-of-epoch writes for `epoch` (1-based).
    pub fn plan(&self, epoch: u32, total_epochs: u32) -> CheckpointPlan {
        if !self.is_save_point(epoch, total_epochs) {
            return CheckpointPlan {
                checkpoint: None,
                export_weights: false,
            };
        }

        let tag = if self.save_only_latest {
            CheckpointTag::Latest
        } else {
            CheckpointTag::Epoch(epoch)
        };

        CheckpointPlan {
            checkpoint: Some(tag),
            export_weights: self.save_every_weights || epoch == total_epochs,
        }
    }

    /// All save points of a run, ascending.
    pub fn save_points(&self, total_epochs: u32) -> Vec<u32> {
        (1..=total_epochs)
            .filter(|&epoch| self.is_save_point(epoch, total_epochs))
            .collect()
    }

    /// G/D checkpoint files a completed run leaves in the project directory,
    /// in save-point order, generator first.
    pub fn expected_checkpoints(&self, total_epochs: u32) -> Vec<String> {
        let mut files = Vec::new();
        for epoch in self.save_points(total_epochs) {
            let Some(tag) = self.plan(epoch, total_epochs).checkpoint else {
                continue;
            };
            let (g, d) = tag.file_names();
            if !files.contains(&g) {
                files.push(g);
                files.push(d);
            }
        }
        files
    }
}
