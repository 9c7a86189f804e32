//! Centralized configuration for vctrain.
//!
//! This module provides the workspace directory layout, the accepted ranges for
//! training parameters, and the settings used to launch the external trainer.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    /// Number of finished jobs kept in memory for inspection.
    pub const JOB_HISTORY_LIMIT: usize = 64;
}

/// Workspace directory layout, relative to the workspace root.
pub struct PathsConfig;

impl PathsConfig {
    pub const ASSETS_DIR_NAME: &'static str = "assets";
    pub const DATASETS_DIR_NAME: &'static str = "datasets";
    pub const RVC_DIR_NAME: &'static str = "rvc";
    pub const PRETRAINEDS_DIR_NAME: &'static str = "pretraineds";
    pub const PRETRAINEDS_CUSTOM_DIR_NAME: &'static str = "pretraineds_custom";
    pub const LOGS_DIR_NAME: &'static str = "logs";

    /// Extension of pretrained weight files.
    pub const PRETRAINED_EXTENSION: &'static str = "pth";
    /// Extension of similarity index files produced by the index stage.
    pub const INDEX_EXTENSION: &'static str = "index";
}

/// Audio containers accepted into a dataset (compared case-insensitively).
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[
    "wav", "mp3", "flac", "ogg", "opus", "m4a", "mp4", "aac", "alac", "wma", "aiff", "webm",
    "ac3",
];

/// Check whether a file extension (without the dot) is a supported audio container.
pub fn is_supported_audio_extension(ext: &str) -> bool {
    let ext = ext.to_ascii_lowercase();
    SUPPORTED_AUDIO_EXTENSIONS.contains(&ext.as_str())
}

/// Accepted ranges and defaults for training parameters.
pub struct TrainingDefaults;

impl TrainingDefaults {
    pub const HOP_LENGTH_MIN: u16 = 1;
    pub const HOP_LENGTH_MAX: u16 = 512;
    pub const HOP_LENGTH_DEFAULT: u16 = 128;

    pub const BATCH_SIZE_MIN: u32 = 1;
    pub const BATCH_SIZE_MAX: u32 = 50;
    /// Batch size used when no GPU is detected.
    pub const BATCH_SIZE_FALLBACK: u32 = 8;

    pub const SAVE_EVERY_EPOCH_MIN: u32 = 1;
    pub const SAVE_EVERY_EPOCH_MAX: u32 = 100;
    pub const SAVE_EVERY_EPOCH_DEFAULT: u32 = 10;

    pub const TOTAL_EPOCH_MIN: u32 = 1;
    pub const TOTAL_EPOCH_MAX: u32 = 10_000;
    pub const TOTAL_EPOCH_DEFAULT: u32 = 500;

    pub const DEFAULT_GPUS: &'static str = "0";
}

/// Settings for launching the external trainer CLI.
pub struct ScriptConfig;

impl ScriptConfig {
    /// Interpreter used when none is configured.
    pub const DEFAULT_INTERPRETER: &'static str = "python";
    /// Trainer entry point, relative to the workspace root.
    pub const DEFAULT_CORE_SCRIPT: &'static str = "core.py";
    /// How long a cancelled child gets before the kill is awaited.
    pub const KILL_TIMEOUT: Duration = Duration::from_secs(5);
    /// Maximum number of output lines kept in a stage report.
    pub const MAX_CAPTURED_LINES: usize = 200;
}
