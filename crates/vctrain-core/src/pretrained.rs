//! Pretrained generator/discriminator weights.
//!
//! Custom uploads live in `<root>/rvc/pretraineds/pretraineds_custom/`; the
//! bundled defaults in `<root>/rvc/pretraineds/pretrained_<version>/`.
//!
//! A file's role comes from its stem, split on `_`, `-`, `.` and spaces:
//! - a token that is exactly `G` / `D` (`G_2333333.pth`)
//! - a token in the bundled form `f0G40k` / `D48k`
//! - a stem ending in an uppercase `G` / `D` after a non-uppercase character
//!   (`myvoiceG.pth`)
//!
//! A stem carrying both roles is ambiguous and belongs to neither list.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::PathsConfig;
use crate::error::{Result, TrainerError};
use crate::fsops::{move_file_overwrite, relative_display, resolve_under};
use crate::naming::file_extension;
use crate::notice::Notice;
use crate::pipeline::{ModelVersion, SampleRate};

static BUNDLED_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:f0)?([GD])\d+k$").unwrap());

/// Role of a pretrained weight file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PretrainedRole {
    #[serde(rename = "G", alias = "generator")]
    Generator,
    #[serde(rename = "D", alias = "discriminator")]
    Discriminator,
}

impl PretrainedRole {
    pub fn marker(&self) -> char {
        match self {
            PretrainedRole::Generator => 'G',
            PretrainedRole::Discriminator => 'D',
        }
    }

    pub fn from_marker(s: &str) -> Option<Self> {
        match s {
            "G" | "g" | "generator" => Some(PretrainedRole::Generator),
            "D" | "d" | "discriminator" => Some(PretrainedRole::Discriminator),
            _ => None,
        }
    }

    fn other(&self) -> Self {
        match self {
            PretrainedRole::Generator => PretrainedRole::Discriminator,
            PretrainedRole::Discriminator => PretrainedRole::Generator,
        }
    }
}

impl std::fmt::Display for PretrainedRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.marker())
    }
}

fn stem_has_role(stem: &str, role: PretrainedRole) -> bool {
    let marker = role.marker();

    let by_token = stem
        .split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .any(|token| {
            if token.len() == 1 && token.starts_with(marker) {
                return true;
            }
            BUNDLED_TOKEN
                .captures(token)
                .and_then(|caps| caps.get(1))
                .is_some_and(|m| m.as_str().starts_with(marker))
        });
    if by_token {
        return true;
    }

    let mut chars = stem.chars().rev();
    match (chars.next(), chars.next()) {
        (Some(last), Some(prev)) => last == marker && !prev.is_ascii_uppercase(),
        _ => false,
    }
}

/// Detect the role of a pretrained file from its name.
///
/// Returns `None` for non-`.pth` files, files with no role marker, and
/// ambiguous names that carry both markers.
pub fn detect_role(file_name: &str) -> Option<PretrainedRole> {
    let path = Path::new(file_name);
    if file_extension(file_name).as_deref() != Some(PathsConfig::PRETRAINED_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;

    let generator = stem_has_role(stem, PretrainedRole::Generator);
    let discriminator = stem_has_role(stem, PretrainedRole::Discriminator);
    match (generator, discriminator) {
        (true, false) => Some(PretrainedRole::Generator),
        (false, true) => Some(PretrainedRole::Discriminator),
        _ => None,
    }
}

/// A generator/discriminator weight pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PretrainedPair {
    pub generator: PathBuf,
    pub discriminator: PathBuf,
}

/// Where a training run takes its initial weights from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PretrainedSource {
    /// Train from scratch.
    None,
    /// Bundled pair matching version, sample rate and pitch guidance.
    #[default]
    Default,
    /// User-selected files, relative to the workspace root or absolute.
    Custom {
        generator: String,
        discriminator: String,
    },
}

/// Both pretrained lists at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PretrainedLists {
    pub generators: Vec<String>,
    pub discriminators: Vec<String>,
}

/// Result of accepting a pretrained upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadOutcome {
    /// Stored file relative to the workspace root; `None` when rejected.
    pub stored_path: Option<String>,
    pub role: Option<PretrainedRole>,
    pub notices: Vec<Notice>,
}

/// Lists, accepts and resolves pretrained weight files.
#[derive(Debug, Clone)]
pub struct PretrainedRegistry {
    workspace_root: PathBuf,
    pretraineds_root: PathBuf,
    custom_root: PathBuf,
}

impl PretrainedRegistry {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        let pretraineds_root = workspace_root
            .join(PathsConfig::RVC_DIR_NAME)
            .join(PathsConfig::PRETRAINEDS_DIR_NAME);
        let custom_root = pretraineds_root.join(PathsConfig::PRETRAINEDS_CUSTOM_DIR_NAME);
        Self {
            workspace_root,
            pretraineds_root,
            custom_root,
        }
    }

    /// Absolute path of the custom upload directory.
    pub fn custom_root(&self) -> &Path {
        &self.custom_root
    }

    /// List custom pretrained files carrying `role`, sorted.
    pub fn list_pretrained(&self, role: PretrainedRole) -> Vec<String> {
        if !self.custom_root.is_dir() {
            return Vec::new();
        }

        WalkDir::new(&self.custom_root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .and_then(detect_role)
                    .is_some_and(|r| r == role)
            })
            .map(|e| relative_display(&self.workspace_root, e.path()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Generator and discriminator lists in one call.
    pub fn refresh(&self) -> PretrainedLists {
        PretrainedLists {
            generators: self.list_pretrained(PretrainedRole::Generator),
            discriminators: self.list_pretrained(PretrainedRole::Discriminator),
        }
    }

    /// Move an uploaded `.pth` file into the custom directory.
    ///
    /// Anything else is rejected with a notice and the custom directory is
    /// left untouched. A same-named file is overwritten.
    pub fn accept_upload(&self, file: impl AsRef<Path>) -> Result<UploadOutcome> {
        let file = file.as_ref();
        let mut outcome = UploadOutcome::default();

        let file_name = file.file_name().and_then(|n| n.to_str());
        let is_pth = file_name
            .and_then(file_extension)
            .is_some_and(|ext| ext == PathsConfig::PRETRAINED_EXTENSION);
        let Some(file_name) = file_name.filter(|_| is_pth) else {
            outcome.notices.push(Notice::warning(
                "The file you dropped is not a valid pretrained file. Please try again.",
            ));
            return Ok(outcome);
        };

        if !file.is_file() {
            outcome.notices.push(Notice::warning(format!(
                "Uploaded file not found: {}",
                file.display()
            )));
            return Ok(outcome);
        }

        let destination = self.custom_root.join(file_name);
        move_file_overwrite(file, &destination)?;
        info!(
            "Stored pretrained upload {} at {}",
            file.display(),
            destination.display()
        );

        outcome.role = detect_role(file_name);
        if outcome.role.is_none() {
            outcome.notices.push(Notice::warning(format!(
                "{} has no G/D role marker and will not appear in either list.",
                file_name
            )));
        }
        outcome.stored_path = Some(relative_display(&self.workspace_root, &destination));
        outcome.notices.push(Notice::info(
            "Click the refresh button to see the pretrained file in the dropdown menu.",
        ));
        Ok(outcome)
    }

    /// The bundled pair for a version, sample rate and pitch-guidance setting.
    ///
    /// e.g. `rvc/pretraineds/pretrained_v2/f0G40k.pth`.
    pub fn default_pair(
        &self,
        version: ModelVersion,
        sample_rate: SampleRate,
        pitch_guidance: bool,
    ) -> PretrainedPair {
        let dir = self
            .pretraineds_root
            .join(format!("pretrained_{}", version.as_str()));
        let prefix = if pitch_guidance { "f0" } else { "" };
        let khz = sample_rate.khz();
        PretrainedPair {
            generator: dir.join(format!("{prefix}G{khz}k.pth")),
            discriminator: dir.join(format!("{prefix}D{khz}k.pth")),
        }
    }

    /// Turn a [`PretrainedSource`] into concrete paths.
    ///
    /// Custom files must exist, be `.pth`, and carry the role they are used
    /// for. Bundled defaults are not checked for existence; the trainer
    /// fetches missing prerequisites itself.
    pub fn resolve(
        &self,
        source: &PretrainedSource,
        version: ModelVersion,
        sample_rate: SampleRate,
        pitch_guidance: bool,
    ) -> Result<Option<PretrainedPair>> {
        match source {
            PretrainedSource::None => Ok(None),
            PretrainedSource::Default => {
                let pair = self.default_pair(version, sample_rate, pitch_guidance);
                if !pair.generator.is_file() || !pair.discriminator.is_file() {
                    warn!(
                        "Bundled pretrained pair not present yet: {}, {}",
                        pair.generator.display(),
                        pair.discriminator.display()
                    );
                }
                Ok(Some(pair))
            }
            PretrainedSource::Custom {
                generator,
                discriminator,
            } => Ok(Some(PretrainedPair {
                generator: self.check_custom(generator, PretrainedRole::Generator)?,
                discriminator: self.check_custom(discriminator, PretrainedRole::Discriminator)?,
            })),
        }
    }

    fn check_custom(&self, path: &str, role: PretrainedRole) -> Result<PathBuf> {
        let resolved = resolve_under(&self.workspace_root, path);

        let problem = if !resolved.is_file() {
            Some("file does not exist".to_string())
        } else {
            let file_name = resolved
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            match detect_role(file_name) {
                Some(found) if found == role => None,
                Some(_) => Some(format!(
                    "expected a {} file, found a {} file",
                    role,
                    role.other()
                )),
                None => Some(format!("not a .pth file with a {} role marker", role)),
            }
        };

        match problem {
            None => Ok(resolved),
            Some(message) => Err(TrainerError::InvalidPretrained {
                path: resolved,
                message,
            }),
        }
    }
}
