//! Pipeline backed by the external trainer CLI.
//!
//! Every stage runs `<interpreter> <core_script> <stage> --flag value ...`
//! from the workspace root. The trainer may print JSON progress lines on
//! stdout; anything else is captured as plain output.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::jobs::ScriptProgressLine;
use super::types::{
    ExtractRequest, IndexRequest, PipelineStage, PreprocessRequest, StageReport, StageStatus,
    TrainRequest,
};
use super::{StageContext, TrainingPipeline};
use crate::config::ScriptConfig;
use crate::error::{Result, TrainerError};
use crate::fsops::resolve_under;

/// Runs pipeline stages through the trainer's command-line entry point.
#[derive(Debug, Clone)]
pub struct ScriptPipeline {
    workspace_root: PathBuf,
    interpreter: PathBuf,
    core_script: PathBuf,
}

fn py_bool(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

impl ScriptPipeline {
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            interpreter: PathBuf::from(ScriptConfig::DEFAULT_INTERPRETER),
            core_script: PathBuf::from(ScriptConfig::DEFAULT_CORE_SCRIPT),
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl Into<PathBuf>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    /// Entry point script, relative to the workspace root or absolute.
    pub fn with_core_script(mut self, core_script: impl Into<PathBuf>) -> Self {
        self.core_script = core_script.into();
        self
    }

    pub fn script_path(&self) -> PathBuf {
        resolve_under(&self.workspace_root, &self.core_script)
    }

    pub fn preprocess_args(request: &PreprocessRequest) -> Vec<String> {
        vec![
            PipelineStage::Preprocess.to_string(),
            "--model_name".into(),
            request.model_name.to_string(),
            "--dataset_path".into(),
            request.dataset_path.clone(),
            "--sampling_rate".into(),
            request.sample_rate.hz().to_string(),
        ]
    }

    pub fn extract_args(request: &ExtractRequest) -> Vec<String> {
        vec![
            PipelineStage::Extract.to_string(),
            "--model_name".into(),
            request.model_name.to_string(),
            "--rvc_version".into(),
            request.version.to_string(),
            "--f0method".into(),
            request.f0_method.as_str().into(),
            "--hop_length".into(),
            request.hop_length.get().to_string(),
            "--sampling_rate".into(),
            request.sample_rate.hz().to_string(),
        ]
    }

    pub fn train_args(request: &TrainRequest) -> Vec<String> {
        let mut args = vec![
            PipelineStage::Train.to_string(),
            "--model_name".into(),
            request.model_name.to_string(),
            "--rvc_version".into(),
            request.version.to_string(),
            "--save_every_epoch".into(),
            request.checkpoints.save_every_epoch.to_string(),
            "--save_only_latest".into(),
            py_bool(request.checkpoints.save_only_latest),
            "--save_every_weights".into(),
            py_bool(request.checkpoints.save_every_weights),
            "--total_epoch".into(),
            request.total_epochs.to_string(),
            "--sampling_rate".into(),
            request.sample_rate.hz().to_string(),
            "--batch_size".into(),
            request.batch_size.to_string(),
            "--gpu".into(),
            request.gpus.to_string(),
            "--pitch_guidance".into(),
            py_bool(request.pitch_guidance),
            "--pretrained".into(),
            py_bool(request.uses_pretrained()),
            "--custom_pretrained".into(),
            py_bool(request.uses_custom_pretrained()),
        ];

        if let Some(pair) = &request.resolved_pretrained {
            args.push("--g_pretrained_path".into());
            args.push(pair.generator.to_string_lossy().into_owned());
            args.push("--d_pretrained_path".into());
            args.push(pair.discriminator.to_string_lossy().into_owned());
        }

        args
    }

    pub fn index_args(request: &IndexRequest) -> Vec<String> {
        vec![
            PipelineStage::Index.to_string(),
            "--model_name".into(),
            request.model_name.to_string(),
            "--rvc_version".into(),
            request.version.to_string(),
        ]
    }

    async fn run(
        &self,
        stage: PipelineStage,
        project: &str,
        args: Vec<String>,
        ctx: &StageContext,
    ) -> Result<StageReport> {
        let script = self.script_path();
        if !script.is_file() {
            return Err(TrainerError::PipelineFailed {
                stage,
                message: format!("Trainer entry point not found: {}", script.display()),
            });
        }

        info!(
            "Starting {} for project {} (job {})",
            stage,
            project,
            ctx.job_id()
        );
        debug!("{} {} {}", self.interpreter.display(), script.display(), args.join(" "));

        let mut child = Command::new(&self.interpreter)
            .arg(&script)
            .args(&args)
            .current_dir(&self.workspace_root)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TrainerError::PipelineFailed {
                stage,
                message: format!(
                    "Failed to start {}: {e}",
                    self.interpreter.display()
                ),
            })?;

        let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
            terminate(&mut child).await;
            return Err(TrainerError::PipelineFailed {
                stage,
                message: "Trainer output was not captured".into(),
            });
        };

        let stderr_task = tokio::spawn(collect_tail(stderr, ScriptConfig::MAX_CAPTURED_LINES));
        let mut reader = BufReader::new(stdout);
        let mut line_buf = Vec::new();
        let mut output = VecDeque::new();
        let mut complete_message = None;
        let mut error_message = None;

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancel_token().cancelled() => {
                    warn!("Cancelling {} job {}", stage, ctx.job_id());
                    terminate(&mut child).await;
                    stderr_task.abort();
                    return Err(TrainerError::Cancelled);
                }
                line = read_lossy_line(&mut reader, &mut line_buf) => match line {
                    Ok(Some(line)) => {
                        match serde_json::from_str::<ScriptProgressLine>(&line) {
                            Ok(progress) => {
                                ctx.report(&progress);
                                match progress.stage.as_str() {
                                    "complete" => complete_message = progress.message.clone(),
                                    "error" => error_message = progress.message.clone(),
                                    _ => {}
                                }
                                if let Some(message) = progress.message {
                                    push_capped(&mut output, message);
                                }
                            }
                            Err(_) => {
                                debug!("[{}] {}", stage, line);
                                push_capped(&mut output, line);
                            }
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Error reading trainer output: {}", e);
                        terminate(&mut child).await;
                        stderr_task.abort();
                        return Err(TrainerError::PipelineFailed {
                            stage,
                            message: format!("Lost trainer output: {e}"),
                        });
                    }
                },
            }
        }

        let status = tokio::select! {
            status = child.wait() => Some(status),
            _ = ctx.cancel_token().cancelled() => None,
        };
        let Some(status) = status else {
            terminate(&mut child).await;
            stderr_task.abort();
            return Err(TrainerError::Cancelled);
        };
        let status = status.map_err(|e| TrainerError::PipelineFailed {
            stage,
            message: format!("Trainer process error: {e}"),
        })?;

        let captured = CapturedRun {
            stdout: output,
            stderr: stderr_task.await.unwrap_or_default(),
            complete_message,
            error_message,
        };
        Ok(build_report(stage, project, ctx.job_id(), status, captured))
    }
}

/// What the trainer said during one run.
struct CapturedRun {
    stdout: VecDeque<String>,
    stderr: Vec<String>,
    complete_message: Option<String>,
    error_message: Option<String>,
}

fn build_report(
    stage: PipelineStage,
    project: &str,
    job_id: &str,
    status: ExitStatus,
    captured: CapturedRun,
) -> StageReport {
    let CapturedRun {
        stdout,
        stderr,
        complete_message,
        error_message,
    } = captured;
    let succeeded = status.success() && error_message.is_none();

    let message = if succeeded {
        complete_message
            .or_else(|| stdout.iter().rev().find(|l| !l.trim().is_empty()).cloned())
            .unwrap_or_else(|| format!("{stage} finished for {project}"))
    } else {
        error_message
            .or_else(|| stderr.iter().rev().find(|l| !l.trim().is_empty()).cloned())
            .unwrap_or_else(|| format!("Trainer exited with {status}"))
    };

    if succeeded {
        info!("{} finished for project {}", stage, project);
    } else {
        warn!("{} failed for project {}: {}", stage, project, message);
    }

    let mut output: Vec<String> = stdout.into_iter().chain(stderr).collect();
    if output.len() > ScriptConfig::MAX_CAPTURED_LINES {
        output.drain(..output.len() - ScriptConfig::MAX_CAPTURED_LINES);
    }

    StageReport {
        job_id: job_id.to_string(),
        stage,
        project: project.to_string(),
        status: if succeeded {
            StageStatus::Succeeded
        } else {
            StageStatus::Failed
        },
        message,
        output,
        checkpoints: Vec::new(),
    }
}

fn push_capped(lines: &mut VecDeque<String>, line: String) {
    if lines.len() == ScriptConfig::MAX_CAPTURED_LINES {
        lines.pop_front();
    }
    lines.push_back(line);
}

/// Read one `\n`-terminated line, replacing invalid UTF-8.
///
/// Partial reads stay in `buf`, so a call dropped inside `select!` resumes
/// where it stopped.
async fn read_lossy_line<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<String>> {
    let read = reader.read_until(b'\n', buf).await?;
    if read == 0 && buf.is_empty() {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf)
        .trim_end_matches(['\n', '\r'])
        .to_string();
    buf.clear();
    Ok(Some(line))
}

async fn collect_tail<R: AsyncRead + Unpin>(reader: R, limit: usize) -> Vec<String> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut tail = VecDeque::with_capacity(limit.min(64));
    loop {
        match read_lossy_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                if tail.len() == limit {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            Ok(None) => break,
            Err(e) => {
                // Dropping the reader closes the pipe so the child cannot block on it.
                warn!("Error reading trainer stderr: {}", e);
                break;
            }
        }
    }
    tail.into()
}

async fn terminate(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("Trainer process already gone: {}", e);
        return;
    }
    if tokio::time::timeout(ScriptConfig::KILL_TIMEOUT, child.wait())
        .await
        .is_err()
    {
        warn!("Trainer process did not exit after kill");
    }
}

#[async_trait]
impl TrainingPipeline for ScriptPipeline {
    async fn preprocess(
        &self,
        request: &PreprocessRequest,
        ctx: &StageContext,
    ) -> Result<StageReport> {
        let args = Self::preprocess_args(request);
        self.run(PipelineStage::Preprocess, request.model_name.as_str(), args, ctx)
            .await
    }

    async fn extract(&self, request: &ExtractRequest, ctx: &StageContext) -> Result<StageReport> {
        let args = Self::extract_args(request);
        self.run(PipelineStage::Extract, request.model_name.as_str(), args, ctx)
            .await
    }

    async fn train(&self, request: &TrainRequest, ctx: &StageContext) -> Result<StageReport> {
        let args = Self::train_args(request);
        self.run(PipelineStage::Train, request.model_name.as_str(), args, ctx)
            .await
    }

    async fn build_index(
        &self,
        request: &IndexRequest,
        ctx: &StageContext,
    ) -> Result<StageReport> {
        let args = Self::index_args(request);
        self.run(PipelineStage::Index, request.model_name.as_str(), args, ctx)
            .await
    }
}
