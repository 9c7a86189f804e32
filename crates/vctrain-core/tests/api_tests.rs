//! Integration tests for the TrainerApi public interface.
//!
//! The trainer entry point is replaced by a small shell script so the real
//! subprocess path (argument passing, progress lines, exit codes and
//! cancellation) is exercised without Python.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use vctrain_core::pipeline::{
    CheckpointPolicy, ExtractRequest, IndexRequest, ModelVersion, PreprocessRequest, ProjectName, SampleRate,
    TrainRequest,
};
use vctrain_core::{
    GpuSelection, JobStatus, PretrainedRole, PretrainedSource, StageStatus, TrainerApi,
    TrainerError,
};

const FAKE_TRAINER: &str = r#"
stage="$1"
shift
case "$stage" in
  preprocess)
    echo '{"stage":"progress","progress":0.5,"message":"slicing"}'
    echo '{"stage":"complete","message":"Model preprocessed successfully."}'
    ;;
  extract)
    echo "no audio slices found" >&2
    exit 3
    ;;
  train)
    if [ "$2" = "voice" ]; then
      echo '{"stage":"epoch","epoch":1,"total_epochs":2,"message":"epoch 1"}'
      exec sleep 30
    fi
    mkdir -p "logs/$2"
    for step in 1 2; do
      : > "logs/$2/G_$step.pth"
      : > "logs/$2/D_$step.pth"
    done
    : > "logs/$2/G_5.pth"
    echo '{"stage":"complete","message":"Training finished."}'
    ;;
  index)
    if [ "$2" = "noisy" ]; then
      printf 'caf\351\n'
      printf 'bad \377 stderr\n' >&2
      i=0
      while [ $i -lt 20000 ]; do
        echo "progress line $i"
        echo "warning line $i" >&2
        i=$((i + 1))
      done
      echo '{"stage":"complete","message":"Index built."}'
      exit 0
    fi
    echo "building index"
    for arg in "$@"; do echo "$arg"; done
    ;;
esac
"#;

struct TestEnv {
    temp: TempDir,
    api: Arc<TrainerApi>,
}

async fn create_test_env() -> TestEnv {
    let temp = TempDir::new().expect("Failed to create temp dir");
    let script = temp.path().join("fake_trainer.sh");
    std::fs::write(&script, FAKE_TRAINER).unwrap();

    let api = TrainerApi::builder(temp.path())
        .auto_create_dirs(true)
        .detect_gpus(false)
        .interpreter("sh")
        .core_script("fake_trainer.sh")
        .build()
        .await
        .unwrap();

    TestEnv {
        temp,
        api: Arc::new(api),
    }
}

fn write_file(path: &Path, contents: &[u8]) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
    path.to_path_buf()
}

fn project() -> ProjectName {
    ProjectName::new("voice").unwrap()
}

#[tokio::test]
async fn test_api_creation_fails_for_nonexistent_path() {
    let result = TrainerApi::new("/nonexistent/path/that/does/not/exist").await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_dataset_upload_then_listing() {
    let env = create_test_env().await;
    let upload = write_file(&env.temp.path().join("uploads/Take 1.WAV"), b"RIFF");

    let outcome = env
        .api
        .add_dataset_files(vec![upload], "My Voice!".into())
        .await
        .unwrap();

    assert_eq!(outcome.dataset_path.as_deref(), Some("assets/datasets/my_voice"));
    assert_eq!(env.api.list_datasets(), vec!["assets/datasets/my_voice"]);
}

#[tokio::test]
async fn test_pretrained_upload_and_refresh() {
    let env = create_test_env().await;
    let g = write_file(&env.temp.path().join("uploads/myvoice_G.pth"), b"g");
    let d = write_file(&env.temp.path().join("uploads/myvoice_D.pth"), b"d");
    let junk = write_file(&env.temp.path().join("uploads/notes.txt"), b"x");

    let stored = env.api.upload_pretrained(g).await.unwrap();
    assert_eq!(stored.role, Some(PretrainedRole::Generator));
    env.api.upload_pretrained(d).await.unwrap();

    let rejected = env.api.upload_pretrained(junk.clone()).await.unwrap();
    assert!(rejected.stored_path.is_none());
    assert!(junk.exists());

    let lists = env.api.refresh_pretrained();
    assert_eq!(lists.generators.len(), 1);
    assert_eq!(lists.discriminators.len(), 1);
    assert_eq!(
        env.api.list_pretrained(PretrainedRole::Generator),
        lists.generators
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_preprocess_runs_trainer_script() {
    let env = create_test_env().await;
    std::fs::create_dir_all(env.temp.path().join("assets/datasets/voice")).unwrap();

    let report = env
        .api
        .preprocess_dataset(PreprocessRequest {
            model_name: project(),
            dataset_path: "assets/datasets/voice".into(),
            sample_rate: SampleRate::Hz40000,
        })
        .await
        .unwrap();

    assert_eq!(report.status, StageStatus::Succeeded);
    assert_eq!(report.message, "Model preprocessed successfully.");
    let job = env.api.get_job(&report.job_id).unwrap();
    assert_eq!(job.status, JobStatus::Succeeded);
    assert_eq!(job.progress, Some(1.0));
}

#[cfg(unix)]
#[tokio::test]
async fn test_failing_stage_reports_stderr() {
    let env = create_test_env().await;

    let report = env
        .api
        .extract_features(ExtractRequest {
            model_name: project(),
            version: ModelVersion::V2,
            f0_method: Default::default(),
            hop_length: Default::default(),
            sample_rate: SampleRate::Hz40000,
        })
        .await
        .unwrap();

    assert_eq!(report.status, StageStatus::Failed);
    assert_eq!(report.message, "no audio slices found");
    assert_eq!(
        env.api.get_job(&report.job_id).unwrap().status,
        JobStatus::Failed
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_index_receives_cli_arguments() {
    let env = create_test_env().await;

    let report = env
        .api
        .generate_index(IndexRequest {
            model_name: project(),
            version: ModelVersion::V1,
        })
        .await
        .unwrap();

    assert!(report.succeeded());
    assert_eq!(
        report.output,
        vec!["building index", "--model_name", "voice", "--rvc_version", "v1"]
    );
}

#[cfg(unix)]
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_training_can_be_cancelled() {
    let env = create_test_env().await;

    let training = {
        let api = Arc::clone(&env.api);
        tokio::spawn(async move {
            api.start_training(TrainRequest {
                model_name: project(),
                version: ModelVersion::V2,
                checkpoints: Default::default(),
                total_epochs: 2,
                sample_rate: SampleRate::Hz40000,
                batch_size: 4,
                gpus: GpuSelection::default(),
                pitch_guidance: true,
                pretrained: PretrainedSource::Default,
                resolved_pretrained: None,
            })
            .await
        })
    };

    // Wait for the epoch line so the process is definitely running.
    let mut job_id = None;
    for _ in 0..200 {
        if let Some(job) = env.api.list_jobs().into_iter().find(|j| j.epoch == Some(1)) {
            job_id = Some(job.job_id);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let job_id = job_id.expect("training job never reported an epoch");

    // A second run on the same project is refused while training.
    let busy = env
        .api
        .generate_index(IndexRequest {
            model_name: project(),
            version: ModelVersion::V2,
        })
        .await;
    assert!(matches!(busy, Err(TrainerError::ProjectBusy { .. })));

    assert!(env.api.cancel_job(&job_id).unwrap());
    let result = tokio::time::timeout(Duration::from_secs(10), training)
        .await
        .expect("cancellation should stop the trainer")
        .unwrap();

    assert!(matches!(result, Err(TrainerError::Cancelled)));
    assert_eq!(
        env.api.get_job(&job_id).unwrap().status,
        JobStatus::Cancelled
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_stage_survives_invalid_utf8_output() {
    let env = create_test_env().await;

    let report = tokio::time::timeout(
        Duration::from_secs(60),
        env.api.generate_index(IndexRequest {
            model_name: ProjectName::new("noisy").unwrap(),
            version: ModelVersion::V2,
        }),
    )
    .await
    .expect("stage should finish despite undecodable output")
    .unwrap();

    assert_eq!(report.status, StageStatus::Succeeded);
    assert_eq!(report.message, "Index built.");
    assert!(report.output.iter().any(|l| l == "warning line 19999"));
    assert_eq!(
        env.api.get_job(&report.job_id).unwrap().status,
        JobStatus::Succeeded
    );

    // The project slot is free again.
    let again = env
        .api
        .generate_index(IndexRequest {
            model_name: ProjectName::new("noisy").unwrap(),
            version: ModelVersion::V1,
        })
        .await;
    assert!(again.is_ok());
}

#[cfg(unix)]
#[tokio::test]
async fn test_training_reports_planned_checkpoints() {
    let env = create_test_env().await;

    let report = env
        .api
        .start_training(TrainRequest {
            model_name: ProjectName::new("quick").unwrap(),
            version: ModelVersion::V2,
            checkpoints: CheckpointPolicy {
                save_every_epoch: 1,
                save_only_latest: false,
                save_every_weights: false,
            },
            total_epochs: 3,
            sample_rate: SampleRate::Hz40000,
            batch_size: 4,
            gpus: GpuSelection::default(),
            pitch_guidance: true,
            pretrained: PretrainedSource::None,
            resolved_pretrained: None,
        })
        .await
        .unwrap();

    assert!(report.succeeded());
    // Save points 1, 2 and 3; the trainer only wrote the first two, and G_5
    // is not part of the plan.
    assert_eq!(
        report.checkpoints,
        vec!["G_1.pth", "D_1.pth", "G_2.pth", "D_2.pth"]
    );
}

#[tokio::test]
async fn test_missing_entry_point_is_a_pipeline_error() {
    let temp = TempDir::new().unwrap();
    let api = TrainerApi::builder(temp.path())
        .auto_create_dirs(true)
        .detect_gpus(false)
        .core_script("does_not_exist.py")
        .build()
        .await
        .unwrap();

    let result = api
        .generate_index(IndexRequest {
            model_name: project(),
            version: ModelVersion::V2,
        })
        .await;

    assert!(matches!(result, Err(TrainerError::PipelineFailed { .. })));
    assert_eq!(api.list_jobs()[0].status, JobStatus::Failed);
}

#[tokio::test]
async fn test_project_info_after_outputs_appear() {
    let env = create_test_env().await;
    let dir = env.temp.path().join("logs/voice");
    std::fs::create_dir_all(dir.join("sliced_audios")).unwrap();
    write_file(&dir.join("G_10.pth"), b"");

    assert_eq!(env.api.list_projects().unwrap(), vec!["voice"]);
    let info = env.api.project_info("voice").unwrap();
    assert!(info.preprocessed);
    assert_eq!(info.checkpoints, vec!["G_10.pth"]);

    assert!(matches!(
        env.api.project_info("../escape"),
        Err(TrainerError::Validation { .. })
    ));
}
