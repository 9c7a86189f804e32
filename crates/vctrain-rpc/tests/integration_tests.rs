//! Integration tests for the vctrain-rpc JSON-RPC server.
//!
//! Each test starts the real binary against a temporary workspace. The trainer
//! entry point is a shell script run through `sh`, so stage calls exercise the
//! full subprocess path without Python.

use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncBufReadExt;

const FAKE_TRAINER: &str = r#"
stage="$1"
case "$stage" in
  preprocess)
    echo '{"stage":"progress","progress":0.5,"message":"slicing"}'
    echo '{"stage":"complete","message":"Model preprocessed successfully."}'
    ;;
  extract)
    echo '{"stage":"error","message":"no audio slices found"}'
    exit 1
    ;;
  *)
    echo "done"
    ;;
esac
"#;

/// Create a temporary workspace holding the fake trainer script.
fn create_test_env() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    std::fs::write(temp_dir.path().join("fake_trainer.sh"), FAKE_TRAINER).unwrap();
    temp_dir
}

fn write_upload(root: &Path, name: &str) -> PathBuf {
    let dir = root.join("uploads");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, b"data").unwrap();
    path
}

/// Make an RPC call to the server.
async fn rpc_call(port: u16, method: &str, params: Value) -> Result<Value, String> {
    let json = rpc_call_raw(port, method, params).await?;
    if let Some(error) = json.get("error") {
        return Err(error.to_string());
    }
    Ok(json.get("result").cloned().unwrap_or(Value::Null))
}

/// Make an RPC call and return the full JSON-RPC payload.
async fn rpc_call_raw(port: u16, method: &str, params: Value) -> Result<Value, String> {
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://127.0.0.1:{}/rpc", port))
        .json(&json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    response.json::<Value>().await.map_err(|e| e.to_string())
}

fn error_code(payload: &Value) -> Option<i64> {
    payload.get("error")?.get("code")?.as_i64()
}

/// Check health endpoint.
async fn check_health(port: u16) -> bool {
    let client = reqwest::Client::new();
    if let Ok(response) = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
    {
        if let Ok(json) = response.json::<Value>().await {
            return json.get("status").and_then(|v| v.as_str()) == Some("ok");
        }
    }
    false
}

/// Wait for server to be ready.
async fn wait_for_server(port: u16, timeout_secs: u64) -> bool {
    let start = std::time::Instant::now();
    while start.elapsed() < Duration::from_secs(timeout_secs) {
        if check_health(port).await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

struct RpcServerHandle {
    child: tokio::process::Child,
    port: u16,
    stdout_drain: Option<tokio::task::JoinHandle<()>>,
}

impl RpcServerHandle {
    async fn stop(mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.kill().await;
        let _ = self.child.wait().await;
    }
}

impl Drop for RpcServerHandle {
    fn drop(&mut self) {
        if let Some(drain) = self.stdout_drain.take() {
            drain.abort();
        }
        let _ = self.child.start_kill();
    }
}

/// Start the RPC binary and wait until `/health` is ready.
async fn start_rpc_server(root: &Path) -> Result<RpcServerHandle, String> {
    let binary = PathBuf::from(env!("CARGO_BIN_EXE_vctrain-rpc"));

    let mut child = tokio::process::Command::new(&binary)
        .arg("--host")
        .arg("127.0.0.1")
        .arg("--port")
        .arg("0")
        .arg("--root")
        .arg(root)
        .arg("--python")
        .arg("sh")
        .arg("--core-script")
        .arg("fake_trainer.sh")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn vctrain-rpc: {e}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| "failed to capture stdout".to_string())?;
    let mut lines = tokio::io::BufReader::new(stdout).lines();

    let mut discovered_port: Option<u16> = None;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while tokio::time::Instant::now() < deadline {
        match tokio::time::timeout(Duration::from_millis(250), lines.next_line()).await {
            Ok(Ok(Some(line))) => {
                if let Some(value) = line.strip_prefix("RPC_PORT=") {
                    let parsed = value
                        .trim()
                        .parse::<u16>()
                        .map_err(|e| format!("invalid RPC_PORT value '{value}': {e}"))?;
                    discovered_port = Some(parsed);
                    break;
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(err)) => return Err(format!("failed to read vctrain-rpc stdout: {err}")),
            Err(_) => continue,
        }
    }

    let port =
        discovered_port.ok_or_else(|| "RPC_PORT line not emitted by vctrain-rpc".to_string())?;
    if !wait_for_server(port, 15).await {
        return Err(format!("vctrain-rpc failed health check on port {port}"));
    }

    let stdout_drain =
        tokio::spawn(async move { while let Ok(Some(_)) = lines.next_line().await {} });

    Ok(RpcServerHandle {
        child,
        port,
        stdout_drain: Some(stdout_drain),
    })
}

/// Validate the base response shape: `{ success: bool, ... }`.
fn validate_base_response(response: &Value) -> Result<(), String> {
    if response.get("success").and_then(|v| v.as_bool()).is_none() {
        return Err("Missing 'success' field".into());
    }
    Ok(())
}

fn validate_status_response(response: &Value) -> Result<(), String> {
    validate_base_response(response)?;
    for field in [
        "version",
        "workspace_root",
        "dataset_count",
        "project_count",
        "gpu_available",
        "running_jobs",
    ] {
        if response.get(field).is_none() {
            return Err(format!("Missing field: {}", field));
        }
    }
    Ok(())
}

fn validate_stage_response(response: &Value) -> Result<(), String> {
    validate_base_response(response)?;
    for field in ["job_id", "stage", "project", "status", "message", "output"] {
        if response.get(field).is_none() {
            return Err(format!("Missing field: {}", field));
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_health_and_status() {
    let env = create_test_env();
    let server = start_rpc_server(env.path()).await.unwrap();

    let health = rpc_call(server.port, "health_check", json!({})).await.unwrap();
    assert_eq!(health["status"], json!("ok"));

    let status = rpc_call(server.port, "get_status", json!({})).await.unwrap();
    validate_status_response(&status).unwrap();
    assert_eq!(status["dataset_count"], json!(0));

    let gpu = rpc_call(server.port, "get_gpu_info", json!({})).await.unwrap();
    validate_base_response(&gpu).unwrap();
    assert!(gpu["default_batch_size"].as_u64().is_some());
    assert!(gpu["info_text"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn test_dataset_upload_and_listing() {
    let env = create_test_env();
    let server = start_rpc_server(env.path()).await.unwrap();

    let empty = rpc_call(server.port, "list_datasets", json!({})).await.unwrap();
    assert_eq!(empty["datasets"], json!([]));

    let upload = write_upload(env.path(), "Take 1.wav");
    let outcome = rpc_call(
        server.port,
        "add_dataset_files",
        json!({ "files": [upload], "datasetName": "My Voice" }),
    )
    .await
    .unwrap();
    assert_eq!(outcome["success"], json!(true));
    assert_eq!(outcome["dataset_path"], json!("assets/datasets/my_voice"));

    let listed = rpc_call(server.port, "list_datasets", json!({})).await.unwrap();
    assert_eq!(listed["datasets"], json!(["assets/datasets/my_voice"]));

    // A rejected upload is still a successful call carrying a notice
    let text = write_upload(env.path(), "notes.txt");
    let outcome = rpc_call(
        server.port,
        "add_dataset_files",
        json!({ "files": [text], "dataset_name": "other" }),
    )
    .await
    .unwrap();
    assert_eq!(outcome["dataset_path"], Value::Null);
    assert!(!outcome["notices"].as_array().unwrap().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_pretrained_upload_and_refresh() {
    let env = create_test_env();
    let server = start_rpc_server(env.path()).await.unwrap();

    let g = write_upload(env.path(), "voice_G.pth");
    let stored = rpc_call(server.port, "upload_pretrained", json!({ "file": g }))
        .await
        .unwrap();
    assert_eq!(stored["success"], json!(true));
    assert!(stored["stored_path"].is_string());

    let generators = rpc_call(server.port, "list_pretrained", json!({ "role": "G" }))
        .await
        .unwrap();
    assert_eq!(generators["files"].as_array().unwrap().len(), 1);

    let lists = rpc_call(server.port, "refresh_pretrained", json!({}))
        .await
        .unwrap();
    assert_eq!(lists["generators"].as_array().unwrap().len(), 1);
    assert_eq!(lists["discriminators"], json!([]));

    let bad_role = rpc_call_raw(server.port, "list_pretrained", json!({ "role": "X" }))
        .await
        .unwrap();
    assert_eq!(error_code(&bad_role), Some(-32602));

    server.stop().await;
}

#[cfg(unix)]
#[tokio::test]
async fn test_stage_calls_report_outcome() {
    let env = create_test_env();
    std::fs::create_dir_all(env.path().join("assets/datasets/voice")).unwrap();
    let server = start_rpc_server(env.path()).await.unwrap();

    let preprocess = rpc_call(
        server.port,
        "preprocess_dataset",
        json!({
            "model_name": "voice",
            "datasetPath": "assets/datasets/voice",
            "samplingRate": 40000
        }),
    )
    .await
    .unwrap();
    validate_stage_response(&preprocess).unwrap();
    assert_eq!(preprocess["success"], json!(true));
    assert_eq!(preprocess["message"], json!("Model preprocessed successfully."));

    let extract = rpc_call(
        server.port,
        "extract_features",
        json!({ "modelName": "voice", "rvcVersion": "v2", "f0method": "rmvpe" }),
    )
    .await
    .unwrap();
    validate_stage_response(&extract).unwrap();
    assert_eq!(extract["success"], json!(false));
    assert_eq!(extract["status"], json!("failed"));
    assert_eq!(extract["message"], json!("no audio slices found"));

    let jobs = rpc_call(server.port, "list_jobs", json!({})).await.unwrap();
    assert_eq!(jobs["jobs"].as_array().unwrap().len(), 2);

    let job_id = preprocess["job_id"].as_str().unwrap();
    let job = rpc_call(server.port, "get_job", json!({ "jobId": job_id }))
        .await
        .unwrap();
    assert_eq!(job["job"]["status"], json!("succeeded"));
    // Job records use the same field casing as stage reports.
    assert_eq!(job["job"]["job_id"], preprocess["job_id"]);
    assert!(job["job"]["started_at"].is_string());

    let cancel = rpc_call(server.port, "cancel_job", json!({ "job_id": job_id }))
        .await
        .unwrap();
    assert_eq!(cancel["cancelled"], json!(false));

    server.stop().await;
}

#[tokio::test]
async fn test_invalid_requests_map_to_error_codes() {
    let env = create_test_env();
    let server = start_rpc_server(env.path()).await.unwrap();

    let missing = rpc_call_raw(server.port, "generate_index", json!({}))
        .await
        .unwrap();
    assert_eq!(error_code(&missing), Some(-32602));

    let bad_gpu = rpc_call_raw(
        server.port,
        "start_training",
        json!({ "model_name": "voice", "gpu": "0--1", "batch_size": 4 }),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&bad_gpu), Some(-32005));

    let bad_rate = rpc_call_raw(
        server.port,
        "preprocess_dataset",
        json!({ "model_name": "voice", "dataset_path": "x", "sampling_rate": 44100 }),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&bad_rate), Some(-32005));

    let no_job = rpc_call_raw(server.port, "get_job", json!({ "job_id": "nope" }))
        .await
        .unwrap();
    assert_eq!(error_code(&no_job), Some(-32002));

    let no_project = rpc_call_raw(
        server.port,
        "get_project_info",
        json!({ "model_name": "missing" }),
    )
    .await
    .unwrap();
    assert_eq!(error_code(&no_project), Some(-32002));

    let unknown = rpc_call_raw(server.port, "no_such_method", json!({}))
        .await
        .unwrap();
    assert_eq!(error_code(&unknown), Some(-32603));

    server.stop().await;
}

#[tokio::test]
async fn test_projects_listing() {
    let env = create_test_env();
    let project = env.path().join("logs/voice");
    std::fs::create_dir_all(project.join("sliced_audios")).unwrap();
    std::fs::write(project.join("G_10.pth"), b"").unwrap();
    let server = start_rpc_server(env.path()).await.unwrap();

    let projects = rpc_call(server.port, "list_projects", json!({}))
        .await
        .unwrap();
    assert_eq!(projects["projects"], json!(["voice"]));

    let info = rpc_call(server.port, "get_project_info", json!({ "modelName": "voice" }))
        .await
        .unwrap();
    assert_eq!(info["project"]["preprocessed"], json!(true));
    assert_eq!(info["project"]["checkpoints"], json!(["G_10.pth"]));

    server.stop().await;
}
