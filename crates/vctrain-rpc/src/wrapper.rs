//! Response wrapping for frontend compatibility.
//!
//! Every result reaches the client as `{success: bool, ...}`. List results are
//! placed under a named key; object results get `success` merged in.

use serde_json::{json, Map, Value};

fn with_success(result: Value, success: bool) -> Value {
    match result {
        Value::Object(mut map) => {
            map.insert("success".into(), Value::Bool(success));
            Value::Object(map)
        }
        Value::Null => json!({ "success": success }),
        other => {
            let mut map = Map::new();
            map.insert("success".into(), Value::Bool(success));
            map.insert("result".into(), other);
            Value::Object(map)
        }
    }
}

fn list_under(key: &str, result: Value) -> Value {
    json!({
        "success": true,
        key: if result.is_null() { json!([]) } else { result }
    })
}

/// Wrap API responses to match the frontend's expected format.
pub fn wrap_response(method: &str, result: Value) -> Value {
    match method {
        // List wrappers
        "list_datasets" => list_under("datasets", result),
        "list_pretrained" => list_under("files", result),
        "list_projects" => list_under("projects", result),
        "list_jobs" => list_under("jobs", result),

        // Dict wrappers
        "get_project_info" => json!({ "success": true, "project": result }),
        "get_job" => json!({ "success": true, "job": result }),

        // Stage reports: success mirrors the stage outcome
        "preprocess_dataset" | "extract_features" | "start_training" | "generate_index" => {
            let succeeded = result.get("status").and_then(|v| v.as_str()) == Some("succeeded");
            with_success(result, succeeded)
        }

        // Objects that already carry their fields (status, gpu info,
        // upload outcomes with notices, cancel results)
        _ => with_success(result, true),
    }
}
