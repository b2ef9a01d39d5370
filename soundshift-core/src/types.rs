use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Task status strings reported by the progress endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Processing,
    Writing,
    Completed,
    Failed,
    /// A status this client does not know; shown verbatim and treated as
    /// non-terminal.
    Other(String),
}

impl TaskStatus {
    pub fn from_raw(raw: &str) -> TaskStatus {
        match raw {
            "queued" => TaskStatus::Queued,
            "processing" => TaskStatus::Processing,
            "writing" => TaskStatus::Writing,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// One decoded response from `GET /progress/{task_id}`.
///
/// Fields are extracted leniently: a missing or mistyped field becomes
/// `None` instead of failing the whole response, so a transient oddity in
/// one field never tears down the poll loop.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub status: Option<String>,
    pub percent: Option<f64>,
    pub download_url: Option<String>,
    pub filename: Option<String>,
    pub error: Option<String>,
}

impl ProgressReport {
    pub fn parse(body: &Value) -> Self {
        let s = |key: &str| body[key].as_str().map(str::to_string);
        ProgressReport {
            status: s("status"),
            percent: body["percent"].as_f64(),
            download_url: s("download_url"),
            filename: s("filename"),
            error: s("error"),
        }
    }

    pub fn task_status(&self) -> Option<TaskStatus> {
        self.status.as_deref().map(TaskStatus::from_raw)
    }
}

/// Task identifier from a `POST /convert/{category}` kickoff response.
pub fn parse_task_id(body: &Value) -> Option<String> {
    body["task_id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

/// Service-supplied error string, when the body carries one.
pub fn error_message(body: &Value) -> Option<String> {
    body["error"]
        .as_str()
        .filter(|e| !e.is_empty())
        .map(str::to_string)
}

/// Label text for a status while the task is still running.
pub fn status_message(status: Option<&str>) -> String {
    match status {
        Some("writing") => "Finalizing...".to_string(),
        Some(s) if !s.is_empty() => s.to_string(),
        _ => "Processing...".to_string(),
    }
}
