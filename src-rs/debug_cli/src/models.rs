use serde::{Deserialize, Serialize};

#[derive(Clone, Debug)]
pub struct CLIConfig {
    pub base_url: String,
    pub module: String,
    pub units: usize,
    pub content: Option<String>,
    pub current_task: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StartRequest {
    pub instruction: String,
    pub units: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub task_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed_units: usize,
    pub total_units: usize,
    pub current_unit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub progress: Progress,
    #[serde(default)]
    pub outputs: Vec<String>,
    pub error: Option<String>,
    #[serde(default)]
    pub backgrounded: bool,
    pub saved: Option<bool>,
}

impl TaskSnapshot {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOutputs {
    pub task_id: String,
    pub complete: bool,
    pub outputs: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub task_id: String,
    pub kind: String,
    pub title: String,
    pub body: String,
}
