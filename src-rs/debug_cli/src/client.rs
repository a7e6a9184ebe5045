use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::{HistoryEntry, LastOutputs, Notification, StartRequest, StartResponse, TaskSnapshot};

pub struct HTTPClient {
    pub base_url: String,
    client: Client,
}

impl HTTPClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, String> {
        if resp.status().is_success() {
            resp.json::<T>().map_err(|err| err.to_string())
        } else {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            Err(format!("http {}: {}", status.as_u16(), body))
        }
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, String> {
        let resp = self.client.get(self.url(path)).send().map_err(|err| err.to_string())?;
        Self::decode(resp)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, String> {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .map_err(|err| err.to_string())?;
        Self::decode(resp)
    }

    pub fn start(&self, module: &str, req: &StartRequest) -> Result<String, String> {
        let resp: StartResponse = self.post(&format!("/modules/{}/tasks", module), req)?;
        Ok(resp.task_id)
    }

    pub fn current(&self, module: &str) -> Result<Option<TaskSnapshot>, String> {
        let value: Value = self.get(&format!("/modules/{}/tasks/current", module))?;
        match value.get("task") {
            Some(task) if !task.is_null() => serde_json::from_value(task.clone())
                .map(Some)
                .map_err(|err| err.to_string()),
            _ => Ok(None),
        }
    }

    pub fn status(&self, module: &str, task_id: &str) -> Result<TaskSnapshot, String> {
        self.get(&format!("/modules/{}/tasks/{}", module, task_id))
    }

    pub fn close(&self, module: &str, task_id: &str) -> Result<bool, String> {
        let value: Value = self.post(&format!("/modules/{}/tasks/{}/close", module, task_id), &())?;
        Ok(value.get("backgrounded").and_then(Value::as_bool).unwrap_or(false))
    }

    pub fn cancel(&self, module: &str, task_id: &str) -> Result<TaskSnapshot, String> {
        self.post(&format!("/modules/{}/tasks/{}/cancel", module, task_id), &())
    }

    pub fn history(&self, module: &str, limit: usize) -> Result<Vec<HistoryEntry>, String> {
        let value: Value = self.get(&format!("/modules/{}/history?limit={}", module, limit))?;
        let entries = value.get("entries").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(entries).map_err(|err| err.to_string())
    }

    pub fn outputs(&self, module: &str) -> Result<Option<LastOutputs>, String> {
        let value: Value = self.get(&format!("/modules/{}/outputs", module))?;
        match value.get("lastOutputs") {
            Some(outputs) if !outputs.is_null() => serde_json::from_value(outputs.clone())
                .map(Some)
                .map_err(|err| err.to_string()),
            _ => Ok(None),
        }
    }

    pub fn notifications(&self) -> Result<Vec<Notification>, String> {
        let value: Value = self.get("/notifications")?;
        let items = value.get("notifications").cloned().unwrap_or(Value::Array(Vec::new()));
        serde_json::from_value(items).map_err(|err| err.to_string())
    }

    pub fn api_config(&self) -> Result<Value, String> {
        self.get("/config/api")
    }
}
