use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::DEFAULT_QUOTA_BYTES;
use crate::task::{OrchestratorSettings, DEFAULT_CONTEXT_MESSAGES, DEFAULT_GRACE};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    /// Directory-backed storage when set, in-memory otherwise.
    pub data_dir: Option<PathBuf>,
    pub storage_quota: usize,
    pub host_url: Option<String>,
    pub context_messages: usize,
    pub grace: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_dir: None,
            storage_quota: DEFAULT_QUOTA_BYTES,
            host_url: None,
            context_messages: DEFAULT_CONTEXT_MESSAGES,
            grace: DEFAULT_GRACE,
        }
    }
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse::<T>().ok())
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed("PORT").unwrap_or(defaults.port),
            data_dir: non_empty("THEATER_DATA_DIR").map(PathBuf::from),
            storage_quota: parsed::<usize>("THEATER_STORAGE_QUOTA")
                .filter(|q| *q > 0)
                .unwrap_or(defaults.storage_quota),
            host_url: non_empty("THEATER_HOST_URL"),
            context_messages: parsed("THEATER_CONTEXT_MESSAGES").unwrap_or(defaults.context_messages),
            grace: parsed::<u64>("THEATER_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            grace: self.grace,
            context_messages: self.context_messages,
        }
    }
}
