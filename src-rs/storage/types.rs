use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::Role;

static ENTRY_COUNTER: AtomicUsize = AtomicUsize::new(1);

/// Logical keys of the persisted layout.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StorageKey {
    Settings(String),
    History(String),
    LastOutputs(String),
    ApiConfig,
    StorageConfig(String),
}

impl StorageKey {
    pub fn parse(raw: &str) -> Option<Self> {
        let (prefix, scope) = raw.split_once(':')?;
        if scope.is_empty() {
            return None;
        }
        let scope = scope.to_string();
        match prefix {
            "settings" => Some(Self::Settings(scope)),
            "history" => Some(Self::History(scope)),
            "lastOutputs" => Some(Self::LastOutputs(scope)),
            "apiConfig" if scope == "shared" => Some(Self::ApiConfig),
            "storageConfig" => Some(Self::StorageConfig(scope)),
            _ => None,
        }
    }

    /// Owning module, `None` for shared keys.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Self::Settings(ns) | Self::History(ns) | Self::LastOutputs(ns) | Self::StorageConfig(ns) => {
                Some(ns.as_str())
            }
            Self::ApiConfig => None,
        }
    }

    /// Configuration keys survive quota recovery; content keys may be dropped.
    pub fn is_essential(&self) -> bool {
        matches!(self, Self::Settings(_) | Self::ApiConfig | Self::StorageConfig(_))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Settings(ns) => write!(f, "settings:{}", ns),
            Self::History(ns) => write!(f, "history:{}", ns),
            Self::LastOutputs(ns) => write!(f, "lastOutputs:{}", ns),
            Self::ApiConfig => write!(f, "apiConfig:shared"),
            Self::StorageConfig(ns) => write!(f, "storageConfig:{}", ns),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StorageConfig {
    pub max_entries: usize,
    pub max_age_days: u32,
    pub clean_threshold: usize,
    pub keep_recent_on_clean: usize,
    pub compression_enabled: bool,
    pub compress_above_chars: usize,
    pub cross_namespace_recovery: bool,
}

pub const MIN_COMPRESS_CHARS: usize = 64;

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_entries: 50,
            max_age_days: 30,
            clean_threshold: 40,
            keep_recent_on_clean: 20,
            compression_enabled: false,
            compress_above_chars: 4000,
            cross_namespace_recovery: false,
        }
    }
}

impl StorageConfig {
    /// Enforces `keep_recent_on_clean <= clean_threshold <= max_entries`.
    pub fn validated(mut self) -> Self {
        let defaults = Self::default();
        if self.max_entries == 0 {
            self.max_entries = defaults.max_entries;
        }
        if self.clean_threshold == 0 {
            self.clean_threshold = defaults.clean_threshold;
        }
        self.clean_threshold = self.clean_threshold.min(self.max_entries);
        self.keep_recent_on_clean = self.keep_recent_on_clean.clamp(1, self.clean_threshold);
        if self.compress_above_chars < MIN_COMPRESS_CHARS {
            self.compress_above_chars = defaults.compress_above_chars;
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub compressed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self::at(role, content, Utc::now())
    }

    pub fn at(role: Role, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        let count = ENTRY_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self {
            id: format!("h_{}_{}", timestamp.timestamp_millis(), count),
            role,
            content: content.into(),
            timestamp,
            compressed: false,
            task_id: None,
        }
    }

    pub fn for_task(mut self, task_id: &str) -> Self {
        self.task_id = Some(task_id.to_string());
        self
    }
}

/// Final outputs of the most recent task of a module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastOutputs {
    pub task_id: String,
    pub complete: bool,
    pub outputs: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("storage quota exceeded writing {key}")]
    QuotaExceeded { key: String },
    #[error("serialization failed: {0}")]
    Serialize(String),
    #[error("storage io error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialize(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_text() {
        let keys = vec![
            StorageKey::Settings("diary".into()),
            StorageKey::History("theater".into()),
            StorageKey::LastOutputs("companion".into()),
            StorageKey::ApiConfig,
            StorageKey::StorageConfig("diary".into()),
        ];
        for key in keys {
            assert_eq!(StorageKey::parse(&key.to_string()), Some(key.clone()));
        }
        assert_eq!(StorageKey::ApiConfig.to_string(), "apiConfig:shared");
        assert_eq!(StorageKey::parse("apiConfig:diary"), None);
        assert_eq!(StorageKey::parse("history:"), None);
    }

    #[test]
    fn config_invariants_are_repaired() {
        let cfg = StorageConfig {
            max_entries: 10,
            clean_threshold: 25,
            keep_recent_on_clean: 40,
            compress_above_chars: 3,
            ..StorageConfig::default()
        }
        .validated();
        assert_eq!(cfg.clean_threshold, 10);
        assert_eq!(cfg.keep_recent_on_clean, 10);
        assert_eq!(cfg.compress_above_chars, 4000);
    }

    #[test]
    fn partial_config_json_uses_defaults() {
        let cfg: StorageConfig = serde_json::from_str(r#"{"maxEntries": 12}"#).unwrap();
        let cfg = cfg.validated();
        assert_eq!(cfg.max_entries, 12);
        assert_eq!(cfg.clean_threshold, 12);
        assert_eq!(cfg.max_age_days, 30);
    }

    #[test]
    fn history_timestamps_serialize_as_rfc3339() {
        let entry = HistoryEntry::new(Role::Assistant, "hello").for_task("task_1");
        let raw = serde_json::to_value(&entry).unwrap();
        let stamp = raw["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(raw["role"], "assistant");
        let back: HistoryEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(back, entry);
    }
}
