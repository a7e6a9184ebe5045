use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::ProviderError;

pub const MIN_UNITS: usize = 1;
pub const MAX_UNITS: usize = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Theater,
    Diary,
    Companion,
}

impl ModuleKind {
    pub const ALL: [ModuleKind; 3] = [ModuleKind::Theater, ModuleKind::Diary, ModuleKind::Companion];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKind::Theater => "theater",
            ModuleKind::Diary => "diary",
            ModuleKind::Companion => "companion",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "theater" | "theatre" => Some(ModuleKind::Theater),
            "diary" => Some(ModuleKind::Diary),
            "companion" | "chat" => Some(ModuleKind::Companion),
            _ => None,
        }
    }
}

/// What a theater unit should contain. Other modules ignore it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    #[default]
    Script,
    Character,
    Scene,
    Music,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Script => "script",
            ContentKind::Character => "character",
            ContentKind::Scene => "scene",
            ContentKind::Music => "music",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(default)]
    pub instruction: String,
    #[serde(default = "default_units")]
    pub units: usize,
    #[serde(default)]
    pub content: ContentKind,
}

fn default_units() -> usize {
    MIN_UNITS
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>, units: usize) -> Self {
        Self {
            instruction: instruction.into(),
            units,
            content: ContentKind::default(),
        }
    }

    pub fn normalized(mut self) -> Self {
        self.units = self.units.clamp(MIN_UNITS, MAX_UNITS);
        self.instruction = self.instruction.trim().to_string();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Idle,
    RunningForeground,
    RunningBackground,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, TaskStatus::RunningForeground | TaskStatus::RunningBackground)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

/// User-facing failure class. Never carries provider payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    Timeout,
    Exhausted,
    Cancelled,
}

impl FailureReason {
    pub fn from_error(err: &ProviderError) -> Self {
        match err {
            ProviderError::Cancelled => FailureReason::Cancelled,
            ProviderError::Timeout => FailureReason::Timeout,
            ProviderError::AllProvidersExhausted { last } if last.is_timeout() => FailureReason::Timeout,
            _ => FailureReason::Exhausted,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            FailureReason::Timeout => "The provider did not answer in time",
            FailureReason::Exhausted => "No provider could generate content",
            FailureReason::Cancelled => "Generation was cancelled",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub completed_units: usize,
    pub total_units: usize,
    /// 1-based unit currently in flight, 0 when none.
    pub current_unit: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub id: String,
    pub module: ModuleKind,
    pub status: TaskStatus,
    pub progress: Progress,
    pub outputs: Vec<String>,
    pub error: Option<FailureReason>,
    pub backgrounded: bool,
    /// `None` until finalization, or when there was nothing to save.
    pub saved: Option<bool>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("a task is already running for this module")]
    AlreadyRunning,
    #[error("task not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_are_clamped() {
        assert_eq!(GenerationRequest::new("x", 0).normalized().units, 1);
        assert_eq!(GenerationRequest::new("x", 9).normalized().units, 4);
        assert_eq!(GenerationRequest::new("x", 3).normalized().units, 3);
    }

    #[test]
    fn exhausted_by_timeout_reports_timeout() {
        let err = ProviderError::AllProvidersExhausted {
            last: Box::new(ProviderError::Timeout),
        };
        assert_eq!(FailureReason::from_error(&err), FailureReason::Timeout);
        let err = ProviderError::AllProvidersExhausted {
            last: Box::new(ProviderError::InvalidCredential),
        };
        assert_eq!(FailureReason::from_error(&err), FailureReason::Exhausted);
        assert_eq!(
            FailureReason::from_error(&ProviderError::Cancelled),
            FailureReason::Cancelled
        );
    }

    #[test]
    fn request_defaults_from_json() {
        let req: GenerationRequest = serde_json::from_str(r#"{"instruction":"hi"}"#).unwrap();
        assert_eq!(req.units, 1);
        assert_eq!(req.content, ContentKind::Script);
        assert_eq!(ModuleKind::parse("Theatre"), Some(ModuleKind::Theater));
    }
}
