use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::FailureReason;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationKind {
    Completed,
    /// Generated, but the outputs could not be written to storage.
    Unsaved,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub task_id: String,
    pub module: String,
    pub kind: NotificationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn completed(module: &str, task_id: &str, units: usize) -> Self {
        Self::build(
            module,
            task_id,
            NotificationKind::Completed,
            None,
            format!("{} ready", module),
            format!("{} unit(s) generated.", units),
        )
    }

    pub fn unsaved(module: &str, task_id: &str, units: usize) -> Self {
        Self::build(
            module,
            task_id,
            NotificationKind::Unsaved,
            None,
            format!("{} generated but not saved", module),
            format!(
                "{} unit(s) generated but could not be saved. Storage is full; copy what you need before closing.",
                units
            ),
        )
    }

    pub fn failed(module: &str, task_id: &str, reason: FailureReason, produced: usize, total: usize) -> Self {
        let body = if produced > 0 {
            format!("{} ({} of {} unit(s) produced).", reason.describe(), produced, total)
        } else {
            format!("{}.", reason.describe())
        };
        Self::build(
            module,
            task_id,
            NotificationKind::Failed,
            Some(reason),
            format!("{} generation stopped", module),
            body,
        )
    }

    /// Notes on a failure notice that the partial units were not persisted.
    pub fn with_unsaved_units(mut self) -> Self {
        self.body
            .push_str(" They could not be saved. Storage is full; copy what you need before closing.");
        self
    }

    fn build(
        module: &str,
        task_id: &str,
        kind: NotificationKind,
        reason: Option<FailureReason>,
        title: String,
        body: String,
    ) -> Self {
        Self {
            task_id: task_id.to_string(),
            module: module.to_string(),
            kind,
            reason,
            title,
            body,
            created_at: Utc::now(),
        }
    }
}
