use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::postprocess::render_unit;
use super::prompt::build_prompt;
use super::types::{
    FailureReason, GenerationRequest, ModuleKind, Progress, TaskError, TaskSnapshot, TaskStatus,
};
use crate::host::{ContextMessage, HostBridge, HostEntry};
use crate::llm::{ProviderClient, ProviderConfig, ProviderError, Role};
use crate::notify::{Notification, NotificationDispatcher};
use crate::storage::{HistoryEntry, LastOutputs, PersistentStore};

static COUNTER: AtomicUsize = AtomicUsize::new(1);

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);
pub const DEFAULT_CONTEXT_MESSAGES: usize = 20;

#[derive(Clone, Debug)]
pub struct OrchestratorSettings {
    /// How long a finished task stays readable by id.
    pub grace: Duration,
    pub context_messages: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            grace: DEFAULT_GRACE,
            context_messages: DEFAULT_CONTEXT_MESSAGES,
        }
    }
}

struct TaskEntry {
    snapshot: TaskSnapshot,
    cancel: CancellationToken,
    finalized: bool,
    updates: watch::Sender<TaskSnapshot>,
}

impl TaskEntry {
    fn publish(&self) {
        self.updates.send_replace(self.snapshot.clone());
    }
}

struct Inner {
    module: ModuleKind,
    client: Arc<ProviderClient>,
    store: Arc<PersistentStore>,
    host: Arc<dyn HostBridge>,
    notifier: Arc<NotificationDispatcher>,
    settings: OrchestratorSettings,
    tasks: Mutex<HashMap<String, TaskEntry>>,
}

/// Owns the generation tasks of one module. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

impl TaskOrchestrator {
    pub fn new(
        module: ModuleKind,
        client: Arc<ProviderClient>,
        store: Arc<PersistentStore>,
        host: Arc<dyn HostBridge>,
        notifier: Arc<NotificationDispatcher>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                module,
                client,
                store,
                host,
                notifier,
                settings,
                tasks: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn module(&self) -> ModuleKind {
        self.inner.module
    }

    pub fn store(&self) -> &Arc<PersistentStore> {
        &self.inner.store
    }

    /// Creates a foreground task and spawns its execution. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, request: GenerationRequest) -> Result<String, TaskError> {
        let request = Arc::new(request.normalized());
        let config = self.inner.store.provider_config();
        let id = next_id();
        let cancel = CancellationToken::new();
        {
            let mut tasks = self.inner.tasks();
            if tasks.values().any(|t| t.snapshot.status.is_running()) {
                return Err(TaskError::AlreadyRunning);
            }
            let snapshot = TaskSnapshot {
                id: id.clone(),
                module: self.inner.module,
                status: TaskStatus::RunningForeground,
                progress: Progress {
                    completed_units: 0,
                    total_units: request.units,
                    current_unit: 0,
                },
                outputs: Vec::new(),
                error: None,
                backgrounded: false,
                saved: None,
                started_at: Utc::now(),
                ended_at: None,
            };
            let (updates, _) = watch::channel(snapshot.clone());
            tasks.insert(
                id.clone(),
                TaskEntry {
                    snapshot,
                    cancel: cancel.clone(),
                    finalized: false,
                    updates,
                },
            );
        }
        info!(
            module = self.inner.module.as_str(),
            task_id = %id,
            units = request.units,
            provider = ?config.kind,
            "task started"
        );
        tokio::spawn(run(self.inner.clone(), id.clone(), request, config, cancel));
        Ok(id)
    }

    /// Moves a foreground task to the background. Returns whether anything changed.
    pub fn notify_ui_closed(&self, task_id: &str) -> bool {
        let mut tasks = self.inner.tasks();
        match tasks.get_mut(task_id) {
            Some(entry) if entry.snapshot.status == TaskStatus::RunningForeground => {
                entry.snapshot.status = TaskStatus::RunningBackground;
                entry.snapshot.backgrounded = true;
                entry.publish();
                debug!(task_id, "task moved to background");
                true
            }
            _ => false,
        }
    }

    pub fn status(&self, task_id: &str) -> Result<TaskSnapshot, TaskError> {
        self.inner
            .tasks()
            .get(task_id)
            .map(|entry| entry.snapshot.clone())
            .ok_or(TaskError::NotFound)
    }

    /// Id of the running task, if any.
    pub fn current(&self) -> Option<String> {
        self.inner
            .tasks()
            .values()
            .find(|entry| entry.snapshot.status.is_running())
            .map(|entry| entry.snapshot.id.clone())
    }

    pub fn subscribe(&self, task_id: &str) -> Result<watch::Receiver<TaskSnapshot>, TaskError> {
        self.inner
            .tasks()
            .get(task_id)
            .map(|entry| entry.updates.subscribe())
            .ok_or(TaskError::NotFound)
    }

    /// Best-effort cancel. A task that already finished is left untouched.
    pub async fn cancel(&self, task_id: &str) -> Result<(), TaskError> {
        let token = {
            let tasks = self.inner.tasks();
            let entry = tasks.get(task_id).ok_or(TaskError::NotFound)?;
            if entry.finalized {
                return Ok(());
            }
            entry.cancel.clone()
        };
        token.cancel();
        self.inner.finish(task_id, Some(FailureReason::Cancelled)).await;
        Ok(())
    }
}

impl Inner {
    fn tasks(&self) -> MutexGuard<'_, HashMap<String, TaskEntry>> {
        self.tasks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `f` to a task that has not been finalized yet.
    fn update_live<R>(&self, task_id: &str, f: impl FnOnce(&mut TaskSnapshot) -> R) -> Option<R> {
        let mut tasks = self.tasks();
        let entry = tasks.get_mut(task_id)?;
        if entry.finalized {
            return None;
        }
        let out = f(&mut entry.snapshot);
        entry.publish();
        Some(out)
    }

    async fn load_context(&self) -> Vec<ContextMessage> {
        match self.host.conversation_context().await {
            Ok(ctx) => ctx.recent(self.settings.context_messages).to_vec(),
            Err(err) => {
                warn!(module = self.module.as_str(), error = %err, "conversation context unavailable");
                Vec::new()
            }
        }
    }

    /// Terminal transition plus its side effects. Only the first call per task
    /// has any effect.
    async fn finish(self: &Arc<Self>, task_id: &str, failure: Option<FailureReason>) {
        let snapshot = {
            let mut tasks = self.tasks();
            let entry = match tasks.get_mut(task_id) {
                Some(entry) if !entry.finalized => entry,
                _ => return,
            };
            entry.finalized = true;
            let snap = &mut entry.snapshot;
            snap.status = match failure {
                Some(_) => TaskStatus::Failed,
                None => TaskStatus::Completed,
            };
            snap.error = failure;
            snap.progress.current_unit = 0;
            snap.ended_at = Some(Utc::now());
            entry.publish();
            entry.snapshot.clone()
        };

        // File-backed media do blocking I/O.
        let inner = self.clone();
        let to_persist = snapshot.clone();
        let saved = match tokio::task::spawn_blocking(move || inner.persist(&to_persist)).await {
            Ok(saved) => saved,
            Err(err) => {
                warn!(task_id, error = %err, "persist job did not finish");
                Some(false).filter(|_| !snapshot.outputs.is_empty())
            }
        };
        {
            let mut tasks = self.tasks();
            if let Some(entry) = tasks.get_mut(task_id) {
                entry.snapshot.saved = saved;
                entry.publish();
            }
        }

        if snapshot.status == TaskStatus::Completed {
            let entry = HostEntry {
                module: self.module.as_str().to_string(),
                task_id: snapshot.id.clone(),
                content: snapshot.outputs.join("\n"),
            };
            if let Err(err) = self.host.append_message(&entry).await {
                warn!(task_id, error = %err, "could not append outputs to host conversation");
            }
        }

        let notification = self.notification_for(&snapshot, saved);
        let channel = self.notifier.dispatch(&notification, snapshot.backgrounded).await;
        info!(
            module = self.module.as_str(),
            task_id,
            status = ?snapshot.status,
            units = snapshot.outputs.len(),
            saved = ?saved,
            channel = ?channel,
            "task finalized"
        );

        self.schedule_removal(task_id.to_string());
    }

    fn persist(&self, snapshot: &TaskSnapshot) -> Option<bool> {
        let saved = if snapshot.outputs.is_empty() {
            None
        } else {
            let outputs = LastOutputs {
                task_id: snapshot.id.clone(),
                complete: snapshot.status == TaskStatus::Completed,
                outputs: snapshot.outputs.clone(),
                saved_at: Utc::now(),
            };
            match self.store.save_outputs(&outputs) {
                Ok(()) => Some(true),
                Err(err) => {
                    warn!(task_id = %snapshot.id, error = %err, "could not save task outputs");
                    Some(false)
                }
            }
        };

        let entry = match snapshot.error {
            None => HistoryEntry::new(Role::Assistant, snapshot.outputs.join("\n")),
            Some(reason) => HistoryEntry::new(
                Role::System,
                format!(
                    "{} ({} of {} units produced)",
                    reason.describe(),
                    snapshot.outputs.len(),
                    snapshot.progress.total_units
                ),
            ),
        }
        .for_task(&snapshot.id);
        if let Err(err) = self.store.append_history(entry) {
            warn!(task_id = %snapshot.id, error = %err, "could not append task history");
        }
        saved
    }

    fn notification_for(&self, snapshot: &TaskSnapshot, saved: Option<bool>) -> Notification {
        let module = self.module.as_str();
        let produced = snapshot.outputs.len();
        let unsaved = saved == Some(false);
        match snapshot.error {
            None if unsaved => Notification::unsaved(module, &snapshot.id, produced),
            None => Notification::completed(module, &snapshot.id, produced),
            Some(reason) => {
                let notice =
                    Notification::failed(module, &snapshot.id, reason, produced, snapshot.progress.total_units);
                if unsaved {
                    notice.with_unsaved_units()
                } else {
                    notice
                }
            }
        }
    }

    fn schedule_removal(self: &Arc<Self>, task_id: String) {
        let weak: Weak<Inner> = Arc::downgrade(self);
        let grace = self.settings.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = weak.upgrade() {
                inner.tasks().remove(&task_id);
                debug!(task_id = %task_id, "task dropped after grace window");
            }
        });
    }
}

async fn run(
    inner: Arc<Inner>,
    task_id: String,
    request: Arc<GenerationRequest>,
    config: ProviderConfig,
    cancel: CancellationToken,
) {
    let context = inner.load_context().await;
    let total = request.units;

    for index in 0..total {
        let observed = inner.update_live(&task_id, |snap| {
            snap.progress.current_unit = index + 1;
            snap.status
        });
        match observed {
            Some(status) if status.is_running() => {
                debug!(task_id = %task_id, unit = index + 1, total, ?status, "generating unit");
            }
            _ => return,
        }

        let prompt = build_prompt(inner.module, &request, &context, index, total);
        match inner.client.execute(&prompt, &config, &cancel).await {
            Ok(generation) => {
                let unit = render_unit(&generation.text);
                let appended = inner.update_live(&task_id, |snap| {
                    snap.outputs.push(unit);
                    snap.progress.completed_units = snap.outputs.len();
                });
                if appended.is_none() {
                    debug!(task_id = %task_id, "late unit dropped, task already finalized");
                    return;
                }
                debug!(task_id = %task_id, unit = index + 1, strategy = generation.strategy, "unit appended");
            }
            Err(err) => {
                let reason = FailureReason::from_error(&err);
                if !matches!(err, ProviderError::Cancelled) {
                    warn!(task_id = %task_id, unit = index + 1, error = %err, "unit generation failed");
                }
                inner.finish(&task_id, Some(reason)).await;
                return;
            }
        }
    }

    inner.finish(&task_id, None).await;
}

fn next_id() -> String {
    let count = COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("task_{}_{}", Utc::now().timestamp_millis(), count)
}
