use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use super::types::Notification;
use crate::host::HostBridge;

pub const TOAST_CAPACITY: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelTier {
    /// OS-level notification; only worth it when nobody is looking at the panel.
    System,
    InPage,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("channel unavailable")]
    Unavailable,
    #[error("delivery failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;
    fn tier(&self) -> ChannelTier;
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// System notifications go through the host, which holds the permission.
pub struct SystemChannel {
    host: Arc<dyn HostBridge>,
}

impl SystemChannel {
    pub fn new(host: Arc<dyn HostBridge>) -> Self {
        Self { host }
    }
}

#[async_trait]
impl NotificationChannel for SystemChannel {
    fn name(&self) -> &'static str {
        "system"
    }

    fn tier(&self) -> ChannelTier {
        ChannelTier::System
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.host
            .system_notify(notification)
            .await
            .map_err(|err| match err {
                crate::host::HostError::Unavailable => NotifyError::Unavailable,
                other => NotifyError::Failed(other.to_string()),
            })
    }
}

/// Bounded queue of in-page toasts, drained by whichever UI is mounted.
pub struct ToastBoard {
    queue: Mutex<VecDeque<Notification>>,
    capacity: usize,
}

impl ToastBoard {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    pub fn drain(&self) -> Vec<Notification> {
        match self.queue.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ToastBoard {
    fn default() -> Self {
        Self::new(TOAST_CAPACITY)
    }
}

#[async_trait]
impl NotificationChannel for ToastBoard {
    fn name(&self) -> &'static str {
        "toast"
    }

    fn tier(&self) -> ChannelTier {
        ChannelTier::InPage
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| NotifyError::Failed("toast queue poisoned".into()))?;
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::DetachedHost;

    #[tokio::test]
    async fn toast_board_drops_oldest_when_full() {
        let board = ToastBoard::new(2);
        for i in 0..3 {
            board
                .deliver(&Notification::completed("diary", &format!("t{}", i), 1))
                .await
                .unwrap();
        }
        let drained = board.drain();
        let ids: Vec<&str> = drained.iter().map(|n| n.task_id.as_str()).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
        assert!(board.is_empty());
    }

    #[tokio::test]
    async fn detached_host_has_no_system_channel() {
        let channel = SystemChannel::new(Arc::new(DetachedHost));
        let err = channel
            .deliver(&Notification::completed("diary", "t", 1))
            .await
            .unwrap_err();
        assert_eq!(err, NotifyError::Unavailable);
    }
}
