use std::sync::Arc;

use tracing::{debug, warn};

use super::channels::{ChannelTier, NotificationChannel, SystemChannel, ToastBoard};
use super::types::Notification;
use crate::host::HostBridge;

/// Tries channels in order until one accepts. Foreground notifications skip
/// the system tier since the panel is on screen.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// system (via host) → in-page toast board.
    pub fn standard(host: Arc<dyn HostBridge>, toasts: Arc<ToastBoard>) -> Self {
        Self::new(vec![Arc::new(SystemChannel::new(host)), toasts])
    }

    /// Returns the channel that took the notification, if any.
    pub async fn dispatch(&self, notification: &Notification, background: bool) -> Option<&'static str> {
        for channel in &self.channels {
            if channel.tier() == ChannelTier::System && !background {
                continue;
            }
            match channel.deliver(notification).await {
                Ok(()) => {
                    debug!(channel = channel.name(), task_id = %notification.task_id, "notification delivered");
                    return Some(channel.name());
                }
                Err(err) => {
                    debug!(channel = channel.name(), error = %err, "notification channel declined");
                }
            }
        }
        warn!(task_id = %notification.task_id, "no notification channel accepted delivery");
        None
    }
}
