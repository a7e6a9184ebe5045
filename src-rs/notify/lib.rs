pub mod channels;
pub mod dispatcher;
pub mod types;

pub use channels::{ChannelTier, NotificationChannel, NotifyError, SystemChannel, ToastBoard};
pub use dispatcher::NotificationDispatcher;
pub use types::{Notification, NotificationKind};
