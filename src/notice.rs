use moka::future::Cache;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::NotificationError;

const DUPLICATE_WINDOW: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoticeLevel {
    Error,
    Warning,
}

/// A transient, user-facing toast.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Maps a failed user action to its toast. Session expiry has no toast:
/// it is handled once by the session.
pub fn notice_for(action: &str, error: &NotificationError) -> Option<Notice> {
    match error {
        NotificationError::Auth | NotificationError::NoSession => None,
        NotificationError::Permission(_) => Some(Notice {
            level: NoticeLevel::Warning,
            message: format!("You do not have permission to {}.", action),
        }),
        _ => Some(Notice {
            level: NoticeLevel::Error,
            message: format!("Could not {}. Please try again.", action),
        }),
    }
}

/// Toast channel shared by every surface of a session.
#[derive(Clone)]
pub struct Notices {
    sender: broadcast::Sender<Notice>,
    recent: Cache<Notice, ()>,
}

impl Notices {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(32);
        let recent = Cache::builder()
            .max_capacity(256)
            .time_to_live(DUPLICATE_WINDOW)
            .build();

        Self { sender, recent }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    /// Publishes a toast unless the same one was shown moments ago.
    pub async fn publish(&self, notice: Notice) -> bool {
        if self.recent.get(&notice).is_some() {
            debug!(message = %notice.message, "Suppressed duplicate notice");
            return false;
        }
        self.recent.insert(notice.clone(), ()).await;
        let _ = self.sender.send(notice);
        true
    }

    pub async fn report_failure(&self, action: &str, error: &NotificationError) {
        if let Some(notice) = notice_for(action, error) {
            self.publish(notice).await;
        }
    }
}

impl Default for Notices {
    fn default() -> Self {
        Self::new()
    }
}
