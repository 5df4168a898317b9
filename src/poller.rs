use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::api::NotificationApi;
use crate::config;
use crate::store::NotificationStore;

/// Keeps a store fresh by refreshing page 0 and the unread count on a fixed
/// interval. Failures are logged and never surfaced to the user.
pub struct PollingDriver {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl PollingDriver {
    pub fn spawn<A>(store: Arc<NotificationStore<A>>, interval: Duration) -> Self
    where
        A: NotificationApi + Send + Sync + 'static,
    {
        // Keep the interval inside the supported polling range
        let interval = config::poll_interval(interval.as_secs());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(run_polling(store, interval, shutdown_rx));

        Self {
            shutdown: Some(shutdown_tx),
            handle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops polling. A tick still in flight is cancelled and its result dropped.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            warn!(error = %e, "Polling task ended abnormally");
        }
    }
}

impl Drop for PollingDriver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run_polling<A>(
    store: Arc<NotificationStore<A>>,
    interval: Duration,
    mut shutdown: oneshot::Receiver<()>,
) where
    A: NotificationApi + Send + Sync + 'static,
{
    info!(interval_secs = interval.as_secs(), "Starting notification polling");
    let mut ticker = tokio::time::interval(interval);
    // A slow tick pushes the next one back instead of firing a burst
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // Shutdown cancels a tick in flight; the store releases its loading slot
        tokio::select! {
            _ = &mut shutdown => break,
            _ = poll_once(&store, &mut ticker) => {}
        }
    }

    info!("Notification polling stopped");
}

async fn poll_once<A>(store: &NotificationStore<A>, ticker: &mut tokio::time::Interval)
where
    A: NotificationApi + Send + Sync + 'static,
{
    ticker.tick().await;

    // Page 0 and the unread count are fetched concurrently
    let (refreshed, counted) = futures::join!(store.refresh(), store.refresh_unread_count());
    if let Err(e) = refreshed {
        debug!(error = %e, "Background refresh failed");
    }
    match counted {
        Ok(count) => debug!(unread = count, "Polled unread count"),
        Err(e) => debug!(error = %e, "Background unread count failed"),
    }
}
