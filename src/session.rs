use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::{HttpNotificationApi, NotificationApi};
use crate::config::Config;
use crate::notice::Notices;
use crate::poller::PollingDriver;
use crate::store::NotificationStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    // The backend rejected the credential; the user must sign in again
    Expired,
    LoggedOut,
}

/// Bearer credential for the signed-in user.
///
/// Cleared exactly once, either by logout or by the first 401.
pub struct Credentials {
    token: RwLock<Option<String>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            token: RwLock::new(Some(token.into())),
            events,
        })
    }

    pub async fn bearer(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn expire(&self) {
        self.clear(SessionEvent::Expired).await;
    }

    async fn clear(&self, event: SessionEvent) {
        // Only the first clear broadcasts, so a burst of 401s ends the session once
        let had_token = self.token.write().await.take().is_some();
        if had_token {
            info!(event = ?event, "Session credential cleared");
            let _ = self.events.send(event);
        }
    }
}

/// Everything notification-related that lives between login and logout.
///
/// Owns the one shared store and the one shared polling driver; surfaces
/// are built from it instead of reaching for global state.
pub struct Session<A> {
    credentials: Arc<Credentials>,
    store: Arc<NotificationStore<A>>,
    notices: Notices,
    poll_interval: Duration,
    poller: Mutex<Option<PollingDriver>>,
}

impl Session<HttpNotificationApi> {
    pub fn login(config: &Config, token: String) -> Result<Arc<Self>> {
        // The client shares the credential so a 401 can clear it
        let credentials = Credentials::new(token);
        let api = HttpNotificationApi::new(
            &config.api_url,
            credentials.clone(),
            config.http_timeout,
        )
        .context("Failed to create notifications client")?;

        info!(api_url = %config.api_url, "Session started");
        Ok(Self::new(
            api,
            credentials,
            config.page_size,
            config.poll_interval,
        ))
    }
}

impl<A> Session<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(
        api: A,
        credentials: Arc<Credentials>,
        page_size: u32,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            credentials,
            store: Arc::new(NotificationStore::new(api, page_size)),
            notices: Notices::new(),
            poll_interval,
            poller: Mutex::new(None),
        })
    }

    pub fn store(&self) -> &Arc<NotificationStore<A>> {
        &self.store
    }

    pub fn notices(&self) -> &Notices {
        &self.notices
    }

    pub fn credentials(&self) -> &Arc<Credentials> {
        &self.credentials
    }

    /// Starts the shared polling driver unless it is already running.
    pub async fn ensure_polling(&self) {
        let mut poller = self.poller.lock().await;
        if poller.is_none() {
            *poller = Some(PollingDriver::spawn(self.store.clone(), self.poll_interval));
        }
    }

    pub async fn is_polling(&self) -> bool {
        self.poller.lock().await.is_some()
    }

    pub async fn logout(&self) {
        self.credentials.clear(SessionEvent::LoggedOut).await;
        self.teardown().await;
    }

    async fn teardown(&self) {
        // Stop polling first so no tick lands after the reset
        if let Some(poller) = self.poller.lock().await.take() {
            poller.stop().await;
        }
        // Empty the store and drop anything still in flight
        self.store.reset();
        debug!("Session state torn down");
    }

    /// Tears the session down when the backend reports it expired.
    pub fn watch_expiry(self: &Arc<Self>) -> JoinHandle<()> {
        let mut events = self.credentials.subscribe();
        let session = self.clone();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Expired) => {
                        info!("Session expired, sign-in required");
                        session.teardown().await;
                        break;
                    }
                    Ok(SessionEvent::LoggedOut) | Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        })
    }
}
