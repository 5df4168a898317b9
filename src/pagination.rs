use std::sync::Arc;
use tracing::debug;

use crate::api::NotificationApi;
use crate::error::NotificationError;
use crate::store::{NotificationStore, StoreState};
use crate::view::{self, ViewFilter};

/// Drives `load_more` from the visibility of the last rendered row.
///
/// The sentinel is the id of that row. Visibility only counts on a
/// not-visible to visible edge, and re-attaching to a new sentinel resets it.
pub struct InfiniteScroll<A> {
    store: Arc<NotificationStore<A>>,
    sentinel: Option<i64>,
    visible: bool,
}

impl<A> InfiniteScroll<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(store: Arc<NotificationStore<A>>) -> Self {
        Self {
            store,
            sentinel: None,
            visible: false,
        }
    }

    pub fn sentinel(&self) -> Option<i64> {
        self.sentinel
    }

    /// Observes a new last row. No-op if it is the row already observed.
    pub fn attach(&mut self, last_id: Option<i64>) {
        if self.sentinel == last_id {
            return;
        }
        debug!(sentinel = ?last_id, "Re-attaching scroll sentinel");
        self.sentinel = last_id;
        self.visible = false;
    }

    /// Observes the last row of the full history in display order.
    pub fn sync(&mut self, state: &StoreState) {
        let last = view::sorted(&state.notifications, ViewFilter::All)
            .last()
            .map(|n| n.id);
        self.attach(last);
    }

    pub fn detach(&mut self) {
        self.sentinel = None;
        self.visible = false;
    }

    /// Feeds a visibility change of the sentinel. Returns whether a page was appended.
    pub async fn on_visibility(&mut self, visible: bool) -> Result<bool, NotificationError> {
        let became_visible = visible && !self.visible;
        self.visible = visible;
        if !became_visible || self.sentinel.is_none() {
            return Ok(false);
        }

        if !self.store.can_load_more() {
            return Ok(false);
        }

        let appended = self.store.load_more().await?;
        if appended {
            let state = self.store.snapshot();
            self.sync(&state);
        }
        Ok(appended)
    }
}
