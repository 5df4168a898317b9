//! Thin presentation surfaces over the shared store.
//!
//! Surfaces only read from a `watch::Receiver` and send intents through
//! [`Actions`]; none of them holds its own copy of the notifications, so a
//! change made from one is visible in all of them on the next render.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::watch;

use crate::api::NotificationApi;
use crate::error::{MutationOutcome, NotificationError};
use crate::models::{Notification, NotificationStatus};
use crate::notice::Notices;
use crate::pagination::InfiniteScroll;
use crate::session::Session;
use crate::store::{NotificationStore, StoreState};
use crate::view::{self, NotificationRow, ViewFilter};

/// User intents. Failures are reported as toasts, then returned.
pub struct Actions<A> {
    store: Arc<NotificationStore<A>>,
    notices: Notices,
}

impl<A> Actions<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    fn new(session: &Session<A>) -> Self {
        Self {
            store: session.store().clone(),
            notices: session.notices().clone(),
        }
    }

    pub async fn mark_read(&self, id: i64) -> Result<MutationOutcome, NotificationError> {
        let result = self.store.mark_as_read(id).await;
        self.report("mark the notification as read", result).await
    }

    pub async fn mark_all_read(&self) -> Result<MutationOutcome, NotificationError> {
        let result = self.store.mark_all_as_read().await;
        self.report("mark all notifications as read", result).await
    }

    pub async fn clear(&self, id: i64) -> Result<MutationOutcome, NotificationError> {
        let result = self.store.clear_notification(id).await;
        self.report("clear the notification", result).await
    }

    pub async fn clear_all(&self) -> Result<MutationOutcome, NotificationError> {
        let result = self.store.clear_all().await;
        self.report("clear notifications", result).await
    }

    /// Reloads page 0 and the unread count together, as a polling tick does.
    pub async fn refresh(&self) -> Result<(), NotificationError> {
        let (refreshed, counted) =
            futures::join!(self.store.refresh(), self.store.refresh_unread_count());
        let result = refreshed.and(counted.map(|_| ()));
        self.report("refresh notifications", result).await
    }

    async fn report<T>(
        &self,
        action: &str,
        result: Result<T, NotificationError>,
    ) -> Result<T, NotificationError> {
        if let Err(e) = &result {
            self.notices.report_failure(action, e).await;
        }
        result
    }
}

fn unread_badge(count: u64) -> Option<String> {
    match count {
        0 => None,
        1..=9 => Some(count.to_string()),
        _ => Some("9+".to_string()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DropdownView {
    pub rows: Vec<NotificationRow>,
    pub badge: Option<String>,
    pub show_all_link: bool,
}

/// Compact header dropdown showing the newest few notifications.
pub struct Dropdown<A> {
    actions: Actions<A>,
    state: watch::Receiver<StoreState>,
    limit: usize,
}

impl<A> Dropdown<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(session: &Session<A>, limit: usize) -> Self {
        Self {
            actions: Actions::new(session),
            state: session.store().subscribe(),
            limit,
        }
    }

    pub fn actions(&self) -> &Actions<A> {
        &self.actions
    }

    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    pub fn render(&mut self) -> DropdownView {
        self.render_at(Utc::now())
    }

    pub fn render_at(&mut self, now: DateTime<Utc>) -> DropdownView {
        let state = self.state.borrow_and_update();
        DropdownView {
            rows: view::rows(&state.notifications, ViewFilter::All, Some(self.limit), now),
            badge: unread_badge(state.unread_count),
            show_all_link: state.notifications.len() > self.limit || state.has_more,
        }
    }

    /// Clicking a row marks it read and yields the booking to navigate to.
    pub async fn open(&self, id: i64) -> Result<Option<i64>, NotificationError> {
        let booking_id = self.state.borrow().get(id).and_then(|n| n.related_booking_id);
        self.actions.mark_read(id).await?;
        Ok(booking_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SidebarView {
    pub tab: ViewFilter,
    pub rows: Vec<NotificationRow>,
    pub total: usize,
    pub unread: u64,
}

/// Persistent sidebar with "all" and "unread" tabs.
pub struct Sidebar<A> {
    actions: Actions<A>,
    state: watch::Receiver<StoreState>,
    tab: ViewFilter,
}

impl<A> Sidebar<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(session: &Session<A>) -> Self {
        Self {
            actions: Actions::new(session),
            state: session.store().subscribe(),
            tab: ViewFilter::All,
        }
    }

    pub fn actions(&self) -> &Actions<A> {
        &self.actions
    }

    pub fn select_tab(&mut self, tab: ViewFilter) {
        self.tab = tab;
    }

    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    pub fn render(&mut self) -> SidebarView {
        self.render_at(Utc::now())
    }

    pub fn render_at(&mut self, now: DateTime<Utc>) -> SidebarView {
        let state = self.state.borrow_and_update();
        SidebarView {
            tab: self.tab,
            rows: view::rows(&state.notifications, self.tab, None, now),
            total: state.notifications.len(),
            unread: state.unread_count,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryView {
    pub rows: Vec<NotificationRow>,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<String>,
}

/// Full notification history with infinite scroll.
pub struct HistoryPage<A> {
    actions: Actions<A>,
    state: watch::Receiver<StoreState>,
    scroll: InfiniteScroll<A>,
}

impl<A> HistoryPage<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(session: &Session<A>) -> Self {
        Self {
            actions: Actions::new(session),
            state: session.store().subscribe(),
            scroll: InfiniteScroll::new(session.store().clone()),
        }
    }

    pub fn actions(&self) -> &Actions<A> {
        &self.actions
    }

    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    pub fn render(&mut self) -> HistoryView {
        self.render_at(Utc::now())
    }

    pub fn render_at(&mut self, now: DateTime<Utc>) -> HistoryView {
        let state = self.state.borrow_and_update().clone();
        let rows = view::rows(&state.notifications, ViewFilter::All, None, now);
        self.scroll.attach(rows.last().map(|row| row.id));
        HistoryView {
            rows,
            has_more: state.has_more,
            loading: state.loading,
            error: state.error.as_ref().map(|e| e.to_string()),
        }
    }

    /// Visibility of the last rendered row changed.
    pub async fn on_sentinel_visibility(&mut self, visible: bool) -> Result<bool, NotificationError> {
        self.scroll.on_visibility(visible).await
    }

    pub fn unmount(&mut self) {
        self.scroll.detach();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailModel {
    pub row: NotificationRow,
    pub status: NotificationStatus,
    pub created_at: String,
}

/// Single notification reached by id.
pub struct DetailView<A> {
    actions: Actions<A>,
    state: watch::Receiver<StoreState>,
    id: i64,
}

impl<A> DetailView<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(session: &Session<A>, id: i64) -> Self {
        Self {
            actions: Actions::new(session),
            state: session.store().subscribe(),
            id,
        }
    }

    pub fn actions(&self) -> &Actions<A> {
        &self.actions
    }

    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Marks the notification read when the view is shown.
    pub async fn open(&self) -> Result<MutationOutcome, NotificationError> {
        self.actions.mark_read(self.id).await
    }

    pub async fn clear(&self) -> Result<MutationOutcome, NotificationError> {
        self.actions.clear(self.id).await
    }

    pub fn render(&mut self) -> Option<DetailModel> {
        self.render_at(Utc::now())
    }

    /// `None` once the notification is no longer held, e.g. after it was cleared elsewhere.
    pub fn render_at(&mut self, now: DateTime<Utc>) -> Option<DetailModel> {
        let state = self.state.borrow_and_update();
        let notification: &Notification = state.get(self.id)?;
        Some(DetailModel {
            row: NotificationRow::new(notification, now),
            status: notification.status.clone(),
            created_at: notification.created_at.format("%B %-d, %Y at %H:%M").to_string(),
        })
    }
}
