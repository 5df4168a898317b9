use std::collections::HashSet;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::NotificationApi;
use crate::error::{MutationOutcome, NotificationError};
use crate::metrics;
use crate::models::Notification;

/// Snapshot of everything the surfaces render from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreState {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
    pub page: u32,
    pub has_more: bool,
    pub loading: bool,
    pub error: Option<NotificationError>,
    pending_fetches: u32,
    // Bumped whenever the held collection is replaced wholesale
    epoch: u64,
    // Last count reported by the unread-count endpoint, adjusted by local mutations
    server_unread: Option<u64>,
    closed: bool,
}

impl StoreState {
    pub fn get(&self, id: i64) -> Option<&Notification> {
        self.notifications.iter().find(|n| n.id == id)
    }

    pub fn held_unread(&self) -> u64 {
        self.notifications.iter().filter(|n| !n.is_read).count() as u64
    }

    fn begin_fetch(&mut self) {
        self.pending_fetches += 1;
        self.loading = true;
    }

    fn finish_fetch(&mut self) {
        self.pending_fetches = self.pending_fetches.saturating_sub(1);
        self.loading = self.pending_fetches > 0;
    }

    fn decrement_unread(&mut self) -> bool {
        if let Some(server) = self.server_unread.as_mut() {
            *server = server.saturating_sub(1);
        }
        if self.unread_count == 0 {
            return false;
        }
        self.unread_count -= 1;
        true
    }

    fn increment_unread(&mut self) {
        if let Some(server) = self.server_unread.as_mut() {
            *server += 1;
        }
        self.unread_count += 1;
    }
}

// One pending fetch. Releasing it on drop keeps `loading` accurate when the
// fetch future is cancelled before the response arrives.
struct FetchSlot<'a> {
    state: &'a watch::Sender<StoreState>,
    released: bool,
}

impl<'a> FetchSlot<'a> {
    fn new(state: &'a watch::Sender<StoreState>) -> Self {
        Self {
            state,
            released: false,
        }
    }

    // Frees the slot and applies the fetch result in the same state update
    fn release<F>(mut self, apply: F)
    where
        F: FnOnce(&mut StoreState),
    {
        self.released = true;
        self.state.send_modify(|state| {
            state.finish_fetch();
            apply(state);
        });
    }
}

impl Drop for FetchSlot<'_> {
    fn drop(&mut self) {
        if !self.released {
            debug!("Notification fetch abandoned before completion");
            self.state.send_modify(|state| state.finish_fetch());
        }
    }
}

struct ClearedSnapshot {
    notifications: Vec<Notification>,
    unread_count: u64,
    server_unread: Option<u64>,
    page: u32,
    has_more: bool,
}

/// Session-scoped cache of the user's notifications.
///
/// All writes go through the watch channel's `send_modify`, so counter
/// updates from overlapping calls are serialized and every subscriber sees
/// each change. Mutations are applied locally before the request is sent and
/// are rolled back (or resynchronized with a refresh) if it fails.
pub struct NotificationStore<A> {
    api: A,
    page_size: u32,
    state: watch::Sender<StoreState>,
}

impl<A> NotificationStore<A>
where
    A: NotificationApi + Send + Sync + 'static,
{
    pub fn new(api: A, page_size: u32) -> Self {
        let (state, _) = watch::channel(StoreState::default());
        Self {
            api,
            page_size: page_size.max(1),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreState {
        self.state.borrow().clone()
    }

    pub fn get(&self, id: i64) -> Option<Notification> {
        self.state.borrow().get(id).cloned()
    }

    pub fn can_load_more(&self) -> bool {
        let state = self.state.borrow();
        !state.closed && !state.loading && state.has_more
    }

    /// Replaces the held collection with page 0.
    ///
    /// Concurrent refreshes are last-resolved-wins.
    pub async fn refresh(&self) -> Result<(), NotificationError> {
        let Some(slot) = self.begin_fetch() else {
            return Ok(());
        };

        let timer = Instant::now();
        let result = self.api.list(0, self.page_size).await;
        metrics::FETCH_TIME.observe(timer.elapsed().as_secs_f64());

        match result {
            Ok(page) => {
                let mut seen = HashSet::new();
                let notifications: Vec<Notification> = page
                    .content
                    .into_iter()
                    .filter(|n| seen.insert(n.id))
                    .collect();

                slot.release(|state| {
                    if state.closed {
                        return;
                    }
                    state.notifications = notifications;
                    state.page = 0;
                    state.has_more = !page.last;
                    state.error = None;
                    state.epoch += 1;

                    let page_unread = state.held_unread();
                    if page.last {
                        // Page 0 holds everything, so its count is exact
                        state.server_unread = Some(page_unread);
                        state.unread_count = page_unread;
                    } else {
                        state.unread_count = page_unread.max(state.server_unread.unwrap_or(0));
                    }
                });

                metrics::REFRESHES.inc();
                debug!(unread = self.state.borrow().unread_count, "Refreshed notifications");
                Ok(())
            }
            Err(e) => {
                self.fail_fetch(slot, &e);
                Err(e)
            }
        }
    }

    /// Appends the next page. Returns `Ok(false)` when nothing was fetched or
    /// the page was superseded by a refresh.
    pub async fn load_more(&self) -> Result<bool, NotificationError> {
        let mut start = None;
        self.state.send_if_modified(|state| {
            if state.closed || state.loading || !state.has_more {
                return false;
            }
            state.begin_fetch();
            start = Some((state.page + 1, state.epoch));
            true
        });
        let Some((next_page, epoch)) = start else {
            return Ok(false);
        };
        let slot = FetchSlot::new(&self.state);

        let timer = Instant::now();
        let result = self.api.list(next_page, self.page_size).await;
        metrics::FETCH_TIME.observe(timer.elapsed().as_secs_f64());

        match result {
            Ok(page) => {
                let mut applied = false;
                slot.release(|state| {
                    if state.closed || state.epoch != epoch {
                        return;
                    }
                    let mut held: HashSet<i64> = state.notifications.iter().map(|n| n.id).collect();
                    for notification in page.content {
                        if held.insert(notification.id) {
                            state.notifications.push(notification);
                        }
                    }
                    state.page = next_page;
                    state.has_more = !page.last;
                    state.error = None;
                    state.unread_count = state.unread_count.max(state.held_unread());
                    applied = true;
                });

                if applied {
                    debug!(page = next_page, "Appended notifications page");
                } else {
                    debug!(page = next_page, "Discarded page superseded by a refresh");
                }
                Ok(applied)
            }
            Err(e) => {
                self.fail_fetch(slot, &e);
                Err(e)
            }
        }
    }

    /// Adopts the backend's unread count, which also covers items beyond the
    /// pages held locally.
    pub async fn refresh_unread_count(&self) -> Result<u64, NotificationError> {
        let count = self.api.unread_count().await?;
        self.state.send_if_modified(|state| {
            if state.closed {
                return false;
            }
            state.server_unread = Some(count);
            state.unread_count = count;
            true
        });
        Ok(count)
    }

    pub async fn mark_as_read(&self, id: i64) -> Result<MutationOutcome, NotificationError> {
        let mut outcome = MutationOutcome::NotFoundLocal;
        let mut applied = None;
        self.state.send_if_modified(|state| {
            let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) else {
                return false;
            };
            if notification.is_read {
                outcome = MutationOutcome::AlreadyRead;
                return false;
            }
            notification.is_read = true;
            let decremented = state.decrement_unread();
            outcome = MutationOutcome::Applied;
            applied = Some((state.epoch, decremented));
            true
        });
        let Some((epoch, decremented)) = applied else {
            debug!(id = %id, outcome = ?outcome, "Mark as read skipped");
            return Ok(outcome);
        };
        metrics::MUTATIONS.inc();

        match self.api.mark_read(id).await {
            Ok(()) => Ok(outcome),
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to mark notification as read");
                self.reconcile(epoch, move |state| {
                    if let Some(notification) = state.notifications.iter_mut().find(|n| n.id == id) {
                        if notification.is_read {
                            notification.is_read = false;
                            if decremented {
                                state.increment_unread();
                            }
                        }
                    }
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn mark_all_as_read(&self) -> Result<MutationOutcome, NotificationError> {
        let mut previous = None;
        self.state.send_modify(|state| {
            let unread: HashSet<i64> = state
                .notifications
                .iter()
                .filter(|n| !n.is_read)
                .map(|n| n.id)
                .collect();
            previous = Some((state.epoch, unread, state.unread_count, state.server_unread));
            for notification in state.notifications.iter_mut() {
                notification.is_read = true;
            }
            state.unread_count = 0;
            state.server_unread = Some(0);
        });
        let Some((epoch, unread, unread_count, server_unread)) = previous else {
            return Ok(MutationOutcome::NotFoundLocal);
        };
        metrics::MUTATIONS.inc();

        match self.api.mark_all_read().await {
            Ok(()) => Ok(MutationOutcome::Applied),
            Err(e) => {
                warn!(error = %e, "Failed to mark all notifications as read");
                self.reconcile(epoch, move |state| {
                    for notification in state.notifications.iter_mut() {
                        if unread.contains(&notification.id) {
                            notification.is_read = false;
                        }
                    }
                    state.unread_count = unread_count;
                    state.server_unread = server_unread;
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn clear_notification(&self, id: i64) -> Result<MutationOutcome, NotificationError> {
        let mut removed = None;
        self.state.send_if_modified(|state| {
            let Some(index) = state.notifications.iter().position(|n| n.id == id) else {
                return false;
            };
            let notification = state.notifications.remove(index);
            let decremented = !notification.is_read && state.decrement_unread();
            removed = Some((state.epoch, index, notification, decremented));
            true
        });
        let Some((epoch, index, notification, decremented)) = removed else {
            debug!(id = %id, "Clear skipped, notification not held");
            return Ok(MutationOutcome::NotFoundLocal);
        };
        metrics::MUTATIONS.inc();

        match self.api.delete(id).await {
            Ok(()) => Ok(MutationOutcome::Applied),
            Err(e) => {
                warn!(id = %id, error = %e, "Failed to clear notification");
                self.reconcile(epoch, move |state| {
                    if state.get(id).is_none() {
                        let index = index.min(state.notifications.len());
                        state.notifications.insert(index, notification);
                        if decremented {
                            state.increment_unread();
                        }
                    }
                })
                .await;
                Err(e)
            }
        }
    }

    pub async fn clear_all(&self) -> Result<MutationOutcome, NotificationError> {
        let mut cleared = None;
        self.state.send_modify(|state| {
            let snapshot = ClearedSnapshot {
                notifications: std::mem::take(&mut state.notifications),
                unread_count: state.unread_count,
                server_unread: state.server_unread,
                page: state.page,
                has_more: state.has_more,
            };
            state.unread_count = 0;
            state.server_unread = Some(0);
            state.page = 0;
            state.has_more = false;
            state.epoch += 1;
            cleared = Some((state.epoch, snapshot));
        });
        let Some((epoch, snapshot)) = cleared else {
            return Ok(MutationOutcome::NotFoundLocal);
        };
        metrics::MUTATIONS.inc();

        match self.api.clear_all().await {
            Ok(()) => {
                info!(cleared = snapshot.notifications.len(), "Cleared all notifications");
                Ok(MutationOutcome::Applied)
            }
            Err(e) => {
                warn!(error = %e, "Failed to clear all notifications");
                self.reconcile(epoch, move |state| {
                    state.notifications = snapshot.notifications;
                    state.unread_count = snapshot.unread_count;
                    state.server_unread = snapshot.server_unread;
                    state.page = snapshot.page;
                    state.has_more = snapshot.has_more;
                })
                .await;
                Err(e)
            }
        }
    }

    /// Empties the store at logout; results of requests still in flight are dropped.
    pub fn reset(&self) {
        self.state.send_modify(|state| {
            *state = StoreState {
                closed: true,
                ..StoreState::default()
            };
        });
    }

    fn begin_fetch(&self) -> Option<FetchSlot<'_>> {
        let started = self.state.send_if_modified(|state| {
            if state.closed {
                return false;
            }
            state.begin_fetch();
            true
        });
        started.then(|| FetchSlot::new(&self.state))
    }

    fn fail_fetch(&self, slot: FetchSlot<'_>, e: &NotificationError) {
        metrics::FETCH_FAILURES.inc();
        debug!(error = %e, "Notification fetch failed");
        let error = e.clone();
        slot.release(|state| {
            if !state.closed {
                state.error = Some(error);
            }
        });
    }

    // Reverts a failed optimistic change if nothing replaced the collection
    // since it was applied; otherwise the local view is stale and page 0 is
    // fetched again.
    async fn reconcile<F>(&self, epoch: u64, revert: F)
    where
        F: FnOnce(&mut StoreState) + Send,
    {
        let mut reverted = false;
        let mut closed = false;
        self.state.send_if_modified(|state| {
            closed = state.closed;
            if state.closed || state.epoch != epoch {
                return false;
            }
            revert(state);
            reverted = true;
            true
        });

        if reverted {
            metrics::ROLLBACKS.inc();
            return;
        }
        if closed {
            return;
        }

        metrics::RESYNCS.inc();
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Resync after failed mutation also failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{notification, FakeApi};
    use rstest::{fixture, rstest};
    use std::sync::Arc;
    use std::time::Duration;

    fn store(api: FakeApi) -> Arc<NotificationStore<FakeApi>> {
        Arc::new(NotificationStore::new(api, 10))
    }

    #[fixture]
    fn five_with_two_unread() -> FakeApi {
        FakeApi::with_notifications(vec![
            notification(1, false, 5),
            notification(2, true, 10),
            notification(3, false, 15),
            notification(4, true, 20),
            notification(5, true, 25),
        ])
    }

    fn ids(state: &StoreState) -> Vec<i64> {
        state.notifications.iter().map(|n| n.id).collect()
    }

    #[rstest]
    #[tokio::test]
    async fn refresh_replaces_the_collection(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();

        five_with_two_unread.set_notifications(vec![notification(9, false, 1)]);
        store.refresh().await.unwrap();

        let state = store.snapshot();
        assert_eq!(ids(&state), vec![9]);
        assert_eq!(state.unread_count, 1);
        assert_eq!(state.page, 0);
        assert!(!state.has_more);
        assert!(!state.loading);
    }

    #[rstest]
    #[tokio::test]
    async fn mark_as_read_twice_is_idempotent(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();

        assert_eq!(store.mark_as_read(1).await.unwrap(), MutationOutcome::Applied);
        assert_eq!(store.snapshot().unread_count, 1);

        assert_eq!(store.mark_as_read(1).await.unwrap(), MutationOutcome::AlreadyRead);
        assert_eq!(store.snapshot().unread_count, 1);
        assert_eq!(five_with_two_unread.mutation_calls(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn missing_id_is_a_local_no_op(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();

        assert_eq!(store.mark_as_read(42).await.unwrap(), MutationOutcome::NotFoundLocal);
        assert_eq!(
            store.clear_notification(42).await.unwrap(),
            MutationOutcome::NotFoundLocal
        );
        assert_eq!(five_with_two_unread.mutation_calls(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn counter_never_goes_negative(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        five_with_two_unread.set_mutation_delay(Duration::from_millis(20));

        let (a, b, c, d) = tokio::join!(
            store.mark_as_read(1),
            store.clear_notification(1),
            store.clear_notification(3),
            store.mark_as_read(3),
        );
        for result in [a, b, c, d] {
            assert!(result.is_ok());
        }

        let state = store.snapshot();
        assert_eq!(state.unread_count, 0);
        assert_eq!(ids(&state), vec![2, 4, 5]);

        // Force the counter to zero, then clear an entry still flagged unread
        five_with_two_unread.set_notifications(vec![notification(7, false, 1)]);
        five_with_two_unread.set_unread_count(Some(0));
        store.refresh().await.unwrap();
        store.refresh_unread_count().await.unwrap();
        store.clear_notification(7).await.unwrap();
        assert_eq!(store.snapshot().unread_count, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn concurrent_marks_do_not_lose_updates() {
        let api = FakeApi::with_notifications((1..=6).map(|id| notification(id, false, id)).collect());
        api.set_mutation_delay(Duration::from_millis(10));
        let store = store(api);
        store.refresh().await.unwrap();

        let marks = (1..=6).map(|id| store.mark_as_read(id));
        let results = futures::future::join_all(marks).await;

        assert!(results.iter().all(|r| *r == Ok(MutationOutcome::Applied)));
        assert_eq!(store.snapshot().unread_count, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn load_more_deduplicates_overlapping_pages() {
        let api = FakeApi::default();
        api.script_page(0, vec![notification(1, false, 1), notification(2, true, 2), notification(3, true, 3)], false);
        api.script_page(1, vec![notification(3, true, 3), notification(4, false, 4), notification(5, true, 5)], true);
        let store = store(api);

        store.refresh().await.unwrap();
        assert!(store.load_more().await.unwrap());

        let state = store.snapshot();
        assert_eq!(ids(&state), vec![1, 2, 3, 4, 5]);
        assert_eq!(state.page, 1);
        assert!(!state.has_more);
        assert_eq!(state.unread_count, 2);

        // Nothing more to fetch
        assert!(!store.load_more().await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn load_more_is_skipped_while_loading() {
        let api = FakeApi::default();
        api.script_page(0, vec![notification(1, false, 1)], false);
        api.script_page(1, vec![notification(2, false, 2)], false);
        api.set_list_delay(Duration::from_millis(30));
        let store = store(api.clone());
        store.refresh().await.unwrap();

        let (first, second) = tokio::join!(store.load_more(), store.load_more());

        assert!(first.unwrap());
        assert!(!second.unwrap());
        assert_eq!(api.list_calls(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn refresh_discards_in_flight_pagination() {
        let api = FakeApi::default();
        api.script_page(0, vec![notification(1, false, 1)], false);
        api.script_page(1, vec![notification(2, false, 2)], false);
        let store = store(api.clone());
        store.refresh().await.unwrap();

        api.set_list_delay(Duration::from_millis(40));
        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.load_more().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        api.set_list_delay(Duration::ZERO);
        store.refresh().await.unwrap();

        assert!(!pending.await.unwrap().unwrap());
        let state = store.snapshot();
        assert_eq!(ids(&state), vec![1]);
        assert_eq!(state.page, 0);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_mark_as_read_rolls_back(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        five_with_two_unread.fail_mutations(Some(NotificationError::Network("offline".into())));
        five_with_two_unread.set_mutation_delay(Duration::from_millis(30));

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_as_read(1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Applied before the request resolved
        assert!(store.get(1).unwrap().is_read);
        assert_eq!(store.snapshot().unread_count, 1);

        let result = pending.await.unwrap();
        assert_eq!(result, Err(NotificationError::Network("offline".into())));
        assert!(!store.get(1).unwrap().is_read);
        assert_eq!(store.snapshot().unread_count, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_clear_restores_position_and_count(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        five_with_two_unread.fail_mutations(Some(NotificationError::Server {
            status: 500,
            message: "boom".into(),
        }));

        assert!(store.clear_notification(3).await.is_err());

        let state = store.snapshot();
        assert_eq!(ids(&state), vec![1, 2, 3, 4, 5]);
        assert_eq!(state.unread_count, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_clear_all_restores_snapshot(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        let before = store.snapshot();
        five_with_two_unread.fail_mutations(Some(NotificationError::Permission("no".into())));

        assert!(store.clear_all().await.is_err());

        let after = store.snapshot();
        assert_eq!(after.notifications, before.notifications);
        assert_eq!(after.unread_count, before.unread_count);
    }

    #[rstest]
    #[tokio::test]
    async fn failed_mutation_after_refresh_resyncs(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        five_with_two_unread.fail_mutations(Some(NotificationError::Network("offline".into())));
        five_with_two_unread.set_mutation_delay(Duration::from_millis(30));

        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.mark_as_read(1).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.refresh().await.unwrap();
        let calls_before = five_with_two_unread.list_calls();

        assert!(pending.await.unwrap().is_err());
        assert_eq!(five_with_two_unread.list_calls(), calls_before + 1);
        assert!(!store.get(1).unwrap().is_read);
        assert_eq!(store.snapshot().unread_count, 2);
    }

    #[rstest]
    #[tokio::test]
    async fn clear_all_then_refresh(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        assert_eq!(store.snapshot().unread_count, 2);

        store.clear_all().await.unwrap();
        let state = store.snapshot();
        assert!(state.notifications.is_empty());
        assert_eq!(state.unread_count, 0);

        // A backend that honours clear-all returns nothing afterwards
        store.refresh().await.unwrap();
        assert!(store.snapshot().notifications.is_empty());
    }

    #[rstest]
    #[case::count_resolves_last(false)]
    #[case::refresh_resolves_last(true)]
    #[tokio::test]
    async fn server_unread_count_wins_over_page_count(#[case] refresh_last: bool) {
        let api = FakeApi::default();
        let page: Vec<Notification> = (1..=10).map(|id| notification(id, id > 3, id)).collect();
        api.script_page(0, page, false);
        api.set_unread_count(Some(7));
        let store = store(api);

        if refresh_last {
            store.refresh_unread_count().await.unwrap();
            store.refresh().await.unwrap();
        } else {
            store.refresh().await.unwrap();
            assert_eq!(store.snapshot().unread_count, 3);
            store.refresh_unread_count().await.unwrap();
        }

        assert_eq!(store.snapshot().unread_count, 7);
    }

    #[rstest]
    #[tokio::test]
    async fn mark_all_as_read_zeroes_the_counter(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();

        store.mark_all_as_read().await.unwrap();

        let state = store.snapshot();
        assert!(state.notifications.iter().all(|n| n.is_read));
        assert_eq!(state.unread_count, 0);

        five_with_two_unread.fail_mutations(Some(NotificationError::Network("offline".into())));
        five_with_two_unread.set_notifications(vec![notification(1, false, 1), notification(2, true, 2)]);
        store.refresh().await.unwrap();
        assert!(store.mark_all_as_read().await.is_err());
        assert!(!store.get(1).unwrap().is_read);
        assert_eq!(store.snapshot().unread_count, 1);
    }

    #[rstest]
    #[tokio::test]
    async fn fetch_failure_keeps_last_good_state(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        five_with_two_unread.fail_fetches(Some(NotificationError::Server {
            status: 503,
            message: "maintenance".into(),
        }));

        assert!(store.refresh().await.is_err());

        let state = store.snapshot();
        assert_eq!(state.notifications.len(), 5);
        assert!(matches!(state.error, Some(NotificationError::Server { status: 503, .. })));
        assert!(!state.loading);

        five_with_two_unread.fail_fetches(None);
        store.refresh().await.unwrap();
        assert!(store.snapshot().error.is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn subscribers_see_mutations_without_fetching(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        store.refresh().await.unwrap();
        let mut surface_a = store.subscribe();
        let mut surface_b = store.subscribe();
        surface_a.borrow_and_update();
        surface_b.borrow_and_update();
        let calls = five_with_two_unread.list_calls();

        store.clear_notification(2).await.unwrap();

        assert!(surface_b.has_changed().unwrap());
        assert!(surface_b.borrow_and_update().get(2).is_none());
        assert!(surface_a.borrow_and_update().get(2).is_none());
        assert_eq!(five_with_two_unread.list_calls(), calls);
    }

    #[rstest]
    #[tokio::test]
    async fn reset_drops_late_results(five_with_two_unread: FakeApi) {
        let store = store(five_with_two_unread.clone());
        five_with_two_unread.set_list_delay(Duration::from_millis(30));
        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        store.reset();
        pending.await.unwrap().unwrap();

        let state = store.snapshot();
        assert!(state.notifications.is_empty());
        assert!(!state.loading);
    }

    async fn twenty_five_unread() -> (FakeApi, Arc<NotificationStore<FakeApi>>) {
        let api = FakeApi::with_notifications((1..=25).map(|id| notification(id, false, id)).collect());
        let store = store(api.clone());
        store.refresh().await.unwrap();
        (api, store)
    }

    #[rstest]
    #[tokio::test]
    async fn abandoned_load_more_releases_loading() {
        let (api, store) = twenty_five_unread().await;
        api.set_list_delay(Duration::from_millis(50));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), store.load_more()).await;
        assert!(abandoned.is_err());
        assert!(!store.snapshot().loading);
        assert!(store.can_load_more());

        api.set_list_delay(Duration::ZERO);
        assert!(store.load_more().await.unwrap());
        assert_eq!(store.snapshot().notifications.len(), 20);
    }

    #[rstest]
    #[tokio::test]
    async fn abandoned_refresh_releases_loading() {
        let (api, store) = twenty_five_unread().await;
        api.set_list_delay(Duration::from_millis(50));

        let abandoned = tokio::time::timeout(Duration::from_millis(10), store.refresh()).await;
        assert!(abandoned.is_err());

        let state = store.snapshot();
        assert!(!state.loading);
        assert_eq!(state.notifications.len(), 10);

        api.set_list_delay(Duration::ZERO);
        assert!(store.load_more().await.unwrap());
    }

    #[rstest]
    #[tokio::test]
    async fn abandoned_fetch_leaves_other_fetches_loading() {
        let (api, store) = twenty_five_unread().await;
        api.set_list_delay(Duration::from_millis(50));
        let pending = {
            let store = store.clone();
            tokio::spawn(async move { store.refresh().await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let abandoned = tokio::time::timeout(Duration::from_millis(10), store.refresh()).await;
        assert!(abandoned.is_err());
        assert!(store.snapshot().loading);

        pending.await.unwrap().unwrap();
        assert!(!store.snapshot().loading);
    }
}
