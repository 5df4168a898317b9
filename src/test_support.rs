use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::api::NotificationApi;
use crate::error::NotificationError;
use crate::models::{Notification, NotificationPage, NotificationStatus, NotificationType};

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

/// A notification created `minutes_ago` minutes before [`base_time`].
pub fn notification(id: i64, is_read: bool, minutes_ago: i64) -> Notification {
    Notification {
        id,
        message: format!("Booking #{} was approved", id),
        status: NotificationStatus::BookingApproved,
        notification_type: NotificationType::Booking,
        related_booking_id: Some(id * 10),
        is_read,
        created_at: base_time() - ChronoDuration::minutes(minutes_ago),
    }
}

#[derive(Default)]
struct FakeBackend {
    notifications: Vec<Notification>,
    scripted: HashMap<u32, (Vec<Notification>, bool)>,
    unread_count: Option<u64>,
    list_delay: Duration,
    mutation_delay: Duration,
    fetch_error: Option<NotificationError>,
    mutation_error: Option<NotificationError>,
    list_calls: usize,
    mutation_calls: usize,
}

/// In-memory backend with scriptable pages, delays and failures.
#[derive(Clone, Default)]
pub struct FakeApi {
    backend: Arc<Mutex<FakeBackend>>,
}

impl FakeApi {
    pub fn with_notifications(notifications: Vec<Notification>) -> Self {
        let api = Self::default();
        api.set_notifications(notifications);
        api
    }

    pub fn set_notifications(&self, notifications: Vec<Notification>) {
        let mut backend = self.backend.lock().unwrap();
        backend.notifications = notifications;
        backend.scripted.clear();
    }

    pub fn script_page(&self, page: u32, content: Vec<Notification>, last: bool) {
        self.backend.lock().unwrap().scripted.insert(page, (content, last));
    }

    pub fn set_unread_count(&self, count: Option<u64>) {
        self.backend.lock().unwrap().unread_count = count;
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.backend.lock().unwrap().list_delay = delay;
    }

    pub fn set_mutation_delay(&self, delay: Duration) {
        self.backend.lock().unwrap().mutation_delay = delay;
    }

    pub fn fail_fetches(&self, error: Option<NotificationError>) {
        self.backend.lock().unwrap().fetch_error = error;
    }

    pub fn fail_mutations(&self, error: Option<NotificationError>) {
        self.backend.lock().unwrap().mutation_error = error;
    }

    pub fn list_calls(&self) -> usize {
        self.backend.lock().unwrap().list_calls
    }

    pub fn mutation_calls(&self) -> usize {
        self.backend.lock().unwrap().mutation_calls
    }

    async fn mutate(
        &self,
        apply: impl FnOnce(&mut Vec<Notification>),
    ) -> Result<(), NotificationError> {
        let delay = {
            let mut backend = self.backend.lock().unwrap();
            backend.mutation_calls += 1;
            backend.mutation_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut backend = self.backend.lock().unwrap();
        if let Some(e) = backend.mutation_error.clone() {
            return Err(e);
        }
        apply(&mut backend.notifications);
        Ok(())
    }
}

impl NotificationApi for FakeApi {
    async fn list(&self, page: u32, size: u32) -> Result<NotificationPage, NotificationError> {
        let delay = {
            let mut backend = self.backend.lock().unwrap();
            backend.list_calls += 1;
            backend.list_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let backend = self.backend.lock().unwrap();
        if let Some(e) = backend.fetch_error.clone() {
            return Err(e);
        }

        let (content, last) = match backend.scripted.get(&page) {
            Some((content, last)) => (content.clone(), *last),
            None => {
                let start = (page * size) as usize;
                let end = (start + size as usize).min(backend.notifications.len());
                let content = backend
                    .notifications
                    .get(start..end)
                    .map(|slice| slice.to_vec())
                    .unwrap_or_default();
                (content, end >= backend.notifications.len())
            }
        };

        Ok(NotificationPage {
            content,
            last,
            total_elements: backend.notifications.len() as u64,
            number: page,
            size,
        })
    }

    async fn unread_count(&self) -> Result<u64, NotificationError> {
        let backend = self.backend.lock().unwrap();
        if let Some(e) = backend.fetch_error.clone() {
            return Err(e);
        }
        Ok(backend
            .unread_count
            .unwrap_or_else(|| backend.notifications.iter().filter(|n| !n.is_read).count() as u64))
    }

    async fn mark_read(&self, id: i64) -> Result<(), NotificationError> {
        self.mutate(|notifications| {
            if let Some(n) = notifications.iter_mut().find(|n| n.id == id) {
                n.is_read = true;
            }
        })
        .await
    }

    async fn mark_all_read(&self) -> Result<(), NotificationError> {
        self.mutate(|notifications| notifications.iter_mut().for_each(|n| n.is_read = true))
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), NotificationError> {
        self.mutate(|notifications| notifications.retain(|n| n.id != id))
            .await
    }

    async fn clear_all(&self) -> Result<(), NotificationError> {
        self.mutate(|notifications| notifications.clear()).await
    }
}
