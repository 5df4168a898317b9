use chrono::{DateTime, Utc};
use std::cmp::Reverse;

use crate::models::{Notification, NotificationStatus, NotificationType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewFilter {
    #[default]
    All,
    Unread,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Booking,
    Approved,
    Rejected,
    Message,
    Review,
    Payment,
    System,
    Info,
}

/// One rendered notification row.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRow {
    pub id: i64,
    pub message: String,
    pub icon: IconKind,
    pub time_ago: String,
    pub is_read: bool,
    pub booking_id: Option<i64>,
}

impl NotificationRow {
    pub fn new(notification: &Notification, now: DateTime<Utc>) -> Self {
        Self {
            id: notification.id,
            message: notification.message.clone(),
            icon: icon_for(notification),
            time_ago: time_ago(notification.created_at, now),
            is_read: notification.is_read,
            booking_id: notification.related_booking_id,
        }
    }
}

/// Orders notifications for display.
///
/// `All` puts unread first, then newest first; `Unread` keeps only unread
/// entries, newest first.
pub fn sorted(notifications: &[Notification], filter: ViewFilter) -> Vec<&Notification> {
    let mut visible: Vec<&Notification> = notifications
        .iter()
        .filter(|n| filter == ViewFilter::All || !n.is_read)
        .collect();

    match filter {
        ViewFilter::All => visible.sort_by_key(|n| (n.is_read, Reverse(n.created_at))),
        ViewFilter::Unread => visible.sort_by_key(|n| Reverse(n.created_at)),
    }
    visible
}

pub fn rows(
    notifications: &[Notification],
    filter: ViewFilter,
    limit: Option<usize>,
    now: DateTime<Utc>,
) -> Vec<NotificationRow> {
    sorted(notifications, filter)
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|n| NotificationRow::new(n, now))
        .collect()
}

pub fn icon_for(notification: &Notification) -> IconKind {
    match (&notification.notification_type, &notification.status) {
        (_, NotificationStatus::BookingApproved | NotificationStatus::BookingCompleted) => {
            IconKind::Approved
        }
        (_, NotificationStatus::BookingRejected | NotificationStatus::BookingCancelled) => {
            IconKind::Rejected
        }
        (NotificationType::Booking, _) | (_, NotificationStatus::BookingRequest) => IconKind::Booking,
        (NotificationType::Message, _) | (_, NotificationStatus::NewMessage) => IconKind::Message,
        (NotificationType::Review, _) | (_, NotificationStatus::NewReview) => IconKind::Review,
        (NotificationType::Payment, _) => IconKind::Payment,
        (NotificationType::System, _) => IconKind::System,
        _ => IconKind::Info,
    }
}

pub fn time_ago(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(created_at);
    let plural = |n: i64, unit: &str| {
        if n == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", n, unit)
        }
    };

    if elapsed.num_minutes() < 1 {
        "just now".to_string()
    } else if elapsed.num_hours() < 1 {
        plural(elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        plural(elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 30 {
        plural(elapsed.num_days(), "day")
    } else {
        created_at.format("%b %-d, %Y").to_string()
    }
}
