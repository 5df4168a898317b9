use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One event delivered to the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub message: String,
    pub status: NotificationStatus,
    pub notification_type: NotificationType,
    #[serde(default)]
    pub related_booking_id: Option<i64>,
    #[serde(default)]
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// What the notification is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationStatus {
    BookingRequest,
    BookingApproved,
    BookingRejected,
    BookingCancelled,
    BookingCompleted,
    NewMessage,
    NewReview,
    Info,
    Other(String),
}

impl From<String> for NotificationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "BOOKING_REQUEST" => Self::BookingRequest,
            "BOOKING_APPROVED" => Self::BookingApproved,
            "BOOKING_REJECTED" => Self::BookingRejected,
            "BOOKING_CANCELLED" => Self::BookingCancelled,
            "BOOKING_COMPLETED" => Self::BookingCompleted,
            "NEW_MESSAGE" => Self::NewMessage,
            "NEW_REVIEW" => Self::NewReview,
            "INFO" => Self::Info,
            _ => Self::Other(value),
        }
    }
}

impl From<NotificationStatus> for String {
    fn from(value: NotificationStatus) -> Self {
        match value {
            NotificationStatus::BookingRequest => "BOOKING_REQUEST".to_string(),
            NotificationStatus::BookingApproved => "BOOKING_APPROVED".to_string(),
            NotificationStatus::BookingRejected => "BOOKING_REJECTED".to_string(),
            NotificationStatus::BookingCancelled => "BOOKING_CANCELLED".to_string(),
            NotificationStatus::BookingCompleted => "BOOKING_COMPLETED".to_string(),
            NotificationStatus::NewMessage => "NEW_MESSAGE".to_string(),
            NotificationStatus::NewReview => "NEW_REVIEW".to_string(),
            NotificationStatus::Info => "INFO".to_string(),
            NotificationStatus::Other(other) => other,
        }
    }
}

// Only used to pick an icon; overlaps with the status on purpose
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationType {
    Booking,
    Message,
    Review,
    Payment,
    System,
    Info,
    Other(String),
}

impl From<String> for NotificationType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "BOOKING" => Self::Booking,
            "MESSAGE" => Self::Message,
            "REVIEW" => Self::Review,
            "PAYMENT" => Self::Payment,
            "SYSTEM" => Self::System,
            "INFO" => Self::Info,
            _ => Self::Other(value),
        }
    }
}

impl From<NotificationType> for String {
    fn from(value: NotificationType) -> Self {
        match value {
            NotificationType::Booking => "BOOKING".to_string(),
            NotificationType::Message => "MESSAGE".to_string(),
            NotificationType::Review => "REVIEW".to_string(),
            NotificationType::Payment => "PAYMENT".to_string(),
            NotificationType::System => "SYSTEM".to_string(),
            NotificationType::Info => "INFO".to_string(),
            NotificationType::Other(other) => other,
        }
    }
}

/// Page envelope returned by `GET /api/notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPage {
    pub content: Vec<Notification>,
    pub last: bool,
    #[serde(default)]
    pub total_elements: u64,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}
