pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod notice;
pub mod pagination;
pub mod poller;
pub mod session;
pub mod store;
pub mod surfaces;
pub mod view;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{HttpNotificationApi, NotificationApi};
pub use error::{MutationOutcome, NotificationError};
pub use models::{Notification, NotificationPage, NotificationStatus, NotificationType};
pub use session::{Credentials, Session, SessionEvent};
pub use store::{NotificationStore, StoreState};
