use reqwest::{Client as HttpClient, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::NotificationError;
use crate::models::NotificationPage;
use crate::session::Credentials;

const MAX_RETRIES: u8 = 3;

/// Backend operations the store depends on.
#[trait_variant::make(NotificationApi: Send)]
pub trait LocalNotificationApi {
    async fn list(&self, page: u32, size: u32) -> Result<NotificationPage, NotificationError>;
    async fn unread_count(&self) -> Result<u64, NotificationError>;
    async fn mark_read(&self, id: i64) -> Result<(), NotificationError>;
    async fn mark_all_read(&self) -> Result<(), NotificationError>;
    async fn delete(&self, id: i64) -> Result<(), NotificationError>;
    async fn clear_all(&self) -> Result<(), NotificationError>;
}

/// REST client for `/api/notifications`.
///
/// A 401 from any call clears the session credential once, here, so callers
/// only ever see [`NotificationError::Auth`].
#[derive(Clone)]
pub struct HttpNotificationApi {
    http_client: HttpClient,
    base_url: String,
    credentials: Arc<Credentials>,
}

impl HttpNotificationApi {
    pub fn new(
        base_url: &str,
        credentials: Arc<Credentials>,
        timeout: Duration,
    ) -> Result<Self, NotificationError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/notifications{}", self.base_url, path)
    }

    async fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, NotificationError> {
        let token = self
            .credentials
            .bearer()
            .await
            .ok_or(NotificationError::NoSession)?;

        Ok(self
            .http_client
            .request(method, self.url(path))
            .bearer_auth(token))
    }

    // GETs are idempotent, so transport failures are retried with backoff
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, NotificationError> {
        let mut retry_count = 0;
        let mut backoff_ms = 100;

        loop {
            let request = self.request(Method::GET, path).await?.query(query);
            match request.send().await {
                Ok(response) => {
                    let response = self.check_status(response).await?;
                    return response.json::<T>().await.map_err(|e| {
                        NotificationError::Decode(format!("{}: {}", path, e))
                    });
                }
                Err(e) => {
                    retry_count += 1;
                    if retry_count >= MAX_RETRIES {
                        warn!(path = %path, error = %e, "Giving up after maximum retries");
                        return Err(e.into());
                    }
                    debug!(path = %path, error = %e, attempt = retry_count, "Request failed, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), NotificationError> {
        let response = self.request(method, path).await?.send().await?;
        self.check_status(response).await?;
        Ok(())
    }

    async fn check_status(&self, response: Response) -> Result<Response, NotificationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match status {
            StatusCode::UNAUTHORIZED => {
                self.credentials.expire().await;
                Err(NotificationError::Auth)
            }
            StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                Err(NotificationError::Permission(body))
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(NotificationError::Server {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }
}

impl NotificationApi for HttpNotificationApi {
    async fn list(&self, page: u32, size: u32) -> Result<NotificationPage, NotificationError> {
        self.get_json(
            "",
            &[("page", page.to_string()), ("size", size.to_string())],
        )
        .await
    }

    async fn unread_count(&self) -> Result<u64, NotificationError> {
        self.get_json("/unread-count", &[]).await
    }

    async fn mark_read(&self, id: i64) -> Result<(), NotificationError> {
        self.send_empty(Method::PUT, &format!("/{}/mark-read", id)).await
    }

    async fn mark_all_read(&self) -> Result<(), NotificationError> {
        self.send_empty(Method::PUT, "/mark-all-read").await
    }

    async fn delete(&self, id: i64) -> Result<(), NotificationError> {
        self.send_empty(Method::DELETE, &format!("/{}/delete", id)).await
    }

    async fn clear_all(&self) -> Result<(), NotificationError> {
        self.send_empty(Method::DELETE, "/clear-all").await
    }
}
