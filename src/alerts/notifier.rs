//! ntfy push delivery.
//!
//! The alert body is posted as plain text to a topic URL. Empty messages are
//! never sent.

use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("ntfy returned status {status}: {body}")]
    Status { status: u16, body: String },
}

pub struct Notifier {
    topic_url: String,
    client: reqwest::Client,
}

impl Notifier {
    pub fn new(topic_url: String) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { topic_url, client })
    }

    /// Post `message`. Returns `Ok(false)` without touching the network when
    /// there is nothing to say.
    pub async fn send(&self, message: &str) -> Result<bool, NotifyError> {
        if message.is_empty() {
            debug!("no alert lines, skipping notification");
            return Ok(false);
        }

        let resp = self
            .client
            .post(&self.topic_url)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(message.to_string())
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            topic = %self.topic_url,
            lines = message.lines().count(),
            response = %body,
            "alert delivered"
        );
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;
    use std::sync::{Arc, Mutex};

    /// A topic endpoint answering with `status` and recording every body.
    async fn topic_server(status: StatusCode) -> (String, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorded = seen.clone();
        let app = Router::new().route(
            "/topic",
            post(move |body: String| {
                let recorded = recorded.clone();
                async move {
                    recorded.lock().unwrap().push(body);
                    (status, "slow down")
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/topic"), seen)
    }

    #[tokio::test]
    async fn test_message_is_posted() {
        let (url, seen) = topic_server(StatusCode::OK).await;
        let notifier = Notifier::new(url).unwrap();

        assert!(notifier.send("a has guaranteed profit: 1.00").await.unwrap());
        assert_eq!(*seen.lock().unwrap(), vec!["a has guaranteed profit: 1.00"]);
    }

    #[tokio::test]
    async fn test_rejected_post_is_status_error() {
        let (url, _) = topic_server(StatusCode::TOO_MANY_REQUESTS).await;
        let notifier = Notifier::new(url).unwrap();

        let err = notifier.send("a has guaranteed profit: 1.00").await.unwrap_err();
        match err {
            NotifyError::Status { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_empty_message_is_not_sent() {
        // Nothing listens here; an actual request would fail.
        let notifier = Notifier::new("http://127.0.0.1:9/unreachable".to_string()).unwrap();
        assert!(!notifier.send("").await.unwrap());
    }

    #[tokio::test]
    async fn test_unreachable_topic_is_request_error() {
        let notifier = Notifier::new("http://127.0.0.1:9/unreachable".to_string()).unwrap();
        let err = notifier.send("a has guaranteed profit: 1.00").await.unwrap_err();
        assert!(matches!(err, NotifyError::Request(_)));
    }
}
