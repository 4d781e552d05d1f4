//! Webhook listener that forwards detections as JSON

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::WebhookConfig;
use crate::events::{EventListener, QueryDetected, QUERY_DETECTED};
use crate::io::HttpClient;

/// Posts every detection to a fixed URL
pub struct WebhookListener {
    url: String,
    http: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for WebhookListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookListener")
            .field("url", &self.url)
            .finish()
    }
}

impl WebhookListener {
    pub fn new(config: &WebhookConfig, http: Arc<dyn HttpClient>) -> Self {
        tracing::debug!("Created WebhookListener for {}", config.url);
        Self {
            url: config.url.clone(),
            http,
        }
    }
}

#[async_trait]
impl EventListener for WebhookListener {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn on_query_detected(&self, event: &QueryDetected) -> crate::Result<()> {
        let body = serde_json::json!({
            "event": QUERY_DETECTED,
            "tracker": event.tracker,
            "time": event.occurred_at.display,
            "epoch_ms": event.occurred_at.epoch_ms,
        });

        let response = self.http.post_json(&self.url, &body).await?;

        if !(200..300).contains(&response.status) {
            return Err(crate::TrackerError::UnexpectedStatus(response.status));
        }

        tracing::debug!("Webhook {} accepted {}", self.url, QUERY_DETECTED);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{HttpResponse, MockHttpClient};
    use crate::tracker::Timestamp;

    const URL: &str = "http://homeassistant.local:8123/api/webhook/camera";

    fn test_config() -> WebhookConfig {
        WebhookConfig {
            url: URL.to_string(),
        }
    }

    fn test_event() -> QueryDetected {
        QueryDetected {
            tracker: "Camera".to_string(),
            occurred_at: Timestamp::from_epoch_ms(1_700_000_000_000),
        }
    }

    #[tokio::test]
    async fn posts_event_payload() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json()
            .withf(|url, body| {
                url == URL
                    && body["event"] == "query_detected"
                    && body["tracker"] == "Camera"
                    && body["epoch_ms"] == 1_700_000_000_000u64
                    && body["time"].is_string()
            })
            .times(1)
            .returning(|_, _| {
                Box::pin(async {
                    Ok(HttpResponse {
                        status: 200,
                        body: String::new(),
                    })
                })
            });

        let listener = WebhookListener::new(&test_config(), Arc::new(mock));
        listener.on_query_detected(&test_event()).await.unwrap();
    }

    #[tokio::test]
    async fn accepts_no_content() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json().returning(|_, _| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 204,
                    body: String::new(),
                })
            })
        });

        let listener = WebhookListener::new(&test_config(), Arc::new(mock));
        listener.on_query_detected(&test_event()).await.unwrap();
    }

    #[tokio::test]
    async fn returns_error_on_rejection() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json().returning(|_, _| {
            Box::pin(async {
                Ok(HttpResponse {
                    status: 404,
                    body: "no such webhook".to_string(),
                })
            })
        });

        let listener = WebhookListener::new(&test_config(), Arc::new(mock));
        let err = listener.on_query_detected(&test_event()).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn returns_error_on_http_failure() {
        let mut mock = MockHttpClient::new();
        mock.expect_post_json().returning(|_, _| {
            Box::pin(async { Err(crate::TrackerError::Transport("timeout".to_string())) })
        });

        let listener = WebhookListener::new(&test_config(), Arc::new(mock));
        let err = listener.on_query_detected(&test_event()).await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn name_is_webhook() {
        let listener = WebhookListener::new(&test_config(), Arc::new(MockHttpClient::new()));
        assert_eq!(listener.name(), "webhook");
    }
}
