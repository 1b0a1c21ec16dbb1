//! Provider transport - delivery calls to the messaging provider API

use async_trait::async_trait;
use reqwest::Client;
use sendpace_common::types::MessageType;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Credentials identifying one sending profile at the provider
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    pub device_uuid: String,
    pub api_token: String,
}

/// Content of one outbound send
#[derive(Debug, Clone)]
pub struct MessagePayload {
    pub message_type: MessageType,
    pub content: String,
    pub media_url: Option<String>,
    pub caption: Option<String>,
}

impl MessagePayload {
    fn media_or_content(&self) -> &str {
        self.media_url.as_deref().unwrap_or(&self.content)
    }
}

/// Outcome of one delivery attempt
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
    pub response_time_ms: i32,
}

impl DeliveryOutcome {
    /// A failed outcome with an error description
    pub fn failure(error: impl Into<String>, response_time_ms: i32) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
            response_time_ms,
        }
    }
}

/// Message delivery seam
///
/// Any non-success outcome is treated upstream as a retryable failure until
/// the item's attempts are exhausted.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn send(
        &self,
        credentials: &ProviderCredentials,
        recipient: &str,
        payload: &MessagePayload,
    ) -> DeliveryOutcome;
}

/// HTTP client for the provider REST API
pub struct ProviderClient {
    base_url: String,
    http_client: Client,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ProviderClient {
    /// Create a new provider client with a fixed per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn endpoint(&self, device_uuid: &str, kind: &str) -> String {
        format!("{}/devices/{}/messages/{}", self.base_url, device_uuid, kind)
    }

    fn build_body(recipient: &str, payload: &MessagePayload) -> (&'static str, serde_json::Value) {
        let mut body = match payload.message_type {
            MessageType::Text => (
                "text",
                serde_json::json!({ "to": recipient, "text": payload.content }),
            ),
            MessageType::Image => (
                "image",
                serde_json::json!({ "to": recipient, "image_url": payload.media_or_content() }),
            ),
            MessageType::Voice => (
                "voice",
                serde_json::json!({ "to": recipient, "audio_url": payload.media_or_content() }),
            ),
            MessageType::Document => (
                "document",
                serde_json::json!({ "to": recipient, "document_url": payload.media_or_content() }),
            ),
            MessageType::Video => (
                "video",
                serde_json::json!({ "to": recipient, "video_url": payload.media_or_content() }),
            ),
        };

        if !matches!(payload.message_type, MessageType::Text | MessageType::Voice) {
            if let Some(caption) = &payload.caption {
                body.1["caption"] = serde_json::json!(caption);
            }
        }

        body
    }
}

#[async_trait]
impl Transport for ProviderClient {
    async fn send(
        &self,
        credentials: &ProviderCredentials,
        recipient: &str,
        payload: &MessagePayload,
    ) -> DeliveryOutcome {
        let started = Instant::now();
        let (kind, body) = Self::build_body(recipient, payload);
        let url = self.endpoint(&credentials.device_uuid, kind);

        let result = self
            .http_client
            .post(&url)
            .bearer_auth(&credentials.api_token)
            .json(&body)
            .send()
            .await;

        let response_time_ms = started.elapsed().as_millis() as i32;

        match result {
            Ok(response) => {
                let status = response.status();
                let parsed: ProviderResponse = response.json().await.unwrap_or(ProviderResponse {
                    message_id: None,
                    error: None,
                });

                if status.is_success() {
                    debug!(recipient, kind, response_time_ms, "provider accepted message");
                    DeliveryOutcome {
                        success: true,
                        provider_message_id: parsed.message_id,
                        error: None,
                        response_time_ms,
                    }
                } else {
                    let error = parsed
                        .error
                        .unwrap_or_else(|| format!("provider returned HTTP {}", status.as_u16()));
                    DeliveryOutcome::failure(error, response_time_ms)
                }
            }
            Err(e) => {
                // Timeouts land here and count as plain transport failures
                error!("Provider request failed: {}", e);
                DeliveryOutcome::failure(e.to_string(), response_time_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn payload(message_type: MessageType) -> MessagePayload {
        MessagePayload {
            message_type,
            content: "hello".into(),
            media_url: Some("https://cdn.example.com/pic.jpg".into()),
            caption: Some("look".into()),
        }
    }

    fn credentials() -> ProviderCredentials {
        ProviderCredentials {
            device_uuid: "dev-1".into(),
            api_token: "secret".into(),
        }
    }

    #[tokio::test]
    async fn test_send_text_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/dev-1/messages/text"))
            .and(body_partial_json(
                serde_json::json!({ "to": "31600000001", "text": "hello" }),
            ))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "message_id": "pm-123" })),
            )
            .mount(&server)
            .await;

        let client = ProviderClient::new(server.uri(), Duration::from_secs(5));
        let outcome = client
            .send(&credentials(), "31600000001", &payload(MessageType::Text))
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.provider_message_id.as_deref(), Some("pm-123"));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn test_send_image_uses_media_url_and_caption() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/dev-1/messages/image"))
            .and(body_partial_json(serde_json::json!({
                "to": "31600000001",
                "image_url": "https://cdn.example.com/pic.jpg",
                "caption": "look"
            })))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(serde_json::json!({ "message_id": "pm-9" })),
            )
            .mount(&server)
            .await;

        let client = ProviderClient::new(server.uri(), Duration::from_secs(5));
        let outcome = client
            .send(&credentials(), "31600000001", &payload(MessageType::Image))
            .await;

        assert!(outcome.success);
    }

    #[tokio::test]
    async fn test_provider_error_maps_to_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/devices/dev-1/messages/text"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({ "error": "recipient not reachable" })),
            )
            .mount(&server)
            .await;

        let client = ProviderClient::new(server.uri(), Duration::from_secs(5));
        let outcome = client
            .send(&credentials(), "31600000001", &payload(MessageType::Text))
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("recipient not reachable"));
    }

    #[tokio::test]
    async fn test_connection_error_maps_to_failure() {
        // Nothing is listening on this port
        let client = ProviderClient::new("http://127.0.0.1:9", Duration::from_millis(200));
        let outcome = client
            .send(&credentials(), "31600000001", &payload(MessageType::Text))
            .await;

        assert!(!outcome.success);
        assert!(outcome.error.is_some());
    }
}
