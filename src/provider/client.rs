use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::error::ProviderError;
use crate::dispatch::JobKind;

pub const API_URL: &str = "https://api.groq.com/openai/v1";

/// The request/reply contract the dispatcher depends on: one call, one
/// credential, one opaque payload, three failure classes. Everything else
/// about the provider is invisible to the retry and transport layers.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    async fn call(
        &self,
        kind: JobKind,
        credential: &str,
        payload: &Value,
    ) -> Result<Value, ProviderError>;
}

/// HTTP client for the provider's OpenAI-compatible API.
pub struct ProviderClient {
    http: Client,
    base_url: String,
}

impl ProviderClient {
    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: String) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self { http, base_url }
    }

    async fn post_json(
        &self,
        url: String,
        credential: &str,
        payload: &Value,
    ) -> Result<Value, ProviderError> {
        let response = self
            .http
            .post(&url)
            .bearer_auth(credential)
            .json(payload)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000);
            return Err(ProviderError::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        response
            .json::<Value>()
            .await
            .map_err(|err| ProviderError::Parse(err.to_string()))
    }
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::with_base_url(API_URL.to_string())
    }
}

#[async_trait]
impl ProviderApi for ProviderClient {
    async fn call(
        &self,
        kind: JobKind,
        credential: &str,
        payload: &Value,
    ) -> Result<Value, ProviderError> {
        let endpoint = match kind {
            JobKind::Chat => "chat/completions",
            JobKind::Transcribe => "audio/transcriptions",
        };
        self.post_json(format!("{}/{endpoint}", self.base_url), credential, payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::provider::error::ErrorClass;

    #[tokio::test]
    async fn chat_posts_payload_and_returns_body() {
        let server = MockServer::start().await;
        let payload = json!({"model": "m", "messages": [{"role": "user", "content": "hi"}]});
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("k1"))
            .and(body_json(&payload))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"choices": [{"message": {"role": "assistant", "content": "hello"}}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ProviderClient::with_base_url(server.uri());
        let body = client.call(JobKind::Chat, "k1", &payload).await.unwrap();
        assert_eq!(body["choices"][0]["message"]["content"], "hello");
    }

    #[tokio::test]
    async fn transcription_hits_the_transcription_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/transcriptions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"text": "spoken words"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ProviderClient::with_base_url(server.uri());
        let body = client
            .call(JobKind::Transcribe, "k1", &json!({"model": "whisper", "file": "AAAA"}))
            .await
            .unwrap();
        assert_eq!(body["text"], "spoken words");
    }

    #[tokio::test]
    async fn status_429_classifies_as_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "2"))
            .mount(&server)
            .await;

        let client = ProviderClient::with_base_url(server.uri());
        let err = client
            .call(JobKind::Chat, "k1", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RateLimited {
                retry_after_ms: Some(2000)
            }
        ));
        assert_eq!(err.class(), ErrorClass::RateLimited);
    }

    #[tokio::test]
    async fn status_500_classifies_as_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = ProviderClient::with_base_url(server.uri());
        let err = client
            .call(JobKind::Chat, "k1", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Server { status: 503, .. }));
        assert_eq!(err.class(), ErrorClass::Transient);
    }

    #[tokio::test]
    async fn status_400_classifies_as_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(400).set_body_string("malformed request"))
            .mount(&server)
            .await;

        let client = ProviderClient::with_base_url(server.uri());
        let err = client
            .call(JobKind::Chat, "k1", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Request { status: 400, .. }));
        assert_eq!(err.class(), ErrorClass::Fatal);
    }

    #[tokio::test]
    async fn unparseable_success_body_is_a_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("definitely not json"))
            .mount(&server)
            .await;

        let client = ProviderClient::with_base_url(server.uri());
        let err = client
            .call(JobKind::Chat, "k1", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }
}
