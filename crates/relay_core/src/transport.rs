//! Upstream transport.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Client;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::request::MessagesRequest;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Status, declared length and unread body of an upstream response.
pub struct TransportResponse {
    pub status: u16,
    pub content_length: Option<u64>,
    pub body: ByteStream,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request. The body is left unread so the caller controls how
    /// much of it is buffered.
    async fn send(&self, request: &MessagesRequest) -> Result<TransportResponse>;
}

/// POSTs requests to the Messages API endpoint.
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: HeaderMap,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let headers = build_headers(&config.api_key, &config.api_version)?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| RelayError::TransportSend(e.to_string()))?;

        Ok(Self {
            client,
            url: config.messages_url(),
            headers,
            timeout: config.request_timeout(),
        })
    }

    fn send_error(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::TransportTimeout(self.timeout.as_secs())
        } else {
            RelayError::TransportSend(err.to_string())
        }
    }
}

fn build_headers(api_key: &str, api_version: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "x-api-key",
        HeaderValue::from_str(api_key)
            .map_err(|e| RelayError::TransportSend(format!("Invalid API key: {}", e)))?,
    );
    headers.insert(
        "anthropic-version",
        HeaderValue::from_str(api_version)
            .map_err(|e| RelayError::TransportSend(format!("Invalid API version: {}", e)))?,
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &MessagesRequest) -> Result<TransportResponse> {
        log::debug!(
            "POST {} (model {}, {} messages)",
            self.url,
            request.model,
            request.messages.len()
        );

        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        let status = response.status().as_u16();
        let content_length = response.content_length();
        let timeout_secs = self.timeout.as_secs();
        let body = response.bytes_stream().map(move |chunk| {
            chunk.map_err(|e| {
                if e.is_timeout() {
                    RelayError::TransportTimeout(timeout_secs)
                } else {
                    RelayError::TransportRead(e.to_string())
                }
            })
        });

        Ok(TransportResponse {
            status,
            content_length,
            body: Box::pin(body),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Turn;
    use crate::reader::{read_to_end, ReadLimits};
    use crate::request::build_request;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> RelayConfig {
        RelayConfig {
            api_key: "sk-test".to_string(),
            api_base: server.uri(),
            request_timeout_secs: 1,
            ..RelayConfig::default()
        }
    }

    fn request(config: &RelayConfig) -> MessagesRequest {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        build_request(config, &[Turn::user("Hi")], today)
    }

    #[tokio::test]
    async fn sends_required_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "sk-test"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "model": "claude-sonnet-4-0",
                "messages": [{"role": "user", "content": "Hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"content":[]}"#))
            .expect(1)
            .mount(&server)
            .await;

        let config = config_for(&server);
        let transport = HttpTransport::new(&config).unwrap();
        let response = transport.send(&request(&config)).await.unwrap();

        assert!(response.is_success());
        let body = read_to_end(response.body, response.content_length, ReadLimits::default())
            .await
            .unwrap();
        assert_eq!(body, br#"{"content":[]}"#.to_vec());
    }

    #[tokio::test]
    async fn non_success_status_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let config = config_for(&server);
        let transport = HttpTransport::new(&config).unwrap();
        let response = transport.send(&request(&config)).await.unwrap();

        assert_eq!(response.status, 503);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let config = config_for(&server);
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport.send(&request(&config)).await.err().expect("timeout");

        assert!(matches!(err, RelayError::TransportTimeout(1)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_send_error() {
        let config = RelayConfig {
            api_key: "sk-test".to_string(),
            api_base: "http://127.0.0.1:9".to_string(),
            ..RelayConfig::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let err = transport.send(&request(&config)).await.err().expect("send error");

        assert!(matches!(err, RelayError::TransportSend(_)));
    }

    #[test]
    fn invalid_api_key_is_rejected_up_front() {
        let config = RelayConfig {
            api_key: "bad\nkey".to_string(),
            ..RelayConfig::default()
        };
        assert!(HttpTransport::new(&config).is_err());
    }
}
