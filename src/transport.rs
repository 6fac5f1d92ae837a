use anyhow::{anyhow, Result};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// Frames of one streamed response, already decoded from SSE to JSON
pub type FrameStream = BoxStream<'static, Result<Value>>;

/// Delivers request payloads to the chat completion endpoint.
///
/// Transport failures are fatal to the exchange: the connector propagates
/// them immediately and performs no retries.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a payload and return the complete response body
    async fn send(&self, payload: Value) -> Result<Value>;

    /// Send a payload and return the response as a stream of frames
    async fn send_stream(&self, payload: Value) -> Result<FrameStream>;
}

/// HTTP transport for an OpenAI-style `/v1/chat/completions` endpoint
pub struct HttpTransport {
    client: Client,
    host: String,
    api_key: String,
}

impl HttpTransport {
    pub fn new(host: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self {
            client,
            host: host.into(),
            api_key: api_key.into(),
        })
    }

    fn url(&self) -> String {
        format!("{}/v1/chat/completions", self.host.trim_end_matches('/'))
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(payload)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response),
            status if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() >= 500 => {
                Err(anyhow!("Server error: {}", status))
            }
            status => Err(anyhow!("Request failed: {}", status)),
        }
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, payload: Value) -> Result<Value> {
        Ok(self.post(&payload).await?.json().await?)
    }

    async fn send_stream(&self, payload: Value) -> Result<FrameStream> {
        let response = self.post(&payload).await?;

        let frames = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        // The endpoint closes the stream with a [DONE] sentinel
                        if event.data.trim() == "[DONE]" {
                            None
                        } else {
                            Some(
                                serde_json::from_str::<Value>(&event.data)
                                    .map_err(|e| anyhow!("Malformed stream frame: {}", e)),
                            )
                        }
                    }
                    Err(e) => Some(Err(anyhow!("Stream transport error: {}", e))),
                }
            });

        Ok(Box::pin(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_send_posts_json_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("Authorization", "Bearer test_key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), "test_key").unwrap();
        let body = transport.send(json!({"model": "gpt-4o"})).await.unwrap();
        assert_eq!(body, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_send_server_error_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), "test_key").unwrap();
        let result = transport.send(json!({})).await;
        assert!(result.unwrap_err().to_string().contains("Server error"));
    }

    #[tokio::test]
    async fn test_send_stream_decodes_sse_frames() {
        let body = concat!(
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n",
        );
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(server.uri(), "test_key").unwrap();
        let mut frames = transport.send_stream(json!({})).await.unwrap();

        let mut collected = Vec::new();
        while let Some(frame) = frames.next().await {
            collected.push(frame.unwrap());
        }

        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0]["choices"][0]["delta"]["content"], "Hi");
        assert_eq!(collected[1]["choices"][0]["finish_reason"], "stop");
    }
}
