//! OpenAI-compatible streaming completion client
//!
//! Connects to a `/chat/completions` endpoint with `stream: true` and
//! yields assistant text deltas as they arrive. Transport-level auth uses
//! a bearer credential configured per deployment, not per end user.

use crate::error::{ChatgateError, Result};
use crate::providers::base::{ChatProvider, ChunkStream, Message};
use async_trait::async_trait;
use futures::StreamExt;

/// Streaming client for OpenAI-compatible chat completion APIs
///
/// Each `stream_chat` call opens a fresh HTTP request carrying the full
/// message history. The response body is a server-sent-event stream of
/// JSON deltas terminated by a `[DONE]` marker.
#[derive(Clone)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // api_key intentionally omitted
        f.debug_struct("OpenAiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

impl OpenAiProvider {
    /// Create a new provider instance
    ///
    /// # Arguments
    ///
    /// * `base_url` - API base, e.g. `https://host/compatible-mode/v1`
    /// * `api_key` - Deployment-level bearer credential
    /// * `model` - Model identifier sent with each request
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    /// Open a streaming completion request
    ///
    /// # Errors
    ///
    /// Returns `ChatgateError::Provider` if the request cannot be opened or
    /// the server answers with a non-success status. Errors after the
    /// stream has started surface as `ChatgateError::StreamFailed` items.
    async fn stream_chat(&self, messages: &[Message]) -> Result<ChunkStream> {
        let url = format!(
            "{}/chat/completions",
            self.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.model,
            "stream": true,
            "messages": messages,
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatgateError::Provider(format!("request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ChatgateError::Provider(format!(
                "completion endpoint returned HTTP {}",
                status
            ))
            .into());
        }

        let byte_stream = resp.bytes_stream();

        let out = async_stream::try_stream! {
            // Buffer accumulates raw bytes between `\n\n` event boundaries.
            let mut buf = Vec::<u8>::new();

            futures::pin_mut!(byte_stream);
            'recv: while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk.map_err(|e| {
                    ChatgateError::StreamFailed(format!("connection error: {}", e))
                })?;
                buf.extend_from_slice(&chunk);

                while let Some(pos) = find_double_newline(&buf) {
                    let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                    let text = String::from_utf8_lossy(&frame);

                    for line in text.lines() {
                        let line = line.trim();
                        let Some(data) = line.strip_prefix("data:") else {
                            continue;
                        };
                        let data = data.trim();

                        if data == "[DONE]" {
                            break 'recv;
                        }

                        let v: serde_json::Value =
                            serde_json::from_str(data).map_err(|e| {
                                ChatgateError::StreamFailed(format!(
                                    "malformed delta frame: {}",
                                    e
                                ))
                            })?;

                        let delta = &v["choices"][0]["delta"];
                        if let Some(s) = delta.get("content").and_then(|x| x.as_str()) {
                            if !s.is_empty() {
                                yield s.to_string();
                            }
                        }
                    }
                }
            }
        };

        Ok(Box::pin(out))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Find the position of a double newline in the buffer
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}
