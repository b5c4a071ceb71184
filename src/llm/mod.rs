//! LLM integration: streaming chat completions from an OpenAI-compatible API.
//!
//! [`LlmClient`] sends one streaming request per call and returns a
//! [`CompletionStream`] of text chunks. The client keeps no per-request
//! state; each stream owns its own parser, decoder and connection.
//!
//! ```rust,no_run
//! use codeshift::llm::{ApiKey, CompletionConfig, LlmClient, Model};
//! use futures_util::StreamExt;
//!
//! # async fn demo() -> Result<(), codeshift::llm::CompletionError> {
//! let client = LlmClient::new(CompletionConfig::default())?;
//! let key = ApiKey::from("sk-...");
//! let mut stream = client
//!     .stream_chat(&key, &Model::Gpt35Turbo, "You convert code.", "Convert: let x = 1")
//!     .await?;
//! while let Some(chunk) = stream.next().await {
//!     print!("{}", chunk?);
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

pub mod sse;
pub mod stream;

pub use stream::{CompletionStream, DeltaDecoder, StreamEvent};

/// Default chat-completion endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Errors produced while requesting or streaming a completion.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("malformed completion chunk: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed completion chunk: {0}")]
    MalformedEnvelope(&'static str),
}

pub type CompletionResult<T> = Result<T, CompletionError>;

/// A chat model identifier.
///
/// The two models offered in the model picker are unit variants; anything
/// else is kept verbatim in [`Model::Custom`].
///
/// # Examples
///
/// ```
/// use codeshift::llm::Model;
///
/// let model: Model = "gpt-4".parse().unwrap();
/// assert_eq!(model, Model::Gpt4);
/// assert_eq!("gpt-4o-mini".parse::<Model>().unwrap().as_str(), "gpt-4o-mini");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Model {
    #[default]
    Gpt35Turbo,
    Gpt4,
    Custom(String),
}

impl Model {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Gpt35Turbo => "gpt-3.5-turbo",
            Self::Gpt4 => "gpt-4",
            Self::Custom(s) => s.as_str(),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Model {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "gpt-3.5-turbo" => Self::Gpt35Turbo,
            "gpt-4" => Self::Gpt4,
            other => Self::Custom(other.to_owned()),
        })
    }
}

impl From<&str> for Model {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(model) => model,
            Err(never) => match never {},
        }
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Model::from(s.as_str()))
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// A caller-supplied provider API key.
///
/// The key is only ever written into the `Authorization` header; its
/// `Debug` output is redacted so it cannot leak into logs.
#[derive(Clone, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns the raw key.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self(key.to_owned())
    }
}

/// Request settings shared by every completion a client makes.
///
/// All fields have defaults, so a partial JSON/TOML table deserializes.
///
/// # Examples
///
/// ```
/// use codeshift::llm::CompletionConfig;
///
/// let config = CompletionConfig::default()
///     .endpoint("http://localhost:8080/v1/chat/completions")
///     .max_tokens(None);
/// assert_eq!(config.temperature, 0.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub endpoint: String,
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    /// Upper bound on generated tokens; `None` leaves it to the provider.
    pub max_tokens: Option<u32>,
    /// Connect timeout in milliseconds. The body itself is not time-limited.
    pub connect_timeout_ms: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            temperature: 0.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            max_tokens: Some(2048),
            connect_timeout_ms: 10_000,
        }
    }
}

impl CompletionConfig {
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = frequency;
        self.presence_penalty = presence;
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Serialize)]
pub struct ChatMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// JSON body of a streaming chat-completion request.
#[derive(Debug, Serialize)]
pub struct ChatPayload<'a> {
    pub model: &'a str,
    pub messages: [ChatMessage<'a>; 2],
    pub temperature: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub stream: bool,
    pub n: u8,
}

/// Client for a streaming chat-completion endpoint.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl LlmClient {
    /// Builds a client from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`CompletionError::Http`] if the HTTP client cannot be
    /// initialised (e.g. the TLS backend fails to load).
    pub fn new(config: CompletionConfig) -> CompletionResult<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .build()?;
        Ok(Self { http, config })
    }

    /// Returns the configuration this client was built with.
    pub fn config(&self) -> &CompletionConfig {
        &self.config
    }

    /// Builds the request body for one completion.
    pub fn payload<'a>(&'a self, model: &'a Model, system: &'a str, prompt: &'a str) -> ChatPayload<'a> {
        ChatPayload {
            model: model.as_str(),
            messages: [
                ChatMessage {
                    role: Role::System,
                    content: system,
                },
                ChatMessage {
                    role: Role::User,
                    content: prompt,
                },
            ],
            temperature: self.config.temperature,
            frequency_penalty: self.config.frequency_penalty,
            presence_penalty: self.config.presence_penalty,
            max_tokens: self.config.max_tokens,
            stream: true,
            n: 1,
        }
    }

    /// Starts a streaming completion.
    ///
    /// Resolves once the response headers arrive. The returned stream reads
    /// the body lazily as it is polled.
    ///
    /// # Errors
    ///
    /// - [`CompletionError::Http`]: the request could not be sent.
    /// - [`CompletionError::Upstream`]: the provider answered with a non-2xx
    ///   status; `body` holds its error document. No retry is attempted.
    pub async fn stream_chat(
        &self,
        key: &ApiKey,
        model: &Model,
        system: &str,
        prompt: &str,
    ) -> CompletionResult<CompletionStream> {
        let payload = self.payload(model, system, prompt);

        debug!(
            endpoint = %self.config.endpoint,
            model = %model,
            prompt_len = prompt.len(),
            "sending completion request"
        );

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(key.expose())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), body = %body, "completion request failed");
            return Err(CompletionError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), "completion stream opened");
        Ok(CompletionStream::from_response(response))
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    use super::*;

    /// Reads one HTTP request (headers plus `Content-Length` body) from `socket`.
    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let (name, value) = l.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())?
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8(buf).unwrap()
    }

    /// Serves `response` to a single connection and reports the request it received.
    async fn serve_once(response: String) -> (CompletionConfig, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let _ = tx.send(request);
        });

        let config =
            CompletionConfig::default().endpoint(format!("http://{addr}/v1/chat/completions"));
        (config, rx)
    }

    fn sse_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n{body}"
        )
    }

    #[test]
    fn payload_shape() {
        let client = LlmClient::new(CompletionConfig::default()).unwrap();
        let model = Model::Gpt4;
        let json = serde_json::to_value(client.payload(&model, "sys", "prompt")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "gpt-4",
                "messages": [
                    { "role": "system", "content": "sys" },
                    { "role": "user", "content": "prompt" },
                ],
                "temperature": 0.0,
                "frequency_penalty": 0.0,
                "presence_penalty": 0.0,
                "max_tokens": 2048,
                "stream": true,
                "n": 1,
            })
        );
    }

    #[test]
    fn payload_omits_unset_max_tokens() {
        let client = LlmClient::new(CompletionConfig::default().max_tokens(None)).unwrap();
        let model = Model::default();
        let json = serde_json::to_value(client.payload(&model, "s", "p")).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["model"], "gpt-3.5-turbo");
    }

    #[test]
    fn model_parsing() {
        assert_eq!(Model::from("gpt-3.5-turbo"), Model::Gpt35Turbo);
        assert_eq!(Model::from("gpt-4"), Model::Gpt4);
        assert_eq!(
            Model::from("gpt-4o"),
            Model::Custom("gpt-4o".to_owned())
        );
        let model: Model = serde_json::from_str("\"gpt-4\"").unwrap();
        assert_eq!(model, Model::Gpt4);
    }

    #[test]
    fn api_key_is_redacted() {
        let key = ApiKey::from("sk-secret");
        assert!(!format!("{key:?}").contains("sk-secret"));
        assert_eq!(key.expose(), "sk-secret");
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: CompletionConfig = serde_json::from_str(r#"{"temperature": 0.7}"#).unwrap();
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.max_tokens, Some(2048));
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn sub_second_connect_timeout_is_kept() {
        let config = CompletionConfig::default().connect_timeout(Duration::from_millis(500));
        assert_eq!(config.connect_timeout_ms, 500);
        assert!(LlmClient::new(config).is_ok());

        let config = CompletionConfig::default().connect_timeout(Duration::from_micros(1500));
        assert_eq!(config.connect_timeout_ms, 1);
    }

    #[tokio::test]
    async fn streams_chunks_and_sends_bearer_auth() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\\n\\n\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"def\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" f():\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let (config, request) = serve_once(sse_response(body)).await;
        let client = LlmClient::new(config).unwrap();

        let stream = client
            .stream_chat(&ApiKey::from("sk-test"), &Model::Gpt4, "sys", "convert this")
            .await
            .unwrap();
        let chunks: Vec<String> = stream.map(Result::unwrap).collect().await;
        assert_eq!(chunks, vec!["def", " f():"]);

        let request = request.await.unwrap();
        assert!(request.starts_with("POST /v1/chat/completions HTTP/1.1\r\n"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test\r\n"));
        assert!(request.contains("\"stream\":true"));
        assert!(request.contains("\"content\":\"convert this\""));
    }

    #[tokio::test]
    async fn upstream_failure_is_reported_once() {
        let error = r#"{"error":{"message":"Incorrect API key provided"}}"#;
        let response = format!(
            "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{error}",
            error.len()
        );
        let (config, _request) = serve_once(response).await;
        let client = LlmClient::new(config).unwrap();

        let result = client
            .stream_chat(&ApiKey::from("bad"), &Model::Gpt35Turbo, "sys", "x")
            .await;
        match result {
            Err(CompletionError::Upstream { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("Incorrect API key"));
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn truncated_body_is_an_http_error() {
        let event = "data: {\"choices\":[{\"delta\":{\"content\":\"first\"}}]}\n\n";
        // The second chunk announces more bytes than are sent before the close.
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n{:x}\r\n{event}\r\n100\r\ndata: {{\"cho",
            event.len()
        );
        let (config, _request) = serve_once(response).await;
        let client = LlmClient::new(config).unwrap();

        let mut stream = client
            .stream_chat(&ApiKey::from("k"), &Model::Gpt4, "sys", "x")
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        assert!(matches!(
            stream.next().await,
            Some(Err(CompletionError::Http(_)))
        ));
        assert!(stream.next().await.is_none());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn dropping_the_stream_closes_the_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (closed_tx, closed_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nTransfer-Encoding: chunked\r\n\r\n";
            let event = "data: {\"choices\":[{\"delta\":{\"content\":\"first\"}}]}\n\n";
            let chunk = format!("{:x}\r\n{event}\r\n", event.len());
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(chunk.as_bytes()).await.unwrap();

            // Never sends [DONE]; waits for the client to hang up instead.
            let mut buf = [0u8; 64];
            let closed = loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break true,
                    Ok(_) => continue,
                }
            };
            let _ = closed_tx.send(closed);
        });

        let config =
            CompletionConfig::default().endpoint(format!("http://{addr}/v1/chat/completions"));
        let client = LlmClient::new(config).unwrap();
        let mut stream = client
            .stream_chat(&ApiKey::from("k"), &Model::Gpt4, "sys", "x")
            .await
            .unwrap();
        assert_eq!(stream.next().await.unwrap().unwrap(), "first");
        drop(stream);

        let closed = tokio::time::timeout(Duration::from_secs(5), closed_rx)
            .await
            .expect("connection was not released")
            .unwrap();
        assert!(closed);
    }
}
