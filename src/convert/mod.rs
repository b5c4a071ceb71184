//! Conversion pipeline: from an inbound request to a stream of converted code.
//!
//! This is the entry point for whatever serves the UI: deserialize a
//! [`ConversionRequest`], hand it to [`generate`] or [`generate_stream`], and
//! forward the chunks as they arrive.

use futures_util::future::TryFutureExt;
use futures_util::stream::{BoxStream, StreamExt};
use serde::Deserialize;
use tracing::debug;

use crate::llm::{ApiKey, CompletionError, CompletionResult, CompletionStream, LlmClient, Model};
use crate::query::{self, ParamValues};

/// One conversion as submitted by the UI.
///
/// Wire format: `{ "input", "type", "key", "params"?, "model" }`.
///
/// # Examples
///
/// ```
/// use codeshift::convert::ConversionRequest;
///
/// let request = ConversionRequest::from_json(br#"{
///     "input": "const [n, setN] = useState(0);",
///     "type": "svelte",
///     "key": "sk-...",
///     "params": { "typescript": "on" },
///     "model": "gpt-4"
/// }"#).unwrap();
///
/// assert_eq!(request.target, "svelte");
/// assert!(request.prompt().contains("Use TypeScript"));
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ConversionRequest {
    pub input: String,
    /// Conversion target identifier.
    #[serde(rename = "type")]
    pub target: String,
    pub key: ApiKey,
    #[serde(default)]
    pub params: ParamValues,
    pub model: Model,
}

impl ConversionRequest {
    /// Parses a request from its JSON body.
    pub fn from_json(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Renders the user prompt for this request.
    ///
    /// Unknown targets fall back to a generic instruction and undeclared
    /// parameters are ignored, so this cannot fail.
    pub fn prompt(&self) -> String {
        let target = query::resolve_target(&self.target);
        let fragments = query::render_parameters(&target, &self.params);
        query::build_prompt(query::SYSTEM_INSTRUCTION, &target, &fragments, &self.input)
    }
}

/// Starts the completion for `request`.
///
/// # Errors
///
/// Fails before any chunk is produced if the request cannot be sent or the
/// provider rejects it; see [`LlmClient::stream_chat`].
pub async fn generate(
    client: &LlmClient,
    request: &ConversionRequest,
) -> CompletionResult<CompletionStream> {
    let prompt = request.prompt();
    debug!(
        target_id = %request.target,
        model = %request.model,
        params = request.params.len(),
        "starting conversion"
    );
    client
        .stream_chat(&request.key, &request.model, query::SYSTEM_INSTRUCTION, &prompt)
        .await
}

/// Like [`generate`], but folds a failed start into the stream itself.
///
/// The result yields `Ok` chunks in arrival order and, on failure, exactly
/// one `Err` before ending. An upstream rejection therefore shows up as a
/// single `Err` with no chunks before it.
pub fn generate_stream(
    client: LlmClient,
    request: ConversionRequest,
) -> BoxStream<'static, Result<String, CompletionError>> {
    async move { generate(&client, &request).await }
        .try_flatten_stream()
        .boxed()
}
