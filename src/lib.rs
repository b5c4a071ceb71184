//! # codeshift
//!
//! Converts code snippets between UI frameworks, styling dialects and
//! programming languages by streaming completions from an LLM chat endpoint.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codeshift::convert::{self, ConversionRequest};
//! use codeshift::llm::{CompletionConfig, LlmClient};
//! use futures_util::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = LlmClient::new(CompletionConfig::default())?;
//!     let request = ConversionRequest::from_json(br#"{
//!         "input": "function add(a, b) { return a + b }",
//!         "type": "rust",
//!         "key": "sk-...",
//!         "model": "gpt-3.5-turbo"
//!     }"#)?;
//!
//!     let mut chunks = convert::generate(&client, &request).await?;
//!     while let Some(chunk) = chunks.next().await {
//!         print!("{}", chunk?);
//!     }
//!     Ok(())
//! }
//! ```

// ── Prompt construction ───────────────────────────────────────────────────────
pub mod query;

// ── Streaming completion client ───────────────────────────────────────────────
pub mod llm;

// ── Request → stream pipeline ─────────────────────────────────────────────────
pub mod convert;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use convert::{ConversionRequest, generate, generate_stream};
pub use llm::{ApiKey, CompletionConfig, CompletionError, CompletionStream, LlmClient, Model};
pub use query::{ConversionTarget, ParamValue, build_prompt, render_parameters, resolve_target};
