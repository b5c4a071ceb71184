//! Streams one conversion to stdout.
//!
//! Reads a request in the UI's wire format from stdin:
//!
//! ```bash
//! echo '{"input":"let x = 1","type":"python","key":"sk-...","model":"gpt-3.5-turbo"}' \
//!     | RUST_LOG=codeshift=debug cargo run --example convert
//! ```
//!
//! Set `CODESHIFT_ENDPOINT` to target any OpenAI-compatible server.

use std::io::{Read, Write};

use codeshift::convert::{self, ConversionRequest};
use codeshift::llm::{CompletionConfig, LlmClient};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut body = Vec::new();
    std::io::stdin().read_to_end(&mut body)?;
    let request = ConversionRequest::from_json(&body)?;

    let mut config = CompletionConfig::default();
    if let Ok(endpoint) = std::env::var("CODESHIFT_ENDPOINT") {
        config = config.endpoint(endpoint);
    }
    let client = LlmClient::new(config)?;

    let mut stdout = std::io::stdout();
    let mut chunks = convert::generate_stream(client, request);
    while let Some(chunk) = chunks.next().await {
        stdout.write_all(chunk?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    Ok(())
}
