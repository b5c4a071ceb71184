//! Pull-based stream of completion text.
//!
//! [`CompletionStream`] owns the response body, an [`SseParser`] and a
//! [`DeltaDecoder`]. Each poll drains already-parsed events before reading
//! another chunk from the network, so nothing is read ahead of the consumer.
//! Dropping the stream drops the body and closes the connection.

use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::stream::{BoxStream, FusedStream, Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, warn};

use super::CompletionError;
use super::sse::{SseEvent, SseParser};

/// Payload the provider sends to signal the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Number of leading chunks subject to newline suppression.
const LEADING_CHUNKS: usize = 2;

/// A decoded unit of model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Done,
}

#[derive(Debug, Deserialize)]
struct ChunkEnvelope {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Turns SSE data payloads into [`StreamEvent`]s.
///
/// While fewer than two chunks have been emitted, any delta containing a
/// newline is dropped: the provider tends to open its reply with a blank-line
/// preamble split over the first deltas.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    emitted: usize,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of deltas passed through so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    /// Decodes one event.
    ///
    /// Returns `Ok(None)` for events that carry no text to emit.
    ///
    /// # Errors
    ///
    /// [`CompletionError::Json`] if the payload is not JSON or has no
    /// `choices` array, [`CompletionError::MalformedEnvelope`] if that array
    /// is empty.
    pub fn decode(&mut self, event: &SseEvent) -> Result<Option<StreamEvent>, CompletionError> {
        if event.data == DONE_SENTINEL {
            return Ok(Some(StreamEvent::Done));
        }

        let envelope: ChunkEnvelope = serde_json::from_str(&event.data)?;
        let Some(choice) = envelope.choices.into_iter().next() else {
            return Err(CompletionError::MalformedEnvelope("chunk has no choices"));
        };
        let text = choice
            .delta
            .and_then(|delta| delta.content)
            .filter(|text| !text.is_empty());

        let Some(text) = text else {
            return Ok(None);
        };

        if self.emitted < LEADING_CHUNKS && text.contains('\n') {
            debug!(emitted = self.emitted, "dropping leading newline delta");
            return Ok(None);
        }

        self.emitted += 1;
        Ok(Some(StreamEvent::Delta(text)))
    }
}

/// The text chunks of one streaming completion, in arrival order.
///
/// Yields `Ok(text)` per delta and ends after the `[DONE]` sentinel. A
/// failure is yielded once as `Err` and ends the stream; chunks yielded
/// before it stand.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use codeshift::llm::CompletionStream;
/// use futures_util::{StreamExt, stream};
///
/// # async fn demo() {
/// let body = concat!(
///     "data: {\"choices\":[{\"delta\":{\"content\":\"fn main() {}\"}}]}\n\n",
///     "data: [DONE]\n\n",
/// );
/// let chunks: Vec<_> = CompletionStream::new(stream::iter([Ok(Bytes::from(body))]))
///     .collect()
///     .await;
/// assert_eq!(chunks.len(), 1);
/// # }
/// ```
pub struct CompletionStream {
    // `None` once the stream has finished; dropping it releases the connection.
    body: Option<BoxStream<'static, Result<Bytes, CompletionError>>>,
    parser: SseParser,
    pending: VecDeque<SseEvent>,
    decoder: DeltaDecoder,
}

impl CompletionStream {
    /// Wraps a raw body byte stream.
    pub fn new<S>(body: S) -> Self
    where
        S: Stream<Item = Result<Bytes, CompletionError>> + Send + 'static,
    {
        Self {
            body: Some(body.boxed()),
            parser: SseParser::new(),
            pending: VecDeque::new(),
            decoder: DeltaDecoder::new(),
        }
    }

    pub(crate) fn from_response(response: reqwest::Response) -> Self {
        Self::new(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(CompletionError::from)),
        )
    }

    /// Number of chunks yielded so far.
    pub fn emitted(&self) -> usize {
        self.decoder.emitted()
    }

    fn finish(&mut self) {
        self.body = None;
        self.pending.clear();
        self.parser.reset();
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("finished", &self.body.is_none())
            .field("pending", &self.pending.len())
            .field("emitted", &self.decoder.emitted())
            .finish()
    }
}

impl Stream for CompletionStream {
    type Item = Result<String, CompletionError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            while let Some(event) = this.pending.pop_front() {
                match this.decoder.decode(&event) {
                    Ok(Some(StreamEvent::Delta(text))) => return Poll::Ready(Some(Ok(text))),
                    Ok(Some(StreamEvent::Done)) => {
                        debug!(emitted = this.decoder.emitted(), "completion stream done");
                        this.finish();
                        return Poll::Ready(None);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(error = %e, "malformed completion chunk");
                        this.finish();
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }

            let Some(body) = this.body.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(body.poll_next_unpin(cx)) {
                Some(Ok(bytes)) => {
                    let events = this.parser.feed(&bytes);
                    this.pending.extend(events);
                }
                Some(Err(e)) => {
                    error!(error = %e, "completion stream interrupted");
                    this.finish();
                    return Poll::Ready(Some(Err(e)));
                }
                None => {
                    warn!(
                        emitted = this.decoder.emitted(),
                        "completion body ended without [DONE]"
                    );
                    this.finish();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl FusedStream for CompletionStream {
    fn is_terminated(&self) -> bool {
        self.body.is_none() && self.pending.is_empty()
    }
}
