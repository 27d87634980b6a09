//! Re-emission of the upstream phase stream as OpenAI chat-completion chunks.

use ai_ox_common::{
    BoxStream,
    openai_format::{ChatCompletionChunk, ChatCompletionResponse, FinishReason},
};
use futures_util::{Stream, StreamExt};
use serde_json::{Map, Value};

use crate::{
    decode::{self, UpstreamEvent},
    encode::{self, DONE_LINE, ResponseContext},
    error::ZaiError,
};

/// Lifecycle of one translated stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Connected, nothing decoded yet
    Open,
    Streaming,
    /// `done` seen; nothing more is read
    Done,
    Failed,
}

/// One caller-facing stream item
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Chunk(ChatCompletionChunk),
    /// Terminal sentinel, rendered as `data: [DONE]`
    Done,
}

impl StreamItem {
    /// Render as one SSE event
    pub fn to_sse(&self) -> Result<String, ZaiError> {
        match self {
            Self::Chunk(chunk) => encode::to_sse(chunk),
            Self::Done => Ok(DONE_LINE.to_string()),
        }
    }
}

/// Line-by-line translator holding the per-response state
#[derive(Debug)]
pub struct Reemitter {
    /// Id, model and creation time stamped on every chunk
    ctx: ResponseContext,
    /// Where the response is in its lifecycle
    state: StreamState,
    /// Lines dropped because they failed to decode
    malformed_lines: usize,
}

impl Reemitter {
    #[must_use]
    pub fn new(ctx: ResponseContext) -> Self {
        Self {
            ctx,
            state: StreamState::Open,
            malformed_lines: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Lines skipped because they could not be decoded
    #[must_use]
    pub fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self.state, StreamState::Done | StreamState::Failed)
    }

    /// Translate one upstream line. Returns nothing for lines without a
    /// caller-visible event and for anything fed after the stream finished.
    pub fn feed(&mut self, line: &str) -> Option<StreamItem> {
        if self.is_finished() {
            return None;
        }

        let event = match decode::decode_line(line) {
            Ok(Some(event)) => event,
            Ok(None) => return None,
            Err(e) => {
                self.malformed_lines += 1;
                log::warn!("Skipping upstream line: {e}");
                return None;
            }
        };

        self.state = StreamState::Streaming;
        let phase = event.phase();

        let chunk = match event {
            UpstreamEvent::Thinking { content } | UpstreamEvent::Answer { content } => {
                encode::encode_chunk(&self.ctx, phase, content, None, None)
            }
            UpstreamEvent::Other { content, usage } => encode::encode_chunk(
                &self.ctx,
                phase,
                content,
                Some(usage),
                Some(FinishReason::Stop),
            ),
            UpstreamEvent::ToolCall { .. } => {
                log::trace!("Dropping tool_call event; tool calls are not forwarded");
                return None;
            }
            UpstreamEvent::Done => {
                self.state = StreamState::Done;
                return Some(StreamItem::Done);
            }
        };

        Some(StreamItem::Chunk(chunk))
    }

    /// Record a transport failure
    pub fn fail(&mut self) {
        self.state = StreamState::Failed;
    }
}

/// Translate a stream of upstream lines into caller-facing items.
///
/// Stops reading after the first `done`. A read error is yielded once and ends
/// the stream.
pub fn translate<S, E>(lines: S, ctx: ResponseContext) -> BoxStream<'static, Result<StreamItem, ZaiError>>
where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: Into<ZaiError> + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut lines = Box::pin(lines);
        let mut reemitter = Reemitter::new(ctx);

        while let Some(line) = lines.next().await {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    reemitter.fail();
                    let err: ZaiError = e.into();
                    log::error!("Upstream stream failed: {err}");
                    Err(err)?
                }
            };

            if let Some(item) = reemitter.feed(&line) {
                yield item;
            }

            if reemitter.is_finished() {
                break;
            }
        }

        if reemitter.state() != StreamState::Done {
            log::warn!(
                "Upstream stream ended without done ({} malformed lines skipped)",
                reemitter.malformed_lines()
            );
        }
    })
}

/// Fold a stream of upstream lines into one complete response.
///
/// `answer` and `other` contents are concatenated, usage comes from the last
/// `other` and is `{}` when none arrived. Once `other` or `done` has been seen
/// the response is complete, and a later read error only ends aggregation.
/// Before that point a read error is returned as-is, and a clean end of
/// stream is [`ZaiError::IncompleteResponse`].
pub async fn aggregate<S, E>(lines: S, ctx: ResponseContext) -> Result<ChatCompletionResponse, ZaiError>
where
    S: Stream<Item = Result<String, E>> + Send + 'static,
    E: Into<ZaiError> + Send + 'static,
{
    let mut items = translate(lines, ctx.clone());
    let mut content = String::new();
    let mut usage = None;
    let mut complete = false;

    while let Some(item) = items.next().await {
        let item = match item {
            Ok(item) => item,
            Err(e) if complete => {
                log::warn!("Upstream stream failed after the final metadata: {e}");
                break;
            }
            Err(e) => return Err(e),
        };

        match item {
            StreamItem::Chunk(chunk) => {
                if let Some(text) = chunk.delta().and_then(|delta| delta.content.as_deref()) {
                    content.push_str(text);
                }
                // only `other` chunks carry a finish reason
                if chunk.finish_reason().is_some() {
                    usage = chunk.usage;
                    complete = true;
                }
            }
            StreamItem::Done => {
                complete = true;
                break;
            }
        }
    }

    if !complete {
        return Err(ZaiError::IncompleteResponse {
            received_chars: content.chars().count(),
        });
    }

    let usage = usage.unwrap_or_else(|| Value::Object(Map::new()));
    Ok(encode::encode_response(&ctx, content, usage))
}
