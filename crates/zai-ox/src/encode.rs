use ai_ox_common::openai_format::{
    CHUNK_OBJECT, COMPLETION_OBJECT, ChatCompletionChunk, ChatCompletionResponse, Choice,
    ChunkChoice, ChunkDelta, FinishReason, MessageRole, ResponseMessage,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{decode::Phase, error::ZaiError};

/// Terminal sentinel of a caller-facing stream
pub const DONE_LINE: &str = "data: [DONE]\n\n";

/// Values shared by every chunk of one response, captured when the upstream
/// stream is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseContext {
    pub id: String,
    pub model: String,
    /// Unix seconds
    pub created: i64,
}

impl ResponseContext {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            model: model.into(),
            created: chrono::Utc::now().timestamp(),
        }
    }
}

/// Build the caller-facing chunk for one phase.
///
/// `thinking` text goes to `reasoning_content`, everything else to `content`.
/// Only `other` keeps the supplied finish reason.
#[must_use]
pub fn encode_chunk(
    ctx: &ResponseContext,
    phase: Phase,
    content: String,
    usage: Option<Value>,
    finish_reason: Option<FinishReason>,
) -> ChatCompletionChunk {
    let (delta, finish_reason) = match phase {
        Phase::Thinking => (
            ChunkDelta {
                role: MessageRole::Assistant,
                content: None,
                reasoning_content: Some(content),
            },
            None,
        ),
        Phase::Other => (content_delta(content), finish_reason),
        Phase::Answer | Phase::ToolCall | Phase::Done | Phase::Unknown => {
            (content_delta(content), None)
        }
    };

    ChatCompletionChunk {
        id: ctx.id.clone(),
        object: CHUNK_OBJECT.to_string(),
        created: ctx.created,
        model: ctx.model.clone(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage,
    }
}

/// Assistant delta carrying `content`
fn content_delta(content: String) -> ChunkDelta {
    ChunkDelta {
        role: MessageRole::Assistant,
        content: Some(content),
        reasoning_content: None,
    }
}

/// Build the complete response of a non-streaming request. `usage` is always
/// present on this shape.
#[must_use]
pub fn encode_response(ctx: &ResponseContext, content: String, usage: Value) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: ctx.id.clone(),
        object: COMPLETION_OBJECT.to_string(),
        created: ctx.created,
        model: ctx.model.clone(),
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: MessageRole::Assistant,
                content,
            },
            finish_reason: Some(FinishReason::Stop),
        }],
        usage: Some(usage),
    }
}

/// Render a chunk as one SSE event
pub fn to_sse(chunk: &ChatCompletionChunk) -> Result<String, ZaiError> {
    Ok(format!("data: {}\n\n", serde_json::to_string(chunk)?))
}

/// Body of an SSE error event
#[derive(Serialize)]
struct ErrorEvent<'a> {
    /// Serialized as `{"message", "type"}`
    error: &'a ZaiError,
}

/// Render an error as one SSE event, `data: {"error": {"message", "type"}}`
#[must_use]
pub fn error_event(err: &ZaiError) -> String {
    match serde_json::to_string(&ErrorEvent { error: err }) {
        Ok(json) => format!("data: {json}\n\n"),
        Err(_) => format!(
            "data: {{\"error\":{{\"message\":\"stream failed\",\"type\":\"{}\"}}}}\n\n",
            err.kind()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ResponseContext {
        ResponseContext {
            id: "chatcmpl-test".to_string(),
            model: "glm-4.6".to_string(),
            created: 1_761_038_714,
        }
    }

    #[test]
    fn answer_chunk_shape() {
        let chunk = encode_chunk(&ctx(), Phase::Answer, "hi".into(), None, Some(FinishReason::Stop));
        let value = serde_json::to_value(&chunk).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "chatcmpl-test",
                "object": "chat.completion.chunk",
                "created": 1_761_038_714,
                "model": "glm-4.6",
                "choices": [{
                    "index": 0,
                    "delta": {"role": "assistant", "content": "hi"},
                    "finish_reason": null
                }],
                "usage": null
            })
        );
    }

    #[test]
    fn thinking_goes_to_reasoning_content() {
        let chunk = encode_chunk(&ctx(), Phase::Thinking, "hmm".into(), None, None);
        let delta = chunk.delta().unwrap();
        assert_eq!(delta.reasoning_content.as_deref(), Some("hmm"));
        assert!(delta.content.is_none());
        assert!(chunk.finish_reason().is_none());
    }

    #[test]
    fn other_keeps_finish_reason_and_usage() {
        let usage = json!({"total_tokens": 9});
        let chunk = encode_chunk(
            &ctx(),
            Phase::Other,
            String::new(),
            Some(usage.clone()),
            Some(FinishReason::Stop),
        );
        assert_eq!(chunk.finish_reason(), Some(FinishReason::Stop));
        assert_eq!(chunk.usage, Some(usage));
        assert_eq!(chunk.delta().unwrap().content.as_deref(), Some(""));
    }

    #[test]
    fn tool_call_has_no_finish_reason() {
        let chunk = encode_chunk(&ctx(), Phase::ToolCall, "{}".into(), None, Some(FinishReason::Stop));
        assert!(chunk.finish_reason().is_none());
        assert_eq!(chunk.delta().unwrap().content.as_deref(), Some("{}"));
    }

    #[test]
    fn chunks_share_response_id_and_created() {
        let ctx = ResponseContext::new("glm-4.6");
        let a = encode_chunk(&ctx, Phase::Answer, "a".into(), None, None);
        let b = encode_chunk(&ctx, Phase::Thinking, "b".into(), None, None);
        assert_eq!(a.id, b.id);
        assert_eq!(a.created, b.created);
        assert!(a.id.starts_with("chatcmpl-"));
    }

    #[test]
    fn sse_framing() {
        let chunk = encode_chunk(&ctx(), Phase::Answer, "x".into(), None, None);
        let line = to_sse(&chunk).unwrap();
        assert!(line.starts_with("data: {"));
        assert!(line.ends_with("}\n\n"));
        let parsed: ChatCompletionChunk =
            serde_json::from_str(line.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(parsed, chunk);
    }

    #[test]
    fn response_shape() {
        let response = encode_response(&ctx(), "ABC".into(), json!({"total_tokens": 1}));
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(
            value,
            json!({
                "id": "chatcmpl-test",
                "object": "chat.completion",
                "created": 1_761_038_714,
                "model": "glm-4.6",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "ABC"},
                    "finish_reason": "stop"
                }],
                "usage": {"total_tokens": 1}
            })
        );
    }

    #[test]
    fn error_event_shape() {
        let line = error_event(&ZaiError::Upstream {
            status: 502,
            message: "bad gateway".to_string(),
        });
        let value: Value =
            serde_json::from_str(line.trim_start_matches("data: ").trim_end()).unwrap();
        assert_eq!(value["error"]["type"], "upstream_error");
        assert_eq!(
            value["error"]["message"],
            "Upstream error (HTTP 502): bad gateway"
        );
    }
}
