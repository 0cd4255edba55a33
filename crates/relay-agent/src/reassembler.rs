//! Streaming Reassembler (spec.md §4.6): a pure fold of provider chunks
//! into `(content, tool_calls, usage)`, isolated from the loop body so the
//! loop's `Step` interface is identical in streaming and non-streaming
//! mode (design note §9).
//!
//! Grounded on `tyler/models/agent.py`'s `_process_streaming_chunks`
//! (index-keyed tool-call delta accumulation, final-chunk-only usage).

use futures::stream::{BoxStream, StreamExt};
use relay_thread::ToolCallRef;

use crate::llm::{LlmStreamEvent, LlmUsage};

#[derive(Debug, Clone, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Result of folding a stream to completion.
#[derive(Debug, Clone, Default)]
pub struct ReassembledResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCallRef>,
    pub usage: Option<LlmUsage>,
}

/// Folds an asynchronous sequence of provider chunks into a final
/// response. Empty input yields `("", [], None)` (spec.md §4.6).
pub async fn reassemble(mut stream: BoxStream<'static, LlmStreamEvent>) -> ReassembledResponse {
    let mut content = String::new();
    let mut by_index: Vec<Option<PartialToolCall>> = Vec::new();
    let mut usage = None;

    while let Some(event) = stream.next().await {
        match event {
            LlmStreamEvent::TextDelta(delta) => content.push_str(&delta),
            LlmStreamEvent::ToolCallDelta {
                index,
                id,
                name,
                arguments_delta,
            } => {
                if by_index.len() <= index {
                    by_index.resize_with(index + 1, || None);
                }
                let slot = by_index[index].get_or_insert_with(PartialToolCall::default);
                if let Some(id) = id {
                    slot.id = id;
                }
                if let Some(name) = name {
                    slot.name = name;
                }
                if let Some(delta) = arguments_delta {
                    slot.arguments.push_str(&delta);
                }
            }
            LlmStreamEvent::Done(final_usage) => {
                // Usage, if present, is taken from the final chunk only.
                usage = final_usage;
            }
            LlmStreamEvent::Error(_) => {
                // Surfacing provider errors is the loop's job (it awaits
                // `complete_stream`'s Result before ever reaching this
                // fold); an in-stream Error event here just truncates
                // reassembly at whatever was accumulated so far.
                break;
            }
        }
    }

    let tool_calls = by_index
        .into_iter()
        .flatten()
        .map(|p| ToolCallRef::new(p.id, p.name, p.arguments))
        .collect();

    ReassembledResponse {
        content,
        tool_calls,
        usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn empty_stream_yields_empty_defaults() {
        let s: BoxStream<'static, LlmStreamEvent> = stream::empty().boxed();
        let result = reassemble(s).await;
        assert_eq!(result.content, "");
        assert!(result.tool_calls.is_empty());
        assert!(result.usage.is_none());
    }

    #[tokio::test]
    async fn text_deltas_concatenate_in_arrival_order() {
        let events = vec![
            LlmStreamEvent::TextDelta("Hello".to_string()),
            LlmStreamEvent::TextDelta(", world".to_string()),
            LlmStreamEvent::Done(None),
        ];
        let s: BoxStream<'static, LlmStreamEvent> = stream::iter(events).boxed();
        let result = reassemble(s).await;
        assert_eq!(result.content, "Hello, world");
    }

    #[tokio::test]
    async fn tool_call_deltas_accumulate_by_index() {
        let events = vec![
            LlmStreamEvent::ToolCallDelta {
                index: 0,
                id: Some("c1".to_string()),
                name: Some("get_weather".to_string()),
                arguments_delta: Some("{\"loc".to_string()),
            },
            LlmStreamEvent::ToolCallDelta {
                index: 0,
                id: None,
                name: None,
                arguments_delta: Some("ation\":\"SF\"}".to_string()),
            },
            LlmStreamEvent::Done(None),
        ];
        let s: BoxStream<'static, LlmStreamEvent> = stream::iter(events).boxed();
        let result = reassemble(s).await;
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].function.arguments, "{\"location\":\"SF\"}");
    }

    #[tokio::test]
    async fn usage_is_taken_from_final_chunk_only() {
        let usage = LlmUsage {
            prompt_tokens: 1,
            completion_tokens: 2,
            total_tokens: 3,
        };
        let events = vec![
            LlmStreamEvent::TextDelta("hi".to_string()),
            LlmStreamEvent::Done(Some(usage.clone())),
        ];
        let s: BoxStream<'static, LlmStreamEvent> = stream::iter(events).boxed();
        let result = reassemble(s).await;
        assert_eq!(result.usage.unwrap().total_tokens, 3);
    }
}
