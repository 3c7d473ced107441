use serde::Serialize;
use std::pin::Pin;

use crate::tool::ToolCall;

/// A boxed async stream, used for partial-completion sequences.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Canonical partial-completion events.
///
/// Every transport adapter decodes its wire format into these at the
/// boundary; nothing downstream sees a provider-specific delta shape.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A user-visible content fragment.
    #[serde(rename = "content")]
    Content { text: String },

    /// A reasoning fragment, kept separate from the answer text.
    #[serde(rename = "reasoning")]
    Reasoning { text: String },

    /// One fragment of a tool call, keyed by its positional index.
    /// `name` arrives whole; `arguments` arrives as pieces of a JSON
    /// string and must be concatenated in order.
    #[serde(rename = "tool_call")]
    ToolCallFragment {
        index: u32,
        id: Option<String>,
        name: Option<String>,
        arguments: Option<String>,
    },

    /// The terminal completion signal.
    #[serde(rename = "done")]
    Done { finish_reason: Option<String> },
}

/// A coherent completion: the accumulated (or single-shot) result of one
/// model call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
}
