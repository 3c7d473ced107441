//! Streaming delta accumulation and textual tool-call recovery.
//!
//! Tool-call deltas arrive as fragments keyed by a positional index: the
//! name typically lands whole, the arguments as pieces of a JSON string.
//! Some upstream models skip the structured fields entirely and emit the
//! invocation as literal JSON text; [`recover_tool_calls`] handles both
//! a whole-content object and objects embedded mid-answer.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use rl_domain::stream::{Completion, StreamEvent};
use rl_domain::tool::ToolCall;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Accumulator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One tool call under assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialToolCall {
    pub id: String,
    pub name: String,
    /// JSON text, grown by exact concatenation of argument fragments.
    pub arguments: String,
}

/// Accumulates a turn's partial-completion events into one coherent
/// result.
///
/// Dropping an accumulator mid-stream discards the partial state —
/// nothing is committed until [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct DeltaAccumulator {
    content: String,
    reasoning: String,
    calls: BTreeMap<u32, PartialToolCall>,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one canonical stream event into the accumulated state.
    pub fn push(&mut self, event: &StreamEvent) {
        match event {
            StreamEvent::Content { text } => self.content.push_str(text),
            StreamEvent::Reasoning { text } => self.reasoning.push_str(text),
            StreamEvent::ToolCallFragment {
                index,
                id,
                name,
                arguments,
            } => {
                let entry = self.calls.entry(*index).or_insert_with(|| PartialToolCall {
                    id: id
                        .clone()
                        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                    name: String::new(),
                    arguments: String::new(),
                });
                if let Some(name) = name {
                    // Names arrive whole; a later fragment wins.
                    entry.name = name.clone();
                }
                if let Some(args) = arguments {
                    entry.arguments.push_str(args);
                }
            }
            StreamEvent::Done { .. } => {}
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning
    }

    /// The in-flight tool-call entries, keyed by positional index.
    pub fn calls(&self) -> &BTreeMap<u32, PartialToolCall> {
        &self.calls
    }

    /// Close the stream: recover tool calls the model emitted as literal
    /// text, then parse every assembled argument string.
    pub fn finish(self) -> Completion {
        if self.calls.is_empty() && !self.content.is_empty() {
            let recovered = recover_tool_calls(&self.content);
            if !recovered.is_empty() {
                // The text was an invocation, not an answer for the user.
                return Completion {
                    content: String::new(),
                    reasoning: self.reasoning,
                    tool_calls: recovered,
                };
            }
        }

        let tool_calls = self.calls.into_values().map(assemble_call).collect();
        Completion {
            content: self.content,
            reasoning: self.reasoning,
            tool_calls,
        }
    }
}

fn assemble_call(partial: PartialToolCall) -> ToolCall {
    let arguments = parse_arguments(&partial.name, &partial.arguments);
    ToolCall {
        id: partial.id,
        name: partial.name,
        arguments,
    }
}

/// Parse assembled argument text, degrading to `{}` on malformed JSON so
/// the call still dispatches and the failure stays visible in history.
fn parse_arguments(name: &str, raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(
                tool = name,
                error = %e,
                "tool call arguments are not valid JSON; defaulting to empty object"
            );
            Value::Object(Default::default())
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Textual recovery
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn embedded_call_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?s)\{\s*"name"\s*:\s*"(?P<name>[^"]+)"\s*,\s*"arguments"\s*:\s*(?P<args>\{.*?\})\s*\}"#,
        )
        .expect("embedded tool call pattern compiles")
    })
}

/// Recover tool calls embedded as literal text.
///
/// Tier 1 parses the entire content as one `{"name", "arguments"}`
/// object; tier 2 scans for embedded objects of that shape. Recovered
/// calls get fresh identifiers. A match whose arguments fail to parse is
/// skipped.
pub fn recover_tool_calls(content: &str) -> Vec<ToolCall> {
    if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(content) {
        if let (Some(name), Some(arguments)) =
            (obj.get("name").and_then(Value::as_str), obj.get("arguments"))
        {
            return vec![ToolCall {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                arguments: arguments.clone(),
            }];
        }
    }

    let mut calls = Vec::new();
    for caps in embedded_call_re().captures_iter(content) {
        let arguments: Value = match serde_json::from_str(&caps["args"]) {
            Ok(v) => v,
            Err(_) => continue,
        };
        calls.push(ToolCall {
            id: uuid::Uuid::new_v4().to_string(),
            name: caps["name"].to_string(),
            arguments,
        });
    }
    if !calls.is_empty() {
        tracing::debug!(count = calls.len(), "recovered tool calls from content text");
    }
    calls
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
