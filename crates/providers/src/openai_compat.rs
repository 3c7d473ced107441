//! OpenAI-compatible completions adapter.
//!
//! Works with OpenAI, Ollama, vLLM, and any other endpoint following the
//! chat-completions contract. Decodes the wire format — streaming SSE
//! deltas and single-shot responses — into canonical events at the
//! boundary; nothing past this module sees a provider-specific shape.

use std::time::Duration;

use serde_json::{json, Value};

use rl_domain::config::LlmConfig;
use rl_domain::error::{Error, Result};
use rl_domain::message::{Message, Role};
use rl_domain::stream::{BoxStream, Completion, StreamEvent};
use rl_domain::tool::{ToolCall, ToolDescriptor};

use crate::accumulator::recover_tool_calls;
use crate::sse::sse_response_stream;
use crate::traits::{CompletionRequest, CompletionsTransport};
use crate::util::from_reqwest;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatTransport {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatTransport {
    /// Build the adapter from config. A missing API key env var means an
    /// unauthenticated endpoint (local inference servers).
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&cfg.api_key_env).ok();
        if api_key.is_none() {
            tracing::debug!(env = %cfg.api_key_env, "api key env var unset; sending unauthenticated requests");
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            client,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder
    }

    fn build_body(&self, req: &CompletionRequest, stream: bool) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_wire).collect();

        let mut body = json!({
            "model": self.model,
            "messages": messages,
            "stream": stream,
        });
        if !req.tools.is_empty() {
            body["tools"] = Value::Array(req.tools.iter().map(tool_to_wire).collect());
        }
        if let Some(temperature) = req.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = req.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_wire(msg: &Message) -> Value {
    json!({
        "role": role_to_str(msg.role),
        "content": msg.content,
    })
}

fn tool_to_wire(tool: &ToolDescriptor) -> Value {
    json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response decoding
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn transport_err(message: impl Into<String>) -> Error {
    Error::Transport {
        transport: "openai_compat".into(),
        message: message.into(),
    }
}

/// Reasoning field compatibility: different models call it `reasoning`
/// or `reasoning_content`.
fn reasoning_of(obj: &Value) -> Option<&str> {
    obj.get("reasoning")
        .or_else(|| obj.get("reasoning_content"))
        .and_then(Value::as_str)
}

/// Decode one streaming `data:` payload into canonical events.
///
/// One delta chunk can carry a content fragment, a reasoning fragment,
/// and several indexed tool-call fragments at once; all of them are
/// emitted, in tool-calls-first order matching the wire layout.
fn parse_stream_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let Some(choice) = v
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
    else {
        return Vec::new();
    };

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        return vec![Ok(StreamEvent::Done {
            finish_reason: Some(reason.to_string()),
        })];
    }

    let delta = choice.get("delta").unwrap_or(&Value::Null);
    let mut events = Vec::new();

    if let Some(fragments) = delta.get("tool_calls").and_then(Value::as_array) {
        for (pos, fragment) in fragments.iter().enumerate() {
            let index = fragment
                .get("index")
                .and_then(Value::as_u64)
                .unwrap_or(pos as u64) as u32;
            let function = fragment.get("function").unwrap_or(&Value::Null);
            events.push(Ok(StreamEvent::ToolCallFragment {
                index,
                id: fragment.get("id").and_then(Value::as_str).map(String::from),
                name: function.get("name").and_then(Value::as_str).map(String::from),
                arguments: function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .map(String::from),
            }));
        }
    }

    if let Some(text) = reasoning_of(delta) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Reasoning { text: text.to_string() }));
        }
    }

    if let Some(text) = delta.get("content").and_then(Value::as_str) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Content { text: text.to_string() }));
        }
    }

    events
}

/// Decode a single-shot response body, applying the same textual
/// tool-call recovery the streaming path gets from the accumulator.
fn parse_completion(body: &Value) -> Result<Completion> {
    let message = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|a| a.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| transport_err("no choices in response"))?;

    let mut content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let reasoning = reasoning_of(message).unwrap_or("").to_string();

    let mut tool_calls = parse_wire_tool_calls(message);
    if tool_calls.is_empty() && !content.is_empty() {
        let recovered = recover_tool_calls(&content);
        if !recovered.is_empty() {
            tool_calls = recovered;
            content.clear();
        }
    }

    Ok(Completion {
        content,
        reasoning,
        tool_calls,
    })
}

fn parse_wire_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(entries) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let function = entry.get("function")?;
            let name = function.get("name")?.as_str()?.to_string();
            let id = entry
                .get("id")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let raw_args = function
                .get("arguments")
                .and_then(Value::as_str)
                .unwrap_or("{}");
            let arguments =
                serde_json::from_str(raw_args).unwrap_or(Value::Object(Default::default()));
            Some(ToolCall { id, name, arguments })
        })
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl CompletionsTransport for OpenAiCompatTransport {
    async fn stream(
        &self,
        req: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = self.chat_url();
        let body = self.build_body(req, true);

        tracing::debug!(url = %url, model = %self.model, "streaming completion request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(transport_err(format!("HTTP {} - {}", status.as_u16(), err_text)));
        }

        Ok(sse_response_stream(resp, parse_stream_data))
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion> {
        let url = self.chat_url();
        let body = self.build_body(req, false);

        tracing::debug!(url = %url, model = %self.model, "single-shot completion request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;
        if !status.is_success() {
            return Err(transport_err(format!("HTTP {} - {}", status.as_u16(), resp_text)));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_completion(&resp_json)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn only(events: Vec<Result<StreamEvent>>) -> StreamEvent {
        assert_eq!(events.len(), 1);
        events.into_iter().next().unwrap().unwrap()
    }

    #[test]
    fn done_sentinel_decodes() {
        let event = only(parse_stream_data("[DONE]"));
        assert!(matches!(event, StreamEvent::Done { .. }));
    }

    #[test]
    fn content_delta_decodes() {
        let data = json!({"choices":[{"delta":{"content":"Hi"}}]}).to_string();
        match only(parse_stream_data(&data)) {
            StreamEvent::Content { text } => assert_eq!(text, "Hi"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn reasoning_content_field_is_compatible() {
        let data = json!({"choices":[{"delta":{"reasoning_content":"hmm"}}]}).to_string();
        match only(parse_stream_data(&data)) {
            StreamEvent::Reasoning { text } => assert_eq!(text, "hmm"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn tool_call_delta_decodes_with_index() {
        let data = json!({"choices":[{"delta":{"tool_calls":[
            {"index": 2, "id": "call_9", "function": {"name": "search", "arguments": "{\"q\""}}
        ]}}]})
        .to_string();
        match only(parse_stream_data(&data)) {
            StreamEvent::ToolCallFragment { index, id, name, arguments } => {
                assert_eq!(index, 2);
                assert_eq!(id.as_deref(), Some("call_9"));
                assert_eq!(name.as_deref(), Some("search"));
                assert_eq!(arguments.as_deref(), Some("{\"q\""));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn one_chunk_can_carry_multiple_fragments() {
        let data = json!({"choices":[{"delta":{
            "content": "text",
            "reasoning": "why",
            "tool_calls": [{"index": 0, "function": {"arguments": "x"}}]
        }}]})
        .to_string();
        let events = parse_stream_data(&data);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn finish_reason_chunk_becomes_done() {
        let data = json!({"choices":[{"delta":{},"finish_reason":"tool_calls"}]}).to_string();
        match only(parse_stream_data(&data)) {
            StreamEvent::Done { finish_reason } => {
                assert_eq!(finish_reason.as_deref(), Some("tool_calls"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn empty_delta_decodes_to_nothing() {
        let data = json!({"choices":[{"delta":{}}]}).to_string();
        assert!(parse_stream_data(&data).is_empty());
    }

    #[test]
    fn single_shot_response_parses() {
        let body = json!({"choices":[{"message":{
            "content": "Hello",
            "reasoning_content": "thinking",
            "tool_calls": [
                {"id": "c1", "function": {"name": "search", "arguments": "{\"q\":\"x\"}"}}
            ]
        }}]});
        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.content, "Hello");
        assert_eq!(completion.reasoning, "thinking");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].arguments, json!({"q": "x"}));
    }

    #[test]
    fn single_shot_recovers_textual_tool_call() {
        let body = json!({"choices":[{"message":{
            "content": "{\"name\":\"search\",\"arguments\":{\"q\":\"x\"}}"
        }}]});
        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.content, "");
        assert_eq!(completion.tool_calls.len(), 1);
        assert_eq!(completion.tool_calls[0].name, "search");
    }

    #[test]
    fn missing_choices_is_a_transport_error() {
        let body = json!({"error": "overloaded"});
        assert!(parse_completion(&body).is_err());
    }

    #[test]
    fn malformed_wire_arguments_default_to_empty_object() {
        let body = json!({"choices":[{"message":{
            "content": "",
            "tool_calls": [
                {"id": "c1", "function": {"name": "search", "arguments": "not json"}}
            ]
        }}]});
        let completion = parse_completion(&body).unwrap();
        assert_eq!(completion.tool_calls[0].arguments, json!({}));
    }
}
