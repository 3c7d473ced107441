//! Edit replay — re-executing a retroactively edited step.
//!
//! A tool step whose dispatch never completed (empty output) gets its
//! call re-extracted from the edited input and re-dispatched onto the
//! same step identity. An edited reasoning step gets a fresh summary and
//! exactly one new decision round, so the model can choose — in light of
//! the edited reasoning — whether to call a tool or answer.

use serde_json::Value;
use tokio::sync::mpsc;

use rl_domain::error::{Error, Result};
use rl_domain::step::{Step, StepType};
use rl_domain::tool::ToolDescriptor;

use crate::cancel::CancelToken;
use crate::dispatch::dispatch_tool;
use crate::summarize::summarize_reasoning;
use crate::turn::{AgentLoop, TurnEvent};

/// A retroactive edit to apply to a thread. The step's content was
/// already rewritten in place by the UI layer; this replays its effects.
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub thread_id: String,
    pub step_id: String,
    /// Tool definitions for the decision round a reasoning edit triggers.
    pub tools: Vec<ToolDescriptor>,
}

/// Extract `{name, arguments}` from a tool step's (possibly edited)
/// input. Accepts the flat shape and the `{"query": {...}}` wrapper the
/// UI layer produces. A missing name reads as `"unknown"`; non-object
/// arguments read as empty.
pub fn extract_tool_call(input: &str) -> Result<(String, Value)> {
    let payload: Value = if input.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(input)?
    };
    let payload = match payload.get("query") {
        Some(inner @ Value::Object(_)) => inner.clone(),
        _ => payload,
    };

    let name = payload
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let arguments = match payload.get("arguments") {
        Some(args @ Value::Object(_)) => args.clone(),
        _ => Value::Object(Default::default()),
    };
    Ok((name, arguments))
}

impl AgentLoop {
    pub(crate) async fn replay_edit(
        &self,
        request: &EditRequest,
        tx: &mpsc::Sender<TurnEvent>,
        token: &CancelToken,
    ) -> Result<()> {
        let step = self
            .store
            .get_step(&request.thread_id, &request.step_id)
            .await?
            .ok_or_else(|| Error::StepNotFound {
                thread_id: request.thread_id.clone(),
                step_id: request.step_id.clone(),
            })?;

        match step.step_type {
            StepType::Tool => self.replay_tool_step(&request.thread_id, step, tx).await,
            StepType::Cot => self.replay_cot_step(request, step, tx, token).await,
            other => {
                tracing::warn!(
                    step_id = %request.step_id,
                    step_type = ?other,
                    "step type cannot be replayed; ignoring edit"
                );
                Ok(())
            }
        }
    }

    /// Re-dispatch a tool step whose call never completed. The result
    /// lands on the same step identity; a completed step is left alone.
    async fn replay_tool_step(
        &self,
        thread_id: &str,
        mut step: Step,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<()> {
        if !step.output.is_empty() {
            tracing::debug!(step_id = %step.id, "tool step already has output; skipping re-execution");
            return Ok(());
        }

        let (name, arguments) = match extract_tool_call(&step.input) {
            Ok(call) => call,
            Err(e) => {
                // The edited input is not a parseable call. Record that
                // on the step so the conversation stays inspectable.
                step.output = format!("invalid step input, cannot parse tool call: {e}");
                self.sink.update_step(thread_id, &step).await?;
                return Ok(());
            }
        };

        let _ = tx
            .send(TurnEvent::ToolCallEvent {
                call_id: step.id.clone(),
                tool_name: name.clone(),
                arguments: arguments.clone(),
            })
            .await;

        let result =
            dispatch_tool(self.tools.as_ref(), &name, &arguments, self.tool_timeout()).await;

        step.output = result.clone();
        self.sink.update_step(thread_id, &step).await?;

        let _ = tx
            .send(TurnEvent::ToolResult {
                call_id: step.id.clone(),
                tool_name: name,
                content: result,
            })
            .await;
        Ok(())
    }

    /// Refresh an edited reasoning step's summary, then run one fresh
    /// decision round over the current branch history. The round's
    /// results persist as new steps, never merged into the edited one.
    async fn replay_cot_step(
        &self,
        request: &EditRequest,
        mut step: Step,
        tx: &mpsc::Sender<TurnEvent>,
        token: &CancelToken,
    ) -> Result<()> {
        let summary =
            summarize_reasoning(self.transport.as_ref(), &self.config, &step.output).await;
        step.input = summary;
        self.sink.update_step(&request.thread_id, &step).await?;

        let mut last_message_id = step.id.clone();
        self.run_round(&request.thread_id, &mut last_message_id, &request.tools, tx, token)
            .await?;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flat_shape_extracts() {
        let (name, args) = extract_tool_call(r#"{"name":"search","arguments":{"q":"x"}}"#).unwrap();
        assert_eq!(name, "search");
        assert_eq!(args, json!({"q": "x"}));
    }

    #[test]
    fn nested_query_shape_extracts() {
        let input = r#"{"query":{"name":"search","arguments":{"q":"x"}}}"#;
        let (name, args) = extract_tool_call(input).unwrap();
        assert_eq!(name, "search");
        assert_eq!(args, json!({"q": "x"}));
    }

    #[test]
    fn empty_input_reads_as_unknown_call() {
        let (name, args) = extract_tool_call("").unwrap();
        assert_eq!(name, "unknown");
        assert_eq!(args, json!({}));
    }

    #[test]
    fn non_object_arguments_read_as_empty() {
        let (name, args) = extract_tool_call(r#"{"name":"search","arguments":"oops"}"#).unwrap();
        assert_eq!(name, "search");
        assert_eq!(args, json!({}));
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(extract_tool_call("{not json").is_err());
    }

    #[test]
    fn non_object_query_falls_back_to_flat_shape() {
        let (name, _) = extract_tool_call(r#"{"query":"x","name":"direct","arguments":{}}"#).unwrap();
        assert_eq!(name, "direct");
    }
}
