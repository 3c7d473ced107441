//! Turn execution loop — the orchestrator that rebuilds history, streams
//! the model, dispatches tool calls, and persists the resulting steps.
//!
//! Entry points: [`AgentLoop::submit`] for user turns and
//! [`AgentLoop::submit_edit`] for retroactive edits. Both cancel any
//! in-flight turn on the thread, wait for it to drain out of the
//! per-thread exclusive section, and return a channel of [`TurnEvent`]s.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;

use rl_domain::config::Config;
use rl_domain::error::{Error, Result};
use rl_domain::step::{Step, StepType};
use rl_domain::stream::StreamEvent;
use rl_domain::tool::{ToolCall, ToolDescriptor};
use rl_providers::accumulator::DeltaAccumulator;
use rl_providers::traits::{CompletionRequest, CompletionsTransport};
use rl_threads::history::build_history;
use rl_threads::store::{StepSink, ThreadStore};

use crate::cancel::CancelToken;
use crate::dispatch::{dispatch_tool, ToolCapability};
use crate::edit::EditRequest;
use crate::registry::ThreadRegistry;
use crate::summarize::summarize_reasoning;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// TurnEvent
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events emitted while a turn runs. The UI layer renders these; the
/// engine never talks to a display directly.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// Incremental reasoning from the model.
    #[serde(rename = "reasoning_delta")]
    ReasoningDelta { text: String },

    /// Incremental answer text.
    #[serde(rename = "assistant_delta")]
    AssistantDelta { text: String },

    /// The model is invoking a tool.
    #[serde(rename = "tool_call")]
    ToolCallEvent {
        call_id: String,
        tool_name: String,
        arguments: Value,
    },

    /// Tool execution result (success and failure both arrive as text).
    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        tool_name: String,
        content: String,
    },

    /// The final assistant message (full text).
    #[serde(rename = "final")]
    Final { content: String },

    /// The turn was superseded by a newer submission.
    #[serde(rename = "stopped")]
    Stopped,

    /// An error ended the turn.
    #[serde(rename = "error")]
    Error { message: String },
}

/// Input to a user-visible turn.
#[derive(Debug, Clone)]
pub struct TurnInput {
    pub thread_id: String,
    /// Id of the user message step this turn answers; tool steps parent
    /// onto it until the model produces answer text.
    pub message_id: String,
    /// Tool definitions available to this session.
    pub tools: Vec<ToolDescriptor>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AgentLoop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The agent loop: one instance serves many threads, one running turn
/// per thread.
pub struct AgentLoop {
    pub(crate) transport: Arc<dyn CompletionsTransport>,
    pub(crate) store: Arc<dyn ThreadStore>,
    pub(crate) sink: Arc<dyn StepSink>,
    pub(crate) tools: Option<Arc<dyn ToolCapability>>,
    pub(crate) registry: Arc<ThreadRegistry>,
    pub(crate) config: Config,
}

impl AgentLoop {
    pub fn new(
        transport: Arc<dyn CompletionsTransport>,
        store: Arc<dyn ThreadStore>,
        sink: Arc<dyn StepSink>,
        tools: Option<Arc<dyn ToolCapability>>,
        registry: Arc<ThreadRegistry>,
        config: Config,
    ) -> Self {
        Self {
            transport,
            store,
            sink,
            tools,
            registry,
            config,
        }
    }

    pub(crate) fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.config.tools.call_timeout_secs)
    }

    /// Submit a user turn.
    ///
    /// Requests cancellation of any in-flight turn on the thread, then
    /// runs rounds until one produces no tool calls. The caller reads
    /// [`TurnEvent`]s from the returned channel as they arrive.
    pub fn submit(self: &Arc<Self>, input: TurnInput) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel::<TurnEvent>(64);

        self.registry.cancel_running(&input.thread_id);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let permit = match this.registry.acquire(&input.thread_id).await {
                Ok(permit) => permit,
                Err(e) => {
                    let _ = tx.send(TurnEvent::Error { message: e.to_string() }).await;
                    return;
                }
            };
            let token = this.registry.begin_turn(&input.thread_id);

            let result = this.run_rounds(&input, &tx, &token).await;

            this.registry.finish_turn(&input.thread_id, &token);
            drop(permit);
            emit_outcome(&tx, &input.thread_id, result).await;
        });

        rx
    }

    /// Apply a retroactive edit (see [`EditRequest`]).
    ///
    /// Same arrival discipline as a user turn: the in-flight turn is
    /// cancelled and drained before the replay touches the thread.
    pub fn submit_edit(self: &Arc<Self>, request: EditRequest) -> mpsc::Receiver<TurnEvent> {
        let (tx, rx) = mpsc::channel::<TurnEvent>(64);

        self.registry.cancel_running(&request.thread_id);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let permit = match this.registry.acquire(&request.thread_id).await {
                Ok(permit) => permit,
                Err(e) => {
                    let _ = tx.send(TurnEvent::Error { message: e.to_string() }).await;
                    return;
                }
            };
            let token = this.registry.begin_turn(&request.thread_id);

            let result = this.replay_edit(&request, &tx, &token).await;

            this.registry.finish_turn(&request.thread_id, &token);
            drop(permit);
            emit_outcome(&tx, &request.thread_id, result).await;
        });

        rx
    }

    // ── Round loop ─────────────────────────────────────────────────

    async fn run_rounds(
        &self,
        input: &TurnInput,
        tx: &mpsc::Sender<TurnEvent>,
        token: &CancelToken,
    ) -> Result<()> {
        let mut last_message_id = input.message_id.clone();

        for round in 0..self.config.turn.max_rounds {
            tracing::debug!(thread_id = %input.thread_id, round, "turn round");

            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let dispatched = self
                .run_round(&input.thread_id, &mut last_message_id, &input.tools, tx, token)
                .await?;
            if !dispatched {
                return Ok(());
            }
        }

        let max_rounds = self.config.turn.max_rounds;
        tracing::warn!(thread_id = %input.thread_id, "round limit reached ({max_rounds})");
        let _ = tx
            .send(TurnEvent::Error {
                message: format!("round limit reached ({max_rounds} rounds)"),
            })
            .await;
        Ok(())
    }

    /// One round: rebuild history, stream the model, persist the
    /// resulting steps, dispatch any tool calls sequentially.
    ///
    /// Returns whether tool calls were dispatched (the loop continues) —
    /// a round without them is the turn's final answer.
    pub(crate) async fn run_round(
        &self,
        thread_id: &str,
        last_message_id: &mut String,
        tools: &[ToolDescriptor],
        tx: &mpsc::Sender<TurnEvent>,
        token: &CancelToken,
    ) -> Result<bool> {
        // History is rebuilt from the persisted tree every round, so
        // edits and branch switches landing between rounds take effect.
        let messages =
            build_history(self.store.as_ref(), thread_id, self.config.history.compressed).await?;
        let req = CompletionRequest {
            messages,
            temperature: Some(self.config.llm.temperature),
            max_tokens: Some(self.config.llm.max_tokens),
            tools: tools.to_vec(),
        };

        let mut stream = self.transport.stream(&req).await?;
        let mut acc = DeltaAccumulator::new();

        while let Some(event) = stream.next().await {
            if token.is_cancelled() {
                // Partial state dies with the accumulator; nothing has
                // been persisted yet.
                return Err(Error::Cancelled);
            }
            let event = event?;
            match &event {
                StreamEvent::Content { text } => {
                    let _ = tx.send(TurnEvent::AssistantDelta { text: text.clone() }).await;
                }
                StreamEvent::Reasoning { text } => {
                    let _ = tx.send(TurnEvent::ReasoningDelta { text: text.clone() }).await;
                }
                _ => {}
            }
            acc.push(&event);
        }
        let completion = acc.finish();

        if !completion.reasoning.is_empty() {
            let summary =
                summarize_reasoning(self.transport.as_ref(), &self.config, &completion.reasoning)
                    .await;
            let mut step = Step::new("reasoning", StepType::Cot);
            step.input = summary;
            step.output = completion.reasoning.clone();
            self.sink.create_step(thread_id, &step).await?;
        }

        if !completion.content.is_empty() {
            let mut step = Step::new("assistant", StepType::AssistantMessage);
            step.output = completion.content.clone();
            self.sink.create_step(thread_id, &step).await?;
            *last_message_id = step.id.clone();
        }

        if completion.tool_calls.is_empty() {
            let _ = tx.send(TurnEvent::Final { content: completion.content }).await;
            return Ok(false);
        }

        for call in &completion.tool_calls {
            if token.is_cancelled() {
                return Err(Error::Cancelled);
            }
            self.dispatch_call(thread_id, last_message_id, call, tx).await?;
        }
        Ok(true)
    }

    /// Persist one tool step and execute its call. The step is created
    /// before dispatch so an interrupted call stays inspectable — an
    /// empty output is exactly what the edit replayer re-executes.
    async fn dispatch_call(
        &self,
        thread_id: &str,
        parent_id: &str,
        call: &ToolCall,
        tx: &mpsc::Sender<TurnEvent>,
    ) -> Result<()> {
        let _ = tx
            .send(TurnEvent::ToolCallEvent {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                arguments: call.arguments.clone(),
            })
            .await;

        let mut step = Step::new(&call.name, StepType::Tool);
        step.parent_id = Some(parent_id.to_owned());
        step.input = tool_step_input(call)?;
        self.sink.create_step(thread_id, &step).await?;

        let result =
            dispatch_tool(self.tools.as_ref(), &call.name, &call.arguments, self.tool_timeout())
                .await;

        step.output = result.clone();
        self.sink.update_step(thread_id, &step).await?;

        let _ = tx
            .send(TurnEvent::ToolResult {
                call_id: call.id.clone(),
                tool_name: call.name.clone(),
                content: result,
            })
            .await;
        Ok(())
    }
}

/// Translate a finished turn's outcome into its terminal event.
/// Cancellation is not a failure: the caller sees `Stopped`, never
/// `Error`.
async fn emit_outcome(tx: &mpsc::Sender<TurnEvent>, thread_id: &str, result: Result<()>) {
    match result {
        Ok(()) => {}
        Err(Error::Cancelled) => {
            tracing::debug!(thread_id, "turn cancelled");
            let _ = tx.send(TurnEvent::Stopped).await;
        }
        Err(e) => {
            tracing::warn!(thread_id, error = %e, "turn failed");
            let _ = tx.send(TurnEvent::Error { message: e.to_string() }).await;
        }
    }
}

/// The persisted representation of a tool call: the exact JSON text the
/// projector later replays as the assistant's invocation message.
fn tool_step_input(call: &ToolCall) -> Result<String> {
    #[derive(Serialize)]
    struct ToolStepInput<'a> {
        name: &'a str,
        arguments: &'a Value,
    }
    Ok(serde_json::to_string(&ToolStepInput {
        name: &call.name,
        arguments: &call.arguments,
    })?)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
