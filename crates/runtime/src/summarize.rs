//! Reasoning summarization.
//!
//! Reasoning steps carry their full output plus a short summary in the
//! input slot; compressed history projects the summary instead of the
//! full block. The summary is produced here, both when a reasoning step
//! is first persisted and when an edit replays one.

use rl_domain::config::Config;
use rl_domain::message::Message;
use rl_providers::traits::{CompletionRequest, CompletionsTransport};

const SUMMARIZER_SYSTEM_PROMPT: &str = "You are a helpful assistant that summarizes reasoning.";

/// Placeholder when the summarizer returns nothing usable.
pub const EMPTY_SUMMARY: &str = "No plan could be summarized.";

/// Compress a reasoning block into a concise plan via a dedicated
/// completion. The summary slot must always hold something, so failure
/// degrades to an error string instead of failing the caller.
pub async fn summarize_reasoning(
    transport: &dyn CompletionsTransport,
    config: &Config,
    reasoning: &str,
) -> String {
    let prompt =
        format!("Summarize the following reasoning into a concise plan:\n\n{reasoning}\n\nPlan:");
    let req = CompletionRequest {
        messages: vec![
            Message::system(SUMMARIZER_SYSTEM_PROMPT),
            Message::user(prompt),
        ],
        temperature: Some(config.turn.summarizer_temperature),
        max_tokens: Some(config.turn.summarizer_max_tokens),
        tools: Vec::new(),
    };

    match transport.complete(&req).await {
        Ok(completion) => {
            let summary = completion.content.trim().to_string();
            if summary.is_empty() {
                EMPTY_SUMMARY.to_string()
            } else {
                summary
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "reasoning summarization failed");
            format!("Error in summarizing reasoning: {e}")
        }
    }
}
