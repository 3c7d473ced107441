//! Completions transport capability and streaming accumulation.
//!
//! The transport boundary decodes upstream wire formats into canonical
//! [`rl_domain::stream::StreamEvent`]s; the [`DeltaAccumulator`] turns
//! those into one coherent completion, recovering tool calls that were
//! emitted as literal text.

pub mod accumulator;
pub mod openai_compat;
mod sse;
pub mod traits;
mod util;

pub use accumulator::{recover_tool_calls, DeltaAccumulator, PartialToolCall};
pub use openai_compat::OpenAiCompatTransport;
pub use traits::{CompletionRequest, CompletionsTransport};
