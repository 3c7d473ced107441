use rl_domain::error::Result;
use rl_domain::message::Message;
use rl_domain::stream::{BoxStream, Completion, StreamEvent};
use rl_domain::tool::ToolDescriptor;

/// A chat completion request: the projected history plus sampling knobs.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDescriptor>,
}

/// The completions transport capability.
///
/// Implementations adapt one concrete upstream API; everything they emit
/// is already decoded into canonical [`StreamEvent`]s.
#[async_trait::async_trait]
pub trait CompletionsTransport: Send + Sync {
    /// Stream partial completions for a request.
    async fn stream(
        &self,
        req: &CompletionRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// Request one full completion.
    async fn complete(&self, req: &CompletionRequest) -> Result<Completion>;
}
