//! Tool-call dispatch.
//!
//! Every failure mode of the external tool capability degrades to a
//! textual result: the string lands in the tool step's output, the model
//! sees it on the next round, and the conversation continues. Nothing
//! here propagates, and nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// Result text for a dispatch that exceeded the configured timeout.
pub const TOOL_TIMED_OUT: &str = "tool call timed out.";
/// Result text when no tool capability is attached to the session.
pub const TOOL_NOT_INITIALIZED: &str = "tool capability not initialized.";

/// Failure modes of a tool capability.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool call timed out")]
    Timeout,
    #[error("tool capability not initialized")]
    NotInitialized,
    #[error("{0}")]
    Invocation(String),
}

/// The external tool capability (an MCP client, a tool router, a test
/// double).
#[async_trait::async_trait]
pub trait ToolCapability: Send + Sync {
    async fn call(&self, name: &str, arguments: &Value) -> Result<String, ToolError>;
}

/// Invoke a tool under a bounded timeout.
pub async fn dispatch_tool(
    tools: Option<&Arc<dyn ToolCapability>>,
    name: &str,
    arguments: &Value,
    timeout: Duration,
) -> String {
    let Some(tools) = tools else {
        return TOOL_NOT_INITIALIZED.to_string();
    };

    match tokio::time::timeout(timeout, tools.call(name, arguments)).await {
        Ok(Ok(result)) => result,
        Ok(Err(ToolError::Timeout)) | Err(_) => {
            tracing::warn!(tool = name, "tool call timed out");
            TOOL_TIMED_OUT.to_string()
        }
        Ok(Err(ToolError::NotInitialized)) => TOOL_NOT_INITIALIZED.to_string(),
        Ok(Err(e)) => {
            tracing::warn!(tool = name, error = %e, "tool call failed");
            format!("tool call failed: {e}")
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct EchoTool;

    #[async_trait::async_trait]
    impl ToolCapability for EchoTool {
        async fn call(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
            Ok(format!("{name}:{arguments}"))
        }
    }

    struct SlowTool;

    #[async_trait::async_trait]
    impl ToolCapability for SlowTool {
        async fn call(&self, _name: &str, _arguments: &Value) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".into())
        }
    }

    struct FailingTool(ToolError);

    #[async_trait::async_trait]
    impl ToolCapability for FailingTool {
        async fn call(&self, _name: &str, _arguments: &Value) -> Result<String, ToolError> {
            Err(match &self.0 {
                ToolError::Timeout => ToolError::Timeout,
                ToolError::NotInitialized => ToolError::NotInitialized,
                ToolError::Invocation(msg) => ToolError::Invocation(msg.clone()),
            })
        }
    }

    fn capability(tool: impl ToolCapability + 'static) -> Arc<dyn ToolCapability> {
        Arc::new(tool)
    }

    #[tokio::test]
    async fn success_passes_the_result_through() {
        let tools = capability(EchoTool);
        let result = dispatch_tool(
            Some(&tools),
            "search",
            &json!({"q": "x"}),
            Duration::from_secs(5),
        )
        .await;
        assert_eq!(result, r#"search:{"q":"x"}"#);
    }

    #[tokio::test]
    async fn missing_capability_yields_fixed_text() {
        let result = dispatch_tool(None, "search", &json!({}), Duration::from_secs(5)).await;
        assert_eq!(result, TOOL_NOT_INITIALIZED);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_yields_fixed_text() {
        let tools = capability(SlowTool);
        let result =
            dispatch_tool(Some(&tools), "slow", &json!({}), Duration::from_millis(10)).await;
        assert_eq!(result, TOOL_TIMED_OUT);
    }

    #[tokio::test]
    async fn capability_timeout_error_maps_to_same_text() {
        let tools = capability(FailingTool(ToolError::Timeout));
        let result = dispatch_tool(Some(&tools), "t", &json!({}), Duration::from_secs(5)).await;
        assert_eq!(result, TOOL_TIMED_OUT);
    }

    #[tokio::test]
    async fn invocation_failure_embeds_the_message() {
        let tools = capability(FailingTool(ToolError::Invocation("boom".into())));
        let result = dispatch_tool(Some(&tools), "t", &json!({}), Duration::from_secs(5)).await;
        assert_eq!(result, "tool call failed: boom");
    }

    #[tokio::test]
    async fn uninitialized_capability_error_maps_to_fixed_text() {
        let tools = capability(FailingTool(ToolError::NotInitialized));
        let result = dispatch_tool(Some(&tools), "t", &json!({}), Duration::from_secs(5)).await;
        assert_eq!(result, TOOL_NOT_INITIALIZED);
    }
}
