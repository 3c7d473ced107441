use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub turn: TurnConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Completions endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Connection settings for an OpenAI-compatible completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    /// Env var holding the API key. Unset env var = unauthenticated
    /// endpoint (local inference servers).
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_temperature")]
    pub temperature: f32,
    #[serde(default = "d_max_tokens")]
    pub max_tokens: u32,
    /// Whole-request HTTP timeout (seconds).
    #[serde(default = "d_120")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            api_key_env: d_api_key_env(),
            temperature: d_temperature(),
            max_tokens: d_max_tokens(),
            timeout_secs: 120,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool invocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Limits on external tool dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Hard timeout per tool call (seconds). A call exceeding it is
    /// reported as failed, never retried.
    #[serde(default = "d_300")]
    pub call_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self { call_timeout_secs: 300 }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History projection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// How threads are projected into completions payloads.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryConfig {
    /// Omit tool transcripts and collapse older reasoning steps to their
    /// short summaries.
    #[serde(default)]
    pub compressed: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Turn loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Turn loop limits and the reasoning summarizer's sampling knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnConfig {
    /// Maximum model/tool rounds per turn before we force-stop.
    #[serde(default = "d_25")]
    pub max_rounds: usize,
    #[serde(default = "d_05")]
    pub summarizer_temperature: f32,
    #[serde(default = "d_10000")]
    pub summarizer_max_tokens: u32,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_rounds: 25,
            summarizer_temperature: 0.5,
            summarizer_max_tokens: 10_000,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Default value helpers (serde)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model() -> String {
    "gpt-4o".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn d_temperature() -> f32 {
    0.7
}
fn d_max_tokens() -> u32 {
    4096
}
fn d_120() -> u64 {
    120
}
fn d_300() -> u64 {
    300
}
fn d_25() -> usize {
    25
}
fn d_05() -> f32 {
    0.5
}
fn d_10000() -> u32 {
    10_000
}
