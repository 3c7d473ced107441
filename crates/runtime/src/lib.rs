//! Turn orchestration runtime.
//!
//! Owns the loop that ties history reconstruction, model streaming, and
//! tool dispatch into agent turns — one running turn per thread,
//! superseded cooperatively when a new submission or edit arrives.

pub mod cancel;
pub mod dispatch;
pub mod edit;
pub mod registry;
pub mod summarize;
pub mod turn;

pub use cancel::CancelToken;
pub use dispatch::{dispatch_tool, ToolCapability, ToolError};
pub use edit::EditRequest;
pub use registry::ThreadRegistry;
pub use turn::{AgentLoop, TurnEvent, TurnInput};
