//! Thread persistence contracts and the history reconstruction engine.
//!
//! The engine never owns a database: it consumes a read-side
//! [`ThreadStore`] and a write-side [`StepSink`] provided by the
//! embedder, and turns a persisted step tree into the linear message
//! sequence a completions API replays — flatten the tree, resolve the
//! active branch, project to role/content messages.

pub mod branch;
pub mod flatten;
pub mod history;
pub mod memory;
pub mod project;
pub mod store;

pub use branch::resolve_branch;
pub use flatten::flatten_steps;
pub use history::{build_history, resolve_thread_steps};
pub use memory::MemoryThreadStore;
pub use project::project_messages;
pub use store::{StepSink, ThreadStore};
