//! Persistence capability traits.
//!
//! Implementations adapt whatever actually stores the step tree (a
//! relational schema, a document store, [`crate::MemoryThreadStore`] in
//! tests). The engine only ever reads snapshots and writes steps.

use async_trait::async_trait;

use rl_domain::error::Result;
use rl_domain::step::{Step, ThreadSnapshot};

/// Read access to persisted threads.
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Fetch a full thread tree. `Ok(None)` when the thread does not
    /// exist yet — reachable during normal startup ordering, so callers
    /// treat it as "no history", not as a failure.
    async fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>>;

    /// Fetch one step by id.
    async fn get_step(&self, thread_id: &str, step_id: &str) -> Result<Option<Step>>;

    /// Fetch the direct children of a step, in creation order.
    async fn get_children(&self, thread_id: &str, parent_id: &str) -> Result<Vec<Step>>;
}

/// Write access for new and edited steps.
#[async_trait]
pub trait StepSink: Send + Sync {
    /// Persist a new step.
    async fn create_step(&self, thread_id: &str, step: &Step) -> Result<()>;

    /// Overwrite an existing step's mutable fields. Identity and
    /// `created_at` are preserved by the store; edits never move a step.
    async fn update_step(&self, thread_id: &str, step: &Step) -> Result<()>;
}
