//! History reconstruction pipeline.
//!
//! Flatten the persisted tree, resolve the active branch, project to
//! messages. Reused by the turn loop before every model call and by the
//! edit replayer when it reruns a decision round.

use rl_domain::error::Result;
use rl_domain::message::Message;
use rl_domain::step::Step;

use crate::branch::resolve_branch;
use crate::flatten::flatten_steps;
use crate::project::project_messages;
use crate::store::ThreadStore;

/// Resolve the linear step view of a thread's current branch.
///
/// An absent thread reads as empty history — reachable during normal
/// startup ordering, before the UI layer has persisted anything.
pub async fn resolve_thread_steps(store: &dyn ThreadStore, thread_id: &str) -> Result<Vec<Step>> {
    let snapshot = match store.get_thread(thread_id).await? {
        Some(snapshot) => snapshot,
        None => return Ok(Vec::new()),
    };
    let flat = flatten_steps(&snapshot.steps);
    let branches = snapshot.branches();
    Ok(resolve_branch(flat, snapshot.current_branch_id(), &branches))
}

/// Build the completions message payload for a thread's current branch.
pub async fn build_history(
    store: &dyn ThreadStore,
    thread_id: &str,
    compressed: bool,
) -> Result<Vec<Message>> {
    let steps = resolve_thread_steps(store, thread_id).await?;
    Ok(project_messages(&steps, compressed))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
