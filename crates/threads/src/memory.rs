//! In-memory thread store.
//!
//! Backs tests and embedders that keep the step tree in process. Steps
//! live in per-thread arenas in creation order; updates replace a step's
//! mutable fields without touching identity or `created_at`.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use rl_domain::error::{Error, Result};
use rl_domain::step::{Step, ThreadSnapshot};

use crate::store::{StepSink, ThreadStore};

pub struct MemoryThreadStore {
    threads: RwLock<HashMap<String, ThreadSnapshot>>,
}

impl Default for MemoryThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryThreadStore {
    pub fn new() -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
        }
    }

    /// Insert (or replace) a whole thread snapshot.
    pub fn insert_thread(&self, snapshot: ThreadSnapshot) {
        self.threads.write().insert(snapshot.id.clone(), snapshot);
    }

    /// Create an empty thread and return its id.
    pub fn create_thread(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.insert_thread(ThreadSnapshot::new(id.clone()));
        id
    }

    /// Clone the current snapshot of a thread.
    pub fn snapshot(&self, thread_id: &str) -> Option<ThreadSnapshot> {
        self.threads.read().get(thread_id).cloned()
    }
}

#[async_trait]
impl ThreadStore for MemoryThreadStore {
    async fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadSnapshot>> {
        Ok(self.threads.read().get(thread_id).cloned())
    }

    async fn get_step(&self, thread_id: &str, step_id: &str) -> Result<Option<Step>> {
        Ok(self
            .threads
            .read()
            .get(thread_id)
            .and_then(|t| t.steps.iter().find(|s| s.id == step_id).cloned()))
    }

    async fn get_children(&self, thread_id: &str, parent_id: &str) -> Result<Vec<Step>> {
        Ok(self
            .threads
            .read()
            .get(thread_id)
            .map(|t| {
                t.steps
                    .iter()
                    .filter(|s| s.parent_id.as_deref() == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl StepSink for MemoryThreadStore {
    async fn create_step(&self, thread_id: &str, step: &Step) -> Result<()> {
        let mut threads = self.threads.write();
        let thread = threads
            .entry(thread_id.to_owned())
            .or_insert_with(|| ThreadSnapshot::new(thread_id));
        thread.steps.push(step.clone());
        Ok(())
    }

    async fn update_step(&self, thread_id: &str, step: &Step) -> Result<()> {
        let mut threads = self.threads.write();
        let existing = threads
            .get_mut(thread_id)
            .and_then(|t| t.steps.iter_mut().find(|s| s.id == step.id))
            .ok_or_else(|| Error::StepNotFound {
                thread_id: thread_id.to_owned(),
                step_id: step.id.clone(),
            })?;

        // Identity and commit time are immutable under edits.
        let created_at = existing.created_at;
        *existing = step.clone();
        existing.created_at = created_at;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use rl_domain::step::StepType;

    #[tokio::test]
    async fn create_then_get_roundtrip() {
        let store = MemoryThreadStore::new();
        let thread_id = store.create_thread();

        let step = Step::new("hello", StepType::UserMessage);
        store.create_step(&thread_id, &step).await.unwrap();

        let fetched = store.get_step(&thread_id, &step.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, step.id);
        assert_eq!(fetched.name, "hello");
    }

    #[tokio::test]
    async fn missing_thread_reads_as_absent() {
        let store = MemoryThreadStore::new();
        assert!(store.get_thread("ghost").await.unwrap().is_none());
        assert!(store.get_step("ghost", "s1").await.unwrap().is_none());
        assert!(store.get_children("ghost", "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let store = MemoryThreadStore::new();
        let thread_id = store.create_thread();

        let step = Step::new("tool", StepType::Tool);
        let original_time = step.created_at;
        store.create_step(&thread_id, &step).await.unwrap();

        let mut edited = step.clone();
        edited.output = "result".into();
        edited.created_at = None; // a careless caller must not move the step
        store.update_step(&thread_id, &edited).await.unwrap();

        let fetched = store.get_step(&thread_id, &step.id).await.unwrap().unwrap();
        assert_eq!(fetched.output, "result");
        assert_eq!(fetched.created_at, original_time);
    }

    #[tokio::test]
    async fn update_missing_step_is_an_error() {
        let store = MemoryThreadStore::new();
        let thread_id = store.create_thread();
        let step = Step::new("tool", StepType::Tool);

        let err = store.update_step(&thread_id, &step).await.unwrap_err();
        assert!(matches!(err, Error::StepNotFound { .. }));
    }

    #[tokio::test]
    async fn children_returned_in_creation_order() {
        let store = MemoryThreadStore::new();
        let thread_id = store.create_thread();

        let parent = Step::new("parent", StepType::AssistantMessage);
        store.create_step(&thread_id, &parent).await.unwrap();
        for name in ["first", "second", "third"] {
            let mut child = Step::new(name, StepType::Tool);
            child.parent_id = Some(parent.id.clone());
            store.create_step(&thread_id, &child).await.unwrap();
        }

        let children = store.get_children(&thread_id, &parent.id).await.unwrap();
        let names: Vec<_> = children.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}
