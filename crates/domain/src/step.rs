use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The branch every thread and step belongs to unless tagged otherwise.
pub const MAIN_BRANCH: &str = "main";

const BRANCH_ID_KEY: &str = "branch_id";
const BRANCH_STATUS_KEY: &str = "branch_status";
const INACTIVE_STATUS: &str = "inactive";
const CURRENT_BRANCH_KEY: &str = "current_branch_id";
const BRANCHES_KEY: &str = "branches";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Step
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The kind of a recorded conversation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    SystemMessage,
    UserMessage,
    AssistantMessage,
    /// A tool invocation: `input` holds the call JSON, `output` the result.
    Tool,
    /// A reasoning block: `output` holds the full reasoning, `input` a
    /// short summary of it.
    Cot,
    /// Synthetic wrapper written by the UI layer around turn boundaries.
    Run,
}

/// One node in a thread's execution tree.
///
/// Edits mutate `input`/`output` in place; `id`, `parent_id`, and
/// `created_at` are fixed at creation. A step without a `created_at` has
/// not been committed and is invisible to history reconstruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Step {
    /// Create a committed step with a fresh id and the current timestamp.
    pub fn new(name: impl Into<String>, step_type: StepType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            step_type,
            parent_id: None,
            input: String::new(),
            output: String::new(),
            created_at: Some(Utc::now()),
            metadata: Map::new(),
        }
    }

    /// The branch this step belongs to (default [`MAIN_BRANCH`]).
    pub fn branch_id(&self) -> &str {
        self.metadata
            .get(BRANCH_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or(MAIN_BRANCH)
    }

    /// Tag the step with a branch id.
    pub fn set_branch_id(&mut self, branch_id: &str) {
        self.metadata
            .insert(BRANCH_ID_KEY.into(), Value::String(branch_id.into()));
    }

    /// Whether the step is permanently excluded from all projections.
    pub fn is_inactive(&self) -> bool {
        self.metadata.get(BRANCH_STATUS_KEY).and_then(Value::as_str) == Some(INACTIVE_STATUS)
    }

    /// Permanently exclude the step from all projections.
    pub fn set_inactive(&mut self) {
        self.metadata
            .insert(BRANCH_STATUS_KEY.into(), Value::String(INACTIVE_STATUS.into()));
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Thread
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A full thread as returned by the persistence layer: a flat arena of
/// steps with parent-id edges, plus thread metadata.
///
/// The arena holds steps in creation order; tree structure is carried
/// entirely by the upward `parent_id` edges, never by embedded children.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadSnapshot {
    pub id: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ThreadSnapshot {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            steps: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// The branch currently checked out on this thread.
    pub fn current_branch_id(&self) -> &str {
        self.metadata
            .get(CURRENT_BRANCH_KEY)
            .and_then(Value::as_str)
            .unwrap_or(MAIN_BRANCH)
    }

    /// The thread's branch descriptors. Malformed entries are skipped.
    pub fn branches(&self) -> Vec<BranchDescriptor> {
        let Some(entries) = self.metadata.get(BRANCHES_KEY).and_then(Value::as_array) else {
            return Vec::new();
        };
        entries
            .iter()
            .filter_map(|entry| match serde_json::from_value(entry.clone()) {
                Ok(descriptor) => Some(descriptor),
                Err(e) => {
                    tracing::debug!(thread_id = %self.id, error = %e, "skipping malformed branch descriptor");
                    None
                }
            })
            .collect()
    }
}

/// Where a branch diverged from its ancestor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchDescriptor {
    pub branch_id: String,
    /// Id of the last step shared with the ancestor branch.
    pub fork_point: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
