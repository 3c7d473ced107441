//! Step-tree flattening.
//!
//! Turns a thread's nested execution tree into the flat, time-ascending
//! sequence the rest of the history pipeline operates on.

use std::collections::{HashMap, HashSet};

use rl_domain::step::Step;

/// Synthetic wrapper steps written by the UI layer around turn
/// boundaries. They carry no content of their own; their children are
/// promoted into the flat sequence in their place.
pub const WRAPPER_NAMES: &[&str] = &["conversation_start", "user_turn", "voice_capture"];

/// Whether a step is a content-free turn-boundary wrapper.
pub fn is_wrapper(step: &Step) -> bool {
    WRAPPER_NAMES.contains(&step.name.as_str())
}

/// Flatten an arena of steps into a single time-ordered sequence.
///
/// Pre-order descent over the parent/child edges: wrapper steps are
/// skipped but recursed into, uncommitted steps (no `created_at`) are
/// dropped together with their subtrees. The final stable sort by
/// `created_at` reconciles traversal order with temporal order — tool
/// and reasoning children can be committed out of traversal order, and
/// ties keep their traversal position.
pub fn flatten_steps(steps: &[Step]) -> Vec<Step> {
    let ids: HashSet<&str> = steps.iter().map(|s| s.id.as_str()).collect();

    // Child index over the upward edges. A parent id that resolves to no
    // record counts as a root, so a dangling edge cannot hide committed
    // steps.
    let mut children: HashMap<&str, Vec<&Step>> = HashMap::new();
    let mut roots: Vec<&Step> = Vec::new();
    for step in steps {
        match step.parent_id.as_deref().filter(|p| ids.contains(p)) {
            Some(parent) => children.entry(parent).or_default().push(step),
            None => roots.push(step),
        }
    }

    let mut flat: Vec<Step> = Vec::new();
    for root in roots {
        visit(root, &children, &mut flat);
    }

    flat.sort_by_key(|s| s.created_at);
    flat
}

fn visit(step: &Step, children: &HashMap<&str, Vec<&Step>>, out: &mut Vec<Step>) {
    if step.created_at.is_none() {
        return;
    }
    if !is_wrapper(step) {
        out.push(step.clone());
    }
    if let Some(kids) = children.get(step.id.as_str()) {
        for kid in kids {
            visit(kid, children, out);
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rl_domain::step::StepType;

    fn step(id: &str, name: &str, parent: Option<&str>, at: i64) -> Step {
        let mut s = Step::new(name, StepType::UserMessage);
        s.id = id.into();
        s.parent_id = parent.map(String::from);
        s.created_at = Some(Utc.timestamp_opt(at, 0).unwrap());
        s
    }

    fn ids(steps: &[Step]) -> Vec<&str> {
        steps.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn flat_output_is_time_sorted() {
        let arena = vec![
            step("a", "hello", None, 30),
            step("b", "world", None, 10),
            step("c", "again", None, 20),
        ];
        assert_eq!(ids(&flatten_steps(&arena)), vec!["b", "c", "a"]);
    }

    #[test]
    fn wrapper_children_are_promoted() {
        let arena = vec![
            step("w", "user_turn", None, 5),
            step("a", "hello", Some("w"), 10),
            step("b", "reply", Some("w"), 20),
        ];
        let flat = flatten_steps(&arena);
        assert_eq!(ids(&flat), vec!["a", "b"]);
    }

    #[test]
    fn nested_wrappers_are_all_stripped() {
        let arena = vec![
            step("outer", "conversation_start", None, 1),
            step("inner", "user_turn", Some("outer"), 2),
            step("a", "hello", Some("inner"), 3),
        ];
        assert_eq!(ids(&flatten_steps(&arena)), vec!["a"]);
    }

    #[test]
    fn uncommitted_steps_and_subtrees_dropped() {
        let mut pending = step("p", "pending", None, 0);
        pending.created_at = None;
        let arena = vec![
            step("a", "hello", None, 10),
            pending,
            step("child", "orphaned-by-pending", Some("p"), 20),
        ];
        assert_eq!(ids(&flatten_steps(&arena)), vec!["a"]);
    }

    #[test]
    fn dangling_parent_treated_as_root() {
        let arena = vec![
            step("a", "hello", Some("missing"), 10),
            step("b", "world", None, 20),
        ];
        assert_eq!(ids(&flatten_steps(&arena)), vec!["a", "b"]);
    }

    #[test]
    fn output_is_permutation_of_non_wrapper_nodes() {
        let arena = vec![
            step("w", "user_turn", None, 1),
            step("a", "hello", Some("w"), 40),
            step("b", "tool", Some("a"), 20),
            step("c", "reply", None, 30),
        ];
        let flat = flatten_steps(&arena);
        let mut got = ids(&flat);
        got.sort();
        assert_eq!(got, vec!["a", "b", "c"]);
        // And sorted ascending by timestamp.
        let times: Vec<_> = flat.iter().map(|s| s.created_at.unwrap()).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
    }

    #[test]
    fn timestamp_ties_keep_traversal_order() {
        let arena = vec![
            step("a", "hello", None, 10),
            step("a1", "first-child", Some("a"), 20),
            step("a2", "second-child", Some("a"), 20),
        ];
        assert_eq!(ids(&flatten_steps(&arena)), vec!["a", "a1", "a2"]);
    }
}
