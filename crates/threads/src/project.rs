//! Message projection.
//!
//! Maps the branch-resolved step sequence into the role/content list a
//! completions API consumes. Never reorders: message order equals step
//! order.

use rl_domain::message::Message;
use rl_domain::step::{Step, StepType};

/// Assistant output produced when the user clicks the UI "continue"
/// acknowledgment. Carries nothing for the model; always dropped.
pub const CONTINUE_ACK: &str = "**Selected:** Continue";

const REASONING_OPEN: &str = "<reasoning>";
const REASONING_CLOSE: &str = "</reasoning>";

/// Wrap a reasoning block (or its summary) in the fixed delimiter the
/// model is prompted to recognize.
pub fn wrap_reasoning(text: &str) -> String {
    format!("{REASONING_OPEN}\n{text}\n{REASONING_CLOSE}")
}

/// Project a branch-resolved step sequence into completions messages.
///
/// `compressed` omits tool transcripts and collapses every reasoning step
/// except the most recent one to its short input summary — full tool
/// output and stale reasoning are noise in a tight context. The latest
/// reasoning step always expands in full: it is what the next decision
/// builds on.
pub fn project_messages(steps: &[Step], compressed: bool) -> Vec<Message> {
    let last_cot = steps.iter().rposition(|s| s.step_type == StepType::Cot);

    let mut messages = Vec::new();
    for (pos, step) in steps.iter().enumerate() {
        match step.step_type {
            StepType::SystemMessage => messages.push(Message::system(&step.output)),
            StepType::UserMessage => messages.push(Message::user(&step.output)),
            StepType::AssistantMessage => {
                if step.output == CONTINUE_ACK {
                    continue;
                }
                messages.push(Message::assistant(&step.output));
            }
            StepType::Tool => {
                if compressed {
                    continue;
                }
                messages.push(Message::assistant(&step.input));
                messages.push(Message::tool(&step.output));
            }
            StepType::Cot => {
                let expand = Some(pos) == last_cot || !compressed;
                let body = if expand { &step.output } else { &step.input };
                messages.push(Message::assistant(wrap_reasoning(body)));
            }
            StepType::Run => {}
        }
    }
    messages
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use rl_domain::message::Role;

    fn step(step_type: StepType, input: &str, output: &str) -> Step {
        let mut s = Step::new("step", step_type);
        s.input = input.into();
        s.output = output.into();
        s
    }

    #[test]
    fn message_steps_map_by_role() {
        let steps = vec![
            step(StepType::SystemMessage, "", "be helpful"),
            step(StepType::UserMessage, "", "hi"),
            step(StepType::AssistantMessage, "", "hello"),
        ];
        let messages = project_messages(&steps, false);
        assert_eq!(
            messages,
            vec![
                Message::system("be helpful"),
                Message::user("hi"),
                Message::assistant("hello"),
            ]
        );
    }

    #[test]
    fn tool_step_expands_to_assistant_then_tool() {
        let steps = vec![step(
            StepType::Tool,
            r#"{"name":"x","arguments":{"a":1}}"#,
            "42",
        )];
        let messages = project_messages(&steps, false);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::Assistant);
        assert_eq!(messages[0].content, r#"{"name":"x","arguments":{"a":1}}"#);
        assert_eq!(messages[1].role, Role::Tool);
        assert_eq!(messages[1].content, "42");
    }

    #[test]
    fn tool_step_omitted_when_compressed() {
        let steps = vec![step(
            StepType::Tool,
            r#"{"name":"x","arguments":{"a":1}}"#,
            "42",
        )];
        assert!(project_messages(&steps, true).is_empty());
    }

    #[test]
    fn continue_ack_is_dropped() {
        let steps = vec![
            step(StepType::AssistantMessage, "", CONTINUE_ACK),
            step(StepType::AssistantMessage, "", "real answer"),
        ];
        let messages = project_messages(&steps, false);
        assert_eq!(messages, vec![Message::assistant("real answer")]);
    }

    #[test]
    fn latest_cot_expands_even_when_compressed() {
        let steps = vec![
            step(StepType::Cot, "old summary", "old full reasoning"),
            step(StepType::Cot, "new summary", "new full reasoning"),
        ];
        let messages = project_messages(&steps, true);
        assert_eq!(
            messages,
            vec![
                Message::assistant(wrap_reasoning("old summary")),
                Message::assistant(wrap_reasoning("new full reasoning")),
            ]
        );
    }

    #[test]
    fn all_cots_expand_when_uncompressed() {
        let steps = vec![
            step(StepType::Cot, "old summary", "old full reasoning"),
            step(StepType::Cot, "new summary", "new full reasoning"),
        ];
        let messages = project_messages(&steps, false);
        assert_eq!(
            messages,
            vec![
                Message::assistant(wrap_reasoning("old full reasoning")),
                Message::assistant(wrap_reasoning("new full reasoning")),
            ]
        );
    }

    #[test]
    fn run_steps_project_nothing() {
        let steps = vec![
            step(StepType::Run, "", ""),
            step(StepType::UserMessage, "", "hi"),
        ];
        assert_eq!(project_messages(&steps, false), vec![Message::user("hi")]);
    }

    #[test]
    fn projection_preserves_step_order() {
        let steps = vec![
            step(StepType::UserMessage, "", "question"),
            step(StepType::Cot, "summary", "reasoning"),
            step(StepType::Tool, r#"{"name":"t","arguments":{}}"#, "out"),
            step(StepType::AssistantMessage, "", "answer"),
        ];
        let messages = project_messages(&steps, false);
        assert_eq!(messages.len(), 5);
        assert_eq!(messages[0], Message::user("question"));
        assert_eq!(messages[1], Message::assistant(wrap_reasoning("reasoning")));
        assert_eq!(messages[2], Message::assistant(r#"{"name":"t","arguments":{}}"#));
        assert_eq!(messages[3], Message::tool("out"));
        assert_eq!(messages[4], Message::assistant("answer"));
    }
}
