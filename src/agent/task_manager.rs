use serde::Deserialize;

use super::parse_json_reply;
use super::prompts::TASK_MANAGER_PROMPT;
use crate::llm::{Message, ModelHandle};

/// Triage decision for an incoming query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    Proceed,
    Inquire,
}

#[derive(Deserialize)]
struct Decision {
    next: String,
}

/// Decide whether the query is researchable as-is or needs clarification
/// first. Any failure along the way defaults to proceeding: a wasted search
/// beats a stalled session.
pub async fn decide(handle: &ModelHandle, history: &[Message]) -> NextAction {
    let mut messages = vec![Message::system(TASK_MANAGER_PROMPT)];
    messages.extend(history.iter().cloned());

    let response = match handle.chat(messages, None).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("task triage failed, proceeding: {e}");
            return NextAction::Proceed;
        }
    };

    match parse_json_reply::<Decision>(&response.content) {
        Ok(decision) if decision.next == "inquire" => NextAction::Inquire,
        Ok(_) => NextAction::Proceed,
        Err(e) => {
            tracing::warn!("unparseable triage reply, proceeding: {e}");
            NextAction::Proceed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_parses_both_branches() {
        let proceed: Decision = parse_json_reply(r#"{"next": "proceed"}"#).unwrap();
        assert_eq!(proceed.next, "proceed");
        let inquire: Decision = parse_json_reply(r#"{"next": "inquire"}"#).unwrap();
        assert_eq!(inquire.next, "inquire");
    }
}
