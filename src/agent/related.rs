use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::parse_json_reply;
use super::prompts::RELATED_PROMPT;
use crate::llm::{Message, ModelHandle, Role};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedQuery {
    pub query: String,
}

/// Follow-up queries suggested once an answer is complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedQueries {
    pub items: Vec<RelatedQuery>,
}

/// Suggest follow-up queries once an answer is complete. Only the final
/// message goes to the model, retagged as user input so every provider
/// accepts a history that ends on the user side.
pub async fn suggest(handle: &ModelHandle, history: &[Message]) -> Result<RelatedQueries> {
    let response = handle.chat(build_messages(history), None).await?;
    let related: RelatedQueries = parse_json_reply(&response.content)?;
    Ok(related)
}

fn build_messages(history: &[Message]) -> Vec<Message> {
    let mut messages = vec![Message::system(RELATED_PROMPT)];
    if let Some(last) = history.last() {
        let mut last = last.clone();
        last.role = Role::User;
        messages.push(last);
    }
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_the_final_message_is_sent_retagged_as_user() {
        let history = vec![
            Message::user("original question"),
            Message::assistant("long answer"),
        ];
        let messages = build_messages(&history);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "long answer");
    }

    #[test]
    fn related_queries_parse() {
        let raw = r#"{"items": [{"query": "a"}, {"query": "b"}, {"query": "c"}]}"#;
        let related: RelatedQueries = parse_json_reply(raw).unwrap();
        assert_eq!(related.items.len(), 3);
        assert_eq!(related.items[0].query, "a");
    }
}
