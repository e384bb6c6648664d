use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::parse_json_reply;
use super::prompts::INQUIRE_PROMPT;
use crate::llm::{Message, ModelHandle};

/// A clarifying question posed back to the user before research begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inquiry {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub allows_input: bool,
    #[serde(default)]
    pub input_label: Option<String>,
    #[serde(default)]
    pub input_placeholder: Option<String>,
}

/// Ask the model what it needs to know before it can research the query.
pub async fn run(handle: &ModelHandle, history: &[Message]) -> Result<Inquiry> {
    let mut messages = vec![Message::system(INQUIRE_PROMPT)];
    messages.extend(history.iter().cloned());

    let response = handle.chat(messages, None).await?;
    let inquiry: Inquiry = parse_json_reply(&response.content)?;
    Ok(inquiry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inquiry_parses_with_defaults() {
        let inquiry: Inquiry =
            parse_json_reply(r#"{"question": "Which city?"}"#).unwrap();
        assert_eq!(inquiry.question, "Which city?");
        assert!(inquiry.options.is_empty());
        assert!(!inquiry.allows_input);
    }

    #[test]
    fn inquiry_parses_full_shape() {
        let raw = r#"{"question": "Which?", "options": ["a", "b"], "allows_input": true, "input_label": "Other"}"#;
        let inquiry: Inquiry = parse_json_reply(raw).unwrap();
        assert_eq!(inquiry.options, vec!["a", "b"]);
        assert!(inquiry.allows_input);
        assert_eq!(inquiry.input_label.as_deref(), Some("Other"));
    }
}
