use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use super::Tool;
use crate::fetch::{sanitize_url, Fetcher};
use crate::llm::ToolDefinition;

const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
const OUTER_TIMEOUT: Duration = Duration::from_secs(20);
const TEXT_WIDTH: usize = 80;
const MAX_CONTENT_CHARS: usize = 10_000;

/// Fetches a single page and reduces it to plain text the model can read.
pub struct RetrieveTool {
    fetcher: Arc<Fetcher>,
}

impl RetrieveTool {
    pub fn new(fetcher: Arc<Fetcher>) -> Self {
        Self { fetcher }
    }
}

fn extract_title(html: &str) -> String {
    let lower = html.to_lowercase();
    let Some(open) = lower.find("<title") else {
        return String::new();
    };
    let Some(start) = lower[open..].find('>').map(|i| open + i + 1) else {
        return String::new();
    };
    let Some(end) = lower[start..].find("</title>").map(|i| start + i) else {
        return String::new();
    };
    html[start..end].trim().to_string()
}

fn html_to_text(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .unwrap_or_else(|_| html.to_string());
    if text.chars().count() > MAX_CONTENT_CHARS {
        text.chars().take(MAX_CONTENT_CHARS).collect()
    } else {
        text
    }
}

#[async_trait]
impl Tool for RetrieveTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "retrieve".to_string(),
            description: "Retrieve the content of a web page by URL".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL of the page to retrieve"
                    }
                },
                "required": ["url"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value> {
        let url = args["url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("retrieve requires a \"url\" argument"))?;
        let url = sanitize_url(url);

        let html = self
            .fetcher
            .fetch_rendered(&url, PAGE_TIMEOUT, OUTER_TIMEOUT)
            .await;
        let title = extract_title(&html);
        let content = html_to_text(&html);

        Ok(json!({
            "results": [{
                "title": title,
                "url": url,
                "content": content,
            }],
            "query": "",
            "images": [],
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_is_extracted_case_insensitively() {
        assert_eq!(extract_title("<html><TITLE>Hello</TITLE></html>"), "Hello");
        assert_eq!(
            extract_title("<title lang=\"en\"> Spaced </title>"),
            "Spaced"
        );
    }

    #[test]
    fn missing_title_yields_empty_string() {
        assert_eq!(extract_title("<html><body>no title</body></html>"), "");
        assert_eq!(extract_title("<title>unterminated"), "");
    }

    #[test]
    fn long_content_is_capped() {
        let html = format!("<p>{}</p>", "word ".repeat(10_000));
        let text = html_to_text(&html);
        assert!(text.chars().count() <= MAX_CONTENT_CHARS);
    }

    #[test]
    fn simple_markup_becomes_text() {
        let text = html_to_text("<p>one</p><p>two</p>");
        assert!(text.contains("one"));
        assert!(text.contains("two"));
        assert!(!text.contains("<p>"));
    }
}
