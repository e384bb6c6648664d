mod events;
pub mod inquire;
mod orchestrator;
mod prompts;
pub mod related;
pub mod task_manager;

pub use events::{ResearchEvent, StepEvent, StepKind, ToolCallResult};
pub use inquire::Inquiry;
pub use orchestrator::{Orchestrator, ResearchOutcome, FALLBACK_MESSAGE, MAX_STEPS};
pub use related::RelatedQueries;

use anyhow::Result;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::llm::{Message, ModelHandle, Role};
use crate::tools::ToolRegistry;

/// Replay-safe view of a conversation: raw tool output is folded into
/// assistant entries so any provider can accept the history.
pub fn transform_tool_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .map(|m| match m.role {
            Role::Tool => Message::assistant(format!("Tool result: {}", m.content)),
            _ => m.clone(),
        })
        .collect()
}

/// Parse a JSON object out of a model reply, tolerating markdown fences
/// and prose around the object.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let trimmed = reply.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|s| s.strip_suffix("```"))
        .map(str::trim)
        .unwrap_or(trimmed);

    if let Ok(value) = serde_json::from_str(inner) {
        return Ok(value);
    }

    // Fall back to the outermost braces in case the model added prose.
    let start = inner
        .find('{')
        .ok_or_else(|| anyhow::anyhow!("no JSON object in reply"))?;
    let end = inner
        .rfind('}')
        .ok_or_else(|| anyhow::anyhow!("no JSON object in reply"))?;
    Ok(serde_json::from_str(&inner[start..=end])?)
}

/// Final shape of one pipeline run: either the model wants clarification
/// before researching, or it produced an answer.
pub enum PipelineOutcome {
    Clarify(Inquiry),
    Answer(ResearchOutcome),
}

/// Full query pipeline: triage, optional clarifying question, the research
/// loop, then follow-up suggestions. Publishes progress on `events`.
pub async fn run_pipeline(
    handle: ModelHandle,
    tools: Arc<ToolRegistry>,
    events: &mpsc::UnboundedSender<ResearchEvent>,
    history: Vec<Message>,
    skip_inquire: bool,
) -> Result<PipelineOutcome> {
    if !skip_inquire && task_manager::decide(&handle, &history).await == task_manager::NextAction::Inquire
    {
        match inquire::run(&handle, &history).await {
            Ok(inquiry) => {
                let _ = events.send(ResearchEvent::Inquiry(inquiry.clone()));
                return Ok(PipelineOutcome::Clarify(inquiry));
            }
            Err(e) => {
                tracing::warn!("clarification failed, researching directly: {e}");
            }
        }
    }

    let orchestrator = Orchestrator::new(handle.clone(), tools);
    let outcome = orchestrator.research(history.clone(), events).await;

    let mut full_history = history;
    full_history.push(Message::assistant(&outcome.answer));
    match related::suggest(&handle, &full_history).await {
        Ok(related) => {
            let _ = events.send(ResearchEvent::Related(related));
        }
        Err(e) => {
            tracing::debug!("no related queries: {e}");
        }
    }

    let _ = events.send(ResearchEvent::Done {
        answer: outcome.answer.clone(),
        tool_results: outcome.tool_results.clone(),
    });
    Ok(PipelineOutcome::Answer(outcome))
}
