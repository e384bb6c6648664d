use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::inquire::Inquiry;
use super::related::RelatedQueries;

/// Whether a step opened the conversation or continued after tool output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepKind {
    Initial,
    Continuation,
}

/// One tool invocation and its outcome, paired by call id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub result: Value,
    pub is_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepEvent {
    pub step: usize,
    pub kind: StepKind,
    pub pairs: Vec<ToolCallResult>,
    pub text: String,
}

/// Everything the pipeline publishes while answering a query. Text deltas
/// are append-only: concatenated in order they reproduce the full answer
/// for the step that produced them.
#[derive(Debug, Clone)]
pub enum ResearchEvent {
    TextDelta(String),
    Step(StepEvent),
    Inquiry(Inquiry),
    Related(RelatedQueries),
    Done {
        answer: String,
        tool_results: Vec<ToolCallResult>,
    },
}
