use std::sync::Arc;
use tokio::sync::mpsc;

use super::events::{ResearchEvent, StepEvent, StepKind, ToolCallResult};
use super::prompts::researcher_prompt;
use super::transform_tool_messages;
use crate::llm::{Message, ModelHandle};
use crate::tools::ToolRegistry;

/// Upper bound on model turns for a single query. A model that keeps
/// requesting tools is cut off here and the last text wins.
pub const MAX_STEPS: usize = 5;

/// Shown verbatim when a turn fails; the session stays alive.
pub const FALLBACK_MESSAGE: &str = "An error has occurred. Please try again.";

#[derive(Debug, Clone)]
pub struct ResearchOutcome {
    pub answer: String,
    pub tool_results: Vec<ToolCallResult>,
    pub steps: usize,
}

/// Drives the research loop: stream a model turn, execute any tools it
/// requested, feed the results back, repeat until the model answers in
/// plain text or the step cap is hit.
pub struct Orchestrator {
    handle: ModelHandle,
    tools: Arc<ToolRegistry>,
}

impl Orchestrator {
    pub fn new(handle: ModelHandle, tools: Arc<ToolRegistry>) -> Self {
        Self { handle, tools }
    }

    pub async fn research(
        &self,
        history: Vec<Message>,
        events: &mpsc::UnboundedSender<ResearchEvent>,
    ) -> ResearchOutcome {
        let mut messages = vec![Message::system(researcher_prompt())];
        messages.extend(history);

        let definitions = self.tools.definitions();
        let tool_defs = if definitions.is_empty() {
            None
        } else {
            Some(definitions)
        };

        let mut answer = String::new();
        let mut tool_results: Vec<ToolCallResult> = Vec::new();
        let mut steps = 0;

        for step in 1..=MAX_STEPS {
            steps = step;

            let (delta_tx, mut delta_rx) = mpsc::unbounded_channel::<String>();
            let forwarder = {
                let events = events.clone();
                tokio::spawn(async move {
                    while let Some(delta) = delta_rx.recv().await {
                        let _ = events.send(ResearchEvent::TextDelta(delta));
                    }
                })
            };

            let outbound = transform_tool_messages(&messages);
            let response = self
                .handle
                .chat_stream(outbound, tool_defs.clone(), delta_tx)
                .await;
            let _ = forwarder.await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    tracing::error!("model turn {step} failed: {e}");
                    let _ = events.send(ResearchEvent::TextDelta(FALLBACK_MESSAGE.to_string()));
                    return ResearchOutcome {
                        answer: FALLBACK_MESSAGE.to_string(),
                        tool_results: Vec::new(),
                        steps,
                    };
                }
            };

            if !response.content.is_empty() {
                // Append-only; earlier turns' text stays in the answer.
                answer.push_str(&response.content);
                messages.push(Message::assistant(&response.content));
            }

            let finished = response.tool_calls.is_empty();
            let mut pairs = Vec::with_capacity(response.tool_calls.len());
            for call in response.tool_calls {
                tracing::debug!(tool = %call.name, "dispatching tool call");
                let (result, is_error) =
                    match self.tools.execute(&call.name, &call.arguments).await {
                        Ok(value) => (value, false),
                        Err(e) => {
                            tracing::warn!("tool {} failed: {e}", call.name);
                            (serde_json::json!({"error": e.to_string()}), true)
                        }
                    };

                let pair = ToolCallResult {
                    id: call.id,
                    name: call.name,
                    result,
                    is_error,
                };
                messages.push(Message::tool(
                    serde_json::to_string(&pair).unwrap_or_default(),
                ));
                pairs.push(pair);
            }

            // One event per turn, tool-bearing or not.
            let _ = events.send(ResearchEvent::Step(StepEvent {
                step,
                kind: if step == 1 {
                    StepKind::Initial
                } else {
                    StepKind::Continuation
                },
                pairs: pairs.clone(),
                text: response.content,
            }));
            tool_results.extend(pairs);

            if finished {
                break;
            }
        }

        ResearchOutcome {
            answer,
            tool_results,
            steps,
        }
    }
}
