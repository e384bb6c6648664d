use anyhow::Result;
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

#[derive(Debug, Clone, Serialize, Deserialize, Hash)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Raw tool output. Normalized to an assistant entry before replay;
    /// providers never receive this role.
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub stop_reason: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// A chat-completion backend. `chat_stream` publishes text deltas on the
/// given channel in arrival order; a dropped receiver is not an error.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse>;

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
        deltas: UnboundedSender<String>,
    ) -> Result<ChatResponse>;

    fn name(&self) -> &str;
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.chars().any(|c| c.is_whitespace() || c.is_control()) {
        anyhow::bail!("malformed API key");
    }
    Ok(())
}

// ============================================================================
// GOOGLE GEMINI PROVIDER (highest priority in the fallback chain)
// ============================================================================

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        validate_key(&api_key)?;
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            api_key,
            model,
            max_tokens,
        })
    }

    fn build_body(
        &self,
        messages: &[Message],
        tools: &Option<Vec<ToolDefinition>>,
    ) -> serde_json::Value {
        let system_msg = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let contents: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::User => "user",
                        _ => "model",
                    },
                    "parts": [{"text": m.content}]
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "systemInstruction": {"parts": [{"text": system_msg}]},
            "contents": contents,
            "generationConfig": {"maxOutputTokens": self.max_tokens}
        });

        if let Some(tool_defs) = tools {
            let decls: Vec<serde_json::Value> = tool_defs
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.input_schema
                    })
                })
                .collect();
            body["tools"] = serde_json::json!([{"functionDeclarations": decls}]);
        }

        body
    }

    fn collect_parts(
        candidate: &serde_json::Value,
        content: &mut String,
        tool_calls: &mut Vec<ToolCall>,
    ) {
        let parts = candidate
            .pointer("/content/parts")
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            for part in parts {
                if let Some(text) = part["text"].as_str() {
                    content.push_str(text);
                }
                if let Some(call) = part.get("functionCall") {
                    tool_calls.push(ToolCall {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: call["name"].as_str().unwrap_or("").to_string(),
                        arguments: call["args"].clone(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse> {
        let body = self.build_body(&messages, &tools);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let response = self.client.post(&url).json(&body).send().await?;
        let json: serde_json::Value = response.json().await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        let mut stop_reason = None;

        if let Some(candidate) = json["candidates"].get(0) {
            Self::collect_parts(candidate, &mut content, &mut tool_calls);
            stop_reason = candidate["finishReason"].as_str().map(String::from);
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
        deltas: UnboundedSender<String>,
    ) -> Result<ChatResponse> {
        let body = self.build_body(&messages, &tools);
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:streamGenerateContent?alt=sse&key={}",
            self.model, self.api_key
        );

        let response = self.client.post(&url).json(&body).send().await?;

        let mut stream = response.bytes_stream();
        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut stop_reason = None;
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].to_string();
                buffer = buffer[pos + 1..].to_string();

                if let Some(data) = line.strip_prefix("data: ") {
                    if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                        if let Some(candidate) = json["candidates"].get(0) {
                            let before = content.len();
                            Self::collect_parts(candidate, &mut content, &mut tool_calls);
                            if content.len() > before {
                                let _ = deltas.send(content[before..].to_string());
                            }
                            if let Some(reason) = candidate["finishReason"].as_str() {
                                stop_reason = Some(reason.to_string());
                            }
                        }
                    }
                }
            }
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    fn name(&self) -> &str {
        "google"
    }
}

// ============================================================================
// ANTHROPIC PROVIDER (with streaming + tool use)
// ============================================================================

pub struct AnthropicProvider {
    client: reqwest::Client,
    model: String,
    max_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        validate_key(&api_key)?;
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&api_key)?);
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            model,
            max_tokens,
        })
    }

    fn build_body(
        &self,
        messages: &[Message],
        tools: &Option<Vec<ToolDefinition>>,
        stream: bool,
    ) -> serde_json::Value {
        let system_msg = messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let chat_messages: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::User => "user",
                        _ => "assistant",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": system_msg,
            "messages": chat_messages
        });

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        if let Some(tool_defs) = tools {
            let tools_json: Vec<serde_json::Value> = tool_defs
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.input_schema
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tools_json);
        }

        body
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse> {
        let body = self.build_body(&messages, &tools, false);

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .json(&body)
            .send()
            .await?;

        let json: serde_json::Value = response.json().await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        if let Some(blocks) = json["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => {
                        if let Some(text) = block["text"].as_str() {
                            content.push_str(text);
                        }
                    }
                    Some("tool_use") => {
                        tool_calls.push(ToolCall {
                            id: block["id"].as_str().unwrap_or("").to_string(),
                            name: block["name"].as_str().unwrap_or("").to_string(),
                            arguments: block["input"].clone(),
                        });
                    }
                    _ => {}
                }
            }
        }

        let stop_reason = json["stop_reason"].as_str().map(String::from);

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
        deltas: UnboundedSender<String>,
    ) -> Result<ChatResponse> {
        let body = self.build_body(&messages, &tools, true);

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .json(&body)
            .send()
            .await?;

        let mut stream = response.bytes_stream();
        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut current_tool: Option<(String, String, String)> = None; // (id, name, args_json)
        let mut stop_reason = None;
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            // Process complete SSE events
            while let Some(pos) = buffer.find("\n\n") {
                let event = buffer[..pos].to_string();
                buffer = buffer[pos + 2..].to_string();

                for line in event.lines() {
                    if let Some(data) = line.strip_prefix("data: ") {
                        if data == "[DONE]" {
                            continue;
                        }

                        if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                            match json["type"].as_str() {
                                Some("content_block_start") => {
                                    if json["content_block"]["type"].as_str() == Some("tool_use") {
                                        current_tool = Some((
                                            json["content_block"]["id"]
                                                .as_str()
                                                .unwrap_or("")
                                                .to_string(),
                                            json["content_block"]["name"]
                                                .as_str()
                                                .unwrap_or("")
                                                .to_string(),
                                            String::new(),
                                        ));
                                    }
                                }
                                Some("content_block_delta") => {
                                    if let Some(delta) = json["delta"].as_object() {
                                        if delta.get("type").and_then(|t| t.as_str())
                                            == Some("text_delta")
                                        {
                                            if let Some(text) =
                                                delta.get("text").and_then(|t| t.as_str())
                                            {
                                                let _ = deltas.send(text.to_string());
                                                content.push_str(text);
                                            }
                                        } else if delta.get("type").and_then(|t| t.as_str())
                                            == Some("input_json_delta")
                                        {
                                            if let Some((_, _, ref mut args)) = current_tool {
                                                if let Some(partial) = delta
                                                    .get("partial_json")
                                                    .and_then(|p| p.as_str())
                                                {
                                                    args.push_str(partial);
                                                }
                                            }
                                        }
                                    }
                                }
                                Some("content_block_stop") => {
                                    if let Some((id, name, args_str)) = current_tool.take() {
                                        let arguments = serde_json::from_str(&args_str)
                                            .unwrap_or(serde_json::json!({}));
                                        tool_calls.push(ToolCall {
                                            id,
                                            name,
                                            arguments,
                                        });
                                    }
                                }
                                Some("message_delta") => {
                                    if let Some(reason) = json["delta"]["stop_reason"].as_str() {
                                        stop_reason = Some(reason.to_string());
                                    }
                                }
                                _ => {}
                            }
                        }
                    }
                }
            }
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

// ============================================================================
// OPENAI PROVIDER (with streaming + function calling)
// ============================================================================

pub struct OpenAiProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String, base_url: Option<String>) -> Result<Self> {
        validate_key(&api_key)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&format!("Bearer {}", api_key))?,
        );
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            model,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        })
    }

    fn build_body(
        &self,
        messages: &[Message],
        tools: &Option<Vec<ToolDefinition>>,
        stream: bool,
    ) -> serde_json::Value {
        let chat_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                serde_json::json!({
                    "role": match m.role {
                        Role::System => "system",
                        Role::User => "user",
                        _ => "assistant",
                    },
                    "content": m.content
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages
        });

        if stream {
            body["stream"] = serde_json::json!(true);
        }

        if let Some(tool_defs) = tools {
            let tools_json: Vec<serde_json::Value> = tool_defs
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema
                        }
                    })
                })
                .collect();
            body["tools"] = serde_json::json!(tools_json);
        }

        body
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Result<ChatResponse> {
        let body = self.build_body(&messages, &tools, false);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await?;

        let json: serde_json::Value = response.json().await?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string();

        let mut tool_calls = Vec::new();
        if let Some(calls) = json["choices"][0]["message"]["tool_calls"].as_array() {
            for call in calls {
                tool_calls.push(ToolCall {
                    id: call["id"].as_str().unwrap_or("").to_string(),
                    name: call["function"]["name"].as_str().unwrap_or("").to_string(),
                    arguments: serde_json::from_str(
                        call["function"]["arguments"].as_str().unwrap_or("{}"),
                    )
                    .unwrap_or(serde_json::json!({})),
                });
            }
        }

        let stop_reason = json["choices"][0]["finish_reason"]
            .as_str()
            .map(String::from);

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        tools: Option<Vec<ToolDefinition>>,
        deltas: UnboundedSender<String>,
    ) -> Result<ChatResponse> {
        let body = self.build_body(&messages, &tools, true);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body)
            .send()
            .await?;

        let mut stream = response.bytes_stream();
        let mut content = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        let mut tool_call_map: std::collections::HashMap<usize, (String, String, String)> =
            std::collections::HashMap::new();
        let mut stop_reason = None;
        let mut buffer = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(pos) = buffer.find('\n') {
                let line = buffer[..pos].to_string();
                buffer = buffer[pos + 1..].to_string();

                if let Some(data) = line.strip_prefix("data: ") {
                    if data.trim() == "[DONE]" {
                        continue;
                    }

                    if let Ok(json) = serde_json::from_str::<serde_json::Value>(data) {
                        if let Some(delta) = json["choices"][0]["delta"].as_object() {
                            if let Some(text) = delta.get("content").and_then(|c| c.as_str()) {
                                let _ = deltas.send(text.to_string());
                                content.push_str(text);
                            }

                            if let Some(calls) = delta.get("tool_calls").and_then(|t| t.as_array())
                            {
                                for call in calls {
                                    let idx = call["index"].as_u64().unwrap_or(0) as usize;

                                    let entry = tool_call_map.entry(idx).or_insert_with(|| {
                                        (
                                            call["id"].as_str().unwrap_or("").to_string(),
                                            String::new(),
                                            String::new(),
                                        )
                                    });

                                    if let Some(name) = call["function"]["name"].as_str() {
                                        entry.1 = name.to_string();
                                    }
                                    if let Some(args) = call["function"]["arguments"].as_str() {
                                        entry.2.push_str(args);
                                    }
                                }
                            }
                        }

                        if let Some(reason) = json["choices"][0]["finish_reason"].as_str() {
                            if !reason.is_empty() && reason != "null" {
                                stop_reason = Some(reason.to_string());
                            }
                        }
                    }
                }
            }
        }

        let mut indexed: Vec<(usize, (String, String, String))> =
            tool_call_map.into_iter().collect();
        indexed.sort_by_key(|(idx, _)| *idx);
        for (_, (id, name, args_str)) in indexed {
            let arguments = serde_json::from_str(&args_str).unwrap_or(serde_json::json!({}));
            tool_calls.push(ToolCall {
                id,
                name,
                arguments,
            });
        }

        Ok(ChatResponse {
            content,
            tool_calls,
            stop_reason,
        })
    }

    fn name(&self) -> &str {
        "openai"
    }
}
