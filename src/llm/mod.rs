mod providers;
mod selector;

pub use providers::{
    AnthropicProvider, ChatResponse, GeminiProvider, Message, OpenAiProvider, Provider, Role,
    ToolCall, ToolDefinition,
};
pub use selector::{log_available, resolve, LlmError, ModelHandle};
