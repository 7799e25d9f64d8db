//! Messages API request construction.
//!
//! Pure conversion from configuration and conversation history; no I/O.

use chrono::NaiveDate;
use serde::Serialize;

use crate::config::RelayConfig;
use crate::conversation::{Role, Turn};

pub const WEB_SEARCH_TOOL_TYPE: &str = "web_search_20250305";

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub system: String,
    pub messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingDirective>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDirective>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for RequestMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThinkingDirective {
    Enabled { budget_tokens: u32 },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ToolDirective {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub name: String,
    pub max_uses: u32,
}

impl ToolDirective {
    pub fn web_search(max_uses: u32) -> Self {
        Self {
            tool_type: WEB_SEARCH_TOOL_TYPE.to_string(),
            name: "web_search".to_string(),
            max_uses,
        }
    }
}

/// Fill the `{date}` placeholder of a system prompt template.
pub fn render_system_prompt(template: &str, today: NaiveDate) -> String {
    template.replace("{date}", &today.format("%A, %B %-d, %Y").to_string())
}

/// Build the upstream payload for the given history, oldest turn first.
pub fn build_request(config: &RelayConfig, turns: &[Turn], today: NaiveDate) -> MessagesRequest {
    let thinking = config
        .reasoning_enabled
        .then(|| ThinkingDirective::Enabled {
            budget_tokens: config.reasoning_budget_tokens,
        });

    let tools = config
        .web_search_enabled
        .then(|| vec![ToolDirective::web_search(config.web_search_max_uses)]);

    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system: render_system_prompt(&config.system_prompt, today),
        messages: turns.iter().map(RequestMessage::from).collect(),
        thinking,
        tools,
    }
}
