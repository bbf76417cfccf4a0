//! Chat Completions API wire types.
//!
//! These mirror the completion service's wire format and are not part of
//! the public API.

use super::tools::ToolDescriptor;
use crate::history::{Role, Turn};
use serde::{Deserialize, Serialize};

/// Request body for `POST /chat/completions`.
#[derive(Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolDef<'a>>,
}

/// A tool definition sent in the request.
#[derive(Serialize)]
pub(crate) struct ToolDef<'a> {
    #[serde(rename = "type")]
    pub tool_type: &'static str,
    pub function: &'a ToolDescriptor,
}

impl<'a> ToolDef<'a> {
    pub fn function(descriptor: &'a ToolDescriptor) -> Self {
        Self {
            tool_type: "function",
            function: descriptor,
        }
    }
}

/// A message in the conversation (request or response side).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: Box<str>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<Box<str>>,
}

impl ChatMessage {
    pub fn system(content: String) -> Self {
        Self {
            role: "system".into(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool_result(tool_call_id: Box<str>, content: String) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: Some(tool_call_id),
        }
    }

    pub fn from_turn(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        Self {
            role: role.into(),
            content: Some(turn.content.clone()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// A tool call requested by the completion service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct ToolCall {
    pub id: Box<str>,
    #[serde(rename = "type")]
    pub call_type: Box<str>,
    pub function: FunctionCall,
}

/// Function call details: the tool name and its arguments as a JSON string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub(crate) struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

/// Response from `POST /chat/completions`.
#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

/// A single choice in the response.
#[derive(Debug, Deserialize)]
pub(crate) struct Choice {
    pub message: ChatMessage,
    pub finish_reason: Option<Box<str>>,
}

/// Error response from the completion service.
#[derive(Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: Box<str>,
}
