//! Completion service integration: the tool-augmented responder.

pub(crate) mod api;
pub mod tools;

use crate::history::Turn;
use crate::persona::Persona;
use api::{ChatMessage, ChatRequest, ChatResponse, ErrorResponse, ToolDef};
use conf::Conf;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tools::ToolExecutor;
use tracing::{info, warn};

/// Configuration for the completion service integration.
#[derive(Clone, Conf, Debug)]
#[conf(serde)]
pub struct CompletionConfig {
    /// Path to file containing the completion service API key.
    #[conf(long, env)]
    pub api_key_file: PathBuf,
    /// Completion service URL.
    #[conf(
        long,
        env,
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    pub completion_api_url: String,
    /// Model to use.
    #[conf(long, env, default_value = "gpt-4o-mini")]
    pub completion_model: String,
    /// Maximum tool use iterations before giving up.
    #[conf(long, env, default_value = "10")]
    pub max_iterations: u32,
}

/// Error type for completion service operations.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Failed to read API key file.
    #[error("failed to read API key file: {0}")]
    ApiKeyRead(std::io::Error),
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {0}")]
    ApiError(Box<str>),
    /// The response carried no usable answer text.
    #[error("completion service returned an empty response")]
    EmptyResponse,
    /// Too many tool use iterations.
    #[error("exceeded maximum tool use iterations ({0})")]
    TooManyIterations(u32),
}

/// Tool-augmented responder.
///
/// Holds only immutable state (persona, tool set, HTTP client), so a single
/// instance is shared across all requests without locking. Each call to
/// [`respond`](Responder::respond) builds its own conversation sequence and
/// discards it when the answer is returned.
pub struct Responder {
    config: CompletionConfig,
    client: reqwest::Client,
    api_key: String,
    persona: Arc<Persona>,
    tool_executor: Arc<dyn ToolExecutor>,
}

impl Responder {
    /// Create a new responder from configuration.
    ///
    /// Reads the API key from the configured file.
    pub fn new(
        config: CompletionConfig,
        persona: Arc<Persona>,
        tool_executor: Arc<dyn ToolExecutor>,
    ) -> Result<Self, CompletionError> {
        let api_key = std::fs::read_to_string(&config.api_key_file)
            .map_err(CompletionError::ApiKeyRead)?
            .trim()
            .to_owned();

        Ok(Self {
            config,
            client: reqwest::Client::new(),
            api_key,
            persona,
            tool_executor,
        })
    }

    /// Answer a visitor message, given the prior conversation turns.
    ///
    /// Prepends a freshly assembled system turn, appends the user turn, and
    /// iterates with the completion service: whenever the service requests
    /// tool calls, each call is executed in order and its result fed back,
    /// until the service returns a plain answer. Tool failures degrade to an
    /// empty result rather than failing the request.
    pub async fn respond(
        &self,
        user_message: &str,
        history: &[Turn],
    ) -> Result<String, CompletionError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.persona.system_prompt()));
        messages.extend(history.iter().map(ChatMessage::from_turn));
        messages.push(ChatMessage::user(user_message));

        let descriptors = self.tool_executor.descriptors();
        let max_iterations = self.config.max_iterations;

        for iteration in 0..max_iterations {
            let request_body = ChatRequest {
                model: &self.config.completion_model,
                messages: &messages,
                tools: descriptors.iter().map(ToolDef::function).collect(),
            };

            let response = self
                .client
                .post(&self.config.completion_api_url)
                .bearer_auth(&self.api_key)
                .json(&request_body)
                .send()
                .await?;

            if !response.status().is_success() {
                let error: ErrorResponse = response.json().await?;
                return Err(CompletionError::ApiError(error.error.message));
            }

            let mut response: ChatResponse = response.json().await?;
            if response.choices.is_empty() {
                return Err(CompletionError::EmptyResponse);
            }
            let choice = response.choices.swap_remove(0);

            if choice.finish_reason.as_deref() == Some("tool_calls") {
                let tool_calls = choice.message.tool_calls.clone().unwrap_or_default();

                // Record the assistant's "I am calling tools" turn, then feed
                // back one result per requested call, in the order received.
                messages.push(choice.message);

                for call in tool_calls {
                    let name = &call.function.name;
                    let input: Value =
                        serde_json::from_str(&call.function.arguments).unwrap_or_else(|err| {
                            warn!("Malformed arguments for tool '{name}': {err}");
                            Value::Null
                        });

                    info!("Tool call: {name}({input})");
                    let result = match self.tool_executor.execute(name, &input).await {
                        Ok(text) => text,
                        Err(err) => {
                            // Tool failure is a side-channel failure, not a
                            // conversation failure. Substitute an empty result
                            // and keep going.
                            warn!("Tool '{name}' failed: {err}");
                            String::new()
                        }
                    };
                    messages.push(ChatMessage::tool_result(call.id, result));
                }

                info!("Tool use iteration {}, continuing...", iteration + 1);
                continue;
            }

            let text = choice
                .message
                .content
                .filter(|text| !text.is_empty())
                .ok_or(CompletionError::EmptyResponse)?;
            return Ok(text);
        }

        Err(CompletionError::TooManyIterations(max_iterations))
    }
}
