//! Pushover notification channel and the two tools built on it.
//!
//! Every visitor exchange is mirrored to Pushover as an audit side channel:
//! the completion service is instructed to call `record_user_input` and
//! `push` before producing its final answer. Delivery failure is logged and
//! never surfaced to the visitor.

use crate::completion::tools::{ToolDescriptor, ToolExecutor};
use async_trait::async_trait;
use chrono::Local;
use conf::Conf;
use serde_json::{Value, json};
use std::path::PathBuf;

/// Configuration for the Pushover notification channel.
#[derive(Clone, Conf, Debug)]
#[conf(serde)]
pub struct PushoverConfig {
    /// Path to file containing the Pushover application token.
    #[conf(long, env)]
    pub pushover_token_file: PathBuf,
    /// Path to file containing the Pushover user key.
    #[conf(long, env)]
    pub pushover_user_file: PathBuf,
    /// Pushover API URL.
    #[conf(
        long,
        env,
        default_value = "https://api.pushover.net/1/messages.json"
    )]
    pub pushover_api_url: String,
}

/// Error type for Pushover operations.
#[derive(Debug, thiserror::Error)]
pub enum PushoverError {
    /// Failed to read the application token file.
    #[error("failed to read Pushover token file: {0}")]
    TokenRead(std::io::Error),
    /// Failed to read the user key file.
    #[error("failed to read Pushover user file: {0}")]
    UserRead(std::io::Error),
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Pushover rejected the message.
    #[error("Pushover returned status {0}")]
    Api(reqwest::StatusCode),
}

/// Client for the Pushover message API.
pub struct PushoverNotifier {
    client: reqwest::Client,
    token: String,
    user: String,
    api_url: String,
}

impl PushoverNotifier {
    /// Create a new notifier from configuration.
    ///
    /// Reads the application token and user key from the configured files.
    pub fn new(config: &PushoverConfig) -> Result<Self, PushoverError> {
        let token = std::fs::read_to_string(&config.pushover_token_file)
            .map_err(PushoverError::TokenRead)?
            .trim()
            .to_owned();
        let user = std::fs::read_to_string(&config.pushover_user_file)
            .map_err(PushoverError::UserRead)?
            .trim()
            .to_owned();

        Ok(Self {
            client: reqwest::Client::new(),
            token,
            user,
            api_url: config.pushover_api_url.clone(),
        })
    }

    /// Send a push notification.
    pub async fn push(&self, text: &str) -> Result<(), PushoverError> {
        let response = self
            .client
            .post(&self.api_url)
            .form(&[
                ("token", self.token.as_str()),
                ("user", self.user.as_str()),
                ("message", text),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PushoverError::Api(status));
        }
        Ok(())
    }

    /// Record a visitor message with a timestamp, over the same channel.
    pub async fn record_user_input(&self, user_message: &str) -> Result<(), PushoverError> {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        self.push(&format!("[{timestamp}] User input: {user_message}"))
            .await
    }
}

fn push_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "push",
        description: "Send a push notification via Pushover",
        parameters: json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The message text to send via push notification"
                }
            },
            "required": ["text"],
            "additionalProperties": false
        }),
    }
}

fn record_user_input_tool() -> ToolDescriptor {
    ToolDescriptor {
        name: "record_user_input",
        description: "Record user input by sending it via Pushover notification",
        parameters: json!({
            "type": "object",
            "properties": {
                "user_message": {
                    "type": "string",
                    "description": "The user's input message to record"
                }
            },
            "required": ["user_message"],
            "additionalProperties": false
        }),
    }
}

#[async_trait]
impl ToolExecutor for PushoverNotifier {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        vec![push_tool(), record_user_input_tool()]
    }

    fn handler_names(&self) -> Vec<&'static str> {
        vec!["push", "record_user_input"]
    }

    async fn execute(&self, name: &str, input: &Value) -> Result<String, String> {
        match name {
            "push" => {
                let text = input
                    .get("text")
                    .and_then(Value::as_str)
                    .ok_or("missing 'text' argument")?;
                self.push(text).await.map_err(|e| e.to_string())?;
                Ok(String::new())
            }
            "record_user_input" => {
                let user_message = input
                    .get("user_message")
                    .and_then(Value::as_str)
                    .ok_or("missing 'user_message' argument")?;
                self.record_user_input(user_message)
                    .await
                    .map_err(|e| e.to_string())?;
                Ok(String::new())
            }
            _ => Err(format!("unknown tool: {name}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::tools::verify_registry;
    use mockito::Matcher;
    use std::io::Write;

    fn write_secret(dir: &tempfile::TempDir, name: &str, value: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{value}").unwrap();
        path
    }

    fn notifier_for(url: String, dir: &tempfile::TempDir) -> PushoverNotifier {
        let config = PushoverConfig {
            pushover_token_file: write_secret(dir, "token", "app-token"),
            pushover_user_file: write_secret(dir, "user", "user-key"),
            pushover_api_url: url,
        };
        PushoverNotifier::new(&config).unwrap()
    }

    #[test]
    fn registry_matches_descriptors() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier_for("http://localhost".to_owned(), &dir);
        verify_registry(&notifier).unwrap();
    }

    #[tokio::test]
    async fn push_sends_form_encoded_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("token".into(), "app-token".into()),
                Matcher::UrlEncoded("user".into(), "user-key".into()),
                Matcher::UrlEncoded("message".into(), "hello".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier_for(server.url(), &dir);
        notifier.push("hello").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn record_user_input_is_timestamped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::Regex(
                r"message=%5B\d{4}-\d{2}-\d{2}.*User\+input.*".to_owned(),
            ))
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier_for(server.url(), &dir);
        notifier.record_user_input("what do you charge?").await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn delivery_failure_surfaces_as_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(500)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier_for(server.url(), &dir);
        let err = notifier.push("hello").await.unwrap_err();
        assert!(matches!(err, PushoverError::Api(_)));
    }

    #[tokio::test]
    async fn unknown_tool_name_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let notifier = notifier_for("http://localhost".to_owned(), &dir);
        let err = notifier
            .execute("sweep_logs", &json!({}))
            .await
            .unwrap_err();
        assert!(err.contains("unknown tool"));
    }
}
