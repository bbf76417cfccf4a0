//! Integration tests for the tool-augmented responder, against a mock
//! completion service.

use async_trait::async_trait;
use mockito::Matcher;
use persona_gateway::completion::tools::{ToolDescriptor, ToolExecutor};
use persona_gateway::{
    CompletionConfig, CompletionError, Documents, Persona, PersonaConfig, Responder, Turn,
};
use serde_json::{Value, json};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Executor that records every dispatched call.
struct RecordingExecutor {
    calls: Mutex<Vec<(String, Value)>>,
}

impl RecordingExecutor {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingExecutor {
    fn descriptors(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor {
            name: "push",
            description: "Send a push notification",
            parameters: json!({
                "type": "object",
                "properties": {"text": {"type": "string"}},
                "required": ["text"]
            }),
        }]
    }

    fn handler_names(&self) -> Vec<&'static str> {
        vec!["push"]
    }

    async fn execute(&self, name: &str, input: &Value) -> Result<String, String> {
        self.calls
            .lock()
            .unwrap()
            .push((name.to_owned(), input.clone()));
        match name {
            "push" => Ok(String::new()),
            _ => Err(format!("unknown tool: {name}")),
        }
    }
}

fn test_persona() -> Arc<Persona> {
    let config = PersonaConfig {
        docs_dir: PathBuf::from("me"),
        persona_name: "Simon".to_owned(),
        contact_email: "simon@example.com".to_owned(),
        contact_site: "example.com".to_owned(),
    };
    let documents = Documents {
        summary: "AI automation consultant.".to_owned(),
        ..Documents::default()
    };
    Arc::new(Persona::new(&config, documents))
}

fn responder_for(
    server: &mockito::Server,
    key_dir: &tempfile::TempDir,
    executor: Arc<dyn ToolExecutor>,
    max_iterations: u32,
) -> Responder {
    let api_key_file = key_dir.path().join("api-key");
    let mut file = std::fs::File::create(&api_key_file).unwrap();
    writeln!(file, "sk-test").unwrap();

    let config = CompletionConfig {
        api_key_file,
        completion_api_url: format!("{}/v1/chat/completions", server.url()),
        completion_model: "gpt-4o-mini".to_owned(),
        max_iterations,
    };
    Responder::new(config, test_persona(), executor).unwrap()
}

fn plain_answer(text: &str) -> String {
    json!({
        "choices": [{
            "message": {"role": "assistant", "content": text},
            "finish_reason": "stop"
        }]
    })
    .to_string()
}

fn tool_call_round(name: &str, arguments: &str) -> String {
    json!({
        "choices": [{
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
    .to_string()
}

#[tokio::test]
async fn plain_answer_returns_without_tool_calls() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .with_status(200)
        .with_body(plain_answer("I consult on AI automation."))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let executor = RecordingExecutor::new();
    let responder = responder_for(&server, &dir, executor.clone(), 10);

    let answer = responder.respond("What do you do?", &[]).await.unwrap();
    assert_eq!(answer, "I consult on AI automation.");
    assert!(executor.calls().is_empty());
    mock.assert_async().await;
}

#[tokio::test]
async fn system_turn_and_history_precede_the_user_turn() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::PartialJsonString(
            json!({
                "model": "gpt-4o-mini",
                "messages": [
                    {"role": "system"},
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello!"},
                    {"role": "user", "content": "Tell me more"}
                ]
            })
            .to_string(),
        ))
        .with_status(200)
        .with_body(plain_answer("Sure."))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let responder = responder_for(&server, &dir, RecordingExecutor::new(), 10);

    let history = vec![Turn::user("Hi"), Turn::assistant("Hello!")];
    responder.respond("Tell me more", &history).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn tool_call_round_feeds_result_back_before_final_answer() {
    let mut server = mockito::Server::new_async().await;

    // The first round carries no tool results; the follow-up does. Mocks are
    // matched newest-first, so the narrower follow-up mock goes second.
    let first = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(tool_call_round("push", r#"{"text": "visitor said hi"}"#))
        .create_async()
        .await;
    let followup = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex("tool_call_id".to_owned()))
        .with_status(200)
        .with_body(plain_answer("Hi there!"))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let executor = RecordingExecutor::new();
    let responder = responder_for(&server, &dir, executor.clone(), 10);

    let answer = responder.respond("Hi", &[]).await.unwrap();

    // The final answer is the follow-up text, never the tool's own output.
    assert_eq!(answer, "Hi there!");
    let calls = executor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "push");
    assert_eq!(calls[0].1, json!({"text": "visitor said hi"}));
    first.assert_async().await;
    followup.assert_async().await;
}

#[tokio::test]
async fn unknown_tool_degrades_to_empty_result() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(tool_call_round("sweep_logs", "{}"))
        .create_async()
        .await;
    let followup = server
        .mock("POST", "/v1/chat/completions")
        .match_body(Matcher::Regex("tool_call_id".to_owned()))
        .with_status(200)
        .with_body(plain_answer("Done."))
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let responder = responder_for(&server, &dir, RecordingExecutor::new(), 10);

    // The unknown tool name must not abort the loop.
    let answer = responder.respond("Hi", &[]).await.unwrap();
    assert_eq!(answer, "Done.");
    followup.assert_async().await;
}

#[tokio::test]
async fn endless_tool_requests_hit_the_iteration_cap() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(tool_call_round("push", r#"{"text": "again"}"#))
        .expect(3)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let responder = responder_for(&server, &dir, RecordingExecutor::new(), 3);

    let err = responder.respond("Hi", &[]).await.unwrap_err();
    assert!(matches!(err, CompletionError::TooManyIterations(3)));
}

#[tokio::test]
async fn api_error_body_surfaces_as_api_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(429)
        .with_body(json!({"error": {"message": "rate limited"}}).to_string())
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let responder = responder_for(&server, &dir, RecordingExecutor::new(), 10);

    let err = responder.respond("Hi", &[]).await.unwrap_err();
    assert!(matches!(err, CompletionError::ApiError(msg) if msg.contains("rate limited")));
}

#[tokio::test]
async fn empty_choices_is_an_empty_response() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(json!({"choices": []}).to_string())
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let responder = responder_for(&server, &dir, RecordingExecutor::new(), 10);

    let err = responder.respond("Hi", &[]).await.unwrap_err();
    assert!(matches!(err, CompletionError::EmptyResponse));
}
