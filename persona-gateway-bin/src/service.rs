//! The HTTP surface of the chatbot: chat, health, profile image, widget.
//!
//! Handlers are generic over the request body so they can be exercised
//! directly in tests with synthetic bodies. Responses use `Full<Bytes>`
//! bodies so the profile image can be served as binary.

use bytes::Bytes;
use http::header::{self, HeaderValue};
use http::{Method, Request, Response, StatusCode};
use http_body::Body;
use http_body_util::{BodyExt, Full};
use persona_gateway::{Persona, Responder, Turn, validate_history};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::bytes::Buf;
use tracing::{error, info, warn};

const WIDGET_HTML: &str = include_str!("../static/widget.html");

/// CORS allow-list, parsed from a comma-separated configuration string.
#[derive(Clone, Debug)]
pub enum CorsPolicy {
    /// Allow any origin (`*`).
    Any,
    /// Allow only the listed origins, echoing the matching one.
    List(Vec<String>),
}

impl CorsPolicy {
    /// Parse the configured allow-list. `*` (the default) allows all origins.
    pub fn parse(allowed_origins: &str) -> Self {
        if allowed_origins.trim() == "*" {
            return Self::Any;
        }
        Self::List(
            allowed_origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    /// The `Access-Control-Allow-Origin` value for a request, if any.
    /// Listed origins are echoed back; unlisted origins get no CORS headers.
    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        match self {
            Self::Any => Some("*".to_owned()),
            Self::List(origins) => {
                let origin = origin?;
                origins
                    .iter()
                    .any(|allowed| allowed == origin)
                    .then(|| origin.to_owned())
            }
        }
    }
}

/// Which chat endpoint variant is being served. The `/api/chat` variant
/// additionally reports a `success` field, for widget compatibility.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ChatVariant {
    Plain,
    Api,
}

/// The chat service: shared, immutable per-process state behind the HTTP
/// handlers. Requests are independent; there is no per-conversation state.
pub struct ChatService {
    responder: Responder,
    persona: Arc<Persona>,
    cors: CorsPolicy,
    profile_image: PathBuf,
}

/// Request body for the chat endpoints.
#[derive(Deserialize)]
struct ChatRequestBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    history: Option<Value>,
}

impl ChatService {
    /// Create the service.
    pub fn new(
        responder: Responder,
        persona: Arc<Persona>,
        cors: CorsPolicy,
        profile_image: PathBuf,
    ) -> Self {
        Self {
            responder,
            persona,
            cors,
            profile_image,
        }
    }

    /// Handle an incoming HTTP request.
    pub async fn handle_request<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Buf + Send,
        B::Error: std::fmt::Display,
    {
        info!(
            "Received http request: {} {} (version: {:?})",
            req.method(),
            req.uri().path(),
            req.version()
        );

        let origin = req
            .headers()
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let allow_origin = self.cors.allow_origin(origin.as_deref());

        let method = req.method().clone();
        let path = req.uri().path().to_owned();

        let mut response = match (&method, path.as_str()) {
            (&Method::OPTIONS, _) => preflight(),
            (&Method::GET | &Method::HEAD, "/api/health") => handle_health(),
            (&Method::POST, "/chat") => self.handle_chat(req, ChatVariant::Plain).await,
            (&Method::POST, "/api/chat") => self.handle_chat(req, ChatVariant::Api).await,
            (&Method::GET, "/profile-image" | "/api/profile-image") => {
                self.handle_profile_image().await
            }
            (&Method::GET, "/") => self.handle_widget(),
            (_, "/" | "/chat" | "/api/chat" | "/api/health" | "/profile-image" | "/api/profile-image") => {
                json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
            }
            _ => json_error(StatusCode::NOT_FOUND, "Not found"),
        };

        if let Some(origin) = allow_origin
            && let Ok(value) = HeaderValue::from_str(&origin)
        {
            let headers = response.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            if origin != "*" {
                headers.insert(
                    header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                    HeaderValue::from_static("true"),
                );
            }
        }

        response
    }

    async fn handle_chat<B>(&self, req: Request<B>, variant: ChatVariant) -> Response<Full<Bytes>>
    where
        B: Body + Send,
        B::Data: Buf + Send,
        B::Error: std::fmt::Display,
    {
        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                warn!("When reading body bytes: {err}");
                return json_error(StatusCode::BAD_REQUEST, "No message provided");
            }
        };

        let Ok(parsed) = serde_json::from_slice::<ChatRequestBody>(&body) else {
            let message = match variant {
                ChatVariant::Api => "No JSON data provided",
                ChatVariant::Plain => "No message provided",
            };
            return json_error(StatusCode::BAD_REQUEST, message);
        };

        let message = parsed.message.unwrap_or_default();
        if message.is_empty() {
            return json_error(StatusCode::BAD_REQUEST, "No message provided");
        }

        // Validate caller-supplied history at the boundary rather than
        // passing loosely-shaped turns through to the completion service.
        let history: Vec<Turn> = match parsed.history {
            None => Vec::new(),
            Some(value) => match serde_json::from_value(value) {
                Ok(history) => history,
                Err(err) => {
                    warn!("Rejecting malformed history: {err}");
                    return json_error(StatusCode::BAD_REQUEST, "Invalid history");
                }
            },
        };
        if let Err(err) = validate_history(&history) {
            warn!("Rejecting history: {err}");
            return json_error(StatusCode::BAD_REQUEST, "Invalid history");
        }

        match self.responder.respond(&message, &history).await {
            Ok(answer) => {
                let mut history = history;
                history.push(Turn::user(message));
                history.push(Turn::assistant(answer.clone()));

                let mut body = json!({"response": answer, "history": history});
                if variant == ChatVariant::Api {
                    body["success"] = json!(true);
                }
                json_response(StatusCode::OK, &body)
            }
            Err(err) => {
                // The cause stays in the server log; callers get a fixed
                // generic message with no internal detail.
                error!("Error in chat endpoint: {err}");
                let mut body = json!({"error": "An error occurred processing your request"});
                if variant == ChatVariant::Api {
                    body["success"] = json!(false);
                }
                json_response(StatusCode::INTERNAL_SERVER_ERROR, &body)
            }
        }
    }

    async fn handle_profile_image(&self) -> Response<Full<Bytes>> {
        match tokio::fs::read(&self.profile_image).await {
            Ok(bytes) => {
                let mut resp = Response::new(Full::new(Bytes::from(bytes)));
                resp.headers_mut()
                    .insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
                resp
            }
            Err(err) => {
                warn!("Profile image {} unavailable: {err}", self.profile_image.display());
                json_error(StatusCode::NOT_FOUND, "Profile image not found")
            }
        }
    }

    fn handle_widget(&self) -> Response<Full<Bytes>> {
        // The introduction is injected as a JSON string literal so the
        // persona name never needs escaping by hand.
        let introduction = serde_json::to_string(&self.persona.introduction())
            .unwrap_or_else(|_| "\"\"".to_owned());
        let html = WIDGET_HTML.replace("\"__INTRODUCTION__\"", &introduction);

        let mut resp = Response::new(Full::new(Bytes::from(html)));
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        resp
    }
}

fn handle_health() -> Response<Full<Bytes>> {
    // Reports liveness of this process only; the completion service is
    // intentionally not probed here.
    json_response(
        StatusCode::OK,
        &json!({
            "status": "healthy",
            "service": "AI Chatbot API",
            "version": env!("CARGO_PKG_VERSION"),
        }),
    )
}

fn preflight() -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::new()));
    *resp.status_mut() = StatusCode::NO_CONTENT;
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    resp
}

fn json_response(status: StatusCode, value: &Value) -> Response<Full<Bytes>> {
    let mut resp = Response::new(Full::new(Bytes::from(value.to_string())));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

fn json_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(status, &json!({"error": message}))
}
