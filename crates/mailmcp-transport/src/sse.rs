//! SSE transport: a long-lived event stream per session plus a message
//! endpoint for client requests.

use std::{convert::Infallible, sync::Arc};

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use futures::{Stream, StreamExt, stream};
use mailmcp_core::SessionId;
use mailmcp_session::{OutboundMessage, SessionError, SessionManager};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::protocol::{JsonRpcRequest, JsonRpcResponse, SERVER_NAME, SERVER_VERSION};

/// Path clients post requests to.
pub const MESSAGES_PATH: &str = "/messages";

/// Router state.
#[derive(Clone)]
pub struct AppState {
    pub manager: Arc<SessionManager>,
}

/// Build the HTTP router: `/sse`, `/messages` and `/health`.
///
/// # Example
/// ```ignore
/// let app = create_router(Arc::clone(&manager));
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_router(manager: Arc<SessionManager>) -> Router {
    Router::new()
        .route("/sse", get(sse_handler))
        .route("/sse/", get(sse_handler))
        .route(MESSAGES_PATH, post(message_handler))
        .route("/messages/", post(message_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { manager })
}

/// Ends the session when the response stream is dropped.
struct DisconnectGuard {
    manager: Arc<SessionManager>,
    session_id: SessionId,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        tracing::info!(session_id = %self.session_id, "SSE stream closed");
        self.manager.on_disconnect(self.session_id);
    }
}

/// Message endpoint advertised to the client for a session.
#[must_use]
pub fn endpoint_path(session_id: SessionId) -> String {
    format!("{MESSAGES_PATH}?session_id={}", session_id.simple())
}

async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let session_id = state.manager.on_connect(tx);
    tracing::info!(%session_id, "SSE stream opened");

    let guard = DisconnectGuard {
        manager: Arc::clone(&state.manager),
        session_id,
    };

    let endpoint = Event::default()
        .event("endpoint")
        .data(endpoint_path(session_id));

    let frames = UnboundedReceiverStream::new(rx).map(move |message| {
        let _guard = &guard;
        Ok(message_event(message))
    });

    Sse::new(stream::once(async move { Ok(endpoint) }).chain(frames))
        .keep_alive(KeepAlive::default())
}

fn message_event(message: OutboundMessage) -> Event {
    let response = JsonRpcResponse::from(message);
    match serde_json::to_string(&response) {
        Ok(json) => Event::default().event("message").data(json),
        Err(e) => {
            tracing::error!("Failed to serialize message: {e}");
            Event::default().event("error").data(e.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageQuery {
    #[serde(default)]
    session_id: Option<String>,
}

async fn message_handler(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
    body: Bytes,
) -> Response {
    let Some(raw_id) = query.session_id else {
        return (StatusCode::BAD_REQUEST, "session_id is required").into_response();
    };
    let Ok(session_id) = Uuid::parse_str(&raw_id) else {
        tracing::warn!(session_id = %raw_id, "Malformed session id");
        return (StatusCode::BAD_REQUEST, "Invalid session ID").into_response();
    };

    let request = match JsonRpcRequest::parse(&body) {
        Ok(request) => request,
        Err(error) => {
            tracing::warn!(
                %session_id,
                code = error.code,
                "Invalid client message: {}",
                error.message
            );
            return (
                StatusCode::BAD_REQUEST,
                Json(JsonRpcResponse::error(Value::Null, error)),
            )
                .into_response();
        }
    };

    let request_id = request.id.clone().unwrap_or(Value::Null);
    match state
        .manager
        .on_message(session_id, request.into_inbound(session_id))
    {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(err) => {
            tracing::warn!(%session_id, ?request_id, "Request rejected: {err}");
            let status = match err {
                SessionError::NotFound(_) => StatusCode::NOT_FOUND,
                SessionError::Closing(_) => StatusCode::CONFLICT,
            };
            (status, Json(err.to_response(request_id))).into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": SERVER_NAME,
        "version": SERVER_VERSION,
        "email_account": state.manager.dispatcher().sender_identity(),
    }))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{
        body::Body,
        http::{Request, header},
    };
    use mailmcp_core::{MailError, MailSender, ToolDispatcher, ToolRegistry};
    use tokio::time::timeout;
    use tower::ServiceExt;

    use super::*;

    struct OkSender;

    impl MailSender for OkSender {
        fn sender_identity(&self) -> &str {
            "bot@example.com"
        }

        fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            Ok(())
        }
    }

    fn manager() -> Arc<SessionManager> {
        let dispatcher = ToolDispatcher::new(
            Arc::new(ToolRegistry::builtin().unwrap()),
            Arc::new(OkSender),
        );
        Arc::new(SessionManager::new(Arc::new(dispatcher)))
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// Read SSE chunks until one contains `needle`.
    async fn read_until<S>(stream: &mut S, needle: &str) -> String
    where
        S: Stream<Item = Result<Bytes, axum::Error>> + Unpin,
    {
        let mut seen = String::new();
        timeout(Duration::from_secs(5), async {
            while !seen.contains(needle) {
                let chunk = stream.next().await.expect("stream ended").unwrap();
                seen.push_str(std::str::from_utf8(&chunk).unwrap());
            }
        })
        .await
        .expect("timed out reading SSE stream");
        seen
    }

    #[tokio::test]
    async fn test_health_reports_identity() {
        let response = create_router(manager())
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["email_account"], "bot@example.com");
    }

    #[tokio::test]
    async fn test_message_requires_session_id() {
        let ping = json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
        let app = create_router(manager());

        let response = app.clone().oneshot(post("/messages", &ping)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post("/messages?session_id=nope", &ping))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404_with_envelope() {
        let uri = endpoint_path(Uuid::new_v4());
        let response = create_router(manager())
            .oneshot(post(&uri, &json!({"jsonrpc": "2.0", "id": 4, "method": "ping"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = body_json(response).await;
        assert_eq!(body["request_id"], 4);
        assert_eq!(body["status"], "error");
        assert_eq!(body["kind"], "session_not_found");
    }

    #[tokio::test]
    async fn test_draining_session_is_409() {
        struct SlowSender;
        impl MailSender for SlowSender {
            fn sender_identity(&self) -> &str {
                "bot@example.com"
            }
            fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(())
            }
        }
        let dispatcher = ToolDispatcher::new(
            Arc::new(ToolRegistry::builtin().unwrap()),
            Arc::new(SlowSender),
        );
        let manager = Arc::new(SessionManager::new(Arc::new(dispatcher)));
        let (tx, _rx) = mpsc::unbounded_channel();
        let session_id = manager.on_connect(tx);
        let app = create_router(Arc::clone(&manager));

        let call = json!({
            "jsonrpc": "2.0", "id": 1, "method": "tools/call",
            "params": {"name": "send_system_alert", "arguments": {"recipient": "a@b.com"}},
        });
        let uri = endpoint_path(session_id);
        let response = app.clone().oneshot(post(&uri, &call)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        manager.on_disconnect(session_id);
        let response = app.oneshot(post(&uri, &call)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(response).await["kind"], "session_closing");
    }

    #[tokio::test]
    async fn test_bad_body_is_400() {
        let manager = manager();
        let (tx, _rx) = mpsc::unbounded_channel();
        let session_id = manager.on_connect(tx);

        let request = Request::builder()
            .method("POST")
            .uri(endpoint_path(session_id))
            .body(Body::from("{oops"))
            .unwrap();
        let response = create_router(manager).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn test_sse_session_round_trip() {
        let manager = manager();
        let app = create_router(Arc::clone(&manager));

        let response = app
            .clone()
            .oneshot(Request::get("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()[header::CONTENT_TYPE]
                .to_str()
                .unwrap()
                .starts_with("text/event-stream")
        );
        assert_eq!(manager.session_count(), 1);

        let mut events = response.into_body().into_data_stream();
        let handshake = read_until(&mut events, "\n\n").await;
        assert!(handshake.contains("event: endpoint"), "{handshake}");
        let path = handshake
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .unwrap()
            .to_string();
        assert!(path.starts_with("/messages?session_id="));

        let list = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"});
        let response = app.clone().oneshot(post(&path, &list)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let call = json!({
            "jsonrpc": "2.0", "id": 2, "method": "tools/call",
            "params": {
                "name": "send_email",
                "arguments": {"recipient": "a@b.com", "subject": "S", "body": "B"},
            },
        });
        let response = app.oneshot(post(&path, &call)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let frames = read_until(&mut events, "\"id\":2").await;
        assert!(frames.contains("event: message"));
        let tools_at = frames.find("send_halloween_invitation").unwrap();
        let result_at = frames.find("\"id\":2").unwrap();
        assert!(tools_at < result_at, "responses out of order: {frames}");
        assert!(frames.contains("Email sent to a@b.com"));

        // Client disconnect tears the session down.
        drop(events);
        assert_eq!(manager.session_count(), 0);
    }
}
