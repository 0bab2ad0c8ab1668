// Router assembly plus the static metadata endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;

use crate::core::session::SessionRegistry;
use crate::core::tools::{DocumentWriter, ToolService};
use crate::http::messages::messages_handler;
use crate::http::protocol::SERVER_NAME;
use crate::http::sse::sse_handler;

/// Shared state handed to every handler. Cheap to clone; everything mutable
/// lives behind the registry.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub tools: Arc<ToolService<Arc<dyn DocumentWriter>>>,
    pub metadata: ServiceMetadata,
}

/// Static service metadata served at the root endpoint, so clients can
/// discover which OAuth endpoints and scopes the credential must cover.
/// Configuration, not logic - it never changes at runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceMetadata {
    pub name: String,
    pub version: String,
    pub authorization_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

impl Default for ServiceMetadata {
    fn default() -> Self {
        Self {
            name: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            authorization_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/documents".to_string(),
                "https://www.googleapis.com/auth/drive.file".to_string(),
            ],
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(metadata_handler))
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .with_state(state)
}

async fn metadata_handler(State(state): State<AppState>) -> Json<ServiceMetadata> {
    Json(state.metadata.clone())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::core::tools::{DocsError, ToolFailure};

    use super::*;

    struct NoopWriter;

    #[async_trait]
    impl DocumentWriter for NoopWriter {
        async fn append_text(&self, _doc_id: &str, _content: &str) -> Result<(), DocsError> {
            Ok(())
        }
    }

    struct FailingWriter;

    #[async_trait]
    impl DocumentWriter for FailingWriter {
        async fn append_text(&self, _doc_id: &str, _content: &str) -> Result<(), DocsError> {
            Err(DocsError::Api {
                status: 404,
                message: "Requested entity was not found.".to_string(),
            })
        }
    }

    fn test_state_with(writer: Arc<dyn DocumentWriter>) -> AppState {
        AppState {
            registry: Arc::new(SessionRegistry::new()),
            tools: Arc::new(ToolService::new(writer)),
            metadata: ServiceMetadata::default(),
        }
    }

    fn test_state() -> AppState {
        test_state_with(Arc::new(NoopWriter))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_message(session_id: Option<&str>, body: Value) -> Request<Body> {
        let uri = match session_id {
            Some(id) => format!("/messages?sessionId={id}"),
            None => "/messages".to_string(),
        };
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn root_serves_the_service_metadata() {
        let app = router(test_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let metadata = body_json(response).await;
        assert_eq!(metadata["name"], "google-docs-writer");
        assert_eq!(
            metadata["scopes"][0],
            "https://www.googleapis.com/auth/documents"
        );
    }

    #[tokio::test]
    async fn missing_session_id_is_a_bad_request() {
        let app = router(test_state());

        let response = app
            .oneshot(post_message(None, json!({ "id": 1, "method": "tools/list" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_session_is_rejected_without_dispatch() {
        let app = router(test_state());

        let response = app
            .oneshot(post_message(
                Some("no-such-session"),
                json!({ "id": 1, "method": "tools/list" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let state = test_state();
        let (session_id, _rx) = state.registry.open();
        let app = router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/messages?sessionId={session_id}"))
                    .body(Body::from("this is not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn tools_list_round_trips_through_the_stream() {
        let state = test_state();
        let (session_id, mut rx) = state.registry.open();
        let app = router(state);

        let response = app
            .oneshot(post_message(
                Some(session_id.as_str()),
                json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/list" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let pushed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no response pushed within 1s")
            .expect("stream closed");
        assert_eq!(pushed["id"], 7);
        let tools = pushed["result"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "append_text_to_doc");
    }

    #[tokio::test]
    async fn call_tool_success_is_pushed_to_the_originating_session() {
        let state = test_state();
        let (session_id, mut rx) = state.registry.open();
        let app = router(state);

        let response = app
            .oneshot(post_message(
                Some(session_id.as_str()),
                json!({
                    "jsonrpc": "2.0",
                    "id": "req-1",
                    "method": "tools/call",
                    "params": {
                        "name": "append_text_to_doc",
                        "arguments": { "docId": "abc123", "content": "hello" }
                    }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let pushed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no response pushed within 1s")
            .expect("stream closed");
        assert_eq!(pushed["id"], "req-1");
        assert_eq!(pushed["result"]["isError"], false);
        let text = pushed["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("appended"));
    }

    #[tokio::test]
    async fn upstream_failure_arrives_as_a_failure_shaped_result() {
        let state = test_state_with(Arc::new(FailingWriter));
        let (session_id, mut rx) = state.registry.open();
        // A second session must be unaffected by the failure on the first.
        let (other_id, _other_rx) = state.registry.open();
        let app = router(state.clone());

        let response = app
            .oneshot(post_message(
                Some(session_id.as_str()),
                json!({
                    "jsonrpc": "2.0",
                    "id": 3,
                    "method": "tools/call",
                    "params": {
                        "name": "append_text_to_doc",
                        "arguments": { "docId": "missing-doc", "content": "hello" }
                    }
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let pushed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no response pushed within 1s")
            .expect("stream closed");
        assert_eq!(pushed["result"]["isError"], true);
        let text = pushed["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("Requested entity was not found."));

        assert!(state.registry.contains(&other_id));
    }

    #[tokio::test]
    async fn unknown_method_gets_a_json_rpc_error() {
        let state = test_state();
        let (session_id, mut rx) = state.registry.open();
        let app = router(state);

        let response = app
            .oneshot(post_message(
                Some(session_id.as_str()),
                json!({ "jsonrpc": "2.0", "id": 9, "method": "resources/list" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let pushed = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no response pushed within 1s")
            .expect("stream closed");
        assert_eq!(pushed["error"]["code"], -32601);
    }

    #[tokio::test]
    async fn notifications_are_acknowledged_but_never_answered() {
        use crate::http::messages::dispatch;
        use crate::http::protocol::RpcRequest;

        let state = test_state();
        let (session_id, mut rx) = state.registry.open();
        let app = router(state.clone());

        let response = app
            .oneshot(post_message(
                Some(session_id.as_str()),
                json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        // No id means no response: the stream must stay empty.
        let pushed = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(pushed.is_err(), "a notification produced a pushed response");

        let request: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(dispatch(&state, &request).await.is_none());
    }

    #[tokio::test]
    async fn sse_endpoint_opens_a_session_and_sends_the_handshake() {
        use futures::StreamExt;

        let state = test_state();
        let app = router(state.clone());

        let response = app
            .oneshot(Request::builder().uri("/sse").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(state.registry.open_sessions(), 1);

        let mut body = response.into_body().into_data_stream();
        let first = tokio::time::timeout(Duration::from_secs(1), body.next())
            .await
            .expect("no handshake within 1s")
            .expect("body ended")
            .unwrap();
        let frame = String::from_utf8(first.to_vec()).unwrap();
        assert!(frame.contains("event: endpoint"));
        assert!(frame.contains("/messages?sessionId="));
    }

    #[tokio::test]
    async fn dispatch_reports_unknown_tools_as_results_not_errors() {
        use crate::http::messages::dispatch;
        use crate::http::protocol::RpcRequest;

        let state = test_state();
        let request: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": { "name": "nonexistent_tool", "arguments": {} }
        }))
        .unwrap();

        let response = dispatch(&state, &request).await.unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["result"]["isError"], true);
        let text = value["result"]["content"][0]["text"].as_str().unwrap();
        assert_eq!(
            text,
            ToolFailure::UnknownTool {
                name: "nonexistent_tool".to_string()
            }
            .to_string()
        );
    }

    #[tokio::test]
    async fn initialize_advertises_the_server_identity() {
        use crate::http::messages::dispatch;
        use crate::http::protocol::RpcRequest;

        let state = test_state();
        let request: RpcRequest = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {}
        }))
        .unwrap();

        let response = dispatch(&state, &request).await.unwrap();
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["result"]["serverInfo"]["name"], "google-docs-writer");
        assert!(value["result"]["capabilities"].get("tools").is_some());
    }
}
