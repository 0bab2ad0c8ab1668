// The side channel: POST /messages?sessionId=<id>.
//
// The POST body is one JSON-RPC request. The response body only acknowledges
// receipt - the actual result goes out on the session's SSE stream, tagged
// with the request id. That keeps ordering concerns out of the HTTP layer:
// concurrent calls on one session may complete out of order and the client
// correlates by id.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::json;

use crate::core::session::SessionId;
use crate::http::protocol::{
    methods, CallToolParams, CallToolResult, RpcRequest, RpcResponse, INVALID_PARAMS,
    METHOD_NOT_FOUND, PROTOCOL_VERSION, SERVER_NAME,
};
use crate::http::routes::AppState;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// POST /messages - accept one request for an open session.
pub async fn messages_handler(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    body: String,
) -> (StatusCode, String) {
    let Some(session_id) = query.session_id else {
        return (
            StatusCode::BAD_REQUEST,
            "missing sessionId query parameter".to_string(),
        );
    };
    let session_id = SessionId::new(session_id);

    // Reject unknown/closed sessions at the boundary instead of letting a
    // stale id reach the dispatcher.
    if !state.registry.contains(&session_id) {
        return (StatusCode::NOT_FOUND, "session not found".to_string());
    }

    let request: RpcRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid JSON-RPC request: {err}"),
            )
        }
    };

    // Fire and forget: the upstream call may take a network round trip, and
    // the client is already listening on the stream for the outcome.
    tokio::spawn(handle_request(state, session_id, request));

    (StatusCode::ACCEPTED, "Accepted".to_string())
}

async fn handle_request(state: AppState, session_id: SessionId, request: RpcRequest) {
    tracing::debug!(session_id = %session_id, method = %request.method, "dispatching request");

    let Some(response) = dispatch(&state, &request).await else {
        // Notification - nothing to push back.
        return;
    };

    let payload = match serde_json::to_value(&response) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!(session_id = %session_id, "failed to serialize response: {err}");
            return;
        }
    };

    // If the client disconnected (or stopped reading) while we were working,
    // the registry has already cleaned up; the result is simply dropped.
    if let Err(err) = state.registry.send(&session_id, payload) {
        tracing::warn!(session_id = %session_id, error = %err, "dropping response for closed session");
    }
}

/// Route one JSON-RPC request to the dispatcher. Returns `None` for
/// notifications, which never produce a response.
pub(crate) async fn dispatch(state: &AppState, request: &RpcRequest) -> Option<RpcResponse> {
    let id = match &request.id {
        Some(id) => id.clone(),
        None => {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        }
    };

    let response = match request.method.as_str() {
        methods::INITIALIZE => RpcResponse::result(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        ),
        methods::LIST_TOOLS => {
            RpcResponse::result(id, json!({ "tools": state.tools.list_tools() }))
        }
        methods::CALL_TOOL => {
            let params: CallToolParams = match serde_json::from_value(request.params.clone()) {
                Ok(params) => params,
                Err(err) => {
                    return Some(RpcResponse::error(
                        id,
                        INVALID_PARAMS,
                        format!("invalid tools/call params: {err}"),
                    ));
                }
            };

            // Tool failures are failure-shaped results, not protocol errors,
            // so the calling agent can inspect them and retry with corrected
            // arguments.
            let result = match state.tools.call_tool(&params.name, &params.arguments).await {
                Ok(success) => CallToolResult::text(success.message, false),
                Err(failure) => CallToolResult::text(failure.to_string(), true),
            };
            RpcResponse::result(id, json!(result))
        }
        other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("unknown method: {other}")),
    };

    Some(response)
}
