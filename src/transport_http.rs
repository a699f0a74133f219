use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use crate::lazy::LazyServer;
use crate::types::{ERR_CODE_INTERNAL, JsonRpcRequest, new_error_response};

const SESSION_HEADER: &str = "mcp-session-id";

/// Shared state for the HTTP handler.
pub(crate) struct HttpState {
    server: Arc<LazyServer>,
}

/// Create an Axum router for the MCP server.
///
/// Specifications are fetched on the first `/mcp` request, not when the
/// router is built, so health checks answer immediately.
pub fn http_router(server: Arc<LazyServer>) -> Router {
    let state = Arc::new(HttpState { server });

    Router::new()
        .route("/", get(handle_root))
        .route("/healthz", get(handle_healthz))
        .route("/mcp", post(handle_mcp))
        .fallback(handle_not_found)
        .with_state(state)
}

async fn handle_root() -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain")], "OpenAPI MCP Server - OK")
}

async fn handle_healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn handle_not_found(method: Method, uri: Uri) -> impl IntoResponse {
    tracing::warn!(%method, path = uri.path(), "404 - unknown path");
    (StatusCode::NOT_FOUND, [(CONTENT_TYPE, "text/plain")], "Not Found")
}

async fn handle_mcp(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Json(req): Json<JsonRpcRequest>,
) -> Response {
    tracing::info!(method = %req.method, "received MCP request");

    // Sessions are not tracked: a fresh id is minted on initialize and any
    // id the client sends is echoed back unchecked.
    let session_id = if req.method == "initialize" {
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok()
    } else {
        headers.get(SESSION_HEADER).cloned()
    };

    let server = match state.server.get_or_init().await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(method = %req.method, error = %e, "error handling MCP request");
            let resp = new_error_response(
                req.id,
                ERR_CODE_INTERNAL,
                format!("server initialization failed: {}", e),
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(resp)).into_response();
        }
    };

    let resp = server.handle(req).await;

    // Notification: return 202 with no body.
    if resp.is_notification() {
        return (StatusCode::ACCEPTED, Body::empty()).into_response();
    }

    let mut response = Json(&resp).into_response();

    if let Some(sid) = session_id {
        response.headers_mut().insert(SESSION_HEADER, sid);
    }

    response
}
