use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 error codes.
pub const ERR_CODE_PARSE: i32 = -32700;
pub const ERR_CODE_INVALID_REQ: i32 = -32600;
pub const ERR_CODE_NO_METHOD: i32 = -32601;
pub const ERR_CODE_BAD_PARAMS: i32 = -32602;
pub const ERR_CODE_INTERNAL: i32 = -32603;
/// MCP-reserved code for a well-formed resource URI with nothing behind it.
pub const ERR_CODE_RESOURCE_NOT_FOUND: i32 = -32002;

/// MCP Protocol version this server implements.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

/// MIME type of every served specification.
pub const SPEC_MIME_TYPE: &str = "application/json";

/// An OpenAPI document as published upstream. Never inspected, only stored
/// and re-serialized.
pub type SpecDocument = Value;

/// API identifier → document, as produced by
/// [`SpecFetcher::fetch_all`](crate::SpecFetcher::fetch_all).
pub type SpecSet = HashMap<String, SpecDocument>;

// ── Request ──

/// Inbound JSON-RPC 2.0 request.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

// ── Response ──

/// Structured JSON-RPC 2.0 response.
///
/// A response with no id, result or error is the notification sentinel:
/// transports send nothing back for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    /// Returns true when this is a notification sentinel (no body needed).
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.result.is_none() && self.error.is_none()
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// ── Domain types ──

/// One upstream OpenAPI source from the configuration registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDescriptor {
    /// Unique key. Appears in resource URIs and cache file names.
    pub id: String,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

impl ApiDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        ApiDescriptor {
            id: id.into(),
            name: name.into(),
            url: url.into(),
            description: description.into(),
        }
    }
}

/// MCP resource listing entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,
    pub mime_type: String,
    pub description: String,
}

/// Resource content returned from `resources/read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// ── Convenience constructors ──

/// Build a JSON-RPC error response.
pub fn new_error_response(id: Option<Value>, code: i32, message: impl Into<String>) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: None,
        error: Some(RpcError {
            code,
            message: message.into(),
            data: None,
        }),
    }
}

/// Build a JSON-RPC success response.
pub fn new_ok_response(id: Option<Value>, result: Value) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id,
        result: Some(result),
        error: None,
    }
}

/// Build a notification sentinel (empty response, triggers HTTP 202).
pub fn notification_response() -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0".into(),
        id: None,
        result: None,
        error: None,
    }
}

/// Error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// Upstream could not be reached, timed out, or answered non-2xx.
    #[error("fetch failed for {api_id}: {reason}")]
    Fetch {
        api_id: String,
        status: Option<u16>,
        reason: String,
    },
    /// Upstream answered 2xx but the body is not JSON.
    #[error("decode failed for {api_id}: {source}")]
    Decode {
        api_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache write failed for {api_id} at {}: {source}", path.display())]
    CacheWrite {
        api_id: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Only ever logged; lookups fold it into "absent".
    #[error("cache read failed for {api_id}: {reason}")]
    CacheRead { api_id: String, reason: String },
    #[error("Invalid URI format: {uri}. Expected {expected}")]
    InvalidUri { uri: String, expected: String },
    #[error("Unknown API: {0}")]
    UnknownResource(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// JSON-RPC error code a transport should answer with.
    pub fn rpc_code(&self) -> i32 {
        match self {
            McpError::InvalidUri { .. } => ERR_CODE_BAD_PARAMS,
            McpError::UnknownResource(_) => ERR_CODE_RESOURCE_NOT_FOUND,
            _ => ERR_CODE_INTERNAL,
        }
    }
}

// Internal params structs for deserialization.

#[derive(Debug, Deserialize)]
pub(crate) struct ResourceReadParams {
    pub uri: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub client_info: Option<ClientInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ClientInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}
