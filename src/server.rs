use std::sync::Arc;

use serde_json::{Value, json};

use crate::config::{Config, DEFAULT_SERVER_NAME, DEFAULT_URI_SCHEME};
use crate::types::*;

/// The MCP resource server. A read-only view over a fetched [`SpecSet`];
/// build it with [`ServerBuilder`] and share it behind an `Arc`.
pub struct Server {
    pub(crate) server_name: String,
    pub(crate) server_version: String,
    pub(crate) uri_scheme: String,
    pub(crate) apis: Vec<ApiDescriptor>,
    pub(crate) specs: Arc<SpecSet>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::default()
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn uri_scheme(&self) -> &str {
        &self.uri_scheme
    }

    pub fn specs(&self) -> &SpecSet {
        &self.specs
    }

    /// `{scheme}://api/{api_id}/openapi`
    pub fn resource_uri(&self, api_id: &str) -> String {
        format!("{}://api/{}/openapi", self.uri_scheme, api_id)
    }

    /// One resource per registered API that has a document, in registry order.
    pub fn list_resources(&self) -> Vec<Resource> {
        self.apis
            .iter()
            .filter(|api| self.specs.contains_key(&api.id))
            .map(|api| Resource {
                uri: self.resource_uri(&api.id),
                name: format!("{} - OpenAPI Specification", api.name),
                mime_type: SPEC_MIME_TYPE.into(),
                description: api.description.clone(),
            })
            .collect()
    }

    /// Serialize the document behind `uri` as pretty-printed JSON.
    ///
    /// Fails with [`McpError::InvalidUri`] when `uri` does not have the
    /// `{scheme}://api/{id}/openapi` shape and with
    /// [`McpError::UnknownResource`] when no document exists for `id`.
    pub fn read_resource(&self, uri: &str) -> Result<String, McpError> {
        let api_id = self.parse_uri(uri)?;
        let spec = self
            .specs
            .get(api_id)
            .ok_or_else(|| McpError::UnknownResource(api_id.to_string()))?;
        Ok(serde_json::to_string_pretty(spec)?)
    }

    /// Extract the API id. Segments after `openapi` are ignored.
    fn parse_uri<'a>(&self, uri: &'a str) -> Result<&'a str, McpError> {
        let invalid = || McpError::InvalidUri {
            uri: uri.to_string(),
            expected: format!("{}://api/{{id}}/openapi", self.uri_scheme),
        };

        let prefix = format!("{}://api/", self.uri_scheme);
        let rest = uri.strip_prefix(prefix.as_str()).ok_or_else(invalid)?;

        let mut parts = rest.split('/');
        let api_id = parts.next().unwrap_or_default();
        match parts.next() {
            Some("openapi") => Ok(api_id),
            _ => Err(invalid()),
        }
    }

    /// Route a JSON-RPC request to the appropriate MCP handler.
    pub async fn handle(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        if req.jsonrpc != "2.0" {
            return new_error_response(req.id, ERR_CODE_INVALID_REQ, "jsonrpc must be '2.0'");
        }

        match req.method.as_str() {
            "initialize" => self.handle_initialize(req),
            "ping" => new_ok_response(req.id, json!({})),
            "notifications/initialized" | "notifications/cancelled" => notification_response(),
            "resources/list" => self.handle_resources_list(req),
            "resources/read" => self.handle_resources_read(req),
            _ => new_error_response(
                req.id,
                ERR_CODE_NO_METHOD,
                format!("Method not found: {}", req.method),
            ),
        }
    }

    fn handle_initialize(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        if let Some(params) = &req.params {
            if let Ok(p) = serde_json::from_value::<InitializeParams>(params.clone()) {
                let client_name = p.client_info.as_ref().map_or("", |c| c.name.as_str());
                let client_version = p.client_info.as_ref().map_or("", |c| c.version.as_str());
                tracing::info!(
                    client_name,
                    client_version,
                    protocol_version = ?p.protocol_version,
                    "initialize"
                );
            }
        }

        let result = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "resources": {"subscribe": false, "listChanged": false},
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version,
            },
        });

        new_ok_response(req.id, result)
    }

    fn handle_resources_list(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let result = json!({ "resources": self.list_resources() });
        new_ok_response(req.id, result)
    }

    fn handle_resources_read(&self, req: JsonRpcRequest) -> JsonRpcResponse {
        let params: ResourceReadParams = match req.params.as_ref() {
            Some(p) => match serde_json::from_value(p.clone()) {
                Ok(p) => p,
                Err(e) => {
                    return new_error_response(
                        req.id,
                        ERR_CODE_BAD_PARAMS,
                        format!("invalid params: {}", e),
                    );
                }
            },
            None => {
                return new_error_response(req.id, ERR_CODE_BAD_PARAMS, "params required");
            }
        };

        match self.read_resource(&params.uri) {
            Ok(text) => {
                let content = ResourceContent {
                    uri: params.uri,
                    mime_type: Some(SPEC_MIME_TYPE.into()),
                    text: Some(text),
                };
                new_ok_response(req.id, json!({ "contents": [content] }))
            }
            Err(e) => {
                tracing::warn!(uri = %params.uri, error = %e, "read resource");
                new_error_response(req.id, e.rpc_code(), e.to_string())
            }
        }
    }
}

/// Builder for constructing a [`Server`].
#[derive(Default)]
pub struct ServerBuilder {
    apis: Vec<ApiDescriptor>,
    specs: SpecSet,
    server_name: Option<String>,
    server_version: Option<String>,
    uri_scheme: Option<String>,
}

impl ServerBuilder {
    /// Take registry, name, version and scheme from a [`Config`].
    pub fn config(self, cfg: &Config) -> Self {
        self.apis(cfg.apis.clone())
            .server_info(cfg.server_name.clone(), cfg.server_version.clone())
            .uri_scheme(cfg.uri_scheme.clone())
    }

    /// Add API descriptors. Listing follows the order they are added in.
    pub fn apis(mut self, apis: Vec<ApiDescriptor>) -> Self {
        self.apis.extend(apis);
        self
    }

    /// Add fetched documents.
    pub fn specs(mut self, specs: SpecSet) -> Self {
        self.specs.extend(specs);
        self
    }

    /// Set server name and version.
    pub fn server_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self.server_version = Some(version.into());
        self
    }

    pub fn uri_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.uri_scheme = Some(scheme.into());
        self
    }

    /// Build the server.
    pub fn build(self) -> Server {
        Server {
            server_name: self
                .server_name
                .unwrap_or_else(|| DEFAULT_SERVER_NAME.into()),
            server_version: self
                .server_version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").into()),
            uri_scheme: self.uri_scheme.unwrap_or_else(|| DEFAULT_URI_SCHEME.into()),
            apis: self.apis,
            specs: Arc::new(self.specs),
        }
    }
}
