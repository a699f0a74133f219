//! `openapi_mcp` — serve remote OpenAPI specifications as MCP resources.
//!
//! Each configured API is fetched once, cached to `{cache_dir}/{id}.json`,
//! and exposed as the resource `{scheme}://api/{id}/openapi` through the
//! MCP `resources/list` and `resources/read` methods.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use openapi_mcp::{Config, LazyServer, http_router};
//!
//! # async fn example() -> Result<(), openapi_mcp::McpError> {
//! let config = Config::from_env()?;
//! let server = Arc::new(LazyServer::from_config(config).await?);
//!
//! // Specifications are fetched on the first MCP request.
//! let router = http_router(server);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod fetcher;
pub mod lazy;
pub mod loader;
pub mod server;
pub mod transport_http;
pub mod transport_stdio;
pub mod types;

// Re-export the most commonly used items at the crate root.
pub use config::{Config, Transport};
pub use fetcher::{CacheLookup, HttpSource, SpecFetcher, SpecSource};
pub use lazy::{InitState, LazyServer};
pub use loader::{load_apis, parse_apis};
pub use server::{Server, ServerBuilder};
pub use transport_http::http_router;
pub use transport_stdio::{serve_lines, serve_stdio};
pub use types::{
    ApiDescriptor, JsonRpcRequest, JsonRpcResponse, McpError, PROTOCOL_VERSION, Resource,
    ResourceContent, RpcError, SpecDocument, SpecSet, new_error_response,
};
