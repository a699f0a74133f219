use std::process::ExitCode;
use std::sync::Arc;

use openapi_mcp::{Config, LazyServer, McpError, Transport, http_router, serve_stdio};

fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .json()
        // stdout belongs to the stdio transport.
        .with_writer(std::io::stderr)
        .init();
}

async fn run(config: Config) -> Result<(), McpError> {
    let transport = config.transport;
    let port = config.port;
    let server = Arc::new(LazyServer::from_config(config).await?);

    match transport {
        Transport::Stdio => {
            // One client per process: fetch up front and fail fast.
            let srv = server.get_or_init().await?;
            tracing::info!("starting MCP server with stdio transport");
            serve_stdio(&srv).await
        }
        Transport::Http => {
            let addr = format!("0.0.0.0:{}", port);
            tracing::info!(addr = %addr, "starting MCP server with HTTP transport");
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, http_router(server)).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            tracing::error!(error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(config.debug);

    let server_name = config.server_name.clone();
    tracing::info!(server_name = %server_name, cache_dir = %config.cache_dir.display(), "starting");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(server_name = %server_name, error = %e, "error running MCP server");
            ExitCode::FAILURE
        }
    }
}
