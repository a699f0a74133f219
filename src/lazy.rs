//! First-use construction of the [`Server`] in a long-lived process.
//!
//! Fetching every specification is slow (network calls), so it happens at
//! most once: concurrent callers queue on an async mutex, re-check after
//! acquiring it, and all receive the same `Arc<Server>`.

use std::sync::{Arc, OnceLock};

use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::Config;
use crate::fetcher::SpecFetcher;
use crate::server::Server;
use crate::types::McpError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Lazily initialized, shared [`Server`].
pub struct LazyServer {
    config: Config,
    fetcher: SpecFetcher,
    init_lock: Mutex<()>,
    ready: OnceLock<Arc<Server>>,
}

impl LazyServer {
    pub fn new(config: Config, fetcher: SpecFetcher) -> Self {
        Self {
            config,
            fetcher,
            init_lock: Mutex::new(()),
            ready: OnceLock::new(),
        }
    }

    /// HTTP-backed fetcher over `config.cache_dir`.
    pub async fn from_config(config: Config) -> Result<Self, McpError> {
        let fetcher = SpecFetcher::http(&config.cache_dir, config.fetch_timeout).await?;
        Ok(Self::new(config, fetcher))
    }

    /// `Initializing` exactly while some caller holds the init lock. A
    /// cancelled initializer drops the lock, which puts the state back to
    /// `Uninitialized`.
    pub fn state(&self) -> InitState {
        if self.ready.get().is_some() {
            InitState::Ready
        } else if self.init_lock.try_lock().is_err() {
            InitState::Initializing
        } else {
            InitState::Uninitialized
        }
    }

    /// Return the server, fetching specifications and building it on the
    /// first call. On failure nothing is published and the next caller
    /// tries again.
    pub async fn get_or_init(&self) -> Result<Arc<Server>, McpError> {
        if let Some(srv) = self.ready.get() {
            return Ok(Arc::clone(srv));
        }

        let _guard = self.init_lock.lock().await;

        // Another caller may have finished while we waited.
        if let Some(srv) = self.ready.get() {
            return Ok(Arc::clone(srv));
        }

        info!(server_name = %self.config.server_name, "initializing MCP server");
        match self.initialize().await {
            Ok(srv) => {
                let srv = Arc::new(srv);
                // Only set while holding the lock, so this cannot race.
                let _ = self.ready.set(Arc::clone(&srv));
                info!("MCP server initialized");
                Ok(srv)
            }
            Err(e) => {
                error!(error = %e, "MCP server initialization failed");
                Err(e)
            }
        }
    }

    async fn initialize(&self) -> Result<Server, McpError> {
        info!(count = self.config.apis.len(), "fetching OpenAPI specifications");
        let specs = self
            .fetcher
            .fetch_all(&self.config.apis, self.config.force_refresh)
            .await?;
        info!(count = specs.len(), "fetched API specifications");

        Ok(Server::builder().config(&self.config).specs(specs).build())
    }
}
