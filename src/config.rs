//! Runtime configuration, read from the environment.
//!
//! Every setting has a default so the server starts with no environment at
//! all. [`Config::from_lookup`] takes the variable source as a closure so
//! tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::loader;
use crate::types::{ApiDescriptor, McpError};

pub const DEFAULT_SERVER_NAME: &str = "openapi-mcp";
pub const DEFAULT_URI_SCHEME: &str = "openapi";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PORT: u16 = 8080;

/// Which transport the binary serves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Http,
    Stdio,
}

impl FromStr for Transport {
    type Err = McpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "stdio" => Ok(Transport::Stdio),
            other => Err(McpError::Config(format!(
                "TRANSPORT must be \"http\" or \"stdio\", got \"{}\"",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub env: String,
    pub debug: bool,
    pub server_name: String,
    pub server_version: String,
    pub uri_scheme: String,
    pub cache_dir: PathBuf,
    /// Ordered registry of upstream sources.
    pub apis: Vec<ApiDescriptor>,
    pub fetch_timeout: Duration,
    /// Go to the network first at startup instead of trusting the cache.
    pub force_refresh: bool,
    pub transport: Transport,
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            env: "local".into(),
            debug: false,
            server_name: DEFAULT_SERVER_NAME.into(),
            server_version: env!("CARGO_PKG_VERSION").into(),
            uri_scheme: DEFAULT_URI_SCHEME.into(),
            cache_dir: default_cache_dir("local"),
            apis: default_apis(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            force_refresh: false,
            transport: Transport::Http,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Build from process environment variables.
    pub fn from_env() -> Result<Self, McpError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, McpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Config::default();

        if let Some(env) = lookup("ENV") {
            cfg.env = env;
        }
        if let Some(v) = lookup("DEBUG") {
            cfg.debug = parse_bool("DEBUG", &v)?;
        }
        if let Some(name) = lookup("SERVER_NAME") {
            cfg.server_name = name;
        }
        if let Some(scheme) = lookup("URI_SCHEME") {
            cfg.uri_scheme = parse_scheme(&scheme)?;
        }
        cfg.cache_dir = match lookup("CACHE_DIR") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => default_cache_dir(&cfg.env),
        };
        if let Some(path) = lookup("APIS_FILE") {
            cfg.apis = loader::load_apis(&path)?;
        }
        if let Some(v) = lookup("FETCH_TIMEOUT_SECS") {
            let secs: u64 = v.trim().parse().map_err(|_| {
                McpError::Config(format!("FETCH_TIMEOUT_SECS must be a whole number, got \"{}\"", v))
            })?;
            if secs == 0 {
                return Err(McpError::Config("FETCH_TIMEOUT_SECS must be at least 1".into()));
            }
            cfg.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(v) = lookup("FORCE_REFRESH") {
            cfg.force_refresh = parse_bool("FORCE_REFRESH", &v)?;
        }
        if let Some(v) = lookup("TRANSPORT") {
            cfg.transport = v.parse()?;
        }
        if let Some(v) = lookup("PORT") {
            cfg.port = v
                .trim()
                .parse()
                .map_err(|_| McpError::Config(format!("PORT must be a port number, got \"{}\"", v)))?;
        }

        Ok(cfg)
    }
}

/// The two VA Lighthouse benefits APIs served when no `APIS_FILE` is given.
pub fn default_apis() -> Vec<ApiDescriptor> {
    vec![
        ApiDescriptor::new(
            "benefits-claims-v2",
            "Benefits Claims API v2",
            "https://api.va.gov/internal/docs/benefits-claims/v2/openapi.json",
            "Submit and track disability compensation claims, intent to file, and power of attorney.",
        ),
        ApiDescriptor::new(
            "benefits-documents-v1",
            "Benefits Documents API v1",
            "https://api.va.gov/internal/docs/benefits-documents/v1/openapi.json",
            "Upload and retrieve supporting documents for benefits claims.",
        ),
    ]
}

/// Local runs cache next to the working directory; anywhere else only the
/// temp dir is assumed writable.
fn default_cache_dir(env: &str) -> PathBuf {
    if env == "local" {
        PathBuf::from("cache")
    } else {
        std::env::temp_dir().join("openapi-mcp-cache")
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, McpError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "" | "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err(McpError::Config(format!(
            "{} must be a boolean, got \"{}\"",
            key, value
        ))),
    }
}

fn parse_scheme(value: &str) -> Result<String, McpError> {
    let scheme = value.trim().trim_end_matches("://");
    let valid = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(McpError::Config(format!("invalid URI_SCHEME \"{}\"", value)));
    }
    Ok(scheme.to_string())
}
