//! Fetching and caching of OpenAPI specifications.
//!
//! Documents come from a [`SpecSource`] (HTTP in production) and are
//! persisted to `{cache_dir}/{api_id}.json` after every successful fetch.
//! Cache entries are never deleted here; a missing or corrupt entry reads
//! as absent.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_FETCH_TIMEOUT;
use crate::types::{ApiDescriptor, McpError, SpecDocument, SpecSet};

/// Where raw specification bodies come from.
#[async_trait]
pub trait SpecSource: Send + Sync {
    /// Fetch the body at `url`. Transport failures and non-2xx statuses are
    /// [`McpError::Fetch`].
    async fn get(&self, api_id: &str, url: &str) -> Result<Vec<u8>, McpError>;
}

/// [`SpecSource`] backed by a `reqwest` client with a request timeout.
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Result<Self, McpError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, McpError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("openapi-mcp/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| McpError::Config(format!("build http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SpecSource for HttpSource {
    async fn get(&self, api_id: &str, url: &str) -> Result<Vec<u8>, McpError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(api_id, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(McpError::Fetch {
                api_id: api_id.to_string(),
                status: Some(status.as_u16()),
                reason: format!("{} returned {}", url, status),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(api_id, &e))?;
        debug!(api_id, url, bytes = body.len(), "fetched spec body");
        Ok(body.to_vec())
    }
}

fn transport_error(api_id: &str, err: &reqwest::Error) -> McpError {
    let reason = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        err.to_string()
    };
    McpError::Fetch {
        api_id: api_id.to_string(),
        status: err.status().map(|s| s.as_u16()),
        reason,
    }
}

/// Outcome of reading one cache entry. Callers usually want
/// [`SpecFetcher::load_cached`], which folds everything but `Hit` to `None`.
#[derive(Debug)]
pub enum CacheLookup {
    Hit(SpecDocument),
    Missing,
    Unreadable(io::Error),
    Corrupt(serde_json::Error),
}

/// Cache-first fetcher for OpenAPI specifications.
pub struct SpecFetcher {
    cache_dir: PathBuf,
    source: Arc<dyn SpecSource>,
}

impl SpecFetcher {
    /// Create a fetcher, creating `cache_dir` (and parents) if needed.
    pub async fn new(
        cache_dir: impl Into<PathBuf>,
        source: Arc<dyn SpecSource>,
    ) -> Result<Self, McpError> {
        let cache_dir = cache_dir.into();
        tokio::fs::create_dir_all(&cache_dir).await?;
        Ok(Self { cache_dir, source })
    }

    /// Fetcher over HTTP with the given request timeout.
    pub async fn http(cache_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self, McpError> {
        let source = HttpSource::with_timeout(timeout)?;
        Self::new(cache_dir, Arc::new(source)).await
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache file for an API: `{cache_dir}/{api_id}.json`.
    pub fn cache_path(&self, api_id: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", api_id))
    }

    /// Fetch a spec from the network and overwrite its cache entry.
    pub async fn fetch_one(&self, api_id: &str, url: &str) -> Result<SpecDocument, McpError> {
        info!(api_id, url, "fetching OpenAPI spec");

        let body = self.source.get(api_id, url).await?;
        let spec: SpecDocument =
            serde_json::from_slice(&body).map_err(|source| McpError::Decode {
                api_id: api_id.to_string(),
                source,
            })?;

        let path = self.write_cache(api_id, &spec).await?;
        info!(api_id, path = %path.display(), "cached OpenAPI spec");
        Ok(spec)
    }

    /// Read the cache entry for `api_id`, telling apart why it is unusable.
    pub async fn lookup_cache(&self, api_id: &str) -> CacheLookup {
        let path = self.cache_path(api_id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(spec) => CacheLookup::Hit(spec),
                Err(e) => CacheLookup::Corrupt(e),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => CacheLookup::Missing,
            Err(e) => CacheLookup::Unreadable(e),
        }
    }

    /// Cached spec for `api_id`, or `None` if missing, unreadable or corrupt.
    pub async fn load_cached(&self, api_id: &str) -> Option<SpecDocument> {
        let reason = match self.lookup_cache(api_id).await {
            CacheLookup::Hit(spec) => return Some(spec),
            CacheLookup::Missing => {
                debug!(api_id, "no cached spec");
                return None;
            }
            CacheLookup::Unreadable(e) => format!("unreadable: {}", e),
            CacheLookup::Corrupt(e) => format!("invalid JSON: {}", e),
        };

        let err = McpError::CacheRead {
            api_id: api_id.to_string(),
            reason,
        };
        error!(
            api_id,
            path = %self.cache_path(api_id).display(),
            error = %err,
            "error loading cached spec"
        );
        None
    }

    /// Cache-first lookup: use the cached copy when allowed and present,
    /// otherwise fetch.
    pub async fn get_one(
        &self,
        api_id: &str,
        url: &str,
        prefer_cache: bool,
    ) -> Result<SpecDocument, McpError> {
        if prefer_cache {
            if let Some(cached) = self.load_cached(api_id).await {
                info!(api_id, "using cached spec");
                return Ok(cached);
            }
        }

        self.fetch_one(api_id, url).await
    }

    /// Resolve every API in `apis`.
    ///
    /// A failed lookup falls back to whatever is cached for that API. If
    /// nothing is cached the error is returned and the whole batch is
    /// dropped.
    pub async fn fetch_all(
        &self,
        apis: &[ApiDescriptor],
        force_refresh: bool,
    ) -> Result<SpecSet, McpError> {
        let mut specs = SpecSet::with_capacity(apis.len());

        for api in apis {
            match self.get_one(&api.id, &api.url, !force_refresh).await {
                Ok(spec) => {
                    specs.insert(api.id.clone(), spec);
                }
                Err(err) => {
                    error!(api_id = %api.id, error = %err, "failed to fetch spec");
                    match self.load_cached(&api.id).await {
                        Some(cached) => {
                            warn!(api_id = %api.id, "using cached spec after fetch failure");
                            specs.insert(api.id.clone(), cached);
                        }
                        None => return Err(err),
                    }
                }
            }
        }

        Ok(specs)
    }

    /// Write through a temp file so a reader never sees half an entry.
    async fn write_cache(&self, api_id: &str, spec: &SpecDocument) -> Result<PathBuf, McpError> {
        let path = self.cache_path(api_id);
        let tmp_path = path.with_extension("json.tmp");
        let cache_err = |source: io::Error| McpError::CacheWrite {
            api_id: api_id.to_string(),
            path: path.clone(),
            source,
        };

        let json = serde_json::to_vec_pretty(spec).map_err(|e| cache_err(e.into()))?;
        tokio::fs::write(&tmp_path, &json).await.map_err(cache_err)?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(cache_err(e));
        }

        Ok(path)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::{MockReply, MockSource};
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    const CLAIMS_URL: &str = "https://example.com/benefits-claims/openapi.json";
    const DOCS_URL: &str = "https://example.com/benefits-documents/openapi.json";

    fn sample_spec() -> Value {
        json!({
            "openapi": "3.0.1",
            "info": {"title": "Test API", "version": "v1"},
            "paths": {},
        })
    }

    fn apis() -> Vec<ApiDescriptor> {
        vec![
            ApiDescriptor::new("benefits-claims-v2", "Benefits Claims", CLAIMS_URL, "claims"),
            ApiDescriptor::new("benefits-documents-v1", "Benefits Documents", DOCS_URL, "docs"),
        ]
    }

    async fn fetcher_with(source: MockSource) -> (SpecFetcher, Arc<MockSource>, TempDir) {
        let dir = TempDir::new().unwrap();
        let source = Arc::new(source);
        let fetcher = SpecFetcher::new(dir.path().join("cache"), source.clone())
            .await
            .unwrap();
        (fetcher, source, dir)
    }

    fn seed_cache(fetcher: &SpecFetcher, api_id: &str, spec: &Value) {
        std::fs::write(fetcher.cache_path(api_id), serde_json::to_vec(spec).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_new_creates_nested_cache_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b").join("cache");
        let source: Arc<dyn SpecSource> = Arc::new(MockSource::new());

        let fetcher = SpecFetcher::new(&nested, source.clone()).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(fetcher.cache_dir(), nested.as_path());

        // Second construction over an existing directory is fine.
        SpecFetcher::new(&nested, source).await.unwrap();
    }

    #[tokio::test]
    async fn test_cache_path() {
        let (fetcher, _, _dir) = fetcher_with(MockSource::new()).await;
        let path = fetcher.cache_path("test-api");
        assert_eq!(path.file_name().unwrap(), "test-api.json");
        assert_eq!(path.parent().unwrap(), fetcher.cache_dir());
    }

    #[tokio::test]
    async fn test_fetch_one_success_writes_cache() {
        let (fetcher, source, _dir) =
            fetcher_with(MockSource::new().json(CLAIMS_URL, &sample_spec())).await;

        let spec = fetcher.fetch_one("test-api", CLAIMS_URL).await.unwrap();
        assert_eq!(spec, sample_spec());
        assert_eq!(source.calls(), 1);

        let on_disk: Value =
            serde_json::from_slice(&std::fs::read(fetcher.cache_path("test-api")).unwrap())
                .unwrap();
        assert_eq!(on_disk, sample_spec());
        assert!(!fetcher.cache_path("test-api").with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn test_fetch_one_overwrites_existing_entry() {
        let fresh = json!({"openapi": "3.1.0", "info": {"title": "fresh"}});
        let (fetcher, _, _dir) = fetcher_with(MockSource::new().json(CLAIMS_URL, &fresh)).await;
        seed_cache(&fetcher, "test-api", &sample_spec());

        fetcher.fetch_one("test-api", CLAIMS_URL).await.unwrap();
        assert_eq!(fetcher.load_cached("test-api").await, Some(fresh));
    }

    #[tokio::test]
    async fn test_fetch_one_bad_status() {
        let (fetcher, _, _dir) =
            fetcher_with(MockSource::new().reply(CLAIMS_URL, MockReply::Status(503))).await;

        let err = fetcher.fetch_one("test-api", CLAIMS_URL).await.unwrap_err();
        match err {
            McpError::Fetch { api_id, status, .. } => {
                assert_eq!(api_id, "test-api");
                assert_eq!(status, Some(503));
            }
            other => panic!("expected Fetch error, got {other:?}"),
        }
        assert!(!fetcher.cache_path("test-api").exists());
    }

    #[tokio::test]
    async fn test_fetch_one_decode_error() {
        let (fetcher, _, _dir) = fetcher_with(
            MockSource::new().reply(CLAIMS_URL, MockReply::Body(b"<html>oops</html>".to_vec())),
        )
        .await;

        let err = fetcher.fetch_one("test-api", CLAIMS_URL).await.unwrap_err();
        assert!(matches!(err, McpError::Decode { .. }));
        assert!(!fetcher.cache_path("test-api").exists());
    }

    #[tokio::test]
    async fn test_fetch_one_cache_write_error_propagates() {
        let (fetcher, _, _dir) =
            fetcher_with(MockSource::new().json(CLAIMS_URL, &sample_spec())).await;

        // Replace the cache directory with a plain file.
        std::fs::remove_dir_all(fetcher.cache_dir()).unwrap();
        std::fs::write(fetcher.cache_dir(), b"not a directory").unwrap();

        let err = fetcher.fetch_one("test-api", CLAIMS_URL).await.unwrap_err();
        assert!(matches!(err, McpError::CacheWrite { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn test_load_cached_exists() {
        let (fetcher, _, _dir) = fetcher_with(MockSource::new()).await;
        seed_cache(&fetcher, "test-api", &sample_spec());

        assert_eq!(fetcher.load_cached("test-api").await, Some(sample_spec()));
    }

    #[tokio::test]
    async fn test_load_cached_missing() {
        let (fetcher, _, _dir) = fetcher_with(MockSource::new()).await;
        assert!(matches!(
            fetcher.lookup_cache("nonexistent-api").await,
            CacheLookup::Missing
        ));
        assert_eq!(fetcher.load_cached("nonexistent-api").await, None);
    }

    #[tokio::test]
    async fn test_load_cached_invalid_json() {
        let (fetcher, _, _dir) = fetcher_with(MockSource::new()).await;
        std::fs::write(fetcher.cache_path("test-api"), "invalid json").unwrap();

        assert!(matches!(
            fetcher.lookup_cache("test-api").await,
            CacheLookup::Corrupt(_)
        ));
        assert_eq!(fetcher.load_cached("test-api").await, None);
    }

    #[tokio::test]
    async fn test_load_cached_unreadable() {
        let (fetcher, _, _dir) = fetcher_with(MockSource::new()).await;
        // A directory where the file should be cannot be read as one.
        std::fs::create_dir(fetcher.cache_path("test-api")).unwrap();

        assert!(matches!(
            fetcher.lookup_cache("test-api").await,
            CacheLookup::Unreadable(_)
        ));
        assert_eq!(fetcher.load_cached("test-api").await, None);
    }

    #[tokio::test]
    async fn test_load_cached_idempotent() {
        let (fetcher, _, _dir) = fetcher_with(MockSource::new()).await;
        seed_cache(&fetcher, "test-api", &sample_spec());

        let first = fetcher.load_cached("test-api").await;
        let second = fetcher.load_cached("test-api").await;
        assert_eq!(first, second);
        assert_eq!(
            fetcher.load_cached("absent").await,
            fetcher.load_cached("absent").await
        );
    }

    #[tokio::test]
    async fn test_get_one_prefers_cache() {
        let (fetcher, source, _dir) = fetcher_with(MockSource::new()).await;
        seed_cache(&fetcher, "test-api", &sample_spec());

        let spec = fetcher.get_one("test-api", CLAIMS_URL, true).await.unwrap();
        assert_eq!(spec, sample_spec());
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_get_one_cache_miss_fetches() {
        let (fetcher, source, _dir) =
            fetcher_with(MockSource::new().json(CLAIMS_URL, &sample_spec())).await;

        let spec = fetcher.get_one("test-api", CLAIMS_URL, true).await.unwrap();
        assert_eq!(spec, sample_spec());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_get_one_without_cache() {
        let fresh = json!({"openapi": "3.1.0"});
        let (fetcher, source, _dir) = fetcher_with(MockSource::new().json(CLAIMS_URL, &fresh)).await;
        seed_cache(&fetcher, "test-api", &sample_spec());

        let spec = fetcher.get_one("test-api", CLAIMS_URL, false).await.unwrap();
        assert_eq!(spec, fresh);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_fetch_all_success() {
        let (fetcher, _, _dir) = fetcher_with(
            MockSource::new()
                .json(CLAIMS_URL, &sample_spec())
                .json(DOCS_URL, &sample_spec()),
        )
        .await;

        let specs = fetcher.fetch_all(&apis(), false).await.unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs["benefits-claims-v2"], sample_spec());
        assert_eq!(specs["benefits-documents-v1"], sample_spec());
    }

    #[tokio::test]
    async fn test_fetch_all_falls_back_to_cache() {
        let cached = json!({"openapi": "3.0.0", "info": {"title": "cached claims"}});
        let (fetcher, _, _dir) = fetcher_with(
            MockSource::new()
                .reply(CLAIMS_URL, MockReply::Unreachable)
                .json(DOCS_URL, &sample_spec()),
        )
        .await;
        seed_cache(&fetcher, "benefits-claims-v2", &cached);

        // Network-first: the claims fetch fails and the cached copy is used.
        let specs = fetcher.fetch_all(&apis(), true).await.unwrap();
        assert_eq!(specs["benefits-claims-v2"], cached);
        assert_eq!(specs["benefits-documents-v1"], sample_spec());
    }

    #[tokio::test]
    async fn test_fetch_all_cold_failure_aborts_batch() {
        let (fetcher, _, _dir) = fetcher_with(
            MockSource::new()
                .json(CLAIMS_URL, &sample_spec())
                .reply(DOCS_URL, MockReply::Status(500)),
        )
        .await;

        let err = fetcher.fetch_all(&apis(), false).await.unwrap_err();
        match err {
            McpError::Fetch { api_id, status, .. } => {
                assert_eq!(api_id, "benefits-documents-v1");
                assert_eq!(status, Some(500));
            }
            other => panic!("expected Fetch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_decode_failure_with_corrupt_cache_aborts() {
        let (fetcher, _, _dir) = fetcher_with(
            MockSource::new()
                .json(CLAIMS_URL, &sample_spec())
                .reply(DOCS_URL, MockReply::Body(b"not json".to_vec())),
        )
        .await;
        std::fs::write(fetcher.cache_path("benefits-documents-v1"), "{broken").unwrap();

        let err = fetcher.fetch_all(&apis(), false).await.unwrap_err();
        assert!(matches!(err, McpError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_http_source_success() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/openapi.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_spec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let fetcher = SpecFetcher::http(dir.path(), Duration::from_secs(5))
            .await
            .unwrap();
        let url = format!("{}/openapi.json", server.uri());

        let spec = fetcher.fetch_one("test-api", &url).await.unwrap();
        assert_eq!(spec, sample_spec());
        assert_eq!(fetcher.load_cached("test-api").await, Some(sample_spec()));
    }

    #[tokio::test]
    async fn test_http_source_not_found() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpSource::new().unwrap();
        let err = source
            .get("test-api", &format!("{}/missing.json", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::Fetch { status: Some(404), .. }));
    }

    #[tokio::test]
    async fn test_http_source_timeout() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_spec())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let source = HttpSource::with_timeout(Duration::from_millis(100)).unwrap();
        let err = source
            .get("test-api", &format!("{}/slow.json", server.uri()))
            .await
            .unwrap_err();
        match err {
            McpError::Fetch { reason, .. } => assert!(reason.contains("timed out")),
            other => panic!("expected Fetch error, got {other:?}"),
        }
    }
}
