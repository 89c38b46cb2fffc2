use crate::tiles::cache::CapabilitiesCache;
use crate::tiles::capabilities::{Capabilities, CapabilitiesError};
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "http")]
use once_cell::sync::Lazy;

/// Shared async HTTP client used for capabilities and backend requests
#[cfg(feature = "http")]
pub(crate) static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("wmts-check/", env!("CARGO_PKG_VERSION")))
        .tcp_keepalive(std::time::Duration::from_secs(30))
        .pool_idle_timeout(std::time::Duration::from_secs(90))
        .build()
        .unwrap_or_else(|e| {
            log::warn!("custom HTTP client setup failed ({}), using defaults", e);
            reqwest::Client::new()
        })
});

/// Retrieves the raw capabilities document of a service
#[async_trait]
pub trait CapabilitiesFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, CapabilitiesError>;
}

/// Fetches capabilities over HTTP
#[cfg(feature = "http")]
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher;

#[cfg(feature = "http")]
#[async_trait]
impl CapabilitiesFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, CapabilitiesError> {
        let response = HTTP_CLIENT
            .get(url)
            .send()
            .await
            .map_err(|e| CapabilitiesError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(CapabilitiesError::Transport(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }
        response
            .text()
            .await
            .map_err(|e| CapabilitiesError::Transport(e.to_string()))
    }
}

/// Loads and parses WMTS capabilities, once per URL.
///
/// Cloning the loader shares the underlying cache.
#[derive(Clone)]
pub struct CapabilitiesLoader {
    fetcher: Arc<dyn CapabilitiesFetcher>,
    cache: CapabilitiesCache,
}

impl CapabilitiesLoader {
    pub fn new(fetcher: Arc<dyn CapabilitiesFetcher>) -> Self {
        Self {
            fetcher,
            cache: CapabilitiesCache::new(),
        }
    }

    #[cfg(feature = "http")]
    pub fn http() -> Self {
        Self::new(Arc::new(HttpFetcher))
    }

    pub fn cache(&self) -> &CapabilitiesCache {
        &self.cache
    }

    /// Returns the parsed capabilities at `url`.
    ///
    /// Concurrent calls for the same URL share one fetch. A failure is
    /// reported to every waiting caller and is not remembered.
    pub async fn load(&self, url: &str) -> Result<Arc<Capabilities>, CapabilitiesError> {
        let fetcher = self.fetcher.clone();
        let owned_url = url.to_string();
        let result = self
            .cache
            .get_or_load(url, move || async move {
                let body = fetcher.fetch(&owned_url).await?;
                let caps = Capabilities::parse(&body)?;
                log::info!(
                    "loaded capabilities from {}: {} layers, {} matrix sets",
                    owned_url,
                    caps.layers.len(),
                    caps.tile_matrix_sets.len()
                );
                Ok(Arc::new(caps))
            })
            .await;
        if let Err(e) = &result {
            log::error!("capabilities load from {} failed: {}", url, e);
        }
        result
    }
}
