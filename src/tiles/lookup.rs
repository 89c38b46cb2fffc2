//! Backend tile lookup: which tile covers a point at a zoom level.

use crate::core::bounds::Extent;
use crate::core::geo::TileAddress;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "http")]
use crate::core::constants::DEFAULT_BACKEND_TIMEOUT_MS;
#[cfg(feature = "http")]
use crate::tiles::loader::HTTP_CLIENT;
#[cfg(feature = "http")]
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend answered HTTP {0}")]
    Status(u16),
    #[error("backend request timed out")]
    Timeout,
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

/// Answer of `getTileByXY`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileInfo {
    pub zoom: u8,
    pub col: u32,
    pub row: u32,
    #[serde(default)]
    pub wms_url: String,
    pub bbox: Extent,
}

impl TileInfo {
    pub fn address(&self) -> TileAddress {
        TileAddress::new(self.zoom, self.row, self.col)
    }

    pub fn parse(body: &str) -> Result<Self, BackendError> {
        serde_json::from_str(body).map_err(|e| BackendError::Decode(e.to_string()))
    }
}

#[async_trait]
pub trait TileLookup: Send + Sync {
    async fn tile_by_xy(&self, zoom: u8, x: f64, y: f64) -> Result<TileInfo, BackendError>;
}

/// `GET {base}/getTileByXY/{zoom}/{x}/{y}`
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HttpTileLookup {
    base_url: String,
    timeout: Duration,
}

#[cfg(feature = "http")]
impl HttpTileLookup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_millis(DEFAULT_BACKEND_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn request_url(&self, zoom: u8, x: f64, y: f64) -> String {
        format!(
            "{}/getTileByXY/{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            zoom,
            x,
            y
        )
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl TileLookup for HttpTileLookup {
    async fn tile_by_xy(&self, zoom: u8, x: f64, y: f64) -> Result<TileInfo, BackendError> {
        let url = self.request_url(zoom, x, y);
        log::debug!("backend lookup {}", url);
        let response = HTTP_CLIENT
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else {
                    BackendError::Transport(e.to_string())
                }
            })?;
        if !response.status().is_success() {
            return Err(BackendError::Status(response.status().as_u16()));
        }
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        TileInfo::parse(&body)
    }
}
