//! Viewer configuration
//!
//! Every field has a default matching the Lausanne WMTS service, so an
//! empty JSON object is a valid configuration. The backend and capabilities
//! URLs can be overridden from the environment.

use crate::core::bounds::Extent;
use crate::core::constants::{
    DEFAULT_BACKEND_TIMEOUT_MS, DEFAULT_MARKER_ICON, LAUSANNE_GARE, LAUSANNE_MAX_EXTENT,
};
use crate::core::geo::Point;
use crate::core::grid::GridDefinition;
use crate::tiles::source::{SourceRequest, TileUrlTemplate};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_BACKEND_URL: &str = "WMTS_CHECK_BACKEND_URL";
pub const ENV_CAPABILITIES_URL: &str = "WMTS_CHECK_CAPABILITIES_URL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Remote services the viewer talks to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub capabilities_url: String,
    pub backend_url: String,
    pub backend_timeout_ms: u64,
    /// WMS endpoint used when the backend returns no `wms_url`
    pub wms_url: String,
    pub wms_layers: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            capabilities_url: "https://tilesmn95.lausanne.ch/tiles/1.0.0/LausanneWMTS.xml".to_string(),
            backend_url: "http://localhost:8000".to_string(),
            backend_timeout_ms: DEFAULT_BACKEND_TIMEOUT_MS,
            wms_url: "https://carto.lausanne.ch/mapserv_proxy?ogcserver=source+for+image%2Fpng"
                .to_string(),
            wms_layers: [
                "osm_bdcad_couleur_msgroup",
                "planville_cs_autres_msgroup",
                "planville_cs_bati_pol_sout",
                "planville_marquage_msgroup",
                "planville_od_objets_msgroup",
                "planville_arbres_goeland_msgroup",
                "planville_cs_bati_msgroup",
                "planville_od_labels_msgroup",
            ]
            .iter()
            .map(|l| l.to_string())
            .collect(),
        }
    }
}

/// Parts of the static tile URL composed for the tile panel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileUrlConfig {
    pub base_url: String,
    pub year: String,
    pub grid_name: String,
    pub extension: String,
}

impl Default for TileUrlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://tilesmn95.lausanne.ch/tiles/1.0.0".to_string(),
            year: "2021".to_string(),
            grid_name: "swissgrid_05".to_string(),
            extension: "png".to_string(),
        }
    }
}

impl TileUrlConfig {
    pub fn template(&self) -> TileUrlTemplate {
        TileUrlTemplate {
            base: self.base_url.clone(),
            year: self.year.clone(),
            grid_name: self.grid_name.clone(),
            extension: self.extension.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseLayerConfig {
    pub name: String,
    pub title: String,
}

impl BaseLayerConfig {
    pub fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewOptions {
    pub center: [f64; 2],
    pub zoom: u8,
    /// CRS of the stored features and the tile grid
    pub data_crs: String,
    /// CRS of the pointer positions
    pub display_crs: String,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            center: LAUSANNE_GARE,
            zoom: 4,
            data_crs: "EPSG:2056".to_string(),
            display_crs: "EPSG:2056".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub marker_layer: String,
    pub bbox_layer: String,
    pub reference_layer: String,
    pub marker_icon: String,
    /// Boxes drawn once at construction, e.g. the pyramid extent
    pub reference_boxes: Vec<Extent>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let [minx, miny, maxx, maxy] = LAUSANNE_MAX_EXTENT;
        Self {
            marker_layer: "PointLayer".to_string(),
            bbox_layer: "BBoxLayer".to_string(),
            reference_layer: "ReferenceLayer".to_string(),
            marker_icon: DEFAULT_MARKER_ICON.to_string(),
            reference_boxes: vec![
                Extent::new(minx, miny, maxx, maxy),
                Extent::new(2_539_000.0, 1_154_000.0, 2_540_000.0, 1_155_000.0),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub services: ServiceConfig,
    pub tiles: TileUrlConfig,
    pub source: SourceRequest,
    pub base_layers: Vec<BaseLayerConfig>,
    pub default_base_layer: String,
    pub view: ViewOptions,
    pub overlays: OverlayConfig,
    pub grid: GridDefinition,
    /// Drop lookup answers older than the last one applied
    pub discard_stale_lookups: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            services: ServiceConfig::default(),
            tiles: TileUrlConfig::default(),
            source: SourceRequest::default(),
            base_layers: vec![
                BaseLayerConfig::new("orthophotos_ortho_lidar_2016", "Orthophoto 2016 (Lausanne)"),
                BaseLayerConfig::new("fonds_geo_osm_bdcad_gris", "Fond cadastral (Lausanne)"),
                BaseLayerConfig::new("fonds_geo_osm_bdcad_couleur", "Plan ville (Lausanne)"),
            ],
            default_base_layer: "fonds_geo_osm_bdcad_couleur".to_string(),
            view: ViewOptions::default(),
            overlays: OverlayConfig::default(),
            grid: GridDefinition::default(),
            discard_stale_lookups: false,
        }
    }
}

impl ViewerConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: ViewerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Applies `WMTS_CHECK_BACKEND_URL` and `WMTS_CHECK_CAPABILITIES_URL`
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_BACKEND_URL).filter(|v| !v.is_empty()) {
            log::info!("backend url overridden to {}", url);
            self.services.backend_url = url;
        }
        if let Some(url) = lookup(ENV_CAPABILITIES_URL).filter(|v| !v.is_empty()) {
            log::info!("capabilities url overridden to {}", url);
            self.services.capabilities_url = url;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_layers.is_empty() {
            return Err(ConfigError::Invalid("no base layer configured".to_string()));
        }
        if !self
            .base_layers
            .iter()
            .any(|l| l.name == self.default_base_layer)
        {
            return Err(ConfigError::Invalid(format!(
                "default base layer '{}' is not in base_layers",
                self.default_base_layer
            )));
        }
        let names = [
            &self.overlays.marker_layer,
            &self.overlays.bbox_layer,
            &self.overlays.reference_layer,
        ];
        for (i, name) in names.iter().enumerate() {
            if names[i + 1..].contains(name) || self.base_layers.iter().any(|l| &&l.name == name) {
                return Err(ConfigError::Invalid(format!("layer name '{}' is used twice", name)));
            }
        }
        if self.services.backend_timeout_ms == 0 {
            return Err(ConfigError::Invalid("backend timeout must be positive".to_string()));
        }
        Ok(())
    }

    pub fn initial_center(&self) -> Point {
        Point::from(self.view.center)
    }

    pub fn backend_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.services.backend_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.base_layers.len(), 3);
        assert_eq!(config.default_base_layer, "fonds_geo_osm_bdcad_couleur");
        assert_eq!(config.services.backend_timeout_ms, 10_000);
        assert_eq!(config.grid.name, "swissgrid_05");
        assert_eq!(config.source.matrix_set, "EPSG2056");
        assert!(!config.discard_stale_lookups);
    }

    #[test]
    fn test_partial_json() {
        let config = ViewerConfig::from_json(
            r#"{
                "services": {"backend_url": "http://backend:9000"},
                "view": {"zoom": 6},
                "discard_stale_lookups": true
            }"#,
        )
        .unwrap();
        assert_eq!(config.services.backend_url, "http://backend:9000");
        assert_eq!(
            config.services.capabilities_url,
            "https://tilesmn95.lausanne.ch/tiles/1.0.0/LausanneWMTS.xml"
        );
        assert_eq!(config.view.zoom, 6);
        assert_eq!(config.view.center, [2537968.5, 1152088.0]);
        assert!(config.discard_stale_lookups);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(matches!(
            ViewerConfig::from_json(r#"{"default_base_layer": "nope"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json(r#"{"overlays": {"bbox_layer": "PointLayer"}}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ViewerConfig::from_json(r#"{"view": {"zoom": "four"}}"#),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ViewerConfig::from_file("/nonexistent/wmts-check.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let config = ViewerConfig::default().with_overrides(|key| match key {
            ENV_BACKEND_URL => Some("http://other:8000".to_string()),
            ENV_CAPABILITIES_URL => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.services.backend_url, "http://other:8000");
        assert_eq!(
            config.services.capabilities_url,
            ServiceConfig::default().capabilities_url
        );
    }
}
