use crate::core::geo::TileAddress;
use serde::{Deserialize, Serialize};

/// Options used to pick a tile source out of a capabilities document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceRequest {
    pub matrix_set: String,
    pub format: String,
    pub style: String,
    pub cross_origin: String,
}

impl Default for SourceRequest {
    fn default() -> Self {
        Self {
            matrix_set: "EPSG2056".to_string(),
            format: "image/png".to_string(),
            style: "default".to_string(),
            cross_origin: "anonymous".to_string(),
        }
    }
}

/// Everything needed to request tiles of one WMTS layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileSourceDescriptor {
    pub layer: String,
    pub title: String,
    pub matrix_set: String,
    pub format: String,
    pub style: String,
    pub cross_origin: String,
    /// RESTful `ResourceURL` template, when the service publishes one
    pub template: Option<String>,
    /// Dimension identifiers and their default values (e.g. `Time` → `2021`)
    pub dimensions: Vec<(String, String)>,
}

impl TileSourceDescriptor {
    /// Fills the RESTful template for a tile. `None` when the service only
    /// advertises KVP access.
    pub fn tile_url(&self, tile: &TileAddress) -> Option<String> {
        let template = self.template.as_ref()?;
        let mut url = template
            .replace("{TileMatrixSet}", &self.matrix_set)
            .replace("{TileMatrix}", &tile.zoom.to_string())
            .replace("{TileRow}", &tile.row.to_string())
            .replace("{TileCol}", &tile.col.to_string())
            .replace("{Style}", &self.style)
            .replace("{style}", &self.style);
        for (identifier, value) in &self.dimensions {
            url = url.replace(&format!("{{{}}}", identifier), value);
        }
        Some(url)
    }
}

/// Client-side tile URL:
/// `{base}/{layer}/default/{year}/{grid}/{zoom}/{row}/{col}.{ext}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrlTemplate {
    pub base: String,
    pub year: String,
    pub grid_name: String,
    pub extension: String,
}

impl TileUrlTemplate {
    pub fn url(&self, layer: &str, tile: &TileAddress) -> String {
        format!(
            "{}/{}/default/{}/{}/{}/{}/{}.{}",
            self.base.trim_end_matches('/'),
            layer,
            self.year,
            self.grid_name,
            tile.zoom,
            tile.row,
            tile.col,
            self.extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_tile_url() {
        let template = TileUrlTemplate {
            base: "https://tilesmn95.lausanne.ch/tiles/1.0.0/".to_string(),
            year: "2021".to_string(),
            grid_name: "swissgrid_05".to_string(),
            extension: "png".to_string(),
        };
        let url = template.url("fonds_geo_osm_bdcad_couleur", &TileAddress::new(4, 7, 12));
        assert_eq!(
            url,
            "https://tilesmn95.lausanne.ch/tiles/1.0.0/fonds_geo_osm_bdcad_couleur/default/2021/swissgrid_05/4/7/12.png"
        );
    }

    #[test]
    fn test_rest_template() {
        let source = TileSourceDescriptor {
            layer: "orthophotos_ortho_lidar_2016".to_string(),
            title: "Orthophoto 2016".to_string(),
            matrix_set: "EPSG2056".to_string(),
            format: "image/png".to_string(),
            style: "default".to_string(),
            cross_origin: "anonymous".to_string(),
            template: Some(
                "https://tiles/{Style}/{Time}/swissgrid_05/{TileMatrix}/{TileRow}/{TileCol}.png"
                    .to_string(),
            ),
            dimensions: vec![("Time".to_string(), "2016".to_string())],
        };
        assert_eq!(
            source.tile_url(&TileAddress::new(7, 3083, 1838)).unwrap(),
            "https://tiles/default/2016/swissgrid_05/7/3083/1838.png"
        );

        let kvp_only = TileSourceDescriptor {
            template: None,
            ..source
        };
        assert!(kvp_only.tile_url(&TileAddress::new(0, 0, 0)).is_none());
    }
}
