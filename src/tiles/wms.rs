use crate::core::bounds::Extent;
use crate::core::constants::TILE_SIZE;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Escaped in query values. Commas stay literal, they separate WMS list items.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b',');

/// WMS 1.3.0 GetMap request for one tile-sized image.
///
/// `gutter` pixels are added on each side of the image, the bbox is used
/// as given.
#[derive(Debug, Clone, PartialEq)]
pub struct GetMapRequest {
    pub base_url: String,
    pub layers: Vec<String>,
    pub crs: String,
    pub bbox: Extent,
    pub width: u32,
    pub height: u32,
    pub gutter: u32,
    /// Image extension without the `image/` prefix
    pub image_format: String,
}

impl GetMapRequest {
    pub fn new(base_url: impl Into<String>, bbox: Extent) -> Self {
        Self {
            base_url: base_url.into(),
            layers: Vec::new(),
            crs: "EPSG:2056".to_string(),
            bbox,
            width: TILE_SIZE,
            height: TILE_SIZE,
            gutter: 0,
            image_format: "png".to_string(),
        }
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = layers.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = crs.into();
        self
    }

    pub fn with_gutter(mut self, gutter: u32) -> Self {
        self.gutter = gutter;
        self
    }

    pub fn transparent(&self) -> bool {
        self.image_format == "png"
    }

    /// Query parameters in request order
    pub fn params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("SERVICE", "WMS".to_string()),
            ("VERSION", "1.3.0".to_string()),
            ("REQUEST", "GetMap".to_string()),
            ("FORMAT", format!("image/{}", self.image_format)),
            ("TRANSPARENT", self.transparent().to_string()),
            ("LAYERS", self.layers.join(",")),
            ("CRS", self.crs.clone()),
            ("STYLES", String::new()),
            ("WIDTH", (self.width + self.gutter * 2).to_string()),
            ("HEIGHT", (self.height + self.gutter * 2).to_string()),
            ("BBOX", self.bbox.to_string()),
        ]
    }

    pub fn url(&self) -> String {
        let query = self
            .params()
            .iter()
            .map(|(key, value)| format!("{}={}", key, utf8_percent_encode(value, QUERY_VALUE)))
            .collect::<Vec<_>>()
            .join("&");
        let separator = if self.base_url.contains('?') {
            if self.base_url.ends_with('?') || self.base_url.ends_with('&') {
                ""
            } else {
                "&"
            }
        } else {
            "?"
        };
        format!("{}{}{}", self.base_url, separator, query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_getmap_url() {
        let request = GetMapRequest::new(
            "https://carto.lausanne.ch/mapserv_proxy?ogcserver=source+for+image%2Fpng",
            Extent::new(2537760.0, 1152240.0, 2538400.0, 1152880.0),
        )
        .with_layers(&["osm_bdcad_couleur_msgroup", "planville_cs_bati_msgroup"]);

        assert_eq!(
            request.url(),
            "https://carto.lausanne.ch/mapserv_proxy?ogcserver=source+for+image%2Fpng&SERVICE=WMS&\
             VERSION=1.3.0&REQUEST=GetMap&FORMAT=image%2Fpng&TRANSPARENT=true&\
             LAYERS=osm_bdcad_couleur_msgroup,planville_cs_bati_msgroup&CRS=EPSG%3A2056&STYLES=&\
             WIDTH=256&HEIGHT=256&BBOX=2537760,1152240,2538400,1152880"
        );
    }

    #[test]
    fn test_gutter_and_format() {
        let mut request = GetMapRequest::new("http://wms", Extent::new(0.0, 0.0, 1.0, 1.0))
            .with_gutter(8);
        request.image_format = "jpeg".to_string();
        let params = request.params();
        assert!(params.contains(&("WIDTH", "272".to_string())));
        assert!(params.contains(&("HEIGHT", "272".to_string())));
        assert!(params.contains(&("TRANSPARENT", "false".to_string())));
        assert!(request.url().starts_with("http://wms?SERVICE=WMS&"));
    }

    #[test]
    fn test_reserved_characters_are_escaped() {
        let request = GetMapRequest::new("http://wms", Extent::new(0.0, 0.0, 1.0, 1.0))
            .with_layers(&["a=b#c", "bâti 50%"])
            .with_crs("urn:ogc:def:crs:EPSG::2056?x&y");
        let url = request.url();
        assert!(url.contains("&LAYERS=a%3Db%23c,b%C3%A2ti%2050%25&"));
        assert!(url.contains("&CRS=urn%3Aogc%3Adef%3Acrs%3AEPSG%3A%3A2056%3Fx%26y&"));
        assert!(url.ends_with("&BBOX=0,0,1,1"));
        assert_eq!(url.matches('#').count(), 0);
    }
}
