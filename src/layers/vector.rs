use crate::core::bounds::Extent;
use serde::{Deserialize, Serialize};

/// Fill and stroke of a drawn box
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolygonStyle {
    pub fill_color: String,
    pub stroke_color: String,
    pub stroke_width: f32,
}

impl Default for PolygonStyle {
    fn default() -> Self {
        Self {
            fill_color: "rgba(255, 0, 0, 0.8)".to_string(),
            stroke_color: "#191aff".to_string(),
            stroke_width: 5.0,
        }
    }
}

impl PolygonStyle {
    /// Outline only, for reference extents drawn under the tile box
    pub fn outline(stroke_color: impl Into<String>, stroke_width: f32) -> Self {
        Self {
            fill_color: "rgba(0, 0, 0, 0)".to_string(),
            stroke_color: stroke_color.into(),
            stroke_width,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BBoxFeature {
    pub bbox: Extent,
    #[serde(default)]
    pub style: PolygonStyle,
}

impl BBoxFeature {
    pub fn new(bbox: Extent) -> Self {
        Self {
            bbox,
            style: PolygonStyle::default(),
        }
    }

    pub fn with_style(mut self, style: PolygonStyle) -> Self {
        self.style = style;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_feature_json() {
        let feature: BBoxFeature =
            serde_json::from_str(r#"{"bbox":[2539000,1154000,2540000,1155000]}"#).unwrap();
        assert_eq!(feature.bbox, Extent::new(2539000.0, 1154000.0, 2540000.0, 1155000.0));
        assert_eq!(feature.style, PolygonStyle::default());
        assert_eq!(feature.style.stroke_width, 5.0);
    }
}
