use crate::core::constants::DEFAULT_MARKER_ICON;
use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Icon marker at the selected point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerFeature {
    pub position: Point,
    pub icon_path: String,
    pub title: String,
    pub id: String,
}

impl MarkerFeature {
    pub fn new(id: impl Into<String>, position: Point) -> Self {
        Self {
            position,
            icon_path: DEFAULT_MARKER_ICON.to_string(),
            title: String::new(),
            id: id.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_icon(mut self, icon_path: impl Into<String>) -> Self {
        self.icon_path = icon_path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_defaults() {
        let marker = MarkerFeature::new("click", Point::new(2538202.0, 1152364.0))
            .with_title("2538202.00, 1152364.00");
        assert_eq!(marker.icon_path, "/gomarker_star_red.png");
        assert_eq!(marker.id, "click");
        assert_eq!(marker.title, "2538202.00, 1152364.00");

        let custom = marker.with_icon("/pin.png");
        assert_eq!(custom.icon_path, "/pin.png");
    }
}
