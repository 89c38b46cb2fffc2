use crate::layers::marker::MarkerFeature;
use crate::layers::vector::BBoxFeature;
use crate::tiles::source::TileSourceDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub enum LayerKind {
    /// Background WMTS layer
    Base(TileSourceDescriptor),
    Point(Vec<MarkerFeature>),
    Polygon(Vec<BBoxFeature>),
}

impl LayerKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            LayerKind::Base(_) => "base",
            LayerKind::Point(_) => "point",
            LayerKind::Polygon(_) => "polygon",
        }
    }

    pub fn feature_count(&self) -> usize {
        match self {
            LayerKind::Base(_) => 0,
            LayerKind::Point(markers) => markers.len(),
            LayerKind::Polygon(boxes) => boxes.len(),
        }
    }
}

impl std::fmt::Display for LayerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// A named layer of the view
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    pub title: String,
    pub visible: bool,
    pub z_index: i32,
    pub kind: LayerKind,
}

impl Layer {
    pub fn base(name: impl Into<String>, title: impl Into<String>, source: TileSourceDescriptor) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            visible: false,
            z_index: 0,
            kind: LayerKind::Base(source),
        }
    }

    pub fn points(name: impl Into<String>, markers: Vec<MarkerFeature>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            visible: true,
            z_index: 20,
            kind: LayerKind::Point(markers),
        }
    }

    pub fn polygons(name: impl Into<String>, boxes: Vec<BBoxFeature>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            visible: true,
            z_index: 10,
            kind: LayerKind::Polygon(boxes),
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self.kind, LayerKind::Base(_))
    }

    pub fn source(&self) -> Option<&TileSourceDescriptor> {
        match &self.kind {
            LayerKind::Base(source) => Some(source),
            _ => None,
        }
    }

    pub fn markers(&self) -> Option<&[MarkerFeature]> {
        match &self.kind {
            LayerKind::Point(markers) => Some(markers),
            _ => None,
        }
    }

    pub fn boxes(&self) -> Option<&[BBoxFeature]> {
        match &self.kind {
            LayerKind::Polygon(boxes) => Some(boxes),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bounds::Extent;
    use crate::core::geo::Point;

    #[test]
    fn test_layer_kinds() {
        let points = Layer::points("PointLayer", vec![MarkerFeature::new("m", Point::new(1.0, 2.0))]);
        assert_eq!(points.kind.to_string(), "point");
        assert_eq!(points.markers().map(|m| m.len()), Some(1));
        assert!(points.boxes().is_none());
        assert!(points.visible);

        let boxes = Layer::polygons("BBoxLayer", vec![BBoxFeature::new(Extent::new(0.0, 0.0, 1.0, 1.0))]);
        assert_eq!(boxes.kind.type_name(), "polygon");
        assert_eq!(boxes.kind.feature_count(), 1);
        assert!(boxes.z_index < points.z_index);
        assert!(!boxes.is_base());
    }
}
