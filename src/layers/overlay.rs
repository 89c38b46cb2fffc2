//! Marker and bounding box overlays that follow the latest interaction.

use crate::core::bounds::Extent;
use crate::core::geo::Point;
use crate::layers::manager::LayerRegistry;
use crate::layers::marker::MarkerFeature;
use crate::layers::vector::{BBoxFeature, PolygonStyle};

/// What one overlay channel currently shows
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayState<T> {
    Empty,
    Showing(Vec<T>),
}

impl<T> OverlayState<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, OverlayState::Empty)
    }

    pub fn items(&self) -> &[T] {
        match self {
            OverlayState::Empty => &[],
            OverlayState::Showing(items) => items,
        }
    }

    fn show(&mut self, items: Vec<T>, append: bool) {
        match self {
            OverlayState::Showing(current) if append => current.extend(items),
            _ => *self = OverlayState::Showing(items),
        }
    }
}

/// Redraws the marker, bbox and reference overlays through the registry.
///
/// Drawing never fails the session: a missing or mistyped target layer
/// is logged and the redraw skipped.
#[derive(Debug, Clone)]
pub struct OverlaySynchronizer {
    marker_layer: String,
    bbox_layer: String,
    reference_layer: String,
    icon_path: String,
    marker: OverlayState<MarkerFeature>,
    bbox: OverlayState<Extent>,
    references: OverlayState<Extent>,
}

impl OverlaySynchronizer {
    pub fn new(marker_layer: &str, bbox_layer: &str, reference_layer: &str, icon_path: &str) -> Self {
        Self {
            marker_layer: marker_layer.to_string(),
            bbox_layer: bbox_layer.to_string(),
            reference_layer: reference_layer.to_string(),
            icon_path: icon_path.to_string(),
            marker: OverlayState::Empty,
            bbox: OverlayState::Empty,
            references: OverlayState::Empty,
        }
    }

    pub fn marker_layer(&self) -> &str {
        &self.marker_layer
    }

    pub fn bbox_layer(&self) -> &str {
        &self.bbox_layer
    }

    pub fn reference_layer(&self) -> &str {
        &self.reference_layer
    }

    pub fn marker_state(&self) -> &OverlayState<MarkerFeature> {
        &self.marker
    }

    pub fn bbox_state(&self) -> &OverlayState<Extent> {
        &self.bbox
    }

    pub fn reference_state(&self) -> &OverlayState<Extent> {
        &self.references
    }

    /// Creates the empty marker layer the clicks draw into
    pub fn install(&self, registry: &mut LayerRegistry) -> bool {
        match registry.create_or_replace(&self.marker_layer, Vec::<MarkerFeature>::new()) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("cannot install marker layer: {}", e);
                false
            }
        }
    }

    /// Replaces the marker with one at `position`. The marker layer must
    /// already exist.
    pub fn redraw_marker(&mut self, registry: &mut LayerRegistry, position: Point) -> bool {
        match registry.find_by_name(&self.marker_layer) {
            Some(layer) if layer.markers().is_some() => {}
            Some(layer) => {
                log::warn!(
                    "marker layer {} is a {} layer, skipping redraw",
                    self.marker_layer,
                    layer.kind
                );
                return false;
            }
            None => {
                log::warn!("marker layer {} not found, skipping redraw", self.marker_layer);
                return false;
            }
        }

        let marker = MarkerFeature::new("selection", position)
            .with_title(format!("{:.2}, {:.2}", position.x, position.y))
            .with_icon(self.icon_path.clone());
        match registry.create_or_replace(&self.marker_layer, vec![marker.clone()]) {
            Ok(()) => {
                log::debug!("marker redrawn at {:.2}, {:.2}", position.x, position.y);
                self.marker.show(vec![marker], false);
                true
            }
            Err(e) => {
                log::warn!("marker redraw failed: {}", e);
                false
            }
        }
    }

    /// Draws the tile box, replacing the previous one unless `append`
    pub fn redraw_bbox(&mut self, registry: &mut LayerRegistry, bbox: Extent, append: bool) -> bool {
        let feature = BBoxFeature::new(bbox);
        match registry.create_or_append(&self.bbox_layer, vec![feature], append) {
            Ok(()) => {
                log::debug!("bbox redrawn: {}", bbox);
                self.bbox.show(vec![bbox], append);
                true
            }
            Err(e) => {
                log::warn!("bbox redraw failed: {}", e);
                false
            }
        }
    }

    /// Adds static reference boxes (pyramid extent, sample image extent)
    /// to their own layer, keeping earlier ones
    pub fn draw_reference_boxes(&mut self, registry: &mut LayerRegistry, boxes: &[Extent]) -> bool {
        if boxes.is_empty() {
            return true;
        }
        let features: Vec<BBoxFeature> = boxes
            .iter()
            .map(|b| BBoxFeature::new(*b).with_style(PolygonStyle::outline("#191aff", 2.0)))
            .collect();
        match registry.create_or_append(&self.reference_layer, features, true) {
            Ok(()) => {
                self.references.show(boxes.to_vec(), true);
                true
            }
            Err(e) => {
                log::warn!("reference boxes not drawn: {}", e);
                false
            }
        }
    }
}
