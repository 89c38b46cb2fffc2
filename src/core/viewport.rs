use crate::core::bounds::Extent;
use crate::core::constants::ZOOM_SNAP_EPSILON;
use crate::core::geo::Point;
use serde::{Deserialize, Serialize};

/// Current view of the map: center in data coordinates and a continuous zoom
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    center: Point,
    zoom: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    /// Centers are kept within these bounds
    max_extent: Option<Extent>,
}

impl View {
    pub fn new(center: Point, zoom: f64, max_zoom: f64) -> Self {
        let max_zoom = max_zoom.max(0.0);
        Self {
            center,
            zoom: zoom.clamp(0.0, max_zoom),
            min_zoom: 0.0,
            max_zoom,
            max_extent: None,
        }
    }

    pub fn with_max_extent(mut self, extent: Extent) -> Self {
        self.max_extent = Some(extent);
        self.center = self.clamp_center(self.center);
        self
    }

    pub fn center(&self) -> Point {
        self.center
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn max_extent(&self) -> Option<&Extent> {
        self.max_extent.as_ref()
    }

    /// Zoom rounded to the nearest level, as shown in the zoom selector
    pub fn rounded_zoom(&self) -> u8 {
        self.zoom.round().clamp(self.min_zoom, self.max_zoom) as u8
    }

    pub fn is_zoom_snapped(&self) -> bool {
        (self.zoom - self.zoom.round()).abs() <= ZOOM_SNAP_EPSILON
    }

    /// Moves the view. Returns whether the center changed.
    pub fn set_center(&mut self, center: Point) -> bool {
        if !center.is_finite() {
            log::warn!("ignoring non finite center {:?}", center);
            return false;
        }
        let center = self.clamp_center(center);
        if center == self.center {
            return false;
        }
        self.center = center;
        true
    }

    /// Sets the zoom, clamped to the zoom limits. Returns whether it changed.
    pub fn set_zoom(&mut self, zoom: f64) -> bool {
        if !zoom.is_finite() {
            log::warn!("ignoring non finite zoom {}", zoom);
            return false;
        }
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom);
        if (zoom - self.zoom).abs() <= ZOOM_SNAP_EPSILON {
            return false;
        }
        self.zoom = zoom;
        true
    }

    /// Pans by `delta` map units. Returns whether the center changed.
    pub fn pan(&mut self, delta: Point) -> bool {
        self.set_center(self.center.add(&delta))
    }

    fn clamp_center(&self, center: Point) -> Point {
        match &self.max_extent {
            Some(extent) => extent.clamp(&center),
            None => center,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lausanne() -> View {
        View::new(Point::new(2537968.5, 1152088.0), 4.0, 9.0)
            .with_max_extent(Extent::new(2532500.0, 1149000.0, 2545625.0, 1161000.0))
    }

    #[test]
    fn test_view_creation() {
        let view = lausanne();
        assert_eq!(view.center(), Point::new(2537968.5, 1152088.0));
        assert_eq!(view.zoom(), 4.0);
        assert_eq!(view.rounded_zoom(), 4);
        assert!(view.is_zoom_snapped());
    }

    #[test]
    fn test_setters_report_changes() {
        let mut view = lausanne();
        assert!(!view.set_zoom(4.0));
        assert!(view.set_zoom(4.4));
        assert_eq!(view.rounded_zoom(), 4);
        assert!(!view.is_zoom_snapped());
        assert!(view.set_zoom(4.0));

        assert!(!view.set_center(Point::new(2537968.5, 1152088.0)));
        assert!(view.pan(Point::new(10.0, 0.0)));
        assert!(!view.set_zoom(f64::NAN));
    }

    #[test]
    fn test_zoom_limits() {
        let mut view = lausanne();
        assert!(view.set_zoom(42.0));
        assert_eq!(view.zoom(), 9.0);
        assert!(!view.set_zoom(10.0));
        assert!(view.set_zoom(-3.0));
        assert_eq!(view.zoom(), 0.0);
    }

    #[test]
    fn test_center_clamped_to_extent() {
        let mut view = lausanne();
        assert!(view.set_center(Point::new(2600000.0, 1200000.0)));
        assert_eq!(view.center(), Point::new(2545625.0, 1161000.0));
        // already at the corner
        assert!(!view.set_center(Point::new(2700000.0, 1300000.0)));
    }
}
