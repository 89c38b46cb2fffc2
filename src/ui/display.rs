//! The page controls the view controller writes into.

use crate::core::geo::Point;
use std::sync::{Arc, Mutex};

/// Image and URL panels of the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Panel {
    Tile,
    Wms,
}

/// Output side of the viewer controls. The controller only calls these,
/// rendering them is up to the implementor.
pub trait DisplaySink: Send {
    fn set_coordinates(&mut self, point: Point);
    fn set_zoom(&mut self, zoom: u8);
    fn set_base_layer(&mut self, name: &str);
    fn set_debug_message(&mut self, message: &str);
    fn set_image(&mut self, panel: Panel, url: &str);
    fn set_url_text(&mut self, panel: Panel, text: &str);
}

/// Latest values written to a [`MemoryDisplay`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayState {
    pub coordinates: Option<Point>,
    pub zoom: Option<u8>,
    pub base_layer: Option<String>,
    pub debug_message: String,
    pub tile_image: Option<String>,
    pub tile_url_text: Option<String>,
    pub wms_image: Option<String>,
    pub wms_url_text: Option<String>,
    /// Number of writes received
    pub updates: usize,
}

impl DisplayState {
    pub fn image(&self, panel: Panel) -> Option<&str> {
        match panel {
            Panel::Tile => self.tile_image.as_deref(),
            Panel::Wms => self.wms_image.as_deref(),
        }
    }

    pub fn url_text(&self, panel: Panel) -> Option<&str> {
        match panel {
            Panel::Tile => self.tile_url_text.as_deref(),
            Panel::Wms => self.wms_url_text.as_deref(),
        }
    }
}

/// In-memory display. Clones share the same state, so one handle can be
/// given to the controller and another kept for reading.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisplay {
    state: Arc<Mutex<DisplayState>>,
}

impl MemoryDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DisplayState {
        match self.state.lock() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn update(&self, f: impl FnOnce(&mut DisplayState)) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state);
        state.updates += 1;
    }
}

impl DisplaySink for MemoryDisplay {
    fn set_coordinates(&mut self, point: Point) {
        self.update(|s| s.coordinates = Some(point));
    }

    fn set_zoom(&mut self, zoom: u8) {
        self.update(|s| s.zoom = Some(zoom));
    }

    fn set_base_layer(&mut self, name: &str) {
        self.update(|s| s.base_layer = Some(name.to_string()));
    }

    fn set_debug_message(&mut self, message: &str) {
        self.update(|s| s.debug_message = message.to_string());
    }

    fn set_image(&mut self, panel: Panel, url: &str) {
        self.update(|s| match panel {
            Panel::Tile => s.tile_image = Some(url.to_string()),
            Panel::Wms => s.wms_image = Some(url.to_string()),
        });
    }

    fn set_url_text(&mut self, panel: Panel, text: &str) {
        self.update(|s| match panel {
            Panel::Tile => s.tile_url_text = Some(text.to_string()),
            Panel::Wms => s.wms_url_text = Some(text.to_string()),
        });
    }
}
