use crate::core::geo::Point;
use crate::tiles::lookup::{BackendError, TileInfo};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub type EventSender = UnboundedSender<MapEvent>;
pub type EventReceiver = UnboundedReceiver<MapEvent>;

/// Events consumed by the view controller, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    /// Click on the map, in display coordinates
    Click { position: Point },
    /// The view finished moving or zooming
    MoveEnd,
    /// Zoom picked in the zoom selector
    ZoomSelected { zoom: u8 },
    /// Base layer picked in the layer selector
    BaseLayerSelected { name: String },
    /// Answer of a backend tile lookup started by a click
    TileLookupCompleted {
        generation: u64,
        result: Result<TileInfo, BackendError>,
    },
}

impl MapEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MapEvent::Click { .. } => "click",
            MapEvent::MoveEnd => "moveend",
            MapEvent::ZoomSelected { .. } => "zoom-selected",
            MapEvent::BaseLayerSelected { .. } => "base-layer-selected",
            MapEvent::TileLookupCompleted { .. } => "tile-lookup-completed",
        }
    }

    /// Events coming from the user rather than from the session itself
    pub fn is_user_event(&self) -> bool {
        matches!(
            self,
            MapEvent::Click { .. } | MapEvent::ZoomSelected { .. } | MapEvent::BaseLayerSelected { .. }
        )
    }
}

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}
