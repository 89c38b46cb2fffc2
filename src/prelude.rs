//! Prelude module for common wmts-check types and traits
//!
//! This module re-exports the most commonly used types, traits, and functions
//! for easy importing with `use wmts_check::prelude::*;`

pub use crate::core::{
    bounds::{Extent, TileBoundingBox},
    config::{BaseLayerConfig, OverlayConfig, ServiceConfig, TileUrlConfig, ViewOptions, ViewerConfig},
    geo::{Point, TileAddress},
    grid::{GridDefinition, TileGrid, TileLimits},
    map::ViewController,
    projection::{CoordinateTransform, Crs},
    viewport::View,
};

pub use crate::layers::{
    base::{Layer, LayerKind},
    manager::{Features, LayerRegistry},
    marker::MarkerFeature,
    overlay::{OverlayState, OverlaySynchronizer},
    vector::{BBoxFeature, PolygonStyle},
};

pub use crate::input::events::{event_channel, EventSender, MapEvent};

pub use crate::tiles::{
    cache::CapabilitiesCache,
    capabilities::Capabilities,
    loader::{CapabilitiesFetcher, CapabilitiesLoader},
    lookup::{TileInfo, TileLookup},
    source::{SourceRequest, TileSourceDescriptor, TileUrlTemplate},
    wms::GetMapRequest,
};

#[cfg(feature = "http")]
pub use crate::tiles::{loader::HttpFetcher, lookup::HttpTileLookup};

pub use crate::ui::display::{DisplaySink, DisplayState, MemoryDisplay, Panel};

pub use crate::Error as MapError;

pub use std::{sync::Arc, time::Duration};

pub use fxhash::{FxHashMap as HashMap, FxHashSet as HashSet};
