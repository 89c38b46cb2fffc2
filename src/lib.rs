//! # wmts-check
//!
//! Tile-grid resolution and overlay synchronization for checking a WMTS tile
//! pyramid interactively.
//!
//! A user picks a point in a projected coordinate space, the engine resolves
//! it to the `(zoom, row, col)` address of the tile pyramid, asks a backend
//! for the tile metadata and keeps the marker and bounding-box overlays in
//! step with the latest interaction and the latest backend answer.

pub mod core;
pub mod input;
pub mod layers;
pub mod prelude;
pub mod tiles;
pub mod ui;
pub use crate::core::constants;

// Re-export public API
pub use core::{
    bounds::Extent,
    config::ViewerConfig,
    geo::{Point, TileAddress},
    grid::TileGrid,
    map::ViewController,
    projection::CoordinateTransform,
    viewport::View,
};

pub use layers::{
    base::{Layer, LayerKind},
    manager::LayerRegistry,
    marker::MarkerFeature,
    overlay::OverlaySynchronizer,
    vector::BBoxFeature,
};

pub use input::events::MapEvent;

pub use tiles::{
    capabilities::Capabilities,
    loader::{CapabilitiesFetcher, CapabilitiesLoader},
    lookup::{TileInfo, TileLookup},
    source::TileSourceDescriptor,
};

pub use ui::display::{DisplaySink, MemoryDisplay, Panel};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, MapError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("Projection error: {0}")]
    Projection(#[from] core::projection::ProjectionError),

    #[error("Grid error: {0}")]
    Grid(#[from] core::grid::GridError),

    #[error("Configuration error: {0}")]
    Config(#[from] core::config::ConfigError),

    #[error("Capabilities error: {0}")]
    Capabilities(#[from] tiles::capabilities::CapabilitiesError),

    #[error("Layer error: {0}")]
    Layer(#[from] layers::manager::RegistryError),

    #[error("Backend error: {0}")]
    Backend(#[from] tiles::lookup::BackendError),
}

/// Error type alias for convenience
pub type Error = MapError;
