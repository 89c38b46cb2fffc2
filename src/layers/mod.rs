pub mod base;
pub mod manager;
pub mod marker;
pub mod overlay;
pub mod vector;

pub use base::{Layer, LayerKind};
pub use manager::{Features, LayerRegistry, RegistryError};
pub use marker::MarkerFeature;
pub use overlay::{OverlayState, OverlaySynchronizer};
pub use vector::{BBoxFeature, PolygonStyle};
