pub mod cache;
pub mod capabilities;
pub mod loader;
pub mod lookup;
pub mod source;
pub mod wms;

// Re-exports for convenience
pub use cache::CapabilitiesCache;
pub use capabilities::{Capabilities, CapabilitiesError, TileMatrix, TileMatrixSet, WmtsLayer};
pub use loader::{CapabilitiesFetcher, CapabilitiesLoader};
pub use lookup::{BackendError, TileInfo, TileLookup};
pub use source::{SourceRequest, TileSourceDescriptor, TileUrlTemplate};
pub use wms::GetMapRequest;

#[cfg(feature = "http")]
pub use loader::HttpFetcher;
#[cfg(feature = "http")]
pub use lookup::HttpTileLookup;
