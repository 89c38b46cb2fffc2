//! Core constants shared by the tile grid, the view and the network clients.

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Standardized rendering pixel size in meters (OGC Symbology Encoding, 90.7 DPI).
pub const WMTS_REF_PIXEL_SIZE_M: f64 = 0.00028;

/// Client-side timeout for backend tile lookups.
pub const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 10_000;

/// Number of decimals kept when a clicked coordinate is shown to the user.
pub const DISPLAY_COORD_DECIMALS: i32 = 2;

/// Tolerance below which a continuous zoom is considered already snapped.
pub const ZOOM_SNAP_EPSILON: f64 = 1e-9;

/// Default marker icon.
pub const DEFAULT_MARKER_ICON: &str = "/gomarker_star_red.png";

/// Lausanne WMTS max extent (EPSG:2056), minx, miny, maxx, maxy.
pub const LAUSANNE_MAX_EXTENT: [f64; 4] = [2_532_500.0, 1_149_000.0, 2_545_625.0, 1_161_000.0];

/// Swiss max extent (EPSG:2056), minx, miny, maxx, maxy.
pub const SWISS_MAX_EXTENT: [f64; 4] = [2_420_000.0, 1_030_000.0, 2_900_000.0, 1_350_000.0];

/// Lausanne main station, default view center.
pub const LAUSANNE_GARE: [f64; 2] = [2_537_968.5, 1_152_088.0];
