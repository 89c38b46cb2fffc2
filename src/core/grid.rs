//! Tile pyramid addressing.
//!
//! Converts continuous projected coordinates into `(zoom, row, col)` tile
//! addresses and back into tile bounding boxes. The grid origin is the
//! top-left corner of the tile matrix (WMTS `TopLeftCorner`), rows grow
//! southward and columns eastward.

use crate::core::bounds::{Extent, TileBoundingBox};
use crate::core::constants::{TILE_SIZE, WMTS_REF_PIXEL_SIZE_M};
use crate::core::geo::{Point, TileAddress};
use crate::core::projection::Crs;
use crate::tiles::capabilities::TileMatrixSet;
use serde::{Deserialize, Serialize};

/// Tolerance used when computing tile limits of an extent, in tile units
const EPSILON: f64 = 0.0000001;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("invalid grid definition: {0}")]
    InvalidDefinition(String),
    #[error("unsupported zoom level {zoom}, choose between 0 and {max}")]
    InvalidZoom { zoom: u8, max: u8 },
    #[error("coordinate ({x}, {y}) is outside the pyramid extent")]
    OutOfRange { x: f64, y: f64 },
    #[error("tile {0} is outside the pyramid extent")]
    InvalidTile(TileAddress),
}

/// Min (inclusive) and max (exclusive) tile indices covering an extent at one zoom level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLimits {
    pub min_col: u32,
    pub min_row: u32,
    pub max_col: u32,
    pub max_row: u32,
}

impl TileLimits {
    pub fn contains(&self, row: u32, col: u32) -> bool {
        col >= self.min_col && col < self.max_col && row >= self.min_row && row < self.max_row
    }
}

/// Serializable grid definition, as found in the configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridDefinition {
    /// Grid name as used in tile URLs (e.g. `swissgrid_05`)
    pub name: String,
    /// Top-left corner of the tile matrix
    pub origin: [f64; 2],
    /// Declared maximum extent; coordinates outside cannot be resolved
    pub extent: Extent,
    /// Ground resolution (units per pixel) per zoom level, strictly decreasing
    pub resolutions: Vec<f64>,
    #[serde(default = "default_tile_size")]
    pub tile_size: u32,
    #[serde(default = "default_crs")]
    pub crs: Crs,
}

fn default_tile_size() -> u32 {
    TILE_SIZE
}

fn default_crs() -> Crs {
    Crs::Lv95
}

impl Default for GridDefinition {
    fn default() -> Self {
        TileGrid::swissgrid_05().definition()
    }
}

/// Tile grid
#[derive(Debug, Clone, PartialEq)]
pub struct TileGrid {
    name: String,
    origin: Point,
    /// The geographical extent covered by the pyramid, in ground units.
    /// Coordinates outside of it fail to resolve.
    extent: Extent,
    /// Resolution per zoom level, ordered from largest to smallest.
    /// The largest value corresponds to zoom level 0.
    resolutions: Vec<f64>,
    /// The width and height of an individual tile, in pixels.
    tile_size: u32,
    crs: Crs,
    /// Tile limits covering the extent, per level
    level_limits: Vec<TileLimits>,
}

impl TileGrid {
    /// Lausanne WMTS grid (`swissgrid_05`), limited to the Lausanne extent
    pub fn swissgrid_05() -> TileGrid {
        Self::build(
            "swissgrid_05".to_string(),
            Point::new(2_420_000.0, 1_350_000.0),
            Extent::new(2_532_500.0, 1_149_000.0, 2_545_625.0, 1_161_000.0),
            vec![50.0, 20.0, 10.0, 5.0, 2.5, 1.0, 0.5, 0.25, 0.1, 0.05],
            TILE_SIZE,
            Crs::Lv95,
        )
    }

    /// swisstopo `2056_28` tile matrix set covering the whole of Switzerland
    pub fn swisstopo_2056_28() -> TileGrid {
        Self::build(
            "2056_28".to_string(),
            Point::new(2_420_000.0, 1_350_000.0),
            Extent::new(2_420_000.0, 1_030_000.0, 2_900_000.0, 1_350_000.0),
            vec![
                4000.0, 3750.0, 3500.0, 3250.0, 3000.0, 2750.0, 2500.0, 2250.0, 2000.0, 1750.0,
                1500.0, 1250.0, 1000.0, 750.0, 650.0, 500.0, 250.0, 100.0, 50.0, 20.0, 10.0, 5.0,
                2.5, 2.0, 1.5, 1.0, 0.5, 0.25, 0.1,
            ],
            TILE_SIZE,
            Crs::Lv95,
        )
    }

    pub fn new(
        name: String,
        origin: Point,
        extent: Extent,
        resolutions: Vec<f64>,
        tile_size: u32,
        crs: Crs,
    ) -> Result<TileGrid, GridError> {
        if !extent.is_valid() {
            return Err(GridError::InvalidDefinition(format!(
                "extent {} is not ordered",
                extent
            )));
        }
        if !origin.is_finite() || origin.x > extent.minx || origin.y < extent.maxy {
            return Err(GridError::InvalidDefinition(format!(
                "origin ({}, {}) must be the top-left corner of extent {}",
                origin.x, origin.y, extent
            )));
        }
        if tile_size == 0 {
            return Err(GridError::InvalidDefinition("tile size is 0".to_string()));
        }
        if resolutions.is_empty() || resolutions.len() > u8::MAX as usize {
            return Err(GridError::InvalidDefinition(format!(
                "expected 1 to 255 resolutions, got {}",
                resolutions.len()
            )));
        }
        if resolutions.iter().any(|r| !r.is_finite() || *r <= 0.0) {
            return Err(GridError::InvalidDefinition(
                "resolutions must be positive".to_string(),
            ));
        }
        if resolutions.windows(2).any(|w| w[1] >= w[0]) {
            return Err(GridError::InvalidDefinition(
                "resolutions must be strictly decreasing".to_string(),
            ));
        }
        Ok(Self::build(name, origin, extent, resolutions, tile_size, crs))
    }

    fn build(
        name: String,
        origin: Point,
        extent: Extent,
        resolutions: Vec<f64>,
        tile_size: u32,
        crs: Crs,
    ) -> TileGrid {
        let mut grid = TileGrid {
            name,
            origin,
            extent,
            resolutions,
            tile_size,
            crs,
            level_limits: Vec::new(),
        };
        grid.level_limits = (0..grid.nlevels())
            .map(|zoom| grid.limits_of(&grid.extent, zoom))
            .collect();
        grid
    }

    pub fn from_definition(definition: &GridDefinition) -> Result<TileGrid, GridError> {
        Self::new(
            definition.name.clone(),
            Point::from(definition.origin),
            definition.extent,
            definition.resolutions.clone(),
            definition.tile_size,
            definition.crs,
        )
    }

    pub fn definition(&self) -> GridDefinition {
        GridDefinition {
            name: self.name.clone(),
            origin: [self.origin.x, self.origin.y],
            extent: self.extent,
            resolutions: self.resolutions.clone(),
            tile_size: self.tile_size,
            crs: self.crs,
        }
    }

    /// Builds a grid from a WMTS tile matrix set. Cell sizes are derived from
    /// the scale denominators; the extent defaults to the area covered by the
    /// first tile matrix.
    pub fn from_tile_matrix_set(
        set: &TileMatrixSet,
        extent: Option<Extent>,
    ) -> Result<TileGrid, GridError> {
        let first = set.matrices.first().ok_or_else(|| {
            GridError::InvalidDefinition(format!("tile matrix set {} is empty", set.identifier))
        })?;
        let tile_size = first.tile_width;
        if set
            .matrices
            .iter()
            .any(|m| m.tile_width != tile_size || m.tile_height != tile_size)
        {
            return Err(GridError::InvalidDefinition(format!(
                "tile matrix set {} mixes tile sizes",
                set.identifier
            )));
        }
        let resolutions: Vec<f64> = set.matrices.iter().map(|m| m.cell_size()).collect();
        let origin = first.top_left_corner;
        let extent = match extent {
            Some(extent) => extent,
            None => {
                let span = resolutions[0] * tile_size as f64;
                Extent::new(
                    origin.x,
                    origin.y - span * first.matrix_height as f64,
                    origin.x + span * first.matrix_width as f64,
                    origin.y,
                )
            }
        };
        let crs = set
            .supported_crs
            .parse()
            .map_err(|e: crate::core::projection::ProjectionError| {
                GridError::InvalidDefinition(e.to_string())
            })?;
        Self::new(
            set.identifier.clone(),
            origin,
            extent,
            resolutions,
            tile_size,
            crs,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn origin(&self) -> Point {
        self.origin
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    pub fn crs(&self) -> Crs {
        self.crs
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn resolutions(&self) -> &[f64] {
        &self.resolutions
    }

    pub fn nlevels(&self) -> u8 {
        self.resolutions.len() as u8
    }

    pub fn maxzoom(&self) -> u8 {
        self.nlevels() - 1
    }

    fn check_zoom(&self, zoom: u8) -> Result<(), GridError> {
        if zoom < self.nlevels() {
            Ok(())
        } else {
            Err(GridError::InvalidZoom {
                zoom,
                max: self.maxzoom(),
            })
        }
    }

    /// Ground resolution (units per pixel) of a zoom level
    pub fn resolution(&self, zoom: u8) -> Result<f64, GridError> {
        self.check_zoom(zoom)?;
        Ok(self.resolutions[zoom as usize])
    }

    /// Scale denominator based on standardized pixel size (https://www.ogc.org/standards/se)
    pub fn scale_denominator(&self, zoom: u8) -> Result<f64, GridError> {
        Ok(self.resolution(zoom)? / WMTS_REF_PIXEL_SIZE_M)
    }

    /// Ground size of one tile side
    fn tile_span(&self, zoom: u8) -> f64 {
        self.resolutions[zoom as usize] * self.tile_size as f64
    }

    /// Number of (columns, rows) of the tile matrix from the origin to the far
    /// corner of the extent (WMTS `MatrixWidth`, `MatrixHeight`)
    pub fn matrix_size(&self, zoom: u8) -> Result<(u32, u32), GridError> {
        self.check_zoom(zoom)?;
        let limits = self.level_limits[zoom as usize];
        Ok((limits.max_col, limits.max_row))
    }

    /// Tile limits covering the pyramid extent
    pub fn tile_limits(&self, zoom: u8) -> Result<TileLimits, GridError> {
        self.check_zoom(zoom)?;
        Ok(self.level_limits[zoom as usize])
    }

    // Based on t-rex Grid::tile_limits, for a top-left origin
    fn limits_of(&self, extent: &Extent, zoom: u8) -> TileLimits {
        let span = self.tile_span(zoom);
        let min_col = ((extent.minx - self.origin.x) / span + EPSILON).floor().max(0.0);
        let max_col = ((extent.maxx - self.origin.x) / span - EPSILON).ceil().max(0.0);
        let min_row = ((self.origin.y - extent.maxy) / span + EPSILON).floor().max(0.0);
        let max_row = ((self.origin.y - extent.miny) / span - EPSILON).ceil().max(0.0);
        TileLimits {
            min_col: min_col as u32,
            min_row: min_row as u32,
            max_col: max_col as u32,
            max_row: max_row as u32,
        }
    }

    pub fn is_valid_tile(&self, tile: &TileAddress) -> bool {
        self.level_limits
            .get(tile.zoom as usize)
            .map(|limits| limits.contains(tile.row, tile.col))
            .unwrap_or(false)
    }

    /// Resolves a projected coordinate to the tile containing it.
    ///
    /// Tiles are half-open intervals `[min, max)` in both directions from the
    /// origin, so a point on a tile's east or south edge belongs to the
    /// neighbouring tile on that side.
    pub fn resolve(&self, p: &Point, zoom: u8) -> Result<TileAddress, GridError> {
        self.check_zoom(zoom)?;
        let out_of_range = GridError::OutOfRange { x: p.x, y: p.y };
        let inside = p.is_finite()
            && p.x >= self.extent.minx
            && p.x < self.extent.maxx
            && p.y > self.extent.miny
            && p.y <= self.extent.maxy;
        if !inside {
            return Err(out_of_range);
        }

        let span = self.tile_span(zoom);
        // Snap values a rounding error short of a tile edge onto that edge
        let col = ((p.x - self.origin.x) / span + EPSILON).floor();
        let row = ((self.origin.y - p.y) / span + EPSILON).floor();
        if col < 0.0 || row < 0.0 || col > u32::MAX as f64 || row > u32::MAX as f64 {
            return Err(out_of_range);
        }
        Ok(TileAddress::new(zoom, row as u32, col as u32))
    }

    /// Bounding box of a tile, the inverse mapping of [`resolve`](Self::resolve)
    pub fn tile_bounding_box(&self, tile: &TileAddress) -> Result<TileBoundingBox, GridError> {
        self.check_zoom(tile.zoom)?;
        if !self.is_valid_tile(tile) {
            return Err(GridError::InvalidTile(*tile));
        }
        let span = self.tile_span(tile.zoom);
        let minx = self.origin.x + tile.col as f64 * span;
        let maxy = self.origin.y - tile.row as f64 * span;
        Ok(Extent::new(minx, maxy - span, minx + span, maxy))
    }

    /// Tile aligned bounding box covering `extent` at `zoom`
    pub fn covering_extent(&self, extent: &Extent, zoom: u8) -> Result<Extent, GridError> {
        self.check_zoom(zoom)?;
        if !extent.is_valid() {
            return Err(GridError::InvalidDefinition(format!(
                "extent {} is not ordered",
                extent
            )));
        }
        if extent.minx < self.origin.x || extent.maxy > self.origin.y {
            return Err(GridError::OutOfRange {
                x: extent.minx,
                y: extent.maxy,
            });
        }
        let limits = self.limits_of(extent, zoom);
        let span = self.tile_span(zoom);
        Ok(Extent::new(
            self.origin.x + limits.min_col as f64 * span,
            self.origin.y - limits.max_row as f64 * span,
            self.origin.x + limits.max_col as f64 * span,
            self.origin.y - limits.min_row as f64 * span,
        ))
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::swissgrid_05()
    }
}
