use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a point in projected coordinates (map units of the data projection)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    /// Rounds both components to `decimals` places, as shown in the coordinate inputs
    pub fn round_to(&self, decimals: i32) -> Point {
        let factor = 10_f64.powi(decimals);
        Point::new(
            (self.x * factor).round() / factor,
            (self.y * factor).round() / factor,
        )
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

impl From<[f64; 2]> for Point {
    fn from(coords: [f64; 2]) -> Self {
        Self::new(coords[0], coords[1])
    }
}

/// Address of one tile in the pyramid. Rows grow southward from the grid origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileAddress {
    pub zoom: u8,
    pub row: u32,
    pub col: u32,
}

impl TileAddress {
    pub fn new(zoom: u8, row: u32, col: u32) -> Self {
        Self { zoom, row, col }
    }
}

impl fmt::Display for TileAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.row, self.col)
    }
}
