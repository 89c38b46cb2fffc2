use crate::core::geo::Point;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box in projected coordinates, ordered as minx, miny, maxx, maxy.
///
/// Serialized as a four element array, which is the shape used by the backend
/// (`bbox: [xmin, ymin, xmax, ymax]`) and the configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 4]", into = "[f64; 4]")]
pub struct Extent {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

/// A tile bounding box is an extent aligned on the tile grid
pub type TileBoundingBox = Extent;

impl Extent {
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Creates an extent, rejecting degenerate or inverted boxes
    pub fn checked(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Option<Self> {
        let extent = Self::new(minx, miny, maxx, maxy);
        extent.is_valid().then_some(extent)
    }

    pub fn width(&self) -> f64 {
        self.maxx - self.minx
    }

    pub fn height(&self) -> f64 {
        self.maxy - self.miny
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.minx + self.maxx) / 2.0,
            (self.miny + self.maxy) / 2.0,
        )
    }

    /// Strictly ordered and finite
    pub fn is_valid(&self) -> bool {
        self.minx.is_finite()
            && self.miny.is_finite()
            && self.maxx.is_finite()
            && self.maxy.is_finite()
            && self.minx < self.maxx
            && self.miny < self.maxy
    }

    /// Clamps a point to be within the extent
    pub fn clamp(&self, point: &Point) -> Point {
        Point::new(
            point.x.clamp(self.minx, self.maxx),
            point.y.clamp(self.miny, self.maxy),
        )
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.minx, self.miny, self.maxx, self.maxy]
    }
}

impl TryFrom<[f64; 4]> for Extent {
    type Error = String;

    fn try_from(values: [f64; 4]) -> Result<Self, Self::Error> {
        Extent::checked(values[0], values[1], values[2], values[3])
            .ok_or_else(|| format!("invalid bbox {:?}: expected xmin<xmax and ymin<ymax", values))
    }
}

impl From<Extent> for [f64; 4] {
    fn from(extent: Extent) -> Self {
        extent.to_array()
    }
}

/// Comma separated, the form used in WMS `BBOX` parameters
impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.minx, self.miny, self.maxx, self.maxy)
    }
}
