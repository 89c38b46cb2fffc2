//! Coordinate transforms between the display projection and the data projection.
//!
//! Only a handful of reference systems are needed by the viewer, so their
//! definitions are built in. Unknown codes are rejected when the transform is
//! constructed, never per call.

use crate::core::geo::Point;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fmt;
use std::str::FromStr;

/// Web Mercator sphere radius
const EARTH_RADIUS: f64 = 6378137.0;

/// Bessel 1841 ellipsoid
const BESSEL_A: f64 = 6377397.155;
const BESSEL_RF: f64 = 299.1528128;

/// Swiss projection center (Bern old observatory)
const SWISS_LAT0_DEG: f64 = 46.952_405_555_555_56;
const SWISS_LON0_DEG: f64 = 7.439_583_333_333_333;

const INVERSE_MAX_ITERATIONS: usize = 30;
const INVERSE_TOLERANCE: f64 = 1e-14;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProjectionError {
    #[error("no definition for reference system '{0}'")]
    UnknownCrs(String),
}

/// Reference systems with a built-in definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Crs {
    /// Geographic longitude/latitude in degrees
    Wgs84,
    /// Spherical Web Mercator
    WebMercator,
    /// Swiss LV95 (MN95)
    Lv95,
    /// Swiss LV03 (MN03)
    Lv03,
}

impl Crs {
    pub fn code(&self) -> &'static str {
        match self {
            Crs::Wgs84 => "EPSG:4326",
            Crs::WebMercator => "EPSG:3857",
            Crs::Lv95 => "EPSG:2056",
            Crs::Lv03 => "EPSG:21781",
        }
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        let normalized = code.trim().to_ascii_uppercase();
        // OGC URN form, e.g. urn:ogc:def:crs:EPSG::2056
        let normalized = match normalized.strip_prefix("URN:OGC:DEF:CRS:EPSG:") {
            Some(rest) => format!("EPSG:{}", rest.trim_start_matches(':')),
            None => normalized,
        };
        match normalized.as_str() {
            "EPSG:4326" | "WGS84" => Ok(Crs::Wgs84),
            "EPSG:3857" | "EPSG:900913" => Ok(Crs::WebMercator),
            "EPSG:2056" => Ok(Crs::Lv95),
            "EPSG:21781" => Ok(Crs::Lv03),
            _ => Err(ProjectionError::UnknownCrs(code.to_string())),
        }
    }
}

impl TryFrom<String> for Crs {
    type Error = ProjectionError;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        code.parse()
    }
}

impl From<Crs> for String {
    fn from(crs: Crs) -> Self {
        crs.code().to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Swiss oblique Mercator (somerc) on the Bessel ellipsoid, without datum shift
#[derive(Debug, Clone, Copy, PartialEq)]
struct SwissObliqueMercator {
    lambda0: f64,
    e: f64,
    r: f64,
    alpha: f64,
    b0: f64,
    k: f64,
}

impl SwissObliqueMercator {
    fn bessel() -> Self {
        let phy0 = SWISS_LAT0_DEG.to_radians();
        let lambda0 = SWISS_LON0_DEG.to_radians();
        let f = 1.0 / BESSEL_RF;
        let e2 = 2.0 * f - f * f;
        let e = e2.sqrt();
        let sin_phy0 = phy0.sin();

        let r = BESSEL_A * (1.0 - e2).sqrt() / (1.0 - e2 * sin_phy0 * sin_phy0);
        let alpha = (1.0 + e2 / (1.0 - e2) * phy0.cos().powi(4)).sqrt();
        let b0 = (sin_phy0 / alpha).asin();
        let k1 = (FRAC_PI_4 + b0 / 2.0).tan().ln();
        let k2 = (FRAC_PI_4 + phy0 / 2.0).tan().ln();
        let k3 = ((1.0 + e * sin_phy0) / (1.0 - e * sin_phy0)).ln();
        let k = k1 - alpha * k2 + alpha * e / 2.0 * k3;

        Self {
            lambda0,
            e,
            r,
            alpha,
            b0,
            k,
        }
    }

    /// Geographic radians to easting/northing relative to the projection center
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let sa1 = (FRAC_PI_4 - lat / 2.0).tan().ln();
        let sa2 = self.e / 2.0 * ((1.0 + self.e * lat.sin()) / (1.0 - self.e * lat.sin())).ln();
        let s = -self.alpha * (sa1 + sa2) + self.k;

        let b = 2.0 * (s.exp().atan() - FRAC_PI_4);
        let i = self.alpha * (lon - self.lambda0);

        let rot_i = i
            .sin()
            .atan2(self.b0.sin() * b.tan() + self.b0.cos() * i.cos());
        let rot_b = (self.b0.cos() * b.sin() - self.b0.sin() * b.cos() * i.cos()).asin();

        let easting = self.r * rot_i;
        let northing = self.r / 2.0 * ((1.0 + rot_b.sin()) / (1.0 - rot_b.sin())).ln();
        (easting, northing)
    }

    /// Inverse of [`forward`](Self::forward), iterating on the isometric latitude
    fn inverse(&self, easting: f64, northing: f64) -> (f64, f64) {
        let rot_i = easting / self.r;
        let rot_b = 2.0 * ((northing / self.r).exp().atan() - FRAC_PI_4);

        let b = (self.b0.cos() * rot_b.sin() + self.b0.sin() * rot_b.cos() * rot_i.cos()).asin();
        let i = rot_i
            .sin()
            .atan2(self.b0.cos() * rot_i.cos() - self.b0.sin() * rot_b.tan());
        let lon = self.lambda0 + i / self.alpha;

        let base = ((FRAC_PI_4 + b / 2.0).tan().ln() - self.k) / self.alpha;
        let mut phy = b;
        for _ in 0..INVERSE_MAX_ITERATIONS {
            let s = base + self.e * (FRAC_PI_4 + (self.e * phy.sin()).asin() / 2.0).tan().ln();
            let next = 2.0 * s.exp().atan() - FRAC_PI_2;
            let delta = (next - phy).abs();
            phy = next;
            if delta <= INVERSE_TOLERANCE {
                break;
            }
        }
        (lon, phy)
    }
}

/// Converts between the data projection and the display projection
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateTransform {
    data: Crs,
    display: Crs,
    swiss: SwissObliqueMercator,
}

impl CoordinateTransform {
    /// Builds a transform from CRS codes such as `EPSG:2056`.
    /// Fails when either code has no built-in definition.
    pub fn new(data_crs: &str, display_crs: &str) -> Result<Self, ProjectionError> {
        Ok(Self::between(data_crs.parse()?, display_crs.parse()?))
    }

    pub fn between(data: Crs, display: Crs) -> Self {
        Self {
            data,
            display,
            swiss: SwissObliqueMercator::bessel(),
        }
    }

    pub fn data_crs(&self) -> Crs {
        self.data
    }

    pub fn display_crs(&self) -> Crs {
        self.display
    }

    pub fn is_identity(&self) -> bool {
        self.data == self.display
    }

    /// Data projection to display projection
    pub fn to_display(&self, p: Point) -> Point {
        self.convert(self.data, self.display, p)
    }

    /// Display projection to data projection
    pub fn to_data(&self, p: Point) -> Point {
        self.convert(self.display, self.data, p)
    }

    fn convert(&self, from: Crs, to: Crs, p: Point) -> Point {
        if from == to {
            return p;
        }
        match (from, to) {
            // Same projection, different false origin
            (Crs::Lv95, Crs::Lv03) => Point::new(p.x - 2_000_000.0, p.y - 1_000_000.0),
            (Crs::Lv03, Crs::Lv95) => Point::new(p.x + 2_000_000.0, p.y + 1_000_000.0),
            _ => self.from_geographic(to, self.to_geographic(from, p)),
        }
    }

    /// Projected coordinates to longitude/latitude degrees
    fn to_geographic(&self, crs: Crs, p: Point) -> Point {
        match crs {
            Crs::Wgs84 => p,
            Crs::WebMercator => {
                let lng = (p.x / EARTH_RADIUS).to_degrees();
                let lat = (2.0 * (p.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
                Point::new(lng, lat)
            }
            Crs::Lv95 | Crs::Lv03 => {
                let (x0, y0) = false_origin(crs);
                let (lon, lat) = self.swiss.inverse(p.x - x0, p.y - y0);
                Point::new(lon.to_degrees(), lat.to_degrees())
            }
        }
    }

    /// Longitude/latitude degrees to projected coordinates
    fn from_geographic(&self, crs: Crs, p: Point) -> Point {
        match crs {
            Crs::Wgs84 => p,
            Crs::WebMercator => {
                let x = p.x.to_radians() * EARTH_RADIUS;
                let y = (FRAC_PI_4 + p.y.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
                Point::new(x, y)
            }
            Crs::Lv95 | Crs::Lv03 => {
                let (x0, y0) = false_origin(crs);
                let (easting, northing) = self.swiss.forward(p.x.to_radians(), p.y.to_radians());
                Point::new(easting + x0, northing + y0)
            }
        }
    }
}

fn false_origin(crs: Crs) -> (f64, f64) {
    match crs {
        Crs::Lv03 => (600_000.0, 200_000.0),
        _ => (2_600_000.0, 1_200_000.0),
    }
}
