pub mod bounds;
pub mod config;
pub mod constants;
pub mod geo;
pub mod grid;
pub mod map;
pub mod projection;
pub mod viewport;
