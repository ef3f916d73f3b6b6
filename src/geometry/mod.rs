//! Geometry utilities: local metric projection, buffering, validity repair.

mod buffer;
mod projection;
mod validity;

pub use buffer::{area_sq_meters, buffer_meters, CIRCLE_SEGMENTS};
pub use projection::{LocalProjection, EARTH_RADIUS_M};
pub use validity::{repair_polygon, validate_geometry, validate_polygon};
