//! Aoibox - Spatial AOI construction & query engine
//!
//! This library provides the geometry, boundary, and spatial-index core shared
//! by the server and export binaries.

pub mod aoi;
pub mod boundary;
pub mod config;
pub mod error;
pub mod geometry;
pub mod index;
pub mod model;
pub mod nodes;

pub use error::AoiError;
pub use model::{AoiProject, Feature, PolyType};
