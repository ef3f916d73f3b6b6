//! Administrative boundary catalog: country resolution and region/
//! municipality layers for the wizard pickers.

mod catalog;
mod loader;

pub use catalog::{
    normalize, BoundaryCatalog, CountryBoundary, CountryLayers, Municipality, Region,
};
pub use loader::load_catalog;
