pub mod chain;
pub mod cost;
pub mod diff;
pub mod error;
pub mod materialize;
pub mod model;
pub mod raster;
pub mod reconstruct;
pub mod solution;
