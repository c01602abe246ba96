//! contains sketch store and parameters

pub mod parameters;
pub mod sketchstore;

pub use parameters::*;
pub use sketchstore::*;
