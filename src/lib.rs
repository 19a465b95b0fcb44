// Library exports for gramscale

pub mod csv_reader;
pub mod data;
pub mod error;
pub mod graph;
pub mod palette;
pub mod theme;

// Scale resolution
pub mod plot;
pub mod scale;

// Geometry layout
pub mod compiler;
pub mod draw;
pub mod geom;
pub mod ir;
pub mod viewport;

pub use error::{Error, Result};
