//! Drawing primitives produced by the geometry driver.
//!
//! Objects only carry coordinates and resolved styles; turning them into
//! pixels is left to the rendering backend in [`crate::graph`].

use crate::geom::Style;
use crate::palette::{Color, MarkerKind};
use crate::viewport::{Axis, Coord, Coord1D};

#[derive(Debug, Clone, PartialEq)]
pub enum GraphObject {
    Point {
        at: Coord,
        size: f64,
        marker: MarkerKind,
        color: Color,
    },
    /// Axis aligned rectangle spanning two corners.
    Rect {
        min: Coord,
        max: Coord,
        style: Style,
    },
    Polyline {
        points: Vec<Coord>,
        style: Style,
    },
    /// Whiskered range along `direction` through `at`.
    ErrorBar {
        at: Coord,
        low: Coord1D,
        high: Coord1D,
        direction: Axis,
        style: Style,
    },
    /// `columns` x `rows` cells stored row by row from the top.
    Raster {
        min: Coord,
        max: Coord,
        columns: usize,
        rows: usize,
        pixels: Vec<Color>,
    },
    Text {
        at: Coord,
        text: String,
        size: f64,
        color: Color,
    },
}

impl GraphObject {
    pub fn kind_name(&self) -> &'static str {
        match self {
            GraphObject::Point { .. } => "point",
            GraphObject::Rect { .. } => "rect",
            GraphObject::Polyline { .. } => "polyline",
            GraphObject::ErrorBar { .. } => "errorbar",
            GraphObject::Raster { .. } => "raster",
            GraphObject::Text { .. } => "text",
        }
    }
}
