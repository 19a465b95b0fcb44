//! Where a single row of a filled geom ends up inside its viewport.

use crate::data::{DataFrame, Value};
use crate::error::{Error, Result};
use crate::geom::{BinPosition, FilledGeom, GeomKind, HistogramDrawingStyle, PositionKind, BIN_WIDTHS_COL, PREV_VALS_COL};
use crate::theme::{OutsideRange, Theme};
use crate::viewport::{Axis, Coord, Coord1D, Viewport};

/// Share of a discrete cell covered by a bar.
pub const DISCRETE_BIN_WIDTH: f64 = 0.8;

/// Width of the bin starting at row `idx` of `col`.
///
/// Discrete axes use [`DISCRETE_BIN_WIDTH`]. Otherwise an explicit
/// [`BIN_WIDTHS_COL`] entry wins, then the distance to the next row, then the
/// distance from the previous row when the next value is missing. The last
/// row has no closing edge and fails.
pub fn read_or_calc_bin_width(df: &DataFrame, idx: usize, col: &str, discrete: bool) -> Result<f64> {
    if discrete {
        return Ok(DISCRETE_BIN_WIDTH);
    }
    if let Ok(widths) = df.column(BIN_WIDTHS_COL) {
        if let Some(width) = widths.f64_at(idx) {
            return Ok(width);
        }
    }
    let values = df.column(col)?;
    let edge = || Error::MissingBinEdge {
        col: col.to_string(),
        row: idx,
    };
    if idx + 1 >= values.len() {
        return Err(edge());
    }
    let current = values.f64_at(idx).unwrap_or(0.0);
    match values.f64_at(idx + 1) {
        Some(next) => Ok(next - current),
        None if idx > 0 => values
            .f64_at(idx - 1)
            .map(|prev| current - prev)
            .ok_or_else(edge),
        None => Err(edge()),
    }
}

/// Fraction of the bin width a value is moved by.
pub fn bin_shift(bin_position: BinPosition) -> f64 {
    match bin_position {
        BinPosition::None | BinPosition::Left => 0.0,
        BinPosition::Center => 0.5,
        BinPosition::Right => 1.0,
    }
}

/// Geoms whose rows span a bin and need its width.
pub fn needs_bin_width(fg: &FilledGeom) -> bool {
    matches!(fg.kind, GeomKind::Bar | GeomKind::Histogram | GeomKind::FreqPoly)
        || matches!(fg.bin_position, BinPosition::Center | BinPosition::Right)
}

/// Histograms and frequency polygons arrive pre-binned with a closing edge row.
fn has_edge_row(fg: &FilledGeom, df: &DataFrame) -> bool {
    matches!(fg.kind, GeomKind::Histogram | GeomKind::FreqPoly)
        && !fg.discrete_x
        && !df.has_column(BIN_WIDTHS_COL)
}

/// Rows to draw. On a continuous x without explicit widths the last row of a
/// histogram or frequency polygon only closes the previous bin.
pub fn drawable_rows(fg: &FilledGeom, df: &DataFrame) -> std::ops::Range<usize> {
    if has_edge_row(fg, df) {
        0..df.len().saturating_sub(1)
    } else {
        0..df.len()
    }
}

/// Bin width of row `idx` along x for `fg`. Geoms without an edge row give
/// their last row the width of the bin before it; a lone row still fails.
pub fn geom_bin_width(fg: &FilledGeom, df: &DataFrame, idx: usize) -> Result<f64> {
    match read_or_calc_bin_width(df, idx, &fg.x_col, fg.discrete_x) {
        Err(Error::MissingBinEdge { .. }) if idx > 0 && !has_edge_row(fg, df) => {
            read_or_calc_bin_width(df, idx - 1, &fg.x_col, false)
        }
        other => other,
    }
}

fn clip(value: Value, discrete: bool, axis: Axis, scale: (f64, f64), theme: &Theme) -> Option<Value> {
    if discrete {
        return Some(value);
    }
    let v = value.as_f64().unwrap_or(0.0);
    let (lo, hi) = (scale.0.min(scale.1), scale.0.max(scale.1));
    if v >= lo && v <= hi {
        return Some(Value::Float(v));
    }
    match theme.outside_range(axis) {
        OutsideRange::Drop => None,
        OutsideRange::None => Some(Value::Float(v)),
        OutsideRange::Clip => {
            let (mlo, mhi) = theme.margin_range(axis).unwrap_or((lo, hi));
            Some(Value::Float(v.clamp(mlo.min(mhi), mlo.max(mhi))))
        }
    }
}

/// The x and y values of row `idx`, after applying the theme's policy for
/// values outside the viewport's range. Missing numbers read as 0, `None`
/// means the row is dropped.
pub fn read_xy(df: &DataFrame, idx: usize, fg: &FilledGeom, view: &Viewport, theme: &Theme) -> Result<Option<(Value, Value)>> {
    let x = df.column(&fg.x_col)?.value(idx);
    let y = df.column(&fg.y_col)?.value(idx);
    let x = clip(x, fg.discrete_x, Axis::X, view.x_scale, theme);
    let y = clip(y, fg.discrete_y, Axis::Y, view.y_scale, theme);
    Ok(x.zip(y))
}

/// Lower and upper end of a row's value under the geom's position policy.
pub fn stacked_range(fg: &FilledGeom, df: &DataFrame, idx: usize, y: f64) -> Result<(f64, f64)> {
    match fg.position {
        PositionKind::Identity => Ok((0.0, y)),
        PositionKind::Stack => {
            let prev = df.column(PREV_VALS_COL)?.f64_at(idx).unwrap_or(0.0);
            Ok((prev, prev + y))
        }
        other => Err(Error::UnimplementedPositionPolicy(other)),
    }
}

fn is_bar_like(fg: &FilledGeom) -> bool {
    match fg.kind {
        GeomKind::Bar => true,
        GeomKind::Histogram => fg.hist_style == HistogramDrawingStyle::Bars,
        _ => false,
    }
}

/// Position of a value along one axis. Discrete values sit inside their
/// cell: centered for point-like geoms, offset by half the unused width for
/// bars and tiles, at the origin for rasters. Continuous x values are moved
/// by the bin position.
pub fn axis_position(fg: &FilledGeom, view: &Viewport, axis: Axis, value: &Value, bin_width: f64) -> Coord1D {
    let (discrete, scale) = match axis {
        Axis::X => (fg.discrete_x, view.x_scale),
        Axis::Y => (fg.discrete_y, view.y_scale),
    };
    if discrete {
        let rel = match fg.kind {
            GeomKind::Bar | GeomKind::Histogram | GeomKind::Tile => (1.0 - bin_width) / 2.0,
            GeomKind::Raster => 0.0,
            GeomKind::Point | GeomKind::Line | GeomKind::FreqPoly | GeomKind::ErrorBar | GeomKind::Text => 0.5,
        };
        return Coord1D::relative(rel, axis);
    }
    let v = value.as_f64().unwrap_or(0.0);
    let v = match axis {
        Axis::X => v + bin_shift(fg.bin_position) * bin_width,
        Axis::Y => v,
    };
    Coord1D::data(v, axis, scale)
}

/// Anchor of row `idx`: the point itself, or the lower left corner of a bar.
pub fn get_draw_pos(
    view: &Viewport,
    fg: &FilledGeom,
    df: &DataFrame,
    idx: usize,
    x: &Value,
    y: &Value,
    bin_widths: (f64, f64),
) -> Result<Coord> {
    let cx = axis_position(fg, view, Axis::X, x, bin_widths.0);
    let cy = if fg.discrete_y {
        axis_position(fg, view, Axis::Y, y, bin_widths.1)
    } else {
        let (base, top) = stacked_range(fg, df, idx, y.as_f64().unwrap_or(0.0))?;
        let v = if is_bar_like(fg) { base } else { top };
        Coord1D::data(v, Axis::Y, view.y_scale)
    };
    Ok(Coord::new(cx, cy))
}

/// Step outline of a histogram given the left edge and height of each bin:
/// starts on the baseline, then runs across the top of every bin.
pub fn to_histogram_outline(points: &[(f64, f64)], widths: &[f64], baseline: f64) -> Vec<(f64, f64)> {
    let Some(&(x0, _)) = points.first() else {
        return Vec::new();
    };
    let mut outline = Vec::with_capacity(2 * points.len() + 1);
    outline.push((x0, baseline));
    for (&(x, y), &w) in points.iter().zip(widths) {
        outline.push((x, y));
        outline.push((x + w, y));
    }
    outline
}

/// Frequency polygon ends: one bin width before the first and after the last
/// point, on the baseline.
pub fn extend_to_baseline(points: &mut Vec<(f64, f64)>, first_width: f64, last_width: f64, baseline: f64) {
    let (Some(&(first, _)), Some(&(last, _))) = (points.first(), points.last()) else {
        return;
    };
    points.insert(0, (first - first_width, baseline));
    points.push((last + last_width, baseline));
}

/// Text of a label cell; floats are printed with `precision` decimals.
pub fn read_text(df: &DataFrame, idx: usize, col: &str, precision: usize) -> Result<String> {
    Ok(match df.column(col)?.value(idx) {
        Value::Float(f) => format!("{:.*}", precision, f),
        other => other.to_string(),
    })
}

/// Numeric cell of an optional column, `default` when absent or missing.
pub fn read_optional(df: &DataFrame, col: Option<&String>, idx: usize, default: f64) -> Result<f64> {
    match col {
        Some(col) => Ok(df.column(col)?.f64_at(idx).unwrap_or(default)),
        None => Ok(default),
    }
}
