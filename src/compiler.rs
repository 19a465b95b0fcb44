//! Compiles filled geoms into drawing primitives inside viewports.

use crate::data::{DataFrame, Formula, Value};
use crate::draw::{
    axis_position, drawable_rows, extend_to_baseline, geom_bin_width, get_draw_pos, needs_bin_width,
    read_optional, read_text, read_xy, stacked_range, to_histogram_outline, DISCRETE_BIN_WIDTH,
};
use crate::error::{Error, Result};
use crate::geom::{fill_geom, FilledGeom, GeomGroup, GeomKind, GroupKey, HistogramDrawingStyle, PositionKind, Style};
use crate::ir::GraphObject;
use crate::palette::Color;
use crate::plot::{Facet, FacetScales, Plot};
use crate::scale::{collect_scales, Aesthetic, ScaleSet};
use crate::theme::Theme;
use crate::viewport::{calc_view_map, create_layout, grid_len, Axis, Coord, Coord1D, Quantity, Viewport};
use std::collections::BTreeMap;
use tracing::{debug, info, trace};

type ViewMap = BTreeMap<(Value, Value), usize>;

/// Draws a filled geom into `view`, optionally only the group labelled
/// `only`. The viewport is split for discrete axes first and handed back
/// with every object attached to the cell it belongs to. When an earlier
/// geom left a grid of a different shape, this geom is drawn into its own
/// region appended to the view's children.
pub fn draw_geom(mut view: Viewport, fg: &FilledGeom, theme: &Theme, only: Option<&GroupKey>) -> Result<Viewport> {
    if matches!(fg.position, PositionKind::Dodge | PositionKind::Fill) {
        return Err(Error::UnimplementedPositionPolicy(fg.position));
    }
    let cells = grid_len(fg, theme);
    if cells > 0 && !view.children.is_empty() && view.children.len() != cells {
        let region = view.region(&format!("{}/geom{}", view.name, fg.geom_id));
        let drawn = draw_geom(region, fg, theme, only)?;
        view.children.push(drawn);
        return Ok(view);
    }
    let mut view = create_layout(view, fg, theme);
    let view_map = calc_view_map(fg);
    for group in fg.groups.iter().filter(|g| only.map_or(true, |label| &g.label == label)) {
        draw_group(&mut view, &view_map, fg, group, theme)?;
    }
    Ok(view)
}

fn cell_of(view_map: &ViewMap, fg: &FilledGeom, x: &Value, y: &Value) -> Result<Option<usize>> {
    if view_map.is_empty() {
        return Ok(None);
    }
    let key = (
        if fg.discrete_x { x.clone() } else { Value::Null },
        if fg.discrete_y { y.clone() } else { Value::Null },
    );
    view_map
        .get(&key)
        .copied()
        .map(Some)
        .ok_or_else(|| Error::UnknownLabel {
            scale: format!("{}/{}", fg.x_col, fg.y_col),
            value: format!("({}, {})", key.0, key.1),
        })
}

/// Extent along one axis: a share of a discrete cell or a span in data units.
fn span(discrete: bool, axis: Axis, start: f64, len: f64, scale: (f64, f64)) -> (Coord1D, Coord1D) {
    if discrete {
        (Coord1D::relative(start, axis), Coord1D::relative(start + len, axis))
    } else {
        (Coord1D::data(start, axis, scale), Coord1D::data(start + len, axis, scale))
    }
}

#[allow(clippy::too_many_arguments)]
fn bar_rect(
    target: &Viewport,
    fg: &FilledGeom,
    df: &DataFrame,
    idx: usize,
    x: &Value,
    y: &Value,
    widths: (f64, f64),
    style: Style,
) -> Result<GraphObject> {
    if fg.discrete_y && !fg.discrete_x {
        let y0 = axis_position(fg, target, Axis::Y, y, widths.1).pos;
        let (ymin, ymax) = span(true, Axis::Y, y0, widths.1, target.y_scale);
        let xv = x.as_f64().unwrap_or(0.0);
        return Ok(GraphObject::Rect {
            min: Coord::new(Coord1D::data(0.0, Axis::X, target.x_scale), ymin),
            max: Coord::new(Coord1D::data(xv, Axis::X, target.x_scale), ymax),
            style,
        });
    }
    let min = get_draw_pos(target, fg, df, idx, x, y, widths)?;
    let (_, xmax) = span(fg.discrete_x, Axis::X, min.x.pos, widths.0, target.x_scale);
    let ymax = if fg.discrete_y {
        Coord1D::relative(min.y.pos + widths.1, Axis::Y)
    } else {
        let (_, top) = stacked_range(fg, df, idx, y.as_f64().unwrap_or(0.0))?;
        Coord1D::data(top, Axis::Y, target.y_scale)
    };
    Ok(GraphObject::Rect {
        min,
        max: Coord::new(xmax, ymax),
        style,
    })
}

fn tile_rect(target: &Viewport, fg: &FilledGeom, df: &DataFrame, idx: usize, x: &Value, y: &Value, style: Style) -> Result<GraphObject> {
    let w = read_optional(df, fg.width.as_ref(), idx, 1.0)?;
    let h = read_optional(df, fg.height.as_ref(), idx, 1.0)?;
    let (xmin, xmax) = if fg.discrete_x {
        span(true, Axis::X, axis_position(fg, target, Axis::X, x, 1.0).pos, 1.0, target.x_scale)
    } else {
        span(false, Axis::X, x.as_f64().unwrap_or(0.0) - w / 2.0, w, target.x_scale)
    };
    let (ymin, ymax) = if fg.discrete_y {
        span(true, Axis::Y, axis_position(fg, target, Axis::Y, y, 1.0).pos, 1.0, target.y_scale)
    } else {
        span(false, Axis::Y, y.as_f64().unwrap_or(0.0) - h / 2.0, h, target.y_scale)
    };
    Ok(GraphObject::Rect {
        min: Coord::new(xmin, ymin),
        max: Coord::new(xmax, ymax),
        style,
    })
}

fn error_bar(target: &Viewport, fg: &FilledGeom, df: &DataFrame, idx: usize, x: &Value, y: &Value, widths: (f64, f64), style: Style) -> Result<GraphObject> {
    let at = get_draw_pos(target, fg, df, idx, x, y, widths)?;
    let (low, high, direction) = match (&fg.y_min, &fg.y_max) {
        (Some(_), Some(_)) => (
            Coord1D::data(read_optional(df, fg.y_min.as_ref(), idx, 0.0)?, Axis::Y, target.y_scale),
            Coord1D::data(read_optional(df, fg.y_max.as_ref(), idx, 0.0)?, Axis::Y, target.y_scale),
            Axis::Y,
        ),
        _ => (
            Coord1D::data(read_optional(df, fg.x_min.as_ref(), idx, 0.0)?, Axis::X, target.x_scale),
            Coord1D::data(read_optional(df, fg.x_max.as_ref(), idx, 0.0)?, Axis::X, target.x_scale),
            Axis::X,
        ),
    };
    Ok(GraphObject::ErrorBar {
        at,
        low,
        high,
        direction,
        style,
    })
}

/// Largest bitmap a raster geom builds; sparser grids fall back to tiles.
const MAX_RASTER_CELLS: usize = 1 << 22;

/// Grid steps spanning `extent`, `None` when the grid would be too large.
fn grid_steps(extent: f64, step: f64) -> Option<usize> {
    let n = (extent / step).round();
    (n.is_finite() && n >= 0.0 && n < MAX_RASTER_CELLS as f64).then(|| n as usize + 1)
}

/// One bitmap covering every row of a group, cells placed on a grid of the
/// group's width and height. A grid with more than [`MAX_RASTER_CELLS`]
/// cells is drawn as one rectangle per row instead.
fn raster(cells: &[(f64, f64, Style)], w: f64, h: f64, view: &Viewport) -> Vec<GraphObject> {
    let fold = |f: fn(f64, f64) -> f64, init: f64, pick: fn(&(f64, f64, Style)) -> f64| {
        cells.iter().map(pick).fold(init, f)
    };
    if cells.is_empty() || w <= 0.0 || h <= 0.0 {
        return Vec::new();
    }
    let corner = |x: f64, y: f64| Coord::new(Coord1D::data(x, Axis::X, view.x_scale), Coord1D::data(y, Axis::Y, view.y_scale));
    let rect = |x0: f64, y0: f64, x1: f64, y1: f64| (corner(x0, y0), corner(x1, y1));
    let (x_lo, x_hi) = (fold(f64::min, f64::INFINITY, |c| c.0), fold(f64::max, f64::NEG_INFINITY, |c| c.0));
    let (y_lo, y_hi) = (fold(f64::min, f64::INFINITY, |c| c.1), fold(f64::max, f64::NEG_INFINITY, |c| c.1));
    let grid = grid_steps(x_hi - x_lo, w)
        .zip(grid_steps(y_hi - y_lo, h))
        .filter(|&(columns, rows)| columns.checked_mul(rows).is_some_and(|n| n <= MAX_RASTER_CELLS));
    let Some((columns, rows)) = grid else {
        debug!(rows = cells.len(), "raster grid too sparse, drawing tiles");
        return cells
            .iter()
            .map(|&(x, y, style)| {
                let (min, max) = rect(x - w / 2.0, y - h / 2.0, x + w / 2.0, y + h / 2.0);
                GraphObject::Rect { min, max, style }
            })
            .collect();
    };
    let mut pixels = vec![Color::TRANSPARENT; columns * rows];
    for &(x, y, style) in cells {
        let col = ((x - x_lo) / w).round() as usize;
        let row = rows - 1 - ((y - y_lo) / h).round() as usize;
        pixels[row * columns + col] = style.fill();
    }
    let (min, max) = rect(x_lo - w / 2.0, y_lo - h / 2.0, x_hi + w / 2.0, y_hi + h / 2.0);
    vec![GraphObject::Raster {
        min,
        max,
        columns,
        rows,
        pixels,
    }]
}

fn draw_group(view: &mut Viewport, view_map: &ViewMap, fg: &FilledGeom, group: &GeomGroup, theme: &Theme) -> Result<()> {
    let df = &group.df;
    let gridded = fg.discrete_x || fg.discrete_y;
    let stepped = !gridded
        && (fg.kind == GeomKind::FreqPoly
            || (fg.kind == GeomKind::Histogram && fg.hist_style == HistogramDrawingStyle::Outline));
    let mut path: Vec<Coord> = Vec::new();
    let mut bins: Vec<(f64, f64)> = Vec::new();
    let mut bin_widths: Vec<f64> = Vec::new();
    let mut cells: Vec<(f64, f64, Style)> = Vec::new();
    let raster_size = (
        read_optional(df, fg.width.as_ref(), 0, 1.0).unwrap_or(1.0),
        read_optional(df, fg.height.as_ref(), 0, 1.0).unwrap_or(1.0),
    );

    for idx in drawable_rows(fg, df) {
        let Some((x, y)) = read_xy(df, idx, fg, view, theme)? else {
            continue;
        };
        let style = *group.style_at(idx);
        let cell = cell_of(view_map, fg, &x, &y)?;
        let bw_x = if needs_bin_width(fg) || fg.discrete_x {
            geom_bin_width(fg, df, idx)?
        } else {
            0.0
        };
        let bw_y = if fg.discrete_y { DISCRETE_BIN_WIDTH } else { 0.0 };
        let widths = (bw_x, bw_y);

        let obj = {
            let target: &Viewport = match cell {
                Some(i) => &view.children[i],
                None => &*view,
            };
            match fg.kind {
                GeomKind::Point => Some(GraphObject::Point {
                    at: get_draw_pos(target, fg, df, idx, &x, &y, widths)?,
                    size: style.size,
                    marker: style.marker,
                    color: style.stroke(),
                }),
                GeomKind::Text => {
                    let col = fg.text.as_deref().unwrap_or(Aesthetic::Text.column_name());
                    Some(GraphObject::Text {
                        at: get_draw_pos(target, fg, df, idx, &x, &y, widths)?,
                        text: read_text(df, idx, col, theme.text_precision)?,
                        size: style.font_size,
                        color: style.stroke(),
                    })
                }
                GeomKind::ErrorBar => Some(error_bar(target, fg, df, idx, &x, &y, widths, style)?),
                GeomKind::Tile => Some(tile_rect(target, fg, df, idx, &x, &y, style)?),
                GeomKind::Raster if gridded => Some(tile_rect(target, fg, df, idx, &x, &y, style)?),
                GeomKind::Raster => {
                    cells.push((x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0), style));
                    None
                }
                GeomKind::Bar => Some(bar_rect(target, fg, df, idx, &x, &y, widths, style)?),
                GeomKind::Histogram if fg.hist_style == HistogramDrawingStyle::Bars => {
                    Some(bar_rect(target, fg, df, idx, &x, &y, widths, style)?)
                }
                GeomKind::Histogram | GeomKind::FreqPoly if stepped => {
                    let pos = get_draw_pos(target, fg, df, idx, &x, &y, widths)?;
                    bins.push((pos.x.pos, pos.y.pos));
                    bin_widths.push(bw_x);
                    None
                }
                GeomKind::Line | GeomKind::Histogram | GeomKind::FreqPoly => {
                    let pos = get_draw_pos(target, fg, df, idx, &x, &y, widths)?;
                    path.push(match cell {
                        Some(_) => view.lift(target, pos),
                        None => pos,
                    });
                    None
                }
            }
        };
        if let Some(obj) = obj {
            match cell {
                Some(i) => view.children[i].add_obj(obj),
                None => view.add_obj(obj),
            }
        }
    }

    if !bins.is_empty() {
        let points = if fg.kind == GeomKind::Histogram {
            let mut outline = to_histogram_outline(&bins, &bin_widths, 0.0);
            if let Some(&(x_end, _)) = outline.last() {
                outline.push((x_end, 0.0));
            }
            outline
        } else {
            let first = bin_widths.first().copied().unwrap_or(0.0);
            let last = bin_widths.last().copied().unwrap_or(0.0);
            let mut points = bins;
            extend_to_baseline(&mut points, first, last, 0.0);
            points
        };
        path = points
            .into_iter()
            .map(|(x, y)| {
                Coord::new(
                    Coord1D::data(x, Axis::X, view.x_scale),
                    Coord1D::data(y, Axis::Y, view.y_scale),
                )
            })
            .collect();
    }
    if !path.is_empty() {
        view.add_obj(GraphObject::Polyline {
            points: path,
            style: group.style,
        });
    }
    for obj in raster(&cells, raster_size.0, raster_size.1, view) {
        view.add_obj(obj);
    }
    trace!(geom = fg.geom_id, label = ?group.label, rows = df.len(), "drew group");
    Ok(())
}

/// One facet panel: its title and the facet values selecting its rows.
#[derive(Debug, Clone)]
struct Panel {
    title: Option<String>,
    values: Vec<Value>,
}

/// Rows of `df` matching the panel's facet values, `None` when `df` lacks
/// a facet column.
fn facet_filter(df: &DataFrame, facet: &Facet, values: &[Value]) -> Result<Option<DataFrame>> {
    if facet
        .columns
        .iter()
        .any(|f| matches!(f, Formula::Column(name) if !df.has_column(name)))
    {
        return Ok(None);
    }
    let columns = facet
        .columns
        .iter()
        .map(|f| f.evaluate(df))
        .collect::<Result<Vec<_>>>()?;
    let rows: Vec<usize> = (0..df.len())
        .filter(|&r| columns.iter().zip(values).all(|(c, v)| &c.value(r) == v))
        .collect();
    Ok(Some(df.take(&rows)))
}

/// Panels for every facet value combination present in the data, in label order.
fn partition_panels(plot: &Plot, scales: &ScaleSet) -> Result<Vec<Panel>> {
    let Some(facet) = &plot.facet else {
        return Ok(vec![Panel {
            title: None,
            values: Vec::new(),
        }]);
    };
    let columns = facet
        .columns
        .iter()
        .map(|f| f.evaluate(&plot.data))
        .collect::<Result<Vec<_>>>()?;
    let mut combos: BTreeMap<Vec<usize>, Vec<Value>> = BTreeMap::new();
    for row in 0..plot.data.len() {
        let values: Vec<Value> = columns.iter().map(|c| c.value(row)).collect();
        let order = values
            .iter()
            .zip(&scales.facets)
            .map(|(v, s)| s.label_seq().iter().position(|l| l == v).unwrap_or(usize::MAX))
            .collect();
        combos.entry(order).or_insert(values);
    }
    Ok(combos
        .into_values()
        .map(|values| {
            let title = facet
                .columns
                .iter()
                .zip(&values)
                .map(|(f, v)| format!("{} = {}", f, v))
                .collect::<Vec<_>>()
                .join(", ");
            Panel {
                title: Some(title),
                values,
            }
        })
        .collect())
}

/// Grid of (rows, cols) holding `n_panels`: square-ish unless the facet
/// fixes the number of columns.
pub fn grid_dimensions(n_panels: usize, facet: Option<&Facet>) -> (usize, usize) {
    let n = n_panels.max(1);
    if let Some(cols) = facet.and_then(|f| f.ncol).filter(|&c| c > 0) {
        return (n.div_ceil(cols), cols);
    }
    let cols = (n as f64).sqrt().ceil() as usize;
    (n.div_ceil(cols), cols)
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

fn merge(acc: Option<(f64, f64)>, r: (f64, f64)) -> Option<(f64, f64)> {
    Some(match acc {
        None => r,
        Some((lo, hi)) => (lo.min(r.0), hi.max(r.1)),
    })
}

/// Padded x and y scales of every panel under the facet's sharing mode.
fn panel_scales(geoms: &[Vec<FilledGeom>], mode: FacetScales) -> Vec<((f64, f64), (f64, f64))> {
    let local: Vec<(Option<(f64, f64)>, Option<(f64, f64)>)> = geoms
        .iter()
        .map(|panel| {
            let x = panel.iter().filter(|g| !g.discrete_x && g.row_count() > 0).fold(None, |acc, g| merge(acc, g.x_scale));
            let y = panel.iter().filter(|g| !g.discrete_y && g.row_count() > 0).fold(None, |acc, g| merge(acc, g.y_scale));
            (x, y)
        })
        .collect();
    let global_x = local.iter().filter_map(|(x, _)| *x).fold(None, merge);
    let global_y = local.iter().filter_map(|(_, y)| *y).fold(None, merge);
    local
        .into_iter()
        .map(|(x, y)| {
            let x = match mode {
                FacetScales::Fixed | FacetScales::FreeY => global_x,
                FacetScales::FreeX | FacetScales::Free => x,
            };
            let y = match mode {
                FacetScales::Fixed | FacetScales::FreeX => global_y,
                FacetScales::FreeY | FacetScales::Free => y,
            };
            let (x_lo, x_hi) = x.unwrap_or((0.0, 1.0));
            let (y_lo, y_hi) = y.unwrap_or((0.0, 1.0));
            (pad_range(x_lo, x_hi), pad_range(y_lo, y_hi))
        })
        .collect()
}

/// Round tick positions covering `range`, about `n` of them.
pub fn nice_ticks(range: (f64, f64), n: usize) -> Vec<f64> {
    let (lo, hi) = range;
    if !(hi > lo) || n == 0 {
        return Vec::new();
    }
    let raw = (hi - lo) / n as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let step = [1.0, 2.0, 2.5, 5.0, 10.0]
        .iter()
        .map(|m| m * magnitude)
        .find(|s| *s >= raw)
        .unwrap_or(10.0 * magnitude);
    let mut ticks = Vec::new();
    let mut t = (lo / step).ceil() * step;
    while t <= hi + step * 1e-9 {
        ticks.push(if t.abs() < step * 1e-9 { 0.0 } else { t });
        t += step;
    }
    ticks
}

fn format_tick(v: f64) -> String {
    if (v - v.round()).abs() < 1e-9 {
        format!("{:.0}", v)
    } else {
        let s = format!("{:.3}", v);
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn axis_text(at: Coord, text: String, theme: &Theme) -> GraphObject {
    GraphObject::Text {
        at,
        text,
        size: theme.font_size * 0.8,
        color: theme.color,
    }
}

/// Tick or category labels along the bottom and left of a panel.
fn add_axis_labels(view: &mut Viewport, fg: Option<&FilledGeom>, scales: &ScaleSet, theme: &Theme) {
    let below = Coord1D::points(view.height + theme.font_size, Axis::Y);
    let left = Coord1D::points(-theme.font_size * 2.0, Axis::X);
    let mut labels = Vec::new();

    match fg.filter(|g| g.discrete_x) {
        Some(g) => {
            let y0 = g.y_label_seq.first().cloned().filter(|_| g.discrete_y).unwrap_or(Value::Null);
            let map = calc_view_map(g);
            for label in &g.x_label_seq {
                if let Some(child) = map.get(&(label.clone(), y0.clone())).and_then(|&i| view.children.get(i)) {
                    let c = view.lift(child, Coord::new(Coord1D::relative(0.5, Axis::X), Coord1D::relative(0.0, Axis::Y)));
                    labels.push(axis_text(Coord::new(c.x, below), label.to_string(), theme));
                }
            }
        }
        None => {
            let x = scales.get(Aesthetic::X);
            let inverse = x.and_then(|s| s.transform_pair()).map(|(_, inv)| inv);
            let ticks = match x.and_then(|s| s.breaks.clone()) {
                Some(breaks) => breaks,
                None => nice_ticks(view.x_scale, x.and_then(|s| s.num_ticks).unwrap_or(5)),
            };
            for t in ticks {
                let text = format_tick(inverse.map_or(t, |inv| inv(t)));
                labels.push(axis_text(Coord::new(Coord1D::data(t, Axis::X, view.x_scale), below), text, theme));
            }
        }
    }

    match fg.filter(|g| g.discrete_y) {
        Some(g) => {
            let x0 = g.x_label_seq.first().cloned().filter(|_| g.discrete_x).unwrap_or(Value::Null);
            let map = calc_view_map(g);
            for label in &g.y_label_seq {
                if let Some(child) = map.get(&(x0.clone(), label.clone())).and_then(|&i| view.children.get(i)) {
                    let c = view.lift(child, Coord::new(Coord1D::relative(0.0, Axis::X), Coord1D::relative(0.5, Axis::Y)));
                    labels.push(axis_text(Coord::new(left, c.y), label.to_string(), theme));
                }
            }
        }
        None => {
            let y = scales.get(Aesthetic::Y);
            let inverse = y.and_then(|s| s.transform_pair()).map(|(_, inv)| inv);
            let ticks = match y.and_then(|s| s.breaks.clone()) {
                Some(breaks) => breaks,
                None => nice_ticks(view.y_scale, y.and_then(|s| s.num_ticks).unwrap_or(5)),
            };
            for t in ticks {
                let text = format_tick(inverse.map_or(t, |inv| inv(t)));
                labels.push(axis_text(Coord::new(left, Coord1D::data(t, Axis::Y, view.y_scale)), text, theme));
            }
        }
    }
    for label in labels {
        view.add_obj(label);
    }
}

fn centered_text(text: &str, size: f64, theme: &Theme) -> GraphObject {
    GraphObject::Text {
        at: Coord::new(Coord1D::relative(0.5, Axis::X), Coord1D::relative(0.5, Axis::Y)),
        text: text.to_string(),
        size,
        color: theme.color,
    }
}

/// Resolves the plot's scales, fills every layer of every facet panel and
/// draws them into a viewport tree the size of the output image.
pub fn render_plot(plot: &Plot) -> Result<Viewport> {
    let theme = &plot.theme;
    let scales = collect_scales(plot)?;
    let panels = partition_panels(plot, &scales)?;

    let mut geoms = Vec::with_capacity(panels.len());
    for panel in &panels {
        let mut panel_geoms = Vec::with_capacity(plot.layers.len());
        for layer in &plot.layers {
            let data = plot.layer_data(layer);
            let filtered = match &plot.facet {
                Some(facet) => facet_filter(data, facet, &panel.values)?,
                None => None,
            };
            panel_geoms.push(fill_geom(filtered.as_ref().unwrap_or(data), layer, &scales, theme)?);
        }
        geoms.push(panel_geoms);
    }
    let mode = plot.facet.as_ref().map_or(FacetScales::Fixed, |f| f.scales);
    let ranges = panel_scales(&geoms, mode);
    let (nrow, ncol) = grid_dimensions(panels.len(), plot.facet.as_ref());
    info!(panels = panels.len(), nrow, ncol, layers = plot.layers.len(), "rendering plot");

    let title_height = if plot.labels.title.is_some() { 30.0 } else { 10.0 };
    let mut root = Viewport::new("plot", plot.width, plot.height);
    root.layout(
        3,
        3,
        &[Quantity::Points(70.0), Quantity::Relative(0.0), Quantity::Points(20.0)],
        &[Quantity::Points(title_height), Quantity::Relative(0.0), Quantity::Points(50.0)],
    );
    if let Some(title) = &plot.labels.title {
        root.children[1].add_obj(centered_text(title, theme.font_size * 1.4, theme));
    }
    let x_label = plot.labels.x_label.clone().or_else(|| scales.get(Aesthetic::X).map(|s| s.name.clone()));
    if let Some(label) = x_label {
        let mut obj = centered_text(&label, theme.font_size, theme);
        if let GraphObject::Text { at, .. } = &mut obj {
            at.y = Coord1D::relative(0.75, Axis::Y);
        }
        root.children[7].add_obj(obj);
    }
    let y_label = plot.labels.y_label.clone().or_else(|| scales.get(Aesthetic::Y).map(|s| s.name.clone()));
    if let Some(label) = y_label {
        let mut obj = centered_text(&label, theme.font_size, theme);
        if let GraphObject::Text { at, .. } = &mut obj {
            at.x = Coord1D::relative(0.15, Axis::X);
        }
        root.children[3].add_obj(obj);
    }

    let mut area = std::mem::take(&mut root.children[4]);
    area.layout(ncol, nrow, &[], &[]);
    let strip = if plot.facet.is_some() { 20.0 } else { 0.0 };
    for (i, ((panel, panel_geoms), (x_scale, y_scale))) in panels.iter().zip(&geoms).zip(ranges).enumerate() {
        let mut cell = std::mem::take(&mut area.children[i]);
        cell.layout(1, 2, &[], &[Quantity::Points(strip), Quantity::Relative(0.0)]);
        if let Some(title) = &panel.title {
            cell.children[0].add_obj(centered_text(title, theme.font_size * 0.9, theme));
        }

        let mut view = std::mem::take(&mut cell.children[1]).with_scales(x_scale, y_scale);
        let mut background = Style::for_geom(GeomKind::Tile, theme);
        background.fill_color = Color::rgb(0.92, 0.92, 0.92);
        view.add_obj(GraphObject::Rect {
            min: Coord::new(Coord1D::relative(0.0, Axis::X), Coord1D::relative(1.0, Axis::Y)),
            max: Coord::new(Coord1D::relative(1.0, Axis::X), Coord1D::relative(0.0, Axis::Y)),
            style: background,
        });
        for fg in panel_geoms {
            view = draw_geom(view, fg, theme, None)?;
        }
        let gridded = panel_geoms.iter().find(|g| g.discrete_x || g.discrete_y);
        add_axis_labels(&mut view, gridded, &scales, theme);
        debug!(panel = i, objects = view.object_count(), "drew panel");

        cell.children[1] = view;
        area.children[i] = cell;
    }
    root.children[4] = area;
    Ok(root)
}
