//! Geoms filled with data: per layer, the rows are split into groups sharing
//! one discrete style, and everything the draw driver needs is collected in a
//! [`FilledGeom`].

use crate::data::{Column, DataFrame, Value};
use crate::error::{Error, Result};
use crate::palette::{Color, LineType, MarkerKind};
use crate::plot::Layer;
use crate::scale::{Aesthetic, FilledScale, ScaleSet, ScaleValue};
use crate::theme::Theme;
use std::collections::BTreeMap;
use tracing::debug;

/// Per row bin widths of pre-binned data.
pub const BIN_WIDTHS_COL: &str = "binWidths";
/// Lower ends of stacked values.
pub const PREV_VALS_COL: &str = "prevVals";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeomKind {
    Point,
    Line,
    ErrorBar,
    Bar,
    Histogram,
    FreqPoly,
    Tile,
    Raster,
    Text,
}

impl GeomKind {
    /// Geoms drawn as filled areas.
    pub fn is_area(self) -> bool {
        matches!(self, GeomKind::Bar | GeomKind::Histogram | GeomKind::Tile | GeomKind::Raster)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PositionKind {
    #[default]
    Identity,
    Stack,
    Dodge,
    Fill,
}

/// Where inside its bin a value is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinPosition {
    #[default]
    None,
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistogramDrawingStyle {
    #[default]
    Bars,
    Outline,
}

/// Resolved drawing style of a group or a row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Style {
    pub color: Color,
    pub fill_color: Color,
    pub size: f64,
    pub line_width: f64,
    pub line_type: LineType,
    pub marker: MarkerKind,
    pub alpha: f64,
    pub font_size: f64,
}

impl Style {
    /// Theme defaults for a geom kind.
    pub fn for_geom(kind: GeomKind, theme: &Theme) -> Self {
        let mut style = Style {
            color: theme.color,
            fill_color: theme.fill_color,
            size: theme.point_size,
            line_width: theme.line_width,
            line_type: LineType::Solid,
            marker: MarkerKind::Circle,
            alpha: 1.0,
            font_size: theme.font_size,
        };
        match kind {
            GeomKind::Line | GeomKind::FreqPoly | GeomKind::ErrorBar => {
                style.fill_color = Color::TRANSPARENT;
            }
            GeomKind::Bar | GeomKind::Histogram | GeomKind::Tile | GeomKind::Raster => {
                style.color = Color::TRANSPARENT;
            }
            GeomKind::Point | GeomKind::Text => {}
        }
        style
    }

    /// Merges one scale value into the style. On area geoms a color also
    /// sets the fill, a later fill value overrides it.
    pub fn apply(&mut self, kind: GeomKind, aesthetic: Aesthetic, value: ScaleValue, range: (f64, f64)) {
        match (aesthetic, value) {
            (Aesthetic::Fill, ScaleValue::Color(c)) => self.fill_color = c,
            (_, ScaleValue::Color(c)) => {
                self.color = c;
                if kind.is_area() {
                    self.fill_color = c;
                }
            }
            (_, ScaleValue::Size(s)) => {
                self.size = s;
                self.line_width = s;
            }
            (_, ScaleValue::RelativeSize(t)) => {
                let s = range.0 + t * (range.1 - range.0);
                self.size = s;
                self.line_width = s;
            }
            (_, ScaleValue::Alpha(a)) => self.alpha = a,
            (_, ScaleValue::Shape { marker, line_type }) => {
                self.marker = marker;
                self.line_type = line_type;
            }
        }
    }

    pub fn stroke(&self) -> Color {
        self.color.with_alpha(self.color.a * self.alpha)
    }

    pub fn fill(&self) -> Color {
        self.fill_color.with_alpha(self.fill_color.a * self.alpha)
    }
}

/// Discrete labels identifying a group, keyed by the channel they come from.
pub type GroupKey = BTreeMap<Aesthetic, Value>;

#[derive(Debug, Clone)]
pub struct GeomGroup {
    pub label: GroupKey,
    pub style: Style,
    /// Per row styles when a continuous style scale applies, else empty.
    pub styles: Vec<Style>,
    pub df: DataFrame,
}

impl GeomGroup {
    pub fn style_at(&self, idx: usize) -> &Style {
        self.styles.get(idx).unwrap_or(&self.style)
    }
}

/// A layer's geom with its data split into drawable groups.
#[derive(Debug, Clone)]
pub struct FilledGeom {
    pub geom_id: u16,
    pub kind: GeomKind,
    pub position: PositionKind,
    pub bin_position: BinPosition,
    pub hist_style: HistogramDrawingStyle,
    pub x_col: String,
    pub y_col: String,
    pub x_min: Option<String>,
    pub x_max: Option<String>,
    pub y_min: Option<String>,
    pub y_max: Option<String>,
    pub width: Option<String>,
    pub height: Option<String>,
    pub text: Option<String>,
    pub discrete_x: bool,
    pub discrete_y: bool,
    pub x_label_seq: Vec<Value>,
    pub y_label_seq: Vec<Value>,
    pub x_scale: (f64, f64),
    pub y_scale: (f64, f64),
    pub groups: Vec<GeomGroup>,
}

impl FilledGeom {
    pub fn new(geom_id: u16, kind: GeomKind) -> Self {
        FilledGeom {
            geom_id,
            kind,
            position: PositionKind::Identity,
            bin_position: BinPosition::None,
            hist_style: HistogramDrawingStyle::Bars,
            x_col: Aesthetic::X.column_name().to_string(),
            y_col: Aesthetic::Y.column_name().to_string(),
            x_min: None,
            x_max: None,
            y_min: None,
            y_max: None,
            width: None,
            height: None,
            text: None,
            discrete_x: false,
            discrete_y: false,
            x_label_seq: Vec::new(),
            y_label_seq: Vec::new(),
            x_scale: (0.0, 1.0),
            y_scale: (0.0, 1.0),
            groups: Vec::new(),
        }
    }

    /// Cells along x: one per label, or one for a continuous axis.
    pub fn num_x(&self) -> usize {
        if self.discrete_x {
            self.x_label_seq.len()
        } else {
            1
        }
    }

    pub fn num_y(&self) -> usize {
        if self.discrete_y {
            self.y_label_seq.len()
        } else {
            1
        }
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|g| g.df.len()).sum()
    }
}

const DATA_CHANNELS: [Aesthetic; 10] = [
    Aesthetic::X,
    Aesthetic::Y,
    Aesthetic::XMin,
    Aesthetic::XMax,
    Aesthetic::YMin,
    Aesthetic::YMax,
    Aesthetic::Width,
    Aesthetic::Height,
    Aesthetic::Weight,
    Aesthetic::Text,
];

const STYLE_CHANNELS: [Aesthetic; 5] = [
    Aesthetic::Color,
    Aesthetic::Fill,
    Aesthetic::Alpha,
    Aesthetic::Size,
    Aesthetic::Shape,
];

/// Evaluated channel data; transformed position scales store transformed values.
fn channel_column(scale: &FilledScale, data: &DataFrame) -> Result<Column> {
    let column = scale.col.evaluate(data)?;
    Ok(match scale.transform_pair() {
        Some((forward, _)) => Column::Float(
            (0..column.len())
                .map(|i| column.f64_at(i).map_or(f64::NAN, forward))
                .collect(),
        ),
        None => column,
    })
}

fn extend(range: &mut (f64, f64), v: f64) {
    if v.is_finite() {
        range.0 = range.0.min(v);
        range.1 = range.1.max(v);
    }
}

fn extend_by_column(range: &mut (f64, f64), groups: &[GeomGroup], col: Option<&String>) {
    let Some(col) = col else { return };
    for group in groups {
        if let Ok(column) = group.df.column(col) {
            if let Some((lo, hi)) = column.min_max() {
                extend(range, lo);
                extend(range, hi);
            }
        }
    }
}

/// Half the largest tile extent in `col`, defaulting to tiles of size one.
fn half_extent(groups: &[GeomGroup], col: Option<&String>) -> f64 {
    let widest = col
        .and_then(|c| {
            groups
                .iter()
                .filter_map(|g| g.df.column(c).ok().and_then(Column::min_max))
                .map(|(_, hi)| hi)
                .reduce(f64::max)
        })
        .unwrap_or(1.0);
    widest / 2.0
}

/// Fills the running stack of every x value, group after group, into the
/// [`PREV_VALS_COL`] column. Returns the highest stacked value.
fn stack_groups(groups: &mut [GeomGroup], x_col: &str, y_col: &str) -> Result<f64> {
    let mut running: BTreeMap<Value, f64> = BTreeMap::new();
    let mut top = f64::NEG_INFINITY;
    for group in groups.iter_mut() {
        let prev = {
            let xs = group.df.column(x_col)?;
            let ys = group.df.column(y_col)?;
            (0..group.df.len())
                .map(|i| {
                    let base = running.get(&xs.value(i)).copied().unwrap_or(0.0);
                    let stacked = base + ys.f64_at(i).unwrap_or(0.0);
                    running.insert(xs.value(i), stacked);
                    top = top.max(stacked);
                    base
                })
                .collect::<Vec<f64>>()
        };
        group.df.insert(PREV_VALS_COL, Column::Float(prev))?;
    }
    Ok(top)
}

/// Splits a layer's rows into groups of equal discrete style values, ordered
/// by the scales' label sequences, and resolves every style.
pub fn fill_geom(data: &DataFrame, layer: &Layer, scales: &ScaleSet, theme: &Theme) -> Result<FilledGeom> {
    let id = layer.id;
    let missing = |aesthetic: Aesthetic| Error::MissingAesthetic {
        aesthetic: aesthetic.column_name().to_string(),
        layer: id,
    };
    let x = scales.for_layer(Aesthetic::X, id).ok_or_else(|| missing(Aesthetic::X))?;
    let y = scales.for_layer(Aesthetic::Y, id).ok_or_else(|| missing(Aesthetic::Y))?;

    let mut fg = FilledGeom::new(id, layer.kind);
    fg.position = layer.position;
    fg.bin_position = layer.bin_position;
    fg.hist_style = layer.hist_style;
    fg.discrete_x = x.is_discrete();
    fg.discrete_y = y.is_discrete();
    fg.x_label_seq = x.label_seq().to_vec();
    fg.y_label_seq = y.label_seq().to_vec();

    let mut full = data.clone();
    for aesthetic in DATA_CHANNELS {
        let Some(scale) = scales.for_layer(aesthetic, id) else {
            continue;
        };
        full.insert(aesthetic.column_name(), channel_column(scale, data)?)?;
        let name = Some(aesthetic.column_name().to_string());
        match aesthetic {
            Aesthetic::XMin => fg.x_min = name,
            Aesthetic::XMax => fg.x_max = name,
            Aesthetic::YMin => fg.y_min = name,
            Aesthetic::YMax => fg.y_max = name,
            Aesthetic::Width => fg.width = name,
            Aesthetic::Height => fg.height = name,
            Aesthetic::Text => fg.text = name,
            _ => {}
        }
    }
    if layer.kind == GeomKind::Text && fg.text.is_none() {
        return Err(missing(Aesthetic::Text));
    }
    if layer.kind == GeomKind::ErrorBar
        && !(fg.y_min.is_some() && fg.y_max.is_some())
        && !(fg.x_min.is_some() && fg.x_max.is_some())
    {
        return Err(missing(Aesthetic::YMin));
    }

    let (grouping, per_row): (Vec<&FilledScale>, Vec<&FilledScale>) = STYLE_CHANNELS
        .iter()
        .filter_map(|&a| scales.for_layer(a, id))
        .partition(|s| s.is_discrete());

    let key_cols = grouping
        .iter()
        .map(|s| s.col.evaluate(data))
        .collect::<Result<Vec<_>>>()?;
    let mut rows_by_key: BTreeMap<Vec<Value>, Vec<usize>> = BTreeMap::new();
    for row in 0..data.len() {
        let key = key_cols.iter().map(|c| c.value(row)).collect();
        rows_by_key.entry(key).or_default().push(row);
    }
    let mut keyed: Vec<(Vec<usize>, Vec<Value>, Vec<usize>)> = rows_by_key
        .into_iter()
        .map(|(key, rows)| {
            let order = key
                .iter()
                .zip(&grouping)
                .map(|(v, s)| s.label_seq().iter().position(|l| l == v).unwrap_or(usize::MAX))
                .collect();
            (order, key, rows)
        })
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0));

    for (_, key, rows) in keyed {
        let mut style = Style::for_geom(layer.kind, theme);
        let mut label = GroupKey::new();
        for (scale, value) in grouping.iter().zip(&key) {
            style.apply(layer.kind, scale.aesthetic, scale.get_value(value)?, scale.range);
            label.insert(scale.aesthetic, value.clone());
        }
        let df = full.take(&rows);
        let styles = if per_row.is_empty() {
            Vec::new()
        } else {
            let mapped = per_row
                .iter()
                .map(|s| Ok((*s, s.map_data(&df)?)))
                .collect::<Result<Vec<_>>>()?;
            (0..df.len())
                .map(|i| {
                    let mut row_style = style;
                    for (scale, values) in &mapped {
                        if let Some(value) = values.get(i) {
                            row_style.apply(layer.kind, scale.aesthetic, *value, scale.range);
                        }
                    }
                    row_style
                })
                .collect()
        };
        fg.groups.push(GeomGroup { label, style, styles, df });
    }

    if !fg.discrete_x {
        let mut range = x.data_scale().unwrap_or((0.0, 1.0));
        extend_by_column(&mut range, &fg.groups, fg.x_min.as_ref());
        extend_by_column(&mut range, &fg.groups, fg.x_max.as_ref());
        if matches!(layer.kind, GeomKind::Tile | GeomKind::Raster) {
            let half = half_extent(&fg.groups, fg.width.as_ref());
            range = (range.0 - half, range.1 + half);
        }
        fg.x_scale = range;
    }
    if !fg.discrete_y {
        let mut range = y.data_scale().unwrap_or((0.0, 1.0));
        extend_by_column(&mut range, &fg.groups, fg.y_min.as_ref());
        extend_by_column(&mut range, &fg.groups, fg.y_max.as_ref());
        if matches!(layer.kind, GeomKind::Bar | GeomKind::Histogram) && !fg.discrete_x {
            extend(&mut range, 0.0);
        }
        if matches!(layer.kind, GeomKind::Tile | GeomKind::Raster) {
            let half = half_extent(&fg.groups, fg.height.as_ref());
            range = (range.0 - half, range.1 + half);
        }
        fg.y_scale = range;
    }
    if fg.discrete_x && !fg.discrete_y && layer.kind.is_area() {
        extend(&mut fg.y_scale, 0.0);
    }
    if fg.discrete_y && !fg.discrete_x && layer.kind.is_area() {
        extend(&mut fg.x_scale, 0.0);
    }
    if layer.position == PositionKind::Stack {
        let top = stack_groups(&mut fg.groups, &fg.x_col, &fg.y_col)?;
        extend(&mut fg.y_scale, top);
        extend(&mut fg.y_scale, 0.0);
    }

    debug!(
        layer = id,
        kind = ?layer.kind,
        groups = fg.groups.len(),
        rows = fg.row_count(),
        "filled geom"
    );
    Ok(fg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Formula;
    use crate::plot::Plot;
    use crate::scale::collect_scales;

    fn data() -> DataFrame {
        DataFrame::new()
            .with_column("x", vec!["a", "b", "a", "b"])
            .unwrap()
            .with_column("y", vec![1.0, 2.0, 3.0, 4.0])
            .unwrap()
            .with_column("g", vec!["u", "u", "v", "v"])
            .unwrap()
            .with_column("w", vec![0.0, 1.0, 2.0, 4.0])
            .unwrap()
    }

    fn plot(layer: Layer) -> Plot {
        Plot::new(data())
            .aes(Aesthetic::X, Formula::col("x"))
            .aes(Aesthetic::Y, Formula::col("y"))
            .layer(layer)
    }

    fn filled(plot: &Plot) -> FilledGeom {
        let scales = collect_scales(plot).unwrap();
        fill_geom(&plot.data, &plot.layers[0], &scales, &plot.theme).unwrap()
    }

    #[test]
    fn test_single_group_without_style_scales() {
        let fg = filled(&plot(Layer::new(GeomKind::Point)));
        assert_eq!(fg.groups.len(), 1);
        assert_eq!(fg.row_count(), 4);
        assert!(fg.discrete_x);
        assert_eq!(fg.x_label_seq, vec![Value::from("a"), Value::from("b")]);
        assert_eq!(fg.y_scale, (1.0, 4.0));
    }

    #[test]
    fn test_groups_follow_label_order() {
        let scale = crate::scale::Scale::new(Aesthetic::Color, Formula::col("g")).reversed();
        let fg = filled(&plot(Layer::new(GeomKind::Point).scale(scale)));
        assert_eq!(fg.groups.len(), 2);
        assert_eq!(fg.groups[0].label[&Aesthetic::Color], Value::from("v"));
        assert_eq!(fg.groups[1].df.len(), 2);
        assert_ne!(fg.groups[0].style.color, fg.groups[1].style.color);
    }

    #[test]
    fn test_setting_color_applies() {
        let layer = Layer::new(GeomKind::Bar).aes(Aesthetic::Color, Formula::constant("red"));
        let fg = filled(&plot(layer));
        assert_eq!(fg.groups.len(), 1);
        assert_eq!(fg.groups[0].style.fill_color.to_rgba8(), [255, 0, 0, 255]);
        assert_eq!(fg.y_scale, (0.0, 4.0));
    }

    #[test]
    fn test_continuous_style_is_per_row() {
        let layer = Layer::new(GeomKind::Point).aes(Aesthetic::Size, Formula::col("w"));
        let fg = filled(&plot(layer));
        let group = &fg.groups[0];
        assert_eq!(group.styles.len(), 4);
        assert_eq!(group.style_at(0).size, 2.0);
        assert_eq!(group.style_at(3).size, 7.0);
    }

    #[test]
    fn test_stack_fills_prev_vals() {
        let layer = Layer::new(GeomKind::Bar)
            .aes(Aesthetic::Fill, Formula::col("g"))
            .with_position(PositionKind::Stack);
        let fg = filled(&plot(layer));
        let second = &fg.groups[1];
        assert_eq!(second.df.column(PREV_VALS_COL).unwrap(), &Column::Float(vec![1.0, 2.0]));
        assert_eq!(fg.y_scale, (0.0, 6.0));
    }

    #[test]
    fn test_missing_text_aesthetic() {
        let plot = plot(Layer::new(GeomKind::Text));
        let scales = collect_scales(&plot).unwrap();
        let res = fill_geom(&plot.data, &plot.layers[0], &scales, &plot.theme);
        assert!(matches!(res, Err(Error::MissingAesthetic { .. })));
    }

    #[test]
    fn test_style_alpha_combines() {
        let mut style = Style::for_geom(GeomKind::Point, &Theme::default());
        style.apply(GeomKind::Point, Aesthetic::Alpha, ScaleValue::Alpha(0.5), (0.0, 1.0));
        assert_eq!(style.stroke().a, 0.5);
        style.apply(GeomKind::Point, Aesthetic::Size, ScaleValue::RelativeSize(0.5), (2.0, 4.0));
        assert_eq!(style.size, 3.0);
    }
}
