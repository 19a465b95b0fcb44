//! Scale requests, resolved scales and the per-plot scale set.
//!
//! A [`Scale`] is what a plot or a layer asks for on one aesthetic channel.
//! [`collect_scales`] classifies the data behind every request, unifies the
//! requests sharing a channel and turns each of them into a [`FilledScale`]:
//! either an ordered label sequence with a total label -> value map, or a
//! numeric domain with a mapping function from a data frame to values.

pub mod collect;
pub mod discrete;
pub mod fill;

pub use collect::{call_fill_scale, collect_facet_scales, collect_scales, fill_scale, ScaleRequest};
pub use discrete::{is_discrete_data, sample_indices};
pub use fill::{fill_scale_values, ScaleDecision};

use crate::data::{DataFrame, Formula, Value};
use crate::error::{Error, Result};
use crate::palette::{Color, LineType, MarkerKind};
use crate::viewport::Axis;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

pub type TransformFn = fn(f64) -> f64;

/// A named forward/inverse function pair.
#[derive(Clone, Copy)]
pub struct Transform {
    pub name: &'static str,
    pub forward: TransformFn,
    pub inverse: TransformFn,
}

impl Transform {
    pub fn log10() -> Self {
        Transform {
            name: "log10",
            forward: f64::log10,
            inverse: |v| 10f64.powf(v),
        }
    }

    pub fn sqrt() -> Self {
        Transform {
            name: "sqrt",
            forward: f64::sqrt,
            inverse: |v| v * v,
        }
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transform({})", self.name)
    }
}

impl PartialEq for Transform {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

/// Aesthetic channels a scale can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Aesthetic {
    X,
    Y,
    XMin,
    XMax,
    YMin,
    YMax,
    Width,
    Height,
    Weight,
    Color,
    Fill,
    Alpha,
    Size,
    Shape,
    Text,
    /// Facet columns. Never part of a layer's aesthetics.
    Facet,
}

impl Aesthetic {
    /// Every channel a plot or layer can map.
    pub const ALL: [Aesthetic; 15] = [
        Aesthetic::X,
        Aesthetic::Y,
        Aesthetic::XMin,
        Aesthetic::XMax,
        Aesthetic::YMin,
        Aesthetic::YMax,
        Aesthetic::Width,
        Aesthetic::Height,
        Aesthetic::Weight,
        Aesthetic::Color,
        Aesthetic::Fill,
        Aesthetic::Alpha,
        Aesthetic::Size,
        Aesthetic::Shape,
        Aesthetic::Text,
    ];

    /// Column name the aesthetic is stored under in a geom's sub data frames.
    pub fn column_name(self) -> &'static str {
        match self {
            Aesthetic::X => "x",
            Aesthetic::Y => "y",
            Aesthetic::XMin => "xMin",
            Aesthetic::XMax => "xMax",
            Aesthetic::YMin => "yMin",
            Aesthetic::YMax => "yMax",
            Aesthetic::Width => "width",
            Aesthetic::Height => "height",
            Aesthetic::Weight => "weight",
            Aesthetic::Color => "color",
            Aesthetic::Fill => "fill",
            Aesthetic::Alpha => "alpha",
            Aesthetic::Size => "size",
            Aesthetic::Shape => "shape",
            Aesthetic::Text => "text",
            Aesthetic::Facet => "facet",
        }
    }

    pub fn default_kind(self) -> ScaleKind {
        match self {
            Aesthetic::X | Aesthetic::XMin | Aesthetic::XMax | Aesthetic::Width | Aesthetic::Facet => {
                ScaleKind::LinearData { axis: Axis::X }
            }
            Aesthetic::Y
            | Aesthetic::YMin
            | Aesthetic::YMax
            | Aesthetic::Height
            | Aesthetic::Weight => ScaleKind::LinearData { axis: Axis::Y },
            Aesthetic::Color => ScaleKind::Color,
            Aesthetic::Fill => ScaleKind::FillColor,
            Aesthetic::Alpha => ScaleKind::Alpha,
            Aesthetic::Size => ScaleKind::Size,
            Aesthetic::Shape => ScaleKind::Shape,
            Aesthetic::Text => ScaleKind::Text,
        }
    }
}

/// What kind of visual value a scale produces.
#[derive(Debug, Clone, Copy)]
pub enum ScaleKind {
    Color,
    FillColor,
    Size,
    Alpha,
    Shape,
    LinearData {
        axis: Axis,
    },
    TransformedData {
        axis: Axis,
        transform: Option<TransformFn>,
        inverse: Option<TransformFn>,
    },
    Text,
}

impl ScaleKind {
    pub fn is_position(&self) -> bool {
        matches!(self, ScaleKind::LinearData { .. } | ScaleKind::TransformedData { .. })
    }

    pub fn axis(&self) -> Option<Axis> {
        match self {
            ScaleKind::LinearData { axis } | ScaleKind::TransformedData { axis, .. } => Some(*axis),
            _ => None,
        }
    }
}

/// Whether the values vary per row or are one literal for the whole layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataKind {
    #[default]
    Mapping,
    Setting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecondaryAxis {
    pub name: String,
    pub transform: Option<Transform>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateScale {
    pub format: String,
    pub is_timestamp: bool,
}

/// One resolved visual property.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScaleValue {
    Color(Color),
    /// Absolute size.
    Size(f64),
    /// Size in [0, 1], to be placed inside the scale's size range.
    RelativeSize(f64),
    Alpha(f64),
    Shape { marker: MarkerKind, line_type: LineType },
}

/// A scale request for one channel of one plot or layer.
#[derive(Debug, Clone)]
pub struct Scale {
    pub aesthetic: Aesthetic,
    pub col: Formula,
    pub name: String,
    pub kind: ScaleKind,
    pub data_kind: DataKind,
    /// User forced discreteness; skips classification.
    pub discrete: Option<bool>,
    pub labels: Option<Vec<Value>>,
    pub value_map: Option<BTreeMap<Value, ScaleValue>>,
    /// Output range for size and alpha.
    pub range: Option<(f64, f64)>,
    /// Input domain for continuous scales.
    pub domain: Option<(f64, f64)>,
    /// Value transform applied before continuous color lookup.
    pub transform: Option<Transform>,
    pub reversed: bool,
    /// Layers this scale applies to.
    pub ids: BTreeSet<u16>,
    pub sec_axis: Option<SecondaryAxis>,
    pub date_scale: Option<DateScale>,
    pub num_ticks: Option<usize>,
    pub breaks: Option<Vec<f64>>,
}

impl Scale {
    /// A request with the aesthetic's default kind. Constant formulas are
    /// settings, column references are mappings.
    pub fn new(aesthetic: Aesthetic, col: Formula) -> Self {
        let data_kind = if col.is_constant() {
            DataKind::Setting
        } else {
            DataKind::Mapping
        };
        Scale {
            aesthetic,
            name: col.to_string(),
            col,
            kind: aesthetic.default_kind(),
            data_kind,
            discrete: None,
            labels: None,
            value_map: None,
            range: None,
            domain: None,
            transform: None,
            reversed: false,
            ids: BTreeSet::new(),
            sec_axis: None,
            date_scale: None,
            num_ticks: None,
            breaks: None,
        }
    }

    pub fn with_discrete(mut self, discrete: bool) -> Self {
        self.discrete = Some(discrete);
        self
    }

    pub fn with_labels(mut self, labels: Vec<Value>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_value_map(mut self, value_map: BTreeMap<Value, ScaleValue>) -> Self {
        self.value_map = Some(value_map);
        self
    }

    pub fn with_range(mut self, range: (f64, f64)) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_domain(mut self, domain: (f64, f64)) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Position scales become transformed data scales, other channels
    /// transform their values before lookup.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        match self.kind.axis() {
            Some(axis) => {
                self.kind = ScaleKind::TransformedData {
                    axis,
                    transform: Some(transform.forward),
                    inverse: Some(transform.inverse),
                };
            }
            None => self.transform = Some(transform),
        }
        self
    }

    pub fn with_data_kind(mut self, data_kind: DataKind) -> Self {
        self.data_kind = data_kind;
        self
    }

    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = u16>) -> Self {
        self.ids = ids.into_iter().collect();
        self
    }

    pub fn with_sec_axis(mut self, sec_axis: SecondaryAxis) -> Self {
        self.sec_axis = Some(sec_axis);
        self
    }

    pub fn with_date_scale(mut self, date_scale: DateScale) -> Self {
        self.date_scale = Some(date_scale);
        self
    }

    pub fn with_num_ticks(mut self, num_ticks: usize) -> Self {
        self.num_ticks = Some(num_ticks);
        self
    }

    pub fn with_breaks(mut self, breaks: Vec<f64>) -> Self {
        self.breaks = Some(breaks);
        self
    }
}

/// Maps the rows of a data frame to scale values.
pub type MapData = Arc<dyn Fn(&DataFrame) -> Result<Vec<ScaleValue>> + Send + Sync>;

/// The two shapes a resolved scale can take.
#[derive(Clone)]
pub enum ScaleMapping {
    Discrete {
        label_seq: Vec<Value>,
        value_map: BTreeMap<Value, ScaleValue>,
    },
    Continuous {
        data_scale: (f64, f64),
        map_data: Option<MapData>,
    },
}

impl fmt::Debug for ScaleMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScaleMapping::Discrete { label_seq, value_map } => f
                .debug_struct("Discrete")
                .field("label_seq", label_seq)
                .field("value_map", value_map)
                .finish(),
            ScaleMapping::Continuous { data_scale, map_data } => f
                .debug_struct("Continuous")
                .field("data_scale", data_scale)
                .field("map_data", &map_data.as_ref().map(|_| "<fn>"))
                .finish(),
        }
    }
}

/// A scale request after classification and value synthesis. Immutable once
/// built; every layer listed in `ids` reads the same instance.
#[derive(Debug, Clone)]
pub struct FilledScale {
    pub aesthetic: Aesthetic,
    pub col: Formula,
    pub name: String,
    pub kind: ScaleKind,
    pub data_kind: DataKind,
    pub ids: BTreeSet<u16>,
    pub reversed: bool,
    /// Output range for size and alpha values.
    pub range: (f64, f64),
    pub sec_axis: Option<SecondaryAxis>,
    pub date_scale: Option<DateScale>,
    pub num_ticks: Option<usize>,
    pub breaks: Option<Vec<f64>>,
    pub mapping: ScaleMapping,
}

impl FilledScale {
    /// Carries over everything from the request that does not depend on the data.
    pub(crate) fn from_request(scale: &Scale, range: (f64, f64), mapping: ScaleMapping) -> Self {
        FilledScale {
            aesthetic: scale.aesthetic,
            col: scale.col.clone(),
            name: scale.name.clone(),
            kind: scale.kind,
            data_kind: scale.data_kind,
            ids: scale.ids.clone(),
            reversed: scale.reversed,
            range,
            sec_axis: scale.sec_axis.clone(),
            date_scale: scale.date_scale.clone(),
            num_ticks: scale.num_ticks,
            breaks: scale.breaks.clone(),
            mapping,
        }
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self.mapping, ScaleMapping::Discrete { .. })
    }

    pub fn applies_to(&self, id: u16) -> bool {
        self.ids.contains(&id)
    }

    /// Ordered labels, empty for continuous scales.
    pub fn label_seq(&self) -> &[Value] {
        match &self.mapping {
            ScaleMapping::Discrete { label_seq, .. } => label_seq,
            ScaleMapping::Continuous { .. } => &[],
        }
    }

    pub fn value_map(&self) -> Option<&BTreeMap<Value, ScaleValue>> {
        match &self.mapping {
            ScaleMapping::Discrete { value_map, .. } => Some(value_map),
            ScaleMapping::Continuous { .. } => None,
        }
    }

    pub fn data_scale(&self) -> Option<(f64, f64)> {
        match &self.mapping {
            ScaleMapping::Continuous { data_scale, .. } => Some(*data_scale),
            ScaleMapping::Discrete { .. } => None,
        }
    }

    /// Looks up the value of one discrete label.
    pub fn get_value(&self, label: &Value) -> Result<ScaleValue> {
        self.value_map()
            .and_then(|map| map.get(label))
            .copied()
            .ok_or_else(|| Error::UnknownLabel {
                scale: self.name.clone(),
                value: label.to_string(),
            })
    }

    /// Scale values for every row of `df`. Position and text scales have
    /// nothing to map and yield an empty sequence.
    pub fn map_data(&self, df: &DataFrame) -> Result<Vec<ScaleValue>> {
        match &self.mapping {
            ScaleMapping::Discrete { value_map, .. } if value_map.is_empty() => Ok(Vec::new()),
            ScaleMapping::Discrete { .. } => {
                let column = self.col.evaluate(df)?;
                column.iter().map(|label| self.get_value(&label)).collect()
            }
            ScaleMapping::Continuous { map_data: Some(f), .. } => f(df),
            ScaleMapping::Continuous { map_data: None, .. } => Ok(Vec::new()),
        }
    }

    /// Forward and inverse transform of a transformed position scale.
    pub fn transform_pair(&self) -> Option<(TransformFn, TransformFn)> {
        match self.kind {
            ScaleKind::TransformedData {
                transform: Some(t),
                inverse: Some(i),
                ..
            } => Some((t, i)),
            _ => None,
        }
    }
}

/// All resolved scales of one plot.
#[derive(Debug, Clone, Default)]
pub struct ScaleSet {
    /// First resolved scale per channel.
    pub main: BTreeMap<Aesthetic, FilledScale>,
    /// Further scales of layers overriding a channel, in resolution order.
    pub more: Vec<FilledScale>,
    pub discrete_x: bool,
    pub discrete_y: bool,
    pub reversed_x: bool,
    pub reversed_y: bool,
    pub facets: Vec<FilledScale>,
}

impl ScaleSet {
    pub fn get(&self, aesthetic: Aesthetic) -> Option<&FilledScale> {
        self.main.get(&aesthetic)
    }

    /// Every scale of a channel, main first.
    pub fn all_for(&self, aesthetic: Aesthetic) -> impl Iterator<Item = &FilledScale> + '_ {
        self.main
            .get(&aesthetic)
            .into_iter()
            .chain(self.more.iter().filter(move |s| s.aesthetic == aesthetic))
    }

    /// The scale a given layer uses for a channel.
    pub fn for_layer(&self, aesthetic: Aesthetic, id: u16) -> Option<&FilledScale> {
        self.all_for(aesthetic).find(|s| s.applies_to(id))
    }
}
