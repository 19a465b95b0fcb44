// Plot description: data, aesthetic mappings, layers, facets and labels

use crate::data::{DataFrame, Formula};
use crate::geom::{BinPosition, GeomKind, HistogramDrawingStyle, PositionKind};
use crate::scale::{Aesthetic, Scale};
use crate::theme::Theme;
use std::collections::BTreeMap;

/// Aesthetic mappings (channel → scale request)
#[derive(Debug, Clone, Default)]
pub struct Aesthetics {
    scales: BTreeMap<Aesthetic, Scale>,
}

impl Aesthetics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a channel with the default request for `formula`.
    pub fn map(&mut self, aesthetic: Aesthetic, formula: Formula) {
        self.scales.insert(aesthetic, Scale::new(aesthetic, formula));
    }

    /// Maps a channel with a fully configured request.
    pub fn set(&mut self, scale: Scale) {
        self.scales.insert(scale.aesthetic, scale);
    }

    pub fn get(&self, aesthetic: Aesthetic) -> Option<&Scale> {
        self.scales.get(&aesthetic)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Scale> {
        self.scales.values()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }
}

/// Individual visualization layer
#[derive(Debug, Clone)]
pub struct Layer {
    /// Assigned by [`Plot::layer`].
    pub id: u16,
    pub kind: GeomKind,
    /// Overrides of the plot level mappings
    pub aes: Aesthetics,
    /// Data replacing the plot's data for this layer
    pub data: Option<DataFrame>,
    pub position: PositionKind,
    pub bin_position: BinPosition,
    pub hist_style: HistogramDrawingStyle,
}

impl Layer {
    /// Histograms read left bin edges, frequency polygons draw at bin centers.
    pub fn new(kind: GeomKind) -> Self {
        let bin_position = match kind {
            GeomKind::Histogram => BinPosition::Left,
            GeomKind::FreqPoly => BinPosition::Center,
            _ => BinPosition::None,
        };
        Layer {
            id: 0,
            kind,
            aes: Aesthetics::new(),
            data: None,
            position: PositionKind::Identity,
            bin_position,
            hist_style: HistogramDrawingStyle::Bars,
        }
    }

    pub fn aes(mut self, aesthetic: Aesthetic, formula: Formula) -> Self {
        self.aes.map(aesthetic, formula);
        self
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.aes.set(scale);
        self
    }

    pub fn with_data(mut self, data: DataFrame) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_position(mut self, position: PositionKind) -> Self {
        self.position = position;
        self
    }

    pub fn with_bin_position(mut self, bin_position: BinPosition) -> Self {
        self.bin_position = bin_position;
        self
    }

    pub fn with_hist_style(mut self, hist_style: HistogramDrawingStyle) -> Self {
        self.hist_style = hist_style;
        self
    }
}

/// Facet axis scale sharing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FacetScales {
    /// All facets share the same x and y ranges (default)
    #[default]
    Fixed,
    /// Independent x ranges, shared y range
    FreeX,
    /// Shared x range, independent y ranges
    FreeY,
    /// Independent x and y ranges for each facet
    Free,
}

/// Facet specification for creating subplot grids
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    /// One panel per combination of the values of these columns
    pub columns: Vec<Formula>,
    /// Number of columns in the grid layout (auto-calculated if None)
    pub ncol: Option<usize>,
    pub scales: FacetScales,
}

/// Plot labels (title, axes)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Labels {
    pub title: Option<String>,
    pub x_label: Option<String>,
    pub y_label: Option<String>,
}

/// Complete plot description
#[derive(Debug, Clone)]
pub struct Plot {
    pub data: DataFrame,
    pub aes: Aesthetics,
    pub layers: Vec<Layer>,
    pub facet: Option<Facet>,
    pub labels: Labels,
    pub theme: Theme,
    pub width: f64,
    pub height: f64,
}

impl Plot {
    pub fn new(data: DataFrame) -> Self {
        Plot {
            data,
            aes: Aesthetics::new(),
            layers: Vec::new(),
            facet: None,
            labels: Labels::default(),
            theme: Theme::default(),
            width: 800.0,
            height: 600.0,
        }
    }

    pub fn aes(mut self, aesthetic: Aesthetic, formula: Formula) -> Self {
        self.aes.map(aesthetic, formula);
        self
    }

    pub fn scale(mut self, scale: Scale) -> Self {
        self.aes.set(scale);
        self
    }

    /// Appends a layer, numbering it after the ones before.
    pub fn layer(mut self, mut layer: Layer) -> Self {
        layer.id = self.layers.len() as u16;
        self.layers.push(layer);
        self
    }

    pub fn facet_wrap(mut self, columns: Vec<Formula>) -> Self {
        self.facet = Some(Facet {
            columns,
            ncol: None,
            scales: FacetScales::Fixed,
        });
        self
    }

    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facet = Some(facet);
        self
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    pub fn with_labels(mut self, labels: Labels) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Data a layer draws from.
    pub fn layer_data<'a>(&'a self, layer: &'a Layer) -> &'a DataFrame {
        layer.data.as_ref().unwrap_or(&self.data)
    }
}
