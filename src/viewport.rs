//! Viewports, coordinates and the grid layout of discrete axes.

use crate::data::Value;
use crate::geom::FilledGeom;
use crate::ir::GraphObject;
use crate::theme::Theme;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Axis {
    X,
    Y,
}

/// A length along one side of a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Quantity {
    /// Fraction of the parent. Zero marks a cell sharing the leftover space.
    Relative(f64),
    /// Absolute pixels.
    Points(f64),
}

impl Quantity {
    pub fn to_pixels(self, parent: f64) -> f64 {
        match self {
            Quantity::Relative(f) => f * parent,
            Quantity::Points(p) => p,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    /// Fraction of the viewport, y measured from the top.
    Relative,
    /// Data units inside the carried scale, y growing upwards.
    Data,
    /// Pixels from the viewport origin.
    Points,
}

/// A position along one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord1D {
    pub pos: f64,
    pub unit: UnitKind,
    pub axis: Axis,
    /// Data scale, only meaningful for [`UnitKind::Data`].
    pub scale: (f64, f64),
}

impl Coord1D {
    pub fn relative(pos: f64, axis: Axis) -> Self {
        Coord1D {
            pos,
            unit: UnitKind::Relative,
            axis,
            scale: (0.0, 1.0),
        }
    }

    pub fn data(pos: f64, axis: Axis, scale: (f64, f64)) -> Self {
        Coord1D {
            pos,
            unit: UnitKind::Data,
            axis,
            scale,
        }
    }

    pub fn points(pos: f64, axis: Axis) -> Self {
        Coord1D {
            pos,
            unit: UnitKind::Points,
            axis,
            scale: (0.0, 1.0),
        }
    }

    /// Fraction of a side `length` pixels long.
    pub fn to_relative(&self, length: f64) -> f64 {
        match self.unit {
            UnitKind::Relative => self.pos,
            UnitKind::Points if length > 0.0 => self.pos / length,
            UnitKind::Points => 0.0,
            UnitKind::Data => {
                let (lo, hi) = self.scale;
                if hi == lo {
                    0.5
                } else {
                    (self.pos - lo) / (hi - lo)
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: Coord1D,
    pub y: Coord1D,
}

impl Coord {
    pub fn new(x: Coord1D, y: Coord1D) -> Self {
        Coord { x, y }
    }
}

/// A rectangular drawing region with its own data scales, child regions and
/// drawn objects. Geometry is in pixels of the final image.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Viewport {
    pub name: String,
    pub origin: (f64, f64),
    pub width: f64,
    pub height: f64,
    pub x_scale: (f64, f64),
    pub y_scale: (f64, f64),
    pub children: Vec<Viewport>,
    pub objects: Vec<GraphObject>,
}

fn resolve_lengths(total: f64, sizes: &[Quantity], n: usize) -> Vec<f64> {
    if sizes.len() != n {
        return vec![total / n.max(1) as f64; n];
    }
    let shared = sizes
        .iter()
        .filter(|q| matches!(q, Quantity::Relative(f) if *f == 0.0))
        .count();
    let fixed: f64 = sizes.iter().map(|q| q.to_pixels(total)).sum();
    let each = if shared > 0 {
        (total - fixed).max(0.0) / shared as f64
    } else {
        0.0
    };
    sizes
        .iter()
        .map(|q| match q {
            Quantity::Relative(f) if *f == 0.0 => each,
            q => q.to_pixels(total),
        })
        .collect()
}

impl Viewport {
    pub fn new(name: &str, width: f64, height: f64) -> Self {
        Viewport {
            name: name.to_string(),
            width,
            height,
            x_scale: (0.0, 1.0),
            y_scale: (0.0, 1.0),
            ..Default::default()
        }
    }

    pub fn with_origin(mut self, origin: (f64, f64)) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_scales(mut self, x_scale: (f64, f64), y_scale: (f64, f64)) -> Self {
        self.x_scale = x_scale;
        self.y_scale = y_scale;
        self
    }

    /// Replaces the children with a `cols` x `rows` grid, stored row by row.
    /// Zero relative sizes split whatever the other cells leave over.
    pub fn layout(&mut self, cols: usize, rows: usize, col_widths: &[Quantity], row_heights: &[Quantity]) {
        let widths = resolve_lengths(self.width, col_widths, cols);
        let heights = resolve_lengths(self.height, row_heights, rows);
        self.children.clear();
        let mut y = self.origin.1;
        for (i, h) in heights.iter().enumerate() {
            let mut x = self.origin.0;
            for (j, w) in widths.iter().enumerate() {
                self.children.push(Viewport {
                    name: format!("{}[{},{}]", self.name, i, j),
                    origin: (x, y),
                    width: *w,
                    height: *h,
                    x_scale: self.x_scale,
                    y_scale: self.y_scale,
                    children: Vec::new(),
                    objects: Vec::new(),
                });
                x += w;
            }
            y += h;
        }
    }

    /// An empty viewport over the same area with the same scales.
    pub fn region(&self, name: &str) -> Viewport {
        Viewport {
            name: name.to_string(),
            origin: self.origin,
            width: self.width,
            height: self.height,
            x_scale: self.x_scale,
            y_scale: self.y_scale,
            ..Default::default()
        }
    }

    pub fn add_obj(&mut self, obj: GraphObject) {
        self.objects.push(obj);
    }

    /// Objects in this viewport and all of its descendants.
    pub fn object_count(&self) -> usize {
        self.objects.len() + self.children.iter().map(Viewport::object_count).sum::<usize>()
    }

    /// Pixel position of `c` inside this viewport.
    pub fn to_pixels(&self, c: &Coord) -> (f64, f64) {
        let x = c.x.to_relative(self.width);
        let y = c.y.to_relative(self.height);
        let y = if c.y.unit == UnitKind::Data { 1.0 - y } else { y };
        (self.origin.0 + x * self.width, self.origin.1 + y * self.height)
    }

    /// Expresses a coordinate of `child` in this viewport's terms. Data
    /// coordinates pass through, the child spans the whole continuous axis.
    pub fn lift(&self, child: &Viewport, c: Coord) -> Coord {
        let lift = |c1: Coord1D, child_origin: f64, child_len: f64, origin: f64, len: f64| {
            if c1.unit == UnitKind::Data || len <= 0.0 {
                return c1;
            }
            let px = child_origin - origin + c1.to_relative(child_len) * child_len;
            Coord1D::relative(px / len, c1.axis)
        };
        Coord::new(
            lift(c.x, child.origin.0, child.width, self.origin.0, self.width),
            lift(c.y, child.origin.1, child.height, self.origin.1, self.height),
        )
    }
}

fn axis_cells(n: usize, margin: Quantity) -> Vec<Quantity> {
    let mut cells = vec![Quantity::Relative(0.0); n];
    if n > 1 {
        cells.insert(0, margin);
        cells.push(margin);
    }
    cells
}

/// Number of cells `create_layout` splits a view into for `fg`, zero when
/// neither axis is discrete.
pub fn grid_len(fg: &FilledGeom, theme: &Theme) -> usize {
    if !fg.discrete_x && !fg.discrete_y {
        return 0;
    }
    axis_cells(fg.num_x(), theme.discrete_margin).len() * axis_cells(fg.num_y(), theme.discrete_margin).len()
}

/// Splits `view` into one cell per discrete label combination, with margin
/// cells around every axis holding more than one label. A continuous axis
/// gets a single cell. A view that already has children keeps them.
pub fn create_layout(mut view: Viewport, fg: &FilledGeom, theme: &Theme) -> Viewport {
    if (!fg.discrete_x && !fg.discrete_y) || !view.children.is_empty() {
        return view;
    }
    let widths = axis_cells(fg.num_x(), theme.discrete_margin);
    let heights = axis_cells(fg.num_y(), theme.discrete_margin);
    view.layout(widths.len(), heights.len(), &widths, &heights);
    view
}

/// Child index of each (x label, y label) cell. Null stands in for the label
/// of a continuous axis. Empty when neither axis is discrete.
pub fn calc_view_map(fg: &FilledGeom) -> BTreeMap<(Value, Value), usize> {
    let mut map = BTreeMap::new();
    if !fg.discrete_x && !fg.discrete_y {
        return map;
    }
    let labels = |discrete: bool, seq: &[Value]| {
        if discrete {
            seq.to_vec()
        } else {
            vec![Value::Null]
        }
    };
    let xs = labels(fg.discrete_x, &fg.x_label_seq);
    let ys = labels(fg.discrete_y, &fg.y_label_seq);
    let mx = usize::from(xs.len() > 1);
    let my = usize::from(ys.len() > 1);
    let grid_cols = xs.len() + 2 * mx;
    for (i, y) in ys.iter().enumerate() {
        for (j, x) in xs.iter().enumerate() {
            map.insert((x.clone(), y.clone()), (i + my) * grid_cols + j + mx);
        }
    }
    map
}
