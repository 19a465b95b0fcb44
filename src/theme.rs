//! Theme settings consulted while resolving scales and laying out geoms.

use crate::palette::Color;
use crate::viewport::{Axis, Quantity};

/// What to do with data outside the visible range of a continuous axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutsideRange {
    /// Skip the row.
    Drop,
    /// Clamp to the margin range.
    #[default]
    Clip,
    /// Draw it where it falls.
    None,
}

/// How the discreteness classifier picks the rows it inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sampling {
    /// Up to 100 rows drawn with a generator seeded by this value.
    Seeded(u64),
    /// Every row.
    Exhaustive,
}

impl Default for Sampling {
    fn default() -> Self {
        Sampling::Seeded(42)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub x_outside_range: OutsideRange,
    pub y_outside_range: OutsideRange,
    /// Clip bounds in data units; the viewport scale when unset.
    pub x_margin_range: Option<(f64, f64)>,
    pub y_margin_range: Option<(f64, f64)>,
    /// Space before the first and after the last cell of a discrete axis.
    pub discrete_margin: Quantity,
    pub size_range: (f64, f64),
    pub alpha_range: (f64, f64),
    pub hue_start: f64,
    pub sampling: Sampling,
    /// Digits after the decimal point for float text labels.
    pub text_precision: usize,
    pub point_size: f64,
    pub line_width: f64,
    pub font_size: f64,
    pub color: Color,
    pub fill_color: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            x_outside_range: OutsideRange::default(),
            y_outside_range: OutsideRange::default(),
            x_margin_range: None,
            y_margin_range: None,
            discrete_margin: Quantity::Relative(0.03),
            size_range: (2.0, 7.0),
            alpha_range: (0.1, 1.0),
            hue_start: 15.0,
            sampling: Sampling::default(),
            text_precision: 3,
            point_size: 3.0,
            line_width: 1.0,
            font_size: 12.0,
            color: Color::GREY20,
            fill_color: Color::GREY20,
        }
    }
}

impl Theme {
    pub fn with_outside_range(mut self, axis: Axis, policy: OutsideRange) -> Self {
        match axis {
            Axis::X => self.x_outside_range = policy,
            Axis::Y => self.y_outside_range = policy,
        }
        self
    }

    pub fn with_margin_range(mut self, axis: Axis, range: (f64, f64)) -> Self {
        match axis {
            Axis::X => self.x_margin_range = Some(range),
            Axis::Y => self.y_margin_range = Some(range),
        }
        self
    }

    pub fn with_sampling(mut self, sampling: Sampling) -> Self {
        self.sampling = sampling;
        self
    }

    pub fn with_hue_start(mut self, hue_start: f64) -> Self {
        self.hue_start = hue_start;
        self
    }

    pub fn with_discrete_margin(mut self, margin: Quantity) -> Self {
        self.discrete_margin = margin;
        self
    }

    pub fn outside_range(&self, axis: Axis) -> OutsideRange {
        match axis {
            Axis::X => self.x_outside_range,
            Axis::Y => self.y_outside_range,
        }
    }

    pub fn margin_range(&self, axis: Axis) -> Option<(f64, f64)> {
        match axis {
            Axis::X => self.x_margin_range,
            Axis::Y => self.y_margin_range,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_theme_defaults() {
        let theme = Theme::default();
        assert_eq!(theme.outside_range(Axis::X), OutsideRange::Clip);
        assert_eq!(theme.sampling, Sampling::Seeded(42));
        assert_eq!(theme.margin_range(Axis::Y), None);
    }

    #[test]
    fn test_theme_builders() {
        let theme = Theme::default()
            .with_outside_range(Axis::Y, OutsideRange::Drop)
            .with_margin_range(Axis::X, (0.0, 5.0))
            .with_sampling(Sampling::Exhaustive);
        assert_eq!(theme.outside_range(Axis::Y), OutsideRange::Drop);
        assert_eq!(theme.outside_range(Axis::X), OutsideRange::Clip);
        assert_eq!(theme.margin_range(Axis::X), Some((0.0, 5.0)));
        assert_eq!(theme.sampling, Sampling::Exhaustive);
    }
}
