// Colors, hue generation and the discrete palettes for data-driven aesthetics

use crate::error::{Error, Result};

/// RGBA color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const GREY20: Color = Color::rgb(0.2, 0.2, 0.2);
    pub const TRANSPARENT: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };

    pub const fn rgb(r: f64, g: f64, b: f64) -> Self {
        Color { r, g, b, a: 1.0 }
    }

    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Color::rgb(f64::from(r) / 255.0, f64::from(g) / 255.0, f64::from(b) / 255.0)
    }

    /// Packed `0xRRGGBB`.
    pub fn from_packed(rgb: u32) -> Self {
        Color::from_rgb8((rgb >> 16 & 0xff) as u8, (rgb >> 8 & 0xff) as u8, (rgb & 0xff) as u8)
    }

    pub fn with_alpha(self, a: f64) -> Self {
        Color { a, ..self }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// Polar CIE-Luv color (hue in degrees), as used for evenly spaced hues.
    pub fn from_hcl(h: f64, c: f64, l: f64) -> Self {
        if l <= 0.0 {
            return Color::BLACK;
        }
        const XN: f64 = 95.047;
        const YN: f64 = 100.0;
        const ZN: f64 = 108.883;
        let denom = XN + 15.0 * YN + 3.0 * ZN;
        let un = 4.0 * XN / denom;
        let vn = 9.0 * YN / denom;

        let h = h.to_radians();
        let u = c * h.cos();
        let v = c * h.sin();

        let y = YN * if l > 8.0 { ((l + 16.0) / 116.0).powi(3) } else { l / 903.3 };
        let up = u / (13.0 * l) + un;
        let vp = v / (13.0 * l) + vn;
        let x = y * 9.0 * up / (4.0 * vp);
        let z = y * (12.0 - 3.0 * up - 20.0 * vp) / (4.0 * vp);

        let (x, y, z) = (x / 100.0, y / 100.0, z / 100.0);
        let gamma = |c: f64| {
            let c = if c <= 0.003_130_8 { 12.92 * c } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 };
            c.clamp(0.0, 1.0)
        };
        Color::rgb(
            gamma(3.240_454_2 * x - 1.537_138_5 * y - 0.498_531_4 * z),
            gamma(-0.969_266_0 * x + 1.876_010_8 * y + 0.041_556_0 * z),
            gamma(0.055_643_4 * x - 0.204_025_9 * y + 1.057_225_2 * z),
        )
    }

    fn lerp(self, other: Color, t: f64) -> Color {
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }
}

/// Parses a named color or a `#rrggbb` / `#rrggbbaa` literal.
pub fn parse_color(s: &str) -> Result<Color> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix('#') {
        let channel = |i: usize| {
            hex.get(i..i + 2)
                .and_then(|c| u8::from_str_radix(c, 16).ok())
                .ok_or_else(|| Error::InvalidColor(s.to_string()))
        };
        return match hex.len() {
            6 => Ok(Color::from_rgb8(channel(0)?, channel(2)?, channel(4)?)),
            8 => Ok(Color::from_rgb8(channel(0)?, channel(2)?, channel(4)?)
                .with_alpha(f64::from(channel(6)?) / 255.0)),
            _ => Err(Error::InvalidColor(s.to_string())),
        };
    }
    let packed = match s.to_ascii_lowercase().as_str() {
        "black" => 0x000000,
        "white" => 0xffffff,
        "red" => 0xff0000,
        "green" => 0x008000,
        "blue" => 0x0000ff,
        "orange" => 0xffa500,
        "purple" => 0x800080,
        "brown" => 0xa52a2a,
        "pink" => 0xffc0cb,
        "gray" | "grey" => 0x808080,
        "olive" => 0x808000,
        "cyan" => 0x00ffff,
        "yellow" => 0xffff00,
        "magenta" => 0xff00ff,
        "steelblue" => 0x4682b4,
        "transparent" => return Ok(Color::TRANSPARENT),
        _ => return Err(Error::InvalidColor(s.to_string())),
    };
    Ok(Color::from_packed(packed))
}

/// `n` hue angles evenly spaced around the circle, starting at `start`.
pub fn hue_angles(n: usize, start: f64) -> Vec<f64> {
    (0..n)
        .map(|i| (start + i as f64 * 360.0 / n as f64).rem_euclid(360.0))
        .collect()
}

const VIRIDIS_ANCHORS: [u32; 9] = [
    0x440154, 0x472d7b, 0x3b528b, 0x2c728e, 0x21908c, 0x27ad81, 0x5dc863, 0xaadc32, 0xfde725,
];

/// Ordered list of colors.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorPalette {
    colors: Vec<Color>,
}

impl ColorPalette {
    /// `n` evenly spaced hues (chroma 100, luminance 65).
    pub fn hue(n: usize, start: f64) -> Self {
        ColorPalette {
            colors: hue_angles(n, start)
                .into_iter()
                .map(|h| Color::from_hcl(h, 100.0, 65.0))
                .collect(),
        }
    }

    /// 256-entry viridis ramp for continuous color scales.
    pub fn viridis() -> Self {
        let anchors: Vec<Color> = VIRIDIS_ANCHORS.iter().map(|&c| Color::from_packed(c)).collect();
        let segments = (anchors.len() - 1) as f64;
        let colors = (0..256)
            .map(|i| {
                let t = i as f64 / 255.0 * segments;
                let lo = (t.floor() as usize).min(anchors.len() - 2);
                anchors[lo].lerp(anchors[lo + 1], t - lo as f64)
            })
            .collect();
        ColorPalette { colors }
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Get color for a specific index (wraps around if index > palette size)
    pub fn get_color(&self, index: usize) -> Color {
        self.colors[index % self.colors.len()]
    }

    pub fn colors(&self) -> &[Color] {
        &self.colors
    }
}

/// Point marker kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MarkerKind {
    Circle,
    Cross,
    Triangle,
    Rhombus,
    Rectangle,
    RotCross,
    UpsideDownTriangle,
    EmptyCircle,
    EmptyRectangle,
    EmptyRhombus,
}

impl MarkerKind {
    pub const ALL: [MarkerKind; 10] = [
        MarkerKind::Circle,
        MarkerKind::Cross,
        MarkerKind::Triangle,
        MarkerKind::Rhombus,
        MarkerKind::Rectangle,
        MarkerKind::RotCross,
        MarkerKind::UpsideDownTriangle,
        MarkerKind::EmptyCircle,
        MarkerKind::EmptyRectangle,
        MarkerKind::EmptyRhombus,
    ];
}

/// Stroke patterns for lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LineType {
    Solid,
    Dashed,
    Dotted,
    DotDash,
    LongDash,
    TwoDash,
}

impl LineType {
    pub const ALL: [LineType; 6] = [
        LineType::Solid,
        LineType::Dashed,
        LineType::Dotted,
        LineType::DotDash,
        LineType::LongDash,
        LineType::TwoDash,
    ];

    /// Dash and gap lengths in pixels, empty for solid lines.
    pub fn dash_pattern(self) -> &'static [f64] {
        match self {
            LineType::Solid => &[],
            LineType::Dashed => &[8.0, 4.0],
            LineType::Dotted => &[2.0, 3.0],
            LineType::DotDash => &[2.0, 3.0, 8.0, 3.0],
            LineType::LongDash => &[14.0, 4.0],
            LineType::TwoDash => &[10.0, 3.0, 4.0, 3.0],
        }
    }
}

/// Size palette for discrete size mapping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizePalette {
    min_size: f64,
    max_size: f64,
}

impl SizePalette {
    /// Create a new size palette with min and max sizes
    pub fn new(min_size: f64, max_size: f64) -> Self {
        SizePalette { min_size, max_size }
    }

    /// Sizes for `n` labels: at most five distinct steps from `min` towards
    /// `max`, capped at `max`.
    pub fn discrete_sizes(&self, n: usize) -> Vec<f64> {
        let steps = n.min(5).max(1) as f64;
        let step = (self.max_size - self.min_size) / steps;
        (0..n)
            .map(|i| (self.min_size + i as f64 * step).min(self.max_size))
            .collect()
    }
}

/// Shape palette for discrete shape mapping
pub struct ShapePalette;

impl ShapePalette {
    /// Marker and line type for label `index`; each cycles independently.
    pub fn get_shape(index: usize) -> (MarkerKind, LineType) {
        (
            MarkerKind::ALL[index % MarkerKind::ALL.len()],
            LineType::ALL[index % LineType::ALL.len()],
        )
    }
}
