use crate::geom::Style;
use crate::ir::GraphObject;
use crate::palette::{self, MarkerKind};
use crate::viewport::{Axis, Coord, Viewport};
use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::warn;

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Half length of the whiskers at both ends of an error bar, in pixels.
const WHISKER: f64 = 4.0;

fn rgba(c: palette::Color) -> RGBAColor {
    let [r, g, b, _] = c.to_rgba8();
    RGBAColor(r, g, b, c.a.clamp(0.0, 1.0))
}

fn px((x, y): (f64, f64)) -> (i32, i32) {
    (x.round() as i32, y.round() as i32)
}

fn line_style(style: &Style) -> ShapeStyle {
    rgba(style.stroke()).stroke_width(style.line_width.round().max(1.0) as u32)
}

/// Splits a polyline into the drawn pieces of a dash pattern given as
/// alternating dash and gap lengths. An empty pattern keeps the line whole.
pub fn dash_segments(points: &[(f64, f64)], pattern: &[f64]) -> Vec<Vec<(f64, f64)>> {
    if pattern.is_empty() || pattern.iter().all(|&d| d <= 0.0) {
        return if points.len() > 1 { vec![points.to_vec()] } else { Vec::new() };
    }
    let lerp = |a: (f64, f64), b: (f64, f64), t: f64| (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t);
    let mut segments = Vec::new();
    let mut current: Vec<(f64, f64)> = Vec::new();
    let mut idx = 0;
    let mut left = pattern[0];
    for w in points.windows(2) {
        let (a, b) = (w[0], w[1]);
        let len = ((b.0 - a.0).powi(2) + (b.1 - a.1).powi(2)).sqrt();
        let mut t = 0.0;
        while t < len {
            let step = left.min(len - t);
            if idx % 2 == 0 {
                if current.is_empty() {
                    current.push(lerp(a, b, t / len));
                }
                current.push(lerp(a, b, (t + step) / len));
            }
            t += step;
            left -= step;
            if left <= 0.0 {
                if idx % 2 == 0 && current.len() > 1 {
                    segments.push(std::mem::take(&mut current));
                }
                current.clear();
                idx = (idx + 1) % pattern.len();
                left = pattern[idx];
            }
        }
    }
    if current.len() > 1 {
        segments.push(current);
    }
    segments
}

fn draw_path(area: &Area, points: &[(f64, f64)], style: &Style) -> Result<()> {
    if style.stroke().a <= 0.0 {
        return Ok(());
    }
    let shape = line_style(style);
    for segment in dash_segments(points, style.line_type.dash_pattern()) {
        let path: Vec<(i32, i32)> = segment.into_iter().map(px).collect();
        area.draw(&PathElement::new(path, shape))
            .context("Failed to draw line")?;
    }
    Ok(())
}

fn draw_marker(area: &Area, at: (f64, f64), size: f64, marker: MarkerKind, color: palette::Color) -> Result<()> {
    let (x, y) = at;
    let r = size.max(1.0);
    let c = rgba(color);
    let filled = c.filled();
    let outline = c.stroke_width(1);
    let diamond = vec![px((x, y - r)), px((x + r, y)), px((x, y + r)), px((x - r, y))];
    let corners = [px((x - r, y - r)), px((x + r, y + r))];
    let drawn = match marker {
        MarkerKind::Circle => area.draw(&Circle::new(px(at), r.round() as i32, filled)),
        MarkerKind::EmptyCircle => area.draw(&Circle::new(px(at), r.round() as i32, outline)),
        MarkerKind::Rectangle => area.draw(&Rectangle::new(corners, filled)),
        MarkerKind::EmptyRectangle => area.draw(&Rectangle::new(corners, outline)),
        MarkerKind::Rhombus => area.draw(&Polygon::new(diamond, filled)),
        MarkerKind::EmptyRhombus => {
            let mut closed = diamond;
            closed.push(closed[0]);
            area.draw(&PathElement::new(closed, outline))
        }
        MarkerKind::Triangle => area.draw(&Polygon::new(
            vec![px((x, y - r)), px((x + r, y + r)), px((x - r, y + r))],
            filled,
        )),
        MarkerKind::UpsideDownTriangle => area.draw(&Polygon::new(
            vec![px((x, y + r)), px((x + r, y - r)), px((x - r, y - r))],
            filled,
        )),
        MarkerKind::Cross => area
            .draw(&PathElement::new(vec![px((x - r, y)), px((x + r, y))], outline))
            .and_then(|_| area.draw(&PathElement::new(vec![px((x, y - r)), px((x, y + r))], outline))),
        MarkerKind::RotCross => area
            .draw(&PathElement::new(vec![px((x - r, y - r)), px((x + r, y + r))], outline))
            .and_then(|_| area.draw(&PathElement::new(vec![px((x - r, y + r)), px((x + r, y - r))], outline))),
    };
    drawn.context("Failed to draw marker")
}

fn draw_object(area: &Area, view: &Viewport, obj: &GraphObject) -> Result<()> {
    match obj {
        GraphObject::Point { at, size, marker, color } => {
            if color.a > 0.0 {
                draw_marker(area, view.to_pixels(at), *size, *marker, *color)?;
            }
        }
        GraphObject::Rect { min, max, style } => {
            let corners = [px(view.to_pixels(min)), px(view.to_pixels(max))];
            if style.fill().a > 0.0 {
                area.draw(&Rectangle::new(corners, rgba(style.fill()).filled()))
                    .context("Failed to draw rectangle")?;
            }
            if style.stroke().a > 0.0 {
                area.draw(&Rectangle::new(corners, line_style(style)))
                    .context("Failed to draw rectangle outline")?;
            }
        }
        GraphObject::Polyline { points, style } => {
            let points: Vec<(f64, f64)> = points.iter().map(|c| view.to_pixels(c)).collect();
            draw_path(area, &points, style)?;
        }
        GraphObject::ErrorBar { at, low, high, direction, style } => {
            let (from, to) = match direction {
                Axis::Y => (Coord::new(at.x, *low), Coord::new(at.x, *high)),
                Axis::X => (Coord::new(*low, at.y), Coord::new(*high, at.y)),
            };
            let (from, to) = (view.to_pixels(&from), view.to_pixels(&to));
            let whisker = |(x, y): (f64, f64)| match direction {
                Axis::Y => vec![(x - WHISKER, y), (x + WHISKER, y)],
                Axis::X => vec![(x, y - WHISKER), (x, y + WHISKER)],
            };
            let plain = Style {
                line_type: palette::LineType::Solid,
                ..*style
            };
            draw_path(area, &[from, to], &plain)?;
            draw_path(area, &whisker(from), &plain)?;
            draw_path(area, &whisker(to), &plain)?;
        }
        GraphObject::Raster { min, max, columns, rows, pixels } => {
            let (x0, y0) = view.to_pixels(min);
            let (x1, y1) = view.to_pixels(max);
            let (left, top) = (x0.min(x1), y0.min(y1));
            let cell_w = (x1 - x0).abs() / *columns as f64;
            let cell_h = (y1 - y0).abs() / *rows as f64;
            for (i, color) in pixels.iter().enumerate().filter(|(_, c)| c.a > 0.0) {
                let (row, col) = (i / columns, i % columns);
                let corner = (left + col as f64 * cell_w, top + row as f64 * cell_h);
                area.draw(&Rectangle::new(
                    [px(corner), px((corner.0 + cell_w, corner.1 + cell_h))],
                    rgba(*color).filled(),
                ))
                .context("Failed to draw raster cell")?;
            }
        }
        GraphObject::Text { at, text, size, color } => {
            let font = ("sans-serif", *size)
                .into_font()
                .color(&rgba(*color))
                .pos(Pos::new(HPos::Center, VPos::Center));
            // Missing system fonts only cost the label.
            if let Err(err) = area.draw(&Text::new(text.clone(), px(view.to_pixels(at)), font)) {
                warn!(text = %text, error = %err, "could not draw text");
            }
        }
    }
    Ok(())
}

fn draw_viewport(area: &Area, view: &Viewport) -> Result<()> {
    for obj in &view.objects {
        draw_object(area, view, obj)?;
    }
    for child in &view.children {
        draw_viewport(area, child)?;
    }
    Ok(())
}

/// Rasterizes a viewport tree into PNG bytes the size of the root viewport.
pub fn render_png(view: &Viewport) -> Result<Vec<u8>> {
    let width = view.width.round().max(1.0) as u32;
    let height = view.height.round().max(1.0) as u32;
    let mut buffer = vec![0u8; (width * height * 3) as usize];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();

        root.fill(&WHITE).context("Failed to fill background")?;
        draw_viewport(&root, view)?;
        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    {
        let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
        encoder
            .write_image(&buffer, width, height, image::ColorType::Rgb8)
            .context("Failed to encode PNG")?;
    }

    Ok(png_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geom::GeomKind;
    use crate::theme::Theme;
    use crate::viewport::Coord1D;

    #[test]
    fn test_dash_segments_solid() {
        let line = [(0.0, 0.0), (10.0, 0.0), (10.0, 5.0)];
        assert_eq!(dash_segments(&line, &[]), vec![line.to_vec()]);
        assert!(dash_segments(&[(1.0, 1.0)], &[]).is_empty());
    }

    #[test]
    fn test_dash_segments_pattern() {
        let segments = dash_segments(&[(0.0, 0.0), (20.0, 0.0)], &[8.0, 4.0]);
        assert_eq!(
            segments,
            vec![vec![(0.0, 0.0), (8.0, 0.0)], vec![(12.0, 0.0), (20.0, 0.0)]]
        );
    }

    #[test]
    fn test_dash_continues_around_corner() {
        let segments = dash_segments(&[(0.0, 0.0), (4.0, 0.0), (4.0, 10.0)], &[6.0, 2.0]);
        assert_eq!(segments[0], vec![(0.0, 0.0), (4.0, 0.0), (4.0, 2.0)]);
        assert_eq!(segments[1], vec![(4.0, 4.0), (4.0, 10.0)]);
    }

    #[test]
    fn test_rgba_keeps_alpha() {
        let c = rgba(palette::Color::rgb(1.0, 0.0, 0.0).with_alpha(0.5));
        assert_eq!((c.0, c.1, c.2), (255, 0, 0));
        assert_eq!(c.3, 0.5);
    }

    #[test]
    fn test_render_png_signature() {
        let theme = Theme::default();
        let mut view = Viewport::new("plot", 40.0, 30.0).with_scales((0.0, 1.0), (0.0, 1.0));
        let at = Coord::new(Coord1D::data(0.5, Axis::X, view.x_scale), Coord1D::data(0.5, Axis::Y, view.y_scale));
        view.add_obj(GraphObject::Rect {
            min: Coord::new(Coord1D::relative(0.1, Axis::X), Coord1D::relative(0.1, Axis::Y)),
            max: Coord::new(Coord1D::relative(0.9, Axis::X), Coord1D::relative(0.9, Axis::Y)),
            style: Style::for_geom(GeomKind::Bar, &theme),
        });
        view.add_obj(GraphObject::Point {
            at,
            size: 3.0,
            marker: MarkerKind::Triangle,
            color: theme.color,
        });
        let png = render_png(&view).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }
}
