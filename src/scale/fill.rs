//! Turns a classified scale request into concrete visual values.

use crate::data::{ColumnKind, DataFrame, Value};
use crate::error::{Error, Result};
use crate::palette::{parse_color, Color, ColorPalette, ShapePalette, SizePalette};
use crate::scale::{
    DataKind, FilledScale, MapData, Scale, ScaleKind, ScaleMapping, ScaleValue,
};
use crate::theme::Theme;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The classification shared by all requests of one channel.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaleDecision {
    Discrete { labels: Vec<Value> },
    Continuous { domain: (f64, f64) },
}

/// Output range of size and alpha scales, unused by the rest.
fn output_range(scale: &Scale, theme: &Theme) -> (f64, f64) {
    match (scale.range, scale.kind) {
        (Some(range), _) => range,
        (None, ScaleKind::Size) => theme.size_range,
        (None, ScaleKind::Alpha) => theme.alpha_range,
        (None, _) => (0.0, 1.0),
    }
}

fn check_transform_pair(scale: &Scale) -> Result<()> {
    match scale.kind {
        ScaleKind::TransformedData {
            transform: Some(_),
            inverse: Some(_),
            ..
        } => Ok(()),
        ScaleKind::TransformedData { .. } => Err(Error::MissingTransformPair {
            scale: scale.name.clone(),
        }),
        _ => Ok(()),
    }
}

/// Color of a literal: a color name or hex string, or a packed `0xRRGGBB`.
pub fn color_from_value(scale: &str, value: &Value) -> Result<Color> {
    match value {
        Value::Str(s) => parse_color(s),
        Value::Int(packed) => Ok(Color::from_packed(*packed as u32)),
        Value::Float(packed) if packed.is_finite() => Ok(Color::from_packed(*packed as u32)),
        other => Err(Error::InvalidColor(format!("{}: {}", scale, other))),
    }
}

fn numeric_setting(scale: &Scale, value: &Value, kind: ColumnKind) -> Result<f64> {
    value.as_f64().ok_or_else(|| Error::InvalidColumnType {
        scale: scale.name.clone(),
        kind,
    })
}

/// Fills one request according to the shared decision.
///
/// `col_kind` is the kind of the combined data column of the channel.
pub fn fill_scale_values(
    scale: &Scale,
    decision: &ScaleDecision,
    col_kind: ColumnKind,
    theme: &Theme,
) -> Result<FilledScale> {
    let range = output_range(scale, theme);
    let mapping = match decision {
        ScaleDecision::Discrete { labels } => ScaleMapping::Discrete {
            label_seq: labels.clone(),
            value_map: discrete_values(scale, labels, range, col_kind, theme)?,
        },
        ScaleDecision::Continuous { domain } => ScaleMapping::Continuous {
            data_scale: *domain,
            map_data: continuous_values(scale, *domain, col_kind)?,
        },
    };
    Ok(FilledScale::from_request(scale, range, mapping))
}

fn discrete_values(
    scale: &Scale,
    labels: &[Value],
    range: (f64, f64),
    col_kind: ColumnKind,
    theme: &Theme,
) -> Result<BTreeMap<Value, ScaleValue>> {
    match scale.kind {
        ScaleKind::LinearData { .. } | ScaleKind::Text => return Ok(BTreeMap::new()),
        ScaleKind::TransformedData { .. } => {
            check_transform_pair(scale)?;
            return Ok(BTreeMap::new());
        }
        _ => {}
    }

    if let Some(explicit) = &scale.value_map {
        if let Some(missing) = labels.iter().find(|l| !explicit.contains_key(l)) {
            return Err(Error::UnknownLabel {
                scale: scale.name.clone(),
                value: missing.to_string(),
            });
        }
        return Ok(labels
            .iter()
            .filter_map(|l| explicit.get(l).map(|v| (l.clone(), *v)))
            .collect());
    }

    let n = labels.len();
    let values: Vec<ScaleValue> = match (scale.kind, scale.data_kind) {
        (ScaleKind::Color | ScaleKind::FillColor, DataKind::Mapping) => {
            let palette = ColorPalette::hue(n, theme.hue_start);
            palette.colors().iter().map(|&c| ScaleValue::Color(c)).collect()
        }
        (ScaleKind::Color | ScaleKind::FillColor, DataKind::Setting) => labels
            .iter()
            .map(|l| color_from_value(&scale.name, l).map(ScaleValue::Color))
            .collect::<Result<_>>()?,
        (ScaleKind::Size, DataKind::Mapping) => SizePalette::new(range.0, range.1)
            .discrete_sizes(n)
            .into_iter()
            .map(ScaleValue::Size)
            .collect(),
        (ScaleKind::Alpha, DataKind::Mapping) => {
            let step = (range.1 - range.0) / n as f64;
            (0..n).map(|i| ScaleValue::Alpha(range.0 + i as f64 * step)).collect()
        }
        (ScaleKind::Size, DataKind::Setting) => labels
            .iter()
            .map(|l| numeric_setting(scale, l, col_kind).map(ScaleValue::Size))
            .collect::<Result<_>>()?,
        (ScaleKind::Alpha, DataKind::Setting) => labels
            .iter()
            .map(|l| numeric_setting(scale, l, col_kind).map(ScaleValue::Alpha))
            .collect::<Result<_>>()?,
        (ScaleKind::Shape, _) => (0..n)
            .map(|i| {
                let (marker, line_type) = ShapePalette::get_shape(i);
                ScaleValue::Shape { marker, line_type }
            })
            .collect(),
        (ScaleKind::LinearData { .. } | ScaleKind::TransformedData { .. } | ScaleKind::Text, _) => {
            Vec::new()
        }
    };
    Ok(labels.iter().cloned().zip(values).collect())
}

fn continuous_values(
    scale: &Scale,
    domain: (f64, f64),
    col_kind: ColumnKind,
) -> Result<Option<MapData>> {
    let (low, high) = domain;
    let degenerate = || Error::DegenerateRange {
        scale: scale.name.clone(),
        low,
        high,
    };
    match (scale.kind, scale.data_kind) {
        (ScaleKind::LinearData { .. } | ScaleKind::Text, _) => Ok(None),
        (ScaleKind::TransformedData { .. }, _) => {
            check_transform_pair(scale)?;
            Ok(None)
        }
        (ScaleKind::Shape, _) => Err(Error::UnsupportedChannelCombination {
            scale: scale.name.clone(),
            reason: "shape has no continuous interpretation".to_string(),
        }),
        (ScaleKind::Color | ScaleKind::FillColor, DataKind::Mapping) => {
            if low == high {
                return Err(degenerate());
            }
            Ok(Some(viridis_map(scale, domain)?))
        }
        (ScaleKind::Color | ScaleKind::FillColor, DataKind::Setting) => {
            if !matches!(
                col_kind,
                ColumnKind::Str | ColumnKind::Int | ColumnKind::Float | ColumnKind::Constant
            ) {
                return Err(Error::InvalidColumnType {
                    scale: scale.name.clone(),
                    kind: col_kind,
                });
            }
            let col = scale.col.clone();
            let name = scale.name.clone();
            Ok(Some(Arc::new(move |df: &DataFrame| {
                col.evaluate(df)?
                    .iter()
                    .map(|v| color_from_value(&name, &v).map(ScaleValue::Color))
                    .collect()
            })))
        }
        (ScaleKind::Size | ScaleKind::Alpha, data_kind) => {
            if !matches!(
                col_kind,
                ColumnKind::Int | ColumnKind::Float | ColumnKind::Constant | ColumnKind::Object
            ) {
                return Err(Error::InvalidColumnType {
                    scale: scale.name.clone(),
                    kind: col_kind,
                });
            }
            if low == high && data_kind == DataKind::Mapping {
                return Err(degenerate());
            }
            let is_size = matches!(scale.kind, ScaleKind::Size);
            let col = scale.col.clone();
            Ok(Some(Arc::new(move |df: &DataFrame| {
                let column = col.evaluate(df)?;
                Ok((0..column.len())
                    .map(|i| {
                        let v = column.f64_at(i).unwrap_or(low);
                        let v = match data_kind {
                            DataKind::Mapping => (v - low) / (high - low),
                            DataKind::Setting => v,
                        };
                        match (is_size, data_kind) {
                            (true, DataKind::Mapping) => ScaleValue::RelativeSize(v),
                            (true, DataKind::Setting) => ScaleValue::Size(v),
                            (false, _) => ScaleValue::Alpha(v),
                        }
                    })
                    .collect())
            })))
        }
    }
}

/// Continuous color: the value's position inside the (transformed) domain
/// picks one of the 256 viridis entries.
fn viridis_map(scale: &Scale, domain: (f64, f64)) -> Result<MapData> {
    let transform = scale.transform;
    let forward = |v: f64| transform.map_or(v, |t| (t.forward)(v));
    let (low, high) = (forward(domain.0), forward(domain.1));
    if !low.is_finite() || !high.is_finite() {
        return Err(Error::InvalidTransformDomain {
            scale: scale.name.clone(),
            low: domain.0,
            high: domain.1,
        });
    }
    let palette = ColorPalette::viridis();
    let col = scale.col.clone();
    Ok(Arc::new(move |df: &DataFrame| {
        let column = col.evaluate(df)?;
        Ok((0..column.len())
            .map(|i| {
                let raw = column.f64_at(i).unwrap_or(domain.0);
                let v = transform.map_or(raw, |t| (t.forward)(raw));
                let t = (v - low) / (high - low);
                // NaN casts to 0
                let idx = (t * 255.0).round().clamp(0.0, 255.0) as usize;
                ScaleValue::Color(palette.get_color(idx))
            })
            .collect())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Formula;
    use crate::palette::{LineType, MarkerKind};
    use crate::scale::{Aesthetic, Transform};
    use crate::viewport::Axis;
    use approx::assert_relative_eq;

    fn labels(values: &[&str]) -> ScaleDecision {
        ScaleDecision::Discrete {
            labels: values.iter().map(|&v| Value::from(v)).collect(),
        }
    }

    #[test]
    fn test_discrete_color_hues() {
        let scale = Scale::new(Aesthetic::Color, Formula::col("g"));
        let filled =
            fill_scale_values(&scale, &labels(&["a", "b", "c"]), ColumnKind::Str, &Theme::default())
                .unwrap();
        let expected = ColorPalette::hue(3, 15.0);
        assert_eq!(filled.label_seq().len(), 3);
        assert_eq!(filled.get_value(&Value::from("b")).unwrap(), ScaleValue::Color(expected.get_color(1)));
    }

    #[test]
    fn test_discrete_color_setting_parses() {
        let scale = Scale::new(Aesthetic::Color, Formula::col("c")).with_data_kind(DataKind::Setting);
        let decision = ScaleDecision::Discrete {
            labels: vec![Value::from("red"), Value::Int(0x0000ff)],
        };
        let filled = fill_scale_values(&scale, &decision, ColumnKind::Object, &Theme::default()).unwrap();
        let ScaleValue::Color(red) = filled.get_value(&Value::from("red")).unwrap() else {
            panic!("expected color");
        };
        assert_eq!(red.to_rgba8(), [255, 0, 0, 255]);
        let ScaleValue::Color(blue) = filled.get_value(&Value::Int(0x0000ff)).unwrap() else {
            panic!("expected color");
        };
        assert_eq!(blue.to_rgba8(), [0, 0, 255, 255]);
    }

    #[test]
    fn test_discrete_size_and_alpha() {
        let theme = Theme::default();
        let size = Scale::new(Aesthetic::Size, Formula::col("g"));
        let filled = fill_scale_values(&size, &labels(&["a", "b"]), ColumnKind::Str, &theme).unwrap();
        assert_eq!(filled.get_value(&Value::from("b")).unwrap(), ScaleValue::Size(4.5));

        let alpha = Scale::new(Aesthetic::Alpha, Formula::col("g")).with_range((0.0, 1.0));
        let filled =
            fill_scale_values(&alpha, &labels(&["a", "b", "c", "d"]), ColumnKind::Str, &theme).unwrap();
        assert_eq!(filled.get_value(&Value::from("c")).unwrap(), ScaleValue::Alpha(0.5));
    }

    #[test]
    fn test_discrete_shapes_cycle() {
        let scale = Scale::new(Aesthetic::Shape, Formula::col("g"));
        let names: Vec<String> = (0..8).map(|i| format!("s{}", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let filled = fill_scale_values(&scale, &labels(&refs), ColumnKind::Str, &Theme::default()).unwrap();
        assert_eq!(
            filled.get_value(&Value::from("s7")).unwrap(),
            ScaleValue::Shape { marker: MarkerKind::EmptyCircle, line_type: LineType::Dashed }
        );
    }

    #[test]
    fn test_explicit_value_map_must_cover_labels() {
        let map = BTreeMap::from([(Value::from("a"), ScaleValue::Size(9.0))]);
        let scale = Scale::new(Aesthetic::Size, Formula::col("g")).with_value_map(map);
        let ok = fill_scale_values(&scale, &labels(&["a"]), ColumnKind::Str, &Theme::default()).unwrap();
        assert_eq!(ok.get_value(&Value::from("a")).unwrap(), ScaleValue::Size(9.0));
        let res = fill_scale_values(&scale, &labels(&["a", "b"]), ColumnKind::Str, &Theme::default());
        assert!(matches!(res, Err(Error::UnknownLabel { .. })));
    }

    #[test]
    fn test_explicit_value_map_limited_to_labels() {
        let map = BTreeMap::from([
            (Value::from("a"), ScaleValue::Size(1.0)),
            (Value::from("b"), ScaleValue::Size(2.0)),
            (Value::from("z"), ScaleValue::Size(3.0)),
        ]);
        let scale = Scale::new(Aesthetic::Size, Formula::col("g")).with_value_map(map);
        let filled = fill_scale_values(&scale, &labels(&["b", "a"]), ColumnKind::Str, &Theme::default()).unwrap();
        assert_eq!(filled.label_seq().len(), 2);
        assert_eq!(filled.value_map().map(BTreeMap::len), Some(2));
        assert!(filled.get_value(&Value::from("z")).is_err());
    }

    #[test]
    fn test_continuous_color_viridis_ends() {
        let scale = Scale::new(Aesthetic::Color, Formula::col("v"));
        let decision = ScaleDecision::Continuous { domain: (0.0, 10.0) };
        let filled = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default()).unwrap();
        let df = DataFrame::new().with_column("v", vec![0.0, 10.0, 20.0]).unwrap();
        let values = filled.map_data(&df).unwrap();
        let viridis = ColorPalette::viridis();
        assert_eq!(values[0], ScaleValue::Color(viridis.get_color(0)));
        assert_eq!(values[1], ScaleValue::Color(viridis.get_color(255)));
        assert_eq!(values[2], ScaleValue::Color(viridis.get_color(255)));
    }

    #[test]
    fn test_continuous_color_degenerate() {
        let scale = Scale::new(Aesthetic::Fill, Formula::col("v"));
        let decision = ScaleDecision::Continuous { domain: (3.0, 3.0) };
        let res = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default());
        assert!(matches!(res, Err(Error::DegenerateRange { .. })));
    }

    #[test]
    fn test_continuous_color_invalid_transform_domain() {
        let scale = Scale::new(Aesthetic::Color, Formula::col("v")).with_transform(Transform::log10());
        let decision = ScaleDecision::Continuous { domain: (0.0, 100.0) };
        let res = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default());
        assert!(matches!(res, Err(Error::InvalidTransformDomain { .. })));
    }

    #[test]
    fn test_continuous_size_relative() {
        let scale = Scale::new(Aesthetic::Size, Formula::col("v"));
        let decision = ScaleDecision::Continuous { domain: (10.0, 20.0) };
        let filled = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default()).unwrap();
        let df = DataFrame::new().with_column("v", vec![15.0]).unwrap();
        let ScaleValue::RelativeSize(t) = filled.map_data(&df).unwrap()[0] else {
            panic!("expected relative size");
        };
        assert_relative_eq!(t, 0.5);
        assert_eq!(filled.range, (2.0, 7.0));
    }

    #[test]
    fn test_continuous_alpha_wrong_kind() {
        let scale = Scale::new(Aesthetic::Alpha, Formula::col("v"));
        let decision = ScaleDecision::Continuous { domain: (0.0, 1.0) };
        let res = fill_scale_values(&scale, &decision, ColumnKind::Str, &Theme::default());
        assert!(matches!(res, Err(Error::InvalidColumnType { .. })));
    }

    #[test]
    fn test_continuous_shape_unsupported() {
        let scale = Scale::new(Aesthetic::Shape, Formula::col("v"));
        let decision = ScaleDecision::Continuous { domain: (0.0, 1.0) };
        let res = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default());
        assert!(matches!(res, Err(Error::UnsupportedChannelCombination { .. })));
    }

    #[test]
    fn test_transformed_position_needs_pair() {
        let mut scale = Scale::new(Aesthetic::X, Formula::col("v"));
        scale.kind = ScaleKind::TransformedData {
            axis: Axis::X,
            transform: Some(f64::ln),
            inverse: None,
        };
        let decision = ScaleDecision::Continuous { domain: (1.0, 2.0) };
        let res = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default());
        assert!(matches!(res, Err(Error::MissingTransformPair { .. })));
    }

    #[test]
    fn test_position_scale_has_no_map() {
        let scale = Scale::new(Aesthetic::X, Formula::col("v"));
        let decision = ScaleDecision::Continuous { domain: (1.0, 1.0) };
        let filled = fill_scale_values(&scale, &decision, ColumnKind::Float, &Theme::default()).unwrap();
        assert_eq!(filled.data_scale(), Some((1.0, 1.0)));
        let df = DataFrame::new().with_column("v", vec![1.0]).unwrap();
        assert!(filled.map_data(&df).unwrap().is_empty());
    }
}
