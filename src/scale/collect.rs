//! Unifies the scale requests of a plot and its layers into a [`ScaleSet`].

use crate::data::{Column, ColumnKind, DataFrame, Value};
use crate::error::{Error, Result};
use crate::plot::Plot;
use crate::scale::discrete::is_discrete_data;
use crate::scale::fill::{fill_scale_values, ScaleDecision};
use crate::scale::{Aesthetic, FilledScale, Scale, ScaleKind, ScaleMapping, ScaleSet};
use crate::theme::Theme;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// One request together with the data it is evaluated on.
#[derive(Debug, Clone)]
pub struct ScaleRequest<'a> {
    pub scale: Scale,
    pub data: &'a DataFrame,
    /// The data belongs to a single layer rather than the plot.
    pub own_data: bool,
}

/// Domain of the combined data, on the transformed axis for transformed
/// position scales.
fn data_domain(scale: &Scale, combined: &Column) -> Result<(f64, f64)> {
    let transform = match scale.kind {
        ScaleKind::TransformedData { transform, .. } => transform,
        _ => None,
    };
    let domain = match transform {
        Some(forward) => (0..combined.len())
            .filter_map(|i| combined.f64_at(i).map(forward))
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            }),
        None => combined.min_max(),
    };
    domain.ok_or_else(|| Error::InvalidColumnType {
        scale: scale.name.clone(),
        kind: combined.kind(),
    })
}

/// Resolves a group of requests for the same channel as one scale: their
/// data is combined, classified once, and every request is filled against
/// the shared labels or domain. Returns one filled scale per request, or
/// nothing when the combined data is empty.
pub fn fill_scale(requests: &[ScaleRequest<'_>], theme: &Theme) -> Result<Vec<FilledScale>> {
    let Some(first) = requests.first() else {
        return Ok(Vec::new());
    };
    let name = &first.scale.name;

    if matches!(first.scale.kind, ScaleKind::Text) {
        return Ok(requests
            .iter()
            .map(|r| {
                FilledScale::from_request(
                    &r.scale,
                    (0.0, 1.0),
                    ScaleMapping::Continuous {
                        data_scale: (0.0, 0.0),
                        map_data: None,
                    },
                )
            })
            .collect());
    }

    let columns = requests
        .iter()
        .map(|r| r.scale.col.evaluate(r.data))
        .collect::<Result<Vec<_>>>()?;
    let combined = Column::concat(&columns);
    if combined.is_empty() || combined.kind() == ColumnKind::Null {
        warn!(scale = %name, "no data for scale, skipping it");
        return Ok(Vec::new());
    }

    let discrete = match requests.iter().find_map(|r| r.scale.discrete) {
        Some(discrete) => discrete,
        None => is_discrete_data(&combined, &first.scale, theme.sampling)?,
    };

    let decision = if discrete {
        let explicit = requests
            .iter()
            .find_map(|r| r.scale.labels.clone().filter(|l| !l.is_empty()))
            .or_else(|| {
                requests.iter().find_map(|r| {
                    r.scale
                        .value_map
                        .as_ref()
                        .filter(|m| !m.is_empty())
                        .map(|m| m.keys().cloned().collect::<Vec<Value>>())
                })
            });
        let labels = match explicit {
            Some(labels) => labels,
            None => {
                let mut labels = combined.unique();
                if first.scale.reversed {
                    labels.reverse();
                }
                labels
            }
        };
        ScaleDecision::Discrete { labels }
    } else {
        let domain = match requests
            .iter()
            .find_map(|r| r.scale.domain.filter(|(lo, hi)| lo != hi))
        {
            Some(domain) => domain,
            None => data_domain(&first.scale, &combined)?,
        };
        ScaleDecision::Continuous { domain }
    };
    debug!(scale = %name, requests = requests.len(), ?decision, "resolved scale");

    requests
        .iter()
        .map(|r| fill_scale_values(&r.scale, &decision, combined.kind(), theme))
        .collect()
}

/// Resolves all requests of one channel. Requests on the plot's data are
/// unified into one scale; each request on a layer's own data forms its own.
pub fn call_fill_scale(requests: Vec<ScaleRequest<'_>>, theme: &Theme) -> Result<Vec<FilledScale>> {
    let (own, shared): (Vec<_>, Vec<_>) = requests.into_iter().partition(|r| r.own_data);
    let mut filled = fill_scale(&shared, theme)?;
    for request in own {
        filled.extend(fill_scale(std::slice::from_ref(&request), theme)?);
    }
    Ok(filled)
}

fn channel_requests<'a>(plot: &'a Plot, aesthetic: Aesthetic) -> Vec<ScaleRequest<'a>> {
    let mut requests = Vec::new();

    if let Some(scale) = plot.aes.get(aesthetic) {
        let inheriting = plot.layers.iter().filter(|l| l.aes.get(aesthetic).is_none());
        let shared_ids: BTreeSet<u16> = inheriting
            .clone()
            .filter(|l| l.data.is_none())
            .map(|l| l.id)
            .collect();
        if !shared_ids.is_empty() {
            requests.push(ScaleRequest {
                scale: scale.clone().with_ids(shared_ids),
                data: &plot.data,
                own_data: false,
            });
        }
        for layer in inheriting {
            if let Some(data) = &layer.data {
                requests.push(ScaleRequest {
                    scale: scale.clone().with_ids([layer.id]),
                    data,
                    own_data: true,
                });
            }
        }
    }

    for layer in &plot.layers {
        if let Some(scale) = layer.aes.get(aesthetic) {
            requests.push(ScaleRequest {
                scale: scale.clone().with_ids([layer.id]),
                data: layer.data.as_ref().unwrap_or(&plot.data),
                own_data: layer.data.is_some(),
            });
        }
    }
    requests
}

/// Resolves every channel used by the plot or any of its layers.
pub fn collect_scales(plot: &Plot) -> Result<ScaleSet> {
    let mut set = ScaleSet::default();
    for aesthetic in Aesthetic::ALL {
        let requests = channel_requests(plot, aesthetic);
        if requests.is_empty() {
            continue;
        }
        let mut filled = call_fill_scale(requests, &plot.theme)?.into_iter();
        if let Some(main) = filled.next() {
            set.main.insert(aesthetic, main);
        }
        set.more.extend(filled);
    }

    let flags = |set: &ScaleSet, aesthetic| set.get(aesthetic).map(|s| (s.is_discrete(), s.reversed));
    if let Some((discrete, reversed)) = flags(&set, Aesthetic::X) {
        set.discrete_x = discrete;
        set.reversed_x = reversed;
    }
    if let Some((discrete, reversed)) = flags(&set, Aesthetic::Y) {
        set.discrete_y = discrete;
        set.reversed_y = reversed;
    }
    set.facets = collect_facet_scales(plot)?;
    debug!(
        channels = set.main.len(),
        extra = set.more.len(),
        facets = set.facets.len(),
        "collected scales"
    );
    Ok(set)
}

/// One discrete scale per facet column, each resolved on the plot's data.
pub fn collect_facet_scales(plot: &Plot) -> Result<Vec<FilledScale>> {
    let Some(facet) = &plot.facet else {
        return Ok(Vec::new());
    };
    let template = Scale::new(Aesthetic::Facet, crate::data::Formula::constant(Value::Null))
        .with_discrete(true);
    let mut scales = Vec::new();
    for col in &facet.columns {
        let scale = Scale {
            col: col.clone(),
            name: col.to_string(),
            ..template.clone()
        };
        let request = ScaleRequest {
            scale,
            data: &plot.data,
            own_data: false,
        };
        scales.extend(fill_scale(std::slice::from_ref(&request), &plot.theme)?);
    }
    Ok(scales)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Formula;
    use crate::geom::GeomKind;
    use crate::plot::Layer;
    use crate::scale::ScaleValue;

    fn df(values: Vec<&str>) -> DataFrame {
        DataFrame::new().with_column("g", values).unwrap()
    }

    fn request<'a>(scale: Scale, data: &'a DataFrame) -> ScaleRequest<'a> {
        ScaleRequest { scale, data, own_data: false }
    }

    #[test]
    fn test_fill_scale_unifies_labels() {
        let a = df(vec!["a", "b"]);
        let b = df(vec!["c", "a"]);
        let scale = Scale::new(Aesthetic::Color, Formula::col("g"));
        let filled = fill_scale(
            &[request(scale.clone().with_ids([0]), &a), request(scale.with_ids([1]), &b)],
            &Theme::default(),
        )
        .unwrap();
        assert_eq!(filled.len(), 2);
        let expected = vec![Value::from("a"), Value::from("b"), Value::from("c")];
        assert_eq!(filled[0].label_seq(), expected.as_slice());
        assert_eq!(filled[1].label_seq(), expected.as_slice());
        assert_eq!(
            filled[0].get_value(&Value::from("c")).unwrap(),
            filled[1].get_value(&Value::from("c")).unwrap()
        );
    }

    #[test]
    fn test_fill_scale_reversed_labels() {
        let a = df(vec!["a", "b", "c"]);
        let scale = Scale::new(Aesthetic::X, Formula::col("g")).reversed();
        let filled = fill_scale(&[request(scale, &a)], &Theme::default()).unwrap();
        assert_eq!(
            filled[0].label_seq(),
            &[Value::from("c"), Value::from("b"), Value::from("a")]
        );
    }

    #[test]
    fn test_fill_scale_explicit_labels_verbatim() {
        let a = df(vec!["a", "b"]);
        let labels = vec![Value::from("b"), Value::from("a")];
        let scale = Scale::new(Aesthetic::X, Formula::col("g"))
            .with_labels(labels.clone())
            .reversed();
        let filled = fill_scale(&[request(scale, &a)], &Theme::default()).unwrap();
        assert_eq!(filled[0].label_seq(), labels.as_slice());
    }

    #[test]
    fn test_fill_scale_value_map_keys_as_labels() {
        let a = df(vec!["a", "b"]);
        let map = [("a", 1.0), ("b", 2.0), ("z", 3.0)]
            .into_iter()
            .map(|(k, v)| (Value::from(k), ScaleValue::Size(v)))
            .collect();
        let scale = Scale::new(Aesthetic::Size, Formula::col("g")).with_value_map(map);
        let filled = fill_scale(&[request(scale, &a)], &Theme::default()).unwrap();
        assert_eq!(filled[0].label_seq().len(), 3);
    }

    #[test]
    fn test_fill_scale_continuous_domain() {
        let a = DataFrame::new().with_column("v", vec![1.0, 4.0]).unwrap();
        let b = DataFrame::new().with_column("v", vec![-2.0, 3.0]).unwrap();
        let scale = Scale::new(Aesthetic::Y, Formula::col("v"));
        let filled =
            fill_scale(&[request(scale.clone(), &a), request(scale, &b)], &Theme::default()).unwrap();
        assert_eq!(filled[0].data_scale(), Some((-2.0, 4.0)));
    }

    #[test]
    fn test_fill_scale_explicit_domain_wins() {
        let a = DataFrame::new().with_column("v", vec![1.0, 4.0]).unwrap();
        let scale = Scale::new(Aesthetic::Y, Formula::col("v")).with_domain((0.0, 10.0));
        let filled = fill_scale(&[request(scale, &a)], &Theme::default()).unwrap();
        assert_eq!(filled[0].data_scale(), Some((0.0, 10.0)));
    }

    #[test]
    fn test_fill_scale_transformed_domain() {
        let a = DataFrame::new().with_column("v", vec![10.0, 1000.0]).unwrap();
        let scale = Scale::new(Aesthetic::Y, Formula::col("v"))
            .with_transform(crate::scale::Transform::log10());
        let filled = fill_scale(&[request(scale, &a)], &Theme::default()).unwrap();
        let (lo, hi) = filled[0].data_scale().unwrap();
        approx::assert_relative_eq!(lo, 1.0);
        approx::assert_relative_eq!(hi, 3.0);
    }

    #[test]
    fn test_fill_scale_empty_data_skipped() {
        let empty = DataFrame::new().with_column("g", Vec::<String>::new()).unwrap();
        let scale = Scale::new(Aesthetic::Color, Formula::col("g"));
        assert!(fill_scale(&[request(scale, &empty)], &Theme::default()).unwrap().is_empty());
    }

    #[test]
    fn test_fill_scale_text_skips_classification() {
        let a = DataFrame::new().with_column("v", vec![1.0]).unwrap();
        let scale = Scale::new(Aesthetic::Text, Formula::col("missing"));
        let filled = fill_scale(&[request(scale, &a)], &Theme::default()).unwrap();
        assert_eq!(filled[0].data_scale(), Some((0.0, 0.0)));
    }

    #[test]
    fn test_call_fill_scale_own_data_separate() {
        let shared = df(vec!["a", "b"]);
        let own = df(vec!["x"]);
        let scale = Scale::new(Aesthetic::Color, Formula::col("g"));
        let requests = vec![
            ScaleRequest { scale: scale.clone().with_ids([1]), data: &own, own_data: true },
            ScaleRequest { scale: scale.with_ids([0]), data: &shared, own_data: false },
        ];
        let filled = call_fill_scale(requests, &Theme::default()).unwrap();
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].label_seq().len(), 2);
        assert_eq!(filled[1].label_seq(), &[Value::from("x")]);
    }

    #[test]
    fn test_collect_scales_plot_and_layers() {
        let data = DataFrame::new()
            .with_column("x", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_column("y", vec![2.0, 4.0, 8.0])
            .unwrap()
            .with_column("g", vec!["a", "b", "a"])
            .unwrap();
        let layer_data = DataFrame::new()
            .with_column("x", vec![10.0])
            .unwrap()
            .with_column("y", vec![1.0])
            .unwrap();
        let plot = Plot::new(data)
            .aes(Aesthetic::X, Formula::col("x"))
            .aes(Aesthetic::Y, Formula::col("y"))
            .layer(Layer::new(GeomKind::Point).aes(Aesthetic::Color, Formula::col("g")))
            .layer(Layer::new(GeomKind::Line).with_data(layer_data));
        let scales = collect_scales(&plot).unwrap();

        let x_main = scales.get(Aesthetic::X).unwrap();
        assert!(x_main.applies_to(0));
        assert_eq!(x_main.data_scale(), Some((1.0, 3.0)));
        let x_own = scales.for_layer(Aesthetic::X, 1).unwrap();
        assert_eq!(x_own.data_scale(), Some((10.0, 10.0)));
        assert!(!scales.discrete_x);

        let color = scales.get(Aesthetic::Color).unwrap();
        assert!(color.is_discrete());
        assert!(scales.for_layer(Aesthetic::Color, 1).is_none());
        assert!(scales.facets.is_empty());
    }

    #[test]
    fn test_collect_scales_axis_flags() {
        let data = DataFrame::new()
            .with_column("g", vec!["a", "b", "c"])
            .unwrap()
            .with_column("y", vec![2.0, 4.0, 8.0])
            .unwrap();
        let plot = Plot::new(data)
            .scale(Scale::new(Aesthetic::X, Formula::col("g")).reversed())
            .aes(Aesthetic::Y, Formula::col("y"))
            .layer(Layer::new(GeomKind::Point));
        let scales = collect_scales(&plot).unwrap();
        assert!(scales.discrete_x);
        assert!(scales.reversed_x);
        assert!(!scales.discrete_y);
        assert!(!scales.reversed_y);
    }

    #[test]
    fn test_collect_facet_scales_discrete() {
        let data = DataFrame::new()
            .with_column("x", vec![1.0, 2.0, 3.0])
            .unwrap()
            .with_column("year", vec![1999.0, 2008.0, 1999.0])
            .unwrap();
        let plot = Plot::new(data).facet_wrap(vec![Formula::col("year")]);
        let facets = collect_facet_scales(&plot).unwrap();
        assert_eq!(facets.len(), 1);
        assert!(facets[0].is_discrete());
        assert_eq!(facets[0].label_seq(), &[Value::Float(1999.0), Value::Float(2008.0)]);
    }
}
