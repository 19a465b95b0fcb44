//! Decides whether the data behind a scale is discrete or continuous.

use crate::data::{Column, Value};
use crate::error::{Error, Result};
use crate::scale::Scale;
use crate::theme::Sampling;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::trace;

/// Rows inspected by the cardinality heuristic.
pub const SAMPLE_SIZE: usize = 100;

/// A numeric column with more distinct sampled values than this share of the
/// sample is continuous.
pub const DISCRETE_CARDINALITY_RATIO: f64 = 0.125;

/// Row indices the classifier looks at. The same seed and length always
/// yield the same rows.
pub fn sample_indices(len: usize, sampling: Sampling) -> Vec<usize> {
    match sampling {
        Sampling::Exhaustive => (0..len).collect(),
        Sampling::Seeded(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            index::sample(&mut rng, len, len.min(SAMPLE_SIZE)).into_vec()
        }
    }
}

fn low_cardinality(col: &Column, indices: &[usize]) -> bool {
    let mut sampled: Vec<Value> = indices.iter().map(|&i| col.value(i)).collect();
    sampled.sort();
    sampled.dedup();
    sampled.len() as f64 <= DISCRETE_CARDINALITY_RATIO * indices.len() as f64
}

/// Classifies `col` as discrete (`true`) or continuous (`false`).
///
/// A discreteness forced on the scale wins without looking at the data.
/// Floats are continuous, strings, booleans and constants discrete. Integer
/// and object columns are discrete when a sample of their rows holds few
/// distinct values; objects holding any string or boolean are discrete
/// outright.
pub fn is_discrete_data(col: &Column, scale: &Scale, sampling: Sampling) -> Result<bool> {
    if let Some(discrete) = scale.discrete {
        return Ok(discrete);
    }
    if col.is_empty() {
        return Err(Error::EmptyColumn {
            scale: scale.name.clone(),
        });
    }
    let discrete = match col {
        Column::Float(_) => false,
        Column::Str(_) | Column::Bool(_) | Column::Constant { .. } => true,
        Column::Null(_) => {
            return Err(Error::EmptyColumn {
                scale: scale.name.clone(),
            })
        }
        Column::Generic { type_name, .. } => {
            return Err(Error::GenericColumnUnsupported {
                scale: scale.name.clone(),
                type_name: type_name.clone(),
            })
        }
        Column::Int(_) => low_cardinality(col, &sample_indices(col.len(), sampling)),
        Column::Object(values) => {
            if values.iter().any(|v| matches!(v, Value::Object(_))) {
                return Err(Error::UnsupportedObjectColumn {
                    scale: scale.name.clone(),
                });
            }
            let indices = sample_indices(col.len(), sampling);
            indices
                .iter()
                .any(|&i| matches!(values[i], Value::Str(_) | Value::Bool(_)))
                || low_cardinality(col, &indices)
        }
    };
    trace!(scale = %scale.name, discrete, "classified scale data");
    Ok(discrete)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Formula;
    use crate::scale::Aesthetic;

    fn scale() -> Scale {
        Scale::new(Aesthetic::X, Formula::col("v"))
    }

    #[test]
    fn test_repeated_ints_are_discrete() {
        let values: Vec<i64> = [1, 1, 1, 2, 2, 3].iter().cycle().take(120).copied().collect();
        let col = Column::Int(values);
        assert!(is_discrete_data(&col, &scale(), Sampling::default()).unwrap());
    }

    #[test]
    fn test_many_distinct_ints_are_continuous() {
        let col = Column::Int((0..1000).collect());
        assert!(!is_discrete_data(&col, &scale(), Sampling::default()).unwrap());
    }

    #[test]
    fn test_floats_continuous_strings_discrete() {
        let floats = Column::Float(vec![1.0, 1.0, 1.0]);
        assert!(!is_discrete_data(&floats, &scale(), Sampling::default()).unwrap());
        let strings = Column::from(vec!["a", "b"]);
        assert!(is_discrete_data(&strings, &scale(), Sampling::default()).unwrap());
        let constant = Column::Constant { value: Value::from(3i64), len: 4 };
        assert!(is_discrete_data(&constant, &scale(), Sampling::default()).unwrap());
    }

    #[test]
    fn test_forced_discreteness_wins() {
        let col = Column::Float(vec![0.5, 1.5]);
        let forced = scale().with_discrete(true);
        assert!(is_discrete_data(&col, &forced, Sampling::default()).unwrap());
    }

    #[test]
    fn test_empty_column_fails() {
        let res = is_discrete_data(&Column::Int(vec![]), &scale(), Sampling::default());
        assert!(matches!(res, Err(Error::EmptyColumn { .. })));
    }

    #[test]
    fn test_generic_column_fails() {
        let col = Column::Generic { type_name: "Duration".to_string(), len: 3 };
        let res = is_discrete_data(&col, &scale(), Sampling::default());
        assert!(matches!(res, Err(Error::GenericColumnUnsupported { .. })));
    }

    #[test]
    fn test_object_columns() {
        let nested = Column::Object(vec![Value::Int(1), Value::Object(vec![])]);
        let res = is_discrete_data(&nested, &scale(), Sampling::default());
        assert!(matches!(res, Err(Error::UnsupportedObjectColumn { .. })));

        let mixed = Column::Object(vec![Value::Float(1.5), Value::from("n/a")]);
        assert!(is_discrete_data(&mixed, &scale(), Sampling::default()).unwrap());

        let numbers = Column::Object((0..200).map(|i| Value::Float(i as f64 / 3.0)).collect());
        assert!(!is_discrete_data(&numbers, &scale(), Sampling::default()).unwrap());
    }

    #[test]
    fn test_sampling_is_deterministic() {
        let a = sample_indices(5000, Sampling::Seeded(7));
        let b = sample_indices(5000, Sampling::Seeded(7));
        assert_eq!(a, b);
        assert_eq!(a.len(), SAMPLE_SIZE);
        assert_eq!(sample_indices(40, Sampling::Seeded(7)).len(), 40);
        assert_eq!(sample_indices(5000, Sampling::Exhaustive).len(), 5000);
    }
}
