//! Minimal columnar data engine: values, typed columns, data frames and the
//! formulas aesthetics are evaluated from.

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;

/// A single cell.
///
/// Values are totally ordered: null < bool < numbers < strings < objects.
/// Integers and floats compare numerically with each other, so `Int(1)` and
/// `Float(1.0)` are the same label.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Object(Vec<(String, Value)>),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int(_) | Value::Float(_) => 2,
            Value::Str(_) => 3,
            Value::Object(_) => 4,
        }
    }

    /// Numeric view of the value. Null and NaN yield `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) if !f.is_nan() => Some(*f),
            _ => None,
        }
    }

    fn raw_f64(&self) -> f64 {
        match self {
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            _ => f64::NAN,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Float(f) => f.is_nan(),
            _ => false,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Object(a), Value::Object(b)) => a.cmp(b),
            (a, b) if a.is_numeric() && b.is_numeric() => a.raw_f64().total_cmp(&b.raw_f64()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::Object(fields) => {
                write!(f, "{{")?;
                for (i, (k, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Storage kind of a [`Column`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Int,
    Float,
    Str,
    Bool,
    Constant,
    Object,
    Generic,
    Null,
}

/// A typed, homogeneous, immutable sequence of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int(Vec<i64>),
    /// NaN marks a missing value.
    Float(Vec<f64>),
    Str(Vec<String>),
    Bool(Vec<bool>),
    Constant { value: Value, len: usize },
    /// Heterogeneous values.
    Object(Vec<Value>),
    /// Values of a native type the engine cannot look into.
    Generic { type_name: String, len: usize },
    /// All values missing.
    Null(usize),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Int(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Str(v) => v.len(),
            Column::Bool(v) => v.len(),
            Column::Constant { len, .. } => *len,
            Column::Object(v) => v.len(),
            Column::Generic { len, .. } => *len,
            Column::Null(len) => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            Column::Int(_) => ColumnKind::Int,
            Column::Float(_) => ColumnKind::Float,
            Column::Str(_) => ColumnKind::Str,
            Column::Bool(_) => ColumnKind::Bool,
            Column::Constant { .. } => ColumnKind::Constant,
            Column::Object(_) => ColumnKind::Object,
            Column::Generic { .. } => ColumnKind::Generic,
            Column::Null(_) => ColumnKind::Null,
        }
    }

    /// Value at `idx`. Panics when out of bounds, like slice indexing.
    pub fn value(&self, idx: usize) -> Value {
        assert!(idx < self.len(), "row {} out of bounds ({})", idx, self.len());
        match self {
            Column::Int(v) => Value::Int(v[idx]),
            Column::Float(v) => Value::Float(v[idx]),
            Column::Str(v) => Value::Str(v[idx].clone()),
            Column::Bool(v) => Value::Bool(v[idx]),
            Column::Constant { value, .. } => value.clone(),
            Column::Object(v) => v[idx].clone(),
            Column::Generic { .. } | Column::Null(_) => Value::Null,
        }
    }

    /// Numeric value at `idx`, `None` for missing or non-numeric cells.
    pub fn f64_at(&self, idx: usize) -> Option<f64> {
        match self {
            Column::Int(v) => Some(v[idx] as f64),
            Column::Float(v) => Some(v[idx]).filter(|x| !x.is_nan()),
            _ => self.value(idx).as_f64(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).map(move |i| self.value(i))
    }

    /// Sorted, duplicate-free values.
    pub fn unique(&self) -> Vec<Value> {
        let mut values: Vec<Value> = self.iter().collect();
        values.sort();
        values.dedup();
        values
    }

    /// Minimum and maximum over the numeric, non-missing cells.
    pub fn min_max(&self) -> Option<(f64, f64)> {
        (0..self.len())
            .filter_map(|i| self.f64_at(i))
            .fold(None, |acc, x| match acc {
                None => Some((x, x)),
                Some((lo, hi)) => Some((lo.min(x), hi.max(x))),
            })
    }

    /// Builds the narrowest column able to hold `values`.
    pub fn from_values(values: Vec<Value>) -> Column {
        if values.is_empty() {
            return Column::Null(0);
        }
        if values.iter().all(|v| matches!(v, Value::Null)) {
            return Column::Null(values.len());
        }
        if values.iter().all(|v| matches!(v, Value::Int(_))) {
            return Column::Int(values.iter().filter_map(|v| match v {
                Value::Int(i) => Some(*i),
                _ => None,
            }).collect());
        }
        if values.iter().all(|v| v.is_numeric() || matches!(v, Value::Null)) {
            return Column::Float(values.iter().map(|v| v.as_f64().unwrap_or(f64::NAN)).collect());
        }
        if values.iter().all(|v| matches!(v, Value::Str(_))) {
            return Column::Str(values.into_iter().map(|v| v.to_string()).collect());
        }
        if values.iter().all(|v| matches!(v, Value::Bool(_))) {
            return Column::Bool(values.iter().map(|v| matches!(v, Value::Bool(true))).collect());
        }
        Column::Object(values)
    }

    /// Expands a constant column into its typed equivalent.
    fn materialize(&self) -> Column {
        match self {
            Column::Constant { value, len } => Column::from_values(vec![value.clone(); *len]),
            other => other.clone(),
        }
    }

    /// Concatenates columns, widening to floats or objects when kinds differ.
    pub fn concat(columns: &[Column]) -> Column {
        let non_empty: Vec<&Column> = columns.iter().filter(|c| !c.is_empty()).collect();
        let Some(first) = non_empty.first() else {
            return Column::Null(0);
        };
        let total: usize = non_empty.iter().map(|c| c.len()).sum();

        if let Column::Constant { value, .. } = first {
            let all_same = non_empty.iter().all(|c| match c {
                Column::Constant { value: other, .. } => other == value,
                _ => false,
            });
            if all_same {
                return Column::Constant {
                    value: value.clone(),
                    len: total,
                };
            }
        }
        if let Column::Generic { type_name, .. } = first {
            if non_empty.iter().all(|c| c.kind() == ColumnKind::Generic) {
                return Column::Generic {
                    type_name: type_name.clone(),
                    len: total,
                };
            }
        }

        let parts: Vec<Column> = non_empty.iter().map(|c| c.materialize()).collect();
        let kind = parts[0].kind();
        if parts.iter().all(|c| c.kind() == kind) {
            match kind {
                ColumnKind::Int => {
                    return Column::Int(parts.iter().flat_map(|c| match c {
                        Column::Int(v) => v.clone(),
                        _ => Vec::new(),
                    }).collect());
                }
                ColumnKind::Float => {
                    return Column::Float(parts.iter().flat_map(|c| match c {
                        Column::Float(v) => v.clone(),
                        _ => Vec::new(),
                    }).collect());
                }
                ColumnKind::Null => return Column::Null(total),
                _ => {}
            }
        }
        let numeric = parts.iter().all(|c| {
            matches!(c.kind(), ColumnKind::Int | ColumnKind::Float | ColumnKind::Null)
        });
        if numeric {
            return Column::Float(
                parts.iter()
                    .flat_map(|c| (0..c.len()).map(move |i| c.f64_at(i).unwrap_or(f64::NAN)))
                    .collect(),
            );
        }
        Column::from_values(parts.iter().flat_map(|c| c.iter()).collect())
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Column {
        match self {
            Column::Int(v) => Column::Int(indices.iter().map(|&i| v[i]).collect()),
            Column::Float(v) => Column::Float(indices.iter().map(|&i| v[i]).collect()),
            Column::Str(v) => Column::Str(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Bool(v) => Column::Bool(indices.iter().map(|&i| v[i]).collect()),
            Column::Constant { value, .. } => Column::Constant {
                value: value.clone(),
                len: indices.len(),
            },
            Column::Object(v) => Column::Object(indices.iter().map(|&i| v[i].clone()).collect()),
            Column::Generic { type_name, .. } => Column::Generic {
                type_name: type_name.clone(),
                len: indices.len(),
            },
            Column::Null(_) => Column::Null(indices.len()),
        }
    }
}

impl From<Vec<i64>> for Column {
    fn from(v: Vec<i64>) -> Self {
        Column::Int(v)
    }
}

impl From<Vec<f64>> for Column {
    fn from(v: Vec<f64>) -> Self {
        Column::Float(v)
    }
}

impl From<Vec<bool>> for Column {
    fn from(v: Vec<bool>) -> Self {
        Column::Bool(v)
    }
}

impl From<Vec<String>> for Column {
    fn from(v: Vec<String>) -> Self {
        Column::Str(v)
    }
}

impl From<Vec<&str>> for Column {
    fn from(v: Vec<&str>) -> Self {
        Column::Str(v.into_iter().map(str::to_string).collect())
    }
}

/// Named, equally long columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataFrame {
    names: Vec<String>,
    columns: Vec<Column>,
    len: usize,
}

impl DataFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`DataFrame::insert`].
    pub fn with_column(mut self, name: &str, column: impl Into<Column>) -> Result<Self> {
        self.insert(name, column.into())?;
        Ok(self)
    }

    /// Adds or replaces a column. The first column fixes the row count.
    pub fn insert(&mut self, name: &str, column: Column) -> Result<()> {
        if self.columns.is_empty() {
            self.len = column.len();
        } else if column.len() != self.len {
            return Err(Error::LengthMismatch {
                name: name.to_string(),
                expected: self.len,
                got: column.len(),
            });
        }
        match self.names.iter().position(|n| n == name) {
            Some(idx) => self.columns[idx] = column,
            None => {
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .or_else(|| self.names.iter().position(|n| n.eq_ignore_ascii_case(name)))
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.position(name)
            .map(|idx| &self.columns[idx])
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> DataFrame {
        DataFrame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
            len: indices.len(),
        }
    }
}

/// An aesthetic formula: a column reference or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Formula {
    Column(String),
    Constant(Value),
}

impl Formula {
    pub fn col(name: &str) -> Self {
        Formula::Column(name.to_string())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Formula::Constant(value.into())
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Formula::Constant(_))
    }

    /// Evaluates the formula against `df`; constants broadcast to its length.
    pub fn evaluate(&self, df: &DataFrame) -> Result<Column> {
        match self {
            Formula::Column(name) => df.column(name).cloned(),
            Formula::Constant(value) => Ok(Column::Constant {
                value: value.clone(),
                len: df.len(),
            }),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Column(name) => write!(f, "{}", name),
            Formula::Constant(value) => write!(f, "{}", value),
        }
    }
}
