use crate::data::{Column, DataFrame, Value};
use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use std::io;

pub enum ColumnSelector {
    Index(usize),
    Name(String),
}

pub fn read_csv_from_stdin() -> Result<DataFrame> {
    read_csv(io::stdin())
}

/// Reads a headed CSV into a data frame, inferring one type per column.
pub fn read_csv<R: io::Read>(input: R) -> Result<DataFrame> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(input);

    let headers: Vec<String> = reader
        .headers()
        .context("Failed to read CSV headers")?
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for result in reader.records() {
        let record = result.context("Failed to read CSV record")?;
        for (column, cell) in cells.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }

    if cells.first().map_or(true, Vec::is_empty) {
        return Err(anyhow!("CSV must contain at least one data row"));
    }

    let mut df = DataFrame::new();
    for (name, raw) in headers.iter().zip(cells) {
        df.insert(name, infer_column(raw))
            .with_context(|| format!("Failed to add column '{}'", name))?;
    }
    Ok(df)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Integers, then floats, then booleans; anything else stays text. Empty
/// cells are missing values in numeric columns.
fn infer_column(raw: Vec<String>) -> Column {
    let filled = || raw.iter().map(|s| s.trim()).filter(|s| !s.is_empty());
    if filled().all(|s| s.parse::<i64>().is_ok()) && filled().next().is_some() {
        return Column::from_values(
            raw.iter()
                .map(|s| s.trim().parse::<i64>().map_or(Value::Null, Value::Int))
                .collect(),
        );
    }
    if filled().all(|s| s.parse::<f64>().is_ok()) && filled().next().is_some() {
        return Column::Float(
            raw.iter()
                .map(|s| s.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        );
    }
    if raw.iter().all(|s| parse_bool(s.trim()).is_some()) {
        return Column::Bool(raw.iter().map(|s| parse_bool(s.trim()) == Some(true)).collect());
    }
    Column::Str(raw)
}

pub fn parse_column_selector(input: &str) -> ColumnSelector {
    match input.parse::<usize>() {
        Ok(index) => ColumnSelector::Index(index),
        Err(_) => ColumnSelector::Name(input.to_string()),
    }
}

/// Name of the column a selector points at; names match case-insensitively.
pub fn resolve_column(df: &DataFrame, selector: ColumnSelector) -> Result<String> {
    let headers = df.names();
    match selector {
        ColumnSelector::Index(idx) => headers.get(idx).cloned().ok_or_else(|| {
            anyhow!(
                "Column index {} out of bounds (available columns: {})",
                idx,
                headers.len()
            )
        }),
        ColumnSelector::Name(name) => headers
            .iter()
            .find(|h| h.eq_ignore_ascii_case(&name))
            .cloned()
            .ok_or_else(|| {
                anyhow!(
                    "Column '{}' not found. Available columns: {}",
                    name,
                    headers.join(", ")
                )
            }),
    }
}
