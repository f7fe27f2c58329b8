//! Column type inference for cell grids read from spreadsheets.
//!
//! The first row is the header. Every other column is typed by looking at
//! all of its non-empty cells: numbers (or text that parses as a number)
//! make a numeric column, dates make a temporal column, booleans make a
//! boolean column, and anything mixed falls back to text.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;
use std::collections::HashSet;

use crate::utils::{format_number, parse_numeric_string};

/// Largest integer an f64 holds exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

// Date pattern regex - compiled once at startup
static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{1,4}[-/.]\d{1,2}[-/.]\d{1,4}([ T]\d{1,2}:\d{2}(:\d{2}(\.\d+)?)?)?$")
        .expect("Invalid regex: date pattern")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y"];

/// A single spreadsheet cell.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Cell {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    fn render(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Number(v) => Some(format_number(*v)),
            Cell::Text(s) => Some(s.clone()),
            Cell::Bool(b) => Some(b.to_string()),
            Cell::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
        }
    }
}

/// Parse date-like text into a timestamp.
pub(crate) fn parse_date_text(s: &str) -> Option<NaiveDateTime> {
    let trimmed = s.trim();
    if !DATE_PATTERN.is_match(trimmed) {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InferredKind {
    Empty,
    Boolean,
    Integer,
    Float,
    Temporal,
    Text,
}

fn classify<'a>(cells: impl Iterator<Item = &'a Cell>) -> InferredKind {
    let mut seen = false;
    let mut all_bool = true;
    let mut all_numeric = true;
    let mut all_integral = true;
    let mut all_date = true;

    for cell in cells.filter(|c| !c.is_empty()) {
        seen = true;
        match cell {
            Cell::Bool(_) => {
                all_numeric = false;
                all_date = false;
            }
            Cell::Number(v) => {
                all_bool = false;
                all_date = false;
                all_integral &= v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER;
            }
            Cell::DateTime(_) => {
                all_bool = false;
                all_numeric = false;
            }
            Cell::Text(s) => {
                all_bool = false;
                match parse_numeric_string(s) {
                    Some(v) => {
                        all_date = false;
                        all_integral &= v.fract() == 0.0 && v.abs() <= MAX_EXACT_INTEGER;
                    }
                    None => {
                        all_numeric = false;
                        all_date &= parse_date_text(s).is_some();
                    }
                }
            }
            Cell::Empty => {}
        }
        if !(all_bool || all_numeric || all_date) {
            return InferredKind::Text;
        }
    }

    if !seen {
        InferredKind::Empty
    } else if all_bool {
        InferredKind::Boolean
    } else if all_numeric && all_integral {
        InferredKind::Integer
    } else if all_numeric {
        InferredKind::Float
    } else if all_date {
        InferredKind::Temporal
    } else {
        InferredKind::Text
    }
}

fn cell_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(v) => Some(*v),
        Cell::Text(s) => parse_numeric_string(s),
        _ => None,
    }
}

fn cell_datetime(cell: &Cell) -> Option<NaiveDateTime> {
    match cell {
        Cell::DateTime(dt) => Some(*dt),
        Cell::Text(s) => parse_date_text(s),
        _ => None,
    }
}

fn build_column(name: &str, cells: &[&Cell]) -> PolarsResult<Column> {
    let name = PlSmallStr::from(name);
    let series = match classify(cells.iter().copied()) {
        InferredKind::Empty => {
            Series::full_null(name, cells.len(), &DataType::String)
        }
        InferredKind::Boolean => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|c| match c {
                    Cell::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Series::new(name, values)
        }
        InferredKind::Integer => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| cell_number(c).map(|v| v as i64))
                .collect();
            Series::new(name, values)
        }
        InferredKind::Float => {
            let values: Vec<Option<f64>> = cells.iter().map(|c| cell_number(c)).collect();
            Series::new(name, values)
        }
        InferredKind::Temporal => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|c| cell_datetime(c).map(|dt| dt.and_utc().timestamp_millis()))
                .collect();
            Series::new(name, values).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
        }
        InferredKind::Text => {
            let values: Vec<Option<String>> = cells
                .iter()
                .map(|c| if c.is_empty() { None } else { c.render() })
                .collect();
            Series::new(name, values)
        }
    };
    Ok(series.into_column())
}

/// Make header names unique and non-empty.
///
/// Blank names become `Unnamed: <index>`; repeated names get a `.<n>` suffix.
pub(crate) fn unique_header_names(raw: &[Option<String>]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());

    for (idx, name) in raw.iter().enumerate() {
        let base = match name.as_deref().map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => format!("Unnamed: {idx}"),
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while used.contains(&candidate) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        used.insert(candidate.clone());
        names.push(candidate);
    }
    names
}

/// Turn a grid of rows into a DataFrame, using the first non-empty row as
/// the header. Trailing empty rows are dropped.
pub(crate) fn frame_from_grid(rows: Vec<Vec<Cell>>) -> PolarsResult<DataFrame> {
    let row_is_empty = |row: &Vec<Cell>| row.iter().all(Cell::is_empty);

    let Some(header_idx) = rows.iter().position(|r| !row_is_empty(r)) else {
        return Ok(DataFrame::empty());
    };
    let last = rows
        .iter()
        .rposition(|r| !row_is_empty(r))
        .unwrap_or(header_idx);

    let header = &rows[header_idx];
    let body = &rows[header_idx + 1..=last];
    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let raw_names: Vec<Option<String>> = (0..width)
        .map(|i| header.get(i).and_then(Cell::render))
        .collect();
    let names = unique_header_names(&raw_names);

    let empty = Cell::Empty;
    let columns = names
        .iter()
        .enumerate()
        .map(|(col, name)| {
            let cells: Vec<&Cell> = body.iter().map(|row| row.get(col).unwrap_or(&empty)).collect();
            build_column(name, &cells)
        })
        .collect::<PolarsResult<Vec<_>>>()?;

    DataFrame::new_with_height(body.len(), columns)
}
