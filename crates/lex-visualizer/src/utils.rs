//! Shared utilities for the visualization pipeline.
//!
//! Dtype classification and the column-to-vector conversions used by the
//! imputation engine and the chart dispatcher.

use indexmap::IndexMap;
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a polars data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date, datetime or time types
    Temporal,
    /// Boolean type
    Boolean,
    /// String/text type
    String,
    /// Other/unknown types
    Other,
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    is_integer_dtype(dtype) || matches!(dtype, DataType::Float32 | DataType::Float64)
}

/// Check if a DataType is an integer type.
#[inline]
pub fn is_integer_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

#[inline]
pub fn is_temporal_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_temporal_dtype(dtype) {
        DtypeCategory::Temporal
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Value Extraction
// =============================================================================

/// Numeric values of a Series as `f64`, with nulls preserved.
pub fn numeric_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let floats = series.cast(&DataType::Float64)?;
    Ok(floats.f64()?.into_iter().collect())
}

/// Temporal values of a Series as milliseconds since the Unix epoch.
///
/// `Time` values are milliseconds since midnight.
pub fn temporal_millis(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    let scale = match series.dtype() {
        DataType::Date => 86_400_000.0,
        DataType::Datetime(TimeUnit::Milliseconds, _) => 1.0,
        DataType::Datetime(TimeUnit::Microseconds, _) => 1e-3,
        DataType::Datetime(TimeUnit::Nanoseconds, _) | DataType::Time => 1e-6,
        other => {
            return Err(PolarsError::InvalidOperation(
                format!("'{}' has non-temporal dtype {other}", series.name()).into(),
            ));
        }
    };
    let physical = series.to_physical_repr().cast(&DataType::Float64)?;
    Ok(physical
        .f64()?
        .into_iter()
        .map(|v| v.map(|v| v * scale))
        .collect())
}

/// Text rendering of every cell, with nulls preserved.
///
/// Dates render as ISO-8601 and booleans as `true`/`false`.
pub fn text_values(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let strings = series.cast(&DataType::String)?;
    Ok(strings
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Try to parse a trimmed string as a number.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Render a float the way a delimited-text writer would: integral values
/// without a fractional part.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// =============================================================================
// Mode and Fill Helpers
// =============================================================================

/// The most frequent value among `values`, with its first position and count.
///
/// Ties go to the value encountered first.
pub fn first_mode<'a, I>(values: I) -> Option<(&'a str, usize, usize)>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut counts: IndexMap<&str, (usize, usize)> = IndexMap::new();
    for (idx, value) in values.into_iter().enumerate() {
        if let Some(value) = value {
            counts.entry(value).or_insert((idx, 0)).1 += 1;
        }
    }

    let mut best: Option<(&str, usize, usize)> = None;
    for (value, (first, count)) in counts {
        if best.is_none_or(|(_, _, best_count)| count > best_count) {
            best = Some((value, first, count));
        }
    }
    best
}

/// Fill null values in a numeric Series with a specific value.
///
/// The column is cast to `dtype` and the fill is written in that dtype, so
/// observed cells never pass through `Float64` unless `dtype` says so.
pub fn fill_numeric_nulls(series: &Series, fill_value: f64, dtype: &DataType) -> PolarsResult<Series> {
    let target = series.cast(dtype)?;
    let fill = Series::new(series.name().clone(), [fill_value])
        .strict_cast(dtype)?
        .new_from_index(0, target.len());
    target.zip_with(&target.is_not_null(), &fill)
}

/// Whether every value of an integer column survives a round trip through
/// `Float64`.
pub fn fits_in_f64(series: &Series) -> PolarsResult<bool> {
    let back = series.cast(&DataType::Float64)?.cast(series.dtype())?;
    Ok(back.equals_missing(series))
}

/// Fill null values in a Series with a constant string. The result is `String`.
pub fn fill_string_nulls(series: &Series, fill_value: &str) -> PolarsResult<Series> {
    let strings = series.cast(&DataType::String)?;
    let filled: StringChunked = strings
        .str()?
        .into_iter()
        .map(|v| Some(v.unwrap_or(fill_value)))
        .collect();
    Ok(filled.with_name(series.name().clone()).into_series())
}
