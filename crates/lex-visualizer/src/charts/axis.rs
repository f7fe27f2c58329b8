//! Mapping column values onto a continuous chart axis.
//!
//! Numeric columns plot as-is, temporal columns as milliseconds since the
//! epoch with date tick labels, and categorical columns as integer positions
//! in first-appearance order.

use chrono::{DateTime, NaiveTime};
use indexmap::IndexSet;
use polars::prelude::*;
use std::ops::Range;

use crate::dataset::SemanticType;
use crate::utils::{numeric_values, temporal_millis, text_values};

/// How tick values on an axis are rendered.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum AxisScale {
    Linear,
    Temporal(TemporalKind),
    /// Category names indexed by position.
    Categorical(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TemporalKind {
    Date,
    DateTime,
    Time,
}

/// A column projected onto an `f64` axis.
#[derive(Debug, Clone)]
pub(crate) struct Axis {
    pub positions: Vec<Option<f64>>,
    pub scale: AxisScale,
}

impl Axis {
    pub fn from_series(series: &Series) -> PolarsResult<Self> {
        match SemanticType::of(series.dtype()) {
            SemanticType::Numeric => Ok(Self {
                positions: numeric_values(series)?,
                scale: AxisScale::Linear,
            }),
            SemanticType::Temporal => {
                let kind = match series.dtype() {
                    DataType::Date => TemporalKind::Date,
                    DataType::Time => TemporalKind::Time,
                    _ => TemporalKind::DateTime,
                };
                Ok(Self {
                    positions: temporal_millis(series)?,
                    scale: AxisScale::Temporal(kind),
                })
            }
            SemanticType::Categorical => {
                let (positions, categories) = category_positions(&text_values(series)?);
                Ok(Self {
                    positions,
                    scale: AxisScale::Categorical(categories),
                })
            }
        }
    }

    /// Axis range covering `values` (categorical axes cover every category).
    pub fn range(&self, values: impl IntoIterator<Item = f64>) -> Range<f64> {
        match &self.scale {
            AxisScale::Categorical(categories) => category_range(categories.len()),
            _ => padded_range(values),
        }
    }

    /// Suggested number of tick labels.
    pub fn tick_count(&self) -> usize {
        match &self.scale {
            AxisScale::Categorical(categories) => categories.len() + 1,
            AxisScale::Temporal(_) => 6,
            AxisScale::Linear => 10,
        }
    }

    pub fn format(&self, value: f64) -> String {
        match &self.scale {
            AxisScale::Linear => format_tick(value),
            AxisScale::Temporal(kind) => format_temporal(*kind, value),
            AxisScale::Categorical(categories) => category_label(categories, value),
        }
    }
}

/// Assign each distinct value its first-appearance index.
pub(crate) fn category_positions(values: &[Option<String>]) -> (Vec<Option<f64>>, Vec<String>) {
    let mut categories: IndexSet<&str> = IndexSet::new();
    let positions = values
        .iter()
        .map(|v| {
            v.as_deref()
                .map(|v| categories.insert_full(v).0 as f64)
        })
        .collect();
    let categories = categories.into_iter().map(str::to_string).collect();
    (positions, categories)
}

/// Range for `count` categories centred on integer positions.
pub(crate) fn category_range(count: usize) -> Range<f64> {
    if count == 0 {
        -0.5..0.5
    } else {
        -0.5..count as f64 - 0.5
    }
}

/// Name of the category at `value`, or an empty label between positions.
pub(crate) fn category_label(categories: &[String], value: f64) -> String {
    let rounded = value.round();
    if (value - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    categories
        .get(rounded as usize)
        .cloned()
        .unwrap_or_default()
}

/// Data range with 5% padding. Empty input gives `0..1`; a single value is
/// padded by 0.5 either side.
pub(crate) fn padded_range(values: impl IntoIterator<Item = f64>) -> Range<f64> {
    let (min, max) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if min > max {
        return 0.0..1.0;
    }
    if min == max {
        return min - 0.5..max + 0.5;
    }
    let pad = (max - min) * 0.05;
    min - pad..max + pad
}

pub(crate) fn format_tick(value: f64) -> String {
    if value.abs() < 1e-9 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_temporal(kind: TemporalKind, millis: f64) -> String {
    let millis = millis.round() as i64;
    match kind {
        TemporalKind::Time => {
            let secs = millis.div_euclid(1000) as u32;
            let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
                .map(|t| t.format("%H:%M:%S").to_string())
                .unwrap_or_default()
        }
        TemporalKind::Date => DateTime::from_timestamp_millis(millis)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        TemporalKind::DateTime => DateTime::from_timestamp_millis(millis)
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorical_axis() {
        let series = Series::new("c".into(), &[Some("b"), Some("a"), None, Some("b")]);
        let axis = Axis::from_series(&series).unwrap();
        assert_eq!(axis.positions, vec![Some(0.0), Some(1.0), None, Some(0.0)]);
        assert_eq!(
            axis.scale,
            AxisScale::Categorical(vec!["b".to_string(), "a".to_string()])
        );
        assert_eq!(axis.range(Vec::new()), -0.5..1.5);
        assert_eq!(axis.format(1.0), "a");
        assert_eq!(axis.format(0.5), "");
        assert_eq!(axis.format(7.0), "");
    }

    #[test]
    fn test_temporal_axis_labels() {
        let series = Series::new("d".into(), &[Some(0i32), Some(31)])
            .cast(&DataType::Date)
            .unwrap();
        let axis = Axis::from_series(&series).unwrap();
        assert_eq!(axis.scale, AxisScale::Temporal(TemporalKind::Date));
        assert_eq!(axis.format(31.0 * 86_400_000.0), "1970-02-01");
    }

    #[test]
    fn test_padded_range() {
        assert_eq!(padded_range(Vec::new()), 0.0..1.0);
        assert_eq!(padded_range([2.0, 2.0]), 1.5..2.5);
        let range = padded_range([0.0, 10.0, f64::NAN]);
        assert_eq!(range, -0.5..10.5);
    }

    #[test]
    fn test_format_tick() {
        assert_eq!(format_tick(3.0), "3");
        assert_eq!(format_tick(2.5), "2.5");
        assert_eq!(format_tick(0.125), "0.125");
        assert_eq!(format_tick(-1e-12), "0");
    }
}
