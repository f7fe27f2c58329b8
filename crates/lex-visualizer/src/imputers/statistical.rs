//! Statistical imputation methods.
//!
//! Mean and median for numeric and temporal columns, mode or a constant for
//! categorical ones. Every method fills all missing cells of a column with
//! one value and returns `None` when no statistic exists.

use polars::prelude::*;

use crate::utils::{
    first_mode, fill_numeric_nulls, fill_string_nulls, fits_in_f64, is_integer_dtype,
};

/// Placeholder used by constant categorical imputation.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// A repaired column and the value written into its missing cells.
#[derive(Debug, Clone)]
pub struct FilledColumn {
    pub series: Series,
    pub fill_value: String,
    pub cells_filled: usize,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill a numeric column with its mean.
    pub fn numeric_mean(series: &Series) -> PolarsResult<Option<FilledColumn>> {
        Self::fill_numeric(series, series.mean())
    }

    /// Fill a numeric column with its median.
    pub fn numeric_median(series: &Series) -> PolarsResult<Option<FilledColumn>> {
        Self::fill_numeric(series, series.median())
    }

    /// Float columns keep their dtype. Integer columns keep theirs when the
    /// statistic is integral, widen to Float64 when every value converts
    /// exactly, and otherwise take the rounded statistic in their own dtype.
    fn fill_numeric(series: &Series, statistic: Option<f64>) -> PolarsResult<Option<FilledColumn>> {
        let Some(value) = statistic.filter(|v| v.is_finite()) else {
            return Ok(None);
        };

        let dtype = series.dtype();
        let (value, target) = if !is_integer_dtype(dtype) || value.fract() == 0.0 {
            (value, dtype.clone())
        } else if fits_in_f64(series)? {
            (value, DataType::Float64)
        } else {
            (value.round(), dtype.clone())
        };

        Ok(Some(FilledColumn {
            series: fill_numeric_nulls(series, value, &target)?,
            fill_value: value.to_string(),
            cells_filled: series.null_count(),
        }))
    }

    /// Fill a temporal column with its median timestamp.
    pub fn temporal_median(series: &Series) -> PolarsResult<Option<FilledColumn>> {
        Self::fill_temporal(series, |physical| physical.median())
    }

    /// Fill a temporal column with its mean timestamp.
    pub fn temporal_mean(series: &Series) -> PolarsResult<Option<FilledColumn>> {
        Self::fill_temporal(series, |physical| physical.mean())
    }

    /// The statistic is taken over the physical values (days or time units
    /// since the epoch) and rounded to the nearest unit.
    fn fill_temporal<F>(series: &Series, statistic: F) -> PolarsResult<Option<FilledColumn>>
    where
        F: Fn(&Series) -> Option<f64>,
    {
        let physical = series.to_physical_repr();
        let physical_dtype = physical.dtype().clone();
        let Some(value) = statistic(&physical.cast(&DataType::Float64)?).filter(|v| v.is_finite())
        else {
            return Ok(None);
        };
        let fill = value.round() as i64;

        let ints = physical.cast(&DataType::Int64)?;
        let filled: Int64Chunked = ints
            .i64()?
            .into_iter()
            .map(|v| Some(v.unwrap_or(fill)))
            .collect();
        let filled = filled
            .with_name(series.name().clone())
            .into_series()
            .cast(&physical_dtype)?
            .cast(series.dtype())?;

        let fill_value = series
            .is_null()
            .into_iter()
            .position(|is_null| is_null == Some(true))
            .map(|idx| filled.get(idx).map(|v| v.str_value().into_owned()))
            .transpose()?
            .unwrap_or_else(|| fill.to_string());

        Ok(Some(FilledColumn {
            series: filled,
            fill_value,
            cells_filled: series.null_count(),
        }))
    }

    /// Fill a categorical column with its most frequent value.
    ///
    /// Values are compared by their text rendering and ties go to the value
    /// seen first. The fill gathers the first row holding the mode, so the
    /// column keeps its dtype.
    pub fn categorical_mode(series: &Series) -> PolarsResult<Option<FilledColumn>> {
        let text = series.cast(&DataType::String)?;
        let Some((mode, first_idx, _)) = first_mode(text.str()?.into_iter()) else {
            return Ok(None);
        };
        let fill_value = mode.to_string();

        let source = first_idx as IdxSize;
        let indices: Vec<IdxSize> = series
            .is_null()
            .into_iter()
            .enumerate()
            .map(|(idx, is_null)| {
                if is_null.unwrap_or(false) {
                    source
                } else {
                    idx as IdxSize
                }
            })
            .collect();
        let indices = IdxCa::from_vec(series.name().clone(), indices);

        Ok(Some(FilledColumn {
            series: series.take(&indices)?,
            fill_value,
            cells_filled: series.null_count(),
        }))
    }

    /// Fill a categorical column with the constant [`UNKNOWN_CATEGORY`].
    /// The result is a text column.
    pub fn categorical_constant(series: &Series) -> PolarsResult<Option<FilledColumn>> {
        Ok(Some(FilledColumn {
            series: fill_string_nulls(series, UNKNOWN_CATEGORY)?,
            fill_value: UNKNOWN_CATEGORY.to_string(),
            cells_filled: series.null_count(),
        }))
    }
}
