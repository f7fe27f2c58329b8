//! Imputation module for repairing missing values.
//!
//! [`ImputationEngine`] applies a [`CleaningPolicy`] column by column: the
//! semantic type of each column picks the statistic, and every missing cell
//! of the column receives that single value.

mod statistical;

pub use statistical::{FilledColumn, StatisticalImputer, UNKNOWN_CATEGORY};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{CategoricalImputation, CleaningPolicy, NumericImputation, TemporalImputation};
use crate::dataset::{Dataset, SemanticType};
use crate::error::{ImputationIndeterminate, Result};
use crate::types::{ColumnImputation, ImputationReport};

/// Repairs missing values according to a [`CleaningPolicy`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImputationEngine {
    policy: CleaningPolicy,
}

impl ImputationEngine {
    pub fn new(policy: CleaningPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CleaningPolicy {
        &self.policy
    }

    /// Return a repaired copy of `dataset`.
    pub fn clean(&self, dataset: &Dataset) -> Result<Dataset> {
        self.clean_with_report(dataset).map(|(cleaned, _)| cleaned)
    }

    /// Return a repaired copy of `dataset` and what was done to it.
    ///
    /// Columns without missing values are copied unchanged. A column with no
    /// observed values is left as is and listed as indeterminate.
    pub fn clean_with_report(&self, dataset: &Dataset) -> Result<(Dataset, ImputationReport)> {
        info!(
            "Imputing missing values ({} missing cells across {} columns)",
            dataset.missing_count(),
            dataset.width()
        );

        let mut report = ImputationReport::default();
        let mut columns = Vec::with_capacity(dataset.width());

        for column in dataset.frame().get_columns() {
            let missing = column.null_count();
            if missing == 0 {
                columns.push(column.clone());
                continue;
            }

            let series = column.as_materialized_series();
            let semantic_type = SemanticType::of(series.dtype());
            let (strategy, filled) = self.fill(series, semantic_type)?;

            match filled {
                Some(filled) => {
                    debug!(
                        column = %series.name(),
                        strategy,
                        fill_value = %filled.fill_value,
                        cells = filled.cells_filled,
                        "Filled missing values"
                    );
                    report.filled.push(ColumnImputation {
                        column: series.name().to_string(),
                        semantic_type,
                        strategy: strategy.to_string(),
                        cells_filled: filled.cells_filled,
                        fill_value: filled.fill_value,
                    });
                    columns.push(filled.series.into_column());
                }
                None => {
                    let condition = ImputationIndeterminate {
                        column: series.name().to_string(),
                        semantic_type,
                    };
                    warn!("{}", condition);
                    report.indeterminate.push(condition);
                    columns.push(column.clone());
                }
            }
        }

        let cleaned = Dataset::from_columns(dataset.height(), columns)?;
        info!(
            "Imputation filled {} cells in {} columns",
            report.cells_filled(),
            report.filled.len()
        );
        Ok((cleaned, report))
    }

    fn fill(
        &self,
        series: &Series,
        semantic_type: SemanticType,
    ) -> PolarsResult<(&'static str, Option<FilledColumn>)> {
        Ok(match semantic_type {
            SemanticType::Numeric => match self.policy.numeric {
                NumericImputation::Mean => ("mean", StatisticalImputer::numeric_mean(series)?),
                NumericImputation::Median => ("median", StatisticalImputer::numeric_median(series)?),
            },
            SemanticType::Temporal => match self.policy.temporal {
                TemporalImputation::Median => {
                    ("median", StatisticalImputer::temporal_median(series)?)
                }
                TemporalImputation::Mean => ("mean", StatisticalImputer::temporal_mean(series)?),
            },
            SemanticType::Categorical => {
                // A constant cannot describe a column that was never observed.
                if series.null_count() == series.len() {
                    return Ok(("constant", None));
                }
                match self.policy.categorical {
                    CategoricalImputation::Mode => {
                        ("mode", StatisticalImputer::categorical_mode(series)?)
                    }
                    CategoricalImputation::Constant => {
                        ("constant", StatisticalImputer::categorical_constant(series)?)
                    }
                }
            }
        })
    }
}
