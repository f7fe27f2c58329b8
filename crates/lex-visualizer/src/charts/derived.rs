//! Summary tables computed while rendering a chart.
//!
//! Each table is meaningful output on its own (a correlation matrix, value
//! counts, per-category aggregates) and converts to a [`Dataset`] so it can
//! be exported like any other table.

use indexmap::IndexMap;
use polars::prelude::*;
use serde::Serialize;

use crate::dataset::{Dataset, SemanticType};
use crate::stats;
use crate::utils::numeric_values;

/// A table derived from the chart input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", content = "rows", rename_all = "snake_case")]
pub enum DerivedTable {
    CorrelationMatrix(CorrelationMatrix),
    ValueCounts(Vec<ValueCount>),
    CategoryMeans(Vec<CategoryMean>),
    BoxSummary(Vec<BoxSummary>),
    HistogramBins(Vec<HistogramBin>),
}

impl DerivedTable {
    pub fn name(&self) -> &'static str {
        match self {
            DerivedTable::CorrelationMatrix(_) => "correlation_matrix",
            DerivedTable::ValueCounts(_) => "value_counts",
            DerivedTable::CategoryMeans(_) => "category_means",
            DerivedTable::BoxSummary(_) => "box_summary",
            DerivedTable::HistogramBins(_) => "histogram_bins",
        }
    }

    pub fn to_dataset(&self) -> PolarsResult<Dataset> {
        match self {
            DerivedTable::CorrelationMatrix(matrix) => matrix.to_dataset(),
            DerivedTable::ValueCounts(rows) => {
                let height = rows.len();
                Dataset::from_columns(
                    height,
                    vec![
                        Column::new("value".into(), rows.iter().map(|r| r.value.as_str()).collect::<Vec<_>>()),
                        Column::new("count".into(), rows.iter().map(|r| r.count as u64).collect::<Vec<_>>()),
                        Column::new("percentage".into(), rows.iter().map(|r| r.percentage).collect::<Vec<_>>()),
                    ],
                )
            }
            DerivedTable::CategoryMeans(rows) => Dataset::from_columns(
                rows.len(),
                vec![
                    Column::new("category".into(), rows.iter().map(|r| r.category.as_str()).collect::<Vec<_>>()),
                    Column::new("mean".into(), rows.iter().map(|r| r.mean).collect::<Vec<_>>()),
                    Column::new("count".into(), rows.iter().map(|r| r.count as u64).collect::<Vec<_>>()),
                ],
            ),
            DerivedTable::BoxSummary(rows) => Dataset::from_columns(
                rows.len(),
                vec![
                    Column::new("category".into(), rows.iter().map(|r| r.category.as_str()).collect::<Vec<_>>()),
                    Column::new("count".into(), rows.iter().map(|r| r.count as u64).collect::<Vec<_>>()),
                    Column::new("q1".into(), rows.iter().map(|r| r.q1).collect::<Vec<_>>()),
                    Column::new("median".into(), rows.iter().map(|r| r.median).collect::<Vec<_>>()),
                    Column::new("q3".into(), rows.iter().map(|r| r.q3).collect::<Vec<_>>()),
                    Column::new("whisker_low".into(), rows.iter().map(|r| r.whisker_low).collect::<Vec<_>>()),
                    Column::new("whisker_high".into(), rows.iter().map(|r| r.whisker_high).collect::<Vec<_>>()),
                    Column::new(
                        "outliers".into(),
                        rows.iter()
                            .map(|r| {
                                r.outliers
                                    .iter()
                                    .map(|v| v.to_string())
                                    .collect::<Vec<_>>()
                                    .join(";")
                            })
                            .collect::<Vec<_>>(),
                    ),
                ],
            ),
            DerivedTable::HistogramBins(rows) => Dataset::from_columns(
                rows.len(),
                vec![
                    Column::new("bin_start".into(), rows.iter().map(|r| r.bin_start).collect::<Vec<_>>()),
                    Column::new("bin_end".into(), rows.iter().map(|r| r.bin_end).collect::<Vec<_>>()),
                    Column::new("count".into(), rows.iter().map(|r| r.count as u64).collect::<Vec<_>>()),
                ],
            ),
        }
    }
}

/// Pearson correlation of every pair of numeric columns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; NaN where a pair has no variance.
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Correlate every numeric column of `dataset`, using the rows where
    /// both columns of a pair are present.
    pub fn from_dataset(dataset: &Dataset) -> PolarsResult<Self> {
        let columns = dataset.columns_of_type(SemanticType::Numeric);
        let mut data = Vec::with_capacity(columns.len());
        for name in &columns {
            let series = dataset.frame().column(name)?.as_materialized_series();
            data.push(numeric_values(series)?);
        }

        let n = columns.len();
        let mut values = vec![vec![f64::NAN; n]; n];
        for i in 0..n {
            for j in i..n {
                let r = stats::pearson(&data[i], &data[j]);
                values[i][j] = r;
                values[j][i] = r;
            }
        }
        Ok(Self { columns, values })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Cell annotation: two decimals, or `nan`.
    pub fn annotation(value: f64) -> String {
        if value.is_nan() {
            "nan".to_string()
        } else {
            format!("{value:.2}")
        }
    }

    /// Name of the row-label column: `column`, suffixed `.1`, `.2`, ... while
    /// it clashes with a correlated column.
    fn label_column_name(&self) -> String {
        let mut candidate = "column".to_string();
        let mut suffix = 1;
        while self.columns.contains(&candidate) {
            candidate = format!("column.{suffix}");
            suffix += 1;
        }
        candidate
    }

    fn to_dataset(&self) -> PolarsResult<Dataset> {
        let mut columns = Vec::with_capacity(self.len() + 1);
        columns.push(Column::new(self.label_column_name().into(), self.columns.clone()));
        for (j, name) in self.columns.iter().enumerate() {
            let values: Vec<f64> = self.values.iter().map(|row| row[j]).collect();
            columns.push(Column::new(name.as_str().into(), values));
        }
        Dataset::from_columns(self.len(), columns)
    }
}

/// Frequency of one distinct value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
    /// Share of all non-missing values, 0 to 100.
    pub percentage: f64,
}

impl ValueCount {
    /// Wedge annotation, e.g. `66.7%`.
    pub fn label(&self) -> String {
        format!("{:.1}%", self.percentage)
    }
}

/// Mean of the value column within one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMean {
    pub category: String,
    pub mean: f64,
    pub count: usize,
}

/// Box-plot statistics of one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub category: String,
    pub count: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_low: f64,
    pub whisker_high: f64,
    pub outliers: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramBin {
    pub bin_start: f64,
    pub bin_end: f64,
    pub count: usize,
}

/// Count distinct non-missing values, most frequent first. Equal counts
/// keep first-appearance order.
pub fn value_counts<S: AsRef<str>>(values: &[Option<S>]) -> Vec<ValueCount> {
    let mut counts: IndexMap<&str, usize> = IndexMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_ref()).or_insert(0) += 1;
    }
    let total: usize = counts.values().sum();

    let mut rows: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount {
            value: value.to_string(),
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    rows.sort_by(|a, b| b.count.cmp(&a.count));
    rows
}

/// Group `values` by the category on the same row, in first-appearance
/// order. Rows missing either side are dropped.
pub(crate) fn group_by_category(
    categories: &[Option<String>],
    values: &[Option<f64>],
) -> IndexMap<String, Vec<f64>> {
    let mut groups: IndexMap<String, Vec<f64>> = IndexMap::new();
    for (category, value) in categories.iter().zip(values) {
        if let (Some(category), Some(value)) = (category, value) {
            groups.entry(category.clone()).or_default().push(*value);
        }
    }
    groups
}

pub(crate) fn category_means(groups: &IndexMap<String, Vec<f64>>) -> Vec<CategoryMean> {
    groups
        .iter()
        .filter_map(|(category, values)| {
            stats::mean(values).map(|mean| CategoryMean {
                category: category.clone(),
                mean,
                count: values.len(),
            })
        })
        .collect()
}

pub(crate) fn box_summaries(groups: &IndexMap<String, Vec<f64>>) -> Vec<BoxSummary> {
    groups
        .iter()
        .filter_map(|(category, values)| {
            stats::box_stats(values).map(|b| BoxSummary {
                category: category.clone(),
                count: b.count,
                q1: b.q1,
                median: b.median,
                q3: b.q3,
                whisker_low: b.whisker_low,
                whisker_high: b.whisker_high,
                outliers: b.outliers,
            })
        })
        .collect()
}

pub(crate) fn histogram_bins(values: &[f64]) -> Vec<HistogramBin> {
    let edges = stats::auto_bin_edges(values);
    let counts = stats::histogram_counts(values, &edges);
    edges
        .windows(2)
        .zip(counts)
        .map(|(edge, count)| HistogramBin {
            bin_start: edge[0],
            bin_end: edge[1],
            count,
        })
        .collect()
}
