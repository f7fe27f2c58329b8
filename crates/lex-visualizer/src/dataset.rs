//! The in-memory table every pipeline stage consumes and produces.
//!
//! A [`Dataset`] wraps a polars [`DataFrame`]. Stages take a dataset by
//! reference and return a new one, so a value held by a caller is never
//! changed underneath it. Column buffers are reference counted, which keeps
//! those copies cheap.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::types::ColumnInfo;
use crate::utils::{DtypeCategory, get_dtype_category};

/// The semantic type of a column, shared by inference, imputation policy
/// selection and chart input validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Numeric,
    Categorical,
    Temporal,
}

impl SemanticType {
    /// Derive the semantic type from a polars dtype.
    ///
    /// Booleans and any non-numeric, non-temporal dtype are categorical.
    pub fn of(dtype: &DataType) -> Self {
        match get_dtype_category(dtype) {
            DtypeCategory::Numeric => SemanticType::Numeric,
            DtypeCategory::Temporal => SemanticType::Temporal,
            DtypeCategory::Boolean | DtypeCategory::String | DtypeCategory::Other => {
                SemanticType::Categorical
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Categorical => "categorical",
            SemanticType::Temporal => "temporal",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of uniquely named, equal-length columns.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    /// Wrap a DataFrame. Polars rejects duplicate names and ragged columns
    /// when the frame is built, so every frame is a valid dataset.
    pub fn new(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Build a dataset from columns, keeping `height` rows even when
    /// `columns` is empty.
    pub fn from_columns(height: usize, columns: Vec<Column>) -> PolarsResult<Self> {
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.name().as_str()) {
                return Err(PolarsError::Duplicate(
                    format!("column '{}' appears more than once", column.name()).into(),
                ));
            }
        }
        Ok(Self::new(DataFrame::new_with_height(height, columns)?))
    }

    /// A dataset with no columns and `height` rows.
    pub fn empty_with_height(height: usize) -> Self {
        Self::new(DataFrame::empty_with_height(height))
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Number of columns.
    pub fn width(&self) -> usize {
        self.frame.width()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    pub fn series(&self, name: &str) -> Option<&Series> {
        self.frame
            .column(name)
            .ok()
            .map(|column| column.as_materialized_series())
    }

    pub fn semantic_type(&self, name: &str) -> Option<SemanticType> {
        self.series(name).map(|s| SemanticType::of(s.dtype()))
    }

    /// Names of every column with the given semantic type, in column order.
    pub fn columns_of_type(&self, semantic_type: SemanticType) -> Vec<String> {
        self.frame
            .get_columns()
            .iter()
            .filter(|c| SemanticType::of(c.dtype()) == semantic_type)
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Total number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.frame.get_columns().iter().map(|c| c.null_count()).sum()
    }

    /// Per-column name, dtype, semantic type and missing count.
    pub fn schema_summary(&self) -> Vec<ColumnInfo> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| ColumnInfo {
                name: c.name().to_string(),
                dtype: c.dtype().to_string(),
                semantic_type: SemanticType::of(c.dtype()),
                missing: c.null_count(),
            })
            .collect()
    }
}

impl From<DataFrame> for Dataset {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}

/// Value equality: same names in the same order and equal cells, with
/// missing equal to missing.
impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.frame.equals_missing(&other.frame)
    }
}
