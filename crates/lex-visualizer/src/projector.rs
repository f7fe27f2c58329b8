//! Column projection: narrowing a dataset to a selected subset of columns.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::ProjectionError;

/// Narrows a [`Dataset`] to the selected columns.
pub struct ColumnProjector;

impl ColumnProjector {
    /// Keep only the columns named in `selected`.
    ///
    /// The result follows the dataset's column order, not the order of
    /// `selected`, and a name listed twice selects its column once. An empty
    /// selection yields zero columns with the same row count.
    pub fn project<S: AsRef<str>>(
        dataset: &Dataset,
        selected: &[S],
    ) -> Result<Dataset, ProjectionError> {
        if let Some(unknown) = selected
            .iter()
            .map(AsRef::as_ref)
            .find(|name| !dataset.has_column(name))
        {
            return Err(ProjectionError::ColumnNotFound {
                column: unknown.to_string(),
                available: dataset.column_names(),
            });
        }

        let wanted: HashSet<&str> = selected.iter().map(AsRef::as_ref).collect();
        let columns = dataset
            .frame()
            .get_columns()
            .iter()
            .filter(|c| wanted.contains(c.name().as_str()))
            .cloned()
            .collect::<Vec<_>>();

        info!(
            "Projecting {} of {} columns",
            columns.len(),
            dataset.width()
        );
        let projected = Dataset::from_columns(dataset.height(), columns)?;
        debug!(columns = ?projected.column_names(), "Projected dataset");
        Ok(projected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Dataset {
        Dataset::new(
            df! {
                "a" => [1i64, 2, 3],
                "b" => ["x", "y", "z"],
                "c" => [Some(1.5f64), None, Some(2.5)],
            }
            .unwrap(),
        )
    }

    #[test]
    fn test_all_columns_is_identity() {
        let ds = sample();
        let projected = ColumnProjector::project(&ds, &ds.column_names()).unwrap();
        assert_eq!(projected, ds);
    }

    #[test]
    fn test_keeps_original_order() {
        let projected = ColumnProjector::project(&sample(), &["c", "a"]).unwrap();
        assert_eq!(projected.column_names(), vec!["a", "c"]);
        assert_eq!(projected.height(), 3);
    }

    #[test]
    fn test_duplicate_selection() {
        let projected = ColumnProjector::project(&sample(), &["b", "b"]).unwrap();
        assert_eq!(projected.column_names(), vec!["b"]);
    }

    #[test]
    fn test_empty_selection_keeps_row_count() {
        let empty: [&str; 0] = [];
        let projected = ColumnProjector::project(&sample(), &empty).unwrap();
        assert_eq!(projected.width(), 0);
        assert_eq!(projected.height(), 3);
    }

    #[test]
    fn test_unknown_column() {
        let err = ColumnProjector::project(&sample(), &["a", "zzz"]).unwrap_err();
        match err {
            ProjectionError::ColumnNotFound { column, available } => {
                assert_eq!(column, "zzz");
                assert_eq!(available, vec!["a", "b", "c"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
