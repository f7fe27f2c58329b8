//! Chart dispatch: turning a [`Dataset`] and a [`ChartSpec`] into pixels.
//!
//! Each [`ChartKind`] validates its own columns, prepares its data (and a
//! [`DerivedTable`] for kinds that aggregate) and hands the result to the
//! plotters drawing code in `render`.

mod axis;
mod derived;
mod font;
mod render;
mod spec;

pub use derived::{
    BoxSummary, CategoryMean, CorrelationMatrix, DerivedTable, HistogramBin, ValueCount,
    value_counts,
};
pub use spec::{ChartKind, ChartLabels, ChartSpec, HEATMAP_TITLE};

use polars::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::dataset::{Dataset, SemanticType};
use crate::error::RenderError;
use crate::stats;
use crate::utils::{numeric_values, text_values};
use axis::Axis;
use render::Canvas;

/// Number of points on the density curve of a histogram.
const DENSITY_POINTS: usize = 200;

/// A rendered chart: raw RGB pixels plus what was drawn.
#[derive(Debug, Clone, Serialize)]
pub struct ChartArtifact {
    pub kind: ChartKind,
    pub labels: ChartLabels,
    pub width: u32,
    pub height: u32,
    /// Row-major RGB, three bytes per pixel.
    #[serde(skip)]
    pub pixels: Vec<u8>,
    pub derived: Option<DerivedTable>,
}

/// Renders charts at fixed canvas sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChartDispatcher {
    width: u32,
    height: u32,
    pie_size: u32,
}

impl Default for ChartDispatcher {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl ChartDispatcher {
    pub fn new(width: u32, height: u32, pie_size: u32) -> Self {
        Self {
            width,
            height,
            pie_size,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.chart_width, config.chart_height, config.pie_size)
    }

    /// Render `spec` over `dataset`.
    ///
    /// Fails when a required column is absent or has the wrong semantic
    /// type. Empty inputs render empty charts. No file I/O happens here.
    pub fn render(&self, dataset: &Dataset, spec: &ChartSpec) -> Result<ChartArtifact, RenderError> {
        font::ensure_registered()?;

        let kind = &spec.kind;
        let labels = spec.labels();
        info!("Rendering {} chart '{}'", kind.name(), labels.title);

        let canvas = Canvas {
            width: self.width,
            height: self.height,
        };
        let (canvas, pixels, derived) = match kind {
            ChartKind::Line { x, y } => {
                let axis = x_axis(dataset, x)?;
                let values = numeric_column(dataset, y, kind.name())?;
                let points = complete_pairs(&axis.positions, &values, kind.name());
                (canvas, render::line(canvas, &labels, &axis, &points)?, None)
            }
            ChartKind::Scatter { x, y } => {
                let axis = x_axis(dataset, x)?;
                let values = numeric_column(dataset, y, kind.name())?;
                let points = complete_pairs(&axis.positions, &values, kind.name());
                (canvas, render::scatter(canvas, &labels, &axis, &points)?, None)
            }
            ChartKind::Bar { x, y } => {
                let groups = grouped(dataset, x, y, kind.name())?;
                let means = derived::category_means(&groups);
                debug!(categories = means.len(), "Computed category means");
                let pixels = render::bar(canvas, &labels, &means)?;
                (canvas, pixels, Some(DerivedTable::CategoryMeans(means)))
            }
            ChartKind::Box { x, y } => {
                let groups = grouped(dataset, x, y, kind.name())?;
                let summaries = derived::box_summaries(&groups);
                debug!(categories = summaries.len(), "Computed box statistics");
                let pixels = render::boxes(canvas, &labels, &summaries)?;
                (canvas, pixels, Some(DerivedTable::BoxSummary(summaries)))
            }
            ChartKind::Histogram { y } => {
                let values: Vec<f64> = numeric_column(dataset, y, kind.name())?
                    .into_iter()
                    .flatten()
                    .filter(|v| v.is_finite())
                    .collect();
                let bins = derived::histogram_bins(&values);
                let density = scaled_density(&values, &bins);
                debug!(bins = bins.len(), values = values.len(), "Binned values");
                let pixels = render::histogram(canvas, &labels, &bins, &density)?;
                (canvas, pixels, Some(DerivedTable::HistogramBins(bins)))
            }
            ChartKind::Heatmap => {
                let matrix = CorrelationMatrix::from_dataset(dataset)?;
                debug!(columns = ?matrix.columns, "Computed correlation matrix");
                let pixels = render::heatmap(canvas, &labels, &matrix)?;
                (canvas, pixels, Some(DerivedTable::CorrelationMatrix(matrix)))
            }
            ChartKind::Pie { column } => {
                let series = column_series(dataset, column)?;
                let counts = value_counts(&text_values(series)?);
                debug!(wedges = counts.len(), "Computed value counts");
                let pixels = render::pie(self.pie_size, &labels, &counts)?;
                let canvas = Canvas {
                    width: self.pie_size,
                    height: self.pie_size,
                };
                (canvas, pixels, Some(DerivedTable::ValueCounts(counts)))
            }
        };

        Ok(ChartArtifact {
            kind: kind.clone(),
            labels,
            width: canvas.width,
            height: canvas.height,
            pixels,
            derived,
        })
    }
}

fn column_series<'d>(dataset: &'d Dataset, name: &str) -> Result<&'d Series, RenderError> {
    dataset
        .series(name)
        .ok_or_else(|| RenderError::ColumnNotFound {
            column: name.to_string(),
            available: dataset.column_names(),
        })
}

fn x_axis(dataset: &Dataset, name: &str) -> Result<Axis, RenderError> {
    Ok(Axis::from_series(column_series(dataset, name)?)?)
}

/// Values of a column that must be numeric for `chart`.
fn numeric_column(
    dataset: &Dataset,
    name: &str,
    chart: &'static str,
) -> Result<Vec<Option<f64>>, RenderError> {
    let series = column_series(dataset, name)?;
    let actual = SemanticType::of(series.dtype());
    if actual != SemanticType::Numeric {
        return Err(RenderError::ColumnType {
            column: name.to_string(),
            chart,
            expected: SemanticType::Numeric,
            actual,
        });
    }
    Ok(numeric_values(series)?)
}

/// Group the numeric `y` column by the text rendering of `x`.
fn grouped(
    dataset: &Dataset,
    x: &str,
    y: &str,
    chart: &'static str,
) -> Result<indexmap::IndexMap<String, Vec<f64>>, RenderError> {
    let categories = text_values(column_series(dataset, x)?)?;
    let values = numeric_column(dataset, y, chart)?;
    let groups = derived::group_by_category(&categories, &values);
    let kept: usize = groups.values().map(Vec::len).sum();
    if kept < dataset.height() {
        warn!(
            "Skipped {} rows with missing values in the {} chart",
            dataset.height() - kept,
            chart
        );
    }
    Ok(groups)
}

fn complete_pairs(xs: &[Option<f64>], ys: &[Option<f64>], chart: &str) -> Vec<(f64, f64)> {
    let points: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if points.len() < xs.len() {
        warn!(
            "Skipped {} rows with missing values in the {} chart",
            xs.len() - points.len(),
            chart
        );
    }
    points
}

/// Kernel density over the data range, scaled from a density to counts per
/// bin so it overlays the bars.
fn scaled_density(values: &[f64], bins: &[HistogramBin]) -> Vec<(f64, f64)> {
    let Some(first) = bins.first() else {
        return Vec::new();
    };
    let sorted = stats::sorted(values);
    let (Some(&lo), Some(&hi)) = (sorted.first(), sorted.last()) else {
        return Vec::new();
    };
    let scale = values.len() as f64 * (first.bin_end - first.bin_start);
    stats::gaussian_kde(values, lo, hi, DENSITY_POINTS)
        .into_iter()
        .map(|(x, density)| (x, density * scale))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn dispatcher() -> ChartDispatcher {
        ChartDispatcher::new(480, 320, 320)
    }

    fn sales() -> Dataset {
        Dataset::new(
            df! {
                "region" => ["north", "south", "north", "east", "south"],
                "units" => [Some(10.0f64), Some(4.0), Some(14.0), None, Some(6.0)],
                "price" => [1.5f64, 2.0, 1.0, 3.0, 2.5],
            }
            .unwrap(),
        )
    }

    #[test]
    fn test_every_kind_renders() {
        let ds = sales();
        let kinds = vec![
            ChartKind::from_parts("line", Some("price"), Some("units"), None).unwrap(),
            ChartKind::from_parts("bar", Some("region"), Some("units"), None).unwrap(),
            ChartKind::from_parts("scatter", Some("price"), Some("units"), None).unwrap(),
            ChartKind::from_parts("box", Some("region"), Some("units"), None).unwrap(),
            ChartKind::from_parts("histogram", None, Some("price"), None).unwrap(),
            ChartKind::Heatmap,
            ChartKind::from_parts("pie", None, None, Some("region")).unwrap(),
        ];
        for kind in kinds {
            let artifact = dispatcher().render(&ds, &ChartSpec::new(kind.clone())).unwrap();
            assert_eq!(artifact.kind, kind);
            assert_eq!(
                artifact.pixels.len(),
                artifact.width as usize * artifact.height as usize * 3
            );
        }
    }

    #[test]
    fn test_pie_value_counts() {
        let ds = Dataset::new(df! { "c" => ["a", "a", "b"] }.unwrap());
        let spec = ChartSpec::new(ChartKind::Pie {
            column: "c".to_string(),
        });
        let artifact = dispatcher().render(&ds, &spec).unwrap();
        assert_eq!((artifact.width, artifact.height), (320, 320));
        let Some(DerivedTable::ValueCounts(counts)) = artifact.derived else {
            panic!("pie chart should derive value counts");
        };
        let labels: Vec<String> = counts.iter().map(ValueCount::label).collect();
        assert_eq!(labels, vec!["66.7%", "33.3%"]);
    }

    #[test]
    fn test_heatmap_single_numeric_column() {
        let ds = Dataset::new(df! { "v" => [1.0f64, 3.0, 2.0], "s" => ["x", "y", "z"] }.unwrap());
        let artifact = dispatcher()
            .render(&ds, &ChartSpec::new(ChartKind::Heatmap).with_title("ignored"))
            .unwrap();
        assert_eq!(artifact.labels.title, HEATMAP_TITLE);
        let Some(DerivedTable::CorrelationMatrix(matrix)) = artifact.derived else {
            panic!("heatmap should derive a correlation matrix");
        };
        assert_eq!(matrix.len(), 1);
        assert_eq!(CorrelationMatrix::annotation(matrix.get(0, 0).unwrap()), "1.00");
    }

    #[test]
    fn test_heatmap_without_numeric_columns() {
        let ds = Dataset::new(df! { "s" => ["x", "y"] }.unwrap());
        let artifact = dispatcher()
            .render(&ds, &ChartSpec::new(ChartKind::Heatmap))
            .unwrap();
        let Some(DerivedTable::CorrelationMatrix(matrix)) = artifact.derived else {
            panic!("heatmap should derive a correlation matrix");
        };
        assert!(matrix.is_empty());
    }

    #[test]
    fn test_empty_dataset_renders_empty_charts() {
        let ds = Dataset::new(
            df! {
                "region" => Vec::<&str>::new(),
                "units" => Vec::<f64>::new(),
            }
            .unwrap(),
        );
        for kind in [
            ChartKind::from_parts("bar", Some("region"), Some("units"), None).unwrap(),
            ChartKind::from_parts("box", Some("region"), Some("units"), None).unwrap(),
            ChartKind::from_parts("pie", None, None, Some("region")).unwrap(),
            ChartKind::from_parts("histogram", None, Some("units"), None).unwrap(),
        ] {
            let artifact = dispatcher().render(&ds, &ChartSpec::new(kind)).unwrap();
            let table = artifact.derived.unwrap().to_dataset().unwrap();
            assert_eq!(table.height(), 0);
        }
    }

    #[test]
    fn test_bar_means_skip_missing_rows() {
        let spec = ChartSpec::new(ChartKind::Bar {
            x: "region".to_string(),
            y: "units".to_string(),
        });
        let artifact = dispatcher().render(&sales(), &spec).unwrap();
        let Some(DerivedTable::CategoryMeans(means)) = artifact.derived else {
            panic!("bar chart should derive category means");
        };
        let categories: Vec<&str> = means.iter().map(|m| m.category.as_str()).collect();
        assert_eq!(categories, vec!["north", "south"]);
        assert_eq!(means[0].mean, 12.0);
        assert_eq!(means[1].mean, 5.0);
    }

    #[test]
    fn test_missing_column() {
        let spec = ChartSpec::new(ChartKind::Histogram {
            y: "weight".to_string(),
        });
        let err = dispatcher().render(&sales(), &spec).unwrap_err();
        assert!(matches!(err, RenderError::ColumnNotFound { column, .. } if column == "weight"));
    }

    #[test]
    fn test_non_numeric_y() {
        let spec = ChartSpec::new(ChartKind::Scatter {
            x: "price".to_string(),
            y: "region".to_string(),
        });
        let err = dispatcher().render(&sales(), &spec).unwrap_err();
        assert!(matches!(
            err,
            RenderError::ColumnType {
                chart: "scatter",
                actual: SemanticType::Categorical,
                ..
            }
        ));
    }

    #[test]
    fn test_histogram_of_skewed_values() {
        let ds = Dataset::new(df! { "v" => [0.0f64, 0.0, 1e-9, 0.0, 1e10] }.unwrap());
        let spec = ChartSpec::new(ChartKind::Histogram { y: "v".to_string() });
        let artifact = dispatcher().render(&ds, &spec).unwrap();
        let Some(DerivedTable::HistogramBins(bins)) = artifact.derived else {
            panic!("histogram should derive bins");
        };
        assert_eq!(bins.len(), stats::MAX_BINS);
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn test_histogram_skips_infinite_values() {
        let ds = Dataset::new(df! { "v" => [1.0f64, f64::INFINITY, 2.0, 3.0] }.unwrap());
        let spec = ChartSpec::new(ChartKind::Histogram { y: "v".to_string() });
        let artifact = dispatcher().render(&ds, &spec).unwrap();
        let Some(DerivedTable::HistogramBins(bins)) = artifact.derived else {
            panic!("histogram should derive bins");
        };
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    }

    #[test]
    fn test_histogram_density_overlay() {
        let values = [1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 4.0, 9.0];
        let bins = derived::histogram_bins(&values);
        let density = scaled_density(&values, &bins);
        assert_eq!(density.len(), DENSITY_POINTS);
        assert_relative_eq!(density[0].0, 1.0);
        assert_relative_eq!(density[DENSITY_POINTS - 1].0, 9.0, epsilon = 1e-9);

        let constant = [5.0, 5.0];
        let bins = derived::histogram_bins(&constant);
        assert_eq!(bins.len(), 1);
        assert!(scaled_density(&constant, &bins).is_empty());
    }
}
