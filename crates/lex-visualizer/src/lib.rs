//! Dataset Visualization Pipeline Library
//!
//! Load a tabular file, repair its missing values, narrow it to the columns
//! of interest and render one statistical chart, built with Rust, Polars and
//! Plotters.
//!
//! # Overview
//!
//! One pass runs five stages in a fixed order:
//!
//! - **Loading**: delimited text (`.csv`), spreadsheets (`.xlsx`) and Stata
//!   files (`.dta`) become a [`Dataset`] with inferred column types
//! - **Cleaning**: missing numeric cells get the column mean, temporal cells
//!   the median timestamp and categorical cells the most frequent value
//! - **Projection**: the dataset is narrowed to the selected columns
//! - **Rendering**: line, bar, scatter, box, histogram, correlation heatmap
//!   and pie charts, drawn to an in-memory bitmap
//! - **Export**: the table as CSV bytes and the chart as PNG bytes
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_visualizer::{ChartKind, ChartSpec, Pipeline, PipelineRequest};
//!
//! let chart = ChartSpec::new(ChartKind::Histogram { y: "age".into() })
//!     .with_title("Passenger ages");
//! let request = PipelineRequest::from_path("titanic.csv", chart)?
//!     .with_columns(["age", "fare"]);
//!
//! let output = Pipeline::builder().build()?.run(&request)?;
//!
//! std::fs::write("cleaned_data.csv", &output.table_csv)?;
//! std::fs::write("histogram_chart.png", &output.chart_png)?;
//! println!("{} cells repaired", output.summary.imputation.cells_filled());
//! ```
//!
//! # Using the stages directly
//!
//! Every stage is usable on its own:
//!
//! ```rust,ignore
//! use lex_visualizer::*;
//!
//! let dataset = FormatLoader::default().load_path("survey.xlsx", Some("Responses"))?;
//! let cleaned = ImputationEngine::default().clean(&dataset)?;
//! let selected = ColumnProjector::project(&cleaned, &["age", "income"])?;
//! let chart = ChartDispatcher::default().render(&selected, &ChartSpec::new(ChartKind::Heatmap))?;
//! let png = ArtifactExporter::export_chart(&chart)?;
//! ```
//!
//! # Configuration
//!
//! Use [`PipelineConfig`] to customize cleaning and canvas sizes:
//!
//! ```rust,ignore
//! use lex_visualizer::config::*;
//!
//! let config = PipelineConfig::builder()
//!     .auto_clean(true)
//!     .numeric_imputation(NumericImputation::Median)
//!     .categorical_imputation(CategoricalImputation::Constant)
//!     .chart_size(1200, 800)
//!     .pie_size(600)
//!     .build()?;
//! ```

pub mod charts;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod projector;
pub mod stats;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use charts::{
    ChartArtifact, ChartDispatcher, ChartKind, ChartLabels, ChartSpec, CorrelationMatrix,
    DerivedTable, ValueCount,
};
pub use config::{
    CategoricalImputation, CleaningPolicy, ConfigValidationError, NumericImputation,
    PipelineConfig, PipelineConfigBuilder, TemporalImputation,
};
pub use dataset::{Dataset, SemanticType};
pub use error::{
    ExportError, ImputationIndeterminate, LoadError, ProjectionError, RenderError, Result,
    ResultExt, VisualizerError,
};
pub use export::{ArtifactExporter, ArtifactType, suggested_file_name};
pub use imputers::{ImputationEngine, StatisticalImputer};
pub use loader::{DataFormat, FormatLoader, LoadOptions};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineOutput, PipelineRequest};
pub use projector::ColumnProjector;
pub use types::{
    ActionType, ColumnImputation, ColumnInfo, ImputationReport, PipelineAction, PipelineSummary,
};
