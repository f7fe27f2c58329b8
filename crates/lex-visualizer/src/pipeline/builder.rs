//! Main visualization pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating one load, clean, project, render and export pass.

use crate::charts::ChartDispatcher;
use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::Result;
use crate::export::ArtifactExporter;
use crate::imputers::ImputationEngine;
use crate::loader::{DataFormat, FormatLoader, LoadOptions};
use crate::pipeline::{PipelineOutput, PipelineRequest};
use crate::projector::ColumnProjector;
use crate::types::{ActionType, PipelineAction, PipelineSummary};
use std::time::Instant;
use tracing::{debug, error, info};

/// The main visualization pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use lex_visualizer::{ChartKind, ChartSpec, Pipeline, PipelineConfig, PipelineRequest};
///
/// let chart = ChartSpec::new(ChartKind::Pie { column: "fruit".into() });
/// let request = PipelineRequest::from_path("fruit.csv", chart)?;
///
/// let output = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .build()?
///     .run(&request)?;
///
/// std::fs::write("pie_chart.png", &output.chart_png)?;
/// ```
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    loader: FormatLoader,
    engine: ImputationEngine,
    dispatcher: ChartDispatcher,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run one request through every stage.
    ///
    /// The first failing stage aborts the pass; nothing partial is returned.
    /// Columns that could not be imputed do not fail the pass and are
    /// reported as warnings in the summary.
    pub fn run(&self, request: &PipelineRequest) -> Result<PipelineOutput> {
        match self.run_internal(request) {
            Ok(output) => Ok(output),
            Err(e) => {
                error!("Pipeline error: {}", e);
                Err(e)
            }
        }
    }

    fn run_internal(&self, request: &PipelineRequest) -> Result<PipelineOutput> {
        let start_time = Instant::now();
        info!("Starting visualization pipeline for '{}'", request.file_name);

        let mut summary = PipelineSummary::new();

        // Load
        let format = DataFormat::from_file_name(&request.file_name)?;
        let loaded = self
            .loader
            .load(&request.bytes, format, request.sheet.as_deref())?;
        summary.format = format.extension().to_string();
        if format == DataFormat::Spreadsheet {
            summary.sheet = request.sheet.clone();
        }
        summary.rows = loaded.height();
        summary.columns_loaded = loaded.width();
        summary.missing_before = loaded.missing_count();
        summary.add_action(
            PipelineAction::new(
                ActionType::FileLoaded,
                &request.file_name,
                format!(
                    "Loaded {} rows and {} columns as {}",
                    loaded.height(),
                    loaded.width(),
                    format
                ),
            )
            .with_details(format!("{} missing cells", summary.missing_before)),
        );

        // Clean
        let cleaned = self.clean(loaded, &mut summary)?;
        summary.missing_after = cleaned.missing_count();

        // Project
        let projected = match &request.columns {
            Some(columns) => {
                info!("Projecting onto {} selected columns", columns.len());
                let projected = ColumnProjector::project(&cleaned, columns.as_slice())?;
                summary.add_action(PipelineAction::new(
                    ActionType::ColumnsProjected,
                    "dataset",
                    format!(
                        "Kept {} of {} columns",
                        projected.width(),
                        cleaned.width()
                    ),
                ));
                projected
            }
            None => {
                debug!("No column selection; keeping all {} columns", cleaned.width());
                cleaned
            }
        };
        summary.columns_selected = projected.width();

        // Render
        let chart = self.dispatcher.render(&projected, &request.chart)?;
        summary.chart_kind = chart.kind.name().to_string();
        summary.chart_title = chart.labels.title.clone();
        summary.add_action(PipelineAction::new(
            ActionType::ChartRendered,
            chart.kind.name(),
            format!(
                "Rendered '{}' at {}x{}",
                chart.labels.title, chart.width, chart.height
            ),
        ));

        // Export
        info!("Exporting artifacts");
        let table_csv = ArtifactExporter::export_table(&projected)?;
        let chart_png = ArtifactExporter::export_chart(&chart)?;
        let derived_csv = chart
            .derived
            .as_ref()
            .map(ArtifactExporter::export_derived)
            .transpose()?;
        summary.add_action(
            PipelineAction::new(
                ActionType::ArtifactExported,
                chart.kind.name(),
                "Encoded table as CSV and chart as PNG",
            )
            .with_details(format!(
                "table: {} bytes, chart: {} bytes{}",
                table_csv.len(),
                chart_png.len(),
                derived_csv
                    .as_ref()
                    .map(|csv| format!(", derived table: {} bytes", csv.len()))
                    .unwrap_or_default()
            )),
        );

        summary.duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Pipeline finished in {}ms ({} rows, {} columns, {} warnings)",
            summary.duration_ms,
            projected.height(),
            projected.width(),
            summary.warnings.len()
        );

        Ok(PipelineOutput {
            dataset: projected,
            chart,
            table_csv,
            chart_png,
            derived_csv,
            summary,
        })
    }

    /// Impute missing values when `auto_clean` is on, otherwise pass the
    /// dataset through unchanged.
    fn clean(&self, loaded: Dataset, summary: &mut PipelineSummary) -> Result<Dataset> {
        if !self.config.auto_clean {
            info!("Auto-cleaning disabled; keeping missing values");
            return Ok(loaded);
        }

        let (cleaned, report) = self.engine.clean_with_report(&loaded)?;
        summary.cleaned = true;

        for column in &report.filled {
            summary.add_action(
                PipelineAction::new(
                    ActionType::ValueImputed,
                    &column.column,
                    format!(
                        "Filled {} missing values with {} {}",
                        column.cells_filled, column.strategy, column.fill_value
                    ),
                )
                .with_details(format!("semantic type: {}", column.semantic_type)),
            );
        }
        for condition in &report.indeterminate {
            summary.add_action(PipelineAction::new(
                ActionType::ImputationSkipped,
                &condition.column,
                "No observed values to impute from",
            ));
            summary.add_warning(condition.to_string());
        }

        summary.imputation = report;
        Ok(cleaned)
    }
}

/// Builder for creating a configured [`Pipeline`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
}

static_assertions::assert_impl_all!(PipelineBuilder: Send);

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline, validating the configuration.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(Pipeline {
            loader: FormatLoader::new(LoadOptions::from(&config)),
            engine: ImputationEngine::new(config.cleaning_policy),
            dispatcher: ChartDispatcher::from_config(&config),
            config,
        })
    }
}
