//! Integration tests for the visualization pipeline.
//!
//! These tests verify end-to-end behavior of the stages and the pipeline
//! using the files under `tests/fixtures`.

use approx::assert_relative_eq;
use lex_visualizer::{
    ActionType, ArtifactExporter, ArtifactType, ChartDispatcher, ChartKind, ChartSpec,
    ColumnProjector, DataFormat, Dataset, DerivedTable, FormatLoader, ImputationEngine, LoadError,
    Pipeline, PipelineConfig, PipelineRequest, ProjectionError, RenderError, SemanticType,
    VisualizerError, suggested_file_name,
};
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::path::PathBuf;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture_bytes(filename: &str) -> Vec<u8> {
    std::fs::read(fixtures_path().join(filename)).expect("Failed to read fixture")
}

fn load(filename: &str) -> Dataset {
    FormatLoader::default()
        .load_path(fixtures_path().join(filename), None)
        .expect("Failed to load fixture")
}

fn load_sheet(filename: &str, sheet: &str) -> Dataset {
    FormatLoader::default()
        .load_path(fixtures_path().join(filename), Some(sheet))
        .expect("Failed to load fixture sheet")
}

fn small_pipeline() -> Pipeline {
    let config = PipelineConfig::builder()
        .chart_size(480, 320)
        .pie_size(320)
        .build()
        .unwrap();
    Pipeline::builder().config(config).build().unwrap()
}

fn request(filename: &str, kind: ChartKind) -> PipelineRequest {
    PipelineRequest::from_path(fixtures_path().join(filename), ChartSpec::new(kind)).unwrap()
}

fn text_at(ds: &Dataset, column: &str, row: usize) -> Option<String> {
    let text = ds.series(column).unwrap().cast(&DataType::String).unwrap();
    text.str().unwrap().get(row).map(str::to_string)
}

fn count_equal(ds: &Dataset, column: &str, target: f64) -> usize {
    let values = ds.series(column).unwrap().cast(&DataType::Float64).unwrap();
    values
        .f64()
        .unwrap()
        .into_iter()
        .flatten()
        .filter(|v| (v - target).abs() < 1e-9)
        .count()
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_delimited_text() {
    let ds = load("sales.csv");

    assert_eq!(ds.height(), 6);
    assert_eq!(
        ds.column_names(),
        vec!["region", "product", "units", "price", "sold_on"]
    );
    assert_eq!(ds.semantic_type("units"), Some(SemanticType::Numeric));
    assert_eq!(ds.semantic_type("product"), Some(SemanticType::Categorical));
    assert_eq!(ds.semantic_type("sold_on"), Some(SemanticType::Temporal));
    assert_eq!(ds.missing_count(), 4);
}

#[test]
fn test_load_spreadsheet() {
    let bytes = fixture_bytes("survey.xlsx");
    assert_eq!(
        FormatLoader::list_sheets(&bytes).unwrap(),
        vec!["Summary", "Responses"]
    );

    let ds = load_sheet("survey.xlsx", "Responses");
    assert_eq!(ds.height(), 4);
    assert_eq!(ds.column_names(), vec!["age", "income", "city", "joined"]);
    assert_eq!(ds.semantic_type("age"), Some(SemanticType::Numeric));
    assert_eq!(ds.semantic_type("income"), Some(SemanticType::Numeric));
    assert_eq!(ds.semantic_type("city"), Some(SemanticType::Categorical));
    assert_eq!(ds.semantic_type("joined"), Some(SemanticType::Temporal));
    assert_eq!(ds.series("age").unwrap().null_count(), 1);
}

#[test]
fn test_load_spreadsheet_sheet_errors() {
    let bytes = fixture_bytes("survey.xlsx");
    let loader = FormatLoader::default();

    let err = loader
        .load(&bytes, DataFormat::Spreadsheet, None)
        .unwrap_err();
    assert!(matches!(err, LoadError::SheetNotSpecified { .. }));

    let err = loader
        .load(&bytes, DataFormat::Spreadsheet, Some("Answers"))
        .unwrap_err();
    match err {
        LoadError::SheetNotFound { sheet, available } => {
            assert_eq!(sheet, "Answers");
            assert_eq!(available, vec!["Summary", "Responses"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_load_statistical_package() {
    let ds = load("wages.dta");

    assert_eq!(ds.height(), 3);
    assert_eq!(ds.column_names(), vec!["grade", "wage", "hired", "city"]);
    assert_eq!(ds.semantic_type("hired"), Some(SemanticType::Temporal));
    assert_eq!(text_at(&ds, "hired", 0).as_deref(), Some("2024-01-01"));
    assert_eq!(ds.series("grade").unwrap().null_count(), 1);
    assert_eq!(ds.series("wage").unwrap().null_count(), 1);
}

#[test]
fn test_load_malformed_input() {
    let loader = FormatLoader::default();
    let err = loader
        .load(b"not a stata file", DataFormat::StatisticalPackage, None)
        .unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));

    let err = loader.load(b"", DataFormat::DelimitedText, None).unwrap_err();
    assert!(matches!(err, LoadError::Parse { .. }));
}

// ============================================================================
// Imputation
// ============================================================================

#[test]
fn test_clean_fills_each_semantic_type() {
    let ds = load("sales.csv");
    let (cleaned, report) = ImputationEngine::default().clean_with_report(&ds).unwrap();

    assert_eq!(cleaned.missing_count(), 0);
    assert_eq!(report.cells_filled(), 4);

    // mean of 10, 7, 12, 5, 9
    assert_eq!(count_equal(&cleaned, "units", 8.6), 1);
    // mean of 2.50, 4.00, 3.25, 4.00, 1.75
    assert_eq!(count_equal(&cleaned, "price", 3.1), 1);
    // widget and gadget tie; widget appears first
    assert_eq!(text_at(&cleaned, "product", 3).as_deref(), Some("widget"));
    // median of the five observed dates
    assert_eq!(text_at(&cleaned, "sold_on", 3).as_deref(), Some("2024-01-05"));
    assert_eq!(cleaned.semantic_type("sold_on"), Some(SemanticType::Temporal));
}

#[test]
fn test_mode_fills_most_frequent_label() {
    let ds = load("labels.csv");
    let cleaned = ImputationEngine::default().clean(&ds).unwrap();

    assert_eq!(text_at(&cleaned, "label", 3).as_deref(), Some("x"));
    assert_eq!(cleaned.missing_count(), 0);
}

#[test]
fn test_clean_is_idempotent() {
    let engine = ImputationEngine::default();
    for fixture in ["sales.csv", "labels.csv", "wages.dta"] {
        let once = engine.clean(&load(fixture)).unwrap();
        let twice = engine.clean(&once).unwrap();
        assert_eq!(once, twice, "{fixture}");
    }
}

#[test]
fn test_clean_complete_dataset_is_unchanged() {
    let ds = load("scores.csv");
    let cleaned = ImputationEngine::default().clean(&ds).unwrap();
    assert_eq!(cleaned, ds);
}

#[test]
fn test_clean_spreadsheet_widens_integers() {
    let ds = load_sheet("survey.xlsx", "Responses");
    let (cleaned, report) = ImputationEngine::default().clean_with_report(&ds).unwrap();

    assert_eq!(cleaned.missing_count(), 0);
    assert_eq!(cleaned.series("age").unwrap().dtype(), &DataType::Float64);
    assert_eq!(count_equal(&cleaned, "age", 104.0 / 3.0), 1);
    assert_eq!(text_at(&cleaned, "city", 3).as_deref(), Some("Oslo"));
    assert_eq!(report.column("joined").unwrap().cells_filled, 1);
}

// ============================================================================
// Projection
// ============================================================================

#[test]
fn test_project_all_columns_is_identity() {
    let ds = load("sales.csv");
    let projected = ColumnProjector::project(&ds, &ds.column_names()).unwrap();
    assert_eq!(projected, ds);
}

#[test]
fn test_project_empty_selection_keeps_rows() {
    let ds = load("sales.csv");
    let projected = ColumnProjector::project::<&str>(&ds, &[]).unwrap();
    assert_eq!(projected.width(), 0);
    assert_eq!(projected.height(), ds.height());
}

#[test]
fn test_project_keeps_dataset_order() {
    let ds = load("sales.csv");
    let projected = ColumnProjector::project(&ds, &["price", "region"]).unwrap();
    assert_eq!(projected.column_names(), vec!["region", "price"]);
}

#[test]
fn test_project_unknown_column() {
    let ds = load("sales.csv");
    let err = ColumnProjector::project(&ds, &["region", "margin"]).unwrap_err();
    match err {
        ProjectionError::ColumnNotFound { column, available } => {
            assert_eq!(column, "margin");
            assert_eq!(available.len(), 5);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Charts
// ============================================================================

#[test]
fn test_pie_percentages() {
    let output = small_pipeline()
        .run(&request(
            "letters.csv",
            ChartKind::Pie {
                column: "letter".to_string(),
            },
        ))
        .unwrap();

    let Some(DerivedTable::ValueCounts(counts)) = &output.chart.derived else {
        panic!("expected value counts");
    };
    let labels: Vec<String> = counts.iter().map(|c| c.label()).collect();
    assert_eq!(labels, vec!["66.7%", "33.3%"]);
    let total: f64 = counts.iter().map(|c| c.percentage).sum();
    assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    assert_eq!(output.chart.width, 320);
    assert_eq!(output.chart.height, 320);
}

#[test]
fn test_heatmap_single_numeric_column() {
    let spec = ChartSpec::new(ChartKind::Heatmap).with_title("ignored");
    let artifact = ChartDispatcher::new(480, 320, 320)
        .render(&load("scores.csv"), &spec)
        .unwrap();

    assert_eq!(artifact.labels.title, "Correlation Heatmap");
    assert_eq!(artifact.labels.x_label, "");
    let Some(DerivedTable::CorrelationMatrix(matrix)) = &artifact.derived else {
        panic!("expected a correlation matrix");
    };
    assert_eq!(matrix.columns, vec!["score"]);
    assert_eq!(
        lex_visualizer::CorrelationMatrix::annotation(matrix.get(0, 0).unwrap()),
        "1.00"
    );
}

#[test]
fn test_every_kind_renders_cleaned_sales() {
    let cleaned = ImputationEngine::default().clean(&load("sales.csv")).unwrap();
    let dispatcher = ChartDispatcher::new(480, 320, 320);
    let pair = |x: &str, y: &str| (x.to_string(), y.to_string());

    let kinds = vec![
        {
            let (x, y) = pair("sold_on", "units");
            ChartKind::Line { x, y }
        },
        {
            let (x, y) = pair("product", "units");
            ChartKind::Bar { x, y }
        },
        {
            let (x, y) = pair("price", "units");
            ChartKind::Scatter { x, y }
        },
        {
            let (x, y) = pair("region", "price");
            ChartKind::Box { x, y }
        },
        ChartKind::Histogram {
            y: "price".to_string(),
        },
        ChartKind::Heatmap,
        ChartKind::Pie {
            column: "region".to_string(),
        },
    ];

    for kind in kinds {
        let name = kind.name();
        let artifact = dispatcher.render(&cleaned, &ChartSpec::new(kind)).unwrap();
        let png = ArtifactExporter::export_chart(&artifact).unwrap();
        assert_eq!(&png[1..4], b"PNG", "{name}");
    }
}

#[test]
fn test_bar_means_per_category() {
    let cleaned = ImputationEngine::default().clean(&load("sales.csv")).unwrap();
    let artifact = ChartDispatcher::new(480, 320, 320)
        .render(
            &cleaned,
            &ChartSpec::new(ChartKind::Bar {
                x: "region".to_string(),
                y: "price".to_string(),
            }),
        )
        .unwrap();

    let Some(DerivedTable::CategoryMeans(means)) = &artifact.derived else {
        panic!("expected category means");
    };
    let categories: Vec<&str> = means.iter().map(|m| m.category.as_str()).collect();
    assert_eq!(categories, vec!["North", "South", "East"]);
    // 2.50, 3.10 (imputed) and 1.75
    assert_relative_eq!(means[0].mean, 7.35 / 3.0, epsilon = 1e-9);
    assert_relative_eq!(means[1].mean, 4.0, epsilon = 1e-9);
}

#[test]
fn test_chart_rejects_non_numeric_y() {
    let err = ChartDispatcher::new(480, 320, 320)
        .render(
            &load("sales.csv"),
            &ChartSpec::new(ChartKind::Histogram {
                y: "region".to_string(),
            }),
        )
        .unwrap_err();
    assert!(matches!(err, RenderError::ColumnType { .. }));
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_table_round_trip() {
    let ds = load("sales.csv");
    let csv = ArtifactExporter::export_table(&ds).unwrap();
    let reloaded = FormatLoader::default()
        .load(&csv, DataFormat::DelimitedText, None)
        .unwrap();

    assert_eq!(reloaded.column_names(), ds.column_names());
    assert_eq!(reloaded, ds);
}

#[test]
fn test_export_missing_cells_are_empty_fields() {
    let ds = load("labels.csv");
    let csv = String::from_utf8(ArtifactExporter::export_table(&ds).unwrap()).unwrap();
    assert_eq!(csv, "id,label\n1,x\n2,y\n3,x\n4,\n");
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[test]
fn test_pipeline_spreadsheet_scatter() {
    let request = request(
        "survey.xlsx",
        ChartKind::Scatter {
            x: "age".to_string(),
            y: "income".to_string(),
        },
    )
    .with_sheet("Responses")
    .with_columns(["income", "age"]);

    let output = small_pipeline().run(&request).unwrap();

    assert_eq!(output.summary.format, "xlsx");
    assert_eq!(output.summary.sheet.as_deref(), Some("Responses"));
    assert_eq!(output.summary.columns_loaded, 4);
    assert_eq!(output.summary.columns_selected, 2);
    assert_eq!(output.dataset.column_names(), vec!["age", "income"]);
    assert_eq!(output.chart.labels.title, "Scatter Plot of income vs age");
    assert!(output.derived_csv.is_none());
}

#[test]
fn test_pipeline_statistical_histogram() {
    let output = small_pipeline()
        .run(&request(
            "wages.dta",
            ChartKind::Histogram {
                y: "wage".to_string(),
            },
        ))
        .unwrap();

    assert_eq!(output.summary.format, "dta");
    assert_eq!(output.summary.missing_after, 0);
    assert_eq!(output.chart.labels.y_label, "Count");
    let Some(DerivedTable::HistogramBins(bins)) = &output.chart.derived else {
        panic!("expected histogram bins");
    };
    assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), 3);
    let derived = String::from_utf8(output.derived_csv.unwrap()).unwrap();
    assert!(derived.starts_with("bin_start,bin_end,count\n"));
}

#[test]
fn test_pipeline_heatmap_with_column_named_column() {
    let csv = b"column,other\n1,3\n2,1\n3,2\n".to_vec();
    let request = PipelineRequest::new("pairs.csv", csv, ChartSpec::new(ChartKind::Heatmap));
    let output = small_pipeline().run(&request).unwrap();

    let derived = String::from_utf8(output.derived_csv.unwrap()).unwrap();
    assert!(derived.starts_with("column.1,column,other\n"));
    assert!(derived.contains("\ncolumn,"));
    assert!(derived.contains("\nother,"));
}

#[test]
fn test_pipeline_records_actions() {
    let output = small_pipeline()
        .run(
            &request(
                "sales.csv",
                ChartKind::Box {
                    x: "region".to_string(),
                    y: "units".to_string(),
                },
            )
            .with_columns(["region", "units"]),
        )
        .unwrap();

    let actions: Vec<ActionType> = output
        .summary
        .actions
        .iter()
        .map(|a| a.action_type)
        .collect();
    assert_eq!(actions.first(), Some(&ActionType::FileLoaded));
    assert_eq!(actions.last(), Some(&ActionType::ArtifactExported));
    assert_eq!(
        actions
            .iter()
            .filter(|a| **a == ActionType::ValueImputed)
            .count(),
        4
    );
    assert!(actions.contains(&ActionType::ColumnsProjected));
    assert!(actions.contains(&ActionType::ChartRendered));
    assert_eq!(output.summary.repaired_percentage(), 100.0);
}

#[test]
fn test_pipeline_errors_carry_stage_and_code() {
    let err = small_pipeline()
        .run(
            &request(
                "sales.csv",
                ChartKind::Pie {
                    column: "region".to_string(),
                },
            )
            .with_columns(["margin"]),
        )
        .unwrap_err();
    assert!(matches!(err, VisualizerError::Projection(_)));
    assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");

    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["code"], "COLUMN_NOT_FOUND");
    assert!(json["message"].as_str().unwrap().contains("margin"));
}

#[test]
fn test_pipeline_artifacts_written_to_disk() {
    let output = small_pipeline()
        .run(&request(
            "sales.csv",
            ChartKind::Heatmap,
        ))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let table_path = dir.path().join(suggested_file_name("heatmap", ArtifactType::Table));
    let chart_path = dir.path().join(suggested_file_name("heatmap", ArtifactType::Chart));
    std::fs::write(&table_path, &output.table_csv).unwrap();
    std::fs::write(&chart_path, &output.chart_png).unwrap();

    let reloaded = FormatLoader::default().load_path(&table_path, None).unwrap();
    assert_eq!(reloaded.column_names(), output.dataset.column_names());
    assert_eq!(reloaded.missing_count(), 0);
    assert!(std::fs::metadata(&chart_path).unwrap().len() > 0);
}
