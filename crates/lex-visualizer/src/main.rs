//! CLI entry point for the dataset visualization pipeline.

use anyhow::{Context, Result, anyhow};
use clap::builder::PossibleValuesParser;
use clap::{Parser, ValueEnum};
use lex_visualizer::{
    ArtifactType, CategoricalImputation, ChartKind, ChartSpec, DataFormat, FormatLoader,
    NumericImputation, Pipeline, PipelineConfig, PipelineOutput, PipelineRequest,
    TemporalImputation, suggested_file_name,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// CLI-compatible numeric imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliNumericImputation {
    /// Use the mean of non-null values
    Mean,
    /// Use the median of non-null values
    Median,
}

impl From<CliNumericImputation> for NumericImputation {
    fn from(cli: CliNumericImputation) -> Self {
        match cli {
            CliNumericImputation::Mean => NumericImputation::Mean,
            CliNumericImputation::Median => NumericImputation::Median,
        }
    }
}

/// CLI-compatible temporal imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliTemporalImputation {
    /// Use the median timestamp
    Median,
    /// Use the mean timestamp
    Mean,
}

impl From<CliTemporalImputation> for TemporalImputation {
    fn from(cli: CliTemporalImputation) -> Self {
        match cli {
            CliTemporalImputation::Median => TemporalImputation::Median,
            CliTemporalImputation::Mean => TemporalImputation::Mean,
        }
    }
}

/// CLI-compatible categorical imputation strategy enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliCategoricalImputation {
    /// Use the most frequent value (mode)
    Mode,
    /// Use a constant value ("Unknown")
    Constant,
}

impl From<CliCategoricalImputation> for CategoricalImputation {
    fn from(cli: CliCategoricalImputation) -> Self {
        match cli {
            CliCategoricalImputation::Mode => CategoricalImputation::Mode,
            CliCategoricalImputation::Constant => CategoricalImputation::Constant,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Dataset cleaning and chart rendering",
    long_about = "Load a CSV, XLSX or DTA file, fill its missing values, keep the selected \
                  columns and render one chart.\n\n\
                  EXAMPLES:\n  \
                  # Pie chart of a categorical column\n  \
                  lex-visualizer -i titanic.csv --chart pie --column Embarked\n\n  \
                  # Correlation heatmap of two columns from a workbook sheet\n  \
                  lex-visualizer -i survey.xlsx --sheet Responses --columns age,income --chart heatmap\n\n  \
                  # Histogram without cleaning, JSON summary on stdout\n  \
                  lex-visualizer -i data.dta --chart histogram -y wage --no-clean --json\n\n  \
                  # List the sheets of a workbook\n  \
                  lex-visualizer -i survey.xlsx --list-sheets"
)]
struct Args {
    /// Path to the CSV, XLSX or DTA file to load
    #[arg(short, long)]
    input: PathBuf,

    /// Worksheet to read from an XLSX file
    ///
    /// Defaults to the first sheet of the workbook
    #[arg(long)]
    sheet: Option<String>,

    /// Print the sheet names of an XLSX file and exit
    #[arg(long)]
    list_sheets: bool,

    /// Comma-separated columns to keep (all columns when omitted)
    #[arg(long, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Skip missing-value imputation
    #[arg(long)]
    no_clean: bool,

    /// Chart kind to render
    #[arg(short, long, value_parser = PossibleValuesParser::new(ChartKind::NAMES))]
    chart: Option<String>,

    /// X column (line, bar, scatter, box)
    #[arg(short)]
    x: Option<String>,

    /// Y column (line, bar, scatter, box, histogram)
    #[arg(short)]
    y: Option<String>,

    /// Column for a pie chart
    #[arg(long)]
    column: Option<String>,

    /// Chart title (ignored for heatmaps)
    #[arg(long)]
    title: Option<String>,

    /// X axis label
    #[arg(long)]
    x_label: Option<String>,

    /// Y axis label
    #[arg(long)]
    y_label: Option<String>,

    /// Output directory for the cleaned table and the chart
    #[arg(short, long, default_value = "./outputs")]
    output: PathBuf,

    /// JSON configuration file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategy for imputing missing numeric values
    #[arg(long, value_enum)]
    numeric_imputation: Option<CliNumericImputation>,

    /// Strategy for imputing missing dates and timestamps
    #[arg(long, value_enum)]
    temporal_imputation: Option<CliTemporalImputation>,

    /// Strategy for imputing missing categorical values
    #[arg(long, value_enum)]
    categorical_imputation: Option<CliCategoricalImputation>,

    /// Chart width in pixels (pie charts use a square canvas)
    #[arg(long)]
    width: Option<u32>,

    /// Chart height in pixels
    #[arg(long)]
    height: Option<u32>,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all logs; only outputs the final JSON summary.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !args.input.exists() {
        return Err(anyhow!("Input file not found: {}", args.input.display()));
    }

    if args.list_sheets {
        return list_sheets(&args);
    }

    let config = build_config(&args)?;
    let request = build_request(&args)?;
    let pipeline = Pipeline::builder().config(config).build()?;

    let output = match pipeline.run(&request) {
        Ok(output) => output,
        Err(e) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&e)?);
            }
            return Err(anyhow!("Pipeline failed: {}", e));
        }
    };

    let files = write_artifacts(&output, &args.output)?;

    if args.json {
        let report = serde_json::json!({
            "input": args.input.display().to_string(),
            "files": files,
            "chart": output.chart,
            "summary": output.summary,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&output, &files, &args);
    Ok(())
}

/// Print the sheet names of a workbook, one per line.
fn list_sheets(args: &Args) -> Result<()> {
    let bytes = std::fs::read(&args.input)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    let sheets = FormatLoader::list_sheets(&bytes)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&sheets)?);
    } else {
        for sheet in sheets {
            println!("{}", sheet);
        }
    }
    Ok(())
}

/// Start from the `--config` file (or defaults) and apply flag overrides.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            PipelineConfig::from_json_file(path)?
        }
        None => PipelineConfig::default(),
    };

    if args.no_clean {
        config.auto_clean = false;
    }
    if let Some(strategy) = args.numeric_imputation {
        config.cleaning_policy.numeric = strategy.into();
    }
    if let Some(strategy) = args.temporal_imputation {
        config.cleaning_policy.temporal = strategy.into();
    }
    if let Some(strategy) = args.categorical_imputation {
        config.cleaning_policy.categorical = strategy.into();
    }
    if let Some(width) = args.width {
        config.chart_width = width;
        config.pie_size = width.min(args.height.unwrap_or(width));
    }
    if let Some(height) = args.height {
        config.chart_height = height;
    }

    config.validate()?;
    Ok(config)
}

fn build_request(args: &Args) -> Result<PipelineRequest> {
    let chart = args
        .chart
        .as_deref()
        .ok_or_else(|| anyhow!("--chart is required unless --list-sheets is given"))?;
    let kind = ChartKind::from_parts(
        chart,
        args.x.as_deref(),
        args.y.as_deref(),
        args.column.as_deref(),
    )?;

    let mut spec = ChartSpec::new(kind);
    if let Some(title) = &args.title {
        spec = spec.with_title(title);
    }
    if let Some(label) = &args.x_label {
        spec = spec.with_x_label(label);
    }
    if let Some(label) = &args.y_label {
        spec = spec.with_y_label(label);
    }

    let mut request = PipelineRequest::from_path(&args.input, spec)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    match &args.sheet {
        Some(sheet) => request = request.with_sheet(sheet),
        None if DataFormat::from_file_name(&request.file_name)? == DataFormat::Spreadsheet => {
            let first = FormatLoader::list_sheets(&request.bytes)?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("Workbook {} has no sheets", args.input.display()))?;
            info!("No sheet given; using first sheet '{}'", first);
            request = request.with_sheet(first);
        }
        None => {}
    }

    if let Some(columns) = &args.columns {
        let columns: Vec<&str> = columns
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        request = request.with_columns(columns);
    }

    Ok(request)
}

/// Write the table, the chart and any derived table into `dir`.
fn write_artifacts(output: &PipelineOutput, dir: &Path) -> Result<Vec<String>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
        info!("Created output directory: {}", dir.display());
    }

    let chart = output.chart.kind.name();
    let mut artifacts = vec![
        (ArtifactType::Table, &output.table_csv),
        (ArtifactType::Chart, &output.chart_png),
    ];
    if let Some(derived) = &output.derived_csv {
        artifacts.push((ArtifactType::DerivedTable, derived));
    }

    let mut written = Vec::with_capacity(artifacts.len());
    for (artifact, bytes) in artifacts {
        let path = dir.join(suggested_file_name(chart, artifact));
        std::fs::write(&path, bytes).map_err(|e| {
            error!("Failed to write {}: {}", path.display(), e);
            anyhow!("Failed to write {}: {}", path.display(), e)
        })?;
        info!("Wrote {}", path.display());
        written.push(path.display().to_string());
    }
    Ok(written)
}

/// Print a human-readable summary of the pass.
///
/// This is the default output when `--json` is not given.
fn print_human_readable_summary(output: &PipelineOutput, files: &[String], args: &Args) {
    let summary = &output.summary;

    println!();
    println!("{}", "=".repeat(80));
    println!("CHART RENDERED");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({}, {} rows x {} columns)",
        args.input.display(),
        summary.format,
        summary.rows,
        summary.columns_loaded
    );
    if let Some(sheet) = &summary.sheet {
        println!("Sheet:  {}", sheet);
    }
    println!(
        "Chart:  {} '{}' ({}x{})",
        summary.chart_kind, summary.chart_title, output.chart.width, output.chart.height
    );
    println!();

    println!("Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Columns: {} -> {}",
        summary.columns_loaded, summary.columns_selected
    );
    if summary.cleaned {
        println!(
            "  Missing cells: {} -> {} ({:.1}% repaired)",
            summary.missing_before,
            summary.missing_after,
            summary.repaired_percentage()
        );
    } else {
        println!("  Missing cells: {} (cleaning disabled)", summary.missing_before);
    }
    println!();

    if !summary.imputation.filled.is_empty() {
        println!("Imputation:");
        for column in &summary.imputation.filled {
            println!(
                "  - {}: {} cells <- {} ({})",
                column.column, column.cells_filled, column.fill_value, column.strategy
            );
        }
        println!();
    }

    if !summary.warnings.is_empty() {
        println!("Warnings:");
        for warning in &summary.warnings {
            println!("  - {}", warning);
        }
        println!();
    }

    println!("Files:");
    for file in files {
        println!("  - {}", file);
    }
    println!();
}
