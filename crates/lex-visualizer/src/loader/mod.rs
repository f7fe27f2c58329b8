//! Format loading: raw file bytes into a [`Dataset`].
//!
//! The format is declared by the file name suffix. Delimited text and
//! spreadsheets infer column types from their cells; Stata files carry
//! their types explicitly.

mod csv;
pub(crate) mod inference;
mod stata;
mod xlsx;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::dataset::Dataset;
use crate::error::LoadError;

/// The file formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// `.csv`
    DelimitedText,
    /// `.xlsx`
    Spreadsheet,
    /// `.dta`
    StatisticalPackage,
}

impl DataFormat {
    /// Resolve the format from a file name suffix (case-insensitive).
    pub fn from_file_name(name: &str) -> Result<Self, LoadError> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("csv") => Ok(DataFormat::DelimitedText),
            Some("xlsx") => Ok(DataFormat::Spreadsheet),
            Some("dta") => Ok(DataFormat::StatisticalPackage),
            _ => Err(LoadError::UnknownFormat(name.to_string())),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::DelimitedText => "csv",
            DataFormat::Spreadsheet => "xlsx",
            DataFormat::StatisticalPackage => "dta",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataFormat::DelimitedText => "delimited text (.csv)",
            DataFormat::Spreadsheet => "spreadsheet (.xlsx)",
            DataFormat::StatisticalPackage => "Stata (.dta)",
        };
        f.write_str(name)
    }
}

/// Delimited-text parsing options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Rows scanned for type inference; `None` scans all rows.
    pub infer_schema_length: Option<usize>,
    pub try_parse_dates: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            infer_schema_length: None,
            try_parse_dates: true,
        }
    }
}

impl From<&PipelineConfig> for LoadOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            infer_schema_length: config.infer_schema_length,
            try_parse_dates: config.try_parse_dates,
        }
    }
}

/// Parses raw bytes of a declared format into a [`Dataset`].
#[derive(Debug, Clone, Default)]
pub struct FormatLoader {
    options: LoadOptions,
}

impl FormatLoader {
    pub fn new(options: LoadOptions) -> Self {
        Self { options }
    }

    /// Parse `bytes` as `format`.
    ///
    /// `sheet` selects the worksheet of a spreadsheet and is required for
    /// that format; other formats ignore it. No partial dataset is returned
    /// on failure.
    pub fn load(
        &self,
        bytes: &[u8],
        format: DataFormat,
        sheet: Option<&str>,
    ) -> Result<Dataset, LoadError> {
        info!("Loading {} bytes as {}", bytes.len(), format);

        let frame = match format {
            DataFormat::DelimitedText => csv::read_csv(bytes, &self.options)?,
            DataFormat::Spreadsheet => {
                let mut workbook = xlsx::Workbook::open(bytes)?;
                let sheet = sheet.ok_or_else(|| LoadError::SheetNotSpecified {
                    available: workbook.sheet_names(),
                })?;
                let rows = workbook.read_sheet(sheet)?;
                inference::frame_from_grid(rows)
                    .map_err(|e| LoadError::parse(DataFormat::Spreadsheet, e.to_string()))?
            }
            DataFormat::StatisticalPackage => stata::read_dta(bytes)?,
        };

        if sheet.is_some() && format != DataFormat::Spreadsheet {
            debug!("Ignoring sheet selector for {}", format);
        }

        let dataset = Dataset::new(frame);
        debug!(
            rows = dataset.height(),
            columns = dataset.width(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Read a file from disk, resolving the format from its name.
    pub fn load_path(&self, path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Dataset, LoadError> {
        let path = path.as_ref();
        let format = DataFormat::from_file_name(&path.to_string_lossy())?;
        let bytes = std::fs::read(path)?;
        self.load(&bytes, format, sheet)
    }

    /// Sheet names of a spreadsheet workbook, in workbook order.
    pub fn list_sheets(bytes: &[u8]) -> Result<Vec<String>, LoadError> {
        Ok(xlsx::Workbook::open(bytes)?.sheet_names())
    }
}
