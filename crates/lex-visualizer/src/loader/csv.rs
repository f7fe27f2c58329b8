//! Delimited-text reader on top of the polars CSV reader.

use polars::prelude::*;
use std::io::Cursor;
use tracing::debug;

use super::{DataFormat, LoadOptions};
use crate::error::LoadError;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

fn read_with_options(bytes: Vec<u8>, options: &LoadOptions) -> PolarsResult<DataFrame> {
    let try_parse_dates = options.try_parse_dates;
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(options.infer_schema_length)
        .map_parse_options(|parse| {
            parse
                .with_quote_char(Some(b'"'))
                .with_try_parse_dates(try_parse_dates)
        })
        .into_reader_with_file_handle(Cursor::new(bytes))
        .finish()
}

/// Drop blank lines, which the strict pass rejects as ragged rows.
fn clean_csv_content(content: &str) -> String {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parse CSV bytes with a header row and full-column type inference.
///
/// A strict pass runs first; when it fails, the content is cleaned of
/// blank lines and parsed again. The first error is reported if both fail.
pub(crate) fn read_csv(bytes: &[u8], options: &LoadOptions) -> Result<DataFrame, LoadError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(LoadError::parse(
            DataFormat::DelimitedText,
            "file is empty (a header row is required)",
        ));
    }

    let strict_error = match read_with_options(bytes.to_vec(), options) {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard CSV parse failed: {}", e);
            e
        }
    };

    let content = std::str::from_utf8(bytes)
        .map_err(|e| LoadError::parse(DataFormat::DelimitedText, format!("invalid UTF-8: {e}")))?;
    read_with_options(clean_csv_content(content).into_bytes(), options)
        .map_err(|_| LoadError::parse(DataFormat::DelimitedText, strict_error.to_string()))
}
