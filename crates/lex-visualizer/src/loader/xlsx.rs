//! Office Open XML workbook (`.xlsx`) reader.
//!
//! A workbook is a zip container of XML parts. Reading a sheet needs the
//! workbook part (sheet names and the 1904 date flag), its relationships
//! (sheet name to part path), the shared string table, and the cell styles
//! (to tell date-formatted numbers from plain numbers).

use chrono::{Duration, NaiveDate, NaiveDateTime};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::debug;
use zip::ZipArchive;
use zip::result::ZipError;

use super::DataFormat;
use super::inference::Cell;
use crate::error::LoadError;

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const STYLES_PART: &str = "xl/styles.xml";

/// Worksheet limits of the format.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Pre-allocation ceiling for a part; the declared size is not trusted.
const MAX_PART_PREALLOC: usize = 1 << 20;

fn parse_error(reason: impl Into<String>) -> LoadError {
    LoadError::parse(DataFormat::Spreadsheet, reason)
}

fn xml_error(part: &str, err: impl std::fmt::Display) -> LoadError {
    parse_error(format!("malformed XML in '{part}': {err}"))
}

#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    path: String,
}

/// An opened workbook with its sheet list and lookup tables loaded.
pub(crate) struct Workbook<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
    date_styles: Vec<bool>,
    date1904: bool,
}

impl<'a> Workbook<'a> {
    pub(crate) fn open(bytes: &'a [u8]) -> Result<Self, LoadError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| parse_error(format!("not a zip container: {e}")))?;

        let workbook = read_part(&mut archive, WORKBOOK_PART)?
            .ok_or_else(|| parse_error(format!("missing '{WORKBOOK_PART}'")))?;
        let (raw_sheets, date1904) = parse_workbook(&workbook)?;

        let rels = match read_part(&mut archive, WORKBOOK_RELS_PART)? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };

        let sheets = raw_sheets
            .into_iter()
            .enumerate()
            .map(|(idx, (name, rel_id))| {
                let path = rel_id
                    .and_then(|id| rels.get(&id))
                    .map(|target| resolve_target(target))
                    .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", idx + 1));
                SheetEntry { name, path }
            })
            .collect();

        let shared_strings = match read_part(&mut archive, SHARED_STRINGS_PART)? {
            Some(xml) => parse_shared_strings(&xml)?,
            None => Vec::new(),
        };
        let date_styles = match read_part(&mut archive, STYLES_PART)? {
            Some(xml) => parse_date_styles(&xml)?,
            None => Vec::new(),
        };

        Ok(Self {
            archive,
            sheets,
            shared_strings,
            date_styles,
            date1904,
        })
    }

    /// Sheet names in workbook order.
    pub(crate) fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    /// Read one sheet into rows of cells.
    pub(crate) fn read_sheet(&mut self, name: &str) -> Result<Vec<Vec<Cell>>, LoadError> {
        let entry = self
            .sheets
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .ok_or_else(|| LoadError::SheetNotFound {
                sheet: name.to_string(),
                available: self.sheet_names(),
            })?;

        let xml = read_part(&mut self.archive, &entry.path)?
            .ok_or_else(|| parse_error(format!("sheet part '{}' is missing", entry.path)))?;
        debug!(sheet = %name, part = %entry.path, "Reading worksheet");
        self.parse_sheet(&entry.path, &xml)
    }

    fn parse_sheet(&self, part: &str, xml: &[u8]) -> Result<Vec<Vec<Cell>>, LoadError> {
        let mut reader = Reader::from_reader(xml);
        let mut buf = Vec::new();
        let mut rows: Vec<Vec<Cell>> = Vec::new();

        let mut next_row = 0usize;
        let mut current_row = 0usize;
        let mut next_col = 0usize;
        let mut cell: Option<PendingCell> = None;
        let mut in_value = false;
        let mut in_inline_text = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        current_row = row_index(&e, next_row, part)?;
                        next_row = current_row + 1;
                        next_col = 0;
                    }
                    b"c" => {
                        let pending = PendingCell::from_element(&e, next_col, part)?;
                        next_col = pending.col + 1;
                        cell = Some(pending);
                    }
                    b"v" => in_value = true,
                    b"t" => in_inline_text = cell.is_some(),
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"row" => {
                        current_row = row_index(&e, next_row, part)?;
                        next_row = current_row + 1;
                    }
                    b"c" => {
                        let pending = PendingCell::from_element(&e, next_col, part)?;
                        next_col = pending.col + 1;
                    }
                    _ => {}
                },
                Ok(Event::Text(e)) => {
                    if let Some(pending) = cell.as_mut()
                        && (in_value || in_inline_text)
                    {
                        let text = e.unescape().map_err(|err| xml_error(part, err))?;
                        pending.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    if let Some(pending) = cell.as_mut()
                        && (in_value || in_inline_text)
                    {
                        pending.text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Ok(Event::End(e)) => match e.local_name().as_ref() {
                    b"v" => in_value = false,
                    b"t" => in_inline_text = false,
                    b"c" => {
                        if let Some(pending) = cell.take() {
                            let col = pending.col;
                            let value = self.resolve_cell(pending)?;
                            if value != Cell::Empty {
                                place(&mut rows, current_row, col, value)?;
                            }
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(err) => return Err(xml_error(part, err)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rows)
    }

    fn resolve_cell(&self, pending: PendingCell) -> Result<Cell, LoadError> {
        let PendingCell {
            cell_type,
            style,
            text,
            ..
        } = pending;

        let cell = match cell_type.as_deref() {
            Some("s") => {
                let idx: usize = text
                    .trim()
                    .parse()
                    .map_err(|_| parse_error(format!("invalid shared string index '{text}'")))?;
                let value = self.shared_strings.get(idx).ok_or_else(|| {
                    parse_error(format!("shared string index {idx} out of range"))
                })?;
                Cell::Text(value.clone())
            }
            Some("str") | Some("inlineStr") => Cell::Text(text),
            Some("b") => Cell::Bool(text.trim() == "1" || text.trim() == "true"),
            // Error values such as #N/A carry no data.
            Some("e") => Cell::Empty,
            Some("d") => match super::inference::parse_date_text(&text) {
                Some(dt) => Cell::DateTime(dt),
                None => Cell::Text(text),
            },
            _ => {
                if text.trim().is_empty() {
                    return Ok(Cell::Empty);
                }
                let number: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| parse_error(format!("invalid numeric cell '{text}'")))?;
                let is_date = style
                    .and_then(|s| self.date_styles.get(s))
                    .copied()
                    .unwrap_or(false);
                match is_date.then(|| serial_to_datetime(number, self.date1904)).flatten() {
                    Some(dt) => Cell::DateTime(dt),
                    None => Cell::Number(number),
                }
            }
        };
        Ok(cell)
    }
}

/// A `<c>` element whose value is still being read.
#[derive(Debug)]
struct PendingCell {
    col: usize,
    cell_type: Option<String>,
    style: Option<usize>,
    text: String,
}

impl PendingCell {
    fn from_element(e: &BytesStart<'_>, next_col: usize, part: &str) -> Result<Self, LoadError> {
        let col = match attr(e, b"r", part)? {
            Some(reference) => column_index(&reference)
                .ok_or_else(|| parse_error(format!("invalid cell reference '{reference}'")))?,
            None => next_col,
        };
        let style = attr(e, b"s", part)?.and_then(|s| s.parse().ok());
        Ok(Self {
            col,
            cell_type: attr(e, b"t", part)?,
            style,
            text: String::new(),
        })
    }
}

fn row_index(e: &BytesStart<'_>, next_row: usize, part: &str) -> Result<usize, LoadError> {
    match attr(e, b"r", part)? {
        Some(r) => r
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|r| (1..=MAX_ROWS).contains(r))
            .map(|r| r - 1)
            .ok_or_else(|| parse_error(format!("invalid row number '{r}'"))),
        None => Ok(next_row),
    }
}

fn place(rows: &mut Vec<Vec<Cell>>, row: usize, col: usize, value: Cell) -> Result<(), LoadError> {
    if row >= MAX_ROWS || col >= MAX_COLUMNS {
        return Err(parse_error(format!(
            "cell at row {} column {} is outside the worksheet",
            row + 1,
            col + 1
        )));
    }
    if rows.len() <= row {
        rows.resize_with(row + 1, Vec::new);
    }
    let cells = &mut rows[row];
    if cells.len() <= col {
        cells.resize(col + 1, Cell::Empty);
    }
    cells[col] = value;
    Ok(())
}

/// Zero-based column index of an A1-style reference such as `AB12`.
pub(crate) fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    let number = letters
        .iter()
        .fold(0usize, |acc, b| acc * 26 + (b.to_ascii_uppercase() - b'A' + 1) as usize);
    Some(number - 1).filter(|col| *col < MAX_COLUMNS)
}

/// Convert a spreadsheet date serial into a timestamp.
pub(crate) fn serial_to_datetime(serial: f64, date1904: bool) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    // The 1900 system counts a nonexistent 1900-02-29 as day 60.
    let epoch = if date1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)?
    } else if serial < 60.0 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch
        .and_hms_opt(0, 0, 0)?
        .checked_add_signed(Duration::milliseconds(millis))
}

fn read_part(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<Vec<u8>>, LoadError> {
    let mut file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(parse_error(format!("cannot open '{name}': {e}"))),
    };
    let declared = usize::try_from(file.size()).unwrap_or(usize::MAX);
    let mut content = Vec::with_capacity(declared.min(MAX_PART_PREALLOC));
    file.read_to_end(&mut content)
        .map_err(|e| parse_error(format!("cannot read '{name}': {e}")))?;
    Ok(Some(content))
}

fn attr(e: &BytesStart<'_>, key: &[u8], part: &str) -> Result<Option<String>, LoadError> {
    for attribute in e.attributes() {
        let attribute = attribute.map_err(|err| xml_error(part, err))?;
        if attribute.key.local_name().as_ref() == key {
            let value = attribute
                .unescape_value()
                .map_err(|err| xml_error(part, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

/// Sheet names with their relationship ids, and the 1904 date flag.
fn parse_workbook(xml: &[u8]) -> Result<(Vec<(String, Option<String>)>, bool), LoadError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();
    let mut date1904 = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"sheet" => {
                    let name = attr(&e, b"name", WORKBOOK_PART)?
                        .ok_or_else(|| parse_error("sheet without a name"))?;
                    sheets.push((name, attr(&e, b"id", WORKBOOK_PART)?));
                }
                b"workbookPr" => {
                    date1904 = matches!(
                        attr(&e, b"date1904", WORKBOOK_PART)?.as_deref(),
                        Some("1") | Some("true")
                    );
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(WORKBOOK_PART, err)),
            _ => {}
        }
        buf.clear();
    }
    Ok((sheets, date1904))
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, LoadError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut rels = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship"
                    && let (Some(id), Some(target)) = (
                        attr(&e, b"Id", WORKBOOK_RELS_PART)?,
                        attr(&e, b"Target", WORKBOOK_RELS_PART)?,
                    )
                {
                    rels.insert(id, target);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(WORKBOOK_RELS_PART, err)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, LoadError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    // Phonetic runs repeat the text in another script.
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"si" {
                    strings.push(String::new());
                }
            }
            Ok(Event::Text(e)) => {
                if in_text && let Some(s) = current.as_mut() {
                    let text = e.unescape().map_err(|err| xml_error(SHARED_STRINGS_PART, err))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => {
                    if let Some(s) = current.take() {
                        strings.push(s);
                    }
                }
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(SHARED_STRINGS_PART, err)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Whether a built-in number format id is a date or time format.
fn is_builtin_date_format(id: u32) -> bool {
    matches!(id, 14..=22 | 27..=36 | 45..=47 | 50..=58)
}

/// Whether a custom number format code renders a date or time.
pub(crate) fn is_date_format_code(code: &str) -> bool {
    let mut stripped = String::with_capacity(code.len());
    let mut chars = code.chars();
    let mut in_quotes = false;
    let mut in_brackets = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            '[' => in_brackets = true,
            ']' => in_brackets = false,
            _ if in_brackets => {}
            // Escaped literal, padding and fill characters.
            '\\' | '_' | '*' => {
                chars.next();
            }
            _ => stripped.push(c.to_ascii_lowercase()),
        }
    }
    // Only the positive section decides.
    let section = stripped.split(';').next().unwrap_or("");
    if section == "general" {
        return false;
    }
    section
        .chars()
        .any(|c| matches!(c, 'd' | 'm' | 'y' | 'h' | 's'))
}

/// For each `cellXfs` entry, whether it applies a date format.
fn parse_date_styles(xml: &[u8]) -> Result<Vec<bool>, LoadError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut custom: HashMap<u32, bool> = HashMap::new();
    let mut styles = Vec::new();
    let mut in_cell_xfs = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr(&e, b"numFmtId", STYLES_PART)?.and_then(|v| v.parse().ok());
                    let code = attr(&e, b"formatCode", STYLES_PART)?;
                    if let (Some(id), Some(code)) = (id, code) {
                        custom.insert(id, is_date_format_code(&code));
                    }
                }
                b"cellXfs" => in_cell_xfs = true,
                b"xf" if in_cell_xfs => {
                    let id: u32 = attr(&e, b"numFmtId", STYLES_PART)?
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    let is_date = custom
                        .get(&id)
                        .copied()
                        .unwrap_or_else(|| is_builtin_date_format(id));
                    styles.push(is_date);
                }
                _ => {}
            },
            Ok(Event::End(e)) => {
                if e.local_name().as_ref() == b"cellXfs" {
                    in_cell_xfs = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(xml_error(STYLES_PART, err)),
            _ => {}
        }
        buf.clear();
    }
    Ok(styles)
}
