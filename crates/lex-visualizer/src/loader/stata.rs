//! Stata `.dta` reader.
//!
//! Two layouts exist. Releases 113-115 start with a fixed binary header;
//! releases 117-119 wrap every section in XML-like tags and store section
//! offsets in a `<map>`. Column types are taken from the file, so no
//! inference runs here.

use polars::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use super::DataFormat;
use crate::error::LoadError;

/// Days between the Stata epoch (1960-01-01) and the Unix epoch.
const STATA_EPOCH_OFFSET_DAYS: i64 = 3653;
const MILLIS_PER_DAY: i64 = 86_400_000;

const MAX_BYTE: i8 = 100;
const MAX_INT: i16 = 32_740;
const MAX_LONG: i32 = 2_147_483_620;

fn parse_error(reason: impl Into<String>) -> LoadError {
    LoadError::parse(DataFormat::StatisticalPackage, reason)
}

/// Largest non-missing float; larger values encode `.`, `.a` .. `.z`.
fn max_float() -> f32 {
    f32::from_bits(0x7eff_ffff)
}

fn max_double() -> f64 {
    f64::from_bits(0x7fdf_ffff_ffff_ffff)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VarType {
    Str(usize),
    StrL,
    Byte,
    Int,
    Long,
    Float,
    Double,
}

impl VarType {
    fn from_legacy_code(code: u8) -> Result<Self, LoadError> {
        match code {
            1..=244 => Ok(VarType::Str(code as usize)),
            251 => Ok(VarType::Byte),
            252 => Ok(VarType::Int),
            253 => Ok(VarType::Long),
            254 => Ok(VarType::Float),
            255 => Ok(VarType::Double),
            _ => Err(parse_error(format!("unknown variable type code {code}"))),
        }
    }

    fn from_tagged_code(code: u16) -> Result<Self, LoadError> {
        match code {
            1..=2045 => Ok(VarType::Str(code as usize)),
            32768 => Ok(VarType::StrL),
            65526 => Ok(VarType::Double),
            65527 => Ok(VarType::Float),
            65528 => Ok(VarType::Long),
            65529 => Ok(VarType::Int),
            65530 => Ok(VarType::Byte),
            _ => Err(parse_error(format!("unknown variable type code {code}"))),
        }
    }

    fn width(&self) -> usize {
        match self {
            VarType::Str(n) => *n,
            VarType::StrL => 8,
            VarType::Byte => 1,
            VarType::Int => 2,
            VarType::Long | VarType::Float => 4,
            VarType::Double => 8,
        }
    }
}

/// Display format families that change how numbers are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DisplayKind {
    Plain,
    Date,
    Datetime,
}

fn display_kind(format: &str) -> DisplayKind {
    let fmt = format.trim_start_matches('%').trim_start_matches('-');
    if fmt.starts_with("tc") || fmt.starts_with("tC") {
        DisplayKind::Datetime
    } else if fmt.starts_with("td") || fmt.starts_with('d') {
        DisplayKind::Date
    } else {
        DisplayKind::Plain
    }
}

/// Byte cursor that honours the file's byte order.
struct ByteReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    big_endian: bool,
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            pos: 0,
            big_endian: false,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], LoadError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| parse_error(format!("unexpected end of file at byte {}", self.pos)))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], LoadError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn seek(&mut self, pos: usize) -> Result<(), LoadError> {
        if pos > self.bytes.len() {
            return Err(parse_error(format!("section offset {pos} is past the end of file")));
        }
        self.pos = pos;
        Ok(())
    }

    fn skip(&mut self, n: usize) -> Result<(), LoadError> {
        self.take(n).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, LoadError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, LoadError> {
        let b = self.array::<2>()?;
        Ok(if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    }

    fn u32(&mut self) -> Result<u32, LoadError> {
        let b = self.array::<4>()?;
        Ok(if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }

    fn u64(&mut self) -> Result<u64, LoadError> {
        let b = self.array::<8>()?;
        Ok(if self.big_endian { u64::from_be_bytes(b) } else { u64::from_le_bytes(b) })
    }

    /// Consume a literal tag such as `<header>`.
    fn expect(&mut self, tag: &str) -> Result<(), LoadError> {
        let found = self.take(tag.len())?;
        if found != tag.as_bytes() {
            return Err(parse_error(format!(
                "expected '{tag}' at byte {}, found '{}'",
                self.pos - tag.len(),
                String::from_utf8_lossy(found)
            )));
        }
        Ok(())
    }

    fn peek_is(&self, tag: &str) -> bool {
        self.bytes[self.pos..].starts_with(tag.as_bytes())
    }
}

/// Everything needed to decode the data section.
struct Layout {
    release: u8,
    big_endian: bool,
    nobs: usize,
    types: Vec<VarType>,
    names: Vec<String>,
    formats: Vec<String>,
    data_offset: usize,
    strls: HashMap<[u8; 8], String>,
}

/// Parse a `.dta` file into a DataFrame.
pub(crate) fn read_dta(bytes: &[u8]) -> Result<DataFrame, LoadError> {
    let layout = if bytes.starts_with(b"<stata_dta>") {
        read_tagged_layout(bytes)?
    } else {
        read_legacy_layout(bytes)?
    };
    debug!(
        release = layout.release,
        variables = layout.names.len(),
        observations = layout.nobs,
        "Parsed Stata header"
    );
    decode_data(bytes, &layout)
}

fn decode_text(bytes: &[u8], release: u8) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    let bytes = &bytes[..end];
    if release >= 118 {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn read_text_fields(
    reader: &mut ByteReader<'_>,
    count: usize,
    width: usize,
    release: u8,
) -> Result<Vec<String>, LoadError> {
    (0..count)
        .map(|_| Ok(decode_text(reader.take(width)?, release)))
        .collect()
}

fn read_legacy_layout(bytes: &[u8]) -> Result<Layout, LoadError> {
    let mut reader = ByteReader::new(bytes);
    let release = reader.u8()?;
    if !(113..=115).contains(&release) {
        return Err(parse_error(format!("unsupported Stata release {release}")));
    }
    reader.big_endian = match reader.u8()? {
        1 => true,
        2 => false,
        other => return Err(parse_error(format!("invalid byte order flag {other}"))),
    };
    reader.skip(2)?; // filetype, unused
    let nvar = reader.u16()? as usize;
    let nobs = reader.u32()? as usize;
    reader.skip(81 + 18)?; // data label, timestamp

    let types = reader
        .take(nvar)?
        .iter()
        .map(|code| VarType::from_legacy_code(*code))
        .collect::<Result<Vec<_>, _>>()?;
    let names = read_text_fields(&mut reader, nvar, 33, release)?;
    reader.skip(2 * (nvar + 1))?; // sort order
    let format_width = if release >= 114 { 49 } else { 12 };
    let formats = read_text_fields(&mut reader, nvar, format_width, release)?;
    reader.skip(nvar * 33 + nvar * 81)?; // value label names, variable labels

    // Expansion fields end with a zero type and zero length.
    loop {
        let kind = reader.u8()?;
        let len = reader.u32()? as usize;
        if kind == 0 && len == 0 {
            break;
        }
        reader.skip(len)?;
    }

    Ok(Layout {
        release,
        big_endian: reader.big_endian,
        nobs,
        types,
        names,
        formats,
        data_offset: reader.pos,
        strls: HashMap::new(),
    })
}

fn read_tagged_layout(bytes: &[u8]) -> Result<Layout, LoadError> {
    let mut reader = ByteReader::new(bytes);
    reader.expect("<stata_dta>")?;
    reader.expect("<header>")?;
    reader.expect("<release>")?;
    let release: u8 = std::str::from_utf8(reader.take(3)?)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| parse_error("unreadable release number"))?;
    if !(117..=119).contains(&release) {
        return Err(parse_error(format!("unsupported Stata release {release}")));
    }
    reader.expect("</release>")?;

    reader.expect("<byteorder>")?;
    reader.big_endian = match reader.take(3)? {
        b"MSF" => true,
        b"LSF" => false,
        other => {
            return Err(parse_error(format!(
                "invalid byte order '{}'",
                String::from_utf8_lossy(other)
            )));
        }
    };
    reader.expect("</byteorder>")?;

    reader.expect("<K>")?;
    let nvar = if release == 119 { reader.u32()? as usize } else { reader.u16()? as usize };
    reader.expect("</K>")?;
    reader.expect("<N>")?;
    let nobs = if release == 117 { reader.u32()? as u64 } else { reader.u64()? };
    let nobs = usize::try_from(nobs).map_err(|_| parse_error("observation count too large"))?;
    reader.expect("</N>")?;

    reader.expect("<label>")?;
    let label_len = if release == 117 { reader.u8()? as usize } else { reader.u16()? as usize };
    reader.skip(label_len)?;
    reader.expect("</label>")?;
    reader.expect("<timestamp>")?;
    let stamp_len = reader.u8()? as usize;
    reader.skip(stamp_len)?;
    reader.expect("</timestamp>")?;
    reader.expect("</header>")?;

    reader.expect("<map>")?;
    let map = (0..14).map(|_| reader.u64()).collect::<Result<Vec<_>, _>>()?;
    reader.expect("</map>")?;

    reader.expect("<variable_types>")?;
    let types = (0..nvar)
        .map(|_| reader.u16().and_then(VarType::from_tagged_code))
        .collect::<Result<Vec<_>, _>>()?;
    reader.expect("</variable_types>")?;

    let name_width = if release == 117 { 33 } else { 129 };
    reader.expect("<varnames>")?;
    let names = read_text_fields(&mut reader, nvar, name_width, release)?;
    reader.expect("</varnames>")?;

    reader.expect("<sortlist>")?;
    let sort_width = if release == 119 { 4 } else { 2 };
    reader.skip(sort_width * (nvar + 1))?;
    reader.expect("</sortlist>")?;

    let format_width = if release == 117 { 49 } else { 57 };
    reader.expect("<formats>")?;
    let formats = read_text_fields(&mut reader, nvar, format_width, release)?;
    reader.expect("</formats>")?;

    let offset = |idx: usize| {
        usize::try_from(map[idx]).map_err(|_| parse_error("section offset too large"))
    };

    reader.seek(offset(9)?)?;
    reader.expect("<data>")?;
    let data_offset = reader.pos;

    let strls = if types.contains(&VarType::StrL) {
        reader.seek(offset(10)?)?;
        read_strls(&mut reader, release)?
    } else {
        HashMap::new()
    };

    Ok(Layout {
        release,
        big_endian: reader.big_endian,
        nobs,
        types,
        names,
        formats,
        data_offset,
        strls,
    })
}

/// Read the `<strls>` section into a map keyed by the 8 bytes a data cell
/// stores for the same (variable, observation) pair.
fn read_strls(
    reader: &mut ByteReader<'_>,
    release: u8,
) -> Result<HashMap<[u8; 8], String>, LoadError> {
    reader.expect("<strls>")?;
    let mut strls = HashMap::new();

    while reader.peek_is("GSO") {
        reader.expect("GSO")?;
        let key: [u8; 8] = if release == 117 {
            reader.array::<8>()?
        } else {
            let v = reader.array::<4>()?;
            let o = reader.array::<8>()?;
            // Data cells pack v into 2 (118) or 3 (119) bytes and o into the rest.
            let v_size = if release == 118 { 2 } else { 3 };
            let mut key = [0u8; 8];
            if reader.big_endian {
                key[..v_size].copy_from_slice(&v[4 - v_size..]);
                key[v_size..].copy_from_slice(&o[v_size..]);
            } else {
                key[..v_size].copy_from_slice(&v[..v_size]);
                key[v_size..].copy_from_slice(&o[..8 - v_size]);
            }
            key
        };
        let kind = reader.u8()?;
        let len = reader.u32()? as usize;
        let content = reader.take(len)?;
        // Type 130 is a NUL-terminated string; 129 is raw bytes.
        let text = if kind == 130 {
            decode_text(content, 118)
        } else {
            String::from_utf8_lossy(content).into_owned()
        };
        strls.insert(key, text);
    }

    reader.expect("</strls>")?;
    Ok(strls)
}

enum ColumnValues {
    Byte(Vec<Option<i8>>),
    Int(Vec<Option<i16>>),
    Long(Vec<Option<i32>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnValues {
    fn with_capacity(var_type: VarType, capacity: usize) -> Self {
        match var_type {
            VarType::Byte => ColumnValues::Byte(Vec::with_capacity(capacity)),
            VarType::Int => ColumnValues::Int(Vec::with_capacity(capacity)),
            VarType::Long => ColumnValues::Long(Vec::with_capacity(capacity)),
            VarType::Float => ColumnValues::Float(Vec::with_capacity(capacity)),
            VarType::Double => ColumnValues::Double(Vec::with_capacity(capacity)),
            VarType::Str(_) | VarType::StrL => ColumnValues::Text(Vec::with_capacity(capacity)),
        }
    }

    fn into_series(self, name: &str, kind: DisplayKind) -> PolarsResult<Series> {
        let name = PlSmallStr::from(name);
        if kind != DisplayKind::Plain
            && let Some(values) = self.as_f64()
        {
            return temporal_series(name, &values, kind);
        }
        Ok(match self {
            ColumnValues::Byte(v) => Series::new(name, v),
            ColumnValues::Int(v) => Series::new(name, v),
            ColumnValues::Long(v) => Series::new(name, v),
            ColumnValues::Float(v) => Series::new(name, v),
            ColumnValues::Double(v) => Series::new(name, v),
            ColumnValues::Text(v) => Series::new(name, v),
        })
    }

    fn as_f64(&self) -> Option<Vec<Option<f64>>> {
        let values = match self {
            ColumnValues::Byte(v) => v.iter().map(|x| x.map(f64::from)).collect(),
            ColumnValues::Int(v) => v.iter().map(|x| x.map(f64::from)).collect(),
            ColumnValues::Long(v) => v.iter().map(|x| x.map(f64::from)).collect(),
            ColumnValues::Float(v) => v.iter().map(|x| x.map(f64::from)).collect(),
            ColumnValues::Double(v) => v.clone(),
            ColumnValues::Text(_) => return None,
        };
        Some(values)
    }
}

fn temporal_series(
    name: PlSmallStr,
    values: &[Option<f64>],
    kind: DisplayKind,
) -> PolarsResult<Series> {
    match kind {
        DisplayKind::Date => {
            let days: Vec<Option<i32>> = values
                .iter()
                .map(|v| v.and_then(|d| i32::try_from(d.round() as i64 - STATA_EPOCH_OFFSET_DAYS).ok()))
                .collect();
            Series::new(name, days).cast(&DataType::Date)
        }
        _ => {
            let millis: Vec<Option<i64>> = values
                .iter()
                .map(|v| v.map(|ms| ms.round() as i64 - STATA_EPOCH_OFFSET_DAYS * MILLIS_PER_DAY))
                .collect();
            Series::new(name, millis).cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
        }
    }
}

fn decode_data(bytes: &[u8], layout: &Layout) -> Result<DataFrame, LoadError> {
    let record_width: usize = layout.types.iter().map(VarType::width).sum();
    let data_len = layout
        .nobs
        .checked_mul(record_width)
        .ok_or_else(|| parse_error("data section size overflows"))?;
    let data = bytes
        .get(layout.data_offset..)
        .filter(|rest| rest.len() >= data_len)
        .ok_or_else(|| {
            parse_error(format!(
                "data section truncated: expected {} observations of {record_width} bytes",
                layout.nobs
            ))
        })?;

    let mut columns: Vec<ColumnValues> = layout
        .types
        .iter()
        .map(|t| ColumnValues::with_capacity(*t, layout.nobs))
        .collect();

    let mut reader = ByteReader {
        bytes: &data[..data_len],
        pos: 0,
        big_endian: layout.big_endian,
    };
    for _ in 0..layout.nobs {
        for (var_type, column) in layout.types.iter().zip(columns.iter_mut()) {
            match (var_type, column) {
                (VarType::Byte, ColumnValues::Byte(v)) => {
                    let x = reader.u8()? as i8;
                    v.push((x <= MAX_BYTE).then_some(x));
                }
                (VarType::Int, ColumnValues::Int(v)) => {
                    let x = reader.u16()? as i16;
                    v.push((x <= MAX_INT).then_some(x));
                }
                (VarType::Long, ColumnValues::Long(v)) => {
                    let x = reader.u32()? as i32;
                    v.push((x <= MAX_LONG).then_some(x));
                }
                (VarType::Float, ColumnValues::Float(v)) => {
                    let x = f32::from_bits(reader.u32()?);
                    v.push((x <= max_float()).then_some(x));
                }
                (VarType::Double, ColumnValues::Double(v)) => {
                    let x = f64::from_bits(reader.u64()?);
                    v.push((x <= max_double()).then_some(x));
                }
                (VarType::Str(width), ColumnValues::Text(v)) => {
                    let text = decode_text(reader.take(*width)?, layout.release);
                    v.push(Some(text));
                }
                (VarType::StrL, ColumnValues::Text(v)) => {
                    let key = reader.array::<8>()?;
                    let text = layout.strls.get(&key).cloned().unwrap_or_default();
                    v.push(Some(text));
                }
                _ => return Err(parse_error("variable type and column storage disagree")),
            }
        }
    }

    let series = columns
        .into_iter()
        .zip(layout.names.iter().zip(layout.formats.iter()))
        .map(|(values, (name, format))| {
            values
                .into_series(name, display_kind(format))
                .map(IntoColumn::into_column)
        })
        .collect::<PolarsResult<Vec<_>>>()
        .map_err(|e| parse_error(e.to_string()))?;

    DataFrame::new(series).map_err(|e| parse_error(e.to_string()))
}
