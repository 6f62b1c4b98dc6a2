//! Header handling and per-column type inference shared by the CSV and spreadsheet readers.
//!
//! Readers hand over a grid of [`RawCell`]s; this module picks the header row, makes column
//! names unique and decides one [`DataType`] per column:
//!
//! - every non-empty cell is an integer (including integral floats) => [`DataType::Int64`]
//! - every non-empty cell is numeric => [`DataType::Float64`]
//! - every non-empty cell is `true`/`false` => [`DataType::Bool`]
//! - every non-empty cell is a date-time => [`DataType::Datetime`]
//! - anything else => [`DataType::Utf8`], keeping each cell's original text
//!
//! Text cells are tried as numbers after applying the configured [`NumberFormat`].

use chrono::NaiveDateTime;

use crate::config::NumberFormat;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// One cell as produced by a format reader, before type inference.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawCell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl RawCell {
    fn to_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// Classification of a single non-empty cell.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Kind {
    Int(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    Text,
}

/// Build a [`DataSet`] from a raw grid.
///
/// `header` is the zero-based row holding column names; rows above it are dropped. With `None`
/// every row is data and columns are named `0`, `1`, ...
pub(crate) fn build_dataset(
    source: &str,
    grid: Vec<Vec<RawCell>>,
    header: Option<usize>,
    numbers: NumberFormat,
) -> PipelineResult<DataSet> {
    let (names, data): (Vec<String>, Vec<Vec<RawCell>>) = match header {
        Some(h) => {
            if grid.is_empty() {
                return Ok(DataSet::new(Schema::default(), Vec::new()));
            }
            if h >= grid.len() {
                return Err(PipelineError::schema(format!(
                    "table '{source}': header row {h} is past the end of the data ({} rows)",
                    grid.len()
                )));
            }
            let mut rows = grid.into_iter().skip(h);
            let header_cells = rows.next().unwrap_or_default();
            (header_names(&header_cells), rows.collect())
        }
        None => (Vec::new(), grid),
    };

    let width = data
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(names.len()))
        .max()
        .unwrap_or(0);

    let mut names = names;
    for i in names.len()..width {
        names.push(if header.is_some() {
            format!("Unnamed: {i}")
        } else {
            i.to_string()
        });
    }
    let names = dedupe_names(names);

    let mut columns: Vec<Vec<RawCell>> = vec![Vec::with_capacity(data.len()); width];
    let row_count = data.len();
    for row in data {
        let mut cells = row.into_iter();
        for column in columns.iter_mut() {
            column.push(cells.next().unwrap_or(RawCell::Empty));
        }
    }

    let mut fields = Vec::with_capacity(width);
    let mut typed_columns = Vec::with_capacity(width);
    for (name, cells) in names.into_iter().zip(columns) {
        let (data_type, values) = infer_column(cells, numbers);
        fields.push(Field::new(name, data_type));
        typed_columns.push(values);
    }

    let mut rows: Vec<Vec<Value>> = (0..row_count).map(|_| Vec::with_capacity(width)).collect();
    for values in typed_columns {
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value);
        }
    }

    Ok(DataSet::new(Schema::new(fields), rows))
}

fn header_names(cells: &[RawCell]) -> Vec<String> {
    cells
        .iter()
        .enumerate()
        .map(|(i, c)| match c {
            RawCell::Empty => format!("Unnamed: {i}"),
            RawCell::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => (*f as i64).to_string(),
            RawCell::Text(s) if s.trim().is_empty() => format!("Unnamed: {i}"),
            RawCell::Text(s) => s.trim().to_string(),
            other => other.to_text(),
        })
        .collect()
}

/// Repeated names get `.1`, `.2`, ... suffixes in order of appearance.
fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !out.contains(&name) {
            out.push(name);
            continue;
        }
        let mut k = 1;
        let unique = loop {
            let candidate = format!("{name}.{k}");
            if !out.contains(&candidate) {
                break candidate;
            }
            k += 1;
        };
        out.push(unique);
    }
    out
}

fn infer_column(cells: Vec<RawCell>, numbers: NumberFormat) -> (DataType, Vec<Value>) {
    let kinds: Vec<Option<Kind>> = cells.iter().map(|c| classify(c, numbers)).collect();
    let present = || kinds.iter().flatten();

    if present().next().is_none() {
        return (DataType::Utf8, vec![Value::Null; cells.len()]);
    }

    if present().all(|k| as_int(k).is_some()) {
        let values = kinds
            .iter()
            .map(|k| k.as_ref().and_then(as_int).map_or(Value::Null, Value::Int64))
            .collect();
        return (DataType::Int64, values);
    }

    if present().all(|k| as_float(k).is_some()) {
        let values = kinds
            .iter()
            .map(|k| k.as_ref().and_then(as_float).map_or(Value::Null, Value::Float64))
            .collect();
        return (DataType::Float64, values);
    }

    if present().all(|k| matches!(k, Kind::Bool(_))) {
        let values = kinds
            .iter()
            .map(|k| match k {
                Some(Kind::Bool(b)) => Value::Bool(*b),
                _ => Value::Null,
            })
            .collect();
        return (DataType::Bool, values);
    }

    if present().all(|k| matches!(k, Kind::DateTime(_))) {
        let values = kinds
            .iter()
            .map(|k| match k {
                Some(Kind::DateTime(dt)) => Value::Datetime(*dt),
                _ => Value::Null,
            })
            .collect();
        return (DataType::Datetime, values);
    }

    let values = cells
        .into_iter()
        .map(|c| match c {
            RawCell::Empty => Value::Null,
            RawCell::Text(s) => Value::Utf8(s),
            other => Value::Utf8(other.to_text()),
        })
        .collect();
    (DataType::Utf8, values)
}

fn classify(cell: &RawCell, numbers: NumberFormat) -> Option<Kind> {
    match cell {
        RawCell::Empty => None,
        RawCell::Int(i) => Some(Kind::Int(*i)),
        RawCell::Float(f) => Some(Kind::Float(*f)),
        RawCell::Bool(b) => Some(Kind::Bool(*b)),
        RawCell::DateTime(dt) => Some(Kind::DateTime(*dt)),
        RawCell::Text(s) if s.trim().is_empty() => None,
        RawCell::Text(s) => Some(classify_text(s, numbers)),
    }
}

fn classify_text(s: &str, numbers: NumberFormat) -> Kind {
    if let Some(normalized) = normalize_number(s, numbers) {
        if let Ok(i) = normalized.parse::<i64>() {
            return Kind::Int(i);
        }
        if let Ok(f) = normalized.parse::<f64>() {
            return Kind::Float(f);
        }
    }
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Kind::Bool(true),
        "false" => Kind::Bool(false),
        _ => Kind::Text,
    }
}

fn as_int(kind: &Kind) -> Option<i64> {
    match kind {
        Kind::Int(i) => Some(*i),
        Kind::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(*f as i64),
        _ => None,
    }
}

fn as_float(kind: &Kind) -> Option<f64> {
    match kind {
        Kind::Int(i) => Some(*i as f64),
        Kind::Float(f) => Some(*f),
        _ => None,
    }
}

/// Rewrite numeric text into Rust's float syntax, or `None` if it cannot be a number.
///
/// Thousands separators are removed and the decimal separator becomes `.`. Only digits, one
/// leading sign, one decimal point and an exponent are accepted, so words like `inf` or `nan`
/// stay text.
pub(crate) fn normalize_number(s: &str, numbers: NumberFormat) -> Option<String> {
    let trimmed = s.trim();
    let mut out = String::with_capacity(trimmed.len());
    for ch in trimmed.chars() {
        if Some(ch) == numbers.thousands {
            continue;
        }
        if ch == numbers.decimal {
            out.push('.');
        } else if ch == '.' {
            // A literal '.' is only valid when it is the configured decimal point.
            return None;
        } else {
            out.push(ch);
        }
    }

    let body = out.strip_prefix(['+', '-']).unwrap_or(&out);
    let (mantissa, exponent) = match body.find(['e', 'E']) {
        Some(idx) => (&body[..idx], Some(&body[idx + 1..])),
        None => (body, None),
    };
    let mantissa_ok = !mantissa.is_empty()
        && mantissa.chars().any(|c| c.is_ascii_digit())
        && mantissa.chars().all(|c| c.is_ascii_digit() || c == '.')
        && mantissa.matches('.').count() <= 1;
    let exponent_ok = exponent.is_none_or(|e| {
        let digits = e.strip_prefix(['+', '-']).unwrap_or(e);
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    });
    (mantissa_ok && exponent_ok).then_some(out)
}
