#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{ExcelReadOptions, SheetSelection};
use crate::error::{PipelineError, PipelineResult};
use crate::types::DataSet;

use super::infer::{build_dataset, RawCell};

/// Ingest one worksheet of a workbook (`.xlsx`, `.xls`, `.ods`, etc.) into an in-memory `DataSet`.
///
/// Behavior:
/// - Picks the sheet by position or name (`opts.sheet`)
/// - Uses `opts.header` as the header row within the sheet's used range
/// - Native numbers, booleans and dates keep their type; text cells go through the same
///   number/bool inference as CSV
pub fn ingest_excel_from_path(path: impl AsRef<Path>, opts: &ExcelReadOptions) -> PipelineResult<DataSet> {
    let path = path.as_ref();
    let excel_err = |source| PipelineError::Excel {
        path: path.to_path_buf(),
        source,
    };
    let source_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut workbook = open_workbook_auto(path).map_err(excel_err)?;
    let sheet_names = workbook.sheet_names().to_vec();
    let sheet = match &opts.sheet {
        SheetSelection::Index(idx) => sheet_names.get(*idx).cloned().ok_or_else(|| {
            PipelineError::config(format!(
                "table '{source_name}': sheet index {idx} out of range (sheets={sheet_names:?})"
            ))
        })?,
        SheetSelection::Name(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(PipelineError::config(format!(
                    "table '{source_name}': sheet '{name}' not found (sheets={sheet_names:?})"
                )));
            }
            name.clone()
        }
    };

    let range = workbook.worksheet_range(&sheet).map_err(excel_err)?;
    let grid: Vec<Vec<RawCell>> = range
        .rows()
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    build_dataset(&source_name, grid, opts.header, opts.numbers)
}

fn convert_cell(c: &Data) -> RawCell {
    match c {
        Data::Empty => RawCell::Empty,
        Data::String(s) if s.is_empty() => RawCell::Empty,
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Int(i) => RawCell::Int(*i),
        Data::Float(f) => RawCell::Float(*f),
        Data::Bool(b) => RawCell::Bool(*b),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(RawCell::DateTime)
            .unwrap_or_else(|| RawCell::Float(dt.as_f64())),
        Data::DateTimeIso(s) => parse_iso(s).map_or_else(|| RawCell::Text(s.clone()), RawCell::DateTime),
        Data::DurationIso(s) => RawCell::Text(s.clone()),
        Data::Error(e) => RawCell::Text(e.to_string()),
    }
}

fn parse_iso(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
