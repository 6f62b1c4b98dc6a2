//! CSV ingestion implementation.

use std::path::Path;

use crate::config::CsvReadOptions;
use crate::error::{PipelineError, PipelineResult};
use crate::types::DataSet;

use super::infer::{build_dataset, RawCell};

/// Ingest a CSV file into an in-memory [`DataSet`].
///
/// Rules:
///
/// - The header row (if any) is chosen by `opts.header`; rows above it are ignored.
/// - Rows may have different lengths; missing trailing cells become nulls.
/// - Column types are inferred from the cells (see [`super::infer`]).
/// - Bytes that are not valid UTF-8 are replaced rather than rejected.
pub fn ingest_csv_from_path(path: impl AsRef<Path>, opts: &CsvReadOptions) -> PipelineResult<DataSet> {
    let path = path.as_ref();
    let mut rdr = reader_builder(opts)
        .from_path(path)
        .map_err(|source| PipelineError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
    let source = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    ingest_csv_from_reader(&mut rdr, opts, &source)
}

/// Build a `csv` reader configured for `opts`; headers are handled by this crate, not the reader.
pub fn reader_builder(opts: &CsvReadOptions) -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .flexible(true)
        .delimiter(opts.delimiter);
    builder
}

/// Ingest CSV data from an existing CSV reader.
///
/// `source` identifies the table in error messages.
pub fn ingest_csv_from_reader<R: std::io::Read>(
    rdr: &mut csv::Reader<R>,
    opts: &CsvReadOptions,
    source: &str,
) -> PipelineResult<DataSet> {
    let mut grid: Vec<Vec<RawCell>> = Vec::new();
    for result in rdr.byte_records() {
        let record = result.map_err(|source_err| PipelineError::Csv {
            path: source.into(),
            source: source_err,
        })?;

        let mut row: Vec<RawCell> = Vec::with_capacity(record.len());
        for field in record.iter() {
            let mut text = String::from_utf8_lossy(field).into_owned();
            if grid.is_empty() && row.is_empty() {
                if let Some(stripped) = text.strip_prefix('\u{feff}') {
                    text = stripped.to_string();
                }
            }
            row.push(if text.is_empty() {
                RawCell::Empty
            } else {
                RawCell::Text(text)
            });
        }
        grid.push(row);
    }

    build_dataset(source, grid, opts.header, opts.numbers)
}
