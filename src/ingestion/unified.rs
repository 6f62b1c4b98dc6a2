//! Unified ingestion entrypoint.
//!
//! [`ingest_input`] reads one discovered [`InputFile`] into a [`DataSet`], dispatching on its
//! [`IngestionFormat`] and taking parsing conventions from [`RunOptions`].

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::RunOptions;
use crate::error::PipelineResult;
use crate::types::DataSet;

use super::csv;

/// Supported ingestion formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionFormat {
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Excel,
    /// Comma-separated (or otherwise delimited) values.
    Csv,
}

impl IngestionFormat {
    /// Parse an ingestion format from a file extension (case-insensitive).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Self::Excel),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|s| s.to_str())
            .and_then(Self::from_extension)
    }
}

/// One file selected for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    /// Path to the input file.
    pub path: PathBuf,
    /// Format used to read it.
    pub format: IngestionFormat,
}

impl InputFile {
    pub fn new(path: impl Into<PathBuf>, format: IngestionFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Identity recorded in the provenance column and used in error messages: the file name.
    pub fn source_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// Read `input` into an in-memory table.
pub fn ingest_input(input: &InputFile, options: &RunOptions) -> PipelineResult<DataSet> {
    match input.format {
        IngestionFormat::Csv => csv::ingest_csv_from_path(&input.path, &options.csv_read_options()?),
        IngestionFormat::Excel => ingest_excel_dispatch(&input.path, options),
    }
}

fn ingest_excel_dispatch(path: &Path, options: &RunOptions) -> PipelineResult<DataSet> {
    // Avoid unused warnings when the feature is off.
    let _ = (path, options);

    #[cfg(feature = "excel")]
    {
        super::excel::ingest_excel_from_path(path, &options.excel_read_options())
    }

    #[cfg(not(feature = "excel"))]
    {
        Err(crate::error::PipelineError::config(format!(
            "cannot read '{}': excel ingestion not enabled (enable cargo feature 'excel')",
            path.display()
        )))
    }
}
