//! Writing the unioned table to disk.
//!
//! [`OutputWriter::write`] first tries `dataframe.<ext>` in the output directory. If that fails
//! with an I/O-class error (see [`crate::PipelineError::is_io`]), it writes exactly once more to
//! `dataframe(<n>).<ext>`, where `n` is one past the highest suffix already present. Any other
//! failure, or a failure of the second attempt, is returned unchanged.
//!
//! Each attempt writes a hidden staging file and renames it over the target, so a failed
//! attempt never leaves a truncated `dataframe.<ext>` behind.

use std::path::{Path, PathBuf};

use crate::config::{OutputFormat, RunOptions};
use crate::error::{PipelineError, PipelineResult};
use crate::types::DataSet;

pub mod csv;
#[cfg(feature = "excel")]
pub mod excel;
pub mod naming;

pub use naming::{next_fallback_path, parse_suffix, OUTPUT_BASE_NAME};

/// Where and how the final table is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputWriter {
    dir: PathBuf,
    format: OutputFormat,
    delimiter: u8,
}

/// Result of a successful [`OutputWriter::write`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenOutput {
    /// File that now holds the table.
    pub path: PathBuf,
    /// `true` when the primary name failed and a numbered name was used.
    pub fallback: bool,
    /// Message of the primary failure, when the fallback was used.
    pub primary_error: Option<String>,
}

impl OutputWriter {
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat, delimiter: u8) -> Self {
        Self {
            dir: dir.into(),
            format,
            delimiter,
        }
    }

    /// Writer for `root/<output_dir>` using the configured format and CSV delimiter.
    pub fn from_options(root: &Path, options: &RunOptions) -> PipelineResult<Self> {
        Ok(Self::new(
            root.join(&options.output_dir),
            options.print_file,
            options.csv_delimiter()?,
        ))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<dir>/dataframe.<ext>`
    pub fn primary_path(&self) -> PathBuf {
        self.dir.join(naming::primary_file_name(self.format.extension()))
    }

    /// Write `table`, falling back to a numbered name once on an I/O-class failure.
    pub fn write(&self, table: &DataSet) -> PipelineResult<WrittenOutput> {
        self.write_with(table, |path, t| self.write_to(path, t))
    }

    fn write_with<F>(&self, table: &DataSet, mut write: F) -> PipelineResult<WrittenOutput>
    where
        F: FnMut(&Path, &DataSet) -> PipelineResult<()>,
    {
        std::fs::create_dir_all(&self.dir).map_err(|e| PipelineError::io_at(&self.dir, e))?;

        let primary = self.primary_path();
        match commit(&primary, table, &mut write) {
            Ok(()) => Ok(WrittenOutput {
                path: primary,
                fallback: false,
                primary_error: None,
            }),
            Err(e) if e.is_io() => {
                let fallback = next_fallback_path(&self.dir, self.format.extension())?;
                commit(&fallback, table, &mut write)?;
                Ok(WrittenOutput {
                    path: fallback,
                    fallback: true,
                    primary_error: Some(e.to_string()),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn write_to(&self, path: &Path, table: &DataSet) -> PipelineResult<()> {
        match self.format {
            OutputFormat::Csv => self::csv::write_csv(path, table, self.delimiter),
            OutputFormat::Xlsx => write_xlsx_dispatch(path, table),
        }
    }
}

/// Write to a staging file next to `path`, then rename it into place. A failed attempt removes
/// the staging file, so no partial artifact is left behind.
fn commit<F>(path: &Path, table: &DataSet, write: &mut F) -> PipelineResult<()>
where
    F: FnMut(&Path, &DataSet) -> PipelineResult<()>,
{
    let staging = naming::staging_path(path);
    let result = write(&staging, table)
        .and_then(|()| std::fs::rename(&staging, path).map_err(|e| PipelineError::io_at(path, e)));
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

#[cfg(feature = "excel")]
fn write_xlsx_dispatch(path: &Path, table: &DataSet) -> PipelineResult<()> {
    excel::write_xlsx(path, table)
}

#[cfg(not(feature = "excel"))]
fn write_xlsx_dispatch(_path: &Path, _table: &DataSet) -> PipelineResult<()> {
    Err(PipelineError::config(
        "xlsx output not enabled (enable cargo feature 'excel')",
    ))
}
