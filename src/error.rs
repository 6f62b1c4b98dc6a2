#[cfg(feature = "excel")]
use std::error::Error as StdError;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error type returned by every stage of a run.
///
/// Any error aborts the run; the only recovery is the single fallback file name the output
/// writer tries when the primary path fails with an I/O-class error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error on a known file or directory.
    #[error("io error on '{}': {source}", .path.display())]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad or missing configuration.
    #[error("config error: {message}")]
    Config { message: String },

    /// A table does not have the shape the configuration expects (missing column, duplicate
    /// provenance column, mismatched union columns, ...).
    #[error("schema error: {message}")]
    Schema { message: String },

    /// A value could not be converted to the declared type.
    #[error(
        "failed to coerce value in table '{table}' at row {row} column '{column}': {message} (raw='{raw}')"
    )]
    Coercion {
        table: String,
        row: usize,
        column: String,
        raw: String,
        message: String,
    },

    /// The relational engine rejected or failed to run the query.
    #[error("query failed on table '{table}': {message}")]
    Query { table: String, message: String },

    /// CSV read/write error.
    #[error("csv error in '{}': {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[cfg(feature = "excel")]
    /// Spreadsheet read error (feature-gated behind `excel`).
    #[error("excel error in '{}': {source}", .path.display())]
    Excel {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[cfg(feature = "excel")]
    /// Spreadsheet write error (feature-gated behind `excel`).
    #[error("xlsx write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// The configuration document is not valid TOML or does not match the expected shape.
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    /// Returns `true` when the failure originates from the file system rather than from the data
    /// or the configuration.
    pub fn is_io(&self) -> bool {
        match self {
            Self::Io(_) | Self::IoAt { .. } => true,
            Self::Csv { source, .. } => matches!(source.kind(), csv::ErrorKind::Io(_)),
            #[cfg(feature = "excel")]
            Self::Excel { source, .. } => error_chain_contains_io(source),
            #[cfg(feature = "excel")]
            Self::Xlsx(err) => matches!(err, rust_xlsxwriter::XlsxError::IoError(_)),
            Self::Config { .. }
            | Self::Schema { .. }
            | Self::Coercion { .. }
            | Self::Query { .. }
            | Self::Toml(_) => false,
        }
    }
}

#[cfg(feature = "excel")]
fn error_chain_contains_io(e: &(dyn StdError + 'static)) -> bool {
    let mut cur: Option<&(dyn StdError + 'static)> = Some(e);
    while let Some(err) = cur {
        if err.is::<std::io::Error>() {
            return true;
        }
        cur = err.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::PipelineError;

    #[test]
    fn io_classification() {
        let io = PipelineError::Io(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked"));
        assert!(io.is_io());
        assert!(!PipelineError::schema("missing column").is_io());
        assert!(!PipelineError::config("bad option").is_io());

        let at = PipelineError::io_at("output/dataframe.csv", std::io::Error::other("denied"));
        assert!(at.is_io());
        assert_eq!(at.to_string(), "io error on 'output/dataframe.csv': denied");
    }

    #[test]
    fn coercion_message_names_table_column_and_value() {
        let err = PipelineError::Coercion {
            table: "A.csv".to_string(),
            row: 3,
            column: "amount".to_string(),
            raw: "abc".to_string(),
            message: "expected float64".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'A.csv'"));
        assert!(msg.contains("column 'amount'"));
        assert!(msg.contains("raw='abc'"));
    }
}
