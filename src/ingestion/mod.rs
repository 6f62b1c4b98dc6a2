//! Input discovery and ingestion.
//!
//! Most callers should use [`discover_inputs`] to select files from a directory and
//! [`ingest_input`] (from [`unified`]) to read each one into an in-memory
//! [`crate::types::DataSet`].
//!
//! Format-specific functions are also available under:
//! - [`csv`]
//! - `excel` (feature `excel`)

pub mod csv;
pub mod discovery;
#[cfg(feature = "excel")]
pub mod excel;
mod infer;
pub mod unified;

pub use discovery::discover_inputs;
pub use unified::{ingest_input, IngestionFormat, InputFile};
