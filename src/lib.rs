//! `tabular-union` runs one SQL query over every CSV and spreadsheet file in a directory and
//! writes the union of the results, each row tagged with the file it came from.
//!
//! A run is described by a [`config::RunConfig`] (normally loaded from `config.toml`) and goes
//! through these stages, strictly in order:
//!
//! 1. **Discovery**: [`ingestion::discover_inputs`] selects `.xlsx`/`.xlsm`/`.xls`/`.xlsb`/`.ods`
//!    files (feature `excel`) and then `.csv` files, each group sorted by name.
//! 2. **Ingestion**: [`ingestion::ingest_input`] reads one file into a [`types::DataSet`], with
//!    column types inferred from the raw cells.
//! 3. **Coercion**: [`processing::SchemaCoercer`] applies the declared column types, optionally
//!    keeping a copy of each original column.
//! 4. **Query**: [`processing::QueryRunner`] runs the configured SQL against the table alone.
//! 5. **Union**: [`processing::ProvenanceUnioner`] tags each result with its file name and
//!    concatenates them; declared date columns are then normalized to calendar dates.
//! 6. **Output**: [`output::OutputWriter`] writes `output/dataframe.csv` (or `.xlsx`), falling
//!    back once to `dataframe(<n>).<ext>` when the primary file cannot be written.
//!
//! The first error in any stage aborts the run and nothing is written.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tabular_union::config::RunConfig;
//! use tabular_union::observability::StdErrObserver;
//! use tabular_union::pipeline::Pipeline;
//!
//! # fn main() -> Result<(), tabular_union::PipelineError> {
//! let config = RunConfig::from_toml_str(
//!     r#"
//!     [columns]
//!     amount = "float64"
//!
//!     [query]
//!     sql = "SELECT * FROM df WHERE amount > 60"
//!     "#,
//! )?;
//! let report = Pipeline::new(config)
//!     .with_root("data")
//!     .with_observer(Arc::new(StdErrObserver))
//!     .run()?;
//! println!("wrote {} rows to {}", report.rows, report.output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: typed configuration and its TOML loader
//! - [`ingestion`]: input discovery and format-specific readers
//! - [`processing`]: coercion, query and union stages
//! - [`output`]: output writers and collision-safe naming
//! - [`pipeline`]: the orchestrated run
//! - [`observability`]: progress events, failures and alerts
//! - [`types`]: in-memory dataset types
//! - [`error`]: the error type shared by every stage

pub mod config;
pub mod error;
pub mod ingestion;
pub mod observability;
pub mod output;
pub mod pipeline;
pub mod processing;
pub mod types;

pub use error::{PipelineError, PipelineResult};
