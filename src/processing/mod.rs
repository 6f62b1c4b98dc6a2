//! The per-table stages of a run and the union that joins them.
//!
//! - [`coerce`]: [`SchemaCoercer`] applies declared column types in place
//! - [`query`]: [`QueryRunner`] runs SQL against one table at a time
//! - [`union`]: [`ProvenanceUnioner`] tags results with their source and concatenates them;
//!   [`normalize_dates`] turns declared date-time columns into calendar dates afterwards
//!
//! ## Example
//!
//! ```rust
//! use tabular_union::config::{SchemaSpec, TypeDescriptor};
//! use tabular_union::processing::{ProvenanceUnioner, QueryRunner, SchemaCoercer};
//! use tabular_union::types::{DataSet, DataType, Field, Schema, Value};
//!
//! # fn main() -> Result<(), tabular_union::PipelineError> {
//! let schema = SchemaSpec::new(vec![(
//!     "amount".to_string(),
//!     TypeDescriptor::Primitive(DataType::Float64),
//! )]);
//! let coercer = SchemaCoercer::new(&schema, None);
//! let runner = QueryRunner::new("SELECT * FROM df WHERE amount > 60", "df");
//! let mut unioner = ProvenanceUnioner::new("Source File");
//!
//! let mut table = DataSet::new(
//!     Schema::new(vec![Field::new("id", DataType::Int64), Field::new("amount", DataType::Int64)]),
//!     vec![
//!         vec![Value::Int64(1), Value::Int64(100)],
//!         vec![Value::Int64(2), Value::Int64(50)],
//!     ],
//! );
//! coercer.apply(&mut table, "A.csv")?;
//! unioner.push("A.csv", runner.run(&table, "A.csv")?)?;
//!
//! let out = unioner.finish()?;
//! assert_eq!(out.row_count(), 1);
//! assert_eq!(out.rows[0][0], Value::Utf8("A.csv".to_string()));
//! # Ok(())
//! # }
//! ```

pub mod coerce;
pub mod query;
pub mod union;

pub use coerce::{cast_value, parse_temporal, SchemaCoercer};
pub use query::{from_dataframe, to_dataframe, QueryRunner};
pub use union::{common_type, normalize_dates, tag_provenance, union_tables, ProvenanceUnioner};
