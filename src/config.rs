//! Typed run configuration.
//!
//! A run is fully described by a [`RunConfig`]: the column [`SchemaSpec`], the [`QuerySpec`] and
//! the [`RunOptions`]. It is normally loaded from a TOML document:
//!
//! ```toml
//! [columns]
//! amount = "float64"
//! booked = { format = "%d/%m/%Y" }
//!
//! [query]
//! sql = "SELECT * FROM df WHERE amount > 60"
//!
//! [options]
//! path_column = "Source File"
//! print_file = "csv"
//! exclude = ["draft"]
//! ```
//!
//! Every option has a default, and [`RunConfig::validate`] runs once at load time so the pipeline
//! never has to check for missing keys.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::{PipelineError, PipelineResult};
use crate::types::DataType;

/// Fully resolved configuration for one run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RunConfig {
    /// Declared column types, applied to every input table.
    #[serde(default, alias = "columns")]
    pub schema: SchemaSpec,
    /// The query executed against each table.
    pub query: QuerySpec,
    /// Parsing, naming and output options.
    #[serde(default)]
    pub options: RunOptions,
}

impl RunConfig {
    /// Parse and validate a TOML configuration document.
    pub fn from_toml_str(s: &str) -> PipelineResult<Self> {
        let cfg: Self = toml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("cannot read config file '{}': {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.query.sql.trim().is_empty() {
            return Err(PipelineError::config("query.sql must not be empty"));
        }
        if self.query.table_name.trim().is_empty() {
            return Err(PipelineError::config("query.table_name must not be empty"));
        }

        let opts = &self.options;
        if opts.path_column.is_empty() {
            return Err(PipelineError::config("options.path_column must not be empty"));
        }
        if opts.backup_modified_columns && opts.backup_prefix.is_empty() {
            return Err(PipelineError::config(
                "options.backup_prefix must not be empty when backup_modified_columns is enabled",
            ));
        }
        if opts.float_thousands_delimiter == Some(opts.float_decimal_point_delimiter) {
            return Err(PipelineError::config(format!(
                "float_thousands_delimiter and float_decimal_point_delimiter are both '{}'",
                opts.float_decimal_point_delimiter
            )));
        }
        opts.csv_delimiter()?;
        if opts.print_file == OutputFormat::Xlsx && !cfg!(feature = "excel") {
            return Err(PipelineError::config(
                "xlsx output not enabled (enable cargo feature 'excel')",
            ));
        }

        for (column, desc) in self.schema.iter() {
            if let TypeDescriptor::Temporal { format } = desc {
                if format.trim().is_empty() {
                    return Err(PipelineError::config(format!(
                        "column '{column}': temporal format must not be empty"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Target type for one declared column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub enum TypeDescriptor {
    /// Cast to a numeric, text or boolean type.
    Primitive(DataType),
    /// Parse as a date-time using a strftime-style format.
    Temporal { format: String },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDescriptor {
    Tag(String),
    Temporal { format: String },
}

impl TryFrom<RawDescriptor> for TypeDescriptor {
    type Error = String;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        match raw {
            RawDescriptor::Tag(tag) => parse_type_tag(&tag).map(Self::Primitive),
            RawDescriptor::Temporal { format } => Ok(Self::Temporal { format }),
        }
    }
}

/// Parse a primitive type tag (`float64`, `int32`, `str`, ...).
pub fn parse_type_tag(tag: &str) -> Result<DataType, String> {
    let dt = match tag.trim().to_ascii_lowercase().as_str() {
        "int8" => DataType::Int8,
        "int16" => DataType::Int16,
        "int32" => DataType::Int32,
        "int64" | "int" => DataType::Int64,
        "uint8" => DataType::UInt8,
        "uint16" => DataType::UInt16,
        "uint32" => DataType::UInt32,
        "uint64" | "uint" => DataType::UInt64,
        "float32" => DataType::Float32,
        "float64" | "float" | "double" => DataType::Float64,
        "bool" | "boolean" => DataType::Bool,
        "str" | "string" | "object" | "utf8" => DataType::Utf8,
        other => return Err(format!("unknown column type '{other}'")),
    };
    Ok(dt)
}

/// Ordered mapping of column name to [`TypeDescriptor`].
///
/// Entries keep the order in which they were declared; coercion walks them in that order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "toml::Table")]
pub struct SchemaSpec {
    entries: Vec<(String, TypeDescriptor)>,
}

impl SchemaSpec {
    pub fn new(entries: Vec<(String, TypeDescriptor)>) -> Self {
        Self { entries }
    }

    /// Iterate `(column, descriptor)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeDescriptor)> {
        self.entries.iter().map(|(c, d)| (c.as_str(), d))
    }

    /// Iterate the names of temporal columns in declaration order.
    pub fn temporal_columns(&self) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(|(_, d)| matches!(d, TypeDescriptor::Temporal { .. }))
            .map(|(c, _)| c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<toml::Table> for SchemaSpec {
    type Error = String;

    fn try_from(table: toml::Table) -> Result<Self, Self::Error> {
        let mut entries = Vec::with_capacity(table.len());
        for (column, value) in table {
            let desc: TypeDescriptor = value
                .try_into()
                .map_err(|e| format!("column '{column}': {e}"))?;
            entries.push((column, desc));
        }
        Ok(Self { entries })
    }
}

/// The relational query run against every table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuerySpec {
    /// SQL text.
    pub sql: String,
    /// Name under which each table is visible to the query.
    #[serde(default = "default_table_name")]
    pub table_name: String,
}

fn default_table_name() -> String {
    "df".to_string()
}

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum OutputFormat {
    /// Delimited text.
    #[default]
    Csv,
    /// Office Open XML workbook.
    Xlsx,
}

impl OutputFormat {
    /// File extension without the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xlsx => "xlsx",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            other => Err(format!("unsupported output format '{other}' (expected csv or xlsx)")),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Which worksheet to read from a workbook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SheetSelection {
    /// Zero-based sheet position.
    Index(usize),
    /// Sheet name.
    Name(String),
}

impl Default for SheetSelection {
    fn default() -> Self {
        Self::Index(0)
    }
}

/// Decimal and thousands conventions for numeric text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumberFormat {
    pub decimal: char,
    pub thousands: Option<char>,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            decimal: '.',
            thousands: None,
        }
    }
}

/// Options for reading delimited-text files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvReadOptions {
    pub delimiter: u8,
    /// Zero-based header row; `None` names columns `0`, `1`, ...
    pub header: Option<usize>,
    pub numbers: NumberFormat,
}

impl Default for CsvReadOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            header: Some(0),
            numbers: NumberFormat::default(),
        }
    }
}

/// Options for reading spreadsheet files.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExcelReadOptions {
    pub sheet: SheetSelection,
    /// Zero-based header row; `None` names columns `0`, `1`, ...
    pub header: Option<usize>,
    pub numbers: NumberFormat,
}

/// Parsing, naming and output options.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    pub float_thousands_delimiter: Option<char>,
    pub float_decimal_point_delimiter: char,
    /// Keep a copy of every coerced column under `backup_prefix + name`.
    pub backup_modified_columns: bool,
    pub backup_prefix: String,
    /// Name of the provenance column added to every query result.
    pub path_column: String,
    pub print_file: OutputFormat,
    #[serde(deserialize_with = "deserialize_header_row")]
    pub default_xlsx_header: Option<usize>,
    pub default_sheet_name: SheetSelection,
    #[serde(deserialize_with = "deserialize_header_row")]
    pub default_csv_header: Option<usize>,
    pub default_csv_delimiter: char,
    /// Files whose name contains any of these substrings are skipped.
    pub exclude: Vec<String>,
    /// Directory (relative to the working directory) receiving the output file.
    pub output_dir: PathBuf,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            float_thousands_delimiter: None,
            float_decimal_point_delimiter: '.',
            backup_modified_columns: false,
            backup_prefix: "(old)".to_string(),
            path_column: "Source File".to_string(),
            print_file: OutputFormat::Csv,
            default_xlsx_header: Some(0),
            default_sheet_name: SheetSelection::default(),
            default_csv_header: Some(0),
            default_csv_delimiter: ',',
            exclude: Vec::new(),
            output_dir: PathBuf::from("output"),
        }
    }
}

impl RunOptions {
    pub fn number_format(&self) -> NumberFormat {
        NumberFormat {
            decimal: self.float_decimal_point_delimiter,
            thousands: self.float_thousands_delimiter,
        }
    }

    /// CSV field delimiter as a byte.
    ///
    /// Non-ASCII delimiters are rejected because the CSV reader splits on single bytes.
    pub fn csv_delimiter(&self) -> PipelineResult<u8> {
        u8::try_from(self.default_csv_delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| {
                PipelineError::config(format!(
                    "default_csv_delimiter '{}' must be a single ASCII character",
                    self.default_csv_delimiter
                ))
            })
    }

    pub fn csv_read_options(&self) -> PipelineResult<CsvReadOptions> {
        Ok(CsvReadOptions {
            delimiter: self.csv_delimiter()?,
            header: self.default_csv_header,
            numbers: self.number_format(),
        })
    }

    pub fn excel_read_options(&self) -> ExcelReadOptions {
        ExcelReadOptions {
            sheet: self.default_sheet_name.clone(),
            header: self.default_xlsx_header,
            numbers: self.number_format(),
        }
    }
}

/// Accepts a row index, `true` (first row) or `false` (no header row).
fn deserialize_header_row<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum HeaderRow {
        Row(usize),
        Flag(bool),
    }

    Ok(match HeaderRow::deserialize(deserializer)? {
        HeaderRow::Row(n) => Some(n),
        HeaderRow::Flag(true) => Some(0),
        HeaderRow::Flag(false) => None,
    })
}
