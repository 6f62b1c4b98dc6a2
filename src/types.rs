//! Core data model types.
//!
//! Every input file becomes one in-memory [`DataSet`]: an ordered [`Schema`] of uniquely named,
//! typed [`Field`]s plus row-major [`Value`] storage.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// Logical data type for a schema field.
///
/// Integer and float widths are kept so the query engine sees the declared type, even though
/// [`Value`] stores every signed integer as `i64` and every float as `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    /// 64-bit signed integer.
    Int64,
    UInt8,
    UInt16,
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    Float32,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
    /// Calendar date without time of day.
    Date,
    /// Naive date-time (no time zone).
    Datetime,
}

impl DataType {
    pub fn is_signed_int(self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub fn is_unsigned_int(self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_numeric(self) -> bool {
        self.is_signed_int() || self.is_unsigned_int() || self.is_float()
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, Self::Date | Self::Datetime)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Bool => "bool",
            Self::Utf8 => "str",
            Self::Date => "date",
            Self::Datetime => "datetime",
        };
        f.write_str(s)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of fields describing the shape of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns `true` if a field called `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }
}

/// A single typed value in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// Signed integer (any declared width).
    Int64(i64),
    /// Unsigned integer (any declared width).
    UInt64(u64),
    /// Float (any declared width).
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
    /// Calendar date.
    Date(NaiveDate),
    /// Naive date-time.
    Datetime(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value {
    /// Text form used in error messages and when a column is widened to text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Int64(v) => write!(f, "{v}"),
            Self::UInt64(v) => write!(f, "{v}"),
            Self::Float64(v) => f.write_str(&format_float(*v)),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Utf8(s) => f.write_str(s),
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Datetime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Render a float the way tabular tools usually do: integral values keep a trailing `.0`.
pub fn format_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{v:.1}")
    } else {
        v.to_string()
    }
}

/// Widen an `f32` to the `f64` with the same shortest decimal form, so `0.1f32` becomes `0.1`
/// rather than `0.10000000149011612`.
pub fn widen_f32(v: f32) -> f64 {
    v.to_string().parse().unwrap_or(f64::from(v))
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns in the dataset.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Clone the values of column `idx`, top to bottom.
    pub fn column_values(&self, idx: usize) -> Vec<Value> {
        self.rows.iter().map(|row| row[idx].clone()).collect()
    }

    /// Insert a column at position `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the row count or `idx > column_count()`.
    pub fn insert_column(&mut self, idx: usize, field: Field, values: Vec<Value>) {
        assert!(
            values.len() == self.rows.len(),
            "column '{}' has {} values but dataset has {} rows",
            field.name,
            values.len(),
            self.rows.len()
        );
        self.schema.fields.insert(idx, field);
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(idx, value);
        }
    }

    /// Replace the type and values of column `idx`.
    ///
    /// # Panics
    ///
    /// Panics if `values.len()` differs from the row count.
    pub fn replace_column(&mut self, idx: usize, data_type: DataType, values: Vec<Value>) {
        assert!(
            values.len() == self.rows.len(),
            "replacement for column '{}' has {} values but dataset has {} rows",
            self.schema.fields[idx].name,
            values.len(),
            self.rows.len()
        );
        self.schema.fields[idx].data_type = data_type;
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value;
        }
    }
}
