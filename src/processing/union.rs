//! Provenance tagging, union of per-table results, and post-union date normalization.

use crate::config::SchemaSpec;
use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

use super::coerce::to_date;

/// Insert a text column `path_column` holding `source` on every row, as column 0.
///
/// Fails with [`PipelineError::Schema`] if the result already has a column with that name.
pub fn tag_provenance(result: &mut DataSet, path_column: &str, source: &str) -> PipelineResult<()> {
    if result.schema.contains(path_column) {
        return Err(PipelineError::schema(format!(
            "table path column name '{path_column}' is duplicated in the query result of '{source}'; \
             change options.path_column"
        )));
    }
    let values = vec![Value::Utf8(source.to_string()); result.row_count()];
    result.insert_column(0, Field::new(path_column, DataType::Utf8), values);
    Ok(())
}

/// Accumulates tagged query results and builds the unioned table.
#[derive(Debug, Clone)]
pub struct ProvenanceUnioner {
    path_column: String,
    tagged: Vec<(String, DataSet)>,
}

impl ProvenanceUnioner {
    pub fn new(path_column: impl Into<String>) -> Self {
        Self {
            path_column: path_column.into(),
            tagged: Vec::new(),
        }
    }

    /// Tag `result` with `source` and keep it for the union.
    pub fn push(&mut self, source: &str, mut result: DataSet) -> PipelineResult<()> {
        tag_provenance(&mut result, &self.path_column, source)?;
        self.tagged.push((source.to_string(), result));
        Ok(())
    }

    /// Number of tables pushed so far.
    pub fn len(&self) -> usize {
        self.tagged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tagged.is_empty()
    }

    /// Concatenate everything pushed so far, in push order.
    pub fn finish(self) -> PipelineResult<DataSet> {
        union_tables(self.tagged)
    }
}

/// Row-wise concatenation of `(source, table)` pairs by column name.
///
/// - Column order is the first table's order.
/// - Every table must have exactly the first table's column set; columns may appear in a
///   different order and are realigned.
/// - When a column's type differs between tables, it is widened (see [`common_type`]). Tables
///   where a column is entirely null do not take part in the widening.
pub fn union_tables(tables: Vec<(String, DataSet)>) -> PipelineResult<DataSet> {
    let Some((_, first)) = tables.first() else {
        return Err(PipelineError::config("no input tables to union"));
    };
    let names: Vec<String> = first.schema.field_names().map(str::to_string).collect();

    let mut projections: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
    for (source, table) in &tables {
        projections.push(project(&names, table, source)?);
    }

    let mut fields = Vec::with_capacity(names.len());
    for (out_idx, name) in names.iter().enumerate() {
        let mut widened: Option<DataType> = None;
        for ((_, table), proj) in tables.iter().zip(&projections) {
            let idx = proj[out_idx];
            if table.rows.iter().all(|row| row[idx].is_null()) {
                continue;
            }
            let dt = table.schema.fields[idx].data_type;
            widened = Some(widened.map_or(dt, |w| common_type(w, dt)));
        }
        let dt = widened.unwrap_or(first.schema.fields[out_idx].data_type);
        fields.push(Field::new(name.clone(), dt));
    }

    let total_rows = tables.iter().map(|(_, t)| t.row_count()).sum();
    let mut rows: Vec<Vec<Value>> = Vec::with_capacity(total_rows);
    for ((_, table), proj) in tables.into_iter().zip(&projections) {
        for mut row in table.rows {
            let out: Vec<Value> = proj
                .iter()
                .zip(&fields)
                .map(|(&idx, field)| widen_value(std::mem::replace(&mut row[idx], Value::Null), field.data_type))
                .collect();
            rows.push(out);
        }
    }

    Ok(DataSet::new(Schema::new(fields), rows))
}

fn project(names: &[String], table: &DataSet, source: &str) -> PipelineResult<Vec<usize>> {
    let missing: Vec<&str> = names
        .iter()
        .map(String::as_str)
        .filter(|n| !table.schema.contains(n))
        .collect();
    let extra: Vec<&str> = table
        .schema
        .field_names()
        .filter(|n| !names.iter().any(|m| m == n))
        .collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(PipelineError::schema(format!(
            "cannot union table '{source}': columns differ from the first table \
             (missing={missing:?}, unexpected={extra:?})"
        )));
    }
    Ok(names
        .iter()
        .filter_map(|n| table.schema.index_of(n))
        .collect())
}

/// Smallest type both `a` and `b` convert to without losing values.
///
/// Mixed signed/unsigned integers become `int64` unless a side is `uint64`, in which case they
/// become `float64`; integers and floats become `float64`; date and date-time become date-time;
/// anything else becomes text.
pub fn common_type(a: DataType, b: DataType) -> DataType {
    if a == b {
        return a;
    }
    match (a, b) {
        (x, y) if x.is_signed_int() && y.is_signed_int() => DataType::Int64,
        (x, y) if x.is_unsigned_int() && y.is_unsigned_int() => DataType::UInt64,
        (x, y) if x.is_numeric() && y.is_numeric() => {
            let has_u64 = x == DataType::UInt64 || y == DataType::UInt64;
            if x.is_float() || y.is_float() || has_u64 {
                DataType::Float64
            } else {
                DataType::Int64
            }
        }
        (x, y) if x.is_temporal() && y.is_temporal() => DataType::Datetime,
        _ => DataType::Utf8,
    }
}

fn widen_value(value: Value, target: DataType) -> Value {
    match (value, target) {
        (Value::Null, _) => Value::Null,
        (Value::UInt64(u), t) if t.is_signed_int() => {
            i64::try_from(u).map_or(Value::Float64(u as f64), Value::Int64)
        }
        (Value::Int64(i), t) if t.is_float() => Value::Float64(i as f64),
        (Value::UInt64(u), t) if t.is_float() => Value::Float64(u as f64),
        (Value::Date(d), DataType::Datetime) => d.and_hms_opt(0, 0, 0).map_or(Value::Null, Value::Datetime),
        (Value::Utf8(s), DataType::Utf8) => Value::Utf8(s),
        (other, DataType::Utf8) => Value::Utf8(other.to_string()),
        (other, _) => other,
    }
}

/// Convert every temporal column of `schema` that is present in `table` to a calendar date.
///
/// Columns the query projected away are skipped. Errors name the source file taken from the
/// provenance column (position 0) and the 1-based row of the unioned table.
pub fn normalize_dates(table: &mut DataSet, schema: &SchemaSpec) -> PipelineResult<()> {
    for column in schema.temporal_columns() {
        let Some(idx) = table.schema.index_of(column) else {
            continue;
        };

        let mut values = Vec::with_capacity(table.row_count());
        for (row_idx, row) in table.rows.iter().enumerate() {
            let date = to_date(&row[idx]).map_err(|message| PipelineError::Coercion {
                table: match row.first() {
                    Some(Value::Utf8(s)) => s.clone(),
                    _ => "union".to_string(),
                },
                row: row_idx + 1,
                column: column.to_string(),
                raw: row[idx].to_string(),
                message,
            })?;
            values.push(date.map_or(Value::Null, Value::Date));
        }
        table.replace_column(idx, DataType::Date, values);
    }
    Ok(())
}
