//! SQL execution over a single table.
//!
//! Each table is converted to a Polars `DataFrame`, registered under one relation name in a
//! fresh `polars-sql` context, and the query result is converted back into a [`DataSet`]. No
//! other table is visible to the query.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::{
    AnyValue, Column, DataFrame, DataType as PlDataType, IntoLazy, NamedFrom, PlSmallStr, PolarsError,
    PolarsResult, Series, TimeUnit,
};
use polars_sql::SQLContext;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{widen_f32, DataSet, DataType, Field, Schema, Value};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Runs one SQL query against tables bound as a single named relation.
#[derive(Debug, Clone)]
pub struct QueryRunner {
    sql: String,
    relation: String,
}

impl QueryRunner {
    /// `relation` is the table name the query refers to (for example `df`).
    pub fn new(sql: impl Into<String>, relation: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            relation: relation.into(),
        }
    }

    /// Execute the query with `table` bound as the relation; `source` names the table in errors.
    pub fn run(&self, table: &DataSet, source: &str) -> PipelineResult<DataSet> {
        let query_err = |e: PolarsError| PipelineError::Query {
            table: source.to_string(),
            message: e.to_string(),
        };

        let df = to_dataframe(table).map_err(query_err)?;
        let mut ctx = SQLContext::new();
        ctx.register(&self.relation, df.lazy());
        let out = ctx
            .execute(&self.sql)
            .and_then(|lf| lf.collect())
            .map_err(query_err)?;
        from_dataframe(&out).map_err(query_err)
    }
}

/// Convert a [`DataSet`] into a Polars `DataFrame`, keeping declared integer/float widths.
pub fn to_dataframe(table: &DataSet) -> PolarsResult<DataFrame> {
    let mut columns = Vec::with_capacity(table.column_count());
    for (idx, field) in table.schema.fields.iter().enumerate() {
        let values = table.rows.iter().map(|row| &row[idx]);
        columns.push(Column::from(to_series(field, values)?));
    }
    DataFrame::new_infer_height(columns)
}

fn to_series<'a>(field: &Field, values: impl Iterator<Item = &'a Value>) -> PolarsResult<Series> {
    let name = PlSmallStr::from(field.name.as_str());
    let dt = field.data_type;

    let series = if dt.is_signed_int() {
        let v: Vec<Option<i64>> = values
            .map(|v| match v {
                Value::Int64(i) => Some(*i),
                _ => None,
            })
            .collect();
        Series::new(name, v)
    } else if dt.is_unsigned_int() {
        let v: Vec<Option<u64>> = values
            .map(|v| match v {
                Value::UInt64(u) => Some(*u),
                _ => None,
            })
            .collect();
        Series::new(name, v)
    } else if dt.is_float() {
        let v: Vec<Option<f64>> = values
            .map(|v| match v {
                Value::Float64(f) => Some(*f),
                _ => None,
            })
            .collect();
        Series::new(name, v)
    } else {
        match dt {
            DataType::Bool => {
                let v: Vec<Option<bool>> = values
                    .map(|v| match v {
                        Value::Bool(b) => Some(*b),
                        _ => None,
                    })
                    .collect();
                Series::new(name, v)
            }
            DataType::Date => {
                let v: Vec<Option<i32>> = values
                    .map(|v| match v {
                        Value::Date(d) => Some(d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
                        _ => None,
                    })
                    .collect();
                Series::new(name, v)
            }
            DataType::Datetime => {
                let v: Vec<Option<i64>> = values
                    .map(|v| match v {
                        Value::Datetime(dt) => Some(dt.and_utc().timestamp_micros()),
                        _ => None,
                    })
                    .collect();
                Series::new(name, v)
            }
            _ => {
                let v: Vec<Option<String>> = values
                    .map(|v| match v {
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect();
                Series::new(name, v)
            }
        }
    };

    match polars_type(dt) {
        Some(target) if series.dtype() != &target => series.cast(&target),
        _ => Ok(series),
    }
}

fn polars_type(dt: DataType) -> Option<PlDataType> {
    let t = match dt {
        DataType::Int8 => PlDataType::Int8,
        DataType::Int16 => PlDataType::Int16,
        DataType::Int32 => PlDataType::Int32,
        DataType::UInt8 => PlDataType::UInt8,
        DataType::UInt16 => PlDataType::UInt16,
        DataType::UInt32 => PlDataType::UInt32,
        DataType::Float32 => PlDataType::Float32,
        DataType::Date => PlDataType::Date,
        DataType::Datetime => PlDataType::Datetime(TimeUnit::Microseconds, None),
        _ => return None,
    };
    Some(t)
}

fn logical_type(dt: &PlDataType) -> Option<DataType> {
    let t = match dt {
        PlDataType::Int8 => DataType::Int8,
        PlDataType::Int16 => DataType::Int16,
        PlDataType::Int32 => DataType::Int32,
        PlDataType::Int64 => DataType::Int64,
        PlDataType::UInt8 => DataType::UInt8,
        PlDataType::UInt16 => DataType::UInt16,
        PlDataType::UInt32 => DataType::UInt32,
        PlDataType::UInt64 => DataType::UInt64,
        PlDataType::Float32 => DataType::Float32,
        PlDataType::Float64 => DataType::Float64,
        PlDataType::Boolean => DataType::Bool,
        PlDataType::String => DataType::Utf8,
        PlDataType::Date => DataType::Date,
        PlDataType::Datetime(_, _) => DataType::Datetime,
        _ => return None,
    };
    Some(t)
}

/// Convert a Polars `DataFrame` back into a [`DataSet`].
///
/// Column types without a [`DataType`] counterpart (durations, lists, decimals, ...) are
/// rendered as text.
pub fn from_dataframe(df: &DataFrame) -> PolarsResult<DataSet> {
    let height = df.height();
    let names: Vec<String> = df.get_column_names().iter().map(|n| n.to_string()).collect();

    let mut fields = Vec::with_capacity(names.len());
    let mut rows: Vec<Vec<Value>> = (0..height).map(|_| Vec::with_capacity(names.len())).collect();
    for name in names {
        let series = df.column(&name)?.as_materialized_series();
        let (data_type, series) = match logical_type(series.dtype()) {
            Some(dt) => (dt, series.clone()),
            None => (DataType::Utf8, series.cast(&PlDataType::String)?),
        };
        for (row_idx, row) in rows.iter_mut().enumerate() {
            row.push(any_to_value(series.get(row_idx)?));
        }
        fields.push(Field::new(name, data_type));
    }

    Ok(DataSet::new(Schema::new(fields), rows))
}

fn any_to_value(av: AnyValue<'_>) -> Value {
    match av {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int8(v) => Value::Int64(v.into()),
        AnyValue::Int16(v) => Value::Int64(v.into()),
        AnyValue::Int32(v) => Value::Int64(v.into()),
        AnyValue::Int64(v) => Value::Int64(v),
        AnyValue::UInt8(v) => Value::UInt64(v.into()),
        AnyValue::UInt16(v) => Value::UInt64(v.into()),
        AnyValue::UInt32(v) => Value::UInt64(v.into()),
        AnyValue::UInt64(v) => Value::UInt64(v),
        AnyValue::Float32(v) => Value::Float64(widen_f32(v)),
        AnyValue::Float64(v) => Value::Float64(v),
        AnyValue::String(s) => Value::Utf8(s.to_string()),
        AnyValue::StringOwned(s) => Value::Utf8(s.to_string()),
        AnyValue::Date(days) => date_from_epoch_days(days).map_or(Value::Null, Value::Date),
        AnyValue::Datetime(v, unit, _) => datetime_from_epoch(v, unit).map_or(Value::Null, Value::Datetime),
        other => Value::Utf8(other.to_string()),
    }
}

fn date_from_epoch_days(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

fn datetime_from_epoch(v: i64, unit: TimeUnit) -> Option<NaiveDateTime> {
    let dt = match unit {
        TimeUnit::Nanoseconds => Some(DateTime::from_timestamp_nanos(v)),
        TimeUnit::Microseconds => DateTime::from_timestamp_micros(v),
        TimeUnit::Milliseconds => DateTime::from_timestamp_millis(v),
    };
    dt.map(|d| d.naive_utc())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{from_dataframe, to_dataframe, QueryRunner};
    use crate::error::PipelineError;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn table() -> DataSet {
        let d = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        DataSet::new(
            Schema::new(vec![
                Field::new("id", DataType::Int32),
                Field::new("amount", DataType::Float64),
                Field::new("name", DataType::Utf8),
                Field::new("day", DataType::Date),
                Field::new("at", DataType::Datetime),
            ]),
            vec![
                vec![
                    Value::Int64(1),
                    Value::Float64(100.0),
                    Value::Utf8("a".to_string()),
                    Value::Date(d),
                    Value::Datetime(d.and_hms_opt(13, 45, 0).unwrap()),
                ],
                vec![
                    Value::Int64(2),
                    Value::Float64(50.0),
                    Value::Null,
                    Value::Null,
                    Value::Null,
                ],
            ],
        )
    }

    #[test]
    fn dataframe_conversion_preserves_types_and_values() {
        let ds = table();
        let back = from_dataframe(&to_dataframe(&ds).unwrap()).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn float32_columns_round_trip_without_extra_digits() {
        let ds = DataSet::new(
            Schema::new(vec![Field::new("ratio", DataType::Float32)]),
            vec![vec![Value::Float64(0.1)], vec![Value::Float64(2.5)]],
        );
        let out = QueryRunner::new("SELECT * FROM df", "df").run(&ds, "A.csv").unwrap();

        assert_eq!(out.schema.fields[0].data_type, DataType::Float32);
        assert_eq!(out.rows[0][0], Value::Float64(0.1));
        assert_eq!(out.rows[0][0].to_string(), "0.1");
        assert_eq!(out.rows[1][0], Value::Float64(2.5));
    }

    #[test]
    fn filters_rows_with_where_clause() {
        let runner = QueryRunner::new("SELECT id, amount FROM df WHERE amount > 60", "df");
        let out = runner.run(&table(), "A.csv").unwrap();

        assert_eq!(out.schema.field_names().collect::<Vec<_>>(), vec!["id", "amount"]);
        assert_eq!(out.rows, vec![vec![Value::Int64(1), Value::Float64(100.0)]]);
    }

    #[test]
    fn aggregates_and_orders() {
        let runner = QueryRunner::new(
            "SELECT COUNT(*) AS n, SUM(amount) AS total FROM df",
            "df",
        );
        let out = runner.run(&table(), "A.csv").unwrap();
        assert_eq!(out.row_count(), 1);
        let total_idx = out.schema.index_of("total").unwrap();
        assert_eq!(out.rows[0][total_idx], Value::Float64(150.0));
    }

    #[test]
    fn unknown_column_is_a_query_error_naming_the_table() {
        let runner = QueryRunner::new("SELECT nope FROM df", "df");
        let err = runner.run(&table(), "B.xlsx").unwrap_err();
        assert!(matches!(err, PipelineError::Query { .. }));
        assert!(err.to_string().contains("table 'B.xlsx'"));
    }

    #[test]
    fn malformed_sql_is_a_query_error() {
        let runner = QueryRunner::new("SELEC * FROM df", "df");
        assert!(matches!(
            runner.run(&table(), "A.csv"),
            Err(PipelineError::Query { .. })
        ));
    }

    #[test]
    fn only_the_bound_relation_is_visible() {
        let runner = QueryRunner::new("SELECT * FROM other", "df");
        assert!(runner.run(&table(), "A.csv").is_err());
    }
}
