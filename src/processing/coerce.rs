//! Schema coercion: apply declared column types to one table in place.

use chrono::{NaiveDate, NaiveDateTime};

use crate::config::{SchemaSpec, TypeDescriptor};
use crate::error::{PipelineError, PipelineResult};
use crate::types::{format_float, widen_f32, DataSet, DataType, Field, Value};

/// Applies a [`SchemaSpec`] to tables, optionally keeping a copy of each original column.
#[derive(Debug, Clone, Copy)]
pub struct SchemaCoercer<'a> {
    schema: &'a SchemaSpec,
    backup_prefix: Option<&'a str>,
}

impl<'a> SchemaCoercer<'a> {
    /// `backup_prefix = Some(p)` copies every coerced column to `p + name` before converting it.
    pub fn new(schema: &'a SchemaSpec, backup_prefix: Option<&'a str>) -> Self {
        Self {
            schema,
            backup_prefix,
        }
    }

    /// Coerce `table` (identified by `source` in errors) column by column, in declaration order.
    ///
    /// Fails with [`PipelineError::Schema`] if a declared column is missing or a backup column
    /// name is already taken, and with [`PipelineError::Coercion`] on the first value that cannot
    /// be converted. Row numbers in errors are 1-based data rows.
    pub fn apply(&self, table: &mut DataSet, source: &str) -> PipelineResult<()> {
        for (column, desc) in self.schema.iter() {
            let idx = table.schema.index_of(column).ok_or_else(|| {
                PipelineError::schema(format!(
                    "column '{column}' doesn't exist in table '{source}'. columns={:?}",
                    table.schema.field_names().collect::<Vec<_>>()
                ))
            })?;

            if let Some(prefix) = self.backup_prefix {
                let backup = format!("{prefix}{column}");
                if table.schema.contains(&backup) {
                    return Err(PipelineError::schema(format!(
                        "backup column '{backup}' already exists in table '{source}'"
                    )));
                }
                let field = Field::new(backup, table.schema.fields[idx].data_type);
                let values = table.column_values(idx);
                table.insert_column(idx + 1, field, values);
            }

            let (data_type, values) = match desc {
                TypeDescriptor::Temporal { format } => {
                    let values = convert_column(table, idx, source, |v| parse_temporal(v, format))?;
                    (DataType::Datetime, values)
                }
                TypeDescriptor::Primitive(target) => {
                    let values = convert_column(table, idx, source, |v| cast_value(v, *target))?;
                    (*target, values)
                }
            };
            table.replace_column(idx, data_type, values);
        }
        Ok(())
    }
}

/// Run `convert` over column `idx`, turning the first failure into a [`PipelineError::Coercion`].
pub(crate) fn convert_column<F>(
    table: &DataSet,
    idx: usize,
    source: &str,
    mut convert: F,
) -> PipelineResult<Vec<Value>>
where
    F: FnMut(&Value) -> Result<Value, String>,
{
    let column = &table.schema.fields[idx].name;
    table
        .rows
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            convert(&row[idx]).map_err(|message| PipelineError::Coercion {
                table: source.to_string(),
                row: row_idx + 1,
                column: column.clone(),
                raw: row[idx].to_string(),
                message,
            })
        })
        .collect()
}

/// Cast one value to a primitive type.
pub fn cast_value(value: &Value, target: DataType) -> Result<Value, String> {
    if let Value::Utf8(s) = value {
        if s.trim().is_empty() && target != DataType::Utf8 {
            return Ok(Value::Null);
        }
    }
    if value.is_null() {
        return Ok(Value::Null);
    }

    match target {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => {
            let n = to_integer(value)?;
            let (min, max) = integer_bounds(target);
            if n < min || n > max {
                return Err(format!("{n} is out of range for {target}"));
            }
            Ok(if target.is_signed_int() {
                Value::Int64(n as i64)
            } else {
                Value::UInt64(n as u64)
            })
        }
        DataType::Float32 => {
            let f = to_float(value)?;
            if f.is_finite() && f.abs() > f64::from(f32::MAX) {
                return Err(format!("{f} is out of range for float32"));
            }
            Ok(Value::Float64(widen_f32(f as f32)))
        }
        DataType::Float64 => to_float(value).map(Value::Float64),
        DataType::Bool => to_bool(value).map(Value::Bool),
        DataType::Utf8 => Ok(Value::Utf8(value.to_string())),
        DataType::Date => to_date(value).map(|d| d.map_or(Value::Null, Value::Date)),
        DataType::Datetime => to_datetime_iso(value).map(|d| d.map_or(Value::Null, Value::Datetime)),
    }
}

fn integer_bounds(t: DataType) -> (i128, i128) {
    match t {
        DataType::Int8 => (i8::MIN.into(), i8::MAX.into()),
        DataType::Int16 => (i16::MIN.into(), i16::MAX.into()),
        DataType::Int32 => (i32::MIN.into(), i32::MAX.into()),
        DataType::UInt8 => (0, u8::MAX.into()),
        DataType::UInt16 => (0, u16::MAX.into()),
        DataType::UInt32 => (0, u32::MAX.into()),
        DataType::UInt64 => (0, u64::MAX.into()),
        _ => (i64::MIN.into(), i64::MAX.into()),
    }
}

fn to_integer(value: &Value) -> Result<i128, String> {
    match value {
        Value::Int64(i) => Ok((*i).into()),
        Value::UInt64(u) => Ok((*u).into()),
        Value::Float64(f) if f.is_finite() && f.fract() == 0.0 => Ok(*f as i128),
        Value::Float64(f) => Err(format!("cannot cast non-integer float {} to integer", format_float(*f))),
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Utf8(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|e| format!("expected integer: {e}")),
        Value::Date(_) | Value::Datetime(_) => Err("cannot cast a date to integer".to_string()),
        Value::Null => Err("null".to_string()),
    }
}

fn to_float(value: &Value) -> Result<f64, String> {
    match value {
        Value::Int64(i) => Ok(*i as f64),
        Value::UInt64(u) => Ok(*u as f64),
        Value::Float64(f) => Ok(*f),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Utf8(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|e| format!("expected number: {e}")),
        Value::Date(_) | Value::Datetime(_) => Err("cannot cast a date to float".to_string()),
        Value::Null => Err("null".to_string()),
    }
}

fn to_bool(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int64(i) => Ok(*i != 0),
        Value::UInt64(u) => Ok(*u != 0),
        Value::Float64(f) => Ok(*f != 0.0),
        Value::Utf8(s) => parse_bool(s.trim()),
        Value::Date(_) | Value::Datetime(_) => Err("cannot cast a date to bool".to_string()),
        Value::Null => Err("null".to_string()),
    }
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Ok(true),
        "false" | "f" | "0" | "no" | "n" => Ok(false),
        _ => Err("expected bool (true/false/1/0/yes/no)".to_string()),
    }
}

/// Parse one value as a date-time using a strftime-style `format`.
///
/// Date-only formats produce midnight. Values that already are dates pass through; numbers are
/// parsed from their text form (so `20240131` works with `%Y%m%d`).
pub fn parse_temporal(value: &Value, format: &str) -> Result<Value, String> {
    let text = match value {
        Value::Null => return Ok(Value::Null),
        Value::Datetime(dt) => return Ok(Value::Datetime(*dt)),
        Value::Date(d) => return Ok(d.and_hms_opt(0, 0, 0).map_or(Value::Null, Value::Datetime)),
        Value::Bool(_) => return Err("cannot parse a bool as a date".to_string()),
        Value::Int64(i) => i.to_string(),
        Value::UInt64(u) => u.to_string(),
        Value::Float64(f) if f.fract() == 0.0 => format!("{f:.0}"),
        Value::Float64(f) => f.to_string(),
        Value::Utf8(s) => s.trim().to_string(),
    };
    if text.is_empty() {
        return Ok(Value::Null);
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(&text, format) {
        return Ok(Value::Datetime(dt));
    }
    NaiveDate::parse_from_str(&text, format)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(Value::Datetime)
        .ok_or_else(|| format!("does not match date format '{format}'"))
}

const ISO_DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

fn to_datetime_iso(value: &Value) -> Result<Option<NaiveDateTime>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Datetime(dt) => Ok(Some(*dt)),
        Value::Date(d) => Ok(d.and_hms_opt(0, 0, 0)),
        Value::Utf8(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Ok(None);
            }
            ISO_DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(Some)
                .ok_or_else(|| "expected an ISO date or date-time".to_string())
        }
        other => Err(format!("cannot interpret {other} as a date")),
    }
}

/// Reduce a value to its calendar date, discarding time of day.
///
/// Idempotent: dates map to themselves.
pub fn to_date(value: &Value) -> Result<Option<NaiveDate>, String> {
    match value {
        Value::Date(d) => Ok(Some(*d)),
        other => to_datetime_iso(other).map(|dt| dt.map(|dt| dt.date())),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{cast_value, parse_temporal, SchemaCoercer};
    use crate::config::{SchemaSpec, TypeDescriptor};
    use crate::error::PipelineError;
    use crate::types::{DataSet, DataType, Field, Schema, Value};

    fn table() -> DataSet {
        DataSet::new(
            Schema::new(vec![
                Field::new("id", DataType::Int64),
                Field::new("amount", DataType::Utf8),
                Field::new("booked", DataType::Utf8),
            ]),
            vec![
                vec![
                    Value::Int64(1),
                    Value::Utf8("100".to_string()),
                    Value::Utf8("31/01/2024".to_string()),
                ],
                vec![
                    Value::Int64(2),
                    Value::Utf8(" 2.5 ".to_string()),
                    Value::Null,
                ],
            ],
        )
    }

    fn spec() -> SchemaSpec {
        SchemaSpec::new(vec![
            ("amount".to_string(), TypeDescriptor::Primitive(DataType::Float64)),
            (
                "booked".to_string(),
                TypeDescriptor::Temporal {
                    format: "%d/%m/%Y".to_string(),
                },
            ),
        ])
    }

    #[test]
    fn coerces_primitive_and_temporal_columns() {
        let mut t = table();
        SchemaCoercer::new(&spec(), None).apply(&mut t, "A.csv").unwrap();

        assert_eq!(t.schema.fields[1].data_type, DataType::Float64);
        assert_eq!(t.schema.fields[2].data_type, DataType::Datetime);
        assert_eq!(t.rows[0][1], Value::Float64(100.0));
        assert_eq!(t.rows[1][1], Value::Float64(2.5));
        assert_eq!(
            t.rows[0][2],
            Value::Datetime(
                NaiveDate::from_ymd_opt(2024, 1, 31)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
        assert_eq!(t.rows[1][2], Value::Null);
    }

    #[test]
    fn missing_column_is_a_schema_error_naming_the_table() {
        let mut t = table();
        let spec = SchemaSpec::new(vec![(
            "price".to_string(),
            TypeDescriptor::Primitive(DataType::Float64),
        )]);
        let err = SchemaCoercer::new(&spec, None).apply(&mut t, "B.csv").unwrap_err();
        assert!(matches!(err, PipelineError::Schema { .. }));
        let msg = err.to_string();
        assert!(msg.contains("column 'price'"));
        assert!(msg.contains("table 'B.csv'"));
    }

    #[test]
    fn backups_hold_pre_coercion_values_next_to_the_original() {
        let original = table();
        let mut t = original.clone();
        SchemaCoercer::new(&spec(), Some("(old)")).apply(&mut t, "A.csv").unwrap();

        assert_eq!(
            t.schema.field_names().collect::<Vec<_>>(),
            vec!["id", "amount", "(old)amount", "booked", "(old)booked"]
        );
        assert_eq!(t.column_values(2), original.column_values(1));
        assert_eq!(t.column_values(4), original.column_values(2));
        assert_eq!(t.schema.fields[2].data_type, DataType::Utf8);
    }

    #[test]
    fn backup_name_collision_is_rejected() {
        let mut t = table();
        t.schema.fields[0].name = "(old)amount".to_string();
        let err = SchemaCoercer::new(&spec(), Some("(old)"))
            .apply(&mut t, "A.csv")
            .unwrap_err();
        assert!(err.to_string().contains("backup column '(old)amount' already exists"));
    }

    #[test]
    fn unparseable_date_fails_with_column_and_value() {
        let mut t = table();
        t.rows[1][2] = Value::Utf8("2024-13-45".to_string());
        let err = SchemaCoercer::new(&spec(), None).apply(&mut t, "A.csv").unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, PipelineError::Coercion { row: 2, .. }));
        assert!(msg.contains("column 'booked'"));
        assert!(msg.contains("raw='2024-13-45'"));
    }

    #[test]
    fn integer_casts_check_range_and_integrality() {
        assert_eq!(cast_value(&Value::Utf8("127".into()), DataType::Int8), Ok(Value::Int64(127)));
        assert!(cast_value(&Value::Utf8("128".into()), DataType::Int8).is_err());
        assert!(cast_value(&Value::Int64(-1), DataType::UInt32).is_err());
        assert_eq!(cast_value(&Value::Float64(3.0), DataType::UInt8), Ok(Value::UInt64(3)));
        assert!(cast_value(&Value::Float64(3.5), DataType::Int64).is_err());
        assert_eq!(cast_value(&Value::Utf8("".into()), DataType::Int64), Ok(Value::Null));
    }

    #[test]
    fn bool_and_text_casts() {
        assert_eq!(cast_value(&Value::Utf8("yes".into()), DataType::Bool), Ok(Value::Bool(true)));
        assert!(cast_value(&Value::Utf8("maybe".into()), DataType::Bool).is_err());
        assert_eq!(
            cast_value(&Value::Float64(100.0), DataType::Utf8),
            Ok(Value::Utf8("100.0".to_string()))
        );
        assert!(cast_value(&Value::Float64(1e300), DataType::Float32).is_err());
    }

    #[test]
    fn float32_cast_keeps_short_decimal_form() {
        let v = cast_value(&Value::Utf8("0.1".into()), DataType::Float32).unwrap();
        assert_eq!(v, Value::Float64(0.1));
        assert_eq!(
            cast_value(&v, DataType::Utf8),
            Ok(Value::Utf8("0.1".to_string()))
        );
    }

    #[test]
    fn numeric_dates_parse_from_their_text_form() {
        let v = parse_temporal(&Value::Int64(20240131), "%Y%m%d").unwrap();
        assert_eq!(
            v,
            Value::Datetime(
                NaiveDate::from_ymd_opt(2024, 1, 31)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            )
        );
    }
}
