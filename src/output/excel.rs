#![cfg(feature = "excel")]

use std::path::Path;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, Value};

/// Worksheet name used for the single output sheet.
pub const SHEET_NAME: &str = "Sheet1";

/// Write `table` to a one-sheet workbook with a bold header row.
pub fn write_xlsx(path: &Path, table: &DataSet) -> PipelineResult<()> {
    let header = Format::new().set_bold();
    let date_fmt = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_fmt = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name(SHEET_NAME)?;

    for (c, name) in table.schema.field_names().enumerate() {
        ws.write_string_with_format(0, column_index(c)?, name, &header)?;
    }

    for (r, row) in table.rows.iter().enumerate() {
        let r = u32::try_from(r + 1).map_err(|_| too_large("rows", table.row_count()))?;
        for (c, value) in row.iter().enumerate() {
            let c = column_index(c)?;
            match value {
                Value::Null => {}
                Value::Int64(v) => {
                    ws.write_number(r, c, *v as f64)?;
                }
                Value::UInt64(v) => {
                    ws.write_number(r, c, *v as f64)?;
                }
                Value::Float64(v) if v.is_finite() => {
                    ws.write_number(r, c, *v)?;
                }
                Value::Float64(v) => {
                    ws.write_string(r, c, v.to_string())?;
                }
                Value::Bool(b) => {
                    ws.write_boolean(r, c, *b)?;
                }
                Value::Utf8(s) => {
                    ws.write_string(r, c, s)?;
                }
                Value::Date(d) => {
                    ws.write_datetime_with_format(r, c, &excel_date(*d)?, &date_fmt)?;
                }
                Value::Datetime(dt) => {
                    ws.write_datetime_with_format(r, c, &excel_datetime(*dt)?, &datetime_fmt)?;
                }
            }
        }
    }

    wb.save(path)?;
    Ok(())
}

fn column_index(c: usize) -> PipelineResult<u16> {
    u16::try_from(c).map_err(|_| too_large("columns", c + 1))
}

fn too_large(what: &str, n: usize) -> PipelineError {
    PipelineError::schema(format!("table has too many {what} for an xlsx sheet ({n})"))
}

fn excel_date(d: NaiveDate) -> PipelineResult<ExcelDateTime> {
    let year = u16::try_from(d.year())
        .map_err(|_| PipelineError::schema(format!("date {d} cannot be stored in an xlsx sheet")))?;
    Ok(ExcelDateTime::from_ymd(year, d.month() as u8, d.day() as u8)?)
}

fn excel_datetime(dt: NaiveDateTime) -> PipelineResult<ExcelDateTime> {
    Ok(excel_date(dt.date())?.and_hms(dt.hour() as u16, dt.minute() as u8, dt.second())?)
}
