use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, Value};

/// Date format for every temporal cell, date-times included.
pub const CSV_DATE_FORMAT: &str = "%Y-%m-%d";

/// Write `table` as delimited text: one header row, no index column.
///
/// Nulls are empty, floats keep a decimal point and temporal values are written as
/// [`CSV_DATE_FORMAT`].
pub fn write_csv(path: &Path, table: &DataSet, delimiter: u8) -> PipelineResult<()> {
    let csv_err = |source: csv::Error| PipelineError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(csv_err)?;

    wtr.write_record(table.schema.field_names()).map_err(csv_err)?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(cell_text))
            .map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| PipelineError::io_at(path, e))?;
    Ok(())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Date(d) => d.format(CSV_DATE_FORMAT).to_string(),
        Value::Datetime(dt) => dt.format(CSV_DATE_FORMAT).to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::cell_text;
    use crate::types::Value;

    #[test]
    fn temporal_cells_are_written_as_dates() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert_eq!(cell_text(&Value::Date(d)), "2024-01-09");
        assert_eq!(cell_text(&Value::Datetime(d.and_hms_opt(8, 0, 1).unwrap())), "2024-01-09");
        assert_eq!(cell_text(&Value::Bool(false)), "false");
        assert_eq!(cell_text(&Value::Float64(61.0)), "61.0");
    }
}
