#![cfg(feature = "excel")]

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

use tabular_union::config::RunConfig;
use tabular_union::ingestion::discover_inputs;
use tabular_union::pipeline::Pipeline;

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("tabular-union-excel-{name}-{nanos}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_amounts_xlsx(path: &Path, sheet: &str, rows: &[(f64, f64)]) {
    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name(sheet).unwrap();

    // header
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "amount").unwrap();

    for (i, (id, amount)) in rows.iter().enumerate() {
        let r = (i + 1) as u32;
        ws.write_number(r, 0, *id).unwrap();
        ws.write_number(r, 1, *amount).unwrap();
    }
    wb.save(path).unwrap();
}

fn amount_config(extra: &str) -> RunConfig {
    RunConfig::from_toml_str(&format!(
        "[columns]\namount = \"float64\"\n\n[query]\nsql = \"SELECT * FROM df WHERE amount > 60\"\n\n{extra}"
    ))
    .unwrap()
}

#[test]
fn spreadsheets_are_processed_before_csv_files() {
    let dir = tmp_dir("order");
    std::fs::write(dir.join("A.csv"), "id,amount\n1,100\n").unwrap();
    write_amounts_xlsx(&dir.join("Z.xlsx"), "Sheet1", &[(7.0, 70.0), (8.0, 8.0)]);

    let inputs = discover_inputs(&dir, &amount_config("").options).unwrap();
    let names: Vec<String> = inputs.iter().map(|i| i.source_name()).collect();
    assert_eq!(names, vec!["Z.xlsx", "A.csv"]);

    let report = Pipeline::new(amount_config("")).with_root(&dir).run().unwrap();
    assert_eq!(
        std::fs::read_to_string(&report.output).unwrap(),
        "Source File,id,amount\nZ.xlsx,7,70.0\nA.csv,1,100.0\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn sheet_can_be_selected_by_name() {
    let dir = tmp_dir("sheet");
    write_amounts_xlsx(&dir.join("B.xlsx"), "Data", &[(1.0, 61.0)]);

    let report = Pipeline::new(amount_config("[options]\ndefault_sheet_name = \"Data\"\n"))
        .with_root(&dir)
        .run()
        .unwrap();
    assert_eq!(report.rows, 1);

    let missing = Pipeline::new(amount_config("[options]\ndefault_sheet_name = \"Nope\"\n"))
        .with_root(&dir)
        .run()
        .unwrap_err();
    assert!(missing.to_string().contains("sheet 'Nope' not found"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn xlsx_output_round_trips_through_a_reader() {
    let dir = tmp_dir("xlsx-out");
    std::fs::write(dir.join("A.csv"), "id,amount,booked\n1,100,05/03/2024\n2,61,\n").unwrap();

    let cfg = RunConfig::from_toml_str(
        r#"
[columns]
amount = "float64"
booked = { format = "%d/%m/%Y" }

[query]
sql = "SELECT * FROM df WHERE amount > 60"

[options]
print_file = "XLSX"
"#,
    )
    .unwrap();
    let report = Pipeline::new(cfg).with_root(&dir).run().unwrap();
    assert_eq!(report.output, dir.join("output").join("dataframe.xlsx"));

    let mut wb = open_workbook_auto(&report.output).unwrap();
    assert_eq!(wb.sheet_names(), vec!["Sheet1".to_string()]);
    let range = wb.worksheet_range("Sheet1").unwrap();
    let rows: Vec<&[Data]> = range.rows().collect();

    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][0], Data::String("Source File".to_string()));
    assert_eq!(rows[0][3], Data::String("booked".to_string()));
    assert_eq!(rows[1][0], Data::String("A.csv".to_string()));
    assert_eq!(rows[1][2], Data::Float(100.0));
    match &rows[1][3] {
        Data::DateTime(dt) => {
            let d = dt.as_datetime().unwrap().date();
            assert_eq!(d.to_string(), "2024-03-05");
        }
        other => panic!("expected a date cell, got {other:?}"),
    }
    assert_eq!(rows[2][3], Data::Empty);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn native_spreadsheet_dates_are_normalized() {
    let dir = tmp_dir("native-dates");
    let path = dir.join("D.xlsx");

    let mut wb = Workbook::new();
    let fmt = Format::new().set_num_format("dd/mm/yyyy hh:mm");
    let ws = wb.add_worksheet();
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "booked").unwrap();
    ws.write_number(1, 0, 1).unwrap();
    let dt = ExcelDateTime::from_ymd(2023, 12, 31)
        .unwrap()
        .and_hms(18, 30, 0)
        .unwrap();
    ws.write_datetime_with_format(1, 1, &dt, &fmt).unwrap();
    wb.save(&path).unwrap();

    let cfg = RunConfig::from_toml_str(
        "[columns]\nbooked = { format = \"%d/%m/%Y\" }\n\n[query]\nsql = \"SELECT * FROM df\"\n",
    )
    .unwrap();
    let report = Pipeline::new(cfg).with_root(&dir).run().unwrap();
    assert_eq!(
        std::fs::read_to_string(&report.output).unwrap(),
        "Source File,id,booked\nD.xlsx,1,2023-12-31\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}
