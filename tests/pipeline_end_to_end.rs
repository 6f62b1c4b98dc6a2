use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tabular_union::config::RunConfig;
use tabular_union::observability::{
    FailureContext, PipelineEvent, PipelineObserver, PipelineSeverity,
};
use tabular_union::pipeline::Pipeline;
use tabular_union::PipelineError;

fn tmp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("tabular-union-{name}-{nanos}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn write_amount_inputs(dir: &Path) {
    write(dir, "A.csv", "id,amount\n1,100\n2,50\n");
    write(dir, "B.csv", "id,amount\n3,60\n4,61\n");
}

fn config(extra: &str) -> RunConfig {
    RunConfig::from_toml_str(&format!(
        r#"
[columns]
amount = "float64"

[query]
sql = "SELECT * FROM df WHERE amount > 60"

{extra}
"#
    ))
    .unwrap()
}

#[derive(Default)]
struct RecordingObserver {
    events: Mutex<Vec<PipelineEvent>>,
    failures: Mutex<Vec<PipelineSeverity>>,
}

impl PipelineObserver for RecordingObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn on_failure(&self, _ctx: &FailureContext, severity: PipelineSeverity, _error: &PipelineError) {
        self.failures.lock().unwrap().push(severity);
    }
}

#[test]
fn filters_each_file_and_unions_with_provenance() {
    let dir = tmp_dir("e2e");
    write_amount_inputs(&dir);
    let obs = Arc::new(RecordingObserver::default());

    let report = Pipeline::new(config(""))
        .with_root(&dir)
        .with_observer(obs.clone())
        .run()
        .unwrap();

    assert_eq!(report.output, dir.join("output").join("dataframe.csv"));
    assert!(!report.used_fallback);
    assert_eq!(report.tables, 2);
    assert_eq!(report.rows, 2);
    assert_eq!(
        std::fs::read_to_string(&report.output).unwrap(),
        "Source File,id,amount\nA.csv,1,100.0\nB.csv,4,61.0\n"
    );

    let events = obs.events.lock().unwrap().clone();
    assert_eq!(
        events.first(),
        Some(&PipelineEvent::TableIngested {
            source: "A.csv".to_string(),
            rows: 2,
            columns: 2,
        })
    );
    assert_eq!(
        events.last(),
        Some(&PipelineEvent::OutputWritten {
            path: report.output.clone(),
            rows: 2,
            fallback: false,
        })
    );
    assert!(obs.failures.lock().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn second_run_falls_back_when_primary_is_unwritable() {
    let dir = tmp_dir("fallback");
    write_amount_inputs(&dir);
    // Occupy the primary name with a directory so opening it for writing fails.
    std::fs::create_dir_all(dir.join("output").join("dataframe.csv")).unwrap();
    write(&dir.join("output"), "dataframe(2).csv", "stale");

    let report = Pipeline::new(config("")).with_root(&dir).run().unwrap();

    assert!(report.used_fallback);
    assert_eq!(report.output, dir.join("output").join("dataframe(3).csv"));
    assert_eq!(
        std::fs::read_to_string(dir.join("output").join("dataframe(2).csv")).unwrap(),
        "stale"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn custom_options_shape_the_output() {
    let dir = tmp_dir("options");
    write(&dir, "A.csv", "id;amount\n1;1.000,5\n2;7,25\n");
    write(&dir, "A_draft.csv", "this file is excluded\n");
    write(&dir, "~lock.csv", "so is this one\n");

    let cfg = config(
        r#"
[options]
default_csv_delimiter = ";"
float_thousands_delimiter = "."
float_decimal_point_delimiter = ","
backup_modified_columns = true
path_column = "origin"
exclude = ["draft"]
output_dir = "out"
"#,
    );
    let report = Pipeline::new(cfg).with_root(&dir).run().unwrap();

    assert_eq!(report.output, dir.join("out").join("dataframe.csv"));
    assert_eq!(
        std::fs::read_to_string(&report.output).unwrap(),
        "origin;id;amount;(old)amount\nA.csv;1;1000.5;1000.5\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_declared_column_aborts_without_output() {
    let dir = tmp_dir("missing-col");
    write(&dir, "A.csv", "id,amount\n1,100\n");
    write(&dir, "B.csv", "id,total\n2,200\n");

    let err = Pipeline::new(config("")).with_root(&dir).run().unwrap_err();

    assert!(matches!(err, PipelineError::Schema { .. }));
    assert!(err.to_string().contains("column 'amount' doesn't exist in table 'B.csv'"));
    assert!(!dir.join("output").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn query_error_aborts_and_is_reported() {
    let dir = tmp_dir("bad-query");
    write_amount_inputs(&dir);
    let obs = Arc::new(RecordingObserver::default());

    let cfg = RunConfig::from_toml_str("[query]\nsql = \"SELECT missing FROM df\"\n").unwrap();
    let err = Pipeline::new(cfg)
        .with_root(&dir)
        .with_observer(obs.clone())
        .run()
        .unwrap_err();

    assert!(matches!(err, PipelineError::Query { .. }));
    assert!(err.to_string().contains("table 'A.csv'"));
    assert_eq!(obs.failures.lock().unwrap().clone(), vec![PipelineSeverity::Error]);
    assert!(!dir.join("output").exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn uncoercible_value_names_table_row_and_column() {
    let dir = tmp_dir("coerce");
    write(&dir, "A.csv", "id,amount\n1,100\n2,lots\n");

    let err = Pipeline::new(config("")).with_root(&dir).run().unwrap_err();
    let msg = err.to_string();

    assert!(matches!(err, PipelineError::Coercion { .. }));
    assert!(msg.contains("table 'A.csv'"));
    assert!(msg.contains("row 2"));
    assert!(msg.contains("column 'amount'"));
    assert!(msg.contains("raw='lots'"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn date_columns_are_written_as_calendar_dates() {
    let dir = tmp_dir("dates");
    write(&dir, "A.csv", "id,booked\n1,05/03/2024\n2,\n");
    write(&dir, "B.csv", "id,booked\n3,31/12/2023\n");

    let cfg = RunConfig::from_toml_str(
        r#"
[columns]
booked = { format = "%d/%m/%Y" }

[query]
sql = "SELECT * FROM df ORDER BY id"
"#,
    )
    .unwrap();
    let report = Pipeline::new(cfg).with_root(&dir).run().unwrap();

    assert_eq!(
        std::fs::read_to_string(&report.output).unwrap(),
        "Source File,id,booked\nA.csv,1,2024-03-05\nA.csv,2,\nB.csv,3,2023-12-31\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn float32_columns_are_written_in_short_form() {
    let dir = tmp_dir("float32");
    write(&dir, "A.csv", "id,ratio\n1,0.1\n2,0.7\n");

    let cfg = RunConfig::from_toml_str(
        "[columns]\nratio = \"float32\"\n\n[query]\nsql = \"SELECT * FROM df\"\n",
    )
    .unwrap();
    let report = Pipeline::new(cfg).with_root(&dir).run().unwrap();

    assert_eq!(
        std::fs::read_to_string(&report.output).unwrap(),
        "Source File,id,ratio\nA.csv,1,0.1\nA.csv,2,0.7\n"
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn empty_directory_is_a_config_error() {
    let dir = tmp_dir("empty");
    let err = Pipeline::new(config("")).with_root(&dir).run().unwrap_err();
    assert!(matches!(err, PipelineError::Config { .. }));
    let _ = std::fs::remove_dir_all(&dir);
}
