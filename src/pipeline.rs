//! Orchestration of a whole run.
//!
//! For every input, in processing order: ingest, apply the [`crate::config::SchemaSpec`], run
//! the query and tag the result with its source. The tagged results are then unioned, declared
//! date columns are normalized, and the union is written once. The first error aborts the run
//! and nothing is written.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::RunConfig;
use crate::error::PipelineResult;
use crate::ingestion::{discover_inputs, ingest_input, InputFile};
use crate::observability::{
    severity_for_error, FailureContext, PipelineEvent, PipelineObserver, PipelineSeverity,
    PipelineStage,
};
use crate::output::OutputWriter;
use crate::processing::{normalize_dates, ProvenanceUnioner, QueryRunner, SchemaCoercer};
use crate::types::DataSet;

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// File the union was written to.
    pub output: PathBuf,
    /// `true` when the primary output name failed and a numbered name was used.
    pub used_fallback: bool,
    /// Number of input tables.
    pub tables: usize,
    /// Rows in the union.
    pub rows: usize,
}

/// A configured run over the files of one directory.
pub struct Pipeline {
    config: RunConfig,
    root: PathBuf,
    observer: Option<Arc<dyn PipelineObserver>>,
    alert_at_or_above: PipelineSeverity,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("root", &self.root)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

struct Stages<'a> {
    coercer: SchemaCoercer<'a>,
    runner: QueryRunner,
    unioner: ProvenanceUnioner,
}

impl Pipeline {
    /// A pipeline reading from and writing under the current directory.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            root: PathBuf::from("."),
            observer: None,
            alert_at_or_above: PipelineSeverity::Critical,
        }
    }

    /// Directory holding the input files; `options.output_dir` is resolved against it.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Failures at or above `severity` are also reported through `on_alert`.
    pub fn with_alert_threshold(mut self, severity: PipelineSeverity) -> Self {
        self.alert_at_or_above = severity;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover the inputs under the root directory and process them.
    pub fn run(&self) -> PipelineResult<RunReport> {
        let inputs = self.observe(
            PipelineStage::Discover,
            None,
            discover_inputs(&self.root, &self.config.options),
        )?;
        self.run_inputs(&inputs)
    }

    /// Process `inputs` in the given order and write the union.
    pub fn run_inputs(&self, inputs: &[InputFile]) -> PipelineResult<RunReport> {
        let mut stages = self.stages();
        for input in inputs {
            let source = input.source_name();
            let table = self.observe(
                PipelineStage::Ingest,
                Some(&source),
                ingest_input(input, &self.config.options),
            )?;
            self.emit(PipelineEvent::TableIngested {
                source: source.clone(),
                rows: table.row_count(),
                columns: table.column_count(),
            });
            self.process_table(&mut stages, &source, table)?;
        }

        let tables = stages.unioner.len();
        let union = self.finish(stages)?;
        let writer = self.observe(
            PipelineStage::Output,
            None,
            OutputWriter::from_options(&self.root, &self.config.options),
        )?;
        let written = self.observe(PipelineStage::Output, None, writer.write(&union))?;
        self.emit(PipelineEvent::OutputWritten {
            path: written.path.clone(),
            rows: union.row_count(),
            fallback: written.fallback,
        });

        Ok(RunReport {
            output: written.path,
            used_fallback: written.fallback,
            tables,
            rows: union.row_count(),
        })
    }

    /// Run the per-table stages and the union over tables already in memory, without writing.
    pub fn unify(&self, tables: Vec<(String, DataSet)>) -> PipelineResult<DataSet> {
        let mut stages = self.stages();
        for (source, table) in tables {
            self.process_table(&mut stages, &source, table)?;
        }
        self.finish(stages)
    }

    fn stages(&self) -> Stages<'_> {
        let opts = &self.config.options;
        let backup_prefix = opts
            .backup_modified_columns
            .then_some(opts.backup_prefix.as_str());
        Stages {
            coercer: SchemaCoercer::new(&self.config.schema, backup_prefix),
            runner: QueryRunner::new(&self.config.query.sql, &self.config.query.table_name),
            unioner: ProvenanceUnioner::new(&opts.path_column),
        }
    }

    fn process_table(&self, stages: &mut Stages<'_>, source: &str, mut table: DataSet) -> PipelineResult<()> {
        self.observe(
            PipelineStage::Coerce,
            Some(source),
            stages.coercer.apply(&mut table, source),
        )?;
        let result = self.observe(
            PipelineStage::Query,
            Some(source),
            stages.runner.run(&table, source),
        )?;
        self.emit(PipelineEvent::TableQueried {
            source: source.to_string(),
            rows: result.row_count(),
        });
        self.observe(
            PipelineStage::Union,
            Some(source),
            stages.unioner.push(source, result),
        )
    }

    fn finish(&self, stages: Stages<'_>) -> PipelineResult<DataSet> {
        let tables = stages.unioner.len();
        let mut union = self.observe(PipelineStage::Union, None, stages.unioner.finish())?;
        self.observe(
            PipelineStage::Union,
            None,
            normalize_dates(&mut union, &self.config.schema),
        )?;
        self.emit(PipelineEvent::UnionBuilt {
            tables,
            rows: union.row_count(),
        });
        Ok(union)
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(obs) = self.observer.as_ref() {
            obs.on_event(&event);
        }
    }

    fn observe<T>(&self, stage: PipelineStage, source: Option<&str>, result: PipelineResult<T>) -> PipelineResult<T> {
        if let (Some(obs), Err(e)) = (self.observer.as_ref(), &result) {
            let ctx = FailureContext {
                stage,
                source: source.map(str::to_string),
            };
            let sev = severity_for_error(e);
            obs.on_failure(&ctx, sev, e);
            if sev >= self.alert_at_or_above {
                obs.on_alert(&ctx, sev, e);
            }
        }
        result
    }
}
