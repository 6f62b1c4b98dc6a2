//! Run observability: progress events, failures and alerts.
//!
//! A [`crate::pipeline::Pipeline`] reports to one [`PipelineObserver`]. Observers here write
//! to stderr ([`StdErrObserver`]), append to a log file ([`FileObserver`]) or fan out to several
//! others ([`CompositeObserver`]).

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::PipelineError;

/// Severity classification used for failure callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PipelineSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the run failed).
    Error,
    /// Critical error (file system failures).
    Critical,
}

/// The stage a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Discover,
    Ingest,
    Coerce,
    Query,
    Union,
    Output,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Discover => "discover",
            Self::Ingest => "ingest",
            Self::Coerce => "coerce",
            Self::Query => "query",
            Self::Union => "union",
            Self::Output => "output",
        };
        f.write_str(s)
    }
}

/// Where a failure happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureContext {
    pub stage: PipelineStage,
    /// Input file name, when the failure belongs to one table.
    pub source: Option<String>,
}

/// Progress events emitted during a run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    TableIngested {
        source: String,
        rows: usize,
        columns: usize,
    },
    TableQueried {
        source: String,
        rows: usize,
    },
    UnionBuilt {
        tables: usize,
        rows: usize,
    },
    OutputWritten {
        path: PathBuf,
        rows: usize,
        fallback: bool,
    },
}

/// Observer interface for run progress and failures.
pub trait PipelineObserver: Send + Sync {
    /// Called for every progress event.
    fn on_event(&self, _event: &PipelineEvent) {}

    /// Called when the run fails.
    fn on_failure(&self, _ctx: &FailureContext, _severity: PipelineSeverity, _error: &PipelineError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        self.on_failure(ctx, severity, error)
    }
}

/// File system failures are [`PipelineSeverity::Critical`]; everything else is an error.
pub fn severity_for_error(e: &PipelineError) -> PipelineSeverity {
    if e.is_io() {
        PipelineSeverity::Critical
    } else {
        PipelineSeverity::Error
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn PipelineObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn PipelineObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl PipelineObserver for CompositeObserver {
    fn on_event(&self, event: &PipelineEvent) {
        for o in &self.observers {
            o.on_event(event);
        }
    }

    fn on_failure(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

fn describe(event: &PipelineEvent) -> String {
    match event {
        PipelineEvent::TableIngested {
            source,
            rows,
            columns,
        } => format!("ingested source={source} rows={rows} columns={columns}"),
        PipelineEvent::TableQueried { source, rows } => {
            format!("queried source={source} rows={rows}")
        }
        PipelineEvent::UnionBuilt { tables, rows } => format!("union tables={tables} rows={rows}"),
        PipelineEvent::OutputWritten {
            path,
            rows,
            fallback,
        } => format!(
            "written path={} rows={rows} fallback={fallback}",
            path.display()
        ),
    }
}

fn source_of(ctx: &FailureContext) -> &str {
    ctx.source.as_deref().unwrap_or("-")
}

/// Logs run events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl PipelineObserver for StdErrObserver {
    fn on_event(&self, event: &PipelineEvent) {
        eprintln!("[run][ok] {}", describe(event));
    }

    fn on_failure(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        eprintln!(
            "[run][{:?}] stage={} source={} err={}",
            severity,
            ctx.stage,
            source_of(ctx),
            error
        );
    }

    fn on_alert(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        eprintln!(
            "[ALERT][run][{:?}] stage={} source={} err={}",
            severity,
            ctx.stage,
            source_of(ctx),
            error
        );
    }
}

/// Appends run events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl PipelineObserver for FileObserver {
    fn on_event(&self, event: &PipelineEvent) {
        self.append_line(&format!("{} ok {}", unix_ts(), describe(event)));
    }

    fn on_failure(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        self.append_line(&format!(
            "{} fail severity={:?} stage={} source={} err={}",
            unix_ts(),
            severity,
            ctx.stage,
            source_of(ctx),
            error
        ));
    }

    fn on_alert(&self, ctx: &FailureContext, severity: PipelineSeverity, error: &PipelineError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} stage={} source={} err={}",
            unix_ts(),
            severity,
            ctx.stage,
            source_of(ctx),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
