use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use tabular_union::config::RunConfig;
use tabular_union::observability::StdErrObserver;
use tabular_union::pipeline::Pipeline;
use tabular_union::PipelineResult;

const DEFAULT_CONFIG: &str = "config.toml";

fn main() -> ExitCode {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    match run(config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: PathBuf) -> PipelineResult<()> {
    let config = RunConfig::from_path(&config_path)?;
    let report = Pipeline::new(config)
        .with_observer(Arc::new(StdErrObserver))
        .run()?;
    if report.used_fallback {
        eprintln!("primary output name unavailable; wrote a numbered file instead");
    }
    println!("{}", report.output.display());
    Ok(())
}
