//! Input file discovery.

use std::path::Path;

use walkdir::WalkDir;

use crate::config::RunOptions;
use crate::error::{PipelineError, PipelineResult};

use super::unified::{IngestionFormat, InputFile};

/// List the tabular files directly inside `dir`.
///
/// - Only regular files at depth 1 are considered (the output directory is never rescanned).
/// - Office lock/temp files (names containing `~`) are skipped.
/// - Files whose name contains any `options.exclude` substring are skipped.
/// - Spreadsheets come first, then CSV files; each group is sorted by file name.
pub fn discover_inputs(dir: impl AsRef<Path>, options: &RunOptions) -> PipelineResult<Vec<InputFile>> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(dir.as_ref()).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir.as_ref()).to_path_buf();
            PipelineError::io_at(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.contains('~') || is_excluded(&name, &options.exclude) {
            continue;
        }
        if let Some(format) = IngestionFormat::from_path(entry.path()) {
            inputs.push(InputFile::new(entry.path(), format));
        }
    }

    inputs.sort_by(|a, b| {
        a.format
            .cmp(&b.format)
            .then_with(|| a.source_name().cmp(&b.source_name()))
    });
    Ok(inputs)
}

fn is_excluded(name: &str, exclude: &[String]) -> bool {
    exclude.iter().any(|pattern| !pattern.is_empty() && name.contains(pattern.as_str()))
}

#[cfg(test)]
mod tests {
    use super::is_excluded;

    #[test]
    fn exclusion_is_substring_based() {
        let exclude = vec!["draft".to_string(), String::new()];
        assert!(is_excluded("sales_draft.csv", &exclude));
        assert!(!is_excluded("sales.csv", &exclude));
    }
}
