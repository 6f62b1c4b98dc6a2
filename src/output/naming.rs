//! Output file names: `dataframe.<ext>` and the numbered fallbacks `dataframe(<n>).<ext>`.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{PipelineError, PipelineResult};

/// Base name of every output artifact.
pub const OUTPUT_BASE_NAME: &str = "dataframe";

/// `dataframe.<ext>`
pub fn primary_file_name(ext: &str) -> String {
    format!("{OUTPUT_BASE_NAME}.{ext}")
}

/// `dataframe(<n>).<ext>`
pub fn numbered_file_name(n: u64, ext: &str) -> String {
    format!("{OUTPUT_BASE_NAME}({n}).{ext}")
}

/// Hidden sibling of `path` used while an attempt is in progress (`.dataframe.csv.partial`).
///
/// Its extension never matches an output or input format, so neither the suffix scan nor input
/// discovery picks it up.
pub fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}

/// Suffix of an output file name: `Some(0)` for `dataframe.<ext>`, `Some(n)` for
/// `dataframe(<n>).<ext>`, `None` for anything else.
pub fn parse_suffix(file_name: &str, ext: &str) -> Option<u64> {
    let stem = file_name.strip_suffix(ext)?.strip_suffix('.')?;
    let rest = stem.strip_prefix(OUTPUT_BASE_NAME)?;
    if rest.is_empty() {
        return Some(0);
    }
    let digits = rest.strip_prefix('(')?.strip_suffix(')')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Path of the next free numbered name in `dir`: one past the highest existing suffix, and at
/// least `dataframe(1).<ext>`. Entries of any kind (files or directories) count as taken.
pub fn next_fallback_path(dir: &Path, ext: &str) -> PipelineResult<PathBuf> {
    let mut highest = 0u64;
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            PipelineError::io_at(path, e.into())
        })?;
        if let Some(n) = entry.file_name().to_str().and_then(|name| parse_suffix(name, ext)) {
            highest = highest.max(n);
        }
    }
    Ok(dir.join(numbered_file_name(highest.saturating_add(1), ext)))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{numbered_file_name, parse_suffix, primary_file_name, staging_path};

    #[test]
    fn parses_primary_and_numbered_names() {
        assert_eq!(parse_suffix("dataframe.csv", "csv"), Some(0));
        assert_eq!(parse_suffix("dataframe(1).csv", "csv"), Some(1));
        assert_eq!(parse_suffix("dataframe(12).xlsx", "xlsx"), Some(12));
    }

    #[test]
    fn ignores_unrelated_names() {
        assert_eq!(parse_suffix("dataframe(1).xlsx", "csv"), None);
        assert_eq!(parse_suffix("dataframe().csv", "csv"), None);
        assert_eq!(parse_suffix("dataframe(x).csv", "csv"), None);
        assert_eq!(parse_suffix("dataframe (1).csv", "csv"), None);
        assert_eq!(parse_suffix("other.csv", "csv"), None);
        assert_eq!(parse_suffix("dataframecsv", "csv"), None);
    }

    #[test]
    fn staging_name_is_ignored_by_the_suffix_scan() {
        let staging = staging_path(Path::new("out/dataframe(2).csv"));
        assert_eq!(staging, Path::new("out/.dataframe(2).csv.partial"));
        let name = staging.file_name().unwrap().to_str().unwrap();
        assert_eq!(parse_suffix(name, "csv"), None);
    }

    #[test]
    fn names_round_trip_through_parser() {
        assert_eq!(parse_suffix(&primary_file_name("csv"), "csv"), Some(0));
        assert_eq!(parse_suffix(&numbered_file_name(7, "csv"), "csv"), Some(7));
    }
}
