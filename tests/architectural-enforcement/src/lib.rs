//! Architectural Enforcement - Source Scanners
//!
//! Helpers shared by the integration tests in `tests/`, which walk the roster
//! crates' production sources and fail on patterns the render path must not
//! contain:
//! - Blocking I/O inside async code
//! - Sleeping instead of waiting on a timer or channel
//! - `unwrap()` / `expect()` outside test code
//!
//! The scanners are line based. They understand just enough Rust layout
//! (function headers, test attributes, `#[cfg(test)] mod` blocks) to tell
//! production code from test code.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source roots, relative to the workspace root
pub const SOURCE_ROOTS: &[&str] = &["roster/core/src", "roster/daemon/src"];

/// Workspace root, resolved from this crate's manifest directory
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// A loaded source file
#[derive(Debug)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,
    /// File content split into lines
    pub lines: Vec<String>,
}

impl SourceFile {
    /// Line slices for the detector functions
    #[must_use]
    pub fn line_refs(&self) -> Vec<&str> {
        self.lines.iter().map(String::as_str).collect()
    }
}

/// Every `.rs` file under the production source roots
///
/// Roots that do not exist are skipped.
#[must_use]
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    SOURCE_ROOTS
        .iter()
        .flat_map(|dir| rust_files(&root.join(dir)))
        .collect()
}

/// Every `.rs` file under `dir`
#[must_use]
pub fn rust_files(dir: &Path) -> Vec<SourceFile> {
    if !dir.exists() {
        return Vec::new();
    }

    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .filter_map(|entry| {
            let content = fs::read_to_string(entry.path()).ok()?;
            Some(SourceFile {
                path: entry.path().to_path_buf(),
                lines: content.lines().map(str::to_string).collect(),
            })
        })
        .collect()
}

/// Code portion of a line, without any trailing `//` comment
#[must_use]
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Index of the first line of a `#[cfg(test)] mod` block, if the file has one
#[must_use]
pub fn test_module_start(lines: &[&str]) -> Option<usize> {
    lines.iter().enumerate().find_map(|(idx, line)| {
        if line.trim() != "#[cfg(test)]" {
            return None;
        }
        let next = lines[idx + 1..].iter().find(|l| !l.trim().is_empty())?;
        next.trim_start().starts_with("mod ").then_some(idx)
    })
}

/// Whether the line sits in test code
///
/// True inside a `#[cfg(test)] mod` block or a function carrying a test
/// attribute.
#[must_use]
pub fn is_test_code(lines: &[&str], current_idx: usize) -> bool {
    if test_module_start(lines).is_some_and(|start| current_idx >= start) {
        return true;
    }
    is_in_test_function(lines, current_idx)
}

/// Check if line is inside a test function
#[must_use]
pub fn is_in_test_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.starts_with("#[test]") || line.starts_with("#[tokio::test") {
            return true;
        }

        if is_fn_header(line) && !line.contains("fn test_") {
            return false;
        }

        // Stop at module boundaries
        if line.starts_with("mod ") || line.starts_with("impl ") {
            return false;
        }
    }
    false
}

/// Check if line is inside an async function
#[must_use]
pub fn is_in_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") || line.contains("async move {") || line.ends_with("async {") {
            return true;
        }

        if is_fn_header(line) {
            return false;
        }

        // Stop at module/impl boundaries
        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Check if line is inside a non-async function (acceptable for blocking I/O)
#[must_use]
pub fn is_in_non_async_function(lines: &[&str], current_idx: usize) -> bool {
    for i in (0..current_idx).rev() {
        let line = lines[i].trim();

        if line.contains("async fn ") || line.contains("async move {") || line.ends_with("async {") {
            return false;
        }

        if is_fn_header(line) {
            return true;
        }

        if line.starts_with("mod ") || (line.starts_with("impl ") && line.contains('{')) {
            return false;
        }
    }
    false
}

/// Whether a trimmed line opens a non-async function
fn is_fn_header(line: &str) -> bool {
    let rest = line
        .strip_prefix("pub(crate) ")
        .or_else(|| line.strip_prefix("pub "))
        .unwrap_or(line);
    rest.starts_with("fn ") || rest.starts_with("const fn ")
}

/// Check if a timer wait sits next to a `tokio::time::interval` loop
///
/// A deadline raced against an interval in `select!` is a wait, not a poll.
#[must_use]
pub fn is_interval_pattern(lines: &[&str], current_idx: usize) -> bool {
    let back = current_idx.saturating_sub(20)..current_idx;
    let forward = current_idx..std::cmp::min(current_idx + 5, lines.len());

    back.chain(forward).any(|i| {
        let line = lines[i];
        line.contains("tokio::time::interval") || line.contains(".tick()")
    })
}

/// Format one violation for the failure report
#[must_use]
pub fn violation(file: &SourceFile, idx: usize, kind: &str) -> String {
    format!(
        "{}:{} - {kind}: {}",
        file.path.display(),
        idx + 1,
        file.lines[idx].trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_function_detection() {
        let code = vec![
            "pub async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));
        assert!(!is_in_non_async_function(&code, 1));
    }

    #[test]
    fn test_async_block_detection() {
        let code = vec![
            "pub fn spawn() {",
            "    tokio::spawn(async move {",
            "        std::fs::write(\"x\", \"y\");",
            "    });",
            "}",
        ];
        assert!(is_in_async_function(&code, 2));
        assert!(!is_in_non_async_function(&code, 2));
    }

    #[test]
    fn test_private_and_public_fn_headers() {
        let private = vec!["fn read(path: &Path) {", "    std::fs::read(path);", "}"];
        let public = vec!["pub fn read(path: &Path) {", "    std::fs::read(path);", "}"];
        assert!(is_in_non_async_function(&private, 1));
        assert!(is_in_non_async_function(&public, 1));
    }

    #[test]
    fn test_test_module_detection() {
        let code = vec![
            "pub fn prod() -> u8 { 1 }",
            "",
            "#[cfg(test)]",
            "mod tests {",
            "    fn helper() { Some(1).unwrap(); }",
            "}",
        ];
        assert_eq!(test_module_start(&code), Some(2));
        assert!(!is_test_code(&code, 0));
        assert!(is_test_code(&code, 4));
    }

    #[test]
    fn test_cfg_test_on_item_is_not_a_module() {
        let code = vec![
            "#[cfg(test)]",
            "pub fn from_raw(id: u64) -> Self { Self(id) }",
            "pub fn prod() { x.unwrap(); }",
        ];
        assert_eq!(test_module_start(&code), None);
        assert!(!is_test_code(&code, 2));
    }

    #[test]
    fn test_tokio_test_function_detection() {
        let code = vec![
            "#[tokio::test]",
            "async fn test_ticks() {",
            "    tokio::time::sleep(Duration::from_millis(5)).await;",
            "}",
        ];
        assert!(is_in_test_function(&code, 2));
    }

    #[test]
    fn test_interval_pattern_detection() {
        let code = vec![
            "let mut step = tokio::time::interval(period);",
            "let deadline = async {",
            "    tokio::time::sleep(limit).await",
            "};",
        ];
        assert!(is_interval_pattern(&code, 2));
        assert!(!is_interval_pattern(&["tokio::time::sleep(x).await;"], 0));
    }

    #[test]
    fn test_code_part_drops_comments() {
        assert_eq!(code_part("let x = 1; // .unwrap()"), "let x = 1; ");
        assert_eq!(code_part("/// doc .unwrap()"), "");
    }
}
