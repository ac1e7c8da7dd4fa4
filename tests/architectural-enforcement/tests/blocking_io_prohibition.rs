//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: Async code in the roster crates MUST NOT use blocking I/O. The
//! tick path runs on tokio workers shared with every viewer's transport.
//! **Required**: Keep blocking reads in plain functions that run before the
//! runtime starts or outside the tick (config loading), or use `tokio::fs`.

use architectural_enforcement::{
    code_part, is_in_async_function, is_in_non_async_function, is_test_code,
    production_sources, violation,
};

/// Patterns that block the calling thread
const BLOCKING: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("use std::fs", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("use std::net", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
];

/// Test that production code does not use blocking I/O in async context
#[test]
fn test_no_blocking_io_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        let lines = file.line_refs();
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if is_test_code(&lines, idx) || is_in_non_async_function(&lines, idx) {
                continue;
            }

            for (pattern, kind) in BLOCKING {
                if code.contains(pattern) {
                    violations.push(violation(&file, idx, kind));
                }
            }

            if (code.contains("std::io::stdin()") || code.contains("std::io::stdout()"))
                && is_in_async_function(&lines, idx)
            {
                violations.push(violation(&file, idx, "Blocking stdin/stdout in async"));
            }
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O calls found in production code!\n");
        for v in &violations {
            eprintln!("  ❌ {v}");
        }
        eprintln!("\n✅ ACCEPTABLE blocking I/O:");
        eprintln!("  - Non-async functions (config loading before the scheduler starts)");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

/// The scan must actually see the roster sources
#[test]
fn test_sources_are_found() {
    let files = production_sources();
    assert!(
        files.iter().any(|f| f.path.ends_with("manager.rs")),
        "roster core sources not found under the workspace root"
    );
    assert!(files.iter().any(|f| f.path.ends_with("main.rs")));
}
