//! Integration Test: No Panicking Shortcuts in Production Code
//!
//! **Policy**: Failures are contained to the viewer or definition they
//! affect, so production code propagates errors with `?` or logs and skips.
//! `unwrap()` and `expect()` are reserved for tests and doc examples.

use architectural_enforcement::{code_part, is_test_code, production_sources, violation};

#[test]
fn test_no_unwrap_or_expect_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        let lines = file.line_refs();
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if !(code.contains(".unwrap()") || code.contains(".expect(")) {
                continue;
            }
            if is_test_code(&lines, idx) {
                continue;
            }
            violations.push(violation(&file, idx, "Panicking shortcut"));
        }
    }

    if !violations.is_empty() {
        for v in &violations {
            eprintln!("  ❌ {v}");
        }
        panic!(
            "\nFound {} unwrap/expect call(s) in production code.",
            violations.len()
        );
    }
}
