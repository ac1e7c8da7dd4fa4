//! Integration Test: Sleep Prohibition
//!
//! **Policy**: Production code MUST NOT sleep. Rendering is driven by the
//! scheduler's `tokio::time::interval`; everything else waits on channels.
//! **Exceptions**: test code, and a deadline raced against an interval in
//! `select!`.

use architectural_enforcement::{
    code_part, is_interval_pattern, is_test_code, production_sources, violation,
};

/// Test that production code does not contain sleep() calls
#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();

    for file in production_sources() {
        let lines = file.line_refs();
        for (idx, line) in lines.iter().enumerate() {
            let code = code_part(line);
            if !(code.contains("::sleep(") || code.contains(".sleep(")) {
                continue;
            }
            if is_test_code(&lines, idx) || is_interval_pattern(&lines, idx) {
                continue;
            }
            violations.push(violation(&file, idx, "Sleep"));
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for v in &violations {
            eprintln!("  ❌ {v}");
        }
        eprintln!("\n✅ ACCEPTABLE:");
        eprintln!("  - Periodic work using tokio::time::interval()");
        eprintln!("  - Test code (#[test] / #[tokio::test] / #[cfg(test)] mod)");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

/// `std::thread::sleep` blocks a runtime worker and is never acceptable
#[test]
fn test_no_thread_sleep_anywhere() {
    let offenders: Vec<String> = production_sources()
        .iter()
        .flat_map(|file| {
            file.lines
                .iter()
                .enumerate()
                .filter(|(_, line)| code_part(line).contains("thread::sleep("))
                .map(|(idx, _)| violation(file, idx, "Thread sleep"))
                .collect::<Vec<_>>()
        })
        .collect();
    assert!(offenders.is_empty(), "thread::sleep found: {offenders:#?}");
}
