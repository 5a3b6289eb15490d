//! Report aggregation: human-readable summary, JSON report, exit status

use snapdiff_core::{Result, RunOutcome, SnapdiffError, TestStatus};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Render the run as a human-readable summary: one line per non-passing
/// case with its cause and artifact locations, then the totals.
pub fn render_summary(outcome: &RunOutcome) -> String {
    let mut out = String::new();

    for test in &outcome.outcomes {
        let marker = match test.status {
            TestStatus::Passed => continue,
            TestStatus::Failed => "FAIL ",
            TestStatus::Errored => "ERROR",
            TestStatus::Pending | TestStatus::Running => "?    ",
        };
        let cause = test.cause.as_deref().unwrap_or("unknown cause");
        let _ = writeln!(out, "{} {}: {}", marker, test.test_id, cause);
        for capture in &test.captures {
            if let Some(path) = &capture.diff_artifact {
                let _ = writeln!(out, "      diff: {}", path.display());
            }
            if let Some(path) = &capture.candidate_artifact {
                let _ = writeln!(out, "      got:  {}", path.display());
            }
        }
    }

    let elapsed = outcome
        .finished_at
        .signed_duration_since(outcome.started_at);
    let _ = write!(
        out,
        "{} passed, {} failed, {} errored in {:.1}s",
        outcome.count(TestStatus::Passed),
        outcome.count(TestStatus::Failed),
        outcome.count(TestStatus::Errored),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    if outcome.cancelled {
        let _ = write!(out, " (run cancelled, queued cases skipped)");
    }
    out
}

/// Zero only if every scheduled case passed and the run was not cancelled
pub fn exit_code(outcome: &RunOutcome) -> i32 {
    if outcome.cancelled || !outcome.all_passed() {
        1
    } else {
        0
    }
}

/// Write the machine-readable report next to the failure artifacts
pub fn write_json_report(outcome: &RunOutcome, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(outcome)?;
    std::fs::write(path, json).map_err(|e| {
        SnapdiffError::Other(format!("failed to write report {}: {}", path.display(), e))
    })?;
    info!("wrote report to {}", path.display());
    Ok(())
}
