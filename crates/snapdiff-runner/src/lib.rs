//! # snapdiff-runner
//!
//! The orchestration core: a fixed-size worker pool executes parsed test
//! cases against pooled browser sessions, resolves captures against the
//! golden store (compare or update mode), and aggregates every outcome
//! into one `RunOutcome` for reporting.
//!
//! Failure isolation is the contract here: parse, session, timeout and
//! store failures are all converted into per-case outcomes at the case
//! boundary. Only configuration errors abort a run, and those surface
//! before scheduling begins.

mod report;
mod runner;

pub use report::{exit_code, render_summary, write_json_report};
pub use runner::Runner;
