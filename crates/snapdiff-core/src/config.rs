//! Run configuration consumed by the scheduler
//!
//! The CLI builds one `RunConfig` from argv and hands it over; the core
//! never parses arguments itself. Configuration-level errors are the only
//! errors fatal to the entire run, and they surface here before any test
//! case is scheduled.

use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::{Result, SnapdiffError, DEFAULT_TOLERANCE};

/// Everything one invocation needs, resolved and validated up front
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Root of the golden image store
    pub golden_root: PathBuf,
    /// Directory receiving failure artifacts and the JSON report
    pub output_root: PathBuf,
    /// Overwrite golden images instead of comparing
    pub update: bool,
    /// Template variables applied at parse time
    pub vars: HashMap<String, String>,
    /// Maximum number of concurrently executing test cases
    pub max_concurrency: usize,
    /// Attach to a running browser at this debugger URL instead of
    /// launching one
    pub debugger_url: Option<String>,
    /// Only schedule test cases whose identifier matches
    pub filter: Option<Regex>,
    /// Extra HTTP headers sent with every navigation
    pub headers: Vec<(String, String)>,
    /// Run-level diff tolerance, overridable per test case
    pub tolerance: f64,
    /// Budget for a single wait/navigation
    pub action_timeout: Duration,
    /// Budget for a whole test case
    pub test_timeout: Duration,
}

/// Half the available cores, rounded up
pub fn default_concurrency() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus + 1) / 2
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            golden_root: PathBuf::from("goldens"),
            output_root: PathBuf::from("snapdiff-out"),
            update: false,
            vars: HashMap::new(),
            max_concurrency: default_concurrency(),
            debugger_url: None,
            filter: None,
            headers: Vec::new(),
            tolerance: DEFAULT_TOLERANCE,
            action_timeout: Duration::from_secs(30),
            test_timeout: Duration::from_secs(120),
        }
    }
}

impl RunConfig {
    /// Reject values that would wedge the run before scheduling begins
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(SnapdiffError::Config(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(SnapdiffError::Config(format!(
                "tolerance must be within [0, 1], got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    /// Name-filter predicate; an absent filter matches everything
    pub fn matches_filter(&self, test_id: &str) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |re| re.is_match(test_id))
    }
}
