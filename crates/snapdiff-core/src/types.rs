//! Data model shared by every snapdiff crate
//!
//! A `TestCase` is parsed once and never mutated afterwards. Captures flow
//! from the browser session to the runner as `CapturedImage` values, and the
//! diff engine turns golden/candidate pairs into `DiffResult`s. Everything
//! the report needs survives in `TestOutcome`/`RunOutcome`; raw pixel buffers
//! do not.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::PathBuf;

use crate::Result;

/// Viewport applied when a script omits the `viewport` directive
pub const DEFAULT_VIEWPORT: Viewport = Viewport {
    width: 1920,
    height: 1080,
};

/// Fraction of differing pixels tolerated by default (exact match)
pub const DEFAULT_TOLERANCE: f64 = 0.0;

/// Rendered page dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Condition a `wait` action blocks on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaitCondition {
    /// Page load settled
    NetworkIdle,
    /// Element matching the CSS selector is present
    Selector(String),
    /// Fixed delay in milliseconds
    Delay(u64),
}

/// One atomic step of a test case
///
/// Actions execute strictly in script order within a test case. Adding a
/// verb here is a compile-time-checked change: the runner matches
/// exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Action {
    Navigate { url: String },
    SetViewport { width: u32, height: u32 },
    Wait { condition: WaitCondition },
    Click { selector: String },
    Capture { label: String },
}

/// A named, ordered sequence of browser actions parsed from a script file.
///
/// Immutable after parsing; template variables are already resolved, so the
/// action list is exactly what will execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    /// Stable identifier: `<script file stem>/<case name>`
    pub id: String,
    /// Declared viewport, applied before the first action runs
    pub viewport: Viewport,
    pub actions: Vec<Action>,
    /// Per-test override of the run-level diff tolerance
    pub tolerance: Option<f64>,
}

/// Decoded screenshot tagged with the capture that produced it
#[derive(Debug, Clone)]
pub struct CapturedImage {
    pub test_id: String,
    pub label: String,
    pub image: RgbaImage,
}

impl CapturedImage {
    pub fn new(test_id: impl Into<String>, label: impl Into<String>, image: RgbaImage) -> Self {
        Self {
            test_id: test_id.into(),
            label: label.into(),
            image,
        }
    }

    /// Decode PNG bytes as produced by a browser session or the golden store
    pub fn from_png(test_id: &str, label: &str, bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        Ok(Self::new(test_id, label, image))
    }

    /// Encode back to PNG for persistence
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)?;
        Ok(bytes)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Outcome of comparing a candidate capture against its golden image
#[derive(Debug, Clone)]
pub struct DiffResult {
    pub test_id: String,
    pub label: String,
    pub passed: bool,
    /// Fraction of pixels whose color distance exceeded the per-pixel
    /// threshold; forced to 1.0 on a dimension mismatch
    pub score: f64,
    pub differing_pixels: u64,
    pub total_pixels: u64,
    /// The two images had different dimensions; no pixel walk was attempted
    pub dimension_mismatch: bool,
    /// Visualization of differing regions, present only on failure
    pub diff_image: Option<RgbaImage>,
}

/// Lifecycle of one test case inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Pending,
    Running,
    Passed,
    Failed,
    Errored,
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestStatus::Pending => "pending",
            TestStatus::Running => "running",
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Errored => "errored",
        };
        write!(f, "{}", name)
    }
}

/// Per-capture record kept for the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub label: String,
    pub passed: bool,
    pub score: f64,
    /// Update mode overwrote the golden instead of comparing
    pub updated: bool,
    pub diff_artifact: Option<PathBuf>,
    pub candidate_artifact: Option<PathBuf>,
}

/// Final record for one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestOutcome {
    pub test_id: String,
    pub status: TestStatus,
    /// Failure or error cause; absent when the case passed
    pub cause: Option<String>,
    pub captures: Vec<CaptureOutcome>,
}

impl TestOutcome {
    pub fn passed(test_id: impl Into<String>, captures: Vec<CaptureOutcome>) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::Passed,
            cause: None,
            captures,
        }
    }

    pub fn failed(
        test_id: impl Into<String>,
        cause: impl Into<String>,
        captures: Vec<CaptureOutcome>,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::Failed,
            cause: Some(cause.into()),
            captures,
        }
    }

    pub fn errored(test_id: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            status: TestStatus::Errored,
            cause: Some(cause.into()),
            captures: Vec::new(),
        }
    }
}

/// Aggregate of one invocation, rendered by the report aggregator and
/// destroyed at process exit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// The run was interrupted; queued cases were skipped
    pub cancelled: bool,
    /// Sorted by test identifier for deterministic output
    pub outcomes: Vec<TestOutcome>,
}

impl RunOutcome {
    pub fn count(&self, status: TestStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn all_passed(&self) -> bool {
        self.outcomes.iter().all(|o| o.status == TestStatus::Passed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn test_png_round_trip() {
        let captured = CapturedImage::new("scripts/home", "hero", solid(4, 3, [10, 20, 30, 255]));
        let bytes = captured.to_png().unwrap();
        let decoded = CapturedImage::from_png("scripts/home", "hero", &bytes).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.image, captured.image);
    }

    #[test]
    fn test_from_png_rejects_garbage() {
        assert!(CapturedImage::from_png("t", "l", b"not a png").is_err());
    }

    #[test]
    fn test_run_outcome_counts() {
        let outcome = RunOutcome {
            started_at: Utc::now(),
            finished_at: Utc::now(),
            cancelled: false,
            outcomes: vec![
                TestOutcome::passed("a/one", Vec::new()),
                TestOutcome::failed("a/two", "0.5% of pixels differ", Vec::new()),
                TestOutcome::errored("a/three", "session died"),
            ],
        };
        assert_eq!(outcome.count(TestStatus::Passed), 1);
        assert_eq!(outcome.count(TestStatus::Failed), 1);
        assert_eq!(outcome.count(TestStatus::Errored), 1);
        assert!(!outcome.all_passed());
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TestStatus::Errored.to_string(), "errored");
        assert_eq!(TestStatus::Passed.to_string(), "passed");
    }
}
