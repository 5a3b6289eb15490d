//! Stable addressing for golden images

use std::fmt;
use std::path::PathBuf;

/// Key of one golden image: test case identifier plus capture label.
///
/// At most one golden exists per key at any time; distinct keys never
/// contend because each key maps to exactly one test/capture pair per run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GoldenKey {
    pub test_id: String,
    pub label: String,
}

impl GoldenKey {
    pub fn new(test_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            test_id: test_id.into(),
            label: label.into(),
        }
    }

    /// Relative location under a store root. Test identifiers are
    /// `<script>/<case>`, so goldens land in one directory per case.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.test_id).join(format!("{}.png", self.label))
    }
}

impl fmt::Display for GoldenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.test_id, self.label)
    }
}
