//! # snapdiff-core
//!
//! Core types for the snapdiff visual-regression engine.
//!
//! Snapdiff drives a real browser through declarative test scripts, captures
//! screenshots at marked points, and compares each capture against a
//! previously accepted golden image. This crate holds the data model shared
//! by every other crate:
//!
//! - Parsed test cases and their actions
//! - Captured and compared images
//! - Per-test and per-run outcomes
//! - The unified error type and the run configuration record

mod config;
mod error;
mod types;

pub use config::{default_concurrency, RunConfig};
pub use error::{Result, SnapdiffError};
pub use types::*;
