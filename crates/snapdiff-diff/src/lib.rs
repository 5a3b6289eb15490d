//! # snapdiff-diff
//!
//! Pixel comparison engine: turns a golden/candidate pair into a verdict,
//! a numeric difference score, and (on failure) a visualization image of
//! the differing regions.

mod compare;

pub use compare::{compare, DiffOptions};
