//! # snapdiff-script
//!
//! Parser for snapdiff test scripts.
//!
//! A script is a line-oriented text file of named test-case blocks:
//!
//! ```text
//! test homepage
//!   viewport 1280 800
//!   navigate {{ORIGIN}}/index.html
//!   wait idle
//!   click #accept-cookies
//!   capture hero
//! ```
//!
//! `{{KEY}}` placeholders are substituted from a caller-supplied variable
//! map before structural parsing; an unresolved placeholder is a parse
//! error, never a silent no-op. Parsing is pure and deterministic.

mod parser;
mod template;

pub use parser::parse_script;
pub use template::substitute;
