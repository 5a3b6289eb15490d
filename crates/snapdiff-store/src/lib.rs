//! # snapdiff-store
//!
//! Golden image storage: the previously accepted reference screenshots that
//! captures are compared against.
//!
//! The store is a narrow abstraction — `get` and `put` under a stable key —
//! so the engine never cares whether goldens live on a local disk or behind
//! an object-store address resolved by an external collaborator. A missing
//! golden is an expected first-run condition and surfaces as `Ok(None)`,
//! not an error.

mod fs;
mod key;
mod memory;

pub use fs::FsStore;
pub use key::GoldenKey;
pub use memory::MemoryStore;

use async_trait::async_trait;
use snapdiff_core::{CapturedImage, Result};

/// Read/replace reference images under stable keys.
///
/// `put` must be atomic from the caller's perspective: a concurrent `get`
/// for the same key never observes a partially written image. The store
/// does not cache; every call touches the backing location directly.
#[async_trait]
pub trait GoldenStore: Send + Sync {
    /// Fetch the golden for a key; a missing golden is `Ok(None)`
    async fn get(&self, key: &GoldenKey) -> Result<Option<CapturedImage>>;

    /// Replace the golden for a key with a whole-image write
    async fn put(&self, key: &GoldenKey, image: &CapturedImage) -> Result<()>;
}
