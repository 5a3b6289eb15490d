//! In-memory golden store for tests and dry runs

use async_trait::async_trait;
use snapdiff_core::{CapturedImage, Result};
use std::collections::HashMap;
use tokio::sync::Mutex;

use crate::{GoldenKey, GoldenStore};

/// Map-backed store with the same semantics as the filesystem store.
///
/// Used by runner tests the way the real engine uses `FsStore`; puts are
/// whole-value replacements, so atomicity holds trivially.
#[derive(Default)]
pub struct MemoryStore {
    images: Mutex<HashMap<GoldenKey, CapturedImage>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of goldens currently stored
    pub async fn len(&self) -> usize {
        self.images.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.images.lock().await.is_empty()
    }
}

#[async_trait]
impl GoldenStore for MemoryStore {
    async fn get(&self, key: &GoldenKey) -> Result<Option<CapturedImage>> {
        Ok(self.images.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &GoldenKey, image: &CapturedImage) -> Result<()> {
        self.images.lock().await.insert(key.clone(), image.clone());
        Ok(())
    }
}
