//! Filesystem-backed golden store

use async_trait::async_trait;
use snapdiff_core::{CapturedImage, Result, SnapdiffError};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::{GoldenKey, GoldenStore};

/// Golden store rooted at a local directory.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// reader never observes a partially written golden.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &GoldenKey) -> PathBuf {
        self.root.join(key.relative_path())
    }
}

#[async_trait]
impl GoldenStore for FsStore {
    async fn get(&self, key: &GoldenKey) -> Result<Option<CapturedImage>> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no golden image for {}", key);
                return Ok(None);
            }
            Err(e) => {
                return Err(SnapdiffError::Store(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        let image = CapturedImage::from_png(&key.test_id, &key.label, &bytes)?;
        Ok(Some(image))
    }

    async fn put(&self, key: &GoldenKey, image: &CapturedImage) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SnapdiffError::Store(format!(
                    "failed to create {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let bytes = image.to_png()?;
        // write-new-then-rename so concurrent readers see old or new, never
        // a torn file
        let tmp = path.with_extension("png.tmp");
        std::fs::write(&tmp, &bytes).map_err(|e| {
            SnapdiffError::Store(format!("failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            SnapdiffError::Store(format!(
                "failed to move {} into place: {}",
                tmp.display(),
                e
            ))
        })?;

        debug!("stored golden image {} ({} bytes)", key, bytes.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    fn capture(test_id: &str, label: &str, color: [u8; 4]) -> CapturedImage {
        CapturedImage::new(test_id, label, RgbaImage::from_pixel(8, 6, Rgba(color)))
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let found = store
            .get(&GoldenKey::new("suite/home", "hero"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let key = GoldenKey::new("suite/home", "hero");
        let image = capture("suite/home", "hero", [1, 2, 3, 255]);

        store.put(&key, &image).await.unwrap();
        let fetched = store.get(&key).await.unwrap().expect("golden present");
        assert_eq!(fetched.image, image.image);
    }

    #[tokio::test]
    async fn test_put_overwrites_whole_file() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let key = GoldenKey::new("suite/home", "hero");

        store
            .put(&key, &capture("suite/home", "hero", [10, 0, 0, 255]))
            .await
            .unwrap();
        store
            .put(&key, &capture("suite/home", "hero", [0, 20, 0, 255]))
            .await
            .unwrap();

        let fetched = store.get(&key).await.unwrap().unwrap();
        assert_eq!(fetched.image.get_pixel(0, 0), &Rgba([0, 20, 0, 255]));
    }

    #[tokio::test]
    async fn test_no_temp_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let key = GoldenKey::new("suite/home", "hero");
        store
            .put(&key, &capture("suite/home", "hero", [5, 5, 5, 255]))
            .await
            .unwrap();

        let case_dir = dir.path().join("suite/home");
        let leftovers: Vec<_> = std::fs::read_dir(&case_dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().map_or(false, |ext| ext == "tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_labels_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let hero = GoldenKey::new("suite/home", "hero");
        let footer = GoldenKey::new("suite/home", "footer");

        store
            .put(&hero, &capture("suite/home", "hero", [1, 0, 0, 255]))
            .await
            .unwrap();
        store
            .put(&footer, &capture("suite/home", "footer", [0, 1, 0, 255]))
            .await
            .unwrap();

        assert_eq!(
            store.get(&hero).await.unwrap().unwrap().image.get_pixel(0, 0),
            &Rgba([1, 0, 0, 255])
        );
        assert_eq!(
            store
                .get(&footer)
                .await
                .unwrap()
                .unwrap()
                .image
                .get_pixel(0, 0),
            &Rgba([0, 1, 0, 255])
        );
    }
}
