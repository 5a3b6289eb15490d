//! Scripted in-memory session for tests
//!
//! Mirrors the observable behavior of a CDP session without a browser:
//! captures are deterministic solid-color PNGs derived from the current
//! URL, so "same page" renders identically across runs and "different
//! page" does not. Failure injection marks the session dead the way a
//! crashed tab would.

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use snapdiff_core::{Result, SnapdiffError, Viewport, WaitCondition};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::session::{Session, SessionFactory};

/// Counters shared by every mock session of one factory, for assertions
/// about pool behavior
#[derive(Default)]
pub struct MockState {
    /// Sessions ever created by the factory
    pub created: AtomicUsize,
    /// Sessions currently between their first navigation and their capture
    pub active: AtomicUsize,
    /// High-water mark of `active`
    pub max_active: AtomicUsize,
    /// Every action performed, in order of execution
    pub actions: std::sync::Mutex<Vec<String>>,
}

impl MockState {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, action: String) {
        self.actions
            .lock()
            .expect("mock action log poisoned")
            .push(action);
    }
}

/// Factory producing [`MockSession`]s wired to one shared [`MockState`]
pub struct MockSessionFactory {
    state: Arc<MockState>,
    fail_substr: Option<String>,
}

impl MockSessionFactory {
    pub fn new(state: Arc<MockState>) -> Self {
        Self {
            state,
            fail_substr: None,
        }
    }

    /// Navigations to URLs containing `substr` fail and kill the session,
    /// simulating a browser crash mid-test
    pub fn fail_navigation_to(mut self, substr: &str) -> Self {
        self.fail_substr = Some(substr.to_string());
        self
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn create(&self) -> Result<Box<dyn Session>> {
        self.state.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            fail_substr: self.fail_substr.clone(),
            current_url: String::new(),
            // small default keeps test images cheap; the runner always sets
            // the declared viewport before the first action anyway
            viewport: Viewport {
                width: 64,
                height: 48,
            },
            in_flight: false,
            alive: true,
        }))
    }
}

pub struct MockSession {
    state: Arc<MockState>,
    fail_substr: Option<String>,
    current_url: String,
    viewport: Viewport,
    in_flight: bool,
    alive: bool,
}

impl MockSession {
    fn begin_flight(&mut self) {
        if !self.in_flight {
            self.in_flight = true;
            let now = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.state.max_active.fetch_max(now, Ordering::SeqCst);
        }
    }

    fn end_flight(&mut self) {
        if self.in_flight {
            self.in_flight = false;
            self.state.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.state.record(format!("navigate {}", url));
        if let Some(substr) = &self.fail_substr {
            if url.contains(substr.as_str()) {
                self.alive = false;
                return Err(SnapdiffError::Session(format!(
                    "injected navigation failure for {}",
                    url
                )));
            }
        }
        self.begin_flight();
        self.current_url = url.to_string();
        // yield long enough for concurrently scheduled cases to overlap
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.state.record(format!("viewport {}", viewport));
        self.viewport = viewport;
        Ok(())
    }

    async fn wait(&mut self, condition: &WaitCondition) -> Result<()> {
        self.state.record(format!("wait {:?}", condition));
        if let WaitCondition::Delay(millis) = condition {
            tokio::time::sleep(Duration::from_millis((*millis).min(20))).await;
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        self.state.record(format!("click {}", selector));
        Ok(())
    }

    async fn capture(&mut self) -> Result<Vec<u8>> {
        self.state.record(format!("capture {}", self.current_url));
        let color = color_for(&self.current_url);
        let image = RgbaImage::from_pixel(self.viewport.width, self.viewport.height, Rgba(color));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
            .map_err(|e| SnapdiffError::Session(format!("mock encode failed: {}", e)))?;
        self.end_flight();
        Ok(bytes)
    }

    async fn reset(&mut self) -> Result<()> {
        self.state.record("reset".to_string());
        self.end_flight();
        self.current_url.clear();
        Ok(())
    }

    fn healthy(&self) -> bool {
        self.alive
    }
}

/// Deterministic page "rendering": the URL hashed down to a solid color
fn color_for(url: &str) -> [u8; 4] {
    let hash = fnv1a64(url.as_bytes());
    [
        (hash >> 16) as u8,
        (hash >> 8) as u8,
        hash as u8,
        255,
    ]
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}
