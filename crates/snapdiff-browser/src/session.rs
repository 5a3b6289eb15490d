//! Session abstraction over one controllable browser tab

use async_trait::async_trait;
use snapdiff_core::{Result, Viewport, WaitCondition};

/// One controllable browser tab: independently navigable and able to
/// screenshot its rendered viewport.
///
/// The pool hands out exclusive ownership, so a session is never shared
/// between two concurrently executing test cases.
#[async_trait]
pub trait Session: Send {
    /// Navigate to a URL and wait for the load to commit
    async fn navigate(&mut self, url: &str) -> Result<()>;

    /// Set the viewport used by subsequent captures
    async fn set_viewport(&mut self, viewport: Viewport) -> Result<()>;

    /// Block until the condition holds or the action budget runs out
    async fn wait(&mut self, condition: &WaitCondition) -> Result<()>;

    /// Click the first element matching a CSS selector
    async fn click(&mut self, selector: &str) -> Result<()>;

    /// Capture the rendered viewport as PNG bytes
    async fn capture(&mut self) -> Result<Vec<u8>>;

    /// Clear per-navigation state (cookies, in-page state) so the session
    /// is fungible across test cases
    async fn reset(&mut self) -> Result<()>;

    /// Cheap liveness check consulted by the pool on acquire and release
    fn healthy(&self) -> bool;
}

/// Creates sessions for the pool: lazily on first use and again whenever a
/// dead session has to be replaced.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn Session>>;
}
