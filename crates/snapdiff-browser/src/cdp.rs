//! Chrome DevTools Protocol sessions via headless_chrome
//!
//! One factory owns one browser process (or one connection to an external
//! debugger); each session is a tab of that browser. Tabs are independently
//! navigable and capture their own viewport, which is what makes them
//! poolable.

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Network;
use headless_chrome::protocol::cdp::Page::{self, CaptureScreenshotFormatOption};
use headless_chrome::{Browser, LaunchOptions, Tab};
use snapdiff_core::{Result, SnapdiffError, Viewport, WaitCondition, DEFAULT_VIEWPORT};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::session::{Session, SessionFactory};

/// Browser-level configuration shared by every session
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run without a visible window (default: true)
    pub headless: bool,
    /// Extra HTTP headers sent with every request
    pub headers: Vec<(String, String)>,
    /// Budget for a single wait/navigation
    pub action_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            headers: Vec::new(),
            action_timeout: Duration::from_secs(30),
        }
    }
}

/// Session factory backed by one Chrome/Chromium instance
pub struct CdpSessionFactory {
    browser: Browser,
    config: BrowserConfig,
}

impl CdpSessionFactory {
    /// Launch a browser process owned by this factory
    pub fn launch(config: BrowserConfig) -> Result<Self> {
        info!("launching browser (headless: {})", config.headless);

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((DEFAULT_VIEWPORT.width, DEFAULT_VIEWPORT.height)))
            .idle_browser_timeout(Duration::from_secs(600))
            .args(vec![
                OsStr::new("--force-device-scale-factor=1"),
                OsStr::new("--hide-scrollbars"),
                OsStr::new("--disable-gpu"),
            ])
            .build()
            .map_err(|e| SnapdiffError::Session(format!("failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| SnapdiffError::Session(format!("failed to launch browser: {}", e)))?;

        Ok(Self { browser, config })
    }

    /// Attach to an already running browser
    /// (`chrome --remote-debugging-port=9222`)
    pub fn connect(debugger_url: &str, config: BrowserConfig) -> Result<Self> {
        info!("connecting to browser at {}", debugger_url);

        let browser = Browser::connect(debugger_url.to_string()).map_err(|e| {
            SnapdiffError::Session(format!(
                "failed to connect to browser at {}: {}",
                debugger_url, e
            ))
        })?;

        Ok(Self { browser, config })
    }
}

#[async_trait]
impl SessionFactory for CdpSessionFactory {
    async fn create(&self) -> Result<Box<dyn Session>> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| SnapdiffError::Session(format!("failed to create tab: {}", e)))?;

        if !self.config.headers.is_empty() {
            let headers: HashMap<&str, &str> = self
                .config
                .headers
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            tab.set_extra_http_headers(headers)
                .map_err(|e| SnapdiffError::Session(format!("failed to set headers: {}", e)))?;
        }

        debug!("created browser session");
        Ok(Box::new(CdpSession {
            tab,
            viewport: DEFAULT_VIEWPORT,
            action_timeout: self.config.action_timeout,
            alive: true,
        }))
    }
}

/// One live tab. The viewport is applied as a capture clip: the browser
/// window keeps its launch size while each session captures exactly the
/// region its test case declared.
pub struct CdpSession {
    tab: Arc<Tab>,
    viewport: Viewport,
    action_timeout: Duration,
    alive: bool,
}

impl CdpSession {
    /// Mark the session dead after a transport-level failure so the pool
    /// replaces it instead of reusing it
    fn fail(&mut self, message: String) -> SnapdiffError {
        self.alive = false;
        SnapdiffError::Session(message)
    }
}

#[async_trait]
impl Session for CdpSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        debug!("navigating to {}", url);
        let tab = Arc::clone(&self.tab);
        tab.navigate_to(url)
            .map_err(|e| self.fail(format!("failed to navigate to {}: {}", url, e)))?;
        tab.wait_until_navigated()
            .map_err(|e| self.fail(format!("navigation to {} did not settle: {}", url, e)))?;
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        debug!("viewport set to {}", viewport);
        self.viewport = viewport;
        Ok(())
    }

    async fn wait(&mut self, condition: &WaitCondition) -> Result<()> {
        match condition {
            WaitCondition::NetworkIdle => {
                self.tab.wait_until_navigated().map_err(|e| {
                    SnapdiffError::Session(format!("wait for idle failed: {}", e))
                })?;
            }
            WaitCondition::Delay(millis) => {
                tokio::time::sleep(Duration::from_millis(*millis)).await;
            }
            WaitCondition::Selector(selector) => {
                self.tab
                    .wait_for_element_with_custom_timeout(selector, self.action_timeout)
                    .map_err(|_| {
                        SnapdiffError::ActionTimeout(
                            self.action_timeout.as_millis() as u64,
                            format!("element not found: {}", selector),
                        )
                    })?;
            }
        }
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<()> {
        debug!("clicking {}", selector);
        let element = self
            .tab
            .wait_for_element_with_custom_timeout(selector, self.action_timeout)
            .map_err(|_| {
                SnapdiffError::ActionTimeout(
                    self.action_timeout.as_millis() as u64,
                    format!("element not found: {}", selector),
                )
            })?;
        element
            .click()
            .map_err(|e| SnapdiffError::Session(format!("click on {} failed: {}", selector, e)))?;
        Ok(())
    }

    async fn capture(&mut self) -> Result<Vec<u8>> {
        let clip = Page::Viewport {
            x: 0.0,
            y: 0.0,
            width: f64::from(self.viewport.width),
            height: f64::from(self.viewport.height),
            scale: 1.0,
        };
        let tab = Arc::clone(&self.tab);
        let png = tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, Some(clip), true)
            .map_err(|e| self.fail(format!("screenshot capture failed: {}", e)))?;
        debug!("captured {} bytes", png.len());
        Ok(png)
    }

    async fn reset(&mut self) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        tab.navigate_to("about:blank")
            .map_err(|e| self.fail(format!("reset navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| self.fail(format!("reset navigation did not settle: {}", e)))?;
        tab.call_method(Network::ClearBrowserCookies(None))
            .map_err(|e| self.fail(format!("failed to clear cookies: {}", e)))?;

        self.viewport = DEFAULT_VIEWPORT;
        Ok(())
    }

    fn healthy(&self) -> bool {
        self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_browser_config() {
        let config = BrowserConfig::default();
        assert!(config.headless);
        assert!(config.headers.is_empty());
        assert_eq!(config.action_timeout, Duration::from_secs(30));
    }
}
