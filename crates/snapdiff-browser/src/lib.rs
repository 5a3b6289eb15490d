//! # snapdiff-browser
//!
//! Browser sessions and the bounded session pool.
//!
//! A session is one controllable browser tab: navigable, clickable, and
//! able to screenshot its viewport. The [`Session`] trait is the seam
//! between the engine and the Chrome DevTools Protocol; [`CdpSession`] is
//! the real implementation and [`MockSession`] the scripted one used by
//! tests. The [`SessionPool`] owns a fixed number of slots equal to the
//! configured concurrency and recycles sessions across test cases.

mod cdp;
mod mock;
mod pool;
mod session;

pub use cdp::{BrowserConfig, CdpSession, CdpSessionFactory};
pub use mock::{MockSession, MockSessionFactory, MockState};
pub use pool::{ActiveSession, SessionPool};
pub use session::{Session, SessionFactory};
