//! Bounded pool of browser sessions
//!
//! Capacity equals the configured concurrency. `acquire` blocks the calling
//! worker (only that worker) until a slot frees. Sessions are created
//! lazily; a session found dead on acquire or release is discarded and its
//! replacement is created on a later acquire, so one dying session fails
//! one test case while the pool keeps serving the others.

use snapdiff_core::{Result, SnapdiffError};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, warn};

use crate::session::{Session, SessionFactory};

pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    idle: Mutex<VecDeque<Box<dyn Session>>>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Exclusive handle on one pooled session.
///
/// Must be given back with [`SessionPool::release`] on every exit path;
/// the slot permit travels with the handle, so dropping it frees the slot
/// even if the session itself is lost.
pub struct ActiveSession {
    pub session: Box<dyn Session>,
    _permit: OwnedSemaphorePermit,
}

impl SessionPool {
    pub fn new(capacity: usize, factory: Arc<dyn SessionFactory>) -> Self {
        Self {
            factory,
            idle: Mutex::new(VecDeque::with_capacity(capacity)),
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Block until a slot frees, then return a live session.
    ///
    /// Dead idle sessions found here are discarded; a fresh one is created
    /// in their place.
    pub async fn acquire(&self) -> Result<ActiveSession> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| SnapdiffError::Session("session pool is closed".to_string()))?;

        loop {
            let candidate = self.idle.lock().await.pop_front();
            match candidate {
                Some(session) if session.healthy() => {
                    return Ok(ActiveSession {
                        session,
                        _permit: permit,
                    });
                }
                Some(_) => {
                    warn!("discarding dead idle session");
                }
                None => break,
            }
        }

        let session = self.factory.create().await?;
        debug!("created replacement session");
        Ok(ActiveSession {
            session,
            _permit: permit,
        })
    }

    /// Return a session to the pool, resetting it first so it is fungible
    /// for the next test case. A session that died or fails its reset is
    /// discarded; the freed slot lets a later acquire create a new one.
    pub async fn release(&self, mut active: ActiveSession) {
        if !active.session.healthy() {
            warn!("discarding dead session on release");
            return;
        }
        match active.session.reset().await {
            Ok(()) => {
                self.idle.lock().await.push_back(active.session);
            }
            Err(e) => {
                warn!("discarding session that failed reset: {}", e);
            }
        }
        // the permit inside `active` drops here, freeing the slot
    }
}
