//! Sliding session window
//!
//! A session is a single stored expiration timestamp. It is started by a
//! successful PIN verification, extended by explicit operator actions and
//! destroyed by lock, logout or natural expiration. At most one expiration
//! callback is pending at any time.

use crate::{keys, Clock, KeyValueStore, Result};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Session lifetime
pub const SESSION_DURATION: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Default)]
struct ExpirationSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl ExpirationSlot {
    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Cancels one armed expiration callback
#[derive(Debug)]
#[must_use = "dropping the canceller leaves the callback armed"]
pub struct ExpirationCanceller {
    slot: Weak<Mutex<ExpirationSlot>>,
    generation: u64,
}

impl ExpirationCanceller {
    fn noop() -> Self {
        Self {
            slot: Weak::new(),
            generation: 0,
        }
    }

    /// Prevent the callback from firing. Has no effect once the callback ran
    /// or after it was replaced by a newer one.
    pub fn cancel(self) {
        let Some(slot) = self.slot.upgrade() else {
            return;
        };
        let mut slot = slot.lock();
        if slot.generation == self.generation {
            slot.cancel();
        }
    }
}

/// Session manager
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    duration: Duration,
    expiration: Arc<Mutex<ExpirationSlot>>,
}

impl SessionManager {
    /// Create a manager with the default lifetime
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_duration(store, clock, SESSION_DURATION)
    }

    /// Create a manager with a custom lifetime
    pub fn with_duration(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        duration: Duration,
    ) -> Self {
        Self {
            store,
            clock,
            duration,
            expiration: Arc::new(Mutex::new(ExpirationSlot::default())),
        }
    }

    /// Session lifetime
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Stored expiration (Unix millis). Missing or malformed values read as none.
    pub fn expires_at(&self) -> Option<i64> {
        let raw = match self.store.get(keys::SESSION_EXPIRES_AT) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!("Failed to read session expiration: {}", e);
                return None;
            }
        };
        match raw.trim().parse::<i64>() {
            Ok(expires_at) => Some(expires_at),
            Err(_) => {
                tracing::debug!("Ignoring malformed session expiration {:?}", raw);
                None
            }
        }
    }

    /// Whether a session is active
    pub fn is_session_active(&self) -> bool {
        self.remaining().is_some()
    }

    /// Remaining session lifetime, `None` when inactive
    pub fn remaining(&self) -> Option<Duration> {
        let expires_at = self.expires_at()?;
        let left = expires_at.checked_sub(self.clock.now_millis())?;
        if left <= 0 {
            return None;
        }
        u64::try_from(left).ok().map(Duration::from_millis)
    }

    /// Start a session, replacing any existing one
    pub fn start_session(&self) -> Result<()> {
        let millis = i64::try_from(self.duration.as_millis()).unwrap_or(i64::MAX);
        let expires_at = self.clock.now_millis().saturating_add(millis);
        self.store
            .set(keys::SESSION_EXPIRES_AT, &expires_at.to_string())?;
        tracing::info!("Session started, expires at {}", expires_at);
        Ok(())
    }

    /// Extend the active session. Never creates a session; returns whether
    /// one was extended.
    pub fn extend_session(&self) -> Result<bool> {
        if !self.is_session_active() {
            tracing::debug!("No active session to extend");
            return Ok(false);
        }
        self.start_session()?;
        Ok(true)
    }

    /// Remove the session record
    pub fn clear_session(&self) -> Result<()> {
        self.store.remove(keys::SESSION_EXPIRES_AT)?;
        tracing::info!("Session cleared");
        Ok(())
    }

    /// Arm the expiration callback, replacing any pending one.
    ///
    /// When the session is already over it is cleared and nothing is armed.
    /// The callback runs at most once, on a tokio task. If the session was
    /// extended in the meantime the timer follows the new expiration.
    pub fn schedule_expiration<F>(&self, on_expire: F) -> ExpirationCanceller
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.expiration.lock();
        slot.cancel();

        let Some(remaining) = self.remaining() else {
            drop(slot);
            if let Err(e) = self.clear_session() {
                tracing::warn!("Failed to clear expired session: {}", e);
            }
            return ExpirationCanceller::noop();
        };

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No async runtime, session expiration callback not armed");
            return ExpirationCanceller::noop();
        };

        let generation = slot.generation;
        let manager = self.clone();
        let weak_slot = Arc::downgrade(&self.expiration);

        slot.handle = Some(runtime.spawn(async move {
            let mut wait = remaining;
            loop {
                tokio::time::sleep(wait).await;
                match manager.remaining() {
                    Some(left) => wait = left,
                    None => break,
                }
            }

            let Some(slot) = weak_slot.upgrade() else {
                return;
            };
            {
                let mut slot = slot.lock();
                if slot.generation != generation {
                    return;
                }
                slot.handle = None;
            }

            if let Err(e) = manager.clear_session() {
                tracing::warn!("Failed to clear expired session: {}", e);
            }
            tracing::info!("Session expired");
            on_expire();
        }));

        ExpirationCanceller {
            slot: Arc::downgrade(&self.expiration),
            generation,
        }
    }

    /// Cancel the pending expiration callback, if any
    pub fn cancel_expiration(&self) {
        self.expiration.lock().cancel();
    }

    /// Whether an expiration callback is pending
    pub fn has_pending_expiration(&self) -> bool {
        self.expiration.lock().handle.is_some()
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("duration", &self.duration)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, MockClock};

    fn manager() -> (SessionManager, Arc<MockClock>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(MockClock::new(1_700_000_000_000));
        let manager = SessionManager::new(store.clone(), clock.clone());
        (manager, clock, store)
    }

    #[test]
    fn test_start_and_expire() {
        let (manager, clock, _) = manager();
        assert!(!manager.is_session_active());

        manager.start_session().unwrap();
        assert!(manager.is_session_active());
        assert_eq!(manager.remaining(), Some(SESSION_DURATION));

        clock.advance(Duration::from_millis(299_999));
        assert!(manager.is_session_active());

        clock.advance(Duration::from_millis(1));
        assert!(!manager.is_session_active());
        assert_eq!(manager.remaining(), None);
    }

    #[test]
    fn test_extend_never_creates_session() {
        let (manager, clock, _) = manager();
        assert!(!manager.extend_session().unwrap());
        assert!(!manager.is_session_active());

        manager.start_session().unwrap();
        clock.advance(Duration::from_secs(200));
        assert!(manager.extend_session().unwrap());
        clock.advance(Duration::from_secs(200));
        assert!(manager.is_session_active());

        clock.advance(Duration::from_secs(100));
        assert!(!manager.extend_session().unwrap());
    }

    #[test]
    fn test_start_overwrites_existing_session() {
        let (manager, clock, _) = manager();
        manager.start_session().unwrap();
        let first = manager.expires_at().unwrap();

        clock.advance(Duration::from_secs(10));
        manager.start_session().unwrap();
        assert_eq!(manager.expires_at().unwrap(), first + 10_000);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (manager, _, _) = manager();
        manager.start_session().unwrap();
        manager.clear_session().unwrap();
        manager.clear_session().unwrap();
        assert!(!manager.is_session_active());
    }

    #[test]
    fn test_malformed_expiration_is_no_session() {
        let (manager, _, store) = manager();
        store.set(keys::SESSION_EXPIRES_AT, "soon").unwrap();
        assert!(!manager.is_session_active());
        assert_eq!(manager.expires_at(), None);
    }

    #[test]
    fn test_schedule_without_session_clears_and_returns_noop() {
        let (manager, _, store) = manager();
        store.set(keys::SESSION_EXPIRES_AT, "1").unwrap();

        let canceller = manager.schedule_expiration(|| panic!("must not fire"));
        assert!(!manager.has_pending_expiration());
        assert_eq!(store.get(keys::SESSION_EXPIRES_AT).unwrap(), None);
        canceller.cancel();
    }
}
