//! PIN gate for protected screens and actions
//!
//! The PIN is kept in plaintext in the local store. The point of sale is a
//! single-device, non-custodial terminal and a forgotten PIN is documented as
//! unrecoverable short of a full data wipe, so the value is not hashed.

use crate::{keys, Error, KeyValueStore, Result, SessionManager};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zeroize::Zeroizing;

/// Minimum PIN length
pub const MIN_PIN_LENGTH: usize = 4;

/// Maximum PIN length
pub const MAX_PIN_LENGTH: usize = 8;

/// Warning shown after a PIN is stored
pub const PIN_RESET_WARNING: &str =
    "Remember this PIN. It cannot be reset without wiping all application data.";

const NO_PIN_MESSAGE: &str = "No PIN has been set. Please set up a PIN first.";
const WRONG_PIN_MESSAGE: &str = "Incorrect PIN. Please try again.";

/// Result of a PIN prompt
pub enum PinEntry {
    /// Operator submitted a value
    Submitted(Zeroizing<String>),
    /// Operator dismissed the prompt
    Cancelled,
}

impl PinEntry {
    /// Submitted entry
    pub fn submitted(pin: &str) -> Self {
        Self::Submitted(Zeroizing::new(pin.to_string()))
    }
}

impl fmt::Debug for PinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submitted(_) => f.write_str("Submitted(<redacted>)"),
            Self::Cancelled => f.write_str("Cancelled"),
        }
    }
}

/// Operator-facing PIN prompt and alerts
#[async_trait]
pub trait PinPrompt: Send + Sync {
    /// Show a blocking PIN entry prompt
    async fn request_pin(&self) -> PinEntry;

    /// Show a blocking error alert
    fn show_error(&self, message: &str);

    /// Show a warning the operator must acknowledge
    fn show_warning(&self, message: &str);
}

/// Scripted prompt for tests and headless use
#[derive(Debug, Default)]
pub struct MockPinPrompt {
    entries: Mutex<VecDeque<PinEntry>>,
    errors: Mutex<Vec<String>>,
    warnings: Mutex<Vec<String>>,
    prompts: AtomicUsize,
}

impl MockPinPrompt {
    /// Prompt with no scripted entries (every request is cancelled)
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a submitted PIN
    pub fn push_pin(&self, pin: &str) {
        self.entries.lock().push_back(PinEntry::submitted(pin));
    }

    /// Queue a cancelled prompt
    pub fn push_cancel(&self) {
        self.entries.lock().push_back(PinEntry::Cancelled);
    }

    /// Number of prompts shown
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Error alerts shown
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().clone()
    }

    /// Warnings shown
    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().clone()
    }
}

#[async_trait]
impl PinPrompt for MockPinPrompt {
    async fn request_pin(&self) -> PinEntry {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .pop_front()
            .unwrap_or(PinEntry::Cancelled)
    }

    fn show_error(&self, message: &str) {
        self.errors.lock().push(message.to_string());
    }

    fn show_warning(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }
}

/// Where a protected flow stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinGateStatus {
    /// A session is active, no prompt needed
    Active,
    /// No PIN exists, the operator must set one up
    NeedsSetup,
    /// A PIN exists but no session is active
    NeedsVerification,
}

/// Outcome of guarding a protected screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinGateOutcome {
    /// Screen may render
    Granted,
    /// Caller must show the PIN setup screen
    RedirectToSetup,
    /// Verification failed or was cancelled
    Denied,
}

/// PIN gate
pub struct PinGate {
    store: Arc<dyn KeyValueStore>,
    session: SessionManager,
    prompt: Arc<dyn PinPrompt>,
}

impl PinGate {
    /// Create a gate
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        session: SessionManager,
        prompt: Arc<dyn PinPrompt>,
    ) -> Self {
        Self {
            store,
            session,
            prompt,
        }
    }

    /// Session manager used by the gate
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Whether a PIN is stored
    pub fn has_pin(&self) -> Result<bool> {
        Ok(self.stored_pin()?.is_some())
    }

    /// Current gate status
    pub fn status(&self) -> Result<PinGateStatus> {
        if !self.has_pin()? {
            return Ok(PinGateStatus::NeedsSetup);
        }
        if self.session.is_session_active() {
            return Ok(PinGateStatus::Active);
        }
        Ok(PinGateStatus::NeedsVerification)
    }

    /// Guard a protected screen. `on_fail` runs when verification is denied.
    pub async fn require_pin<F>(&self, on_fail: F) -> Result<PinGateOutcome>
    where
        F: FnOnce() + Send,
    {
        match self.status()? {
            PinGateStatus::NeedsSetup => {
                tracing::debug!("No PIN set, redirecting to setup");
                Ok(PinGateOutcome::RedirectToSetup)
            }
            PinGateStatus::Active => Ok(PinGateOutcome::Granted),
            PinGateStatus::NeedsVerification => {
                if self.verify_pin().await? {
                    Ok(PinGateOutcome::Granted)
                } else {
                    on_fail();
                    Ok(PinGateOutcome::Denied)
                }
            }
        }
    }

    /// Verify the operator, prompting only when no session is active
    pub async fn verify_pin(&self) -> Result<bool> {
        let Some(stored) = self.stored_pin()? else {
            self.prompt.show_error(NO_PIN_MESSAGE);
            return Ok(false);
        };

        if self.session.is_session_active() {
            return Ok(true);
        }

        match self.prompt.request_pin().await {
            PinEntry::Submitted(entered) => {
                if *entered == *stored {
                    self.session.start_session()?;
                    tracing::info!("PIN verified");
                    Ok(true)
                } else {
                    tracing::warn!("PIN verification failed");
                    self.prompt.show_error(WRONG_PIN_MESSAGE);
                    Ok(false)
                }
            }
            PinEntry::Cancelled => {
                tracing::debug!("PIN prompt cancelled");
                Ok(false)
            }
        }
    }

    /// Store a new PIN and start a session
    pub fn set_pin(&self, pin: &str, confirm_pin: &str) -> Result<()> {
        if self.has_pin()? {
            return Err(Error::Validation(
                "A PIN is already set. Use change PIN instead.".to_string(),
            ));
        }
        validate_pin(pin, confirm_pin)?;

        self.store.set(keys::PIN, pin)?;
        tracing::info!("PIN set");
        self.session.start_session()?;
        self.prompt.show_warning(PIN_RESET_WARNING);
        Ok(())
    }

    /// Verify the current PIN, then delete it so a new one can be set.
    /// Returns whether the PIN was removed.
    pub async fn change_pin(&self) -> Result<bool> {
        if !self.verify_pin().await? {
            return Ok(false);
        }
        self.store.remove(keys::PIN)?;
        tracing::info!("PIN removed for change");
        Ok(true)
    }

    /// Lock the terminal
    pub fn lock(&self) -> Result<()> {
        self.session.cancel_expiration();
        self.session.clear_session()
    }

    /// Verify the operator, then drop the session, both wallet connections
    /// and the last invoice. The PIN is kept.
    pub async fn logout(&self) -> Result<bool> {
        if !self.verify_pin().await? {
            return Ok(false);
        }
        self.lock()?;
        for key in [keys::PRIMARY_WALLET, keys::SECONDARY_WALLET, keys::LAST_INVOICE] {
            self.store.remove(key)?;
        }
        tracing::info!("Logged out");
        Ok(true)
    }

    fn stored_pin(&self) -> Result<Option<Zeroizing<String>>> {
        Ok(self
            .store
            .get(keys::PIN)?
            .filter(|pin| !pin.is_empty())
            .map(Zeroizing::new))
    }
}

/// Validate a new PIN and its confirmation
pub fn validate_pin(pin: &str, confirm_pin: &str) -> Result<()> {
    if pin != confirm_pin {
        return Err(Error::Validation("PINs do not match".to_string()));
    }
    if pin.len() < MIN_PIN_LENGTH || pin.len() > MAX_PIN_LENGTH {
        return Err(Error::Validation(format!(
            "PIN must be {}-{} digits",
            MIN_PIN_LENGTH, MAX_PIN_LENGTH
        )));
    }
    if !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Validation("PIN must contain only digits".to_string()));
    }
    Ok(())
}
