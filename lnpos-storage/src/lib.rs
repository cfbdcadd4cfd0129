//! Local storage and access control for the Lightning point of sale
//!
//! Provides a device-local key/value store with in-memory and SQLite
//! backends, typed settings on top of it, and the PIN/session security layer.
//!
//! ## Security Features
//!
//! - **Session Window**: a single sliding 5 minute session started by PIN verification
//! - **PIN Gate**: protected screens require an active session or a PIN prompt
//! - **Expiration Callback**: at most one pending expiration timer, replaced on re-arm
//! - **Recovery Wipe**: full data wipe only offered to unauthenticated operators

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod clock;
pub mod database;
pub mod error;
pub mod keys;
pub mod migrations;
pub mod pin;
pub mod recovery;
pub mod session;
pub mod settings;
pub mod store;

pub use clock::{Clock, MockClock, SystemClock, TokioClock};
pub use database::SqliteStore;
pub use error::{Error, Result};
pub use pin::{
    validate_pin, MockPinPrompt, PinEntry, PinGate, PinGateOutcome, PinGateStatus, PinPrompt,
    MAX_PIN_LENGTH, MIN_PIN_LENGTH, PIN_RESET_WARNING,
};
pub use recovery::{recovery_affordance, wipe_all_data, RecoveryAffordance};
pub use session::{ExpirationCanceller, SessionManager, SESSION_DURATION};
pub use settings::{SettingsStore, DEFAULT_MERCHANT_LABEL};
pub use store::{KeyValueStore, MemoryStore};
