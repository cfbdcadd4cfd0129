//! Protected screen navigation guard
//!
//! Two mechanisms watch for session expiry while a screen is shown: the
//! session manager's expiration callback (re-armed on every navigation) and,
//! on protected screens, a periodic re-check of the session. Whichever
//! notices first handles the expiry; the other becomes a no-op.

use crate::timer::{TimerKind, TimerSlot};
use crate::Result;
use lnpos_storage::{ExpirationCanceller, PinGate, PinGateOutcome, SessionManager};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Protected screen session re-check interval
pub const SESSION_RECHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Application screens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Amount entry
    Home,
    /// Invoice display
    Invoice,
    /// Payment received
    Paid,
    /// Tip entry
    Tip,
    /// Wallet connection entry
    Connect,
    /// PIN setup
    PinSetup,
    /// Merchant and currency settings
    Settings,
    /// PIN and lock settings
    Security,
    /// Wallet and tip wallet settings
    WalletSettings,
}

impl Screen {
    /// Whether the screen requires an active session
    pub fn is_protected(&self) -> bool {
        matches!(self, Self::Settings | Self::Security | Self::WalletSettings)
    }
}

/// Signals for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationEvent {
    /// Session expired on a protected screen; the navigator moved to home
    ForcedHome,
    /// Session expired elsewhere; show a non-blocking notice
    SessionExpiredNotice,
}

#[derive(Debug)]
struct NavState {
    screen: Screen,
    generation: u64,
    expiry_handled: bool,
}

struct Guard {
    state: Mutex<NavState>,
    events: mpsc::UnboundedSender<NavigationEvent>,
    session: SessionManager,
}

impl Guard {
    fn handle_expiry(&self, generation: u64) {
        let event = {
            let mut state = self.state.lock();
            if state.generation != generation || state.expiry_handled {
                return;
            }
            state.expiry_handled = true;
            if state.screen.is_protected() {
                state.screen = Screen::Home;
                NavigationEvent::ForcedHome
            } else {
                NavigationEvent::SessionExpiredNotice
            }
        };
        self.session.cancel_expiration();
        tracing::info!("Session expired: {:?}", event);
        if self.events.send(event).is_err() {
            tracing::debug!("Navigation event dropped, no listener");
        }
    }
}

/// Screen tracker that enforces session expiry
pub struct Navigator {
    guard: Arc<Guard>,
    recheck: TimerSlot,
    recheck_interval: Duration,
    expiration: Option<ExpirationCanceller>,
}

impl Navigator {
    /// Navigator starting on [`Screen::Home`], with its event stream
    pub fn new(
        session: SessionManager,
        recheck_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<NavigationEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let navigator = Self {
            guard: Arc::new(Guard {
                state: Mutex::new(NavState {
                    screen: Screen::Home,
                    generation: 0,
                    expiry_handled: false,
                }),
                events,
                session,
            }),
            recheck: TimerSlot::new(TimerKind::SessionRecheck),
            recheck_interval,
            expiration: None,
        };
        (navigator, receiver)
    }

    /// Screen currently shown
    pub fn current(&self) -> Screen {
        self.guard.state.lock().screen
    }

    /// Show `screen`. Tears down the previous screen's timers and re-arms the
    /// expiration watch. Entering a protected screen without a session lands
    /// on home with [`NavigationEvent::ForcedHome`]. Must be called from
    /// within a tokio runtime.
    pub fn navigate(&mut self, screen: Screen) {
        self.recheck.cancel();
        if let Some(canceller) = self.expiration.take() {
            canceller.cancel();
        }

        let generation = {
            let mut state = self.guard.state.lock();
            state.screen = screen;
            state.generation = state.generation.wrapping_add(1);
            state.expiry_handled = false;
            state.generation
        };
        tracing::debug!("Navigated to {:?}", screen);

        let session = &self.guard.session;
        if !session.is_session_active() {
            // A protected screen never renders without a session
            if screen.is_protected() {
                self.guard.handle_expiry(generation);
            }
            return;
        }

        let guard = Arc::downgrade(&self.guard);
        self.expiration = Some(session.schedule_expiration(move || {
            if let Some(guard) = guard.upgrade() {
                guard.handle_expiry(generation);
            }
        }));

        if screen.is_protected() {
            let guard = Arc::downgrade(&self.guard);
            let every = self.recheck_interval;
            self.recheck.arm(async move {
                let start = tokio::time::Instant::now() + every;
                let mut ticker = tokio::time::interval_at(start, every);
                loop {
                    ticker.tick().await;
                    let Some(guard) = guard.upgrade() else {
                        return;
                    };
                    if !guard.session.is_session_active() {
                        guard.handle_expiry(generation);
                        return;
                    }
                }
            });
        }
    }

    /// Navigate to a protected screen through the PIN gate.
    ///
    /// Granted shows the screen, a missing PIN redirects to setup and a denied
    /// verification stays on the current screen.
    pub async fn open_protected(&mut self, screen: Screen, gate: &PinGate) -> Result<PinGateOutcome> {
        let outcome = gate.require_pin(|| tracing::debug!("PIN denied for {:?}", screen)).await?;
        match outcome {
            PinGateOutcome::Granted => self.navigate(screen),
            PinGateOutcome::RedirectToSetup => self.navigate(Screen::PinSetup),
            PinGateOutcome::Denied => {}
        }
        Ok(outcome)
    }

    /// Whether the protected screen re-check is running
    pub fn is_rechecking(&self) -> bool {
        self.recheck.is_armed()
    }
}

impl Drop for Navigator {
    fn drop(&mut self) {
        if let Some(canceller) = self.expiration.take() {
            canceller.cancel();
        }
    }
}
