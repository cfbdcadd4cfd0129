//! Invoice lifecycle state machine
//!
//! ```text
//! Idle -> Created -> Polling -> Paid
//!                       |
//!                       +-> TimedOut -> Polling (extend)
//!                                  \-> Cancelled (cancel or auto-dismiss)
//! ```
//!
//! Entering `Polling` arms two independent timers: the settlement poll and the
//! one second countdown. Every transition out of `Polling` cancels both and
//! bumps the epoch, so a timer that already observed its condition cannot
//! apply a second transition.

use crate::config::InvoiceTimings;
use crate::timer::{TimerKind, TimerSlot};
use crate::wallet::{LookupInvoiceRequest, MakeInvoiceRequest, WalletCapability, WalletContext};
use crate::{Error, Result, WalletError};
use lnpos_core::{
    format_memo, CurrencyContext, DisplayCurrency, Invoice, InvoiceRequest, LastInvoice,
};
use lnpos_storage::SettingsStore;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

const COUNTDOWN_TICK: Duration = Duration::from_secs(1);

/// Lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoicePhase {
    /// Waiting for an amount
    Idle,
    /// Invoice returned by the wallet
    Created,
    /// Waiting for settlement
    Polling,
    /// Settled
    Paid {
        /// Whether the settled invoice was a tip
        is_tip: bool,
    },
    /// Countdown exhausted, extend or cancel offered
    TimedOut,
    /// Abandoned, back to amount entry
    Cancelled,
}

impl InvoicePhase {
    /// Whether the settlement poll and countdown are running
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Polling)
    }
}

/// State published to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceSnapshot {
    /// Current phase
    pub phase: InvoicePhase,
    /// Displayed invoice
    pub invoice: Option<Invoice>,
    /// Countdown seconds left
    pub remaining_secs: u64,
    /// Whether the displayed invoice is a tip
    pub is_tip: bool,
}

impl InvoiceSnapshot {
    fn idle() -> Self {
        Self {
            phase: InvoicePhase::Idle,
            invoice: None,
            remaining_secs: 0,
            is_tip: false,
        }
    }
}

struct State {
    phase: InvoicePhase,
    invoice: Option<Invoice>,
    is_tip: bool,
    remaining_secs: u64,
    epoch: u64,
    wallet: Option<Arc<dyn WalletCapability>>,
    poll: TimerSlot,
    countdown: TimerSlot,
    dismiss: TimerSlot,
}

impl State {
    fn new() -> Self {
        Self {
            phase: InvoicePhase::Idle,
            invoice: None,
            is_tip: false,
            remaining_secs: 0,
            epoch: 0,
            wallet: None,
            poll: TimerSlot::new(TimerKind::SettlementPoll),
            countdown: TimerSlot::new(TimerKind::Countdown),
            dismiss: TimerSlot::new(TimerKind::PromptDismiss),
        }
    }

    fn snapshot(&self) -> InvoiceSnapshot {
        InvoiceSnapshot {
            phase: self.phase,
            invoice: self.invoice.clone(),
            remaining_secs: self.remaining_secs,
            is_tip: self.is_tip,
        }
    }

    fn cancel_timers(&mut self) {
        self.poll.cancel();
        self.countdown.cancel();
        self.dismiss.cancel();
    }

    fn clear(&mut self, phase: InvoicePhase) {
        self.cancel_timers();
        self.epoch = self.epoch.wrapping_add(1);
        self.phase = phase;
        self.invoice = None;
        self.is_tip = false;
        self.remaining_secs = 0;
        self.wallet = None;
    }
}

struct Shared {
    state: Mutex<State>,
    updates: watch::Sender<InvoiceSnapshot>,
    settings: SettingsStore,
    timings: InvoiceTimings,
}

impl Shared {
    fn publish(&self, state: &State) {
        self.updates.send_replace(state.snapshot());
    }

    /// Arm the settlement poll and a fresh countdown
    fn start_polling(self: &Arc<Self>, state: &mut State) {
        let (Some(wallet), Some(invoice)) = (state.wallet.clone(), state.invoice.as_ref()) else {
            return;
        };
        let payment_request = invoice.payment_request.clone();
        let epoch = state.epoch;
        let every = self.timings.poll_interval();

        state.remaining_secs = self.timings.countdown_secs;
        state.phase = InvoicePhase::Polling;
        state.poll.arm(poll_settlement(
            Arc::downgrade(self),
            epoch,
            wallet,
            payment_request,
            Instant::now() + every,
            every,
        ));
        state.countdown.arm(run_countdown(
            Arc::downgrade(self),
            epoch,
            Instant::now() + COUNTDOWN_TICK,
        ));
        self.publish(state);
    }

    fn settle(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch != epoch || !state.phase.is_polling() {
            tracing::debug!("Ignoring settlement for a stale invoice");
            return;
        }
        state.poll.cancel();
        state.countdown.cancel();
        state.epoch = state.epoch.wrapping_add(1);
        let is_tip = state.is_tip;
        state.phase = InvoicePhase::Paid { is_tip };
        self.publish(&state);
        drop(state);

        tracing::info!("Invoice paid (tip: {})", is_tip);
        if is_tip {
            if let Err(e) = self.settings.clear_last_invoice() {
                tracing::warn!("Failed to clear last invoice: {}", e);
            }
        }
    }

    /// One countdown second. Returns whether the countdown keeps running.
    fn countdown_tick(self: &Arc<Self>, epoch: u64) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch || !state.phase.is_polling() {
            return false;
        }

        state.remaining_secs = state.remaining_secs.saturating_sub(1);
        if state.remaining_secs > 0 {
            self.publish(&state);
            return true;
        }

        state.poll.cancel();
        state.countdown.cancel();
        state.epoch = state.epoch.wrapping_add(1);
        state.phase = InvoicePhase::TimedOut;
        let dismiss_epoch = state.epoch;
        state.dismiss.arm(auto_dismiss(
            Arc::downgrade(self),
            dismiss_epoch,
            self.timings.prompt_dismiss(),
        ));
        self.publish(&state);
        tracing::info!("Invoice countdown expired, offering extension");
        false
    }

    fn dismiss_prompt(&self, epoch: u64) {
        let mut state = self.state.lock();
        if state.epoch != epoch || state.phase != InvoicePhase::TimedOut {
            return;
        }
        state.clear(InvoicePhase::Cancelled);
        self.publish(&state);
        tracing::info!("Extension prompt dismissed, payment cancelled");
    }
}

async fn poll_settlement(
    shared: Weak<Shared>,
    epoch: u64,
    wallet: Arc<dyn WalletCapability>,
    payment_request: String,
    start: Instant,
    every: Duration,
) {
    let mut ticker = tokio::time::interval_at(start, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let request = LookupInvoiceRequest {
            payment_request: payment_request.clone(),
        };
        match wallet.lookup_invoice(request).await {
            Ok(response) if response.paid => {
                if let Some(shared) = shared.upgrade() {
                    shared.settle(epoch);
                }
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::debug!("Settlement lookup failed, retrying: {}", e),
        }
    }
}

async fn run_countdown(shared: Weak<Shared>, epoch: u64, start: Instant) {
    let mut ticker = tokio::time::interval_at(start, COUNTDOWN_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let Some(shared) = shared.upgrade() else {
            return;
        };
        if !shared.countdown_tick(epoch) {
            return;
        }
    }
}

async fn auto_dismiss(shared: Weak<Shared>, epoch: u64, after: Duration) {
    tokio::time::sleep(after).await;
    if let Some(shared) = shared.upgrade() {
        shared.dismiss_prompt(epoch);
    }
}

/// Invoice lifecycle controller
pub struct InvoiceController {
    shared: Arc<Shared>,
    wallets: WalletContext,
}

impl InvoiceController {
    /// Create a controller
    pub fn new(wallets: WalletContext, settings: SettingsStore, timings: InvoiceTimings) -> Self {
        let (updates, _) = watch::channel(InvoiceSnapshot::idle());
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::new()),
                updates,
                settings,
                timings,
            }),
            wallets,
        }
    }

    /// Active wallets
    pub fn wallets(&self) -> &WalletContext {
        &self.wallets
    }

    /// Active wallets, mutable (e.g. after tip settings change)
    pub fn wallets_mut(&mut self) -> &mut WalletContext {
        &mut self.wallets
    }

    /// Settings store
    pub fn settings(&self) -> &SettingsStore {
        &self.shared.settings
    }

    /// Subscribe to state changes
    pub fn subscribe(&self) -> watch::Receiver<InvoiceSnapshot> {
        self.shared.updates.subscribe()
    }

    /// Current state
    pub fn snapshot(&self) -> InvoiceSnapshot {
        self.shared.state.lock().snapshot()
    }

    /// Current phase
    pub fn phase(&self) -> InvoicePhase {
        self.shared.state.lock().phase
    }

    /// Charge an amount typed in the display currency.
    ///
    /// The amount is converted with the context's rate and the memo embeds the
    /// fiat amount shown to the customer.
    pub async fn charge(&self, amount_display: &str, ctx: &CurrencyContext) -> Result<Invoice> {
        let amount = ctx.parse_amount(amount_display)?;
        let amount_sats = ctx.to_sats(amount)?;
        let label = self.shared.settings.merchant_label()?;
        let fiat = (!ctx.currency().is_sats()).then(|| ctx.format(amount));
        let request = InvoiceRequest::new(amount_sats, format_memo(&label, fiat.as_deref()))?;
        self.create(request, ctx.currency()).await
    }

    /// Create an invoice and start waiting for settlement.
    ///
    /// Any invoice currently shown is abandoned first. On wallet failure the
    /// controller stays idle and the error is returned.
    pub async fn create_invoice(&self, request: InvoiceRequest) -> Result<Invoice> {
        let currency = self.shared.settings.display_currency()?;
        self.create(request, currency).await
    }

    async fn create(&self, request: InvoiceRequest, currency: DisplayCurrency) -> Result<Invoice> {
        if request.amount_sats == 0 {
            return Err(lnpos_core::Error::InvalidAmount(
                "invoice amount must be greater than zero".to_string(),
            )
            .into());
        }
        let (wallet, role) = self.wallets.select_wallet(request.is_tip)?;

        let epoch = {
            let mut state = self.shared.state.lock();
            state.clear(InvoicePhase::Idle);
            self.shared.publish(&state);
            state.epoch
        };

        let response = wallet
            .make_invoice(MakeInvoiceRequest {
                amount: request.amount_sats.to_string(),
                default_memo: request.memo.clone(),
            })
            .await
            .map_err(|e| {
                tracing::warn!("Invoice creation failed on {:?} wallet: {}", role, e);
                e
            })?;
        if response.payment_request.trim().is_empty() {
            return Err(WalletError::Rejected("empty payment request".to_string()).into());
        }

        let invoice = Invoice::from_payment_request(response.payment_request, &request);

        let mut state = self.shared.state.lock();
        if state.epoch != epoch {
            tracing::debug!("Invoice creation superseded");
            return Err(Error::InvalidState(
                "invoice creation was cancelled".to_string(),
            ));
        }
        if !request.is_tip {
            self.shared
                .settings
                .set_last_invoice(&LastInvoice::from_invoice(&invoice, currency))?;
        }
        state.phase = InvoicePhase::Created;
        state.invoice = Some(invoice.clone());
        state.is_tip = request.is_tip;
        state.wallet = Some(wallet);
        state.remaining_secs = self.shared.timings.countdown_secs;
        self.shared.publish(&state);
        tracing::info!(
            "Invoice created: {} sats on {:?} wallet (tip: {})",
            invoice.amount_sats,
            role,
            request.is_tip
        );

        self.shared.start_polling(&mut state);
        Ok(invoice)
    }

    /// Restart the countdown and settlement poll after a timeout
    pub fn extend(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        if state.phase != InvoicePhase::TimedOut {
            return Err(Error::InvalidState(format!(
                "cannot extend an invoice in {:?}",
                state.phase
            )));
        }
        state.dismiss.cancel();
        state.epoch = state.epoch.wrapping_add(1);
        self.shared.start_polling(&mut state);
        tracing::info!("Invoice extended");
        Ok(())
    }

    /// Abandon the current invoice and stop every timer
    pub fn cancel(&self) {
        let mut state = self.shared.state.lock();
        let previous = state.phase;
        state.clear(InvoicePhase::Cancelled);
        self.shared.publish(&state);
        if matches!(
            previous,
            InvoicePhase::Created | InvoicePhase::Polling | InvoicePhase::TimedOut
        ) {
            tracing::info!("Invoice cancelled");
        }
    }
}

impl Drop for InvoiceController {
    fn drop(&mut self) {
        self.shared.state.lock().cancel_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockWallet;
    use lnpos_core::{Currency, TipSettings};
    use lnpos_storage::MemoryStore;

    fn controller(wallet: Arc<MockWallet>) -> InvoiceController {
        let settings = SettingsStore::new(Arc::new(MemoryStore::new()));
        let wallets = WalletContext::new(wallet, None, TipSettings::default());
        InvoiceController::new(wallets, settings, InvoiceTimings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_charge_converts_and_builds_memo() {
        let wallet = Arc::new(MockWallet::new());
        let controller = controller(wallet.clone());
        let usd = CurrencyContext::with_rate(Currency::USD, 1_600.0).unwrap();

        let invoice = controller.charge("6.25", &usd).await.unwrap();
        assert_eq!(invoice.amount_sats, 10_000);
        assert_eq!(invoice.description, "Lightning POS - $6.25");
        assert_eq!(wallet.created()[0].amount, "10000");

        let last = controller.settings().last_invoice().unwrap().unwrap();
        assert_eq!(last.currency, DisplayCurrency::Fiat(Currency::USD));
        assert_eq!(last.fiat_display.as_deref(), Some("$6.25"));
        assert_eq!(controller.phase(), InvoicePhase::Polling);
    }

    #[tokio::test(start_paused = true)]
    async fn test_charge_rejects_bad_amounts() {
        let controller = controller(Arc::new(MockWallet::new()));
        let sats = CurrencyContext::sats();

        assert!(controller.charge("0", &sats).await.unwrap_err().is_validation());
        assert!(controller.charge("abc", &sats).await.unwrap_err().is_validation());
        assert!(controller.charge("12.5", &sats).await.unwrap_err().is_validation());
        assert!(matches!(
            controller
                .charge("5", &CurrencyContext::new(DisplayCurrency::Fiat(Currency::EUR)))
                .await,
            Err(Error::Core(lnpos_core::Error::RateUnavailable(_)))
        ));
        assert_eq!(controller.phase(), InvoicePhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_extend_outside_timeout_rejected() {
        let controller = controller(Arc::new(MockWallet::new()));
        assert!(matches!(controller.extend(), Err(Error::InvalidState(_))));
    }
}
