//! Wallet capability abstraction
//!
//! A wallet capability is a live connection to a remote wallet that can create
//! and look up invoices. The point of sale never talks to the wallet protocol
//! itself; a [`WalletConnector`] turns a stored connection descriptor into a
//! capability.

use crate::{Error, Result};
use async_trait::async_trait;
use lnpos_core::{TipSettings, WalletDescriptor};
use lnpos_storage::SettingsStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wallet errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    /// Connection could not be established
    #[error("Connection failed: {0}")]
    Connection(String),

    /// The connection lacks the required permission
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Network failure
    #[error("Network error: {0}")]
    Network(String),

    /// Wallet or user declined the request
    #[error("Request rejected: {0}")]
    Rejected(String),
}

/// Invoice creation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeInvoiceRequest {
    /// Amount in satoshis, string encoded
    pub amount: String,
    /// Invoice description
    pub default_memo: String,
}

/// Invoice creation response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MakeInvoiceResponse {
    /// BOLT11 payment request
    pub payment_request: String,
}

/// Invoice lookup request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupInvoiceRequest {
    /// BOLT11 payment request
    pub payment_request: String,
}

/// Invoice lookup response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupInvoiceResponse {
    /// Whether the invoice is settled
    pub paid: bool,
}

/// Live wallet connection
#[async_trait]
pub trait WalletCapability: Send + Sync {
    /// Enable the connection
    async fn enable(&self) -> std::result::Result<(), WalletError>;

    /// Create an invoice
    async fn make_invoice(
        &self,
        request: MakeInvoiceRequest,
    ) -> std::result::Result<MakeInvoiceResponse, WalletError>;

    /// Check whether an invoice is settled
    async fn lookup_invoice(
        &self,
        request: LookupInvoiceRequest,
    ) -> std::result::Result<LookupInvoiceResponse, WalletError>;
}

/// Turns a connection descriptor into an enabled capability
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Connect and enable
    async fn connect(
        &self,
        descriptor: &WalletDescriptor,
    ) -> std::result::Result<Arc<dyn WalletCapability>, WalletError>;
}

/// Which wallet served a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletRole {
    /// Main wallet
    Primary,
    /// Tip wallet
    Secondary,
}

/// Active wallets plus the tip routing setting
#[derive(Clone, Default)]
pub struct WalletContext {
    primary: Option<Arc<dyn WalletCapability>>,
    secondary: Option<Arc<dyn WalletCapability>>,
    tip_settings: TipSettings,
}

impl WalletContext {
    /// Context from already connected capabilities
    pub fn new(
        primary: Arc<dyn WalletCapability>,
        secondary: Option<Arc<dyn WalletCapability>>,
        tip_settings: TipSettings,
    ) -> Self {
        Self {
            primary: Some(primary),
            secondary,
            tip_settings,
        }
    }

    /// Connect both wallets.
    ///
    /// A primary failure fails activation. A secondary failure is logged and
    /// leaves the context without a tip wallet.
    pub async fn activate(
        connector: &dyn WalletConnector,
        primary: &WalletDescriptor,
        secondary: Option<&WalletDescriptor>,
        tip_settings: TipSettings,
    ) -> Result<Self> {
        let primary_capability = connector.connect(primary).await.map_err(|e| {
            tracing::warn!("Primary wallet {} failed to connect: {}", primary.redacted(), e);
            e
        })?;
        tracing::info!("Primary wallet connected: {}", primary.redacted());

        let secondary_capability = match secondary {
            Some(descriptor) => match connector.connect(descriptor).await {
                Ok(capability) => {
                    tracing::info!("Tip wallet connected: {}", descriptor.redacted());
                    Some(capability)
                }
                Err(e) => {
                    tracing::warn!(
                        "Tip wallet {} failed to connect, tips go to the main wallet: {}",
                        descriptor.redacted(),
                        e
                    );
                    None
                }
            },
            None => None,
        };

        Ok(Self::new(primary_capability, secondary_capability, tip_settings))
    }

    /// Main wallet
    pub fn primary(&self) -> Option<&Arc<dyn WalletCapability>> {
        self.primary.as_ref()
    }

    /// Tip wallet, if connected
    pub fn secondary(&self) -> Option<&Arc<dyn WalletCapability>> {
        self.secondary.as_ref()
    }

    /// Tip settings used for routing
    pub fn tip_settings(&self) -> &TipSettings {
        &self.tip_settings
    }

    /// Replace the tip settings
    pub fn set_tip_settings(&mut self, tip_settings: TipSettings) {
        self.tip_settings = tip_settings;
    }

    /// Pick the wallet for a request. Tips go to the tip wallet only when it
    /// is connected and routing to it is enabled.
    pub fn select_wallet(&self, is_tip: bool) -> Result<(Arc<dyn WalletCapability>, WalletRole)> {
        if is_tip && self.tip_settings.use_secondary_wallet {
            if let Some(secondary) = &self.secondary {
                return Ok((Arc::clone(secondary), WalletRole::Secondary));
            }
        }
        self.primary
            .as_ref()
            .map(|primary| (Arc::clone(primary), WalletRole::Primary))
            .ok_or(Error::NoWallet)
    }
}

impl std::fmt::Debug for WalletContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletContext")
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.is_some())
            .field("tip_settings", &self.tip_settings)
            .finish()
    }
}

/// Activate the wallets stored in settings.
///
/// When the primary wallet cannot be connected its descriptor is removed so
/// the operator is sent back to connection entry.
pub async fn connect_stored_wallets(
    connector: &dyn WalletConnector,
    settings: &SettingsStore,
) -> Result<WalletContext> {
    let primary = settings.primary_wallet()?.ok_or(Error::NoWallet)?;
    let secondary = settings.secondary_wallet()?;
    let tip_settings = settings.tip_settings()?;

    match WalletContext::activate(connector, &primary, secondary.as_ref(), tip_settings).await {
        Ok(context) => Ok(context),
        Err(e) => {
            settings.clear_wallets()?;
            Err(e)
        }
    }
}

// ============================================================================
// Mock wallet
// ============================================================================

const BECH32_CHARSET: &[u8; 32] = b"qpzry9x8gf2tvdw0s3jn54khce6mua7l";

/// In-memory wallet for tests and demos
#[derive(Debug, Default)]
pub struct MockWallet {
    paid: AtomicBool,
    fail_enable: AtomicBool,
    fail_make_invoice: AtomicBool,
    invoice_delay: Mutex<Option<Duration>>,
    fail_lookup: AtomicBool,
    counter: AtomicU64,
    lookups: AtomicUsize,
    created: Mutex<Vec<MakeInvoiceRequest>>,
}

impl MockWallet {
    /// Wallet that creates invoices which stay unpaid
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every invoice as settled (or not)
    pub fn set_paid(&self, paid: bool) {
        self.paid.store(paid, Ordering::SeqCst);
    }

    /// Make `enable` fail
    pub fn fail_enable(&self, fail: bool) {
        self.fail_enable.store(fail, Ordering::SeqCst);
    }

    /// Make invoice creation fail
    pub fn fail_make_invoice(&self, fail: bool) {
        self.fail_make_invoice.store(fail, Ordering::SeqCst);
    }

    /// Delay every invoice creation by `delay`
    pub fn set_invoice_delay(&self, delay: Duration) {
        *self.invoice_delay.lock() = Some(delay);
    }

    /// Make lookups fail
    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    /// Number of lookups received
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Invoice requests received
    pub fn created(&self) -> Vec<MakeInvoiceRequest> {
        self.created.lock().clone()
    }

    fn payment_request(&self, amount_sats: u64) -> String {
        // Amount in nano-BTC (10 per sat); the data part avoids '1'
        let mut n = self.counter.fetch_add(1, Ordering::SeqCst);
        let mut data = String::from("pp5");
        loop {
            data.push(char::from(BECH32_CHARSET[(n % 32) as usize]));
            n /= 32;
            if n == 0 {
                break;
            }
        }
        format!("lnbc{}n1{}", amount_sats.saturating_mul(10), data)
    }
}

#[async_trait]
impl WalletCapability for MockWallet {
    async fn enable(&self) -> std::result::Result<(), WalletError> {
        if self.fail_enable.load(Ordering::SeqCst) {
            return Err(WalletError::Connection("mock wallet unreachable".to_string()));
        }
        Ok(())
    }

    async fn make_invoice(
        &self,
        request: MakeInvoiceRequest,
    ) -> std::result::Result<MakeInvoiceResponse, WalletError> {
        let delay = *self.invoice_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_make_invoice.load(Ordering::SeqCst) {
            return Err(WalletError::PermissionDenied("make_invoice".to_string()));
        }
        let amount_sats: u64 = request
            .amount
            .parse()
            .map_err(|_| WalletError::Rejected(format!("bad amount {:?}", request.amount)))?;
        let payment_request = self.payment_request(amount_sats);
        self.created.lock().push(request);
        Ok(MakeInvoiceResponse { payment_request })
    }

    async fn lookup_invoice(
        &self,
        _request: LookupInvoiceRequest,
    ) -> std::result::Result<LookupInvoiceResponse, WalletError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(WalletError::Network("mock lookup failure".to_string()));
        }
        Ok(LookupInvoiceResponse {
            paid: self.paid.load(Ordering::SeqCst),
        })
    }
}

/// Connector handing out [`MockWallet`]s keyed by connection string
#[derive(Debug, Default)]
pub struct MockConnector {
    wallets: Mutex<HashMap<String, Arc<MockWallet>>>,
    unreachable: Mutex<HashSet<String>>,
}

impl MockConnector {
    /// Empty connector
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the wallet served for a descriptor
    pub fn insert(&self, descriptor: &WalletDescriptor, wallet: Arc<MockWallet>) {
        self.wallets
            .lock()
            .insert(descriptor.as_str().to_string(), wallet);
    }

    /// Make connecting to a descriptor fail
    pub fn set_unreachable(&self, descriptor: &WalletDescriptor) {
        self.unreachable
            .lock()
            .insert(descriptor.as_str().to_string());
    }
}

#[async_trait]
impl WalletConnector for MockConnector {
    async fn connect(
        &self,
        descriptor: &WalletDescriptor,
    ) -> std::result::Result<Arc<dyn WalletCapability>, WalletError> {
        if self.unreachable.lock().contains(descriptor.as_str()) {
            return Err(WalletError::Connection(format!(
                "{} unreachable",
                descriptor.redacted()
            )));
        }
        let wallet = self
            .wallets
            .lock()
            .entry(descriptor.as_str().to_string())
            .or_default()
            .clone();
        wallet.enable().await?;
        Ok(wallet)
    }
}
