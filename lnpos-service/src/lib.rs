//! Payment orchestration for the Lightning point of sale
//!
//! Wallet capability abstraction, the invoice lifecycle state machine, the tip
//! flow, exchange rate lookup and the protected-screen navigation guard.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod invoice_controller;
pub mod navigation;
pub mod rates;
pub mod timer;
pub mod tip_flow;
pub mod wallet;

pub use config::{InvoiceTimings, PosConfig};
pub use error::{Error, Result};
pub use invoice_controller::{InvoiceController, InvoicePhase, InvoiceSnapshot};
pub use navigation::{NavigationEvent, Navigator, Screen, SESSION_RECHECK_INTERVAL};
pub use rates::{MockRates, PriceClient, PriceSource, RateError, RateLookup, RefreshRate};
pub use timer::{TimerKind, TimerSlot};
pub use tip_flow::{offer_tip, TipFlow, TipOutcome};
pub use wallet::{
    connect_stored_wallets, LookupInvoiceRequest, LookupInvoiceResponse, MakeInvoiceRequest,
    MakeInvoiceResponse, MockConnector, MockWallet, WalletCapability, WalletConnector,
    WalletContext, WalletError, WalletRole,
};
