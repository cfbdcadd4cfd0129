//! Lightning point-of-sale core
//!
//! This crate implements the pure domain logic of the point of sale: currency
//! conversion, tip settings and tip calculation, the invoice model and memo
//! handling, and wallet connection descriptors. It performs no I/O.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod currency;
pub mod descriptor;
pub mod error;
pub mod invoice;
pub mod tip;

pub use currency::{Currency, CurrencyContext, DisplayCurrency, SATS_PER_BTC};
pub use descriptor::{WalletDescriptor, NWC_SCHEMES};
pub use error::{Error, ErrorCategory, Result};
pub use invoice::{
    decode_amount_sats, fiat_from_memo, format_memo, Invoice, InvoiceRequest, LastInvoice,
    TIP_MEMO_LABEL,
};
pub use tip::{
    filter_custom_input, parse_percentages, TipCalculator, TipSelection, TipSettings,
    DEFAULT_CUSTOM_TIP_PERCENT, FALLBACK_TIP_PERCENTAGES, MAX_TIP_PRESETS,
};
