//! Invoice model and memo handling
//!
//! Invoice memos follow the `"<label> - <fiat string>"` convention so the
//! displayed fiat amount of an already-created invoice can be recovered
//! without a fresh exchange rate.

use crate::currency::{CurrencyContext, DisplayCurrency};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Memo label used for tip invoices
pub const TIP_MEMO_LABEL: &str = "Tip";

/// Separator between memo label and fiat amount
const MEMO_SEPARATOR: &str = " - ";

/// Millisatoshis in one satoshi
const MSATS_PER_SAT: u128 = 1_000;

/// Millisatoshis in one bitcoin
const MSATS_PER_BTC: u128 = 100_000_000_000;

/// Build an invoice memo
pub fn format_memo(label: &str, fiat: Option<&str>) -> String {
    match fiat {
        Some(fiat) if !fiat.trim().is_empty() => {
            format!("{}{}{}", label.trim(), MEMO_SEPARATOR, fiat.trim())
        }
        _ => label.trim().to_string(),
    }
}

/// Recover the fiat string embedded in a memo, if any
pub fn fiat_from_memo(memo: &str) -> Option<&str> {
    memo.rsplit_once(MEMO_SEPARATOR)
        .map(|(_, fiat)| fiat.trim())
        .filter(|fiat| !fiat.is_empty())
}

/// Decode the amount of a BOLT11 payment request from its human-readable part.
///
/// Returns `None` for amountless requests, unknown prefixes and amounts that
/// are not a whole number of satoshis.
pub fn decode_amount_sats(payment_request: &str) -> Option<u64> {
    let lower = payment_request.trim().to_ascii_lowercase();
    let lower = lower.strip_prefix("lightning:").unwrap_or(&lower);
    let (hrp, _) = lower.rsplit_once('1')?;
    let rest = hrp.strip_prefix("ln")?;

    let amount = ["bcrt", "tbs", "bc", "tb", "sb"]
        .iter()
        .find_map(|network| rest.strip_prefix(network))?;
    if amount.is_empty() {
        return None;
    }

    let (digits, multiplier) = match amount.chars().last()? {
        'm' | 'u' | 'n' | 'p' => amount.split_at(amount.len() - 1),
        _ => (amount, ""),
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u128 = digits.parse().ok()?;

    let msats = match multiplier {
        "" => value.checked_mul(MSATS_PER_BTC)?,
        "m" => value.checked_mul(MSATS_PER_BTC / 1_000)?,
        "u" => value.checked_mul(MSATS_PER_BTC / 1_000_000)?,
        "n" => value.checked_mul(MSATS_PER_BTC / 1_000_000_000)?,
        "p" => {
            // 1 pico-bitcoin is a tenth of a millisatoshi
            if value % 10 != 0 {
                return None;
            }
            value / 10
        }
        _ => return None,
    };

    if msats % MSATS_PER_SAT != 0 {
        return None;
    }
    u64::try_from(msats / MSATS_PER_SAT).ok()
}

/// Request to create an invoice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    /// Amount in satoshis, strictly positive
    pub amount_sats: u64,
    /// Free-text memo
    pub memo: String,
    /// Whether this is a tip for a previously paid invoice
    pub is_tip: bool,
}

impl InvoiceRequest {
    /// Request for a regular payment
    pub fn new(amount_sats: u64, memo: impl Into<String>) -> Result<Self> {
        if amount_sats == 0 {
            return Err(Error::InvalidAmount(
                "invoice amount must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            amount_sats,
            memo: memo.into(),
            is_tip: false,
        })
    }

    /// Request for a tip payment
    pub fn tip(amount_sats: u64, memo: impl Into<String>) -> Result<Self> {
        let mut request = Self::new(amount_sats, memo)?;
        request.is_tip = true;
        Ok(request)
    }
}

/// Invoice returned by a wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    /// BOLT11 payment request
    pub payment_request: String,
    /// Amount in satoshis
    pub amount_sats: u64,
    /// Description (memo)
    pub description: String,
    /// Creation time (Unix seconds)
    pub created_at: i64,
}

impl Invoice {
    /// Build an invoice from a wallet response.
    ///
    /// The amount decoded from the payment request wins over the requested
    /// amount; a mismatch is logged.
    pub fn from_payment_request(payment_request: String, request: &InvoiceRequest) -> Self {
        let amount_sats = match decode_amount_sats(&payment_request) {
            Some(decoded) if decoded != request.amount_sats => {
                tracing::warn!(
                    "Payment request amount {} differs from requested {}",
                    decoded,
                    request.amount_sats
                );
                decoded
            }
            Some(decoded) => decoded,
            None => request.amount_sats,
        };

        Self {
            payment_request,
            amount_sats,
            description: request.memo.clone(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Fiat string embedded in the description
    pub fn fiat_display(&self) -> Option<&str> {
        fiat_from_memo(&self.description)
    }

    /// Amount as shown to the customer: the fiat string from the memo when
    /// present, otherwise the amount converted with the cached rate.
    pub fn display_amount(&self, ctx: &CurrencyContext) -> Result<String> {
        match self.fiat_display() {
            Some(fiat) if !ctx.currency().is_sats() => Ok(fiat.to_string()),
            _ => ctx.format_sats(self.amount_sats),
        }
    }
}

/// Short-lived record of the last base invoice, kept for the tip flow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastInvoice {
    /// Amount in satoshis
    pub amount_sats: u64,
    /// Invoice description
    pub description: String,
    /// Display currency at creation time
    pub currency: DisplayCurrency,
    /// Fiat amount shown to the customer, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiat_display: Option<String>,
    /// Creation time (Unix seconds)
    pub created_at: i64,
}

impl LastInvoice {
    /// Snapshot an invoice
    pub fn from_invoice(invoice: &Invoice, currency: DisplayCurrency) -> Self {
        Self {
            amount_sats: invoice.amount_sats,
            description: invoice.description.clone(),
            currency,
            fiat_display: invoice.fiat_display().map(str::to_string),
            created_at: invoice.created_at,
        }
    }
}
