//! Storage keys

/// Operator PIN (plaintext, see [`crate::pin`])
pub const PIN: &str = "pos.pin";

/// Session expiration, Unix milliseconds
pub const SESSION_EXPIRES_AT: &str = "pos.session.expiresAt";

/// Primary wallet connection descriptor
pub const PRIMARY_WALLET: &str = "pos.wallet.primary";

/// Secondary (tip) wallet connection descriptor
pub const SECONDARY_WALLET: &str = "pos.wallet.secondary";

/// Selected display currency code
pub const DISPLAY_CURRENCY: &str = "pos.currency";

/// Tip settings (JSON)
pub const TIP_SETTINGS: &str = "pos.tipSettings";

/// Last base invoice snapshot (JSON)
pub const LAST_INVOICE: &str = "pos.lastInvoice";

/// Merchant label used in invoice memos
pub const MERCHANT_LABEL: &str = "pos.merchantLabel";

/// Every key owned by the point of sale
pub const ALL: [&str; 8] = [
    PIN,
    SESSION_EXPIRES_AT,
    PRIMARY_WALLET,
    SECONDARY_WALLET,
    DISPLAY_CURRENCY,
    TIP_SETTINGS,
    LAST_INVOICE,
    MERCHANT_LABEL,
];
