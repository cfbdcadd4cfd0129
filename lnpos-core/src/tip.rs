//! Tip settings and tip calculation
//!
//! Tips are always a separate invoice created after the base payment settled;
//! this module only computes the tip amount in satoshis.

use crate::currency::{CurrencyContext, DisplayCurrency};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Presets used when the configured list yields no valid percentage
pub const FALLBACK_TIP_PERCENTAGES: [u32; 4] = [15, 18, 20, 25];

/// Maximum number of percentage presets
pub const MAX_TIP_PRESETS: usize = 6;

/// Percentage used to pre-fill an empty custom tip
pub const DEFAULT_CUSTOM_TIP_PERCENT: u32 = 15;

/// Maximum fraction digits accepted in a fiat custom tip
const MAX_FIAT_FRACTION_DIGITS: usize = 2;

/// Parse a comma separated list of percentages.
///
/// Non-numeric, zero and duplicate entries are dropped, the list is capped at
/// [`MAX_TIP_PRESETS`] and falls back to [`FALLBACK_TIP_PERCENTAGES`] when
/// nothing valid remains.
pub fn parse_percentages(input: &str) -> Vec<u32> {
    let mut percentages: Vec<u32> = Vec::with_capacity(MAX_TIP_PRESETS);

    for candidate in input.split(|c: char| c == ',' || c.is_whitespace()) {
        let Ok(value) = candidate.trim().trim_end_matches('%').parse::<u32>() else {
            continue;
        };
        if value == 0 || percentages.contains(&value) {
            continue;
        }
        percentages.push(value);
        if percentages.len() == MAX_TIP_PRESETS {
            break;
        }
    }

    if percentages.is_empty() {
        tracing::debug!("No valid tip percentage in {:?}, using fallback presets", input);
        return FALLBACK_TIP_PERCENTAGES.to_vec();
    }
    percentages
}

/// Tip configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TipSettings {
    /// Offer a tip after a paid invoice
    pub enabled: bool,
    /// Ordered percentage presets
    pub percentages: Vec<u32>,
    /// Allow the customer to enter an arbitrary tip
    pub allow_custom: bool,
    /// Route tips to the secondary wallet when it is connected
    pub use_secondary_wallet: bool,
}

impl Default for TipSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            percentages: FALLBACK_TIP_PERCENTAGES.to_vec(),
            allow_custom: true,
            use_secondary_wallet: false,
        }
    }
}

impl TipSettings {
    /// Replace presets from operator text input
    pub fn set_percentages_from_str(&mut self, input: &str) {
        self.percentages = parse_percentages(input);
    }

    /// Re-apply the preset invariants (used on values loaded from storage)
    pub fn normalized(mut self) -> Self {
        let joined = self
            .percentages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        self.percentages = parse_percentages(&joined);
        self
    }

    /// Presets rendered for display, e.g. `15, 18, 20, 25`
    pub fn percentages_display(&self) -> String {
        self.percentages
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Customer tip choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipSelection {
    /// No tip
    NoTip,
    /// Percentage of the base amount
    Percentage(u32),
    /// Custom amount entered in the display currency
    Custom,
}

/// Keep only characters a custom tip may contain in the given currency.
///
/// SATS keeps the digits before the first decimal point, so fractions are
/// floored. Fiat accepts digits, at most one decimal point and at most two
/// fraction digits.
pub fn filter_custom_input(raw: &str, currency: DisplayCurrency) -> String {
    if currency.is_sats() {
        let whole = raw.split('.').next().unwrap_or_default();
        return whole.chars().filter(|c| c.is_ascii_digit()).collect();
    }

    let mut filtered = String::with_capacity(raw.len());
    let mut seen_point = false;
    let mut fraction_digits = 0;
    for c in raw.chars() {
        match c {
            '0'..='9' if !seen_point => filtered.push(c),
            '0'..='9' if fraction_digits < MAX_FIAT_FRACTION_DIGITS => {
                fraction_digits += 1;
                filtered.push(c);
            }
            '.' if !seen_point => {
                seen_point = true;
                filtered.push(c);
            }
            _ => {}
        }
    }
    filtered
}

/// Tip amount computation
#[derive(Debug, Clone, Copy, Default)]
pub struct TipCalculator;

impl TipCalculator {
    /// Create new calculator
    pub fn new() -> Self {
        Self
    }

    /// `round(base * percent / 100)`
    pub fn percentage_tip(&self, base_sats: u64, percent: u32) -> Result<u64> {
        if percent == 0 {
            return Err(Error::Validation(
                "Tip percentage must be a positive integer".to_string(),
            ));
        }
        let tip = (u128::from(base_sats) * u128::from(percent) + 50) / 100;
        u64::try_from(tip).map_err(|_| Error::AmountOverflow(format!("{}% of {}", percent, base_sats)))
    }

    /// Tip in satoshis for a custom entry
    pub fn custom_tip(&self, input: &str, ctx: &CurrencyContext) -> Result<u64> {
        if ctx.currency().is_sats() {
            let digits = filter_custom_input(input, DisplayCurrency::Sats);
            if digits.is_empty() {
                return Ok(0);
            }
            return digits
                .parse::<u64>()
                .map_err(|_| Error::AmountOverflow(digits.clone()));
        }

        let filtered = filter_custom_input(input, ctx.currency());
        if filtered.is_empty() || filtered == "." {
            return Ok(0);
        }
        let value: f64 = filtered
            .parse()
            .map_err(|_| Error::Validation(format!("'{}' is not a number", input)))?;
        ctx.to_sats(value)
    }

    /// Tip in satoshis for the given selection
    pub fn tip_amount(
        &self,
        base_sats: u64,
        selection: TipSelection,
        custom_input: &str,
        ctx: &CurrencyContext,
    ) -> Result<u64> {
        match selection {
            TipSelection::NoTip => Ok(0),
            TipSelection::Percentage(percent) => self.percentage_tip(base_sats, percent),
            TipSelection::Custom => self.custom_tip(custom_input, ctx),
        }
    }

    /// Suggested custom value: [`DEFAULT_CUSTOM_TIP_PERCENT`] of the base,
    /// expressed in the display currency without symbol.
    pub fn default_custom_suggestion(&self, base_sats: u64, ctx: &CurrencyContext) -> Result<String> {
        let tip_sats = self.percentage_tip(base_sats, DEFAULT_CUSTOM_TIP_PERCENT)?;
        match ctx.currency() {
            DisplayCurrency::Sats => Ok(tip_sats.to_string()),
            DisplayCurrency::Fiat(currency) => {
                let decimals = currency.decimals().min(MAX_FIAT_FRACTION_DIGITS);
                Ok(format!("{:.*}", decimals, ctx.from_sats(tip_sats)?))
            }
        }
    }
}
