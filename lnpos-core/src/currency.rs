//! Display currencies and satoshi conversion
//!
//! The set of supported currencies is a closed enum; symbols and minor-unit
//! decimals come from a single static table so every currency is exhaustively
//! enumerable. `SATS` is a pseudo-currency for which no conversion is applied.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Satoshis in one bitcoin
pub const SATS_PER_BTC: f64 = 100_000_000.0;

macro_rules! currency_table {
    ($name:ident { $($variant:ident => ($symbol:expr, $decimals:expr)),* $(,)? }) => {
        /// Fiat currency accepted for display and conversion
        #[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[allow(missing_docs)]
                $variant,
            )*
        }

        impl $name {
            /// All supported fiat currencies
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            /// ISO-4217 code
            pub fn code(&self) -> &'static str {
                match self {
                    $(Self::$variant => stringify!($variant),)*
                }
            }

            /// Display symbol
            pub fn symbol(&self) -> &'static str {
                match self {
                    $(Self::$variant => $symbol,)*
                }
            }

            /// Number of decimals of the minor unit
            pub fn decimals(&self) -> usize {
                match self {
                    $(Self::$variant => $decimals,)*
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.code())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.trim().to_uppercase().as_str() {
                    $(stringify!($variant) => Ok(Self::$variant),)*
                    other => Err(Error::InvalidCurrency(other.to_string())),
                }
            }
        }
    };
}

currency_table!(Currency {
    USD => ("$", 2),
    EUR => ("€", 2),
    GBP => ("£", 2),
    CAD => ("CA$", 2),
    AUD => ("A$", 2),
    NZD => ("NZ$", 2),
    CHF => ("CHF ", 2),
    JPY => ("¥", 0),
    CNY => ("CN¥", 2),
    KRW => ("₩", 0),
    INR => ("₹", 2),
    BRL => ("R$", 2),
    MXN => ("MX$", 2),
    ARS => ("AR$", 2),
    CLP => ("CLP$", 0),
    COP => ("COL$", 2),
    PEN => ("S/", 2),
    GTQ => ("Q", 2),
    SVC => ("₡", 2),
    SEK => ("kr ", 2),
    NOK => ("kr ", 2),
    DKK => ("kr ", 2),
    PLN => ("zł ", 2),
    CZK => ("Kč ", 2),
    HUF => ("Ft ", 2),
    TRY => ("₺", 2),
    UAH => ("₴", 2),
    ILS => ("₪", 2),
    AED => ("AED ", 2),
    SAR => ("SAR ", 2),
    ZAR => ("R", 2),
    NGN => ("₦", 2),
    KES => ("KSh ", 2),
    PHP => ("₱", 2),
    THB => ("฿", 2),
    VND => ("₫", 0),
    IDR => ("Rp ", 2),
    SGD => ("S$", 2),
    HKD => ("HK$", 2),
    TWD => ("NT$", 2),
});

/// Currency selected for amount entry and display
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DisplayCurrency {
    /// Satoshis, no conversion
    #[default]
    Sats,
    /// Fiat currency converted through an exchange rate
    Fiat(Currency),
}

impl DisplayCurrency {
    /// Code of the satoshi pseudo-currency
    pub const SATS_CODE: &'static str = "SATS";

    /// Currency code (`SATS` or ISO-4217)
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sats => Self::SATS_CODE,
            Self::Fiat(currency) => currency.code(),
        }
    }

    /// Whether this is the satoshi pseudo-currency
    pub fn is_sats(&self) -> bool {
        matches!(self, Self::Sats)
    }

    /// Decimals shown when entering or displaying an amount
    pub fn decimals(&self) -> usize {
        match self {
            Self::Sats => 0,
            Self::Fiat(currency) => currency.decimals(),
        }
    }

    /// Every selectable display currency, `SATS` first
    pub fn all() -> impl Iterator<Item = DisplayCurrency> {
        std::iter::once(Self::Sats).chain(Currency::ALL.iter().copied().map(Self::Fiat))
    }
}

impl fmt::Display for DisplayCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for DisplayCurrency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case(Self::SATS_CODE) {
            return Ok(Self::Sats);
        }
        s.parse::<Currency>().map(Self::Fiat)
    }
}

impl TryFrom<String> for DisplayCurrency {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DisplayCurrency> for String {
    fn from(value: DisplayCurrency) -> Self {
        value.code().to_string()
    }
}

/// Selected currency plus the cached conversion rate for it
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CurrencyContext {
    currency: DisplayCurrency,
    sats_per_unit: Option<f64>,
}

impl CurrencyContext {
    /// Context for the satoshi pseudo-currency
    pub fn sats() -> Self {
        Self::default()
    }

    /// Context for a currency whose rate has not been fetched yet
    pub fn new(currency: DisplayCurrency) -> Self {
        Self {
            currency,
            sats_per_unit: None,
        }
    }

    /// Context for a fiat currency with a known rate
    pub fn with_rate(currency: Currency, sats_per_unit: f64) -> Result<Self> {
        let mut ctx = Self::new(DisplayCurrency::Fiat(currency));
        ctx.set_rate(sats_per_unit)?;
        Ok(ctx)
    }

    /// Selected currency
    pub fn currency(&self) -> DisplayCurrency {
        self.currency
    }

    /// Cached satoshis per fiat unit (`None` for SATS or before the first fetch)
    pub fn rate(&self) -> Option<f64> {
        self.sats_per_unit
    }

    /// Whether a conversion can be performed right now
    pub fn is_ready(&self) -> bool {
        self.currency.is_sats() || self.sats_per_unit.is_some()
    }

    /// Change the selected currency. The cached rate is dropped when the
    /// selection actually changes.
    pub fn select(&mut self, currency: DisplayCurrency) -> bool {
        if self.currency == currency {
            return false;
        }
        self.currency = currency;
        self.sats_per_unit = None;
        true
    }

    /// Store a freshly fetched rate
    pub fn set_rate(&mut self, sats_per_unit: f64) -> Result<()> {
        if self.currency.is_sats() {
            return Ok(());
        }
        if !sats_per_unit.is_finite() || sats_per_unit <= 0.0 {
            return Err(Error::RateUnavailable(format!(
                "invalid rate {} for {}",
                sats_per_unit, self.currency
            )));
        }
        self.sats_per_unit = Some(sats_per_unit);
        Ok(())
    }

    fn require_rate(&self) -> Result<f64> {
        self.sats_per_unit
            .ok_or_else(|| Error::RateUnavailable(self.currency.code().to_string()))
    }

    /// Convert a displayed amount to satoshis, rounding to the nearest sat
    pub fn to_sats(&self, amount: f64) -> Result<u64> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(Error::InvalidAmount(amount.to_string()));
        }

        let sats = match self.currency {
            DisplayCurrency::Sats => amount.round(),
            DisplayCurrency::Fiat(_) => (amount * self.require_rate()?).round(),
        };

        if sats >= u64::MAX as f64 {
            return Err(Error::AmountOverflow(format!("{} sats", sats)));
        }
        Ok(sats as u64)
    }

    /// Convert satoshis to the displayed unit
    pub fn from_sats(&self, sats: u64) -> Result<f64> {
        match self.currency {
            DisplayCurrency::Sats => Ok(sats as f64),
            DisplayCurrency::Fiat(_) => Ok(sats as f64 / self.require_rate()?),
        }
    }

    /// Format a value in the displayed unit, e.g. `$12.50` or `1500 sats`
    pub fn format(&self, value: f64) -> String {
        match self.currency {
            DisplayCurrency::Sats => format!("{} sats", value.round() as u64),
            DisplayCurrency::Fiat(currency) => {
                format!("{}{:.*}", currency.symbol(), currency.decimals(), value)
            }
        }
    }

    /// Format a satoshi amount in the displayed unit
    pub fn format_sats(&self, sats: u64) -> Result<String> {
        Ok(self.format(self.from_sats(sats)?))
    }

    /// Parse an operator-entered amount in the displayed unit
    pub fn parse_amount(&self, input: &str) -> Result<f64> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidAmount("empty amount".to_string()));
        }
        let value: f64 = trimmed
            .parse()
            .map_err(|_| Error::Validation(format!("'{}' is not a number", trimmed)))?;
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidAmount(trimmed.to_string()));
        }
        if self.currency.is_sats() && value.fract() != 0.0 {
            return Err(Error::Validation(format!(
                "'{}' is not a whole number of sats",
                trimmed
            )));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!(" EUR ".parse::<Currency>().unwrap(), Currency::EUR);
        assert!("XXX".parse::<Currency>().is_err());
    }

    #[test]
    fn test_display_currency_parse() {
        assert_eq!("sats".parse::<DisplayCurrency>().unwrap(), DisplayCurrency::Sats);
        assert_eq!(
            "JPY".parse::<DisplayCurrency>().unwrap(),
            DisplayCurrency::Fiat(Currency::JPY)
        );
        assert!(matches!(
            "BTCX".parse::<DisplayCurrency>(),
            Err(Error::InvalidCurrency(_))
        ));
    }

    #[test]
    fn test_symbol_table_is_exhaustive() {
        for currency in Currency::ALL {
            assert!(!currency.symbol().is_empty(), "{} has no symbol", currency);
            assert_eq!(currency.code().parse::<Currency>().unwrap(), *currency);
        }
        assert_eq!(DisplayCurrency::all().count(), Currency::ALL.len() + 1);
    }

    #[test]
    fn test_display_currency_serde() {
        let json = serde_json::to_string(&DisplayCurrency::Fiat(Currency::GBP)).unwrap();
        assert_eq!(json, "\"GBP\"");
        let back: DisplayCurrency = serde_json::from_str("\"SATS\"").unwrap();
        assert_eq!(back, DisplayCurrency::Sats);
        assert!(serde_json::from_str::<DisplayCurrency>("\"NOPE\"").is_err());
    }

    #[test]
    fn test_sats_context_has_no_conversion() {
        let ctx = CurrencyContext::sats();
        assert!(ctx.is_ready());
        assert_eq!(ctx.to_sats(2500.0).unwrap(), 2500);
        assert_eq!(ctx.from_sats(2500).unwrap(), 2500.0);
        assert_eq!(ctx.format(2500.0), "2500 sats");
    }

    #[test]
    fn test_fiat_conversion_rounds_to_nearest_sat() {
        // 1 USD = 1612.9 sats
        let ctx = CurrencyContext::with_rate(Currency::USD, 1612.9).unwrap();
        assert_eq!(ctx.to_sats(1.0).unwrap(), 1613);
        assert_eq!(ctx.to_sats(10.0).unwrap(), 16129);
        assert_eq!(ctx.format_sats(16129).unwrap(), "$10.00");
    }

    #[test]
    fn test_fiat_without_rate() {
        let ctx = CurrencyContext::new(DisplayCurrency::Fiat(Currency::EUR));
        assert!(!ctx.is_ready());
        assert!(matches!(ctx.to_sats(5.0), Err(Error::RateUnavailable(_))));
    }

    #[test]
    fn test_select_drops_rate() {
        let mut ctx = CurrencyContext::with_rate(Currency::USD, 1500.0).unwrap();
        assert!(!ctx.select(DisplayCurrency::Fiat(Currency::USD)));
        assert_eq!(ctx.rate(), Some(1500.0));

        assert!(ctx.select(DisplayCurrency::Fiat(Currency::EUR)));
        assert_eq!(ctx.rate(), None);
    }

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(CurrencyContext::with_rate(Currency::USD, 0.0).is_err());
        assert!(CurrencyContext::with_rate(Currency::USD, f64::NAN).is_err());
        assert!(CurrencyContext::with_rate(Currency::USD, -3.0).is_err());
    }

    #[test]
    fn test_parse_amount() {
        let ctx = CurrencyContext::sats();
        assert_eq!(ctx.parse_amount(" 42 ").unwrap(), 42.0);
        assert!(matches!(ctx.parse_amount("abc"), Err(Error::Validation(_))));
        assert!(matches!(ctx.parse_amount("0"), Err(Error::InvalidAmount(_))));
        assert!(matches!(ctx.parse_amount(""), Err(Error::InvalidAmount(_))));
        assert!(matches!(ctx.parse_amount("12.5"), Err(Error::Validation(_))));
        assert_eq!(ctx.parse_amount("12.0").unwrap(), 12.0);

        let usd = CurrencyContext::with_rate(Currency::USD, 1_000.0).unwrap();
        assert_eq!(usd.parse_amount("12.5").unwrap(), 12.5);
    }

    #[test]
    fn test_zero_decimal_currency_format() {
        let ctx = CurrencyContext::with_rate(Currency::JPY, 10.0).unwrap();
        assert_eq!(ctx.format(1234.4), "¥1234");
    }
}
