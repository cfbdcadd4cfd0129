//! Tip flow offered after a paid invoice
//!
//! A tip is always a separate invoice; it is never merged into the base
//! payment. A zero tip skips straight back to amount entry.

use crate::invoice_controller::{InvoiceController, InvoicePhase};
use crate::Result;
use lnpos_core::{
    filter_custom_input, format_memo, CurrencyContext, Invoice, InvoiceRequest, LastInvoice,
    TipCalculator, TipSelection, TipSettings, TIP_MEMO_LABEL,
};

/// Result of submitting a tip
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TipOutcome {
    /// No tip, back to amount entry
    Skipped,
    /// Tip invoice created
    Invoice(Invoice),
}

/// Offer the tip flow for a settled invoice.
///
/// Only offered when tips are enabled, the settled invoice was not itself a
/// tip and the base invoice is still recorded.
pub fn offer_tip(
    phase: InvoicePhase,
    last_invoice: Option<&LastInvoice>,
    settings: &TipSettings,
    ctx: CurrencyContext,
) -> Option<TipFlow> {
    if !settings.enabled || phase != (InvoicePhase::Paid { is_tip: false }) {
        return None;
    }
    let last = last_invoice?;
    Some(TipFlow::new(last.amount_sats, ctx, settings.clone()))
}

/// Tip entry state
#[derive(Debug, Clone)]
pub struct TipFlow {
    base_sats: u64,
    ctx: CurrencyContext,
    settings: TipSettings,
    selection: TipSelection,
    custom_input: String,
    calculator: TipCalculator,
}

impl TipFlow {
    /// Start a tip flow for a base amount
    pub fn new(base_sats: u64, ctx: CurrencyContext, settings: TipSettings) -> Self {
        Self {
            base_sats,
            ctx,
            settings,
            selection: TipSelection::NoTip,
            custom_input: String::new(),
            calculator: TipCalculator::new(),
        }
    }

    /// Base amount
    pub fn base_sats(&self) -> u64 {
        self.base_sats
    }

    /// Percentage presets
    pub fn presets(&self) -> &[u32] {
        &self.settings.percentages
    }

    /// Whether a custom tip may be entered
    pub fn allows_custom(&self) -> bool {
        self.settings.allow_custom
    }

    /// Current selection
    pub fn selection(&self) -> TipSelection {
        self.selection
    }

    /// Current custom entry
    pub fn custom_input(&self) -> &str {
        &self.custom_input
    }

    /// Change the selection. Switching to a custom tip with an empty entry
    /// pre-fills the default suggestion.
    pub fn select(&mut self, selection: TipSelection) -> Result<()> {
        match selection {
            TipSelection::Custom if !self.settings.allow_custom => {
                return Err(lnpos_core::Error::Validation(
                    "Custom tips are disabled".to_string(),
                )
                .into());
            }
            TipSelection::Custom if self.custom_input.is_empty() => {
                self.custom_input = self
                    .calculator
                    .default_custom_suggestion(self.base_sats, &self.ctx)?;
            }
            TipSelection::Percentage(0) => {
                return Err(lnpos_core::Error::Validation(
                    "Tip percentage must be a positive integer".to_string(),
                )
                .into());
            }
            _ => {}
        }
        self.selection = selection;
        Ok(())
    }

    /// Update the custom entry; returns the filtered text
    pub fn set_custom_input(&mut self, raw: &str) -> &str {
        self.custom_input = filter_custom_input(raw, self.ctx.currency());
        &self.custom_input
    }

    /// Tip in satoshis for the current selection
    pub fn tip_amount(&self) -> Result<u64> {
        Ok(self.calculator.tip_amount(
            self.base_sats,
            self.selection,
            &self.custom_input,
            &self.ctx,
        )?)
    }

    /// Memo for a tip of `tip_sats`: `Tip - <amount>`
    pub fn memo(&self, tip_sats: u64) -> Result<String> {
        let amount = match (self.selection, self.ctx.currency().is_sats()) {
            (TipSelection::Custom, false) => {
                let value: f64 = self.custom_input.parse().map_err(|_| {
                    lnpos_core::Error::Validation(format!(
                        "'{}' is not a number",
                        self.custom_input
                    ))
                })?;
                self.ctx.format(value)
            }
            _ => self.ctx.format_sats(tip_sats)?,
        };
        Ok(format_memo(TIP_MEMO_LABEL, Some(&amount)))
    }

    /// Submit the tip. A zero tip is skipped without creating an invoice.
    pub async fn submit(&self, controller: &InvoiceController) -> Result<TipOutcome> {
        let tip_sats = self.tip_amount()?;
        if tip_sats == 0 {
            tracing::info!("Tip skipped");
            return Ok(TipOutcome::Skipped);
        }
        let request = InvoiceRequest::tip(tip_sats, self.memo(tip_sats)?)?;
        let invoice = controller.create_invoice(request).await?;
        Ok(TipOutcome::Invoice(invoice))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lnpos_core::{Currency, DisplayCurrency};

    fn enabled() -> TipSettings {
        TipSettings {
            enabled: true,
            ..TipSettings::default()
        }
    }

    fn last(amount_sats: u64) -> LastInvoice {
        LastInvoice {
            amount_sats,
            description: "Lightning POS".to_string(),
            currency: DisplayCurrency::Sats,
            fiat_display: None,
            created_at: 0,
        }
    }

    #[test]
    fn test_offer_rules() {
        let paid = InvoicePhase::Paid { is_tip: false };
        let base = last(10_000);
        let sats = CurrencyContext::sats();

        assert!(offer_tip(paid, Some(&base), &enabled(), sats).is_some());
        assert!(offer_tip(paid, Some(&base), &TipSettings::default(), sats).is_none());
        assert!(offer_tip(InvoicePhase::Paid { is_tip: true }, Some(&base), &enabled(), sats)
            .is_none());
        assert!(offer_tip(InvoicePhase::Cancelled, Some(&base), &enabled(), sats).is_none());
        assert!(offer_tip(paid, None, &enabled(), sats).is_none());
    }

    #[test]
    fn test_percentage_tips() {
        let mut flow = TipFlow::new(10_000, CurrencyContext::sats(), enabled());
        assert_eq!(flow.tip_amount().unwrap(), 0);

        flow.select(TipSelection::Percentage(15)).unwrap();
        assert_eq!(flow.tip_amount().unwrap(), 1_500);
        assert_eq!(flow.memo(1_500).unwrap(), "Tip - 1500 sats");

        let mut flow = TipFlow::new(333, CurrencyContext::sats(), enabled());
        flow.select(TipSelection::Percentage(10)).unwrap();
        assert_eq!(flow.tip_amount().unwrap(), 33);

        assert!(flow.select(TipSelection::Percentage(0)).is_err());
    }

    #[test]
    fn test_custom_prefill_and_filtering() {
        let usd = CurrencyContext::with_rate(Currency::USD, 2_000.0).unwrap();
        let mut flow = TipFlow::new(20_000, usd, enabled());

        flow.select(TipSelection::Custom).unwrap();
        assert_eq!(flow.custom_input(), "1.50");
        assert_eq!(flow.tip_amount().unwrap(), 3_000);

        assert_eq!(flow.set_custom_input("2.555x"), "2.55");
        assert_eq!(flow.tip_amount().unwrap(), 5_100);
        assert_eq!(flow.memo(5_100).unwrap(), "Tip - $2.55");

        // An existing entry is kept when re-selecting custom
        flow.select(TipSelection::NoTip).unwrap();
        flow.select(TipSelection::Custom).unwrap();
        assert_eq!(flow.custom_input(), "2.55");
    }

    #[test]
    fn test_custom_disabled() {
        let settings = TipSettings {
            allow_custom: false,
            ..enabled()
        };
        let mut flow = TipFlow::new(1_000, CurrencyContext::sats(), settings);
        let err = flow.select(TipSelection::Custom).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(flow.selection(), TipSelection::NoTip);
    }

    #[test]
    fn test_sats_custom_entry() {
        let mut flow = TipFlow::new(1_000, CurrencyContext::sats(), enabled());
        flow.select(TipSelection::Custom).unwrap();
        assert_eq!(flow.custom_input(), "150");
        flow.set_custom_input("");
        assert_eq!(flow.tip_amount().unwrap(), 0);
        flow.set_custom_input("2a1");
        assert_eq!(flow.tip_amount().unwrap(), 21);
    }

    #[test]
    fn test_sats_custom_entry_floors_fraction() {
        let ctx = CurrencyContext::sats();
        let mut flow = TipFlow::new(1_000, ctx, enabled());
        flow.select(TipSelection::Custom).unwrap();

        assert_eq!(flow.set_custom_input("12.9"), "12");
        assert_eq!(flow.tip_amount().unwrap(), 12);
        assert_eq!(
            flow.tip_amount().unwrap(),
            TipCalculator::new().custom_tip("12.9", &ctx).unwrap()
        );
        assert_eq!(flow.memo(12).unwrap(), "Tip - 12 sats");
    }
}
