//! Typed settings on top of the key/value store

use crate::{keys, Error, KeyValueStore, Result};
use lnpos_core::{DisplayCurrency, LastInvoice, TipSettings, WalletDescriptor};
use std::sync::Arc;

/// Merchant label used when none is configured
pub const DEFAULT_MERCHANT_LABEL: &str = "Lightning POS";

const MAX_MERCHANT_LABEL_LEN: usize = 64;

/// Settings accessor
#[derive(Clone)]
pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    /// Wrap a store
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Display currency
    // ------------------------------------------------------------------

    /// Selected display currency (`SATS` when unset or unreadable)
    pub fn display_currency(&self) -> Result<DisplayCurrency> {
        let Some(code) = self.store.get(keys::DISPLAY_CURRENCY)? else {
            return Ok(DisplayCurrency::Sats);
        };
        Ok(code.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown stored currency {:?}, falling back to SATS", code);
            DisplayCurrency::Sats
        }))
    }

    /// Select the display currency
    pub fn set_display_currency(&self, currency: DisplayCurrency) -> Result<()> {
        self.store.set(keys::DISPLAY_CURRENCY, currency.code())?;
        tracing::info!("Display currency set to {}", currency);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tips
    // ------------------------------------------------------------------

    /// Tip settings (defaults when unset or unreadable)
    pub fn tip_settings(&self) -> Result<TipSettings> {
        let Some(raw) = self.store.get(keys::TIP_SETTINGS)? else {
            return Ok(TipSettings::default());
        };
        match serde_json::from_str::<TipSettings>(&raw) {
            Ok(settings) => Ok(settings.normalized()),
            Err(e) => {
                tracing::warn!("Ignoring unreadable tip settings: {}", e);
                Ok(TipSettings::default())
            }
        }
    }

    /// Save tip settings and the secondary wallet together.
    ///
    /// The secondary wallet must differ from the primary one; on violation
    /// nothing is written.
    pub fn save_tip_configuration(
        &self,
        settings: &TipSettings,
        secondary: Option<&WalletDescriptor>,
    ) -> Result<()> {
        if let Some(secondary) = secondary {
            self.ensure_distinct_from_primary(secondary)?;
        }

        let settings = settings.clone().normalized();
        self.store
            .set(keys::TIP_SETTINGS, &serde_json::to_string(&settings)?)?;
        match secondary {
            Some(descriptor) => self.store.set(keys::SECONDARY_WALLET, descriptor.as_str())?,
            None => self.store.remove(keys::SECONDARY_WALLET)?,
        }

        tracing::info!(
            "Tip settings saved: enabled={}, presets=[{}], secondary={}",
            settings.enabled,
            settings.percentages_display(),
            secondary.map(WalletDescriptor::redacted).unwrap_or_else(|| "none".to_string())
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Wallets
    // ------------------------------------------------------------------

    /// Primary wallet connection
    pub fn primary_wallet(&self) -> Result<Option<WalletDescriptor>> {
        self.load_descriptor(keys::PRIMARY_WALLET)
    }

    /// Secondary (tip) wallet connection
    pub fn secondary_wallet(&self) -> Result<Option<WalletDescriptor>> {
        self.load_descriptor(keys::SECONDARY_WALLET)
    }

    /// Whether a primary wallet is connected
    pub fn has_primary_wallet(&self) -> Result<bool> {
        Ok(self
            .store
            .get(keys::PRIMARY_WALLET)?
            .is_some_and(|raw| !raw.trim().is_empty()))
    }

    /// Store the primary wallet connection
    pub fn set_primary_wallet(&self, descriptor: &WalletDescriptor) -> Result<()> {
        if let Some(secondary) = self.secondary_wallet()? {
            if secondary.same_connection(descriptor) {
                return Err(same_wallet_error());
            }
        }
        self.store.set(keys::PRIMARY_WALLET, descriptor.as_str())?;
        tracing::info!("Primary wallet set: {}", descriptor.redacted());
        Ok(())
    }

    /// Store the secondary wallet connection
    pub fn set_secondary_wallet(&self, descriptor: &WalletDescriptor) -> Result<()> {
        self.ensure_distinct_from_primary(descriptor)?;
        self.store.set(keys::SECONDARY_WALLET, descriptor.as_str())?;
        tracing::info!("Secondary wallet set: {}", descriptor.redacted());
        Ok(())
    }

    /// Remove the secondary wallet connection
    pub fn clear_secondary_wallet(&self) -> Result<()> {
        self.store.remove(keys::SECONDARY_WALLET)
    }

    /// Remove both wallet connections
    pub fn clear_wallets(&self) -> Result<()> {
        self.store.remove(keys::PRIMARY_WALLET)?;
        self.store.remove(keys::SECONDARY_WALLET)?;
        tracing::info!("Wallet connections cleared");
        Ok(())
    }

    fn ensure_distinct_from_primary(&self, secondary: &WalletDescriptor) -> Result<()> {
        match self.primary_wallet()? {
            Some(primary) if primary.same_connection(secondary) => Err(same_wallet_error()),
            _ => Ok(()),
        }
    }

    fn load_descriptor(&self, key: &str) -> Result<Option<WalletDescriptor>> {
        match self.store.get(key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(Some(WalletDescriptor::parse(&raw)?)),
            _ => Ok(None),
        }
    }

    // ------------------------------------------------------------------
    // Last invoice
    // ------------------------------------------------------------------

    /// Last base invoice, kept for the tip flow
    pub fn last_invoice(&self) -> Result<Option<LastInvoice>> {
        let Some(raw) = self.store.get(keys::LAST_INVOICE)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(invoice) => Ok(Some(invoice)),
            Err(e) => {
                tracing::debug!("Ignoring unreadable last invoice: {}", e);
                Ok(None)
            }
        }
    }

    /// Record the last base invoice
    pub fn set_last_invoice(&self, invoice: &LastInvoice) -> Result<()> {
        self.store
            .set(keys::LAST_INVOICE, &serde_json::to_string(invoice)?)
    }

    /// Forget the last base invoice
    pub fn clear_last_invoice(&self) -> Result<()> {
        self.store.remove(keys::LAST_INVOICE)
    }

    // ------------------------------------------------------------------
    // Merchant
    // ------------------------------------------------------------------

    /// Label used in invoice memos
    pub fn merchant_label(&self) -> Result<String> {
        Ok(self
            .store
            .get(keys::MERCHANT_LABEL)?
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| DEFAULT_MERCHANT_LABEL.to_string()))
    }

    /// Change the merchant label
    pub fn set_merchant_label(&self, label: &str) -> Result<()> {
        let label = label.trim();
        if label.is_empty() {
            return Err(Error::Validation("Merchant name cannot be empty".to_string()));
        }
        if label.chars().count() > MAX_MERCHANT_LABEL_LEN {
            return Err(Error::Validation(format!(
                "Merchant name must be at most {} characters",
                MAX_MERCHANT_LABEL_LEN
            )));
        }
        self.store.set(keys::MERCHANT_LABEL, label)
    }
}

fn same_wallet_error() -> Error {
    Error::Validation("Tip wallet must be different from the main wallet".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use lnpos_core::{Currency, FALLBACK_TIP_PERCENTAGES};

    const PRIMARY: &str = "nostr+walletconnect://b889ff5b1513b641e2a139f661a661364979c5beee91842f8f0ef42ab558e9d4?relay=wss://relay.damus.io&secret=71a8c14c1407c113601079c4302dab36460f0ccd0ad506f1f2dc73b5100e4f3c";
    const SECONDARY: &str = "nostr+walletconnect://0f8e9a63d0b7f1e4c9b2a5d8e7f60123456789abcdef0123456789abcdef0123?relay=wss://relay.getalby.com/v1&secret=1111111111111111111111111111111111111111111111111111111111111111";

    fn settings() -> SettingsStore {
        SettingsStore::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_display_currency_defaults_and_round_trips() {
        let s = settings();
        assert_eq!(s.display_currency().unwrap(), DisplayCurrency::Sats);

        s.set_display_currency(DisplayCurrency::Fiat(Currency::EUR)).unwrap();
        assert_eq!(s.display_currency().unwrap(), DisplayCurrency::Fiat(Currency::EUR));

        s.store().set(keys::DISPLAY_CURRENCY, "XXX").unwrap();
        assert_eq!(s.display_currency().unwrap(), DisplayCurrency::Sats);
    }

    #[test]
    fn test_unparseable_percentages_fall_back() {
        let s = settings();
        let mut tips = TipSettings {
            enabled: true,
            ..TipSettings::default()
        };
        tips.set_percentages_from_str("abc, x%, -");
        s.save_tip_configuration(&tips, None).unwrap();

        let loaded = s.tip_settings().unwrap();
        assert!(loaded.enabled);
        assert_eq!(loaded.percentages, FALLBACK_TIP_PERCENTAGES.to_vec());
    }

    #[test]
    fn test_stored_percentages_are_normalized() {
        let s = settings();
        s.store()
            .set(keys::TIP_SETTINGS, r#"{"enabled":true,"percentages":[]}"#)
            .unwrap();
        assert_eq!(s.tip_settings().unwrap().percentages, FALLBACK_TIP_PERCENTAGES.to_vec());

        s.store().set(keys::TIP_SETTINGS, "not json").unwrap();
        assert_eq!(s.tip_settings().unwrap(), TipSettings::default());
    }

    #[test]
    fn test_secondary_equal_to_primary_rejected_without_writes() {
        let s = settings();
        let primary = WalletDescriptor::parse(PRIMARY).unwrap();
        s.set_primary_wallet(&primary).unwrap();

        let before = TipSettings::default();
        s.save_tip_configuration(&before, None).unwrap();

        let changed = TipSettings {
            enabled: true,
            use_secondary_wallet: true,
            ..TipSettings::default()
        };
        let err = s.save_tip_configuration(&changed, Some(&primary)).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(s.tip_settings().unwrap(), before);
        assert!(s.secondary_wallet().unwrap().is_none());
    }

    #[test]
    fn test_distinct_secondary_saved() {
        let s = settings();
        s.set_primary_wallet(&WalletDescriptor::parse(PRIMARY).unwrap()).unwrap();
        let secondary = WalletDescriptor::parse(SECONDARY).unwrap();

        s.save_tip_configuration(&TipSettings::default(), Some(&secondary)).unwrap();
        assert_eq!(s.secondary_wallet().unwrap(), Some(secondary.clone()));

        assert!(s.set_primary_wallet(&secondary).unwrap_err().is_validation());

        s.save_tip_configuration(&TipSettings::default(), None).unwrap();
        assert!(s.secondary_wallet().unwrap().is_none());
    }

    #[test]
    fn test_merchant_label() {
        let s = settings();
        assert_eq!(s.merchant_label().unwrap(), DEFAULT_MERCHANT_LABEL);
        s.set_merchant_label("  Corner Cafe ").unwrap();
        assert_eq!(s.merchant_label().unwrap(), "Corner Cafe");
        assert!(s.set_merchant_label("   ").is_err());
    }
}
