//! Runtime configuration

use crate::navigation::SESSION_RECHECK_INTERVAL;
use crate::rates::PriceSource;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Invoice lifecycle timings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InvoiceTimings {
    /// Settlement poll interval
    pub poll_interval_secs: u64,
    /// Countdown before the extend/cancel prompt
    pub countdown_secs: u64,
    /// Auto-dismiss delay of the extend/cancel prompt
    pub prompt_dismiss_secs: u64,
}

impl Default for InvoiceTimings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            countdown_secs: 300,
            prompt_dismiss_secs: 120,
        }
    }
}

impl InvoiceTimings {
    /// Settlement poll interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Auto-dismiss delay
    pub fn prompt_dismiss(&self) -> Duration {
        Duration::from_secs(self.prompt_dismiss_secs)
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 || self.countdown_secs == 0 || self.prompt_dismiss_secs == 0
        {
            return Err(Error::Config("invoice timings must be positive".to_string()));
        }
        Ok(())
    }
}

/// Point of sale configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PosConfig {
    /// Session lifetime
    pub session_lifetime_secs: u64,
    /// Protected screen session re-check interval
    pub session_recheck_secs: u64,
    /// Invoice lifecycle timings
    pub invoice: InvoiceTimings,
    /// Exchange rate source
    pub price_source: PriceSource,
    /// Exchange rate request timeout
    pub rate_timeout_secs: u64,
}

impl Default for PosConfig {
    fn default() -> Self {
        Self {
            session_lifetime_secs: lnpos_storage::SESSION_DURATION.as_secs(),
            session_recheck_secs: SESSION_RECHECK_INTERVAL.as_secs(),
            invoice: InvoiceTimings::default(),
            price_source: PriceSource::default(),
            rate_timeout_secs: 10,
        }
    }
}

impl PosConfig {
    /// Load a JSON config file, falling back to defaults when it does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.session_lifetime_secs == 0 || self.session_recheck_secs == 0 {
            return Err(Error::Config("session timings must be positive".to_string()));
        }
        if self.rate_timeout_secs == 0 {
            return Err(Error::Config("rate timeout must be positive".to_string()));
        }
        self.invoice.validate()
    }

    /// Session lifetime
    pub fn session_lifetime(&self) -> Duration {
        Duration::from_secs(self.session_lifetime_secs)
    }

    /// Protected screen re-check interval
    pub fn session_recheck(&self) -> Duration {
        Duration::from_secs(self.session_recheck_secs)
    }

    /// Exchange rate request timeout
    pub fn rate_timeout(&self) -> Duration {
        Duration::from_secs(self.rate_timeout_secs)
    }
}
