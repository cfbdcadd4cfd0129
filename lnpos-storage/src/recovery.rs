//! Recovery affordance for a stuck terminal
//!
//! The destructive variant (wiping every stored value) is only offered while no
//! operator is authenticated, i.e. no primary wallet is connected. An operator
//! with a connected wallet must go through the PIN-gated logout instead.

use crate::{keys, Error, KeyValueStore, Result};

/// What a recovery screen may offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAffordance {
    /// Reload only
    Reload,
    /// Reload or wipe all local data
    ReloadOrWipe,
}

impl RecoveryAffordance {
    /// Whether wiping is offered
    pub fn allows_wipe(&self) -> bool {
        matches!(self, Self::ReloadOrWipe)
    }
}

/// Decide which recovery actions to show
pub fn recovery_affordance(store: &dyn KeyValueStore) -> RecoveryAffordance {
    match store.get(keys::PRIMARY_WALLET) {
        Ok(Some(raw)) if !raw.trim().is_empty() => RecoveryAffordance::Reload,
        Ok(_) => RecoveryAffordance::ReloadOrWipe,
        Err(e) => {
            tracing::warn!("Cannot read wallet state for recovery: {}", e);
            RecoveryAffordance::Reload
        }
    }
}

/// Wipe every stored value, including the PIN
pub fn wipe_all_data(store: &dyn KeyValueStore) -> Result<()> {
    if !recovery_affordance(store).allows_wipe() {
        return Err(Error::Security(
            "Data wipe is not available while a wallet is connected. Log out first.".to_string(),
        ));
    }
    store.clear()?;
    tracing::warn!("All local data wiped ({} known keys)", keys::ALL.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[test]
    fn test_wipe_only_when_unauthenticated() {
        let store = MemoryStore::new();
        store.set(keys::PIN, "1234").unwrap();
        store.set(keys::PRIMARY_WALLET, "nostr+walletconnect://abc").unwrap();

        assert_eq!(recovery_affordance(&store), RecoveryAffordance::Reload);
        assert!(matches!(wipe_all_data(&store), Err(Error::Security(_))));
        assert_eq!(store.get(keys::PIN).unwrap().as_deref(), Some("1234"));

        store.remove(keys::PRIMARY_WALLET).unwrap();
        assert_eq!(recovery_affordance(&store), RecoveryAffordance::ReloadOrWipe);
        wipe_all_data(&store).unwrap();
        assert!(store.is_empty());
    }
}
