//! Wallet connection descriptors
//!
//! A descriptor is a Nostr Wallet Connect URI:
//! `nostr+walletconnect://<wallet pubkey>?relay=<url>&secret=<hex>[&lud16=<address>]`.
//! The original string is kept verbatim; parsing only validates it and exposes
//! the non-secret parts.

use crate::{Error, Result};
use percent_encoding::percent_decode_str;
use std::fmt;

/// Accepted URI schemes
pub const NWC_SCHEMES: [&str; 2] = ["nostr+walletconnect://", "nostrwalletconnect://"];

/// Length of a hex encoded 32-byte key
const KEY_HEX_LEN: usize = 64;

/// Parsed wallet connection descriptor
#[derive(Clone, PartialEq, Eq)]
pub struct WalletDescriptor {
    raw: String,
    wallet_pubkey: String,
    relays: Vec<String>,
    lud16: Option<String>,
}

impl WalletDescriptor {
    /// Parse and validate a connection string
    pub fn parse(input: &str) -> Result<Self> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err(Error::InvalidDescriptor("connection string is empty".to_string()));
        }

        let body = NWC_SCHEMES
            .iter()
            .find_map(|scheme| {
                raw.get(..scheme.len())
                    .filter(|prefix| prefix.eq_ignore_ascii_case(scheme))
                    .map(|_| &raw[scheme.len()..])
            })
            .ok_or_else(|| {
                Error::InvalidDescriptor("expected a nostr+walletconnect:// URI".to_string())
            })?;

        let (pubkey, query) = body.split_once('?').ok_or_else(|| {
            Error::InvalidDescriptor("missing relay and secret parameters".to_string())
        })?;
        let pubkey = pubkey.trim_end_matches('/');
        validate_key(pubkey, "wallet public key")?;

        let mut relays = Vec::new();
        let mut secret = None;
        let mut lud16 = None;

        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = percent_decode_str(value)
                .decode_utf8()
                .map_err(|e| Error::InvalidDescriptor(format!("bad encoding in {}: {}", key, e)))?
                .into_owned();

            match key {
                "relay" => {
                    if !(value.starts_with("wss://") || value.starts_with("ws://")) {
                        return Err(Error::InvalidDescriptor(format!(
                            "relay must be a websocket URL, got '{}'",
                            value
                        )));
                    }
                    relays.push(value);
                }
                "secret" => secret = Some(value),
                "lud16" if !value.is_empty() => lud16 = Some(value),
                _ => {}
            }
        }

        if relays.is_empty() {
            return Err(Error::InvalidDescriptor("at least one relay is required".to_string()));
        }
        let secret = secret
            .ok_or_else(|| Error::InvalidDescriptor("secret parameter is required".to_string()))?;
        validate_key(&secret, "secret")?;

        Ok(Self {
            raw: raw.to_string(),
            wallet_pubkey: pubkey.to_ascii_lowercase(),
            relays,
            lud16,
        })
    }

    /// Original connection string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Wallet service public key (lowercase hex)
    pub fn wallet_pubkey(&self) -> &str {
        &self.wallet_pubkey
    }

    /// Relay URLs
    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    /// Lightning address advertised by the wallet, if any
    pub fn lud16(&self) -> Option<&str> {
        self.lud16.as_deref()
    }

    /// Whether two descriptors are the same connection string
    pub fn same_connection(&self, other: &WalletDescriptor) -> bool {
        self.raw == other.raw
    }

    /// Short label safe to show or log
    pub fn redacted(&self) -> String {
        let key = &self.wallet_pubkey;
        format!("{}…{}", &key[..8], &key[key.len() - 4..])
    }
}

impl fmt::Debug for WalletDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletDescriptor")
            .field("wallet_pubkey", &self.wallet_pubkey)
            .field("relays", &self.relays)
            .field("lud16", &self.lud16)
            .field("secret", &"<redacted>")
            .finish()
    }
}

fn validate_key(value: &str, what: &str) -> Result<()> {
    if value.len() != KEY_HEX_LEN {
        return Err(Error::InvalidDescriptor(format!(
            "{} must be {} hex characters",
            what, KEY_HEX_LEN
        )));
    }
    hex::decode(value)
        .map(|_| ())
        .map_err(|e| Error::InvalidDescriptor(format!("{} is not hex: {}", what, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUBKEY: &str = "b889ff5b1513b641e2a139f661a661364979c5beee91842f8f0ef42ab558e9d4";
    const SECRET: &str = "71a8c14c1407c113601079c4302dab36460f0ccd0ad506f1f2dc73b5100e4f3c";

    fn uri() -> String {
        format!(
            "nostr+walletconnect://{}?relay=wss%3A%2F%2Frelay.damus.io&secret={}&lud16=shop%40getalby.com",
            PUBKEY, SECRET
        )
    }

    #[test]
    fn test_parse_valid_descriptor() {
        let descriptor = WalletDescriptor::parse(&uri()).unwrap();
        assert_eq!(descriptor.wallet_pubkey(), PUBKEY);
        assert_eq!(descriptor.relays(), ["wss://relay.damus.io".to_string()]);
        assert_eq!(descriptor.lud16(), Some("shop@getalby.com"));
        assert_eq!(descriptor.as_str(), uri());
    }

    #[test]
    fn test_alternate_scheme_and_whitespace() {
        let input = format!(
            "  nostrwalletconnect://{}?relay=wss://relay.example&secret={}  ",
            PUBKEY, SECRET
        );
        let descriptor = WalletDescriptor::parse(&input).unwrap();
        assert_eq!(descriptor.as_str(), input.trim());
        assert_eq!(descriptor.lud16(), None);
    }

    #[test]
    fn test_multiple_relays() {
        let input = format!(
            "nostr+walletconnect://{}?relay=wss://a.example&relay=wss://b.example&secret={}",
            PUBKEY, SECRET
        );
        let descriptor = WalletDescriptor::parse(&input).unwrap();
        assert_eq!(descriptor.relays().len(), 2);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(WalletDescriptor::parse("").is_err());
        assert!(WalletDescriptor::parse("https://example.com").is_err());
        assert!(WalletDescriptor::parse(&format!("nostr+walletconnect://{}", PUBKEY)).is_err());
        assert!(WalletDescriptor::parse(&format!(
            "nostr+walletconnect://{}?secret={}",
            PUBKEY, SECRET
        ))
        .is_err());
        assert!(WalletDescriptor::parse(&format!(
            "nostr+walletconnect://{}?relay=wss://r.example",
            PUBKEY
        ))
        .is_err());
        assert!(WalletDescriptor::parse(&format!(
            "nostr+walletconnect://abcd?relay=wss://r.example&secret={}",
            SECRET
        ))
        .is_err());
        assert!(WalletDescriptor::parse(&format!(
            "nostr+walletconnect://{}?relay=https://r.example&secret={}",
            PUBKEY, SECRET
        ))
        .is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let descriptor = WalletDescriptor::parse(&uri()).unwrap();
        let debug = format!("{:?}", descriptor);
        assert!(!debug.contains(SECRET));
        assert!(descriptor.redacted().starts_with("b889ff5b"));
    }

    #[test]
    fn test_same_connection() {
        let a = WalletDescriptor::parse(&uri()).unwrap();
        let b = WalletDescriptor::parse(&format!("  {}", uri())).unwrap();
        assert!(a.same_connection(&b));
    }
}
