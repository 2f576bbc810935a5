//! Local keyring: alias → signing key handle.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A local signing identity. Key material stays with the ledger
/// capability; this handle only names it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningKey {
    /// Local display name (alias).
    pub name: String,
    /// Canonical SS58 address.
    pub address: String,
}

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Syntactic SS58 address check: base58 alphabet, plausible length.
/// Checksum verification belongs to the wallet layer, which is out of
/// scope here.
pub fn valid_ss58_address(candidate: &str) -> bool {
    let len = candidate.len();
    (40..=56).contains(&len) && candidate.chars().all(|c| BASE58_ALPHABET.contains(c))
}

/// Thread-safe alias → key map.
#[derive(Debug, Default)]
pub struct Keyring {
    keys: DashMap<String, SigningKey>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key under its alias.
    pub fn insert(&self, key: SigningKey) {
        self.keys.insert(key.name.clone(), key);
    }

    /// Look up a key by alias.
    pub fn get(&self, alias: &str) -> Option<SigningKey> {
        self.keys.get(alias).map(|k| k.clone())
    }

    /// Reverse lookup: alias owning `address`, if local.
    pub fn alias_of(&self, address: &str) -> Option<String> {
        self.keys
            .iter()
            .find(|entry| entry.value().address == address)
            .map(|entry| entry.key().clone())
    }

    /// Whether the alias is registered.
    pub fn contains(&self, alias: &str) -> bool {
        self.keys.contains_key(alias)
    }

    /// All registered aliases.
    pub fn aliases(&self) -> Vec<String> {
        self.keys.iter().map(|entry| entry.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";

    #[test]
    fn test_valid_ss58() {
        assert!(valid_ss58_address(ADDR));
        assert!(!valid_ss58_address("alice"));
        // 'O' and '0' are not base58
        assert!(!valid_ss58_address(&"O0".repeat(22)));
    }

    #[test]
    fn test_keyring_lookup_and_reverse() {
        let keyring = Keyring::new();
        keyring.insert(SigningKey {
            name: "alice".into(),
            address: ADDR.into(),
        });

        assert!(keyring.contains("alice"));
        assert_eq!(keyring.get("alice").unwrap().address, ADDR);
        assert_eq!(keyring.alias_of(ADDR), Some("alice".into()));
        assert_eq!(keyring.alias_of("5Unknown"), None);
        assert_eq!(keyring.get("bob"), None);
    }
}
