//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::rpc::RpcMode;

/// Root configuration for the chain client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Default network name (aliases like `ledger::main` resolve to the
    /// last colon-delimited segment).
    pub network: String,

    /// Default transport mode for queries.
    pub network_mode: RpcMode,

    /// Explicit RPC URL; when set it is used verbatim, bypassing the
    /// per-network URL lists.
    pub url: Option<String>,

    /// Comma-separated substring filter applied to URL candidates.
    pub url_search: Option<String>,

    /// Per-network RPC URL lists, keyed by network name.
    pub networks: HashMap<String, NetworkUrls>,

    /// Default storage module for queries.
    pub default_module: String,

    /// Decimal precision of the base unit (amounts on chain are
    /// `token * 10^token_decimals`).
    pub token_decimals: u32,

    /// Tips at or above this threshold are taken as already scaled to the
    /// base unit; below it they are scaled up. Guards against
    /// double-scaling.
    pub max_tip: u64,

    /// Per-operation attempt budgets.
    pub trials: TrialSettings,

    /// Backoff shape between attempts.
    pub retry: RetrySettings,

    /// Global deadline for concurrent batch fan-out, in seconds.
    pub batch_timeout_secs: u64,

    /// Default cache TTL for queries, in seconds. `None` means cached
    /// values never expire and are served until a caller forces an update.
    pub default_max_age_secs: Option<u64>,

    /// Root directory of the durable store (query cache, transaction
    /// history, keyring).
    pub store_root: PathBuf,

    /// Storage features fetched by the per-partition parameter aggregate.
    pub partition_features: Vec<String>,

    /// Storage features fetched by the global parameter aggregate.
    pub global_features: Vec<String>,

    /// Fields retained by `get_module` in lite mode.
    pub module_features: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: "main".to_string(),
            network_mode: RpcMode::Ws,
            url: None,
            url_search: None,
            networks: HashMap::new(),
            default_module: "Ledger".to_string(),
            token_decimals: 9,
            max_tip: 10_000,
            trials: TrialSettings::default(),
            retry: RetrySettings::default(),
            batch_timeout_secs: 30,
            default_max_age_secs: Some(1000),
            store_root: PathBuf::from(".ledger-client"),
            partition_features: vec![
                "Name".to_string(),
                "Tempo".to_string(),
                "Founder".to_string(),
                "MinStake".to_string(),
                "MaxAllowedUids".to_string(),
                "ImmunityPeriod".to_string(),
            ],
            global_features: vec![
                "MaxAllowedSubnets".to_string(),
                "MaxAllowedModules".to_string(),
                "UnitEmission".to_string(),
                "TxRateLimit".to_string(),
            ],
            module_features: vec![
                "key".to_string(),
                "name".to_string(),
                "address".to_string(),
                "emission".to_string(),
                "incentive".to_string(),
                "dividends".to_string(),
                "last_update".to_string(),
            ],
        }
    }
}

impl ClientConfig {
    /// URL candidates for a network and mode; empty when unknown.
    pub fn urls_for(&self, network: &str, mode: RpcMode) -> &[String] {
        self.networks
            .get(network)
            .map(|urls| urls.for_mode(mode))
            .unwrap_or(&[])
    }
}

/// RPC URL lists for one network.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkUrls {
    /// HTTP endpoints.
    pub http: Vec<String>,

    /// Websocket endpoints.
    pub ws: Vec<String>,
}

impl NetworkUrls {
    /// The URL list for a transport mode.
    pub fn for_mode(&self, mode: RpcMode) -> &[String] {
        match mode {
            RpcMode::Http => &self.http,
            RpcMode::Ws => &self.ws,
        }
    }
}

/// Attempt budgets for retried operations.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct TrialSettings {
    /// Attempts to open a connection before giving up.
    pub connect: u32,

    /// Attempts for a storage query.
    pub query: u32,

    /// Attempts for a transaction submission.
    pub submit: u32,
}

impl Default for TrialSettings {
    fn default() -> Self {
        Self {
            connect: 10,
            query: 4,
            submit: 4,
        }
    }
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.network, "main");
        assert_eq!(config.network_mode, RpcMode::Ws);
        assert_eq!(config.token_decimals, 9);
        assert_eq!(config.trials.query, 4);
        assert!(config.networks.is_empty());
    }

    #[test]
    fn test_urls_for_unknown_network() {
        let config = ClientConfig::default();
        assert!(config.urls_for("nowhere", RpcMode::Http).is_empty());
    }

    #[test]
    fn test_minimal_toml() {
        let raw = r#"
            network = "test"

            [networks.test]
            ws = ["ws://127.0.0.1:9944"]
        "#;
        let config: ClientConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.network, "test");
        assert_eq!(config.urls_for("test", RpcMode::Ws).len(), 1);
        // Untouched fields keep their defaults
        assert_eq!(config.max_tip, 10_000);
    }
}
