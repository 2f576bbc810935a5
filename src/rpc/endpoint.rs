//! Endpoint resolution.
//!
//! # Responsibilities
//! - Resolve colon-delimited network aliases (last segment wins)
//! - Pick one RPC URL for a network and transport mode
//! - Apply the configured substring filter to candidates
//!
//! The pick is uniformly random within the candidate set, so callers
//! must treat the choice as non-deterministic.

use std::sync::Arc;

use rand::seq::SliceRandom;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::rpc::ledger::RpcMode;

/// Resolves one RPC URL per call from the configured URL lists.
#[derive(Debug, Clone)]
pub struct EndpointResolver {
    config: Arc<ClientConfig>,
}

impl EndpointResolver {
    pub fn new(config: Arc<ClientConfig>) -> Self {
        Self { config }
    }

    /// Resolve a network name or alias to its canonical form.
    ///
    /// Aliases may be colon-delimited (`ledger::main`, `ledger:main`);
    /// the last segment wins. `None` falls back to the configured
    /// default network.
    pub fn resolve_network(&self, network: Option<&str>) -> String {
        let name = network.unwrap_or(&self.config.network);
        for splitter in ["::", ":"] {
            if name.contains(splitter) {
                if let Some(last) = name.rsplit(splitter).next() {
                    return last.to_string();
                }
            }
        }
        name.to_string()
    }

    /// Pick one URL for `network` and `mode`.
    ///
    /// An explicit `url` (per call or configured) is returned verbatim.
    /// Otherwise the configured candidate list is filtered by the
    /// `url_search` substrings and one survivor is chosen at random.
    pub fn resolve_url(
        &self,
        url: Option<&str>,
        mode: RpcMode,
        network: Option<&str>,
    ) -> Result<String> {
        if let Some(explicit) = url.or(self.config.url.as_deref()) {
            return Ok(explicit.to_string());
        }

        let network = self.resolve_network(network);
        let candidates = self.config.urls_for(&network, mode);
        if candidates.is_empty() {
            return Err(ClientError::Configuration(format!(
                "no urls configured for network '{network}' and mode '{mode}'"
            )));
        }

        let filtered: Vec<&String> = candidates
            .iter()
            .filter(|candidate| self.matches_filter(candidate))
            .collect();
        if filtered.is_empty() {
            return Err(ClientError::Configuration(format!(
                "url filter '{}' matches no candidates for network '{network}'",
                self.config.url_search.as_deref().unwrap_or_default()
            )));
        }

        let chosen = filtered
            .choose(&mut rand::thread_rng())
            .map(|url| url.to_string())
            .unwrap_or_default();
        tracing::debug!(network = %network, mode = %mode, url = %chosen, "resolved endpoint");
        Ok(chosen)
    }

    fn matches_filter(&self, url: &str) -> bool {
        let Some(search) = &self.config.url_search else {
            return true;
        };
        search
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .any(|term| url.contains(term))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkUrls;

    fn config_with(urls: Vec<&str>, search: Option<&str>) -> Arc<ClientConfig> {
        let mut config = ClientConfig::default();
        config.url_search = search.map(String::from);
        config.networks.insert(
            "main".into(),
            NetworkUrls {
                http: urls.iter().map(|u| u.to_string()).collect(),
                ws: vec![],
            },
        );
        Arc::new(config)
    }

    #[test]
    fn test_alias_resolution() {
        let resolver = EndpointResolver::new(Arc::new(ClientConfig::default()));
        assert_eq!(resolver.resolve_network(Some("ledger::test")), "test");
        assert_eq!(resolver.resolve_network(Some("ledger:dev")), "dev");
        // Last segment wins however many there are
        assert_eq!(resolver.resolve_network(Some("org::ledger::main")), "main");
        assert_eq!(resolver.resolve_network(Some("main")), "main");
        assert_eq!(resolver.resolve_network(None), "main");
    }

    #[test]
    fn test_explicit_url_wins() {
        let resolver = EndpointResolver::new(config_with(vec!["http://a/x"], None));
        let url = resolver
            .resolve_url(Some("http://explicit:9933"), RpcMode::Http, None)
            .unwrap();
        assert_eq!(url, "http://explicit:9933");
    }

    #[test]
    fn test_membership_within_candidates() {
        let candidates = vec!["http://a/x", "http://b/y"];
        let resolver = EndpointResolver::new(config_with(candidates.clone(), None));
        for _ in 0..20 {
            let url = resolver.resolve_url(None, RpcMode::Http, None).unwrap();
            assert!(candidates.contains(&url.as_str()));
        }
    }

    #[test]
    fn test_filter_excludes_non_matching() {
        let resolver =
            EndpointResolver::new(config_with(vec!["http://a/x", "http://b/y"], Some("a")));
        for _ in 0..20 {
            let url = resolver.resolve_url(None, RpcMode::Http, None).unwrap();
            assert_eq!(url, "http://a/x");
        }
    }

    #[test]
    fn test_empty_candidates_is_configuration_error() {
        let resolver = EndpointResolver::new(Arc::new(ClientConfig::default()));
        let err = resolver.resolve_url(None, RpcMode::Ws, None).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }

    #[test]
    fn test_filter_matching_nothing_is_configuration_error() {
        let resolver = EndpointResolver::new(config_with(vec!["http://a/x"], Some("zzz")));
        let err = resolver.resolve_url(None, RpcMode::Http, None).unwrap_err();
        assert!(matches!(err, ClientError::Configuration(_)));
    }
}
