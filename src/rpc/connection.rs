//! Connection management.
//!
//! # Responsibilities
//! - Keep one shared handle per RPC URL
//! - Open new handles with a bounded retry, re-resolving the URL on
//!   every attempt so retries can rotate to a different endpoint
//! - Drop all handles on refresh
//!
//! Duplicate-open races insert last-write-wins; handles are stateless
//! query channels, so losing a race only wastes one open.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{ClientError, Result};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::rpc::endpoint::EndpointResolver;
use crate::rpc::ledger::{Connector, LedgerRpc, RpcMode};

/// Shared url → connection map with bounded open retry.
#[derive(Clone)]
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    resolver: EndpointResolver,
    connections: Arc<DashMap<String, Arc<dyn LedgerRpc>>>,
    retry: RetryPolicy,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, resolver: EndpointResolver, retry: RetryPolicy) -> Self {
        Self {
            connector,
            resolver,
            connections: Arc::new(DashMap::new()),
            retry,
        }
    }

    /// Get a connection for the resolved endpoint, opening one if needed.
    ///
    /// A cached handle for the resolved URL is returned unless `refresh`
    /// forces a reopen. Opening is attempted up to `trials` times, with
    /// the URL re-resolved each attempt; exhaustion propagates the last
    /// cause as a connection error.
    pub async fn get_connection(
        &self,
        url: Option<&str>,
        mode: RpcMode,
        network: Option<&str>,
        trials: u32,
        refresh: bool,
    ) -> Result<Arc<dyn LedgerRpc>> {
        // Configuration problems are deterministic; surface them before
        // spending the attempt budget.
        self.resolver.resolve_url(url, mode, network)?;

        let this = self.clone();
        let url = url.map(str::to_string);
        let network = network.map(str::to_string);
        self.retry
            .with_attempts(trials)
            .run("connect", move || {
                let this = this.clone();
                let url = url.clone();
                let network = network.clone();
                async move {
                    this.try_open(url.as_deref(), mode, network.as_deref(), refresh)
                        .await
                }
            })
            .await
    }

    /// One open attempt against a freshly resolved URL.
    async fn try_open(
        &self,
        url: Option<&str>,
        mode: RpcMode,
        network: Option<&str>,
        refresh: bool,
    ) -> Result<Arc<dyn LedgerRpc>> {
        let resolved = self.resolver.resolve_url(url, mode, network)?;

        if !refresh {
            if let Some(existing) = self.connections.get(&resolved) {
                return Ok(existing.clone());
            }
        }

        let handle = self
            .connector
            .connect(&resolved, mode)
            .await
            .map_err(|source| ClientError::Connection {
                url: resolved.clone(),
                source,
            })?;

        self.connections.insert(resolved.clone(), handle.clone());
        metrics::record_connections_open(self.connections.len());
        tracing::info!(url = %resolved, mode = %mode, "connection opened");
        Ok(handle)
    }

    /// Drop every cached handle; subsequent calls reconnect.
    pub fn refresh(&self) {
        self.connections.clear();
        metrics::record_connections_open(0);
        tracing::info!("connection map cleared");
    }

    /// Number of live handles.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("open_connections", &self.connections.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, NetworkUrls};
    use crate::rpc::ledger::RpcError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubLedger;

    #[async_trait]
    impl LedgerRpc for StubLedger {
        async fn query_storage(
            &self,
            _module: &str,
            _name: &str,
            _params: &[Value],
            _block_hash: Option<&str>,
        ) -> std::result::Result<Value, RpcError> {
            Ok(Value::Null)
        }
        async fn query_storage_map(
            &self,
            _module: &str,
            _name: &str,
            _params: &[Value],
            _block_hash: Option<&str>,
        ) -> std::result::Result<Vec<(Vec<Value>, Value)>, RpcError> {
            Ok(vec![])
        }
        async fn get_block_hash(&self, number: u64) -> std::result::Result<String, RpcError> {
            Ok(format!("0x{number:x}"))
        }
        async fn get_block_number(&self) -> std::result::Result<u64, RpcError> {
            Ok(0)
        }
        async fn get_account_nonce(&self, _address: &str) -> std::result::Result<u64, RpcError> {
            Ok(0)
        }
        async fn compose_call(
            &self,
            module: &str,
            function: &str,
            params: &serde_json::Map<String, Value>,
        ) -> std::result::Result<crate::rpc::CallDescriptor, RpcError> {
            Ok(crate::rpc::CallDescriptor {
                module: module.into(),
                function: function.into(),
                params: params.clone(),
            })
        }
        async fn create_signed_extrinsic(
            &self,
            call: &crate::rpc::CallDescriptor,
            signer: &crate::keys::SigningKey,
            nonce: Option<u64>,
            tip: u128,
        ) -> std::result::Result<crate::rpc::Extrinsic, RpcError> {
            Ok(crate::rpc::Extrinsic {
                call: call.clone(),
                signer: signer.address.clone(),
                nonce: nonce.unwrap_or(0),
                tip,
            })
        }
        async fn submit_extrinsic(
            &self,
            _extrinsic: &crate::rpc::Extrinsic,
            _wait_for_inclusion: bool,
            _wait_for_finalization: bool,
        ) -> std::result::Result<crate::rpc::SubmitResponse, RpcError> {
            Ok(crate::rpc::SubmitResponse {
                is_success: true,
                extrinsic_hash: "0x0".into(),
                error_message: None,
            })
        }
    }

    /// Connector that fails the first `failures` opens.
    struct FlakyConnector {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Connector for FlakyConnector {
        async fn connect(
            &self,
            url: &str,
            _mode: RpcMode,
        ) -> std::result::Result<Arc<dyn LedgerRpc>, RpcError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(RpcError::Transport(format!("{url} refused")))
            } else {
                Ok(Arc::new(StubLedger))
            }
        }
    }

    fn manager(failures: u32) -> ConnectionManager {
        let mut config = ClientConfig::default();
        config.networks.insert(
            "main".into(),
            NetworkUrls {
                http: vec![],
                ws: vec!["ws://node:9944".into()],
            },
        );
        let resolver = EndpointResolver::new(Arc::new(config));
        ConnectionManager::new(
            Arc::new(FlakyConnector {
                failures,
                calls: AtomicU32::new(0),
            }),
            resolver,
            RetryPolicy::new(3, 1, 2),
        )
    }

    #[tokio::test]
    async fn test_open_and_reuse() {
        let manager = manager(0);
        let a = manager
            .get_connection(None, RpcMode::Ws, None, 3, false)
            .await
            .unwrap();
        let b = manager
            .get_connection(None, RpcMode::Ws, None, 3, false)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.open_connections(), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let manager = manager(2);
        let handle = manager
            .get_connection(None, RpcMode::Ws, None, 3, false)
            .await;
        assert!(handle.is_ok());
    }

    #[tokio::test]
    async fn test_exhausted_trials_propagate_last_cause() {
        let manager = manager(u32::MAX);
        let result = manager
            .get_connection(None, RpcMode::Ws, None, 3, false)
            .await;
        let Err(err) = result else {
            panic!("expected connection error");
        };
        match err {
            ClientError::Connection { url, source } => {
                assert_eq!(url, "ws://node:9944");
                assert!(source.to_string().contains("refused"));
            }
            other => panic!("expected connection error, got {other}"),
        }
    }

    #[tokio::test]
    async fn test_refresh_drops_handles() {
        let manager = manager(0);
        manager
            .get_connection(None, RpcMode::Ws, None, 3, false)
            .await
            .unwrap();
        assert_eq!(manager.open_connections(), 1);
        manager.refresh();
        assert_eq!(manager.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_unknown_network_fails_fast() {
        let manager = manager(0);
        let result = manager
            .get_connection(None, RpcMode::Ws, Some("nowhere"), 3, false)
            .await;
        assert!(matches!(result, Err(ClientError::Configuration(_))));
    }
}
