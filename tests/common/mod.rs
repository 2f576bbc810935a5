//! Shared test doubles: a programmable in-memory ledger and connector.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};

use ledger_client::config::NetworkUrls;
use ledger_client::keys::{Keyring, SigningKey};
use ledger_client::rpc::{
    CallDescriptor, Connector, Extrinsic, LedgerRpc, RpcError, RpcMode, SubmitResponse,
};
use ledger_client::ClientConfig;

pub const ADDR_A: &str = "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY";
pub const ADDR_B: &str = "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty";
pub const ADDR_C: &str = "5DAAnrj7VHTznn2AWBemMuyBwZWs6FNFjdyVXUeYum3PTXFy";

fn storage_key(module: &str, name: &str, params: &[Value]) -> String {
    format!("{module}/{name}/{}", serde_json::to_string(params).unwrap())
}

/// In-memory ledger with scripted values and failure injection.
#[derive(Default)]
pub struct MockLedger {
    storage: Mutex<HashMap<String, Value>>,
    maps: Mutex<HashMap<String, Vec<(Vec<Value>, Value)>>>,
    /// The next N storage reads fail with a transport error.
    pub fail_queries: AtomicU32,
    /// The next N submissions fail with a transport error.
    pub fail_submissions: AtomicU32,
    /// When set, submissions complete with a chain-reported failure.
    pub chain_rejects: AtomicU32,
    pub query_calls: AtomicU32,
    pub submit_calls: AtomicU32,
    pub block: AtomicU64,
    pub last_extrinsic: Mutex<Option<Extrinsic>>,
}

impl MockLedger {
    pub fn new() -> Self {
        let ledger = Self::default();
        ledger.block.store(100, Ordering::SeqCst);
        ledger
    }

    pub fn set_storage(&self, module: &str, name: &str, params: &[Value], value: Value) {
        self.storage
            .lock()
            .unwrap()
            .insert(storage_key(module, name, params), value);
    }

    pub fn set_map(
        &self,
        module: &str,
        name: &str,
        params: &[Value],
        pairs: Vec<(Vec<Value>, Value)>,
    ) {
        self.maps
            .lock()
            .unwrap()
            .insert(storage_key(module, name, params), pairs);
    }

    fn take_failure(&self, counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn query_storage(
        &self,
        module: &str,
        name: &str,
        params: &[Value],
        _block_hash: Option<&str>,
    ) -> Result<Value, RpcError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure(&self.fail_queries) {
            return Err(RpcError::Transport("injected query failure".into()));
        }
        Ok(self
            .storage
            .lock()
            .unwrap()
            .get(&storage_key(module, name, params))
            .cloned()
            .unwrap_or(Value::Null))
    }

    async fn query_storage_map(
        &self,
        module: &str,
        name: &str,
        params: &[Value],
        _block_hash: Option<&str>,
    ) -> Result<Vec<(Vec<Value>, Value)>, RpcError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        if self.take_failure(&self.fail_queries) {
            return Err(RpcError::Transport("injected map failure".into()));
        }
        Ok(self
            .maps
            .lock()
            .unwrap()
            .get(&storage_key(module, name, params))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_block_hash(&self, number: u64) -> Result<String, RpcError> {
        Ok(format!("0xblock{number}"))
    }

    async fn get_block_number(&self) -> Result<u64, RpcError> {
        Ok(self.block.load(Ordering::SeqCst))
    }

    async fn get_account_nonce(&self, _address: &str) -> Result<u64, RpcError> {
        Ok(7)
    }

    async fn compose_call(
        &self,
        module: &str,
        function: &str,
        params: &Map<String, Value>,
    ) -> Result<CallDescriptor, RpcError> {
        Ok(CallDescriptor {
            module: module.to_string(),
            function: function.to_string(),
            params: params.clone(),
        })
    }

    async fn create_signed_extrinsic(
        &self,
        call: &CallDescriptor,
        signer: &SigningKey,
        nonce: Option<u64>,
        tip: u128,
    ) -> Result<Extrinsic, RpcError> {
        Ok(Extrinsic {
            call: call.clone(),
            signer: signer.address.clone(),
            nonce: nonce.unwrap_or(7),
            tip,
        })
    }

    async fn submit_extrinsic(
        &self,
        extrinsic: &Extrinsic,
        _wait_for_inclusion: bool,
        _wait_for_finalization: bool,
    ) -> Result<SubmitResponse, RpcError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_extrinsic.lock().unwrap() = Some(extrinsic.clone());
        if self.take_failure(&self.fail_submissions) {
            return Err(RpcError::Transport("injected submit failure".into()));
        }
        if self.take_failure(&self.chain_rejects) {
            return Ok(SubmitResponse {
                is_success: false,
                extrinsic_hash: "0xdead".into(),
                error_message: Some("BadOrigin".into()),
            });
        }
        Ok(SubmitResponse {
            is_success: true,
            extrinsic_hash: "0xfeed".into(),
            error_message: None,
        })
    }
}

/// Hands out one shared [`MockLedger`], optionally failing the first N
/// dials.
pub struct MockConnector {
    pub ledger: Arc<MockLedger>,
    pub fail_connects: AtomicU32,
    pub connect_calls: AtomicU32,
}

impl MockConnector {
    pub fn new(ledger: Arc<MockLedger>) -> Self {
        Self {
            ledger,
            fail_connects: AtomicU32::new(0),
            connect_calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _url: &str, _mode: RpcMode) -> Result<Arc<dyn LedgerRpc>, RpcError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self
            .fail_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if remaining.is_ok() {
            return Err(RpcError::Transport("injected connect failure".into()));
        }
        Ok(self.ledger.clone())
    }
}

/// Config pointed at the mock endpoints, with fast retries and a
/// throwaway store root.
pub fn test_config(store_root: &Path) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.networks.insert(
        "main".into(),
        NetworkUrls {
            http: vec!["http://mock.ledger/rpc".into()],
            ws: vec!["ws://mock.ledger/rpc".into()],
        },
    );
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.batch_timeout_secs = 5;
    config.store_root = store_root.to_path_buf();
    config
}

/// Keyring holding a `default` signer plus the alias `alice`.
pub fn test_keyring() -> Keyring {
    let keyring = Keyring::new();
    keyring.insert(SigningKey {
        name: "default".into(),
        address: ADDR_A.into(),
    });
    keyring.insert(SigningKey {
        name: "alice".into(),
        address: ADDR_B.into(),
    });
    keyring
}
