//! The submission pipeline.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::keys::{Keyring, SigningKey};
use crate::observability::metrics;
use crate::resilience::RetryPolicy;
use crate::rpc::{CallDescriptor, ConnectionManager, EndpointResolver, LedgerRpc, RpcMode, SubmitResponse};
use crate::store::{unix_now_ms, DiskStore, StoreError};
use crate::tx::record::{complete_path, pending_path, SubmitOutcome, TxRecord};

/// Arguments for one chain call. Unset fields fall back to the client
/// configuration at call start.
#[derive(Debug, Clone)]
pub struct ComposeArgs {
    /// Dispatchable function name.
    pub function: String,
    /// Target module; `None` uses the configured default.
    pub module: Option<String>,
    /// Named call parameters. Float values are truncated to integers.
    pub params: Map<String, Value>,
    /// Keyring alias of the signer; `None` uses the `default` alias.
    pub key: Option<String>,
    /// Tip in token units; values at or above the configured threshold
    /// are taken as already scaled to the base unit.
    pub tip: u64,
    /// Wrap the call in a sudo dispatch.
    pub sudo: bool,
    /// Wrap in a sudo dispatch that skips weight checking.
    pub unchecked_weight: bool,
    /// Explicit nonce; `None` lets the chain assign one.
    pub nonce: Option<u64>,
    pub wait_for_inclusion: bool,
    pub wait_for_finalization: bool,
    /// Attempt budget; `None` uses the configured submit budget.
    pub trials: Option<u32>,
    /// Transport mode; `None` uses the configured default.
    pub mode: Option<RpcMode>,
    /// Network override, consumed at call start.
    pub network: Option<String>,
}

impl ComposeArgs {
    pub fn new(function: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            function: function.into(),
            module: None,
            params,
            key: None,
            tip: 0,
            sudo: false,
            unchecked_weight: false,
            nonce: None,
            wait_for_inclusion: true,
            wait_for_finalization: true,
            trials: None,
            mode: None,
            network: None,
        }
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn tip(mut self, tip: u64) -> Self {
        self.tip = tip;
        self
    }

    pub fn sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    pub fn unchecked_weight(mut self, unchecked_weight: bool) -> Self {
        self.unchecked_weight = unchecked_weight;
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn trials(mut self, trials: u32) -> Self {
        self.trials = Some(trials);
        self
    }
}

/// Composes, signs, submits, and records chain calls. Cheap to clone;
/// clones share connections, history store, and keyring.
#[derive(Clone)]
pub struct TxSubmitter {
    config: Arc<ClientConfig>,
    connections: ConnectionManager,
    resolver: EndpointResolver,
    store: Arc<DiskStore>,
    keyring: Arc<Keyring>,
    retry: RetryPolicy,
}

impl TxSubmitter {
    pub fn new(
        config: Arc<ClientConfig>,
        connections: ConnectionManager,
        resolver: EndpointResolver,
        store: Arc<DiskStore>,
        keyring: Arc<Keyring>,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.trials.submit,
            config.retry.base_delay_ms,
            config.retry.max_delay_ms,
        );
        Self {
            config,
            connections,
            resolver,
            store,
            keyring,
            retry,
        }
    }

    /// Compose and submit one chain call.
    ///
    /// The pending record hits disk before any network traffic. A
    /// chain-reported failure completes the record with `success:
    /// false` and returns `Ok`; transport errors consume the retry
    /// budget and, exhausted, leave the pending record in place.
    pub async fn compose_call(&self, args: ComposeArgs) -> Result<SubmitOutcome> {
        let signer = self.resolve_signer(args.key.as_deref())?;
        let module = args
            .module
            .clone()
            .unwrap_or_else(|| self.config.default_module.clone());
        let network = self.resolver.resolve_network(args.network.as_deref());
        let params = normalize_params(args.params.clone());
        let start_ms = unix_now_ms();

        let record = TxRecord::pending(&module, &args.function, params.clone(), &signer.address, start_ms);
        let pending = pending_path(&network, &signer.address, &module, &args.function, start_ms);
        self.store
            .put(&pending, &serde_json::to_value(&record).map_err(StoreError::from)?)?;

        tracing::info!(
            module,
            function = %args.function,
            signer = %signer.address,
            network,
            "submitting chain call"
        );

        let submitted = {
            let this = self.clone();
            let args = args.clone();
            let module = module.clone();
            let network = network.clone();
            let params = params.clone();
            let signer = signer.clone();
            self.retry
                .with_attempts(args.trials.unwrap_or(self.config.trials.submit))
                .run("submit", move || {
                    let this = this.clone();
                    let args = args.clone();
                    let module = module.clone();
                    let network = network.clone();
                    let params = params.clone();
                    let signer = signer.clone();
                    async move { this.attempt(&args, &module, &network, &params, &signer).await }
                })
                .await
        };

        match submitted {
            Ok(response) => {
                let outcome = classify(response);
                let end_ms = unix_now_ms();
                let complete = complete_path(&network, &signer.address, &module, &args.function, start_ms);
                self.store.remove(&pending)?;
                let finished = serde_json::to_value(record.completed(outcome.clone(), end_ms))
                    .map_err(StoreError::from)?;
                self.store.put(&complete, &finished)?;
                metrics::record_tx_submitted(outcome.success);
                Ok(outcome)
            }
            Err(e) => {
                // Pending record stays behind as crash/failure evidence
                tracing::error!(error = %e, pending = %pending, "submission failed, pending record kept");
                metrics::record_tx_submitted(false);
                Err(e)
            }
        }
    }

    async fn attempt(
        &self,
        args: &ComposeArgs,
        module: &str,
        network: &str,
        params: &Map<String, Value>,
        signer: &SigningKey,
    ) -> Result<SubmitResponse> {
        let what = format!("{module}.{}", args.function);
        let conn = self
            .connections
            .get_connection(
                None,
                args.mode.unwrap_or(self.config.network_mode),
                Some(network),
                self.config.trials.connect,
                false,
            )
            .await?;

        let wrap = |source| ClientError::Query {
            what: what.clone(),
            source,
        };

        let mut call = conn
            .compose_call(module, &args.function, params)
            .await
            .map_err(wrap)?;
        if args.sudo || args.unchecked_weight {
            call = self
                .wrap_sudo(&*conn, call, args.unchecked_weight)
                .await
                .map_err(wrap)?;
        }

        let extrinsic = conn
            .create_signed_extrinsic(&call, signer, args.nonce, self.scale_tip(args.tip))
            .await
            .map_err(wrap)?;
        conn.submit_extrinsic(&extrinsic, args.wait_for_inclusion, args.wait_for_finalization)
            .await
            .map_err(wrap)
    }

    async fn wrap_sudo(
        &self,
        conn: &dyn LedgerRpc,
        call: CallDescriptor,
        unchecked_weight: bool,
    ) -> std::result::Result<CallDescriptor, crate::rpc::RpcError> {
        let mut params = Map::new();
        params.insert("call".into(), serde_json::to_value(&call).unwrap_or(Value::Null));
        let function = if unchecked_weight {
            params.insert("weight".into(), Value::from(vec![0u64, 0u64]));
            "sudo_unchecked_weight"
        } else {
            "sudo"
        };
        conn.compose_call("Sudo", function, &params).await
    }

    fn scale_tip(&self, tip: u64) -> u128 {
        scale_tip(tip, self.config.max_tip, self.config.token_decimals)
    }

    fn resolve_signer(&self, alias: Option<&str>) -> Result<SigningKey> {
        let alias = alias.unwrap_or("default");
        self.keyring.get(alias).ok_or_else(|| {
            ClientError::Configuration(format!("no signing key under alias: {alias}"))
        })
    }

    /// In-flight submission records, newest last.
    pub async fn pending_txs(&self, address: &str, network: Option<&str>) -> Result<Vec<TxRecord>> {
        self.history(address, network, "pending")
    }

    /// Finished submission records, newest last.
    pub async fn complete_txs(&self, address: &str, network: Option<&str>) -> Result<Vec<TxRecord>> {
        self.history(address, network, "complete")
    }

    fn history(&self, address: &str, network: Option<&str>, phase: &str) -> Result<Vec<TxRecord>> {
        let network = self.resolver.resolve_network(network);
        let prefix = format!("history/{network}/{address}/{phase}");
        let mut records = Vec::new();
        for path in self.store.list_paths(&prefix)? {
            if let Some(value) = self.store.get(&path)? {
                match serde_json::from_value::<TxRecord>(value) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(path, error = %e, "unreadable history record, skipping"),
                }
            }
        }
        records.sort_by_key(|r| r.start_time);
        Ok(records)
    }
}

impl std::fmt::Debug for TxSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxSubmitter")
            .field("network", &self.config.network)
            .finish()
    }
}

fn classify(response: SubmitResponse) -> SubmitOutcome {
    let msg = if response.is_success {
        "transaction included".to_string()
    } else {
        "transaction failed on chain".to_string()
    };
    SubmitOutcome {
        success: response.is_success,
        tx_hash: Some(response.extrinsic_hash),
        error: response.error_message,
        msg,
    }
}

/// Tips below the threshold are in token units and get scaled; at or
/// above it they are already in the base unit.
fn scale_tip(tip: u64, max_tip: u64, token_decimals: u32) -> u128 {
    if tip < max_tip {
        (tip as u128) * 10u128.pow(token_decimals)
    } else {
        tip as u128
    }
}

/// Float parameters are truncated to integers; everything else passes
/// through untouched.
fn normalize_params(params: Map<String, Value>) -> Map<String, Value> {
    params
        .into_iter()
        .map(|(k, v)| {
            let v = match v.as_f64() {
                Some(f) if v.is_f64() => Value::from(f.trunc() as i64),
                _ => v,
            };
            (k, v)
        })
        .collect()
}
