//! The top-level chain client facade.
//!
//! # Responsibilities
//! - Wire the query engine, key resolution, batching, and submission
//!   subsystems together from one configuration
//! - Expose the aggregate reads (partition parameters, global
//!   parameters, stake views, module info) built on top of them
//!
//! # Design Decisions
//! - Every collaborator is an explicit field; clones share all state
//!   through `Arc` and are safe to hand across tasks
//! - Aggregate reads tolerate partial data: a failed or over-deadline
//!   partition is dropped from the result, never raised

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::{json, Map, Value};

use crate::batch::BatchOrchestrator;
use crate::cache::QueryCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::keys::{KeyResolver, Keyring};
use crate::observability;
use crate::query::{MapKey, MapNode, Partition, QueryArgs, QueryEngine};
use crate::resilience::RetryPolicy;
use crate::rpc::{ConnectionManager, Connector, EndpointResolver, RpcError, RpcMode};
use crate::store::DiskStore;
use crate::tx::{ComposeArgs, SubmitOutcome, TxRecord, TxSubmitter};

const U16_MAX: f64 = 65535.0;

/// A TTL-cached, retrying client for one consensus ledger.
///
/// Cheap to clone; clones share connections, cache, keyring, and
/// history.
#[derive(Clone)]
pub struct ChainClient {
    config: Arc<ClientConfig>,
    engine: QueryEngine,
    submitter: TxSubmitter,
    keys: KeyResolver,
    endpoints: EndpointResolver,
    connections: ConnectionManager,
    keyring: Arc<Keyring>,
    batch: BatchOrchestrator,
    retry: RetryPolicy,
    http: reqwest::Client,
}

impl ChainClient {
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>, keyring: Keyring) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(DiskStore::new(&config.store_root));
        let endpoints = EndpointResolver::new(config.clone());
        let connect_retry = RetryPolicy::new(
            config.trials.connect,
            config.retry.base_delay_ms,
            config.retry.max_delay_ms,
        );
        let connections =
            ConnectionManager::new(connector, endpoints.clone(), connect_retry);
        let engine = QueryEngine::new(
            config.clone(),
            connections.clone(),
            endpoints.clone(),
            QueryCache::new(store.clone()),
        );
        let batch = BatchOrchestrator::new(Duration::from_secs(config.batch_timeout_secs));
        let keyring = Arc::new(keyring);
        let keys = KeyResolver::new(engine.clone(), batch, keyring.clone());
        let submitter = TxSubmitter::new(
            config.clone(),
            connections.clone(),
            endpoints.clone(),
            store,
            keyring.clone(),
        );
        let retry = RetryPolicy::new(
            config.trials.query,
            config.retry.base_delay_ms,
            config.retry.max_delay_ms,
        );
        Self {
            config,
            engine,
            submitter,
            keys,
            endpoints,
            connections,
            keyring,
            batch,
            retry,
            http: reqwest::Client::new(),
        }
    }

    /// Install the tracing subscriber. Call once per process.
    pub fn init_logging() {
        observability::logging::init();
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    /// Drop every cached connection; the next call redials.
    pub fn refresh_connections(&self) {
        self.connections.refresh();
    }

    // ---- storage reads ------------------------------------------------

    /// Read one named storage value. See [`QueryArgs`] for the knobs.
    pub async fn query(&self, args: &QueryArgs) -> Result<Value> {
        self.engine.query(args).await
    }

    /// Read a storage map as nested, key-sorted maps.
    pub async fn query_map(&self, args: &QueryArgs) -> Result<BTreeMap<MapKey, MapNode>> {
        self.engine.query_map(args).await
    }

    /// Ids of every partition currently registered on the ledger.
    pub async fn partitions(&self, network: Option<&str>) -> Result<Vec<u64>> {
        let args = self
            .named_query("N", network)
            .max_age(self.config.default_max_age_secs);
        let map = self.engine.query_map(&args).await?;
        Ok(map
            .keys()
            .filter_map(|key| match key {
                MapKey::Int(id) if *id >= 0 => Some(*id as u64),
                _ => None,
            })
            .collect())
    }

    /// The configured parameter set of one partition, or of all of them
    /// keyed by partition id.
    ///
    /// Features are fetched concurrently; one that fails or misses the
    /// batch deadline is absent from the result.
    pub async fn partition_params(
        &self,
        partition: Partition,
        update: bool,
        network: Option<&str>,
    ) -> Result<Value> {
        let mut tasks: Vec<(String, BoxFuture<'static, Result<BTreeMap<MapKey, MapNode>>>)> =
            Vec::new();
        for feature in &self.config.partition_features {
            let engine = self.engine.clone();
            let args = self
                .named_query(&feature_to_storage(feature), network)
                .update(update)
                .max_age(self.config.default_max_age_secs);
            tasks.push((
                feature.clone(),
                Box::pin(async move { engine.query_map(&args).await }),
            ));
        }
        let results = self.batch.run(tasks).await;

        match partition {
            Partition::Id(id) => {
                let mut params = Map::new();
                for (feature, map) in results {
                    if let Some(MapNode::Leaf(value)) = map.get(&MapKey::Int(id as i64)) {
                        params.insert(feature_to_name(&feature), value.clone());
                    }
                }
                Ok(Value::Object(params))
            }
            Partition::All => {
                let mut by_partition: BTreeMap<i64, Map<String, Value>> = BTreeMap::new();
                for (feature, map) in results {
                    let name = feature_to_name(&feature);
                    for (key, node) in map {
                        if let (MapKey::Int(id), MapNode::Leaf(value)) = (key, node) {
                            by_partition.entry(id).or_default().insert(name.clone(), value);
                        }
                    }
                }
                let mut out = Map::new();
                for (id, params) in by_partition {
                    out.insert(id.to_string(), Value::Object(params));
                }
                Ok(Value::Object(out))
            }
        }
    }

    /// The ledger-wide parameter set.
    pub async fn global_params(&self, update: bool, network: Option<&str>) -> Result<Value> {
        let mut tasks: Vec<(String, BoxFuture<'static, Result<Value>>)> = Vec::new();
        for feature in &self.config.global_features {
            let engine = self.engine.clone();
            let args = self
                .named_query(&feature_to_storage(feature), network)
                .update(update)
                .max_age(self.config.default_max_age_secs);
            tasks.push((
                feature.clone(),
                Box::pin(async move { engine.query(&args).await }),
            ));
        }
        let results = self.batch.run(tasks).await;

        let mut params = Map::new();
        for (feature, value) in results {
            params.insert(feature_to_name(&feature), value);
        }
        Ok(Value::Object(params))
    }

    /// Free balance of an account, in base units.
    pub async fn get_balance(&self, key: &str, network: Option<&str>) -> Result<u64> {
        let address = self.resolve_key_ss58(key, Partition::Id(0), network).await?;
        let args = QueryArgs::new("Account")
            .module("System")
            .params(vec![Value::from(address)])
            .max_age(self.config.default_max_age_secs);
        let args = match network {
            Some(network) => args.network(network),
            None => args,
        };
        let account = self.engine.query(&args).await?;
        Ok(account
            .get("data")
            .and_then(|data| data.get("free"))
            .and_then(Value::as_u64)
            .unwrap_or(0))
    }

    // ---- stake views --------------------------------------------------

    /// Total stake pointed at `key`, in base units.
    pub async fn get_stake(
        &self,
        key: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<u64> {
        let incoming = self.get_stake_from(key, partition, network).await?;
        Ok(incoming.values().sum())
    }

    /// Who stakes on `key`, and how much. The all-partitions form sums
    /// per staker across partitions, dropping any partition that fails.
    pub async fn get_stake_from(
        &self,
        key: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<HashMap<String, u64>> {
        self.stake_view("StakeFrom", key, partition, network).await
    }

    /// Where `key`'s stake goes, and how much.
    pub async fn get_stake_to(
        &self,
        key: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<HashMap<String, u64>> {
        self.stake_view("StakeTo", key, partition, network).await
    }

    async fn stake_view(
        &self,
        table: &'static str,
        key: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<HashMap<String, u64>> {
        let address = self.resolve_key_ss58(key, partition, network).await?;
        match partition {
            Partition::Id(_) => {
                let map = self.stake_table(table, partition, network).await?;
                Ok(stake_of(&map, &address))
            }
            Partition::All => {
                let ids = self.partitions(network).await?;
                let mut tasks: Vec<(String, BoxFuture<'static, Result<HashMap<String, u64>>>)> =
                    Vec::new();
                for id in ids {
                    let this = self.clone();
                    let address = address.clone();
                    let network = network.map(String::from);
                    tasks.push((
                        id.to_string(),
                        Box::pin(async move {
                            let map = this
                                .stake_table(table, Partition::Id(id), network.as_deref())
                                .await?;
                            Ok(stake_of(&map, &address))
                        }),
                    ));
                }
                let results = self.batch.run(tasks).await;
                let mut merged: HashMap<String, u64> = HashMap::new();
                for partial in results.into_values() {
                    for (staker, amount) in partial {
                        *merged.entry(staker).or_insert(0) += amount;
                    }
                }
                Ok(merged)
            }
        }
    }

    async fn stake_table(
        &self,
        table: &'static str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<BTreeMap<MapKey, MapNode>> {
        let args = self
            .named_query(table, network)
            .partition(partition)
            .max_age(self.config.default_max_age_secs);
        self.engine.query_map(&args).await
    }

    // ---- key resolution -----------------------------------------------

    /// The registered name → address mapping for one partition.
    pub async fn name_key_map(
        &self,
        partition: Partition,
        update: bool,
        network: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        self.keys.name_key_map(partition, update, network).await
    }

    /// The address registered under `name`, if any.
    pub async fn name_to_key(
        &self,
        name: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<Option<String>> {
        self.keys.name_to_key(name, partition, network).await
    }

    /// The name registered for `key`, if any.
    pub async fn key_to_name(
        &self,
        key: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<Option<String>> {
        self.keys.key_to_name(key, partition, network).await
    }

    /// Resolve an address, keyring alias, or registered name to an SS58
    /// address.
    pub async fn resolve_key_ss58(
        &self,
        reference: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<String> {
        self.keys.resolve_key_ss58(reference, partition, network).await
    }

    // ---- module info --------------------------------------------------

    /// Registry record of one module, decoded for human consumption.
    ///
    /// Goes over the HTTP JSON-RPC surface rather than storage reads;
    /// `lite` strips the record down to the configured field set.
    pub async fn get_module(
        &self,
        module: &str,
        partition: Partition,
        network: Option<&str>,
        lite: bool,
    ) -> Result<Value> {
        let address = self.resolve_key_ss58(module, partition, network).await?;
        let partition_id = partition.id().unwrap_or(0);
        let url = self.endpoints.resolve_url(None, RpcMode::Http, network)?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "module_info",
            "params": [address, partition_id],
        });

        let raw = {
            let http = self.http.clone();
            let url = url.clone();
            self.retry
                .run("module_info", move || {
                    let http = http.clone();
                    let url = url.clone();
                    let body = body.clone();
                    async move {
                        let response = http
                            .post(&url)
                            .json(&body)
                            .send()
                            .await
                            .map_err(|e| transport(&url, e))?;
                        let payload: Value =
                            response.json().await.map_err(|e| transport(&url, e))?;
                        payload
                            .get("result")
                            .cloned()
                            .ok_or_else(|| ClientError::Query {
                                what: "module_info".into(),
                                source: RpcError::Storage(format!(
                                    "malformed module_info response: {payload}"
                                )),
                            })
                    }
                })
                .await?
        };

        let block = self.current_block(network).await?;
        let mut info = decode_module_info(raw, block);
        if lite {
            retain_lite_fields(&mut info, &self.config.module_features);
        }
        Ok(info)
    }

    async fn current_block(&self, network: Option<&str>) -> Result<u64> {
        let network = self.endpoints.resolve_network(network);
        let conn = self
            .connections
            .get_connection(
                None,
                self.config.network_mode,
                Some(&network),
                self.config.trials.connect,
                false,
            )
            .await?;
        conn.get_block_number().await.map_err(|source| ClientError::Query {
            what: "block_number".into(),
            source,
        })
    }

    // ---- submission ---------------------------------------------------

    /// Compose, sign, submit, and record one chain call.
    pub async fn compose_call(&self, args: ComposeArgs) -> Result<SubmitOutcome> {
        self.submitter.compose_call(args).await
    }

    /// In-flight submissions recorded for `key`.
    pub async fn pending_txs(&self, key: &str, network: Option<&str>) -> Result<Vec<TxRecord>> {
        let address = self.resolve_key_ss58(key, Partition::Id(0), network).await?;
        self.submitter.pending_txs(&address, network).await
    }

    /// Finished submissions recorded for `key`.
    pub async fn complete_txs(&self, key: &str, network: Option<&str>) -> Result<Vec<TxRecord>> {
        let address = self.resolve_key_ss58(key, Partition::Id(0), network).await?;
        self.submitter.complete_txs(&address, network).await
    }

    // ---- units --------------------------------------------------------

    /// Base units → tokens.
    pub fn to_unit(&self, base: u64) -> f64 {
        to_unit(base, self.config.token_decimals)
    }

    /// Tokens → base units, truncating sub-unit precision.
    pub fn from_unit(&self, tokens: f64) -> u64 {
        from_unit(tokens, self.config.token_decimals)
    }

    fn named_query(&self, name: &str, network: Option<&str>) -> QueryArgs {
        match network {
            Some(network) => QueryArgs::new(name).network(network),
            None => QueryArgs::new(name),
        }
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("network", &self.config.network)
            .field("open_connections", &self.connections.open_connections())
            .finish()
    }
}

fn transport(url: &str, e: reqwest::Error) -> ClientError {
    ClientError::Connection {
        url: url.to_string(),
        source: RpcError::Transport(e.to_string()),
    }
}

/// `key`'s row of a two-level stake table, flattened to counterparty →
/// amount.
fn stake_of(map: &BTreeMap<MapKey, MapNode>, key: &str) -> HashMap<String, u64> {
    let Some(MapNode::Map(row)) = map.get(&MapKey::Str(key.to_string())) else {
        return HashMap::new();
    };
    row.iter()
        .filter_map(|(counterparty, node)| match node {
            MapNode::Leaf(amount) => Some((counterparty.to_string(), amount.as_u64()?)),
            MapNode::Map(_) => None,
        })
        .collect()
}

/// Base units → tokens.
pub fn to_unit(base: u64, token_decimals: u32) -> f64 {
    base as f64 / 10u64.pow(token_decimals) as f64
}

/// Tokens → base units, truncating sub-unit precision.
pub fn from_unit(tokens: f64, token_decimals: u32) -> u64 {
    (tokens * 10u64.pow(token_decimals) as f64) as u64
}

/// Storage feature name for a snake_case field (`min_stake` →
/// `MinStake`).
pub fn feature_to_storage(feature: &str) -> String {
    feature
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Field name for a storage feature (`MinStake` → `min_stake`).
pub fn feature_to_name(storage: &str) -> String {
    let mut out = String::with_capacity(storage.len() + 4);
    for (i, ch) in storage.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decode the raw registry record: byte-vector strings become UTF-8,
/// u16-normalized ratios become floats, the incoming stake list is
/// summed, and `last_update` becomes a staleness relative to `block`.
fn decode_module_info(raw: Value, block: u64) -> Value {
    let Value::Object(fields) = raw else {
        return raw;
    };
    let mut out = Map::new();
    let mut stake_total = 0u64;

    for (field, value) in fields {
        match field.as_str() {
            "name" | "address" => {
                out.insert(field, Value::from(vec8_to_string(&value)));
            }
            "incentive" | "dividends" => {
                let scaled = value.as_u64().map(|v| v as f64 / U16_MAX).unwrap_or(0.0);
                out.insert(field, Value::from(scaled));
            }
            "stake_from" => {
                let pairs = decode_stake_pairs(&value);
                stake_total = pairs.iter().map(|(_, amount)| amount).sum();
                out.insert(
                    field,
                    Value::Array(
                        pairs
                            .into_iter()
                            .map(|(staker, amount)| json!([staker, amount]))
                            .collect(),
                    ),
                );
            }
            "last_update" => {
                let last = value.as_u64().unwrap_or(0);
                out.insert("vote_staleness".into(), Value::from(block.saturating_sub(last)));
                out.insert(field, value);
            }
            _ => {
                out.insert(field, value);
            }
        }
    }
    out.insert("stake".into(), Value::from(stake_total));
    Value::Object(out)
}

/// Strip a decoded registry record down to the lite field set. The
/// `stake` and `vote_staleness` fields are computed during decoding and
/// always retained alongside the configured features.
fn retain_lite_fields(info: &mut Value, features: &[String]) {
    if let Value::Object(fields) = info {
        fields.retain(|field, _| {
            field == "stake" || field == "vote_staleness" || features.iter().any(|f| f == field)
        });
    }
}

fn decode_stake_pairs(value: &Value) -> Vec<(String, u64)> {
    let Some(entries) = value.as_array() else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let pair = entry.as_array()?;
            let staker = match pair.first()? {
                Value::String(s) => s.clone(),
                arr @ Value::Array(_) => vec8_to_string(arr),
                _ => return None,
            };
            Some((staker, pair.get(1)?.as_u64()?))
        })
        .collect()
}

/// Byte-vector fields arrive as JSON number arrays; anything else passes
/// through as its string form.
fn vec8_to_string(value: &Value) -> String {
    match value {
        Value::Array(bytes) => {
            let bytes: Vec<u8> = bytes
                .iter()
                .filter_map(|b| b.as_u64().map(|b| b as u8))
                .collect();
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
