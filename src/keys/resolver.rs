//! On-chain name and address resolution.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::batch::BatchOrchestrator;
use crate::error::{ClientError, Result};
use crate::keys::{valid_ss58_address, Keyring};
use crate::query::{MapNode, Partition, QueryArgs, QueryEngine};
use crate::rpc::RpcError;

/// Resolves registered names to ledger addresses and back.
///
/// Lookups go through the query cache; a miss triggers a bounded number
/// of forced refreshes before the name is reported as unregistered.
#[derive(Clone)]
pub struct KeyResolver {
    engine: QueryEngine,
    batch: BatchOrchestrator,
    keyring: Arc<Keyring>,
}

impl KeyResolver {
    pub fn new(engine: QueryEngine, batch: BatchOrchestrator, keyring: Arc<Keyring>) -> Self {
        Self {
            engine,
            batch,
            keyring,
        }
    }

    /// The registered name → address mapping for one partition.
    ///
    /// The name and key tables are fetched concurrently and joined by
    /// position after sorting both by registry id.
    pub async fn name_key_map(
        &self,
        partition: Partition,
        update: bool,
        network: Option<&str>,
    ) -> Result<HashMap<String, String>> {
        let mut tasks: Vec<(String, BoxFuture<'static, Result<Vec<Value>>>)> = Vec::new();
        for table in ["Names", "Keys"] {
            let engine = self.engine.clone();
            let mut args = QueryArgs::new(table).partition(partition).update(update);
            if let Some(network) = network {
                args = args.network(network);
            }
            tasks.push((
                table.to_string(),
                Box::pin(async move {
                    let map = engine.query_map(&args).await?;
                    Ok(leaf_values(map))
                }),
            ));
        }

        let mut results = self.batch.run(tasks).await;
        let (names, keys) = match (results.remove("Names"), results.remove("Keys")) {
            (Some(names), Some(keys)) => (names, keys),
            // A dropped table is a failed or over-deadline read, so it
            // stays retryable for callers
            _ => {
                return Err(ClientError::Query {
                    what: "Names/Keys".into(),
                    source: RpcError::Storage("registry table missing from batch".into()),
                })
            }
        };

        let mut mapping = HashMap::with_capacity(names.len().min(keys.len()));
        for (name, key) in names.into_iter().zip(keys) {
            if let (Some(name), Some(key)) = (as_text(&name), as_text(&key)) {
                mapping.insert(name, key);
            }
        }
        Ok(mapping)
    }

    /// The address registered under `name`, if any.
    ///
    /// A cached miss is retried with a forced refresh before concluding
    /// the name is unregistered.
    pub async fn name_to_key(
        &self,
        name: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<Option<String>> {
        let mut update = false;
        for _ in 0..2 {
            let mapping = self.name_key_map(partition, update, network).await?;
            if let Some(key) = mapping.get(name) {
                return Ok(Some(key.clone()));
            }
            tracing::debug!(name, "name not in cached registry, refreshing");
            update = true;
        }
        Ok(None)
    }

    /// The name registered for `key`, if any.
    pub async fn key_to_name(
        &self,
        key: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<Option<String>> {
        let mapping = self.name_key_map(partition, false, network).await?;
        Ok(mapping
            .into_iter()
            .find(|(_, address)| address == key)
            .map(|(name, _)| name))
    }

    /// Resolve any key reference to an SS58 address.
    ///
    /// Precedence: a syntactically valid address stands for itself, then
    /// a local keyring alias, then an on-chain registered name.
    pub async fn resolve_key_ss58(
        &self,
        reference: &str,
        partition: Partition,
        network: Option<&str>,
    ) -> Result<String> {
        if valid_ss58_address(reference) {
            return Ok(reference.to_string());
        }
        if let Some(key) = self.keyring.get(reference) {
            return Ok(key.address);
        }
        if let Some(address) = self.name_to_key(reference, partition, network).await? {
            return Ok(address);
        }
        Err(ClientError::Configuration(format!(
            "unresolvable key reference: {reference}"
        )))
    }
}

impl std::fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyResolver")
            .field("aliases", &self.keyring.aliases().len())
            .finish()
    }
}

/// Leaf values of a flat registry table, in ascending id order.
fn leaf_values(map: std::collections::BTreeMap<crate::query::MapKey, MapNode>) -> Vec<Value> {
    map.into_values()
        .filter_map(|node| match node {
            MapNode::Leaf(value) => Some(value),
            MapNode::Map(_) => None,
        })
        .collect()
}

fn as_text(value: &Value) -> Option<String> {
    value.as_str().map(|s| s.to_string())
}
