//! Single-value query engine.

use std::sync::Arc;

use serde_json::Value;

use crate::cache::{cache_path, QueryCache};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::query::QueryArgs;
use crate::resilience::RetryPolicy;
use crate::rpc::{ConnectionManager, EndpointResolver, RpcMode};

/// Fetches scalar and map storage values with retry and write-through
/// caching. Cheap to clone; clones share the connection map and cache.
#[derive(Clone)]
pub struct QueryEngine {
    pub(crate) config: Arc<ClientConfig>,
    pub(crate) connections: ConnectionManager,
    pub(crate) resolver: EndpointResolver,
    pub(crate) cache: QueryCache,
    pub(crate) retry: RetryPolicy,
}

impl QueryEngine {
    pub fn new(
        config: Arc<ClientConfig>,
        connections: ConnectionManager,
        resolver: EndpointResolver,
        cache: QueryCache,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.trials.query,
            config.retry.base_delay_ms,
            config.retry.max_delay_ms,
        );
        Self {
            config,
            connections,
            resolver,
            cache,
            retry,
        }
    }

    /// Read one named storage value.
    ///
    /// A warm, non-updating cache hit returns immediately without
    /// touching the network. On a miss the read is attempted up to the
    /// trial budget; the final attempt's error propagates. Success
    /// always writes through to the cache.
    pub async fn query(&self, args: &QueryArgs) -> Result<Value> {
        let plan = self.plan(args);

        if let Some(hit) = self.cache.get(&plan.path, args.max_age, args.update)? {
            return Ok(hit);
        }

        let value = {
            let this = self.clone();
            let plan = plan.clone();
            self.retry
                .with_attempts(plan.trials)
                .run("query", move || {
                    let this = this.clone();
                    let plan = plan.clone();
                    async move { this.attempt_scalar(&plan).await }
                })
                .await?
        };

        self.cache.put(&plan.path, &value)?;
        Ok(value)
    }

    /// Everything one query needs, resolved from args + config once at
    /// call start.
    pub(crate) fn plan(&self, args: &QueryArgs) -> QueryPlan {
        let network = self.resolver.resolve_network(args.network.as_deref());
        let module = args
            .module
            .clone()
            .unwrap_or_else(|| self.config.default_module.clone());
        let params = args.effective_params();
        let path = cache_path(&network, &module, &args.name, &params);
        QueryPlan {
            network,
            module,
            name: args.name.clone(),
            params,
            path,
            block: args.block,
            mode: args.mode.unwrap_or(self.config.network_mode),
            trials: args.trials.unwrap_or(self.config.trials.query),
        }
    }

    async fn attempt_scalar(&self, plan: &QueryPlan) -> Result<Value> {
        let conn = self.acquire(plan).await?;
        let block_hash = self.pin_block(&*conn, plan).await?;
        conn.query_storage(&plan.module, &plan.name, &plan.params, block_hash.as_deref())
            .await
            .map_err(|source| ClientError::Query {
                what: plan.what(),
                source,
            })
    }

    pub(crate) async fn acquire(
        &self,
        plan: &QueryPlan,
    ) -> Result<Arc<dyn crate::rpc::LedgerRpc>> {
        self.connections
            .get_connection(
                None,
                plan.mode,
                Some(&plan.network),
                self.config.trials.connect,
                false,
            )
            .await
    }

    pub(crate) async fn pin_block(
        &self,
        conn: &dyn crate::rpc::LedgerRpc,
        plan: &QueryPlan,
    ) -> Result<Option<String>> {
        match plan.block {
            Some(number) => conn
                .get_block_hash(number)
                .await
                .map(Some)
                .map_err(|source| ClientError::Query {
                    what: plan.what(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("network", &self.config.network)
            .finish()
    }
}

/// Resolved per-call plan shared by the scalar and map paths.
#[derive(Debug, Clone)]
pub(crate) struct QueryPlan {
    pub network: String,
    pub module: String,
    pub name: String,
    pub params: Vec<Value>,
    pub path: String,
    pub block: Option<u64>,
    pub mode: RpcMode,
    pub trials: u32,
}

impl QueryPlan {
    pub fn what(&self) -> String {
        format!("{}.{}", self.module, self.name)
    }
}
