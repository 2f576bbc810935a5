//! Storage query subsystem.
//!
//! # Data Flow
//! ```text
//! QueryArgs
//!     → cache path (network + module + storage + params)
//!     → warm hit: return without touching the network
//!     → miss: retry loop → ConnectionManager → LedgerRpc storage read
//!     → write-through to the cache, return
//! ```
//!
//! # Design Decisions
//! - A warm, non-updating hit never touches the network; staleness is
//!   bounded by `max_age` (or unbounded when unset)
//! - Success always writes through, even when the caller forced `update`
//! - Map results are rebuilt as nested maps with integer-normalized,
//!   ascending-sorted keys, independent of the ledger's key encoding

pub mod map;
pub mod single;

use std::fmt;

use serde_json::Value;

use crate::rpc::RpcMode;

pub use map::{assemble, MapKey, MapNode};
pub use single::QueryEngine;

/// A logical subdivision of the ledger's module registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Every partition; fan-out operations repeat per id.
    All,
    /// One partition.
    Id(u64),
}

impl Partition {
    /// The concrete id, unless this is the all-partitions sentinel.
    pub fn id(&self) -> Option<u64> {
        match self {
            Partition::All => None,
            Partition::Id(id) => Some(*id),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::All => f.write_str("all"),
            Partition::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Arguments for one storage query. Unset fields fall back to the
/// client configuration at call start.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    /// Storage function name.
    pub name: String,
    /// Query parameters, in storage-key order.
    pub params: Vec<Value>,
    /// Storage module; `None` uses the configured default.
    pub module: Option<String>,
    /// Partition id to prepend to the params; the all-partitions
    /// sentinel prepends nothing.
    pub partition: Option<Partition>,
    /// Pin the read to a historical block.
    pub block: Option<u64>,
    /// Cache TTL in seconds; `None` caches forever.
    pub max_age: Option<u64>,
    /// Attempt budget; `None` uses the configured query budget.
    pub trials: Option<u32>,
    /// Bypass the cache on read (the result is still written through).
    pub update: bool,
    /// Transport mode; `None` uses the configured default.
    pub mode: Option<RpcMode>,
    /// Network override, consumed at call start.
    pub network: Option<String>,
}

impl QueryArgs {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn partition(mut self, partition: Partition) -> Self {
        self.partition = Some(partition);
        self
    }

    pub fn block(mut self, block: u64) -> Self {
        self.block = Some(block);
        self
    }

    pub fn max_age(mut self, max_age: Option<u64>) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn trials(mut self, trials: u32) -> Self {
        self.trials = Some(trials);
        self
    }

    pub fn update(mut self, update: bool) -> Self {
        self.update = update;
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Params with the partition id (when concrete) prepended.
    pub fn effective_params(&self) -> Vec<Value> {
        match self.partition {
            Some(Partition::Id(id)) => {
                let mut params = Vec::with_capacity(self.params.len() + 1);
                params.push(Value::from(id));
                params.extend(self.params.iter().cloned());
                params
            }
            _ => self.params.clone(),
        }
    }
}
