//! Caching, retrying, concurrently-batched client for a consensus-ledger
//! RPC endpoint, plus a crash-recoverable transaction submission lifecycle.
//!
//! # Architecture Overview
//!
//! ```text
//!  caller
//!    │
//!    ▼
//!  ChainClient (client.rs) ── fixed operation surface, per-call network override
//!    │
//!    ├─▶ query engines (query/) ──▶ QueryCache (cache/) ──▶ DiskStore (store/)
//!    │         │
//!    │         ▼
//!    │   ConnectionManager (rpc/connection.rs) ──▶ EndpointResolver (rpc/endpoint.rs)
//!    │         │
//!    │         ▼
//!    │   LedgerRpc capability (rpc/ledger.rs) ── consensus/encoding/signing live here
//!    │
//!    ├─▶ BatchOrchestrator (batch/) ── fan-out with global deadline, partial results
//!    │
//!    ├─▶ TxSubmitter (tx/) ── pending → complete durable records via DiskStore
//!    │
//!    └─▶ KeyResolver (keys/) ── name ↔ address, self-healing refresh
//! ```
//!
//! The crate never implements ledger consensus, wire encoding, or wallet
//! cryptography; those arrive through the [`rpc::LedgerRpc`] and
//! [`rpc::Connector`] traits supplied by the embedder.

// Core subsystems
pub mod cache;
pub mod client;
pub mod config;
pub mod query;
pub mod rpc;
pub mod store;

// Transaction lifecycle and identity
pub mod keys;
pub mod tx;

// Cross-cutting concerns
pub mod batch;
pub mod error;
pub mod observability;
pub mod resilience;

pub use client::ChainClient;
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use keys::{Keyring, SigningKey};
pub use query::{Partition, QueryArgs};
pub use rpc::{Connector, LedgerRpc, RpcMode};
pub use tx::ComposeArgs;
