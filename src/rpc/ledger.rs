//! The external ledger-client capability.
//!
//! Everything the remote chain can do for us is expressed as the
//! [`LedgerRpc`] trait; opening a transport to one endpoint is the
//! [`Connector`] trait. Production embedders wrap their chain SDK behind
//! these; tests inject programmable mocks.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::keys::SigningKey;

/// Transport mode for an RPC endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcMode {
    Http,
    Ws,
}

impl RpcMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RpcMode::Http => "http",
            RpcMode::Ws => "ws",
        }
    }
}

impl fmt::Display for RpcMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by the ledger capability.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Endpoint unreachable, handshake failed, request dropped.
    #[error("transport error: {0}")]
    Transport(String),

    /// The storage read itself raised.
    #[error("storage read failed: {0}")]
    Storage(String),

    /// Extrinsic submission raised before the chain produced an outcome.
    #[error("submission failed: {0}")]
    Submission(String),
}

/// A composed (unsigned) chain call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDescriptor {
    pub module: String,
    pub function: String,
    pub params: Map<String, Value>,
}

/// A signed, submittable transaction. Opaque to this crate beyond the
/// fields needed for bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extrinsic {
    pub call: CallDescriptor,
    pub signer: String,
    pub nonce: u64,
    pub tip: u128,
}

/// Outcome reported by the chain for a submitted extrinsic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub is_success: bool,
    pub extrinsic_hash: String,
    pub error_message: Option<String>,
}

/// Operations the remote ledger exposes. All storage reads may pin to a
/// historical block via its hash.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Read one named storage value.
    async fn query_storage(
        &self,
        module: &str,
        name: &str,
        params: &[Value],
        block_hash: Option<&str>,
    ) -> Result<Value, RpcError>;

    /// Read a storage map as (composite key, value) pairs. The sequence
    /// is paginated by the capability; callers consume it whole.
    async fn query_storage_map(
        &self,
        module: &str,
        name: &str,
        params: &[Value],
        block_hash: Option<&str>,
    ) -> Result<Vec<(Vec<Value>, Value)>, RpcError>;

    /// Hash of the block at `number`.
    async fn get_block_hash(&self, number: u64) -> Result<String, RpcError>;

    /// Current head block number.
    async fn get_block_number(&self) -> Result<u64, RpcError>;

    /// Next nonce the chain expects from `address`.
    async fn get_account_nonce(&self, address: &str) -> Result<u64, RpcError>;

    /// Compose an unsigned call descriptor.
    async fn compose_call(
        &self,
        module: &str,
        function: &str,
        params: &Map<String, Value>,
    ) -> Result<CallDescriptor, RpcError>;

    /// Sign a call. `nonce` of `None` lets the chain assign one.
    async fn create_signed_extrinsic(
        &self,
        call: &CallDescriptor,
        signer: &SigningKey,
        nonce: Option<u64>,
        tip: u128,
    ) -> Result<Extrinsic, RpcError>;

    /// Submit, optionally waiting for inclusion and finalization.
    async fn submit_extrinsic(
        &self,
        extrinsic: &Extrinsic,
        wait_for_inclusion: bool,
        wait_for_finalization: bool,
    ) -> Result<SubmitResponse, RpcError>;
}

/// Opens a live transport to one endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str, mode: RpcMode) -> Result<Arc<dyn LedgerRpc>, RpcError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_roundtrip() {
        assert_eq!(RpcMode::Http.to_string(), "http");
        let mode: RpcMode = serde_json::from_str("\"ws\"").unwrap();
        assert_eq!(mode, RpcMode::Ws);
    }

    #[test]
    fn test_call_descriptor_serialization() {
        let mut params = Map::new();
        params.insert("amount".into(), Value::from(10));
        let call = CallDescriptor {
            module: "Ledger".into(),
            function: "transfer".into(),
            params,
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json["module"], "Ledger");
        assert_eq!(json["params"]["amount"], 10);
    }
}
