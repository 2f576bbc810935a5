//! Durable transaction history records.

use serde::{Deserialize, Serialize};
use serde_json::Map;
use serde_json::Value;

/// Lifecycle phase of a recorded submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Completed,
}

/// What the chain said about a submitted extrinsic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub success: bool,
    pub tx_hash: Option<String>,
    pub error: Option<String>,
    pub msg: String,
}

/// One submission, as persisted under the history tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxRecord {
    pub status: TxStatus,
    pub module: String,
    pub function: String,
    pub params: Map<String, Value>,
    pub signer: String,
    /// Wall-clock start, unix milliseconds. Also the record's identity
    /// within its history directory.
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub response: Option<SubmitOutcome>,
}

impl TxRecord {
    pub fn pending(
        module: impl Into<String>,
        function: impl Into<String>,
        params: Map<String, Value>,
        signer: impl Into<String>,
        start_time: u64,
    ) -> Self {
        Self {
            status: TxStatus::Pending,
            module: module.into(),
            function: function.into(),
            params,
            signer: signer.into(),
            start_time,
            end_time: None,
            response: None,
        }
    }

    /// The completed form of this record.
    pub fn completed(mut self, outcome: SubmitOutcome, end_time: u64) -> Self {
        self.status = TxStatus::Completed;
        self.end_time = Some(end_time);
        self.response = Some(outcome);
        self
    }
}

/// Store path of an in-flight submission record.
pub fn pending_path(network: &str, address: &str, module: &str, function: &str, start_ms: u64) -> String {
    history_path(network, address, "pending", module, function, start_ms)
}

/// Store path of a finished submission record.
pub fn complete_path(network: &str, address: &str, module: &str, function: &str, start_ms: u64) -> String {
    history_path(network, address, "complete", module, function, start_ms)
}

fn history_path(
    network: &str,
    address: &str,
    phase: &str,
    module: &str,
    function: &str,
    start_ms: u64,
) -> String {
    format!("history/{network}/{address}/{phase}/{module}.{function}-{start_ms}")
}
