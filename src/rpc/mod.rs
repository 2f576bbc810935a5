//! RPC subsystem.
//!
//! # Data Flow
//! ```text
//! query/tx engines
//!     → connection.rs (url → handle map, bounded open retry)
//!     → endpoint.rs (network/mode → one URL, random within candidates)
//!     → ledger.rs (LedgerRpc capability: storage reads, extrinsics)
//! ```
//!
//! # Design Decisions
//! - One shared handle per URL; duplicate-open races are last-write-wins
//!   because handles are stateless query channels
//! - The URL is re-resolved on every open attempt, so retrying rotates
//!   away from a failing endpoint
//! - Consensus, wire encoding, and signing live behind `LedgerRpc`;
//!   this crate only orchestrates

pub mod connection;
pub mod endpoint;
pub mod ledger;

pub use connection::ConnectionManager;
pub use endpoint::EndpointResolver;
pub use ledger::{
    CallDescriptor, Connector, Extrinsic, LedgerRpc, RpcError, RpcMode, SubmitResponse,
};
