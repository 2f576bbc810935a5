//! Key identity subsystem.
//!
//! # Data Flow
//! ```text
//! alias or address
//!     → keyring.rs (local alias → signing key handle)
//!     → resolver.rs (on-chain name ↔ address, self-healing refresh)
//! ```
//!
//! # Design Decisions
//! - Signing key material never lives here; the handle carries only the
//!   display name and address, and signing happens behind `LedgerRpc`
//! - Address validity is a syntactic SS58 check, not a checksum

pub mod keyring;
pub mod resolver;

pub use keyring::{valid_ss58_address, Keyring, SigningKey};
pub use resolver::KeyResolver;
