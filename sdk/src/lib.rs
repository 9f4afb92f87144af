//! Epoch job SDK - chain-facing primitives for the epoch job agent
//!
//! This SDK provides thin wrappers for:
//! - JSON-RPC access to the node (height, gas price, balance, nonce, call, submit)
//! - Built-in contract addressing and RLP call payloads (`alloy-rlp`)
//! - Account key derivation and bech32 address encoding
//! - Legacy EIP-155 transaction signing (`alloy-consensus`)

pub mod address;
pub mod client;
pub mod contract;
pub mod error;
pub mod transaction;
pub mod types;
pub mod units;

#[cfg(any(test, feature = "testing"))]
pub mod mock;

// Re-export key types
pub use address::{Account, NodeId};
pub use client::{ChainClient, RpcClient};
pub use error::{Result, SdkError};
pub use transaction::{sign_legacy, SignedTransaction};
pub use types::*;
pub use units::BASE_VON;
