use thiserror::Error;

// ================================
// SDK Error Types
// ================================

#[derive(Debug, Error)]
pub enum SdkError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("RPC response for {method} carried neither result nor error")]
    EmptyResponse { method: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid hex quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid hex data: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("Bech32 encoding failed: {0}")]
    Bech32(#[from] bech32::Error),

    #[error("Signing failed: {0}")]
    Signing(String),

    #[error("No built-in contract for function code {0}")]
    UnknownContract(u16),
}

pub type Result<T> = std::result::Result<T, SdkError>;
