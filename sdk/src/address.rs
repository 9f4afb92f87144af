//! Account key derivation and human-readable address encoding

use crate::{types::Address, Result, SdkError};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use bech32::{ToBase32, Variant};
use std::fmt;

/// 512-bit network node identity (uncompressed public key without prefix)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub [u8; 64]);

impl NodeId {
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| SdkError::InvalidNodeId(e.to_string()))?;
        let len = bytes.len();
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| SdkError::InvalidNodeId(format!("expected 64 bytes, got {len}")))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({}..)", &hex::encode(&self.0[..8]))
    }
}

/// A managed account: signing key plus every address form derived from it.
#[derive(Clone)]
pub struct Account {
    signer: PrivateKeySigner,
    pub address: Address,
    /// bech32 form used by the node's RPC interface
    pub bech32: String,
    pub node_id: NodeId,
}

impl Account {
    /// Derive an account from hex key material, the address prefix and the
    /// hex node id it delegates to.
    pub fn derive(private_key_hex: &str, hrp: &str, node_id_hex: &str) -> Result<Self> {
        let key_bytes = hex::decode(private_key_hex.trim_start_matches("0x"))
            .map_err(|e| SdkError::InvalidPrivateKey(e.to_string()))?;
        let signer = PrivateKeySigner::from_slice(&key_bytes)
            .map_err(|e| SdkError::InvalidPrivateKey(e.to_string()))?;
        // keccak256 of the uncompressed public key, last 20 bytes
        let address = Signer::address(&signer);
        let bech32 = encode_bech32(hrp, address.as_slice())?;
        let node_id = NodeId::from_hex(node_id_hex)?;

        Ok(Self {
            signer,
            address,
            bech32,
            node_id,
        })
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("bech32", &self.bech32)
            .field("node_id", &self.node_id)
            .finish_non_exhaustive()
    }
}

/// bech32 encoding of raw address bytes under a human-readable prefix.
pub fn encode_bech32(hrp: &str, data: &[u8]) -> Result<String> {
    Ok(bech32::encode(hrp, data.to_base32(), Variant::Bech32)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known development key (private key 0x...01 is the generator point)
    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    fn node_hex() -> String {
        "ab".repeat(64)
    }

    #[test]
    fn test_generator_point_address() {
        let account = Account::derive(KEY_ONE, "lat", &node_hex()).unwrap();
        let expected: Address = "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf".parse().unwrap();
        assert_eq!(account.address, expected);
        assert!(account.bech32.starts_with("lat1"));
    }

    #[test]
    fn test_bech32_uses_prefix() {
        let a = Account::derive(KEY_ONE, "lat", &node_hex()).unwrap();
        let b = Account::derive(KEY_ONE, "atp", &node_hex()).unwrap();
        assert_eq!(a.address, b.address);
        assert!(b.bech32.starts_with("atp1"));
        assert_ne!(a.bech32, b.bech32);
    }

    #[test]
    fn test_0x_prefix_accepted() {
        let account = Account::derive(&format!("0x{KEY_ONE}"), "lat", &format!("0x{}", node_hex()));
        assert!(account.is_ok());
    }

    #[test]
    fn test_malformed_key_material() {
        assert!(matches!(
            Account::derive("not-hex", "lat", &node_hex()),
            Err(SdkError::InvalidPrivateKey(_))
        ));
        // zero is not a valid scalar
        assert!(matches!(
            Account::derive(&"00".repeat(32), "lat", &node_hex()),
            Err(SdkError::InvalidPrivateKey(_))
        ));
    }

    #[test]
    fn test_malformed_node_id() {
        assert!(matches!(
            Account::derive(KEY_ONE, "lat", "abcd"),
            Err(SdkError::InvalidNodeId(_))
        ));
    }

    #[test]
    fn test_debug_hides_key() {
        let account = Account::derive(KEY_ONE, "lat", &node_hex()).unwrap();
        let debug = format!("{account:?}");
        assert!(!debug.contains(KEY_ONE));
        assert!(debug.to_lowercase().contains("7e5f4552"));
    }
}
