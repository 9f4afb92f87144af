//! Common types used across the SDK

use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, TxHash};

/// Block selector for state queries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Pending,
    Number(u64),
}

impl BlockTag {
    /// Map an optional signed height to a tag. `None` is the latest block and
    /// `-1` is the pending-block sentinel.
    pub fn from_height(height: Option<i64>) -> Self {
        match height {
            None => BlockTag::Latest,
            Some(-1) => BlockTag::Pending,
            Some(n) if n < 0 => BlockTag::Latest,
            Some(n) => BlockTag::Number(n as u64),
        }
    }

    pub fn to_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Pending => "pending".to_string(),
            BlockTag::Number(n) => format!("{n:#x}"),
        }
    }
}

/// Parameters for a read-only contract call
#[derive(Debug, Clone, Default)]
pub struct CallMsg {
    /// Human-readable sender address
    pub from: String,
    /// Human-readable contract address
    pub to: String,
    /// Zero means the node picks the gas
    pub gas: u64,
    pub gas_price: Option<u128>,
    pub value: Option<u128>,
    pub data: Vec<u8>,
}

impl CallMsg {
    pub fn to_param(&self) -> serde_json::Value {
        let mut arg = serde_json::Map::new();
        arg.insert("from".into(), self.from.clone().into());
        arg.insert("to".into(), self.to.clone().into());
        if !self.data.is_empty() {
            arg.insert("data".into(), format!("0x{}", hex::encode(&self.data)).into());
        }
        if let Some(value) = self.value {
            arg.insert("value".into(), format!("{value:#x}").into());
        }
        if self.gas != 0 {
            arg.insert("gas".into(), format!("{:#x}", self.gas).into());
        }
        if let Some(gas_price) = self.gas_price {
            arg.insert("gasPrice".into(), format!("{gas_price:#x}").into());
        }
        serde_json::Value::Object(arg)
    }
}

/// Response of the delegation reward query contract
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardResponse {
    #[serde(default, alias = "Code")]
    pub code: i64,
    #[serde(default, alias = "Ret")]
    pub ret: Option<Vec<RewardInfo>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RewardInfo {
    #[serde(default, rename = "nodeID")]
    pub node_id: String,
    #[serde(default)]
    pub reward: String,
    #[serde(default, rename = "stakingNum")]
    pub staking_num: u64,
}

impl RewardResponse {
    /// Sum every pending reward. Entries whose amount does not parse are skipped.
    pub fn total_reward(&self) -> u128 {
        self.ret
            .iter()
            .flatten()
            .filter_map(|info| parse_quantity(&info.reward).ok())
            .fold(0u128, u128::saturating_add)
    }
}

/// Decode a `0x`-prefixed big-endian hex quantity.
pub fn parse_quantity(s: &str) -> crate::Result<u128> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .ok_or_else(|| crate::SdkError::InvalidQuantity(s.to_string()))?;
    if digits.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(digits, 16).map_err(|_| crate::SdkError::InvalidQuantity(s.to_string()))
}
