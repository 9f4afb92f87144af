//! Built-in (precompiled) contract addressing and call payloads
//!
//! A payload is the RLP list `[code, arg1, arg2, ...]` where every element is
//! itself the RLP encoding of the value, carried as a byte string.

use crate::{address::NodeId, types::Address, Result, SdkError};
use alloy_rlp::Header;

/// Withdraw accumulated delegation rewards.
pub const WITHDRAW_REWARD: u16 = 5000;
/// Query pending delegation rewards (read-only).
pub const GET_DELEGATE_REWARD: u16 = 5100;
/// Delegate free balance to a validator node.
pub const DELEGATE: u16 = 1004;

/// Gas and price the read-only reward query is issued with.
pub const REWARD_QUERY_GAS: u64 = 103_496;
pub const REWARD_QUERY_GAS_PRICE: u128 = 500_000_000_000;

/// Delegation funded from the free balance.
const DELEGATE_FROM_FREE_BALANCE: u16 = 0;

/// Resolve the built-in contract that serves a function code.
pub fn contract_address(code: u16) -> Option<Address> {
    let last = match code {
        1000..=1999 => 0x02,
        2000..=2999 => 0x05,
        3000..=3999 => 0x04,
        4000..=4999 => 0x01,
        5000..=5999 => 0x06,
        _ => return None,
    };
    let mut bytes = [0u8; 20];
    bytes[0] = 0x10;
    bytes[19] = last;
    Some(Address::from(bytes))
}

/// Like [`contract_address`] but failing for unmapped codes.
pub fn require_contract(code: u16) -> Result<Address> {
    contract_address(code).ok_or(SdkError::UnknownContract(code))
}

/// Assemble the call payload from already RLP-encoded arguments.
pub fn encode_call(code: u16, args: &[Vec<u8>]) -> Vec<u8> {
    let code = alloy_rlp::encode(code);
    let params: Vec<&[u8]> = std::iter::once(code.as_slice())
        .chain(args.iter().map(Vec::as_slice))
        .collect();

    let mut out = Vec::new();
    alloy_rlp::encode_list::<_, [u8]>(params.as_slice(), &mut out);
    out
}

pub fn withdraw_reward_payload() -> Vec<u8> {
    encode_call(WITHDRAW_REWARD, &[])
}

pub fn delegate_payload(node_id: &NodeId, amount: u128) -> Vec<u8> {
    encode_call(
        DELEGATE,
        &[
            alloy_rlp::encode(DELEGATE_FROM_FREE_BALANCE),
            alloy_rlp::encode(node_id.as_bytes()),
            alloy_rlp::encode(amount),
        ],
    )
}

/// Query every node's pending reward for `address` (empty node filter).
pub fn reward_query_payload(address: &Address) -> Vec<u8> {
    let mut no_nodes = Vec::new();
    Header {
        list: true,
        payload_length: 0,
    }
    .encode(&mut no_nodes);

    encode_call(
        GET_DELEGATE_REWARD,
        &[alloy_rlp::encode(address.as_slice()), no_nodes],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_ranges() {
        assert_eq!(
            contract_address(1004).unwrap().to_string(),
            "0x1000000000000000000000000000000000000002"
        );
        assert_eq!(
            contract_address(2999).unwrap().to_string(),
            "0x1000000000000000000000000000000000000005"
        );
        assert_eq!(
            contract_address(3000).unwrap().to_string(),
            "0x1000000000000000000000000000000000000004"
        );
        assert_eq!(
            contract_address(4500).unwrap().to_string(),
            "0x1000000000000000000000000000000000000001"
        );
        assert_eq!(
            contract_address(5100).unwrap().to_string(),
            "0x1000000000000000000000000000000000000006"
        );
        assert!(contract_address(999).is_none());
        assert!(contract_address(6000).is_none());
        assert!(matches!(
            require_contract(7000),
            Err(SdkError::UnknownContract(7000))
        ));
    }

    #[test]
    fn test_withdraw_reward_payload_bytes() {
        // rlp(5000) = 82 13 88, wrapped as a string = 83 82 13 88, in a list
        assert_eq!(withdraw_reward_payload(), vec![0xc4, 0x83, 0x82, 0x13, 0x88]);
    }

    #[test]
    fn test_delegate_payload_layout() {
        let node = NodeId([0x11; 64]);
        let payload = delegate_payload(&node, 1024);

        // list header for a payload longer than 55 bytes
        assert_eq!(payload[0], 0xf8);
        let body = &payload[2..];
        assert_eq!(payload[1] as usize, body.len());
        // function code 1004 = 0x03ec
        assert_eq!(&body[..4], &[0x83, 0x82, 0x03, 0xec]);
        // type 0 encodes as the empty string, wrapped
        assert_eq!(&body[4..6], &[0x81, 0x80]);
        // 64 byte node id: inner header b8 40, wrapped header b8 42
        assert_eq!(&body[6..10], &[0xb8, 0x42, 0xb8, 0x40]);
        assert_eq!(&body[10..74], &[0x11; 64][..]);
        // amount 1024 = 82 04 00, wrapped
        assert_eq!(&body[74..], &[0x83, 0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_code_argument_is_minimal() {
        // a single byte below 0x80 stays itself when wrapped
        assert_eq!(encode_call(0x10, &[]), vec![0xc1, 0x10]);
        // zero is the empty string 80, wrapped as 81 80
        assert_eq!(encode_call(0, &[vec![0x01]]), vec![0xc3, 0x81, 0x80, 0x01]);
    }

    #[test]
    fn test_reward_query_payload_layout() {
        let address = Address::from([0xab; 20]);
        let payload = reward_query_payload(&address);
        // code 5100 = 0x13ec
        assert_eq!(&payload[1..5], &[0x83, 0x82, 0x13, 0xec]);
        assert_eq!(&payload[5..7], &[0x95, 0x94]);
        assert_eq!(&payload[7..27], &[0xab; 20][..]);
        // empty node list c0, wrapped
        assert_eq!(&payload[27..], &[0x81, 0xc0]);
        assert_eq!(payload[0] as usize, 0xc0 + payload.len() - 1);
    }
}
