//! Test that SDK types and encoders compose correctly through the public API

#[cfg(test)]
mod tests {
    use alloy_consensus::TxLegacy;
    use alloy_primitives::{keccak256, TxKind, U256};
    use epochjob_sdk::*;

    const KEY: &str = "4646464646464646464646464646464646464646464646464646464646464646";

    fn node_hex() -> String {
        "0f".repeat(64)
    }

    #[test]
    fn test_reward_response_serde() {
        let response = RewardResponse {
            code: 0,
            ret: Some(vec![RewardInfo {
                node_id: "0f0f".to_string(),
                reward: "0x2a".to_string(),
                staking_num: 7,
            }]),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"nodeID\""));
        assert!(json.contains("\"stakingNum\""));

        let deserialized: RewardResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.total_reward(), 42);
    }

    #[test]
    fn test_delegate_transaction_targets_staking_contract() {
        let account = Account::derive(KEY, "lat", &node_hex()).unwrap();
        let to = contract::require_contract(contract::DELEGATE).unwrap();
        let tx = TxLegacy {
            chain_id: Some(100),
            nonce: 3,
            gas_price: 0,
            gas_limit: 49_000,
            to: TxKind::Call(to),
            value: U256::from(1),
            input: contract::delegate_payload(&account.node_id, 10 * BASE_VON).into(),
        };

        let signed = sign_legacy(tx, account.signer()).unwrap();
        assert!(signed
            .raw
            .windows(to.len())
            .any(|window| window == to.as_slice()));
        assert_eq!(signed.hash, keccak256(&signed.raw));
    }

    #[test]
    fn test_account_addresses_agree() {
        let account = Account::derive(KEY, "lat", &node_hex()).unwrap();
        let again = address::encode_bech32("lat", account.address.as_slice()).unwrap();
        assert_eq!(account.bech32, again);
        assert_eq!(account.node_id.to_string(), node_hex());
    }
}
