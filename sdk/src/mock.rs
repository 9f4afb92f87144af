//! Scriptable in-memory chain for tests

use crate::{
    client::ChainClient,
    types::{BlockTag, CallMsg, RewardInfo, RewardResponse},
    Result, SdkError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    height: Option<u64>,
    network_id: u64,
    gas_price: u128,
    balances: HashMap<String, u128>,
    rewards: HashMap<String, u128>,
    nonces: HashMap<String, u64>,
    stalled: HashSet<String>,
    reject_sends: bool,
    latency: Duration,
    nonce_requests: Vec<String>,
    submitted: Vec<Vec<u8>>,
}

/// In-memory [`ChainClient`].
///
/// Any request for a stalled address never completes, which models a node
/// that stops answering for one account.
#[derive(Debug, Default)]
pub struct MockChain {
    state: Mutex<MockState>,
}

fn unavailable() -> SdkError {
    SdkError::Rpc {
        code: -32000,
        message: "node unavailable".to_string(),
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(self, f: impl FnOnce(&mut MockState)) -> Self {
        f(&mut self.state.lock().unwrap());
        self
    }

    pub fn with_height(self, height: u64) -> Self {
        self.with_state(|s| s.height = Some(height))
    }

    pub fn with_network_id(self, network_id: u64) -> Self {
        self.with_state(|s| s.network_id = network_id)
    }

    pub fn with_gas_price(self, gas_price: u128) -> Self {
        self.with_state(|s| s.gas_price = gas_price)
    }

    pub fn with_balance(self, address: &str, von: u128) -> Self {
        self.with_state(|s| {
            s.balances.insert(address.to_string(), von);
        })
    }

    pub fn with_reward(self, address: &str, von: u128) -> Self {
        self.with_state(|s| {
            s.rewards.insert(address.to_string(), von);
        })
    }

    pub fn with_stalled(self, address: &str) -> Self {
        self.with_state(|s| {
            s.stalled.insert(address.to_string());
        })
    }

    pub fn with_rejected_sends(self) -> Self {
        self.with_state(|s| s.reject_sends = true)
    }

    /// Delay applied to every request.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.with_state(|s| s.latency = latency)
    }

    pub fn set_height(&self, height: Option<u64>) {
        self.state.lock().unwrap().height = height;
    }

    pub fn nonce_requests(&self) -> Vec<String> {
        self.state.lock().unwrap().nonce_requests.clone()
    }

    pub fn submitted(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().submitted.clone()
    }

    async fn enter(&self, address: Option<&str>) {
        let (latency, stalled) = {
            let state = self.state.lock().unwrap();
            let stalled = address.is_some_and(|a| state.stalled.contains(a));
            (state.latency, stalled)
        };
        if stalled {
            std::future::pending::<()>().await;
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> Result<u64> {
        self.enter(None).await;
        self.state.lock().unwrap().height.ok_or_else(unavailable)
    }

    async fn gas_price(&self) -> Result<u128> {
        self.enter(None).await;
        Ok(self.state.lock().unwrap().gas_price)
    }

    async fn get_balance(&self, address: &str, _block: BlockTag) -> Result<u128> {
        self.enter(Some(address)).await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn get_transaction_count(&self, address: &str, _block: BlockTag) -> Result<u64> {
        self.enter(Some(address)).await;
        let mut state = self.state.lock().unwrap();
        state.nonce_requests.push(address.to_string());
        Ok(state.nonces.get(address).copied().unwrap_or_default())
    }

    async fn call(&self, msg: &CallMsg, _block: BlockTag) -> Result<Vec<u8>> {
        self.enter(Some(&msg.from)).await;
        let reward = self
            .state
            .lock()
            .unwrap()
            .rewards
            .get(&msg.from)
            .copied()
            .unwrap_or_default();
        let response = RewardResponse {
            code: 0,
            ret: Some(vec![RewardInfo {
                node_id: String::new(),
                reward: format!("{reward:#x}"),
                staking_num: 1,
            }]),
        };
        Ok(serde_json::to_vec(&response)?)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<()> {
        self.enter(None).await;
        let mut state = self.state.lock().unwrap();
        if state.reject_sends {
            return Err(SdkError::Rpc {
                code: -32000,
                message: "transaction rejected".to_string(),
            });
        }
        state.submitted.push(raw.to_vec());
        Ok(())
    }

    async fn send_pending_transaction(&self, raw: &[u8]) -> Result<()> {
        self.send_raw_transaction(raw).await
    }

    async fn network_id(&self) -> Result<u64> {
        self.enter(None).await;
        Ok(self.state.lock().unwrap().network_id)
    }
}
