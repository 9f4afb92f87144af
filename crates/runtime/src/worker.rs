//! Per-account dispatch: precondition, nonce, payload, sign, submit, report

use crate::{
    job::{JobKind, Receipt},
    Result, RuntimeError,
};
use alloy_consensus::TxLegacy;
use alloy_primitives::{TxKind, U256};
use epochjob_sdk::{
    address::encode_bech32,
    contract, sign_legacy,
    units::{format_base_units, BASE_VON},
    Account, BlockTag, CallMsg, ChainClient, RewardResponse, SdkError, TxHash,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Balance kept back from delegation to pay for future transactions (0.1 base unit).
pub const DELEGATE_RESERVE: u128 = BASE_VON / 10;

/// Smallest reward worth withdrawing (1 base unit).
pub const MIN_REWARD: u128 = BASE_VON;

/// Value attached to the delegate call, in von.
pub const DELEGATE_TX_VALUE: u64 = 1;

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub chain_id: u64,
    /// bech32 prefix for addresses sent to the node
    pub address_prefix: String,
    /// No-fee mode: the gas price is forced to zero
    pub async_mode: bool,
    /// Minimum delegate amount in von
    pub min_delegate: u128,
    pub reward_gas_limit: u64,
    pub delegate_gas_limit: u64,
    /// Pause between submission and reporting; not a confirmation wait
    pub settle_delay: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            chain_id: 100,
            address_prefix: "lat".to_string(),
            async_mode: false,
            min_delegate: 0,
            reward_gas_limit: 35_040,
            delegate_gas_limit: 49_000,
            settle_delay: Duration::from_secs(1),
        }
    }
}

impl DispatchSettings {
    /// Value transferred with the job's transaction.
    pub fn tx_value(kind: JobKind) -> U256 {
        match kind {
            JobKind::Reward => U256::ZERO,
            JobKind::Delegate => U256::from(DELEGATE_TX_VALUE),
        }
    }

    pub fn gas_limit(&self, kind: JobKind) -> u64 {
        match kind {
            JobKind::Reward => self.reward_gas_limit,
            JobKind::Delegate => self.delegate_gas_limit,
        }
    }

    /// Price actually used for a transaction given the node's quote.
    pub fn effective_gas_price(&self, polled: u128) -> u128 {
        if self.async_mode {
            0
        } else {
            polled
        }
    }
}

/// Runs one job kind's operation for a single account
pub struct DispatchWorker {
    kind: JobKind,
    client: Arc<dyn ChainClient>,
    settings: Arc<DispatchSettings>,
}

impl DispatchWorker {
    pub fn new(kind: JobKind, client: Arc<dyn ChainClient>, settings: Arc<DispatchSettings>) -> Self {
        Self {
            kind,
            client,
            settings,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// Dispatch and then report exactly one receipt after the settle delay.
    ///
    /// The report never blocks: if the batch has already closed the receipt
    /// is dropped.
    pub async fn run(&self, account: Arc<Account>, receipts: mpsc::Sender<Receipt>) {
        let result = self.dispatch(&account).await;
        tokio::time::sleep(self.settings.settle_delay).await;

        if let Err(e) = receipts.try_send(Receipt { account, result }) {
            debug!(kind = %self.kind, error = %e, "receipt not delivered, batch already closed");
        }
    }

    /// Build, sign and submit the transaction; returns its hash.
    pub async fn dispatch(&self, account: &Account) -> Result<TxHash> {
        let tx = self.prepare(account).await?;
        let nonce = tx.nonce;
        let signed = sign_legacy(tx, account.signer())?;
        self.client.send_raw_transaction(&signed.raw).await?;

        info!(
            kind = %self.kind,
            address = %account.bech32,
            nonce,
            tx_hash = %signed.hash,
            "transaction submitted"
        );
        Ok(signed.hash)
    }

    /// Everything up to signing. Fails before the nonce fetch when the
    /// precondition does not hold.
    pub async fn prepare(&self, account: &Account) -> Result<TxLegacy> {
        let amount = self.precondition(account).await?;
        let nonce = self
            .client
            .get_transaction_count(&account.bech32, BlockTag::Latest)
            .await?;

        let to = contract::require_contract(self.kind.function_code())?;
        let data = match self.kind {
            JobKind::Reward => contract::withdraw_reward_payload(),
            JobKind::Delegate => contract::delegate_payload(&account.node_id, amount),
        };
        let polled = self.client.gas_price().await?;

        Ok(TxLegacy {
            chain_id: Some(self.settings.chain_id),
            nonce,
            gas_price: self.settings.effective_gas_price(polled),
            gas_limit: self.settings.gas_limit(self.kind),
            to: TxKind::Call(to),
            value: DispatchSettings::tx_value(self.kind),
            input: data.into(),
        })
    }

    /// Job-specific amount that must clear its minimum before anything is sent.
    pub async fn precondition(&self, account: &Account) -> Result<u128> {
        match self.kind {
            JobKind::Reward => {
                let reward = self.pending_reward(account).await?;
                if reward < MIN_REWARD {
                    return Err(RuntimeError::PreconditionFailed {
                        kind: self.kind,
                        address: account.bech32.clone(),
                        detail: format!("reward {} below minimum 1", format_base_units(reward)),
                    });
                }
                Ok(reward)
            }
            JobKind::Delegate => {
                let balance = self
                    .client
                    .get_balance(&account.bech32, BlockTag::Latest)
                    .await?;
                let value = balance.saturating_sub(DELEGATE_RESERVE);
                if value == 0 || value < self.settings.min_delegate {
                    return Err(RuntimeError::PreconditionFailed {
                        kind: self.kind,
                        address: account.bech32.clone(),
                        detail: format!(
                            "delegate value {} below minimum {}",
                            format_base_units(value),
                            format_base_units(self.settings.min_delegate)
                        ),
                    });
                }
                Ok(value)
            }
        }
    }

    /// Sum of rewards pending across every node the account delegates to.
    pub async fn pending_reward(&self, account: &Account) -> Result<u128> {
        let contract = contract::require_contract(contract::GET_DELEGATE_REWARD)?;
        let msg = CallMsg {
            from: account.bech32.clone(),
            to: encode_bech32(&self.settings.address_prefix, contract.as_slice())?,
            gas: contract::REWARD_QUERY_GAS,
            gas_price: Some(contract::REWARD_QUERY_GAS_PRICE),
            value: None,
            data: contract::reward_query_payload(&account.address),
        };
        let output = self.client.call(&msg, BlockTag::Latest).await?;
        let response: RewardResponse = serde_json::from_slice(&output).map_err(SdkError::from)?;
        Ok(response.total_reward())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::keccak256;
    use epochjob_sdk::mock::MockChain;

    fn node() -> String {
        "cd".repeat(64)
    }

    fn account(key_byte: u8) -> Arc<Account> {
        Arc::new(Account::derive(&format!("{key_byte:02x}").repeat(32), "lat", &node()).unwrap())
    }

    fn settings() -> DispatchSettings {
        DispatchSettings {
            settle_delay: Duration::from_millis(10),
            ..DispatchSettings::default()
        }
    }

    fn worker(kind: JobKind, chain: Arc<MockChain>, settings: DispatchSettings) -> DispatchWorker {
        DispatchWorker::new(kind, chain, Arc::new(settings))
    }

    #[tokio::test]
    async fn test_reward_below_minimum_never_fetches_nonce() {
        let acct = account(1);
        let chain = Arc::new(
            MockChain::new()
                .with_gas_price(1_000)
                .with_reward(&acct.bech32, BASE_VON - 1),
        );
        let worker = worker(JobKind::Reward, chain.clone(), settings());

        let err = worker.dispatch(&acct).await.unwrap_err();
        assert!(matches!(err, RuntimeError::PreconditionFailed { kind: JobKind::Reward, .. }));
        assert!(chain.nonce_requests().is_empty());
        assert!(chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_reward_submits_withdraw_transaction() {
        let acct = account(2);
        let chain = Arc::new(
            MockChain::new()
                .with_gas_price(1_000)
                .with_reward(&acct.bech32, 3 * BASE_VON),
        );
        let worker = worker(JobKind::Reward, chain.clone(), settings());

        let tx = worker.prepare(&acct).await.unwrap();
        assert_eq!(tx.input.to_vec(), contract::withdraw_reward_payload());
        assert_eq!(tx.to, TxKind::Call(contract::contract_address(5000).unwrap()));
        assert_eq!(tx.chain_id, Some(100));
        assert_eq!(tx.gas_limit, 35_040);
        assert_eq!(tx.gas_price, 1_000);
        assert_eq!(tx.value, U256::ZERO);

        let hash = worker.dispatch(&acct).await.unwrap();
        assert_eq!(chain.submitted().len(), 1);
        assert_eq!(hash, keccak256(&chain.submitted()[0]));
    }

    #[tokio::test]
    async fn test_async_mode_forces_zero_gas_price() {
        let acct = account(3);
        let chain = Arc::new(
            MockChain::new()
                .with_gas_price(5_000_000_000)
                .with_reward(&acct.bech32, BASE_VON),
        );
        let settings = DispatchSettings {
            async_mode: true,
            ..settings()
        };
        let worker = worker(JobKind::Reward, chain, settings);

        let tx = worker.prepare(&acct).await.unwrap();
        assert_eq!(tx.gas_price, 0);
    }

    #[tokio::test]
    async fn test_delegate_keeps_reserve() {
        let acct = account(4);
        let balance = 5 * BASE_VON;
        let chain = Arc::new(MockChain::new().with_balance(&acct.bech32, balance));
        let worker = worker(JobKind::Delegate, chain, settings());

        let value = worker.precondition(&acct).await.unwrap();
        assert_eq!(value, balance - DELEGATE_RESERVE);

        let tx = worker.prepare(&acct).await.unwrap();
        assert_eq!(tx.input.to_vec(), contract::delegate_payload(&acct.node_id, value));
        assert_eq!(tx.to, TxKind::Call(contract::contract_address(1004).unwrap()));
        assert_eq!(tx.gas_limit, 49_000);
        // one von rides along with the delegation
        assert_eq!(tx.value, U256::from(1));
    }

    #[tokio::test]
    async fn test_delegate_below_minimum() {
        let acct = account(5);
        let chain = Arc::new(MockChain::new().with_balance(&acct.bech32, 2 * BASE_VON));
        let settings = DispatchSettings {
            min_delegate: 10 * BASE_VON,
            ..settings()
        };
        let worker = worker(JobKind::Delegate, chain.clone(), settings);

        assert!(matches!(
            worker.dispatch(&acct).await,
            Err(RuntimeError::PreconditionFailed { kind: JobKind::Delegate, .. })
        ));
        assert!(chain.nonce_requests().is_empty());
    }

    #[tokio::test]
    async fn test_delegate_balance_under_reserve() {
        let acct = account(6);
        let chain = Arc::new(MockChain::new().with_balance(&acct.bech32, DELEGATE_RESERVE / 2));
        let worker = worker(JobKind::Delegate, chain, settings());
        assert!(worker.precondition(&acct).await.is_err());
    }

    #[tokio::test]
    async fn test_submission_failure_still_reports_once() {
        let acct = account(7);
        let chain = Arc::new(
            MockChain::new()
                .with_reward(&acct.bech32, 2 * BASE_VON)
                .with_rejected_sends(),
        );
        let worker = worker(JobKind::Reward, chain, settings());
        let (tx, mut rx) = mpsc::channel(1);

        worker.run(acct.clone(), tx).await;

        let receipt = rx.recv().await.unwrap();
        assert_eq!(receipt.account.address, acct.address);
        assert!(receipt.tx_hash().is_none());
        assert!(matches!(receipt.error(), Some(RuntimeError::Sdk(SdkError::Rpc { .. }))));
        // the worker's sender is gone: nothing else will arrive
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_report_waits_for_settle_delay() {
        let acct = account(8);
        let chain = Arc::new(MockChain::new().with_reward(&acct.bech32, 2 * BASE_VON));
        let settings = DispatchSettings {
            settle_delay: Duration::from_secs(1),
            ..settings()
        };
        let worker = worker(JobKind::Reward, chain, settings);
        let (tx, mut rx) = mpsc::channel(1);

        let started = tokio::time::Instant::now();
        worker.run(acct, tx).await;
        assert!(started.elapsed() >= Duration::from_secs(1));
        assert!(rx.recv().await.unwrap().tx_hash().is_some());
    }

    #[tokio::test]
    async fn test_closed_batch_does_not_block_report() {
        let acct = account(9);
        let chain = Arc::new(MockChain::new().with_reward(&acct.bech32, 2 * BASE_VON));
        let worker = worker(JobKind::Reward, chain, settings());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        tokio::time::timeout(Duration::from_secs(1), worker.run(acct, tx))
            .await
            .expect("report must not block");
    }
}
