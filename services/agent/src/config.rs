//! Agent configuration file

use anyhow::{bail, Context, Result};
use epochjob_runtime::{
    AccountSpec, DispatchSettings, JobKind, RunnerSettings, RuntimeConfig, SchedulerSettings,
};
use epochjob_sdk::{client::DEFAULT_NAMESPACE, units::von_from_f64};
use serde::Deserialize;
use std::{path::Path, time::Duration};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// EIP-155 chain id
    pub chain_id: u64,

    /// No-fee mode: transactions carry a zero gas price
    #[serde(default, rename = "async")]
    pub async_mode: bool,

    /// Node JSON-RPC URL
    #[serde(rename = "rawURL")]
    pub raw_url: String,

    /// Human-readable address prefix
    pub arp: String,

    /// JSON-RPC method namespace
    #[serde(default = "default_namespace")]
    pub rpc_namespace: String,

    /// Reward threshold in blocks before the cycle boundary
    #[serde(default = "default_reward_block")]
    pub reward_block: i64,

    /// Delegate threshold in blocks before the cycle boundary
    #[serde(default = "default_delegate_block")]
    pub delegate_block: i64,

    /// Minimum delegate amount in von
    #[serde(default)]
    pub min_delegate: f64,

    #[serde(default = "default_reward_gas_limit")]
    pub reward_gas_limit: u64,

    #[serde(default = "default_delegate_gas_limit")]
    pub delegate_gas_limit: u64,

    /// Managed accounts
    pub addrs: Vec<AccountSpec>,

    /// Accepted for compatibility; not used
    #[serde(default)]
    pub dst_addr: Option<String>,

    /// Serve `/health` and `/metrics` on this port
    #[serde(default)]
    pub metrics_port: Option<u16>,

    #[serde(default)]
    pub intervals: Intervals,
}

/// Loop periods and delays
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Intervals {
    pub gate_refresh_secs: u64,
    pub trigger_secs: u64,
    pub stagger_millis: u64,
    pub settle_millis: u64,
    pub watchdog_secs_per_account: u64,
    pub shutdown_grace_millis: u64,
    /// Per-request RPC deadline
    pub rpc_timeout_millis: u64,
}

impl Default for Intervals {
    fn default() -> Self {
        Self {
            gate_refresh_secs: 10,
            trigger_secs: 60,
            stagger_millis: 100,
            settle_millis: 1000,
            watchdog_secs_per_account: 2,
            shutdown_grace_millis: 1000,
            rpc_timeout_millis: 10_000,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_reward_block() -> i64 {
    JobKind::Reward.default_threshold()
}

fn default_delegate_block() -> i64 {
    JobKind::Delegate.default_threshold()
}

fn default_reward_gas_limit() -> u64 {
    35_040
}

fn default_delegate_gas_limit() -> u64 {
    49_000
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.raw_url.trim().is_empty() {
            bail!("rawURL must not be empty");
        }
        if self.arp.trim().is_empty() {
            bail!("arp must not be empty");
        }
        if self.addrs.is_empty() {
            bail!("addrs must list at least one account");
        }
        if self.intervals.gate_refresh_secs == 0 || self.intervals.trigger_secs == 0 {
            bail!("loop intervals must be positive");
        }
        if self.intervals.rpc_timeout_millis == 0 {
            bail!("rpcTimeoutMillis must be positive");
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.intervals.rpc_timeout_millis)
    }

    /// Dispatcher settings derived from the file.
    pub fn runtime(&self) -> RuntimeConfig {
        let intervals = &self.intervals;
        RuntimeConfig {
            dispatch: DispatchSettings {
                chain_id: self.chain_id,
                address_prefix: self.arp.clone(),
                async_mode: self.async_mode,
                min_delegate: von_from_f64(self.min_delegate),
                reward_gas_limit: self.reward_gas_limit,
                delegate_gas_limit: self.delegate_gas_limit,
                settle_delay: Duration::from_millis(intervals.settle_millis),
            },
            runner: RunnerSettings {
                stagger: Duration::from_millis(intervals.stagger_millis),
                watchdog_per_account: Duration::from_secs(intervals.watchdog_secs_per_account),
            },
            scheduler: SchedulerSettings {
                gate_refresh: Duration::from_secs(intervals.gate_refresh_secs),
                trigger_interval: Duration::from_secs(intervals.trigger_secs),
                reward_threshold: self.reward_block,
                delegate_threshold: self.delegate_block,
                shutdown_grace: Duration::from_millis(intervals.shutdown_grace_millis),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
chainId: 100
rawURL: http://127.0.0.1:6789
arp: lat
addrs:
  - privateKey: "0101010101010101010101010101010101010101010101010101010101010101"
    nodeId: "abababababababababababababababababababababababababababababababababababababababababababababababababababababababababababababababab"
"#;

    fn write(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let file = write(MINIMAL);
        let config = Config::load(file.path()).unwrap();

        assert_eq!(config.chain_id, 100);
        assert!(!config.async_mode);
        assert_eq!(config.rpc_namespace, "platon");
        assert_eq!(config.reward_block, 8000);
        assert_eq!(config.delegate_block, 3000);
        assert_eq!(config.addrs.len(), 1);
        assert!(config.metrics_port.is_none());

        let runtime = config.runtime();
        assert_eq!(runtime.dispatch.reward_gas_limit, 35_040);
        assert_eq!(runtime.dispatch.delegate_gas_limit, 49_000);
        assert_eq!(runtime.dispatch.settle_delay, Duration::from_secs(1));
        assert_eq!(runtime.runner.stagger, Duration::from_millis(100));
        assert_eq!(runtime.scheduler.trigger_interval, Duration::from_secs(60));
        assert_eq!(config.rpc_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_full_config() {
        let contents = format!(
            "{MINIMAL}async: true\nrpcNamespace: eth\nrewardBlock: 500\ndelegateBlock: 0\n\
             minDelegate: 10000000000000000000\ndstAddr: lat1ignored\nmetricsPort: 9100\n\
             intervals:\n  triggerSecs: 30\n  watchdogSecsPerAccount: 5\n  rpcTimeoutMillis: 2500\n"
        );
        let file = write(&contents);
        let config = Config::load(file.path()).unwrap();
        let runtime = config.runtime();

        assert!(runtime.dispatch.async_mode);
        assert_eq!(config.rpc_namespace, "eth");
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(runtime.dispatch.min_delegate, 10_000_000_000_000_000_000);
        assert_eq!(runtime.scheduler.threshold(JobKind::Reward), Some(500));
        assert_eq!(runtime.scheduler.threshold(JobKind::Delegate), None);
        assert_eq!(runtime.scheduler.trigger_interval, Duration::from_secs(30));
        // unspecified interval keeps its default
        assert_eq!(runtime.scheduler.gate_refresh, Duration::from_secs(10));
        assert_eq!(runtime.runner.watchdog_per_account, Duration::from_secs(5));
        assert_eq!(config.rpc_timeout(), Duration::from_millis(2500));
    }

    #[test]
    fn test_zero_rpc_timeout_rejected() {
        let file = write(&format!("{MINIMAL}intervals:\n  rpcTimeoutMillis: 0\n"));
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("rpcTimeoutMillis"));
    }

    #[test]
    fn test_empty_account_list_rejected() {
        let file = write("chainId: 1\nrawURL: http://x\narp: lat\naddrs: []\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("addrs"));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/config.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_malformed_yaml() {
        let file = write("chainId: [not a number\n");
        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }
}
