//! Managed account registry

use crate::{Result, RuntimeError};
use epochjob_sdk::Account;
use serde::Deserialize;
use std::{fmt, sync::Arc};

/// Raw key material for one managed account
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSpec {
    pub private_key: String,
    pub node_id: String,
}

impl fmt::Debug for AccountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSpec")
            .field("private_key", &"<redacted>")
            .field("node_id", &self.node_id)
            .finish()
    }
}

/// Derives the managed accounts from configuration.
///
/// Accounts are derived again for every batch and never cached, so a batch
/// owns its account set outright.
#[derive(Debug)]
pub struct AccountRegistry {
    hrp: String,
    specs: Vec<AccountSpec>,
}

impl AccountRegistry {
    /// Validate every entry once; malformed key material is fatal.
    pub fn new(hrp: impl Into<String>, specs: Vec<AccountSpec>) -> Result<Self> {
        let hrp = hrp.into();
        if hrp.is_empty() {
            return Err(RuntimeError::InvalidConfiguration(
                "address prefix must not be empty".to_string(),
            ));
        }
        if specs.is_empty() {
            return Err(RuntimeError::InvalidConfiguration(
                "no managed accounts configured".to_string(),
            ));
        }
        let registry = Self { hrp, specs };
        registry.derive_all()?;
        Ok(registry)
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Derive every account in configuration order.
    pub fn derive_all(&self) -> Result<Vec<Arc<Account>>> {
        self.specs
            .iter()
            .enumerate()
            .map(|(index, spec)| {
                Account::derive(&spec.private_key, &self.hrp, &spec.node_id)
                    .map(Arc::new)
                    .map_err(|source| RuntimeError::InvalidAccount { index, source })
            })
            .collect()
    }
}
