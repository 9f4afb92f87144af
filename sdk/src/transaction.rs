//! Legacy (EIP-155) transaction signing

use crate::{types::TxHash, Result, SdkError};
use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::Signature;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

/// Signed transaction ready for `sendRawTransaction`
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: TxHash,
    pub signature: Signature,
}

/// Sign a legacy transaction. With `chain_id` set the signature commits to
/// it and `v` is encoded as `recid + 35 + 2 * chain_id`.
pub fn sign_legacy(tx: TxLegacy, signer: &PrivateKeySigner) -> Result<SignedTransaction> {
    if tx.chain_id.is_none() {
        return Err(SdkError::Signing("legacy transaction without chain id".to_string()));
    }
    let signature = signer
        .sign_hash_sync(&tx.signature_hash())
        .map_err(|e| SdkError::Signing(e.to_string()))?;

    let signed = tx.into_signed(signature);
    let hash = *signed.hash();
    let raw = TxEnvelope::from(signed).encoded_2718();

    Ok(SignedTransaction {
        raw,
        hash,
        signature,
    })
}
