use crate::blockchain::transaction::ActionSigner;
use anyhow::{Context, Result};
use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signature, Signer},
    transaction::Transaction,
};
use std::fs;
use std::path::Path;

/// Keypair-backed signer
pub struct KeypairSigner {
    keypair: Keypair,
}

impl KeypairSigner {
    pub fn new(keypair: Keypair) -> Self {
        KeypairSigner { keypair }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        load_keypair(path.as_ref()).map(Self::new)
    }
}

impl ActionSigner for KeypairSigner {
    fn public_identity(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    fn sign(&self, tx: &mut Transaction) -> Result<Signature> {
        let blockhash = tx.message.recent_blockhash;
        tx.try_partial_sign(&[&self.keypair], blockhash)
            .context("Failed to sign transaction")?;
        tx.signatures
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Transaction has no signature slots"))
    }
}

/// Load a keypair file: JSON byte array (solana-keygen), raw 64 bytes, or base58.
pub fn load_keypair(path: &Path) -> Result<Keypair> {
    if !path.exists() {
        return Err(anyhow::anyhow!("Wallet file not found: {}", path.display()));
    }

    let keypair_bytes = fs::read(path)
        .with_context(|| format!("Failed to read wallet file: {}", path.display()))?;

    keypair_from_bytes(&keypair_bytes)
}

fn keypair_from_bytes(keypair_bytes: &[u8]) -> Result<Keypair> {
    if let Ok(keypair) = serde_json::from_slice::<Vec<u8>>(keypair_bytes) {
        if keypair.len() == 64 {
            return Keypair::from_bytes(&keypair)
                .map_err(|e| anyhow::anyhow!("Failed to parse keypair: {}", e));
        }
    }

    if keypair_bytes.len() == 64 {
        return Keypair::from_bytes(keypair_bytes)
            .map_err(|e| anyhow::anyhow!("Failed to parse keypair: {}", e));
    }

    if let Ok(keypair_str) = std::str::from_utf8(keypair_bytes) {
        if let Ok(decoded) = bs58::decode(keypair_str.trim()).into_vec() {
            if decoded.len() == 64 {
                return Keypair::from_bytes(&decoded)
                    .map_err(|e| anyhow::anyhow!("Failed to parse keypair: {}", e));
            }
        }
    }

    Err(anyhow::anyhow!(
        "Invalid wallet format: expected 64 bytes, JSON array, or base58 string"
    ))
}
