use crate::core::error::Error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::rpc_client::RpcClient as SolanaRpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_sdk::{
    commitment_config::CommitmentConfig,
    hash::Hash,
    signature::Signature,
    transaction::Transaction,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Duration};

/// Ledger RPC collaborator used by the dispatcher.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Block reference anchoring a new action's validity window.
    async fn get_recent_block_reference(&self) -> Result<Hash>;

    async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature>;
}

pub struct RpcClient {
    client: Arc<SolanaRpcClient>,
    rate_limiter: Arc<Semaphore>,
    /// Upper bound for a single blocking RPC call.
    request_timeout: Duration,
}

impl RpcClient {
    pub fn new(rpc_url: String, request_timeout: Duration) -> Self {
        log::info!(
            "RpcClient: Initialized for {} with request_timeout={:?}",
            redact_url(&rpc_url),
            request_timeout
        );

        RpcClient {
            client: Arc::new(SolanaRpcClient::new_with_commitment(
                rpc_url,
                CommitmentConfig::confirmed(),
            )),
            rate_limiter: Arc::new(Semaphore::new(10)), // Max 10 concurrent requests
            request_timeout,
        }
    }

    /// Run a blocking client call on the blocking pool, bounded by the request
    /// timeout and the concurrency limiter.
    async fn call<T, F>(&self, name: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SolanaRpcClient) -> Result<T> + Send + 'static,
    {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .context("Failed to acquire rate limiter permit")?;

        let client = Arc::clone(&self.client);
        let timeout_duration = self.request_timeout;

        timeout(
            timeout_duration,
            tokio::task::spawn_blocking(move || f(&client)),
        )
        .await
        .map_err(|_| Error::Rpc(format!(
            "request timeout after {:?} for {}",
            timeout_duration, name
        )))?
        .context("Failed to spawn blocking task")?
    }
}

#[async_trait]
impl Ledger for RpcClient {
    async fn get_recent_block_reference(&self) -> Result<Hash> {
        self.call("get_latest_blockhash", |client| {
            client
                .get_latest_blockhash()
                .map_err(|e| anyhow::Error::from(Error::Rpc(e.to_string())))
        })
        .await
    }

    async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature> {
        let tx = tx.clone();
        self.call("send_transaction", move |client| {
            // Preflight stays on; retries are left to the RPC node.
            client
                .send_transaction_with_config(
                    &tx,
                    RpcSendTransactionConfig {
                        skip_preflight: false,
                        ..RpcSendTransactionConfig::default()
                    },
                )
                .map_err(|e| anyhow::Error::from(Error::Rpc(e.to_string())))
        })
        .await
    }
}

/// Fetches live block references but never broadcasts.
pub struct DryRunLedger<L> {
    inner: L,
}

impl<L: Ledger> DryRunLedger<L> {
    pub fn new(inner: L) -> Self {
        DryRunLedger { inner }
    }
}

#[async_trait]
impl<L: Ledger> Ledger for DryRunLedger<L> {
    async fn get_recent_block_reference(&self) -> Result<Hash> {
        self.inner.get_recent_block_reference().await
    }

    async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature> {
        let signature = tx
            .signatures
            .first()
            .copied()
            .ok_or_else(|| anyhow::anyhow!("DRY RUN: transaction carries no signature"))?;
        if signature == Signature::default() {
            return Err(anyhow::anyhow!("DRY RUN: transaction is not signed"));
        }
        log::info!(
            "DRY RUN: not broadcasting transaction {} ({} instruction(s))",
            signature,
            tx.message.instructions.len()
        );
        Ok(signature)
    }
}

/// Strip query strings (API keys) before a URL reaches the logs.
pub fn redact_url(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::transaction::{sign_transaction, ActionSigner, TransactionBuilder};
    use crate::utils::wallet::KeypairSigner;
    use solana_sdk::signature::{Keypair, Signer};

    struct FixedLedger(Hash);

    #[async_trait]
    impl Ledger for FixedLedger {
        async fn get_recent_block_reference(&self) -> Result<Hash> {
            Ok(self.0)
        }

        async fn submit_transaction(&self, _tx: &Transaction) -> Result<Signature> {
            panic!("dry run must not reach the inner ledger's submit");
        }
    }

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("https://rpc.example.org/?api-key=secret"),
            "https://rpc.example.org/?<redacted>"
        );
        assert_eq!(redact_url("https://rpc.example.org"), "https://rpc.example.org");
    }

    #[tokio::test]
    async fn test_dry_run_returns_own_signature() {
        let blockhash = Hash::new_unique();
        let ledger = DryRunLedger::new(FixedLedger(blockhash));
        assert_eq!(ledger.get_recent_block_reference().await.unwrap(), blockhash);

        let signer = KeypairSigner::new(Keypair::new());
        let mut builder = TransactionBuilder::new(signer.public_identity());
        builder.add_compute_budget(200_000, 1);
        let mut tx = builder.build(blockhash);
        let sig = sign_transaction(&mut tx, &signer).unwrap();

        assert_eq!(ledger.submit_transaction(&tx).await.unwrap(), sig);
    }

    #[tokio::test]
    async fn test_dry_run_rejects_unsigned() {
        let ledger = DryRunLedger::new(FixedLedger(Hash::new_unique()));
        let mut builder = TransactionBuilder::new(Keypair::new().pubkey());
        builder.add_compute_budget(200_000, 1);
        let tx = builder.build(Hash::new_unique());
        assert!(ledger.submit_transaction(&tx).await.is_err());
    }
}
