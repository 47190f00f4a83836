pub mod table;

pub use table::{DispatchTable, TableCounts};

use crate::blockchain::rpc_client::Ledger;
use crate::blockchain::transaction::{sign_transaction, ActionSigner, TransactionBuilder};
use crate::core::error::Error;
use crate::core::events::{Event, EventBus};
use crate::core::types::{Candidate, DispatchState, Outcome};
use crate::strategy::purchase::PayloadBuilder;
use anyhow::{Context, Result};
use solana_sdk::signature::Signature;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const ALREADY_ATTEMPTED: &str = "already attempted";

/// Compute budget attached to every outbound action.
#[derive(Debug, Clone, Copy)]
pub struct ActionSettings {
    pub compute_units: u32,
    pub priority_fee_per_cu: u64,
}

pub struct ActionDispatcher {
    table: Arc<DispatchTable>,
    ledger: Arc<dyn Ledger>,
    signer: Arc<dyn ActionSigner>,
    payload: Arc<dyn PayloadBuilder>,
    settings: ActionSettings,
    event_bus: EventBus,
}

impl ActionDispatcher {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        signer: Arc<dyn ActionSigner>,
        payload: Arc<dyn PayloadBuilder>,
        settings: ActionSettings,
        event_bus: EventBus,
    ) -> Self {
        ActionDispatcher {
            table: Arc::new(DispatchTable::new()),
            ledger,
            signer,
            payload,
            settings,
            event_bus,
        }
    }

    pub fn table(&self) -> &Arc<DispatchTable> {
        &self.table
    }

    /// Attempt the purchase action for `candidate` at most once per process.
    ///
    /// The `Pending` record is written before the first side effect. Any failure
    /// after that, cancellation included, leaves the entity `Failed` and it is
    /// never retried.
    pub async fn dispatch(&self, candidate: &Candidate, cancel: &CancellationToken) -> Outcome {
        let entity = candidate.entity;

        if !self.table.try_claim(&entity) {
            log::debug!("Dispatcher: {} already attempted, skipping", entity);
            let outcome = Outcome::Skipped(ALREADY_ATTEMPTED.to_string());
            self.event_bus.publish(Event::Dispatched { entity, outcome: outcome.clone() });
            return outcome;
        }

        log::info!(
            "Dispatcher: dispatching {} (supply={}, unit_price={}, est_cap={:.2}, slot={})",
            entity,
            candidate.observed_supply,
            candidate.estimated_unit_price,
            candidate.estimated_cap,
            candidate.slot
        );

        let result = tokio::select! {
            result = self.execute(candidate) => result,
            _ = cancel.cancelled() => Err(anyhow::Error::from(Error::Cancelled)),
        };

        let outcome = match result {
            Ok(signature) => {
                self.table.mark(&entity, DispatchState::Submitted);
                log::info!("Dispatcher: action for {} submitted: signature={}", entity, signature);
                Outcome::Submitted(signature)
            }
            Err(e) => {
                self.table.mark(&entity, DispatchState::Failed);
                log::error!("Dispatcher: action for {} failed: {:#}", entity, e);
                Outcome::Failed(format!("{:#}", e))
            }
        };

        self.event_bus.publish(Event::Dispatched { entity, outcome: outcome.clone() });
        outcome
    }

    async fn execute(&self, candidate: &Candidate) -> Result<Signature> {
        let payer = self.signer.public_identity();

        let blockhash = self
            .ledger
            .get_recent_block_reference()
            .await
            .context("Failed to fetch recent block reference")?;

        let instructions = self
            .payload
            .build_instructions(candidate, &payer)
            .context("Failed to build action payload")?;
        if instructions.is_empty() {
            return Err(Error::Build("payload builder produced no instructions".to_string()).into());
        }

        let mut builder = TransactionBuilder::new(payer);
        builder.add_compute_budget(self.settings.compute_units, self.settings.priority_fee_per_cu);
        builder.add_instructions(instructions);
        let mut tx = builder.build(blockhash);

        let local_signature =
            sign_transaction(&mut tx, self.signer.as_ref()).context("Failed to sign action")?;
        log::debug!("Dispatcher: signed action {} for {}", local_signature, candidate.entity);

        self.ledger
            .submit_transaction(&tx)
            .await
            .context("Failed to submit action")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::purchase::AssociatedAccountPurchase;
    use crate::utils::wallet::KeypairSigner;
    use async_trait::async_trait;
    use solana_sdk::hash::Hash;
    use solana_sdk::instruction::Instruction;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Keypair;
    use solana_sdk::transaction::Transaction;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLedger {
        submits: AtomicUsize,
        fail_submit: bool,
        submit_delay: Option<Duration>,
    }

    #[async_trait]
    impl Ledger for CountingLedger {
        async fn get_recent_block_reference(&self) -> Result<Hash> {
            Ok(Hash::new_unique())
        }

        async fn submit_transaction(&self, tx: &Transaction) -> Result<Signature> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.submit_delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_submit {
                return Err(anyhow::anyhow!("node unhealthy"));
            }
            Ok(tx.signatures[0])
        }
    }

    struct EmptyPayload;

    impl PayloadBuilder for EmptyPayload {
        fn build_instructions(&self, _candidate: &Candidate, _payer: &Pubkey) -> Result<Vec<Instruction>> {
            Ok(Vec::new())
        }
    }

    fn dispatcher(ledger: Arc<CountingLedger>) -> ActionDispatcher {
        dispatcher_with_payload(ledger, Arc::new(AssociatedAccountPurchase::new()))
    }

    fn dispatcher_with_payload(
        ledger: Arc<CountingLedger>,
        payload: Arc<dyn PayloadBuilder>,
    ) -> ActionDispatcher {
        ActionDispatcher::new(
            ledger,
            Arc::new(KeypairSigner::new(Keypair::new())),
            payload,
            ActionSettings {
                compute_units: 200_000,
                priority_fee_per_cu: 1_000,
            },
            EventBus::new(64),
        )
    }

    fn candidate() -> Candidate {
        Candidate {
            entity: Pubkey::new_unique(),
            observed_supply: 1_000_000,
            estimated_unit_price: 0.01,
            estimated_cap: 10_000.0,
            slot: 9,
        }
    }

    #[tokio::test]
    async fn test_second_dispatch_is_skipped() {
        let ledger = Arc::new(CountingLedger::default());
        let d = dispatcher(Arc::clone(&ledger));
        let cancel = CancellationToken::new();
        let c = candidate();

        let first = d.dispatch(&c, &cancel).await;
        assert!(first.is_submitted());
        assert_eq!(d.table().get(&c.entity).unwrap().state, DispatchState::Submitted);

        let second = d.dispatch(&c, &cancel).await;
        assert_eq!(second, Outcome::Skipped(ALREADY_ATTEMPTED.to_string()));
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_never_retried() {
        let ledger = Arc::new(CountingLedger {
            fail_submit: true,
            ..Default::default()
        });
        let d = dispatcher(Arc::clone(&ledger));
        let cancel = CancellationToken::new();
        let c = candidate();

        match d.dispatch(&c, &cancel).await {
            Outcome::Failed(reason) => assert!(reason.contains("node unhealthy")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(d.table().get(&c.entity).unwrap().state, DispatchState::Failed);

        assert!(d.dispatch(&c, &cancel).await.is_skipped());
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_payload_fails_without_submitting() {
        let ledger = Arc::new(CountingLedger::default());
        let d = dispatcher_with_payload(Arc::clone(&ledger), Arc::new(EmptyPayload));

        let outcome = d.dispatch(&candidate(), &CancellationToken::new()).await;
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_dispatch_of_same_entity_submits_once() {
        let ledger = Arc::new(CountingLedger {
            submit_delay: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let d = Arc::new(dispatcher(Arc::clone(&ledger)));
        let cancel = CancellationToken::new();
        let c = candidate();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let d = Arc::clone(&d);
            let c = c.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move { d.dispatch(&c, &cancel).await }));
        }

        let mut submitted = 0;
        let mut skipped = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Outcome::Submitted(_) => submitted += 1,
                Outcome::Skipped(_) => skipped += 1,
                Outcome::Failed(e) => panic!("unexpected failure: {}", e),
            }
        }
        assert_eq!(submitted, 1);
        assert_eq!(skipped, 7);
        assert_eq!(ledger.submits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_dispatch_is_failed_and_final() {
        let ledger = Arc::new(CountingLedger {
            submit_delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let d = dispatcher(Arc::clone(&ledger));
        let cancel = CancellationToken::new();
        let c = candidate();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        assert!(matches!(d.dispatch(&c, &cancel).await, Outcome::Failed(_)));
        assert_eq!(d.table().get(&c.entity).unwrap().state, DispatchState::Failed);
        assert!(d.dispatch(&c, &CancellationToken::new()).await.is_skipped());
    }

    #[tokio::test]
    async fn test_outcome_published_on_event_bus() {
        let ledger = Arc::new(CountingLedger::default());
        let d = dispatcher(ledger);
        let mut events = d.event_bus.subscribe();
        let c = candidate();

        d.dispatch(&c, &CancellationToken::new()).await;
        match events.recv().await.unwrap() {
            Event::Dispatched { entity, outcome } => {
                assert_eq!(entity, c.entity);
                assert!(outcome.is_submitted());
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
