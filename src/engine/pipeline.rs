//! Ingestion loop and dispatch worker pool
//!
//! The ingestion task drains each session in transport order and classifies
//! inline. Candidates go through a bounded queue to a pool of dispatch
//! workers, so a hung submission never stalls ingestion. One root token stops
//! the reconnect loop, the backoff sleep and every in-flight dispatch.

use crate::blockchain::stream::StreamTransport;
use crate::core::events::{Event, EventBus};
use crate::core::types::Candidate;
use crate::engine::classifier::EventClassifier;
use crate::engine::dispatcher::ActionDispatcher;
use crate::engine::supervisor::{ConnectionSupervisor, SessionEvent};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    pub sessions: u64,
    pub updates: u64,
    pub candidates: u64,
    pub dropped: u64,
}

pub struct Pipeline<T: StreamTransport> {
    supervisor: ConnectionSupervisor<T>,
    classifier: Arc<EventClassifier>,
    dispatcher: Arc<ActionDispatcher>,
    event_bus: EventBus,
    queue_size: usize,
    workers: usize,
}

impl<T: StreamTransport> Pipeline<T> {
    pub fn new(
        supervisor: ConnectionSupervisor<T>,
        classifier: Arc<EventClassifier>,
        dispatcher: Arc<ActionDispatcher>,
        event_bus: EventBus,
        queue_size: usize,
        workers: usize,
    ) -> Self {
        Pipeline {
            supervisor,
            classifier,
            dispatcher,
            event_bus,
            queue_size: queue_size.max(1),
            workers: workers.max(1),
        }
    }

    /// Run until `cancel` fires. Steady-state failures never end the loop.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<PipelineStats> {
        let (queue_tx, queue_rx) = mpsc::channel::<Candidate>(self.queue_size);
        let pool = tokio::spawn(run_dispatch_pool(
            queue_rx,
            Arc::clone(&self.dispatcher),
            self.workers,
            cancel.clone(),
        ));

        let mut stats = PipelineStats::default();

        'reconnect: while let Some(mut session) = self.supervisor.run(&cancel).await {
            stats.sessions += 1;
            self.event_bus.publish(Event::SessionStarted {
                stream_name: self.supervisor.stream_name().to_string(),
                session: session.id(),
            });

            loop {
                let event = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break 'reconnect,
                    event = session.next() => event,
                };

                match event {
                    SessionEvent::Update(update) => {
                        stats.updates += 1;
                        let Some(candidate) = self.classifier.classify(&update) else {
                            continue;
                        };

                        stats.candidates += 1;
                        log::info!(
                            "Pipeline: candidate {} (supply={}, est_cap={:.2}, slot={})",
                            candidate.entity,
                            candidate.observed_supply,
                            candidate.estimated_cap,
                            candidate.slot
                        );
                        self.event_bus.publish(Event::CandidateFound {
                            candidate: candidate.clone(),
                        });

                        match queue_tx.try_send(candidate) {
                            Ok(()) => {}
                            Err(TrySendError::Full(candidate)) => {
                                stats.dropped += 1;
                                log::warn!(
                                    "Pipeline: dispatch queue full ({}), dropping candidate {}",
                                    self.queue_size,
                                    candidate.entity
                                );
                                self.event_bus.publish(Event::CandidateDropped {
                                    entity: candidate.entity,
                                    reason: "dispatch queue full".to_string(),
                                });
                            }
                            Err(TrySendError::Closed(_)) => {
                                log::error!("Pipeline: dispatch pool stopped, ending ingestion");
                                break 'reconnect;
                            }
                        }
                    }
                    SessionEvent::Disconnected(reason) => {
                        log::warn!(
                            "[{}] session {} disconnected: {}",
                            self.supervisor.stream_name(),
                            session.id(),
                            reason
                        );
                        self.event_bus.publish(Event::Disconnected {
                            session: session.id(),
                            reason,
                        });
                        continue 'reconnect;
                    }
                }
            }
        }

        log::info!("Pipeline: ingestion stopped, waiting for dispatch workers");
        drop(queue_tx);
        pool.await.context("Dispatch pool task panicked")?;

        Ok(stats)
    }
}

async fn run_dispatch_pool(
    mut queue: mpsc::Receiver<Candidate>,
    dispatcher: Arc<ActionDispatcher>,
    workers: usize,
    cancel: CancellationToken,
) {
    let semaphore = Arc::new(Semaphore::new(workers));
    let mut tasks = JoinSet::new();

    loop {
        let candidate = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            candidate = queue.recv() => match candidate {
                Some(candidate) => candidate,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let dispatcher = Arc::clone(&dispatcher);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let _permit = permit;
            dispatcher.dispatch(&candidate, &cancel).await
        });

        while let Some(result) = tasks.try_join_next() {
            if let Err(e) = result {
                log::error!("Dispatch worker panicked: {}", e);
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            log::error!("Dispatch worker panicked: {}", e);
        }
    }
}
