use crate::core::events::Event;
use crate::core::types::Outcome;
use anyhow::Result;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::time::{interval, Instant};
use tokio_util::sync::CancellationToken;

const SUMMARY_INTERVAL: Duration = Duration::from_secs(300);

/// Log bus events and periodic totals until `cancel` fires.
///
/// Events already queued on the bus when `cancel` fires are still counted, so
/// the final summary includes outcomes published during shutdown.
pub async fn run_logger(
    mut receiver: broadcast::Receiver<Event>,
    dry_run: bool,
    cancel: CancellationToken,
) -> Result<Metrics> {
    let mut metrics = Metrics::default();
    let mode_str = if dry_run { "DRY RUN" } else { "LIVE" };

    let mut summary_interval = interval(SUMMARY_INTERVAL);
    // The first tick completes immediately.
    summary_interval.tick().await;
    let started = Instant::now();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event_result = receiver.recv() => {
                match event_result {
                    Ok(event) => {
                        metrics.record(&event);
                        log_event(&event, mode_str);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("⚠️  Logger lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::error!("Event bus closed, logger shutting down");
                        break;
                    }
                }
            }
            _ = summary_interval.tick() => {
                metrics.log_summary(started.elapsed().as_secs() / 60, mode_str);
            }
        }
    }

    loop {
        match receiver.try_recv() {
            Ok(event) => {
                metrics.record(&event);
                log_event(&event, mode_str);
            }
            Err(TryRecvError::Lagged(skipped)) => {
                log::warn!("⚠️  Logger lagged, {} events skipped", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }

    metrics.log_summary(started.elapsed().as_secs() / 60, mode_str);
    Ok(metrics)
}

fn log_event(event: &Event, mode_str: &str) {
    match event {
        Event::SessionStarted { stream_name, session } => {
            log::info!("🔌 [{}] session {} live", stream_name, session);
        }
        Event::Disconnected { session, reason } => {
            log::debug!("session {} ended: {}", session, reason);
        }
        Event::CandidateFound { candidate } => {
            log::debug!(
                "candidate {} est_cap=${:.2}",
                candidate.entity,
                candidate.estimated_cap
            );
        }
        Event::CandidateDropped { entity, reason } => {
            log::debug!("candidate {} dropped: {}", entity, reason);
        }
        Event::Dispatched { entity, outcome } => match outcome {
            Outcome::Submitted(sig) => {
                log::info!("✅ {} SUBMITTED: mint={}, sig={}", mode_str, entity, sig);
            }
            Outcome::Skipped(reason) => {
                log::debug!("mint {} skipped ({})", entity, reason);
            }
            Outcome::Failed(err) => {
                log::error!("❌ {} FAILED: mint={}, error={}", mode_str, entity, err);
            }
        },
    }
}

/// Running totals since process start.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    pub sessions: u64,
    pub disconnects: u64,
    pub candidates: u64,
    pub dropped: u64,
    pub submitted: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl Metrics {
    pub fn record(&mut self, event: &Event) {
        match event {
            Event::SessionStarted { .. } => self.sessions += 1,
            Event::Disconnected { .. } => self.disconnects += 1,
            Event::CandidateFound { .. } => self.candidates += 1,
            Event::CandidateDropped { .. } => self.dropped += 1,
            Event::Dispatched { outcome, .. } => match outcome {
                Outcome::Submitted(_) => self.submitted += 1,
                Outcome::Skipped(_) => self.skipped += 1,
                Outcome::Failed(_) => self.failed += 1,
            },
        }
    }

    fn log_summary(&self, uptime_min: u64, mode_str: &str) {
        log::info!("═══════════════════════════════════════════════════════════");
        log::info!("📊 SNIPER STATUS (totals since start, uptime {} min)", uptime_min);
        log::info!("   🔌 Sessions: {} (disconnects: {})", self.sessions, self.disconnects);
        log::info!("   🔍 Candidates: {} (dropped on full queue: {})", self.candidates, self.dropped);
        log::info!(
            "   🚀 Dispatch: submitted={}, skipped={}, failed={}",
            self.submitted,
            self.skipped,
            self.failed
        );
        log::info!("   📝 Mode: {}", mode_str);
        log::info!("═══════════════════════════════════════════════════════════");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::pubkey::Pubkey;
    use solana_sdk::signature::Signature;

    #[test]
    fn test_metrics_count_outcomes() {
        let mut metrics = Metrics::default();
        let entity = Pubkey::new_unique();
        metrics.record(&Event::SessionStarted {
            stream_name: "s".to_string(),
            session: 1,
        });
        metrics.record(&Event::Dispatched {
            entity,
            outcome: Outcome::Submitted(Signature::default()),
        });
        metrics.record(&Event::Dispatched {
            entity,
            outcome: Outcome::Skipped("already attempted".to_string()),
        });
        metrics.record(&Event::Disconnected {
            session: 1,
            reason: "reset".to_string(),
        });

        assert_eq!(metrics.sessions, 1);
        assert_eq!(metrics.disconnects, 1);
        assert_eq!(metrics.submitted, 1);
        assert_eq!(metrics.skipped, 1);
        assert_eq!(metrics.failed, 0);
    }

    #[tokio::test]
    async fn test_logger_stops_on_cancel() {
        let (tx, rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_logger(rx, true, cancel.clone()));
        let _ = tx.send(Event::CandidateDropped {
            entity: Pubkey::new_unique(),
            reason: "dispatch queue full".to_string(),
        });
        cancel.cancel();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_outcomes_queued_at_cancel_are_counted() {
        let (tx, rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();
        for _ in 0..3 {
            tx.send(Event::Dispatched {
                entity: Pubkey::new_unique(),
                outcome: Outcome::Failed("Cancelled".to_string()),
            })
            .unwrap();
        }
        cancel.cancel();

        let metrics = run_logger(rx, true, cancel).await.unwrap();
        assert_eq!(metrics.failed, 3);
    }
}
