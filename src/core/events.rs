use super::types::{Candidate, Outcome};
use solana_sdk::pubkey::Pubkey;
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum Event {
    // Transport
    SessionStarted {
        stream_name: String,
        session: u64,
    },
    Disconnected {
        session: u64,
        reason: String,
    },

    // Classification
    CandidateFound {
        candidate: Candidate,
    },
    CandidateDropped {
        entity: Pubkey,
        reason: String,
    },

    // Dispatch
    Dispatched {
        entity: Pubkey,
        outcome: Outcome,
    },
}

/// Event Bus - central channel every pipeline stage reports through
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        EventBus { sender }
    }

    /// Publishing with no subscribers is not an error for the pipeline.
    pub fn publish(&self, event: Event) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }
}
