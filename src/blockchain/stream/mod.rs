// Streaming subscription transport - organized into submodules

mod connection;
mod message;
mod subscription;

pub use connection::{WsConnection, WsTransport};
pub use message::decode_message;
pub use subscription::{build_subscription_params, SUBSCRIBE_METHOD};

use crate::core::config::Commitment;
use crate::core::types::RawUpdate;
use anyhow::Result;
use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

#[derive(Debug, Clone)]
pub struct SubscribeRequest {
    pub program_id: Pubkey,
    pub stream_name: String,
    pub commitment: Commitment,
}

/// A live subscription: the update conduit plus the side channel for terminal
/// stream errors.
///
/// Dropping it cancels the transport's reader and releases the connection.
pub struct Subscription {
    pub updates: mpsc::Receiver<RawUpdate>,
    pub errors: mpsc::Receiver<anyhow::Error>,
    _release: DropGuard,
}

impl Subscription {
    pub fn new(
        updates: mpsc::Receiver<RawUpdate>,
        errors: mpsc::Receiver<anyhow::Error>,
        release: CancellationToken,
    ) -> Self {
        Subscription {
            updates,
            errors,
            _release: release.drop_guard(),
        }
    }
}

/// Streaming subscription collaborator.
///
/// `connect` authenticates against the endpoint; `subscribe` consumes the
/// connection and hands ownership of it to the subscription it returns.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    type Connection: Send;

    async fn connect(&self, endpoint: &str, auth_token: &str) -> Result<Self::Connection>;

    async fn subscribe(
        &self,
        connection: Self::Connection,
        request: &SubscribeRequest,
    ) -> Result<Subscription>;
}
