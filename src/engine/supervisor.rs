use crate::blockchain::stream::{StreamTransport, SubscribeRequest, Subscription};
use crate::core::types::RawUpdate;
use crate::utils::backoff::Backoff;
use anyhow::Result;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// What a live session yields next.
#[derive(Debug)]
pub enum SessionEvent {
    Update(RawUpdate),
    Disconnected(String),
}

/// One subscribed session. Dropping it releases the connection.
pub struct Session {
    id: u64,
    subscription: Subscription,
}

impl Session {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next update in transport order, or the reason the session ended.
    ///
    /// Updates the transport already buffered are handed out before a pending
    /// error is reported. A closed update conduit counts as a disconnect.
    pub async fn next(&mut self) -> SessionEvent {
        tokio::select! {
            biased;

            update = self.subscription.updates.recv() => match update {
                Some(update) => SessionEvent::Update(update),
                None => {
                    let reason = match self.subscription.errors.try_recv() {
                        Ok(e) => format!("{:#}", e),
                        Err(_) => "update conduit closed".to_string(),
                    };
                    SessionEvent::Disconnected(reason)
                }
            },
            error = self.subscription.errors.recv() => match error {
                Some(e) => SessionEvent::Disconnected(format!("{:#}", e)),
                None => SessionEvent::Disconnected("error conduit closed".to_string()),
            },
        }
    }
}

/// Owns the subscription lifecycle: connect, authenticate, subscribe, and
/// back off between attempts.
///
/// Each `run` call produces at most one session; the caller loops to
/// reconnect, so every session is a fresh start for everything downstream.
pub struct ConnectionSupervisor<T: StreamTransport> {
    transport: T,
    endpoint: String,
    auth_token: String,
    request: SubscribeRequest,
    backoff: Backoff,
    sessions: u64,
    reconnecting: bool,
}

impl<T: StreamTransport> ConnectionSupervisor<T> {
    pub fn new(
        transport: T,
        endpoint: String,
        auth_token: String,
        request: SubscribeRequest,
        backoff: Backoff,
    ) -> Self {
        ConnectionSupervisor {
            transport,
            endpoint,
            auth_token,
            request,
            backoff,
            sessions: 0,
            reconnecting: false,
        }
    }

    pub fn stream_name(&self) -> &str {
        &self.request.stream_name
    }

    pub fn sessions_started(&self) -> u64 {
        self.sessions
    }

    /// Establish the next session, retrying connect and subscribe failures
    /// with backoff. Returns `None` only when `cancel` fires.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Option<Session> {
        if self.reconnecting && !self.wait_before_retry(cancel).await {
            return None;
        }

        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let attempt = tokio::select! {
                result = self.establish() => result,
                _ = cancel.cancelled() => return None,
            };

            match attempt {
                Ok(subscription) => {
                    self.backoff.reset();
                    self.sessions += 1;
                    self.reconnecting = true;
                    log::info!(
                        "[{}] session {} established",
                        self.request.stream_name,
                        self.sessions
                    );
                    return Some(Session {
                        id: self.sessions,
                        subscription,
                    });
                }
                Err(e) => {
                    log::warn!(
                        "[{}] connect/subscribe failed (attempt {}): {:#}",
                        self.request.stream_name,
                        self.backoff.attempts() + 1,
                        e
                    );
                    if !self.wait_before_retry(cancel).await {
                        return None;
                    }
                }
            }
        }
    }

    async fn establish(&self) -> Result<Subscription> {
        let connection = self.transport.connect(&self.endpoint, &self.auth_token).await?;
        self.transport.subscribe(connection, &self.request).await
    }

    /// Sleep for the next backoff delay; `false` if cancelled meanwhile.
    async fn wait_before_retry(&mut self, cancel: &CancellationToken) -> bool {
        let delay = self.backoff.next_delay();
        log::info!(
            "[{}] reconnecting in {}ms",
            self.request.stream_name,
            delay.as_millis()
        );
        tokio::select! {
            _ = sleep(delay) => true,
            _ = cancel.cancelled() => false,
        }
    }
}
