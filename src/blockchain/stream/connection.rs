// WebSocket connection, authentication and subscribe handshake

use super::subscription::{build_subscription_params, run_reader, SUBSCRIBE_METHOD};
use super::{StreamTransport, SubscribeRequest, Subscription};
use crate::core::error::Error;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const AUTH_HEADER: &str = "x-token";

/// JSON-RPC reply envelope. Notifications carry no `id` and are skipped.
#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Option<u64>,
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

/// An authenticated socket that has not subscribed yet.
pub struct WsConnection {
    stream: WsStream,
}

pub struct WsTransport {
    update_channel_size: usize,
    handshake_timeout: Duration,
    idle_timeout: Duration,
}

impl WsTransport {
    pub fn new(update_channel_size: usize, handshake_timeout: Duration, idle_timeout: Duration) -> Self {
        WsTransport {
            update_channel_size,
            handshake_timeout,
            idle_timeout,
        }
    }
}

#[async_trait]
impl StreamTransport for WsTransport {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &str, auth_token: &str) -> Result<WsConnection> {
        let mut request = endpoint
            .into_client_request()
            .context("Invalid stream endpoint")?;
        let token = HeaderValue::from_str(auth_token).context("Auth token is not a valid header value")?;
        request.headers_mut().insert(AUTH_HEADER, token);

        let (stream, _) = timeout(self.handshake_timeout, connect_async(request))
            .await
            .map_err(|_| Error::Transport(format!("connect timeout after {:?}", self.handshake_timeout)))?
            .context("Failed to connect to stream endpoint")?;

        Ok(WsConnection { stream })
    }

    async fn subscribe(&self, connection: WsConnection, request: &SubscribeRequest) -> Result<Subscription> {
        let mut stream = connection.stream;

        let subscription_id = timeout(self.handshake_timeout, send_subscribe(&mut stream, request))
            .await
            .map_err(|_| Error::Transport(format!("subscribe timeout after {:?}", self.handshake_timeout)))??;

        log::info!(
            "[{}] subscribed to program {} at commitment={} (subscription id {})",
            request.stream_name,
            request.program_id,
            request.commitment.as_str(),
            subscription_id
        );

        let (updates_tx, updates_rx) = mpsc::channel(self.update_channel_size);
        let (errors_tx, errors_rx) = mpsc::channel(1);
        let release = CancellationToken::new();

        tokio::spawn(run_reader(
            stream,
            updates_tx,
            errors_tx,
            self.idle_timeout,
            release.clone(),
            request.stream_name.clone(),
        ));

        Ok(Subscription::new(updates_rx, errors_rx, release))
    }
}

async fn send_subscribe(stream: &mut WsStream, request: &SubscribeRequest) -> Result<u64> {
    const REQUEST_ID: u64 = 1;

    let body = json!({
        "jsonrpc": "2.0",
        "id": REQUEST_ID,
        "method": SUBSCRIBE_METHOD,
        "params": build_subscription_params(request),
    });

    stream
        .send(Message::Text(serde_json::to_string(&body)?))
        .await
        .context("Failed to send subscribe request")?;

    wait_for_response(stream, REQUEST_ID).await?
        .as_u64()
        .ok_or_else(|| anyhow::anyhow!("Invalid subscription ID in response"))
}

async fn wait_for_response(stream: &mut WsStream, expected_id: u64) -> Result<serde_json::Value> {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                let response: RpcResponse = serde_json::from_str(&text)
                    .context("Failed to parse subscribe response")?;

                if response.id != Some(expected_id) {
                    continue;
                }
                if let Some(error) = response.error {
                    return Err(anyhow::anyhow!("Subscribe rejected: {}", error));
                }
                if let Some(result) = response.result {
                    return Ok(result);
                }
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(anyhow::anyhow!("Connection closed during subscribe: {:?}", frame));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(anyhow::anyhow!("Stream error during subscribe: {}", e)),
            None => return Err(anyhow::anyhow!("Stream ended during subscribe")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpc_response_envelope() {
        let ok: RpcResponse = serde_json::from_str(r#"{"jsonrpc":"2.0","result":23784,"id":1}"#).unwrap();
        assert_eq!(ok.id, Some(1));
        assert_eq!(ok.result.and_then(|r| r.as_u64()), Some(23784));

        let rejected: RpcResponse = serde_json::from_str(
            r#"{"jsonrpc":"2.0","error":{"code":-32602,"message":"Invalid param"},"id":1}"#,
        )
        .unwrap();
        assert!(rejected.result.is_none());
        assert!(rejected.error.is_some());

        let notification: RpcResponse =
            serde_json::from_str(r#"{"jsonrpc":"2.0","method":"programNotification","params":{}}"#).unwrap();
        assert_eq!(notification.id, None);
    }
}
