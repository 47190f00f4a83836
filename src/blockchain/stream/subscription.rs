// Subscription request building and the per-session reader task

use super::message::decode_message;
use super::SubscribeRequest;
use crate::core::types::RawUpdate;
use futures_util::StreamExt;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::connection::WsStream;

pub const SUBSCRIBE_METHOD: &str = "programSubscribe";

/// programSubscribe: [programId, {encoding: "base64", commitment: <level>}]
pub fn build_subscription_params(request: &SubscribeRequest) -> serde_json::Value {
    json!([
        request.program_id.to_string(),
        {
            "encoding": "base64",
            "commitment": request.commitment.as_str()
        }
    ])
}

/// Pump frames from the socket into the update conduit in arrival order.
///
/// Ends on cancellation, consumer hang-up, or the first transport error; the
/// error (if any) is reported on `errors_tx` and both senders are dropped.
pub(super) async fn run_reader(
    mut stream: WsStream,
    updates_tx: mpsc::Sender<RawUpdate>,
    errors_tx: mpsc::Sender<anyhow::Error>,
    idle_timeout: Duration,
    cancel: CancellationToken,
    stream_name: String,
) {
    let failure = loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break None,
            next = timeout(idle_timeout, stream.next()) => next,
        };

        let update = match next {
            Err(_) => {
                break Some(anyhow::anyhow!(
                    "no message for {:?}, treating stream as dead",
                    idle_timeout
                ))
            }
            Ok(None) => break Some(anyhow::anyhow!("stream ended")),
            Ok(Some(Err(e))) => break Some(anyhow::anyhow!("stream error: {}", e)),
            Ok(Some(Ok(Message::Text(text)))) => decode_message(&text),
            Ok(Some(Ok(Message::Binary(bytes)))) => match std::str::from_utf8(&bytes) {
                Ok(text) => decode_message(text),
                Err(_) => RawUpdate::Other,
            },
            Ok(Some(Ok(Message::Close(frame)))) => {
                break Some(anyhow::anyhow!("closed by server: {:?}", frame))
            }
            // Ping/pong keep-alives are answered by tungstenite itself.
            Ok(Some(Ok(_))) => continue,
        };

        tokio::select! {
            _ = cancel.cancelled() => break None,
            sent = updates_tx.send(update) => {
                if sent.is_err() {
                    log::debug!("[{}] update consumer dropped, stopping reader", stream_name);
                    break None;
                }
            }
        }
    };

    if let Some(err) = failure {
        let _ = errors_tx.send(err).await;
    }

    let _ = stream.close(None).await;
    log::debug!("[{}] reader stopped, connection released", stream_name);
}
