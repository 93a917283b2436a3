//! WebSocket push connector.

use crate::error::{NotifyError, NotifyResult};
use crate::transport::{PushChannel, PushConnector};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};
use url::Url;

/// Opens push channels over WebSocket.
///
/// Each connection runs a reader task that forwards text frames and a
/// writer task that drains the outbound queue. The socket is closed once
/// the outbound sender is dropped or the server ends the stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

impl WebSocketConnector {
    /// Creates a connector.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn open(&self, url: &Url) -> NotifyResult<PushChannel> {
        let (stream, response) = connect_async(url.as_str()).await.map_err(classify)?;
        debug!(status = %response.status(), "push handshake complete");

        let (mut write, mut read) = stream.split();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let reader = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                match message {
                    Ok(Message::Text(text)) => {
                        if inbound_tx.send(text.as_str().to_owned()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "push channel closed by server");
                        break;
                    }
                    // Pings are answered by tungstenite; binary frames are not used.
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "push channel read failed");
                        break;
                    }
                }
            }
        });

        tokio::spawn(async move {
            while let Some(text) = outbound_rx.recv().await {
                if let Err(e) = write.send(Message::text(text)).await {
                    warn!(error = %e, "push channel write failed");
                    break;
                }
            }
            let _ = write.close().await;
            reader.abort();
        });

        Ok(PushChannel { inbound, outbound })
    }
}

/// Maps a handshake failure onto the engine's error taxonomy.
fn classify(err: WsError) -> NotifyError {
    match err {
        WsError::Http(response) => {
            let status = response.status().as_u16();
            if status == 401 || status == 403 {
                NotifyError::AuthenticationFailed(format!("push handshake rejected with {status}"))
            } else {
                NotifyError::transport_retryable(format!("push handshake failed with {status}"))
            }
        }
        WsError::Url(e) => NotifyError::transport_fatal(format!("invalid push url: {e}")),
        other => NotifyError::transport_retryable(other.to_string()),
    }
}
