//! WebSocket transport implementation.
//!
//! This module provides a client-side WebSocket transport using
//! tokio-tungstenite. Each stream runs on its own task.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Error as WsError, Message},
};
use tracing::{debug, error, trace, warn};

use crate::traits::{
    SignalKind, SignalSender, StreamHandle, StreamId, StreamSignal, Transport, TransportError,
};

/// WebSocket transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum inbound message size in bytes.
    pub max_message_size: usize,
    /// How long to wait for the connection to be established.
    pub connect_timeout: Duration,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 1024 * 1024, // 1 MiB
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// WebSocket transport.
#[derive(Debug, Clone, Default)]
pub struct WebSocketTransport {
    config: WebSocketConfig,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        Self { config }
    }

    /// Get the transport configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    fn open(
        &self,
        url: &str,
        signals: SignalSender,
    ) -> Result<Box<dyn StreamHandle>, TransportError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::Other(format!("No async runtime: {}", e)))?;

        let id = StreamId::generate();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        debug!(stream = %id, url = %url, "Opening WebSocket stream");

        let task = runtime.spawn(run_stream(
            id,
            url.to_string(),
            self.config.clone(),
            outbound_rx,
            signals,
        ));

        Ok(Box::new(WebSocketStreamHandle {
            id,
            outbound: outbound_tx,
            task,
        }))
    }

    fn name(&self) -> &'static str {
        "websocket"
    }
}

/// Handle to a WebSocket stream task.
///
/// Dropping the handle closes the stream with a close frame once queued
/// frames are flushed; [`StreamHandle::abort`] stops it immediately.
pub struct WebSocketStreamHandle {
    id: StreamId,
    outbound: mpsc::UnboundedSender<Bytes>,
    task: JoinHandle<()>,
}

impl StreamHandle for WebSocketStreamHandle {
    fn id(&self) -> StreamId {
        self.id
    }

    fn send_text(&self, data: Bytes) -> Result<(), TransportError> {
        self.outbound
            .send(data)
            .map_err(|_| TransportError::ConnectionClosed)
    }

    fn abort(self: Box<Self>) {
        debug!(stream = %self.id, "Aborting WebSocket stream");
        self.task.abort();
    }
}

/// Drive one stream until it closes, fails, or its handle goes away.
async fn run_stream(
    id: StreamId,
    url: String,
    config: WebSocketConfig,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    signals: SignalSender,
) {
    let emit = |kind: SignalKind| {
        // The receiver only goes away when the session is shutting down.
        let _ = signals.send(StreamSignal::new(id, kind));
    };

    let ws_stream = match tokio::time::timeout(config.connect_timeout, connect_async(url.as_str()))
        .await
    {
        Ok(Ok((ws_stream, _response))) => ws_stream,
        Ok(Err(e)) => {
            error!(stream = %id, error = %e, "WebSocket connect failed");
            emit(SignalKind::Error(Some(format!("WebSocket connect failed: {}", e))));
            return;
        }
        Err(_) => {
            error!(stream = %id, "WebSocket connect timed out");
            emit(SignalKind::Error(Some("WebSocket connect timed out".into())));
            return;
        }
    };

    debug!(stream = %id, "WebSocket connected");
    emit(SignalKind::Open);

    let (mut sink, mut source) = ws_stream.split();

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(data) => {
                    let text = match String::from_utf8(data.to_vec()) {
                        Ok(text) => text,
                        Err(e) => {
                            warn!(stream = %id, error = %e, "Dropping non UTF-8 text frame");
                            continue;
                        }
                    };
                    trace!(stream = %id, bytes = text.len(), "Sending text frame");
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        error!(stream = %id, error = %e, "WebSocket send failed");
                        emit(SignalKind::Error(Some(e.to_string())));
                        return;
                    }
                }
                None => {
                    debug!(stream = %id, "Stream handle dropped, closing");
                    if let Err(e) = sink.close().await {
                        debug!(stream = %id, error = %e, "Close handshake failed");
                    }
                    return;
                }
            },

            msg = source.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > config.max_message_size {
                        warn!(
                            stream = %id,
                            size = text.len(),
                            max = config.max_message_size,
                            "Message too large"
                        );
                        emit(SignalKind::Error(Some(format!(
                            "Message size {} exceeds maximum {}",
                            text.len(),
                            config.max_message_size
                        ))));
                        return;
                    }
                    emit(SignalKind::Text(Bytes::from(text)));
                }
                Some(Ok(Message::Binary(data))) => {
                    emit(SignalKind::Binary(Bytes::from(data)));
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = sink.send(Message::Pong(data)).await {
                        warn!(stream = %id, error = %e, "Failed to send pong");
                    }
                }
                Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {}
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|reason| !reason.is_empty());
                    debug!(stream = %id, reason = ?reason, "Received close frame");
                    emit(SignalKind::Close(reason));
                    return;
                }
                Some(Err(WsError::ConnectionClosed)) | None => {
                    debug!(stream = %id, "WebSocket stream ended");
                    emit(SignalKind::Close(None));
                    return;
                }
                Some(Err(e)) => {
                    error!(stream = %id, error = %e, "WebSocket error");
                    emit(SignalKind::Error(Some(e.to_string())));
                    return;
                }
            }
        }
    }
}
