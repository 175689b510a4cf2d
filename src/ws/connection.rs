#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::time::Instant;

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::error::WsError;
use super::traits::{Connector, Transport, TransportEvent};
use crate::Result;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Successfully connected
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Waiting to reconnect after a failure
    Reconnecting {
        /// Current reconnection attempt number
        attempt: u32,
    },
    /// Torn down by an explicit disconnect or because reconnection gave up.
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    /// Check if the client has been torn down.
    #[must_use]
    pub const fn is_closed(self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Opens WebSocket transports with `tokio-tungstenite`.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self, url: &str) -> Result<WsTransport> {
        let (stream, _response) = connect_async(url).await.map_err(WsError::Connection)?;

        Ok(WsTransport { stream })
    }
}

/// A live WebSocket connection carrying text frames.
pub struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(WsError::Connection)?;
        Ok(())
    }

    async fn recv(&mut self) -> TransportEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    #[cfg(feature = "tracing")]
                    tracing::trace!(%text, "Received WebSocket text message");

                    return TransportEvent::Message(text.to_string());
                }
                Some(Ok(Message::Close(_))) | None => return TransportEvent::Closed,
                Some(Err(e)) if is_fatal(&e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "WebSocket connection lost");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;

                    return TransportEvent::Closed;
                }
                Some(Err(e)) => return TransportEvent::Error(WsError::Connection(e).into()),
                Some(Ok(_)) => {
                    // Control frames are answered by tungstenite; binary frames are not part of the protocol.
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(WsError::Connection)?;
        Ok(())
    }
}

/// Errors after which the stream can never yield another message.
fn is_fatal(error: &tungstenite::Error) -> bool {
    matches!(
        error,
        tungstenite::Error::ConnectionClosed
            | tungstenite::Error::AlreadyClosed
            | tungstenite::Error::Io(_)
            | tungstenite::Error::Protocol(_)
    )
}
