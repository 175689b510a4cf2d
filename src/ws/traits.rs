//! Core traits for the transport seam and the reconnection policy.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;

/// Lifecycle and data events produced by a live [`Transport`].
///
/// "Open" is not represented here: a transport exists only once
/// [`Connector::connect`] has succeeded, which is the open event.
#[non_exhaustive]
#[derive(Debug)]
pub enum TransportEvent {
    /// A complete text message from the server
    Message(String),
    /// A transport-level error. The connection may still be usable; a subsequent
    /// [`TransportEvent::Closed`] signals that it is not.
    Error(Error),
    /// The connection is gone and will produce no further events
    Closed,
}

/// Opens transports to a server URL.
///
/// # Example
///
/// ```ignore
/// pub struct LoopbackConnector;
///
/// #[async_trait]
/// impl Connector for LoopbackConnector {
///     type Transport = LoopbackTransport;
///
///     async fn connect(&self, url: &str) -> crate::Result<LoopbackTransport> {
///         Ok(LoopbackTransport::new(url))
///     }
/// }
/// ```
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    /// Open a new transport. Returning `Ok` is the "open" event.
    async fn connect(&self, url: &str) -> crate::Result<Self::Transport>;
}

/// A bidirectional channel of discrete text messages.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Send one text message.
    async fn send(&mut self, text: String) -> crate::Result<()>;

    /// Wait for the next event.
    ///
    /// Must be cancel safe: the driver polls it inside `tokio::select!` next to
    /// timers and client commands.
    async fn recv(&mut self) -> TransportEvent;

    /// Close the transport. No further events are expected afterwards.
    async fn close(&mut self) -> crate::Result<()>;
}

/// Decides how long to wait before each reconnection attempt.
///
/// `attempt` counts consecutive attempts since the last successful open and
/// starts at 1. Returning `None` stops reconnecting and closes the client.
pub trait ReconnectPolicy: Send + 'static {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration>;

    /// Called after every successful open.
    fn reset(&mut self) {}
}

impl<P: ReconnectPolicy + ?Sized> ReconnectPolicy for Box<P> {
    fn next_delay(&mut self, attempt: u32) -> Option<Duration> {
        (**self).next_delay(attempt)
    }

    fn reset(&mut self) {
        (**self).reset();
    }
}
