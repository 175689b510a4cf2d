//! Core WebSocket infrastructure.
//!
//! This module provides the transport seam the channel client is built on,
//! plus a `tokio-tungstenite` implementation of it.
//!
//! # Architecture
//!
//! - [`Connector`] / [`Transport`]: open a connection and exchange text messages
//! - [`ReconnectPolicy`]: how long to wait before each reconnection attempt
//! - [`WsConnector`]: the WebSocket implementation used by default
//!
//! # Example
//!
//! ```ignore
//! let mut transport = WsConnector.connect("ws://localhost:4000/socket/websocket").await?;
//! transport.send(r#"{"topic":"phoenix","event":"heartbeat","payload":{},"ref":1}"#.to_owned()).await?;
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod traits;

pub use connection::{ConnectionState, WsConnector, WsTransport};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use traits::*;
