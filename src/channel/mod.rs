//! Phoenix channel protocol over a persistent connection.
//!
//! [`Client`] keeps one connection open to a Phoenix-style server, multiplexes
//! any number of topics over it and survives disconnects:
//!
//! - topics joined at any time are remembered and rejoined after every reconnect
//! - a `heartbeat` frame is sent on the `phoenix` topic while connected
//! - every outbound frame carries a fresh, strictly increasing `ref`
//! - inbound frames are classified into [`ChannelEvent`]s and broadcast to subscribers
//!
//! [`Client::disconnect`] is terminal: membership is cleared and no further
//! reconnection is attempted.
//!
//! # Example
//!
//! ```rust, no_run
//! use futures::StreamExt as _;
//! use phoenix_channel_client::channel::{ChannelEvent, Client};
//! use phoenix_channel_client::config::ClientConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ClientConfig::builder()
//!         .url("ws://localhost:4000/ws/websocket")
//!         .token("dummy123".to_owned())
//!         .build();
//!     let game = config.topics().entity(42);
//!
//!     let client = Client::start(config).await?;
//!     client.join_topic(&game)?;
//!
//!     let mut stream = Box::pin(client.topic_stream(&game));
//!     while let Some(event) = stream.next().await {
//!         if let ChannelEvent::Domain { event, state, .. } = event? {
//!             println!("{event}: {state}");
//!         }
//!     }
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod dispatch;
pub mod frame;
pub mod membership;
pub mod session;

pub use client::Client;
pub use dispatch::{ChannelEvent, dispatch};
pub use frame::{Frame, HEARTBEAT_TOPIC, Payload, ProtocolEvent};
pub use membership::Membership;
