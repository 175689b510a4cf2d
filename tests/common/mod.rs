#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]
#![allow(
    unused,
    reason = "Not every test binary uses every helper"
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use phoenix_channel_client::config::ClientConfig;
use phoenix_channel_client::ws::config::{Config, Delay};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

pub const TOKEN: &str = "dummy123";
pub const RECONNECT_DELAY: Duration = Duration::from_millis(300);

/// Mock channel server that records every frame it receives and can drop all
/// connections on demand.
pub struct MockServer {
    addr: SocketAddr,
    /// Broadcast messages to ALL connected clients
    message_tx: broadcast::Sender<String>,
    /// Frames received from any client, in arrival order
    frame_rx: mpsc::UnboundedReceiver<String>,
    disconnect_signal: Arc<AtomicBool>,
}

impl MockServer {
    /// Start a mock server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (message_tx, _) = broadcast::channel::<String>(100);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<String>();
        let disconnect_signal = Arc::new(AtomicBool::new(false));

        let broadcast_tx = message_tx.clone();
        let disconnect = Arc::clone(&disconnect_signal);

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();
                let frame_tx = frame_tx.clone();
                let mut msg_rx = broadcast_tx.subscribe();
                let disconnect = Arc::clone(&disconnect);

                tokio::spawn(async move {
                    loop {
                        if disconnect.load(Ordering::SeqCst) {
                            break;
                        }

                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => {
                                        drop(frame_tx.send(text.to_string()));
                                    }
                                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                                    Some(Ok(_)) => {}
                                }
                            }
                            msg = msg_rx.recv() => {
                                match msg {
                                    Ok(text) => {
                                        if write.send(Message::Text(text.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(_) => break,
                                }
                            }
                            () = tokio::time::sleep(Duration::from_millis(50)) => {}
                        }
                    }
                });
            }
        });

        Self {
            addr,
            message_tx,
            frame_rx,
            disconnect_signal,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws/websocket", self.addr)
    }

    /// Send a message to all connected clients.
    pub fn send(&self, message: &str) {
        drop(self.message_tx.send(message.to_owned()));
    }

    /// Drop every open connection and refuse to serve new ones until
    /// [`MockServer::allow_reconnect`].
    pub fn disconnect_all(&self) {
        self.disconnect_signal.store(true, Ordering::SeqCst);
    }

    pub fn allow_reconnect(&self) {
        self.disconnect_signal.store(false, Ordering::SeqCst);
    }

    /// Receive the next frame from any client.
    pub async fn recv_frame(&mut self) -> Option<Value> {
        let text = timeout(Duration::from_secs(2), self.frame_rx.recv())
            .await
            .ok()
            .flatten()?;
        Some(serde_json::from_str(&text).unwrap())
    }

    /// Receive the next frame that is not a heartbeat.
    pub async fn recv_channel_frame(&mut self) -> Option<Value> {
        loop {
            let frame = self.recv_frame().await?;
            if frame["topic"] != "phoenix" {
                return Some(frame);
            }
        }
    }

    /// Discard everything received so far.
    pub fn drain(&mut self) {
        while self.frame_rx.try_recv().is_ok() {}
    }
}

/// Connection settings suited to a local server: fast reconnects and a heartbeat
/// long enough to stay out of the way unless a test overrides it.
#[must_use]
pub fn connection() -> Config {
    let mut connection = Config::default();
    connection.heartbeat_interval = Duration::from_secs(60);
    connection.connect_timeout = Some(Duration::from_secs(5));
    connection.reconnect.delay = Delay::Fixed(RECONNECT_DELAY);
    connection
}

#[must_use]
pub fn config(url: &str) -> ClientConfig {
    config_with(url, connection())
}

#[must_use]
pub fn config_with(url: &str, connection: Config) -> ClientConfig {
    ClientConfig::builder()
        .url(url)
        .token(TOKEN.to_owned())
        .connection(connection)
        .build()
}
