use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_stream::try_stream;
use futures::Stream;
use futures::StreamExt as _;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::dispatch::{ChannelEvent, dispatch};
use super::frame::{Frame, Payload};
use super::session::{JoinAuth, Session};
use crate::Result;
use crate::config::ClientConfig;
use crate::ws::{
    ConnectionState, Connector, ReconnectPolicy, Transport, TransportEvent, WsConnector, WsError,
};

/// Broadcast channel capacity for observed events.
const BROADCAST_CAPACITY: usize = 1024;

/// Persistent channel client.
///
/// One background driver task owns the transport, the membership set, the ref
/// counter and both timers. Handles talk to it over a command channel, so every
/// mutation happens in one place and frames leave in the order they were requested.
///
/// # Examples
///
/// ```rust, no_run
/// use phoenix_channel_client::channel::Client;
/// use phoenix_channel_client::config::ClientConfig;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = ClientConfig::builder()
///         .url("ws://localhost:4000/ws/websocket")
///         .token("dummy123".to_owned())
///         .build();
///     let lobby = config.topics().lobby();
///
///     let client = Client::start(config).await?;
///     client.join_topic(&lobby)?;
///
///     let mut events = client.events();
///     while let Ok(event) = events.recv().await {
///         println!("{event:?}");
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Configuration the driver was started with
    config: ClientConfig,
    /// Sender channel for commands to the driver
    commands: mpsc::UnboundedSender<Command>,
    /// Watch channel receiver for state changes
    state_rx: watch::Receiver<ConnectionState>,
    /// Broadcast sender for observed events
    events_tx: broadcast::Sender<ChannelEvent>,
}

impl Client {
    /// Connect over WebSocket with the configured reconnection policy and wait for the
    /// first open.
    ///
    /// Waits indefinitely unless [`crate::ws::config::Config::connect_timeout`] is set.
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let policy = config.connection().reconnect.policy();
        Self::start_with(config, WsConnector, policy).await
    }

    /// Like [`Client::start`], with a custom transport and reconnection policy.
    pub async fn start_with<C, R>(config: ClientConfig, connector: C, policy: R) -> Result<Self>
    where
        C: Connector,
        R: ReconnectPolicy,
    {
        let client = Self::spawn(config, connector, policy)?;

        match client.inner.config.connection().connect_timeout {
            Some(limit) => time::timeout(limit, client.opened())
                .await
                .map_err(|_e| WsError::Timeout)??,
            None => client.opened().await?,
        }

        Ok(client)
    }

    /// Spawn the driver without waiting for the connection to open.
    ///
    /// Must be called within a Tokio runtime.
    pub fn spawn<C, R>(config: ClientConfig, connector: C, policy: R) -> Result<Self>
    where
        C: Connector,
        R: ReconnectPolicy,
    {
        config.validate()?;

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let session = Session::new(JoinAuth {
            field: config.auth_field().to_owned(),
            token: config.token().clone(),
        });
        let driver = Driver {
            url: config.url().to_owned(),
            connector,
            policy,
            core: Core {
                session,
                commands: commands_rx,
                state_tx,
                events_tx: events_tx.clone(),
                heartbeat_interval: config.connection().heartbeat_interval,
            },
        };

        tokio::spawn(driver.run());

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                commands,
                state_rx,
                events_tx,
            }),
        })
    }

    /// Wait until the connection is open, or until `cancel` fires.
    pub async fn wait_until_connected(&self, cancel: &CancellationToken) -> Result<()> {
        tokio::select! {
            result = self.opened() => result,
            () = cancel.cancelled() => Err(WsError::Cancelled.into()),
        }
    }

    async fn opened(&self) -> Result<()> {
        let mut state_rx = self.inner.state_rx.clone();
        let state = *state_rx
            .wait_for(|state| state.is_connected() || state.is_closed())
            .await
            .map_err(|_e| WsError::ConnectionClosed)?;

        if state.is_connected() {
            Ok(())
        } else {
            Err(WsError::ConnectionClosed.into())
        }
    }

    /// Join `topic` with an empty payload.
    pub fn join_topic(&self, topic: &str) -> Result<()> {
        self.join_topic_with(topic, Payload::new())
    }

    /// Join `topic`. The configured credential is merged into `payload`.
    ///
    /// The topic is remembered immediately and rejoined on every reconnect; the join
    /// frame itself is only sent while connected.
    pub fn join_topic_with(&self, topic: &str, payload: Payload) -> Result<()> {
        self.command(Command::Join {
            topic: topic.to_owned(),
            payload,
        })
    }

    /// Leave `topic`. It will not be rejoined on reconnect.
    pub fn leave_topic(&self, topic: &str) -> Result<()> {
        self.command(Command::Leave {
            topic: topic.to_owned(),
        })
    }

    /// Send an application event on `topic`. Dropped with a warning while disconnected.
    pub fn push(&self, topic: &str, event: &str, payload: Payload) -> Result<()> {
        self.command(Command::Push {
            topic: topic.to_owned(),
            event: event.to_owned(),
            payload,
        })
    }

    /// Topics the client currently intends to be joined to.
    pub async fn topics(&self) -> Result<Vec<String>> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Topics(tx))?;
        Ok(rx.await.map_err(|_e| WsError::ConnectionClosed)?)
    }

    /// Forget every topic, stop all timers and close the transport. Terminal.
    ///
    /// Returns once the driver has shut down. Calling it again is a no-op.
    pub async fn disconnect(&self) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        if self.inner.commands.send(Command::Disconnect(tx)).is_err() {
            return Ok(());
        }
        // The driver may exit without acknowledging if it was already shutting down.
        _ = rx.await;
        Ok(())
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_rx.clone()
    }

    /// Subscribe to observed events.
    ///
    /// Each call returns a new independent receiver that sees events from this point on.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<ChannelEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Observed events as a stream. A lagging subscriber gets a
    /// [`WsError::Lagged`] item and then continues with newer events.
    pub fn event_stream(&self) -> impl Stream<Item = Result<ChannelEvent>> + use<> {
        let mut rx = self.events();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(event) => yield event,
                    Err(RecvError::Lagged(n)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Event subscriber lagged, missed {n} messages");
                        Err(WsError::Lagged { count: n })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    /// Observed events for one topic.
    pub fn topic_stream(&self, topic: &str) -> impl Stream<Item = Result<ChannelEvent>> + use<> {
        let topic = topic.to_owned();

        self.event_stream().filter(move |item| {
            let keep = match item {
                Ok(event) => event.topic() == topic,
                Err(_) => true,
            };
            futures::future::ready(keep)
        })
    }

    /// Configuration this client was started with.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    fn command(&self, command: Command) -> Result<()> {
        self.inner
            .commands
            .send(command)
            .map_err(|_e| WsError::ConnectionClosed)?;
        Ok(())
    }
}

/// Requests from [`Client`] handles to the driver.
enum Command {
    Join { topic: String, payload: Payload },
    Leave { topic: String },
    Push { topic: String, event: String, payload: Payload },
    Topics(oneshot::Sender<Vec<String>>),
    Disconnect(oneshot::Sender<()>),
}

/// The driver is stopping for good. Carries the disconnect acknowledgement, if
/// a handle asked for one.
struct Shutdown(Option<oneshot::Sender<()>>);

impl Shutdown {
    fn acknowledge(self) {
        if let Some(done) = self.0 {
            _ = done.send(());
        }
    }
}

/// How one connection's lifetime ended.
enum Served {
    Dropped,
    Shutdown(Shutdown),
}

/// State the driver touches while a connect attempt or retry delay is in flight.
struct Core {
    session: Session,
    commands: mpsc::UnboundedReceiver<Command>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<ChannelEvent>,
    heartbeat_interval: Duration,
}

impl Core {
    fn set_state(&self, state: ConnectionState) {
        _ = self.state_tx.send(state);
    }

    /// Wait for the next command and apply it to the session. A frame to send is
    /// only produced while connected.
    async fn next_command(&mut self) -> ControlFlow<Shutdown, Option<Frame>> {
        match self.commands.recv().await {
            Some(command) => self.apply(command),
            // Every handle is gone, nobody can observe us any more.
            None => ControlFlow::Break(Shutdown(None)),
        }
    }

    fn apply(&mut self, command: Command) -> ControlFlow<Shutdown, Option<Frame>> {
        match command {
            Command::Join { topic, payload } => {
                ControlFlow::Continue(self.session.join(&topic, payload))
            }
            Command::Leave { topic } => ControlFlow::Continue(self.session.leave(&topic)),
            Command::Push {
                topic,
                event,
                payload,
            } => ControlFlow::Continue(self.session.push(&topic, &event, payload)),
            Command::Topics(reply) => {
                _ = reply.send(self.session.membership().to_vec());
                ControlFlow::Continue(None)
            }
            Command::Disconnect(done) => ControlFlow::Break(Shutdown(Some(done))),
        }
    }

    fn receive(&self, text: &str) {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(%text, error = %e, "Failed to parse channel frame");
                #[cfg(not(feature = "tracing"))]
                let _ = (&text, &e);
                return;
            }
        };

        let event = dispatch(frame);
        #[cfg(feature = "tracing")]
        super::dispatch::report(&event);
        _ = self.events_tx.send(event);
    }
}

/// Owns the transport and runs the connect → serve → wait → reconnect cycle.
struct Driver<C: Connector, R: ReconnectPolicy> {
    url: String,
    connector: C,
    policy: R,
    core: Core,
}

impl<C: Connector, R: ReconnectPolicy> Driver<C, R> {
    async fn run(mut self) {
        let mut attempt = 0_u32;

        loop {
            self.core.set_state(ConnectionState::Connecting);

            let connected = {
                let connect = self.connector.connect(&self.url);
                tokio::pin!(connect);

                loop {
                    tokio::select! {
                        result = &mut connect => break Ok(result),
                        applied = self.core.next_command() => {
                            // Nothing is sent while connecting; joins are only recorded.
                            if let ControlFlow::Break(shutdown) = applied {
                                break Err(shutdown);
                            }
                        }
                    }
                }
            };

            match connected {
                Err(shutdown) => return self.finish(shutdown),
                Ok(Ok(transport)) => {
                    attempt = 0;
                    self.policy.reset();

                    if let Served::Shutdown(shutdown) = self.serve(transport).await {
                        return self.finish(shutdown);
                    }
                }
                Ok(Err(e)) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(url = %self.url, error = %e, "Unable to connect");
                    #[cfg(not(feature = "tracing"))]
                    let _ = &e;
                }
            }

            attempt = attempt.saturating_add(1);
            if let ControlFlow::Break(shutdown) = self.pause(attempt).await {
                return self.finish(shutdown);
            }
        }
    }

    /// Drive one open transport until it drops or the client shuts down.
    async fn serve(&mut self, mut transport: C::Transport) -> Served {
        let rejoins = self.core.session.on_open();
        self.core.set_state(ConnectionState::Connected {
            since: Instant::now(),
        });
        #[cfg(feature = "tracing")]
        tracing::info!(url = %self.url, rejoining = rejoins.len(), "Connected to channel server");

        let mut outcome = None;
        for frame in &rejoins {
            if send(&mut transport, frame).await.is_err() {
                outcome = Some(Served::Dropped);
                break;
            }
        }

        let period = self.core.heartbeat_interval;
        let mut heartbeat = time::interval_at(time::Instant::now() + period, period);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let outcome = match outcome {
            Some(outcome) => outcome,
            None => loop {
                tokio::select! {
                    event = transport.recv() => match event {
                        TransportEvent::Message(text) => self.core.receive(&text),
                        TransportEvent::Error(e) => {
                            // The close that follows, if any, drives the state change.
                            #[cfg(feature = "tracing")]
                            tracing::warn!(error = %e, "Transport error");
                            #[cfg(not(feature = "tracing"))]
                            let _ = &e;
                        }
                        TransportEvent::Closed => break Served::Dropped,
                    },
                    _ = heartbeat.tick() => {
                        if let Some(frame) = self.core.session.heartbeat()
                            && send(&mut transport, &frame).await.is_err()
                        {
                            break Served::Dropped;
                        }
                    }
                    applied = self.core.next_command() => match applied {
                        ControlFlow::Continue(Some(frame)) => {
                            if send(&mut transport, &frame).await.is_err() {
                                break Served::Dropped;
                            }
                        }
                        ControlFlow::Continue(None) => {}
                        ControlFlow::Break(shutdown) => {
                            if let Err(e) = transport.close().await {
                                #[cfg(feature = "tracing")]
                                tracing::debug!(error = %e, "Error closing transport");
                                #[cfg(not(feature = "tracing"))]
                                let _ = &e;
                            }
                            break Served::Shutdown(shutdown);
                        }
                    },
                }
            },
        };

        if matches!(outcome, Served::Dropped) {
            self.core.session.on_close();
            self.core.set_state(ConnectionState::Disconnected);
            #[cfg(feature = "tracing")]
            tracing::info!(url = %self.url, "Disconnected from channel server");
        }

        outcome
    }

    /// Wait out the policy's delay before the next attempt, still serving commands.
    async fn pause(&mut self, attempt: u32) -> ControlFlow<Shutdown> {
        let Some(delay) = self.policy.next_delay(attempt) else {
            #[cfg(feature = "tracing")]
            tracing::warn!(attempt, "Giving up on reconnecting");
            return ControlFlow::Break(Shutdown(None));
        };

        self.core.set_state(ConnectionState::Reconnecting { attempt });
        #[cfg(feature = "tracing")]
        tracing::info!(attempt, ?delay, "Attempting to reconnect");

        let sleep = time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = &mut sleep => return ControlFlow::Continue(()),
                applied = self.core.next_command() => {
                    if let ControlFlow::Break(shutdown) = applied {
                        return ControlFlow::Break(shutdown);
                    }
                }
            }
        }
    }

    fn finish(&mut self, shutdown: Shutdown) {
        self.core.session.disconnect();
        self.core.set_state(ConnectionState::Closed);
        #[cfg(feature = "tracing")]
        tracing::info!(url = %self.url, "Channel client closed");
        shutdown.acknowledge();
    }
}

async fn send<T: Transport>(transport: &mut T, frame: &Frame) -> Result<()> {
    let text = frame.encode()?;
    #[cfg(feature = "tracing")]
    tracing::debug!(topic = %frame.topic, event = %frame.event, reference = ?frame.reference, "Sending frame");

    transport.send(text).await.inspect_err(|e| {
        #[cfg(feature = "tracing")]
        tracing::warn!(error = %e, "Failed to send frame");
        #[cfg(not(feature = "tracing"))]
        let _ = e;
    })
}
