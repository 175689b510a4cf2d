//! Connection-independent protocol state.
//!
//! [`Session`] owns the membership set and the ref counter and decides which
//! frames to emit for each lifecycle event or client request. It performs no
//! I/O, so every ordering rule can be checked synchronously.

use secrecy::{ExposeSecret as _, SecretString};
use serde_json::Value;

use super::frame::{Frame, Payload, ProtocolEvent};
use super::membership::Membership;

/// Strictly increasing correlation numbers, starting at 1 and never reused.
#[derive(Debug)]
pub struct RefCounter {
    next: u64,
}

impl Default for RefCounter {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl RefCounter {
    pub fn next(&mut self) -> u64 {
        let reference = self.next;
        self.next += 1;
        reference
    }
}

/// Credential merged into every join payload.
#[derive(Debug, Clone)]
pub struct JoinAuth {
    pub field: String,
    pub token: SecretString,
}

/// Protocol state shared by all connections of one client.
#[derive(Debug)]
pub struct Session {
    connected: bool,
    closed: bool,
    membership: Membership,
    refs: RefCounter,
    auth: JoinAuth,
}

impl Session {
    #[must_use]
    pub fn new(auth: JoinAuth) -> Self {
        Self {
            connected: false,
            closed: false,
            membership: Membership::new(),
            refs: RefCounter::default(),
            auth,
        }
    }

    #[must_use]
    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    /// A transport reported open. Returns one join frame per member topic.
    ///
    /// After [`Session::disconnect`] this is ignored and returns nothing.
    pub fn on_open(&mut self) -> Vec<Frame> {
        if self.closed {
            return Vec::new();
        }
        self.connected = true;

        let topics = self.membership.to_vec();
        topics
            .iter()
            .map(|topic| self.join_frame(topic, Payload::new()))
            .collect()
    }

    /// The transport went away.
    pub fn on_close(&mut self) {
        self.connected = false;
    }

    /// Record intent to join `topic` and build the join frame if connected.
    ///
    /// A topic that is already a member gets another join frame.
    pub fn join(&mut self, topic: &str, payload: Payload) -> Option<Frame> {
        if self.closed {
            return None;
        }
        self.membership.insert(topic);

        if !self.connected {
            #[cfg(feature = "tracing")]
            tracing::debug!(%topic, "Not connected, join will be sent on next open");
            return None;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(%topic, "Joining topic");
        Some(self.join_frame(topic, payload))
    }

    /// Drop intent to be joined to `topic` and build the leave frame if connected.
    pub fn leave(&mut self, topic: &str) -> Option<Frame> {
        self.membership.remove(topic);

        if !self.connected {
            #[cfg(feature = "tracing")]
            tracing::debug!(%topic, "Not connected, leave recorded without sending");
            return None;
        }

        #[cfg(feature = "tracing")]
        tracing::info!(%topic, "Leaving topic");
        Some(Frame::new(
            topic,
            ProtocolEvent::Leave.to_string(),
            Payload::new(),
            Some(self.refs.next()),
        ))
    }

    /// Build the next heartbeat frame if connected.
    pub fn heartbeat(&mut self) -> Option<Frame> {
        if !self.connected {
            return None;
        }
        Some(Frame::heartbeat(self.refs.next()))
    }

    /// Build an application frame if connected.
    pub fn push(&mut self, topic: &str, event: &str, payload: Payload) -> Option<Frame> {
        if !self.connected {
            #[cfg(feature = "tracing")]
            tracing::warn!(%topic, %event, "Cannot send message: not connected");
            return None;
        }
        Some(Frame::new(topic, event, payload, Some(self.refs.next())))
    }

    /// Explicit teardown: forget every topic and refuse to reconnect.
    pub fn disconnect(&mut self) {
        self.membership.clear();
        self.connected = false;
        self.closed = true;
    }

    fn join_frame(&mut self, topic: &str, mut payload: Payload) -> Frame {
        payload.insert(
            self.auth.field.clone(),
            Value::String(self.auth.token.expose_secret().to_owned()),
        );
        Frame::new(
            topic,
            ProtocolEvent::Join.to_string(),
            payload,
            Some(self.refs.next()),
        )
    }
}
