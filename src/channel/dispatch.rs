//! Inbound frame classification.
//!
//! Dispatch is purely observational: it turns a decoded [`Frame`] into a
//! [`ChannelEvent`] report and never touches connection or membership state.

use serde_json::Value;

use super::frame::{Frame, Payload, ProtocolEvent};

const STATUS_OK: &str = "ok";

/// What the client observed on the wire.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq)]
pub enum ChannelEvent {
    /// A `phx_reply` whose outer and inner `status` are both `"ok"`
    Acknowledged {
        topic: String,
        reference: Option<u64>,
    },
    /// Any other `phx_reply`
    Reply(Frame),
    /// A `phx_error` frame, kept whole for diagnostics
    ChannelError(Frame),
    /// Full presence snapshot for a topic
    PresenceState { topic: String, payload: Payload },
    /// Incremental presence change for a topic
    PresenceDiff { topic: String, payload: Payload },
    /// An application event whose payload carries both `id` and `state`
    Domain {
        event: String,
        topic: String,
        id: Value,
        state: Value,
    },
    /// Any other frame
    Raw(Frame),
}

impl ChannelEvent {
    /// Topic the reported frame arrived on.
    #[must_use]
    pub fn topic(&self) -> &str {
        match self {
            Self::Acknowledged { topic, .. }
            | Self::PresenceState { topic, .. }
            | Self::PresenceDiff { topic, .. }
            | Self::Domain { topic, .. } => topic,
            Self::Reply(frame) | Self::ChannelError(frame) | Self::Raw(frame) => &frame.topic,
        }
    }
}

/// Classify a decoded frame.
#[must_use]
pub fn dispatch(frame: Frame) -> ChannelEvent {
    match frame.protocol_event() {
        Some(ProtocolEvent::Reply) => {
            if is_ok_reply(&frame.payload) {
                ChannelEvent::Acknowledged {
                    topic: frame.topic,
                    reference: frame.reference,
                }
            } else {
                ChannelEvent::Reply(frame)
            }
        }
        Some(ProtocolEvent::Error) => ChannelEvent::ChannelError(frame),
        Some(ProtocolEvent::PresenceState) => ChannelEvent::PresenceState {
            topic: frame.topic,
            payload: frame.payload,
        },
        Some(ProtocolEvent::PresenceDiff) => ChannelEvent::PresenceDiff {
            topic: frame.topic,
            payload: frame.payload,
        },
        _ => domain_or_raw(frame),
    }
}

fn is_ok_reply(payload: &Payload) -> bool {
    let outer = payload.get("status").and_then(Value::as_str);
    let inner = payload
        .get("response")
        .and_then(|response| response.get("status"))
        .and_then(Value::as_str);

    outer == Some(STATUS_OK) && inner == Some(STATUS_OK)
}

fn domain_or_raw(frame: Frame) -> ChannelEvent {
    match (frame.payload.get("id"), frame.payload.get("state")) {
        (Some(id), Some(state)) => ChannelEvent::Domain {
            id: id.clone(),
            state: state.clone(),
            event: frame.event,
            topic: frame.topic,
        },
        _ => ChannelEvent::Raw(frame),
    }
}

/// Log a report at the level its kind deserves.
#[cfg(feature = "tracing")]
pub(crate) fn report(event: &ChannelEvent) {
    match event {
        ChannelEvent::Acknowledged { topic, reference } => {
            tracing::info!(%topic, ?reference, "Message acknowledged");
        }
        ChannelEvent::Reply(frame) => {
            tracing::debug!(topic = %frame.topic, reference = ?frame.reference, payload = ?frame.payload, "Received reply");
        }
        ChannelEvent::ChannelError(frame) => {
            tracing::error!(?frame, "Channel error");
        }
        ChannelEvent::PresenceState { topic, payload } => {
            tracing::info!(%topic, ?payload, "Presence state update");
        }
        ChannelEvent::PresenceDiff { topic, payload } => {
            tracing::info!(%topic, ?payload, "Presence change");
        }
        ChannelEvent::Domain {
            event,
            topic,
            id,
            state,
        } => {
            tracing::info!(event_name = %event, %topic, %id, %state, "Received domain event");
        }
        ChannelEvent::Raw(frame) => {
            tracing::info!(?frame, "Received message");
        }
    }
}
