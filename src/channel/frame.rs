//! Wire frames of the channel protocol.
//!
//! Every message in either direction is a JSON object with exactly four
//! fields: `topic`, `event`, `payload` and `ref`.

use std::fmt;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;
use crate::ws::WsError;

/// Open-schema payload carried by every frame.
pub type Payload = Map<String, Value>;

/// Reserved topic heartbeats are sent on.
pub const HEARTBEAT_TOPIC: &str = "phoenix";

/// Event names reserved by the protocol.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::EnumString,
)]
pub enum ProtocolEvent {
    #[strum(serialize = "phx_join")]
    Join,
    #[strum(serialize = "phx_leave")]
    Leave,
    #[strum(serialize = "phx_reply")]
    Reply,
    #[strum(serialize = "phx_error")]
    Error,
    #[strum(serialize = "heartbeat")]
    Heartbeat,
    #[strum(serialize = "presence_state")]
    PresenceState,
    #[strum(serialize = "presence_diff")]
    PresenceDiff,
}

/// One message unit exchanged over the transport.
///
/// # Security
///
/// Join frames carry the configured credential in their payload. Avoid logging
/// outbound frames with `Debug`.
#[non_exhaustive]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Logical channel this frame belongs to
    pub topic: String,
    /// Message kind, either a [`ProtocolEvent`] name or an application event
    pub event: String,
    /// Event-specific data. Absent and `null` both decode as empty.
    #[serde(default, deserialize_with = "deserialize_payload")]
    pub payload: Payload,
    /// Correlation number set by the sender and echoed by the server on replies
    #[serde(rename = "ref", default, deserialize_with = "deserialize_ref")]
    pub reference: Option<u64>,
}

impl Frame {
    #[must_use]
    pub fn new<T: Into<String>, E: Into<String>>(
        topic: T,
        event: E,
        payload: Payload,
        reference: Option<u64>,
    ) -> Self {
        Self {
            topic: topic.into(),
            event: event.into(),
            payload,
            reference,
        }
    }

    /// Heartbeat frame on the reserved [`HEARTBEAT_TOPIC`].
    #[must_use]
    pub fn heartbeat(reference: u64) -> Self {
        Self::new(
            HEARTBEAT_TOPIC,
            ProtocolEvent::Heartbeat.to_string(),
            Payload::new(),
            Some(reference),
        )
    }

    /// The reserved event this frame carries, if any.
    #[must_use]
    pub fn protocol_event(&self) -> Option<ProtocolEvent> {
        self.event.parse().ok()
    }

    /// Serialize to the JSON text sent over the transport.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse JSON text received from the transport.
    pub fn decode(text: &str) -> Result<Self> {
        let de = &mut serde_json::Deserializer::from_str(text);
        let frame = serde_path_to_error::deserialize(&mut *de).map_err(|e| {
            let path = e.path().to_string();
            WsError::InvalidMessage(format!("{path}: {}", e.into_inner()))
        })?;
        de.end().map_err(|e| WsError::InvalidMessage(e.to_string()))?;

        Ok(frame)
    }
}

fn deserialize_payload<'de, D>(deserializer: D) -> std::result::Result<Payload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Payload>::deserialize(deserializer)?.unwrap_or_default())
}

/// Servers echo the ref in the type the client sent, but some serializers
/// stringify it. Accept integers, numeric strings and `null`.
fn deserialize_ref<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct RefVisitor;

    impl<'de> Visitor<'de> for RefVisitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a non-negative integer, a numeric string or null")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Self::Value, E> {
            u64::try_from(v)
                .map(Some)
                .map_err(|_e| E::invalid_value(de::Unexpected::Signed(v), &self))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            v.parse()
                .map(Some)
                .map_err(|_e| E::invalid_value(de::Unexpected::Str(v), &self))
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(
            self,
            deserializer: D,
        ) -> std::result::Result<Self::Value, D::Error> {
            deserializer.deserialize_any(self)
        }
    }

    deserializer.deserialize_option(RefVisitor)
}
