#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests"
)]

mod common;

use std::time::Duration;

use common::{MockServer, RECONNECT_DELAY, TOKEN, config, config_with, connection};
use futures_util::StreamExt as _;
use phoenix_channel_client::channel::{ChannelEvent, Client};
use phoenix_channel_client::error::Kind;
use phoenix_channel_client::ws::WsError;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

async fn next_event(events: &mut broadcast::Receiver<ChannelEvent>) -> ChannelEvent {
    timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap()
}

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn start_waits_for_open() {
        let server = MockServer::start().await;

        let client = Client::start(config(&server.ws_url())).await.unwrap();

        assert!(client.state().is_connected());
        assert!(client.topics().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn start_times_out_against_unreachable_server() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut connection = connection();
        connection.connect_timeout = Some(Duration::from_millis(500));
        let url = format!("ws://{addr}/ws/websocket");

        let result = Client::start(config_with(&url, connection)).await;

        let error = result.err().unwrap();
        assert_eq!(error.kind(), Kind::WebSocket);
        assert!(matches!(
            error.downcast_ref::<WsError>(),
            Some(WsError::Timeout)
        ));
    }

    #[tokio::test]
    async fn invalid_url_is_rejected_before_connecting() {
        let result = Client::start(config("http://localhost:4000/ws")).await;

        assert_eq!(result.err().unwrap().kind(), Kind::Validation);
    }

    #[tokio::test]
    async fn disconnect_stops_everything() {
        let mut server = MockServer::start().await;
        let mut connection = connection();
        connection.heartbeat_interval = Duration::from_millis(100);
        let client = Client::start(config_with(&server.ws_url(), connection))
            .await
            .unwrap();
        client.join_topic("games:lobby").unwrap();
        server.recv_channel_frame().await.unwrap();

        client.disconnect().await.unwrap();
        assert!(client.state().is_closed());
        tokio::time::sleep(RECONNECT_DELAY * 2).await;
        server.drain();

        // No heartbeats, no rejoins.
        assert!(server.recv_frame().await.is_none());
        assert_eq!(
            client.join_topic("games:lobby").unwrap_err().kind(),
            Kind::WebSocket
        );
    }
}

mod membership {
    use super::*;

    #[tokio::test]
    async fn join_carries_credential_and_fresh_ref() {
        let mut server = MockServer::start().await;
        let client = Client::start(config(&server.ws_url())).await.unwrap();

        client.join_topic("games:lobby").unwrap();
        let join = server.recv_channel_frame().await.unwrap();

        assert_eq!(join["topic"], "games:lobby");
        assert_eq!(join["event"], "phx_join");
        assert_eq!(join["payload"], json!({"api_key": TOKEN}));
        assert_eq!(join["ref"], 1);

        client.leave_topic("games:lobby").unwrap();
        let leave = server.recv_channel_frame().await.unwrap();

        assert_eq!(leave["event"], "phx_leave");
        assert_eq!(leave["payload"], json!({}));
        assert_eq!(leave["ref"], 2);
    }

    #[tokio::test]
    async fn rejoins_current_members_after_reconnect() {
        let mut server = MockServer::start().await;
        let client = Client::start(config(&server.ws_url())).await.unwrap();

        client.join_topic("games:1").unwrap();
        client.join_topic("games:2").unwrap();
        server.recv_channel_frame().await.unwrap();
        server.recv_channel_frame().await.unwrap();

        server.disconnect_all();
        let mut state = client.state_receiver();
        state.wait_for(|s| !s.is_connected()).await.unwrap();

        client.leave_topic("games:1").unwrap();
        client.join_topic("games:3").unwrap();
        server.allow_reconnect();

        let first = server.recv_channel_frame().await.unwrap();
        let second = server.recv_channel_frame().await.unwrap();
        assert_eq!(
            (first["event"].as_str(), first["topic"].as_str()),
            (Some("phx_join"), Some("games:2"))
        );
        assert_eq!(
            (second["event"].as_str(), second["topic"].as_str()),
            (Some("phx_join"), Some("games:3"))
        );
        assert!(first["ref"].as_u64().unwrap() > 2);

        // Exactly once per member.
        assert!(server.recv_channel_frame().await.is_none());
        assert_eq!(client.topics().await.unwrap(), vec!["games:2", "games:3"]);
    }
}

mod heartbeat {
    use super::*;

    #[tokio::test]
    async fn heartbeats_on_reserved_topic_with_increasing_refs() {
        let mut server = MockServer::start().await;
        let mut connection = connection();
        connection.heartbeat_interval = Duration::from_millis(100);
        let _client = Client::start(config_with(&server.ws_url(), connection))
            .await
            .unwrap();

        let mut refs = Vec::new();
        for _ in 0..3 {
            let frame = server.recv_frame().await.unwrap();
            assert_eq!(frame["topic"], "phoenix");
            assert_eq!(frame["event"], "heartbeat");
            assert_eq!(frame["payload"], json!({}));
            refs.push(frame["ref"].as_u64().unwrap());
        }

        assert!(refs.windows(2).all(|w| w[0] < w[1]), "{refs:?}");
    }
}

mod dispatch {
    use super::*;

    #[tokio::test]
    async fn inbound_frames_are_classified_and_broadcast() {
        let server = MockServer::start().await;
        let client = Client::start(config(&server.ws_url())).await.unwrap();
        let mut events = client.events();

        server.send(
            &json!({
                "topic": "games:42",
                "event": "phx_reply",
                "payload": {"status": "ok", "response": {"status": "ok"}},
                "ref": 1
            })
            .to_string(),
        );
        server.send("this is not json");
        server.send(
            &json!({
                "topic": "games:42",
                "event": "state_update",
                "payload": {"id": "42", "state": "playing"},
                "ref": null
            })
            .to_string(),
        );
        server.send(
            &json!({
                "topic": "games:lobby",
                "event": "presence_diff",
                "payload": {"joins": {}, "leaves": {}},
                "ref": null
            })
            .to_string(),
        );

        assert_eq!(
            next_event(&mut events).await,
            ChannelEvent::Acknowledged {
                topic: "games:42".to_owned(),
                reference: Some(1),
            }
        );
        assert_eq!(
            next_event(&mut events).await,
            ChannelEvent::Domain {
                event: "state_update".to_owned(),
                topic: "games:42".to_owned(),
                id: json!("42"),
                state: json!("playing"),
            }
        );
        assert!(matches!(next_event(&mut events).await, ChannelEvent::PresenceDiff { .. }));
        assert!(client.state().is_connected());
    }

    #[tokio::test]
    async fn topic_stream_only_yields_its_topic() {
        let server = MockServer::start().await;
        let client = Client::start(config(&server.ws_url())).await.unwrap();
        let mut stream = Box::pin(client.topic_stream("games:2"));

        for topic in ["games:1", "games:2"] {
            server.send(
                &json!({"topic": topic, "event": "tick", "payload": {"n": 1}, "ref": null})
                    .to_string(),
            );
        }

        let event = timeout(Duration::from_secs(2), stream.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let ChannelEvent::Raw(frame) = event else {
            panic!("expected a raw frame, got {event:?}");
        };
        assert_eq!(frame.topic, "games:2");
        assert_eq!(frame.payload["n"], Value::from(1));
    }
}
