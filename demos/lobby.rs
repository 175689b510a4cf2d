//! Joins the lobby and one game topic, then logs every observed event until Ctrl-C.
//!
//! Run with tracing enabled:
//! ```sh
//! RUST_LOG=info cargo run --example lobby
//! ```
//!
//! The endpoint and credential default to a local development server and can be
//! overridden with `PHOENIX_CHANNEL_URL` and `PHOENIX_CHANNEL_TOKEN`. Pass a game id
//! as the first argument to also join `games:<id>`.

use futures::StreamExt as _;
use phoenix_channel_client::channel::{ChannelEvent, Client};
use phoenix_channel_client::config::ClientConfig;
use phoenix_channel_client::{DEFAULT_URL, TOKEN_VAR, URL_VAR};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let url = std::env::var(URL_VAR).unwrap_or_else(|_| DEFAULT_URL.to_owned());
    let token = std::env::var(TOKEN_VAR).unwrap_or_else(|_| "dummy123".to_owned());

    let config = ClientConfig::builder().url(url).token(token).build();
    let topics = config.topics().clone();

    let client = Client::start(config).await?;
    info!(state = ?client.state(), "Connected");

    client.join_topic(&topics.lobby())?;
    if let Some(game) = std::env::args().nth(1) {
        client.join_topic(&topics.entity(game))?;
    }

    let mut events = Box::pin(client.event_stream());
    loop {
        tokio::select! {
            item = events.next() => match item {
                Some(Ok(ChannelEvent::Domain { event, topic, id, state })) => {
                    info!(%topic, event_name = %event, %id, %state, "Domain event");
                }
                Some(Ok(event)) => debug!(?event),
                Some(Err(e)) => warn!(error = %e, "Event stream error"),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    error!(error = %e, "Unable to listen for Ctrl-C");
                }
                break;
            }
        }
    }

    info!(topics = ?client.topics().await?, "Disconnecting");
    client.disconnect().await?;

    Ok(())
}
