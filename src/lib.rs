#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod channel;
pub mod config;
pub mod error;
pub mod ws;

use crate::error::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Default endpoint a local Phoenix server exposes its socket on
pub const DEFAULT_URL: &str = "ws://localhost:4000/ws/websocket";

/// Environment variable read for the endpoint by the bundled demo
pub const URL_VAR: &str = "PHOENIX_CHANNEL_URL";

/// Environment variable read for the join credential by the bundled demo
pub const TOKEN_VAR: &str = "PHOENIX_CHANNEL_TOKEN";
