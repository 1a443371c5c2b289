//! # robin-bot
//!
//! Session client for the Robin group-chat API. It logs in, finds the room
//! the account is in (joining one when needed), streams the room socket and
//! rejoins transparently when the server merges two rooms.
//!
//! ```rust,ignore
//! let mut client = RobinClient::new(RobinConfig::default(), Credentials::new("bot", "secret"))?;
//! let actions = client.actions();
//! client.on_command("ping", move |_args, from| {
//!     let actions = actions.clone();
//!     let reply = format!("pong, {from}");
//!     tokio::spawn(async move { actions.send(&reply).await });
//! });
//! client.init().await?;
//! client.run().await?;
//! ```

pub mod actions;
pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod dice;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod setup;
pub mod transport;

pub use actions::{RoomActions, RoomContext, VoteChoice};
pub use auth::Session;
pub use client::{ConnectionState, RobinClient};
pub use config::{Credentials, RobinConfig};
pub use dispatch::{Command, Dispatch, Dispatcher, InboundFrame, Listeners, Route, SubscriptionId};
pub use error::RobinError;
pub use setup::RoomSetup;
