//! Outbound room actions: chat messages, emotes and votes.

use std::sync::Arc;
use tokio::sync::watch;

use crate::auth::Session;
use crate::config::RobinConfig;
use crate::error::RobinError;
use crate::http::{HttpClient, HttpRequest, HttpResponse};
use crate::setup::RoomSetup;

/// The session and the room setup that belongs to it, published together.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomContext {
    pub session: Session,
    pub setup: RoomSetup,
}

/// A vote on the room's fate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteChoice {
    /// Merge with another room.
    Increase,
    /// Stay as is.
    Continue,
    /// Leave the room.
    Abandon,
    /// Any other value; sent verbatim.
    Other(String),
}

impl VoteChoice {
    pub fn as_str(&self) -> &str {
        match self {
            VoteChoice::Increase => "INCREASE",
            VoteChoice::Continue => "CONTINUE",
            VoteChoice::Abandon => "ABANDON",
            VoteChoice::Other(s) => s,
        }
    }
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for VoteChoice {
    fn from(s: &str) -> Self {
        match s {
            "INCREASE" => VoteChoice::Increase,
            "CONTINUE" => VoteChoice::Continue,
            "ABANDON" => VoteChoice::Abandon,
            other => VoteChoice::Other(other.to_string()),
        }
    }
}

impl From<String> for VoteChoice {
    fn from(s: String) -> Self {
        VoteChoice::from(s.as_str())
    }
}

/// Cloneable handle for posting to the current room.
///
/// Every call reads the room context at the moment it is made, so after a
/// merge the same handle posts to the new room. If the rejoin fails there
/// is no room, and calls return [`RobinError::NotInitialized`].
#[derive(Clone)]
pub struct RoomActions {
    http: Arc<dyn HttpClient>,
    config: Arc<RobinConfig>,
    context: watch::Receiver<Option<Arc<RoomContext>>>,
}

impl RoomActions {
    pub(crate) fn new(
        http: Arc<dyn HttpClient>,
        config: Arc<RobinConfig>,
        context: watch::Receiver<Option<Arc<RoomContext>>>,
    ) -> Self {
        Self { http, config, context }
    }

    /// The room context actions currently target, if any.
    pub fn current(&self) -> Option<Arc<RoomContext>> {
        self.context.borrow().clone()
    }

    /// Post a chat message.
    pub async fn send(&self, message: &str) -> Result<HttpResponse, RobinError> {
        self.post_room("message", "message", message).await
    }

    /// Post an emote, shown as `/me <message>`.
    pub async fn send_me(&self, message: &str) -> Result<HttpResponse, RobinError> {
        self.send(&format!("/me {message}")).await
    }

    /// Cast a vote. The choice is not validated locally.
    pub async fn vote(&self, choice: impl Into<VoteChoice>) -> Result<HttpResponse, RobinError> {
        let choice = choice.into();
        self.post_room("vote", "vote", choice.as_str()).await
    }

    async fn post_room(
        &self,
        action: &str,
        field: &str,
        value: &str,
    ) -> Result<HttpResponse, RobinError> {
        let ctx = self.current().ok_or(RobinError::NotInitialized)?;
        let room_id = ctx.setup.room_id.as_str();

        let request = HttpRequest::post(self.config.url(&format!("/api/robin/{room_id}/{action}")))
            .header("cookie", self.config.cookie_header(&ctx.session.session_token))
            .header("x-modhash", ctx.session.modhash.as_str())
            .field(field, value)
            .field("room_id", room_id)
            .field("api_type", "json");

        self.http.execute(request).await?.error_for_status()
    }
}
