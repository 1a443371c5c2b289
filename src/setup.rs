//! Room setup resolution.
//!
//! The room page is an HTML document that embeds its connection parameters
//! as the argument of an `r.setup({...})` call. Resolving a setup means
//! fetching that page (joining a room first if the server redirects us to
//! the join page) and lifting the embedded object out of it.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::auth::Session;
use crate::config::RobinConfig;
use crate::error::RobinError;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// Marker around the embedded setup object. The capture is the object body
/// with its outer braces removed, so they must be put back before parsing.
static SETUP_MARKER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)r\.setup\(\{(.*?)\}\)").expect("setup marker regex is valid")
});

const WEBSOCKET_URL_KEY: &str = "robin_websocket_url";
const ROOM_NAME_KEY: &str = "robin_room_name";
const ROOM_ID_KEY: &str = "robin_room_id";

/// Connection parameters of the room the user is currently in.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomSetup {
    pub websocket_url: String,
    pub room_name: String,
    pub room_id: String,
    /// The full object as the server sent it, including the keys above.
    pub raw: Map<String, Value>,
}

impl RoomSetup {
    /// Build a setup from the embedded object. The three connection keys
    /// must be present as strings.
    pub fn from_map(raw: Map<String, Value>) -> Result<Self, RobinError> {
        let websocket_url = required_str(&raw, WEBSOCKET_URL_KEY)?;
        let room_name = required_str(&raw, ROOM_NAME_KEY)?;
        let room_id = required_str(&raw, ROOM_ID_KEY)?;
        Ok(Self {
            websocket_url,
            room_name,
            room_id,
            raw,
        })
    }

    /// Room name cut to at most `max_chars` characters, for display.
    pub fn display_name(&self, max_chars: usize) -> &str {
        match self.room_name.char_indices().nth(max_chars) {
            Some((idx, _)) => &self.room_name[..idx],
            None => &self.room_name,
        }
    }
}

fn required_str(raw: &Map<String, Value>, key: &str) -> Result<String, RobinError> {
    raw.get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| RobinError::Setup(format!("setup payload has no string '{key}'")))
}

/// Extract the object embedded as `r.setup({...})` in `document`.
pub fn extract_setup_payload(document: &str) -> Result<Map<String, Value>, RobinError> {
    let inner = SETUP_MARKER
        .captures(document)
        .and_then(|c| c.get(1))
        .ok_or_else(|| RobinError::Setup("room page has no r.setup({...}) payload".into()))?;

    let text = format!("{{{}}}", inner.as_str());
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(RobinError::Setup("setup payload is not an object".into())),
        Err(e) => Err(RobinError::Setup(format!("setup payload is not valid JSON: {e}"))),
    }
}

/// Fetch the current room's setup.
///
/// When the room page redirects to the join page, one join call is made and
/// the page is fetched once more. A second redirect is an error.
pub async fn retrieve_setup(
    http: &dyn HttpClient,
    config: &RobinConfig,
    session: &Session,
) -> Result<RoomSetup, RobinError> {
    info!("Retrieving setup information...");

    let first = fetch_room_page(http, config, session).await?;
    let page = if is_join_redirect(&first, config) {
        info!("User is not in a room, joining one...");
        join_room(http, config, session).await?;

        let second = fetch_room_page(http, config, session).await?;
        if is_join_redirect(&second, config) {
            return Err(RobinError::Setup("still not in a room after joining".into()));
        }
        second
    } else {
        first
    };

    let setup = RoomSetup::from_map(extract_setup_payload(&page.body)?)?;
    debug!(room_id = %setup.room_id, url = %setup.websocket_url, "setup resolved");
    Ok(setup)
}

async fn fetch_room_page(
    http: &dyn HttpClient,
    config: &RobinConfig,
    session: &Session,
) -> Result<HttpResponse, RobinError> {
    let request = HttpRequest::get(config.url(&config.room_path))
        .header("cookie", config.cookie_header(&session.session_token));
    http.execute(request).await?.error_for_status()
}

async fn join_room(
    http: &dyn HttpClient,
    config: &RobinConfig,
    session: &Session,
) -> Result<(), RobinError> {
    let request = HttpRequest::post(config.url("/api/join_room"))
        .header("cookie", config.cookie_header(&session.session_token))
        .header("x-modhash", session.modhash.as_str());
    http.execute(request).await?.error_for_status()?;
    Ok(())
}

fn is_join_redirect(resp: &HttpResponse, config: &RobinConfig) -> bool {
    let target = config.join_redirect_path.trim_end_matches('/');
    resp.final_path()
        .map(|p| p.trim_end_matches('/') == target)
        .unwrap_or(false)
}
