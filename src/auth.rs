//! Login: trade a username and password for a session.

use serde::Deserialize;
use tracing::info;

use crate::config::{Credentials, RobinConfig};
use crate::error::RobinError;
use crate::http::{HttpClient, HttpRequest};

/// Authenticated token pair for one login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    /// Value of the session cookie.
    pub session_token: String,
    /// Anti-forgery token sent as `x-modhash` on mutating calls.
    pub modhash: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("session_token", &"<redacted>")
            .field("modhash", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    json: LoginBody,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    cookie: Option<String>,
    modhash: Option<String>,
}

/// Log in with one form POST. Not retried.
pub async fn login(
    http: &dyn HttpClient,
    config: &RobinConfig,
    credentials: &Credentials,
) -> Result<Session, RobinError> {
    info!(user = %credentials.username, "Logging in...");

    let url = login_url(config, &credentials.username)?;
    let request = HttpRequest::post(url)
        .field("op", "login")
        .field("user", credentials.username.as_str())
        .field("passwd", credentials.password.as_str())
        .field("api_type", "json");

    let resp = http.execute(request).await?;
    if resp.status == 401 || resp.status == 403 {
        return Err(RobinError::Auth(format!("credentials rejected (HTTP {})", resp.status)));
    }
    let resp = resp.error_for_status()?;
    let session = parse_login_response(&resp.body)?;

    info!("Logged in. Session and modhash retrieved.");
    Ok(session)
}

// The username is one path segment, percent-encoded so it cannot alter the
// endpoint.
fn login_url(config: &RobinConfig, username: &str) -> Result<String, RobinError> {
    let mut url = reqwest::Url::parse(&config.url("/api/login"))
        .map_err(|e| RobinError::Config(format!("invalid base_url: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| RobinError::Config("base_url cannot carry a path".into()))?
        .push(username);
    Ok(url.into())
}

/// Pull the session tokens out of a login response body.
pub fn parse_login_response(body: &str) -> Result<Session, RobinError> {
    let envelope: LoginEnvelope = serde_json::from_str(body)
        .map_err(|e| RobinError::Auth(format!("unexpected login response: {e}")))?;

    if !envelope.json.errors.is_empty() {
        let reasons: Vec<String> = envelope.json.errors.iter().map(describe_error).collect();
        return Err(RobinError::Auth(reasons.join("; ")));
    }

    let data = envelope
        .json
        .data
        .ok_or_else(|| RobinError::Auth("login response has no data".into()))?;

    match (data.cookie, data.modhash) {
        (Some(cookie), Some(modhash)) if !cookie.is_empty() && !modhash.is_empty() => Ok(Session {
            session_token: cookie,
            modhash,
        }),
        _ => Err(RobinError::Auth("login response lacks cookie or modhash".into())),
    }
}

// Server errors arrive as ["CODE", "message", "field"] triples.
fn describe_error(err: &serde_json::Value) -> String {
    match err.as_array() {
        Some(parts) => parts
            .iter()
            .filter_map(|p| p.as_str())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(": "),
        None => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_login_success() {
        let body = r#"{"json":{"errors":[],"data":{"need_https":true,"modhash":"mh1","cookie":"ck1"}}}"#;
        let session = parse_login_response(body).unwrap();
        assert_eq!(session.session_token, "ck1");
        assert_eq!(session.modhash, "mh1");
    }

    #[test]
    fn test_parse_login_server_errors() {
        let body = r#"{"json":{"errors":[["WRONG_PASSWORD","wrong password","passwd"]]}}"#;
        match parse_login_response(body) {
            Err(RobinError::Auth(msg)) => {
                assert!(msg.contains("WRONG_PASSWORD"));
                assert!(msg.contains("wrong password"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_login_missing_data() {
        let body = r#"{"json":{"errors":[]}}"#;
        assert!(matches!(parse_login_response(body), Err(RobinError::Auth(_))));
    }

    #[test]
    fn test_parse_login_missing_modhash() {
        let body = r#"{"json":{"data":{"cookie":"ck1"}}}"#;
        assert!(matches!(parse_login_response(body), Err(RobinError::Auth(_))));
    }

    #[test]
    fn test_parse_login_not_json() {
        assert!(matches!(parse_login_response("<html>"), Err(RobinError::Auth(_))));
    }

    #[test]
    fn test_login_url_plain_username() {
        let url = login_url(&RobinConfig::default(), "alice").unwrap();
        assert_eq!(url, "https://www.reddit.com/api/login/alice");
    }

    #[test]
    fn test_login_url_escapes_username() {
        let url = login_url(&RobinConfig::default(), "a/b?c#d").unwrap();
        assert_eq!(url, "https://www.reddit.com/api/login/a%2Fb%3Fc%23d");
    }

    #[test]
    fn test_session_debug_hides_tokens() {
        let session = Session { session_token: "secret".into(), modhash: "mh".into() };
        assert!(!format!("{:?}", session).contains("secret"));
    }
}
