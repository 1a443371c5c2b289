//! Scripted in-memory HTTP and socket doubles shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use robin_bot::error::RobinError;
use robin_bot::http::{HttpClient, HttpRequest, HttpResponse, Method};
use robin_bot::transport::{Connection, Transport};

pub const BASE: &str = "https://chat.test";

/// Ordered record of everything the doubles and handlers saw.
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Answers requests from per-route queues. The last response of a queue is
/// repeated once the others are used up.
pub struct ScriptedHttp {
    routes: Mutex<HashMap<(Method, String), VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
    journal: Journal,
}

impl ScriptedHttp {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            journal,
        })
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, final_path: &str, body: &str) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(HttpResponse {
                status,
                final_url: format!("{BASE}{final_path}"),
                body: body.to_string(),
            });
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: Method, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && path_of(&r.url) == path)
            .collect()
    }
}

fn path_of(url: &str) -> String {
    reqwest::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

#[async_trait]
impl HttpClient for ScriptedHttp {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, RobinError> {
        let path = path_of(&request.url);
        let verb = match request.method {
            Method::Get => "GET",
            Method::Post => "POST",
        };
        self.journal.push(format!("{verb} {path}"));
        self.requests.lock().unwrap().push(request.clone());

        let mut routes = self.routes.lock().unwrap();
        let queue = routes.get_mut(&(request.method, path.clone()));
        match queue {
            Some(q) if q.len() > 1 => Ok(q.pop_front().unwrap()),
            Some(q) if q.len() == 1 => Ok(q[0].clone()),
            _ => Err(RobinError::Transport {
                url: request.url,
                detail: "no scripted response".into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// What a scripted socket does once its frames run out.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Ending {
    /// Report a server close.
    Close,
    /// Never yield again.
    Hang,
    /// Fail with a transport error, then report the connection gone.
    Reset,
}

struct Script {
    frames: Vec<String>,
    ending: Ending,
}

/// Hands out scripted sockets in the order they were queued.
pub struct ScriptedTransport {
    scripts: Mutex<VecDeque<Script>>,
    opened: Mutex<Vec<String>>,
    journal: Journal,
}

impl ScriptedTransport {
    pub fn new(journal: Journal) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(VecDeque::new()),
            opened: Mutex::new(Vec::new()),
            journal,
        })
    }

    pub fn script(&self, frames: &[&str], ending: Ending) {
        self.scripts.lock().unwrap().push_back(Script {
            frames: frames.iter().map(|f| f.to_string()).collect(),
            ending,
        });
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn open(&self, url: &str) -> Result<Box<dyn Connection>, RobinError> {
        let script = self.scripts.lock().unwrap().pop_front().ok_or_else(|| {
            RobinError::Transport {
                url: url.to_string(),
                detail: "connection refused".into(),
            }
        })?;
        self.journal.push(format!("open {url}"));
        self.opened.lock().unwrap().push(url.to_string());
        Ok(Box::new(ScriptedConnection {
            url: url.to_string(),
            frames: script.frames.into(),
            ending: script.ending,
            journal: self.journal.clone(),
        }))
    }
}

struct ScriptedConnection {
    url: String,
    frames: VecDeque<String>,
    ending: Ending,
    journal: Journal,
}

#[async_trait]
impl Connection for ScriptedConnection {
    async fn recv(&mut self) -> Option<Result<String, RobinError>> {
        // Give other tasks a chance to run between frames.
        tokio::task::yield_now().await;
        match self.frames.pop_front() {
            Some(frame) => Some(Ok(frame)),
            None => match self.ending {
                Ending::Close => None,
                Ending::Hang => std::future::pending().await,
                Ending::Reset => {
                    self.ending = Ending::Close;
                    Some(Err(RobinError::Transport {
                        url: self.url.clone(),
                        detail: "connection reset".into(),
                    }))
                }
            },
        }
    }

    async fn close(&mut self) -> Result<(), RobinError> {
        self.journal.push(format!("close {}", self.url));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const LOGIN_OK: &str =
    r#"{"json":{"errors":[],"data":{"modhash":"mh-1","cookie":"ck-1"}}}"#;

pub fn room_page(room_id: &str, name: &str) -> String {
    format!(
        r#"<html><script>r.setup({{"robin_websocket_url":"wss://ws.test/{room_id}","robin_room_name":"{name}","robin_room_id":"{room_id}","robin_user_list":[]}})</script></html>"#
    )
}

pub fn ws_url(room_id: &str) -> String {
    format!("wss://ws.test/{room_id}")
}

pub fn chat(from: &str, body: &str) -> String {
    serde_json::json!({"type": "chat", "payload": {"from": from, "body": body}}).to_string()
}

pub const MERGE: &str = r#"{"type":"merge"}"#;

pub fn config() -> robin_bot::RobinConfig {
    robin_bot::RobinConfig {
        base_url: BASE.to_string(),
        ..robin_bot::RobinConfig::default()
    }
}

pub fn login_path() -> &'static str {
    "/api/login/alice"
}

/// HTTP double that logs `alice` in and serves `room_id` as her room.
pub fn http_in_room(journal: &Journal, room_id: &str) -> Arc<ScriptedHttp> {
    let http = ScriptedHttp::new(journal.clone());
    http.respond(Method::Post, login_path(), 200, login_path(), LOGIN_OK);
    http.respond(Method::Get, "/robin", 200, "/robin", &room_page(room_id, "first room"));
    http
}

pub fn client(
    http: Arc<ScriptedHttp>,
    transport: Arc<ScriptedTransport>,
) -> robin_bot::RobinClient {
    robin_bot::RobinClient::with_parts(
        config(),
        robin_bot::Credentials::new("alice", "pw"),
        http,
        transport,
    )
}
