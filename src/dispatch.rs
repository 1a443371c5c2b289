//! Inbound frame classification and listener registries.
//!
//! Every frame from the room socket goes down exactly one of three paths:
//!
//! 1. `{"type":"merge"}` is handed back to the client, which rejoins the room.
//! 2. A `chat` frame whose body starts with the command prefix becomes a
//!    [`Command`] and goes to the command listeners registered for its name.
//! 3. Anything else goes to the event listeners registered for its `type`,
//!    with the `payload` passed through untouched.
//!
//! Frames nobody listens for are dropped silently.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::trace;

use crate::error::RobinError;

/// Frame type that triggers a room rejoin.
pub const MERGE_TYPE: &str = "merge";
/// Frame type carrying chat messages.
pub const CHAT_TYPE: &str = "chat";

/// Listener for a generic event type. Receives the frame payload.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;
/// Listener for a chat command. Receives the arguments and the sender.
pub type CommandHandler = Arc<dyn Fn(&[String], &str) + Send + Sync>;
/// Listener told when the room stream ends without a merge.
pub type DisconnectHandler = Arc<dyn Fn(&RobinError) + Send + Sync>;

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// One JSON message received from the room socket.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self, RobinError> {
        serde_json::from_str(text).map_err(|e| RobinError::Protocol(e.to_string()))
    }
}

/// A chat message parsed as a command, e.g. `!dice 2 6`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// First token with the prefix removed (`dice`).
    pub name: String,
    /// Remaining whitespace-separated tokens (`["2", "6"]`).
    pub args: Vec<String>,
    /// Username of the sender.
    pub from: String,
}

impl Command {
    /// Parse `body` as a command if it starts with `prefix`.
    pub fn parse(body: &str, from: &str, prefix: char) -> Option<Self> {
        if !body.starts_with(prefix) {
            return None;
        }
        let mut tokens = body.split_whitespace();
        let first = tokens.next().unwrap_or_default();
        Some(Self {
            name: first.strip_prefix(prefix).unwrap_or(first).to_string(),
            args: tokens.map(str::to_string).collect(),
            from: from.to_string(),
        })
    }
}

/// Where a frame is routed.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Merge,
    Command(Command),
    Event { kind: String, payload: Value },
}

/// Classify a frame. The first matching rule wins.
pub fn classify(frame: InboundFrame, prefix: char) -> Route {
    if frame.kind == MERGE_TYPE {
        return Route::Merge;
    }
    if frame.kind == CHAT_TYPE {
        let body = frame.payload.get("body").and_then(Value::as_str);
        let from = frame
            .payload
            .get("from")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if let Some(command) = body.and_then(|b| Command::parse(b, from, prefix)) {
            return Route::Command(command);
        }
    }
    Route::Event {
        kind: frame.kind,
        payload: frame.payload,
    }
}

// ---------------------------------------------------------------------------
// Listener registries
// ---------------------------------------------------------------------------

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Registry<H> {
    handlers: HashMap<String, Vec<(SubscriptionId, H)>>,
}

impl<H: Clone> Registry<H> {
    fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    fn add(&mut self, key: &str, id: SubscriptionId, handler: H) {
        self.handlers
            .entry(key.to_string())
            .or_default()
            .push((id, handler));
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let mut removed = false;
        self.handlers.retain(|_, list| {
            let before = list.len();
            list.retain(|(sid, _)| *sid != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    fn snapshot(&self, key: &str) -> Vec<H> {
        self.handlers
            .get(key)
            .map(|list| list.iter().map(|(_, h)| h.clone()).collect())
            .unwrap_or_default()
    }

    fn count(&self, key: &str) -> usize {
        self.handlers.get(key).map_or(0, Vec::len)
    }
}

struct Tables {
    next_id: u64,
    events: Registry<EventHandler>,
    commands: Registry<CommandHandler>,
    disconnects: Vec<(SubscriptionId, DisconnectHandler)>,
}

impl Tables {
    fn next_id(&mut self) -> SubscriptionId {
        self.next_id += 1;
        SubscriptionId(self.next_id)
    }
}

/// Shared event and command listener tables.
///
/// Cloning is cheap and every clone sees the same tables, so a handler may
/// hold a clone and subscribe or unsubscribe while frames are dispatched.
/// Handlers run in subscription order.
#[derive(Clone)]
pub struct Listeners {
    inner: Arc<Mutex<Tables>>,
}

impl Default for Listeners {
    fn default() -> Self {
        Self::new()
    }
}

impl Listeners {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Tables {
                next_id: 0,
                events: Registry::new(),
                commands: Registry::new(),
                disconnects: Vec::new(),
            })),
        }
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Listen for frames of type `kind`.
    pub fn on<F>(&self, kind: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut tables = self.tables();
        let id = tables.next_id();
        tables.events.add(kind, id, Arc::new(handler));
        id
    }

    /// Listen for the command `name` (without prefix).
    pub fn on_command<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&[String], &str) + Send + Sync + 'static,
    {
        let mut tables = self.tables();
        let id = tables.next_id();
        tables.commands.add(name, id, Arc::new(handler));
        id
    }

    /// Listen for the room stream ending without a merge.
    pub fn on_disconnect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RobinError) + Send + Sync + 'static,
    {
        let mut tables = self.tables();
        let id = tables.next_id();
        let handler: DisconnectHandler = Arc::new(handler);
        tables.disconnects.push((id, handler));
        id
    }

    /// Remove a listener from whichever table holds it.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut tables = self.tables();
        if tables.events.remove(id) || tables.commands.remove(id) {
            return true;
        }
        let before = tables.disconnects.len();
        tables.disconnects.retain(|(sid, _)| *sid != id);
        tables.disconnects.len() != before
    }

    pub fn event_listener_count(&self, kind: &str) -> usize {
        self.tables().events.count(kind)
    }

    pub fn command_listener_count(&self, name: &str) -> usize {
        self.tables().commands.count(name)
    }

    /// Call every listener for `kind`. Returns how many ran.
    pub fn emit_event(&self, kind: &str, payload: &Value) -> usize {
        let handlers = self.tables().events.snapshot(kind);
        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    /// Tell disconnect listeners why the stream ended.
    pub fn emit_disconnect(&self, error: &RobinError) -> usize {
        let handlers: Vec<DisconnectHandler> = self
            .tables()
            .disconnects
            .iter()
            .map(|(_, h)| Arc::clone(h))
            .collect();
        for handler in &handlers {
            handler(error);
        }
        handlers.len()
    }

    /// Call every listener for `command.name`. Returns how many ran.
    pub fn emit_command(&self, command: &Command) -> usize {
        let handlers = self.tables().commands.snapshot(&command.name);
        for handler in &handlers {
            handler(&command.args, &command.from);
        }
        handlers.len()
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Result of dispatching one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The frame asks for a merge; nothing was delivered to listeners.
    Merge,
    /// The frame went to a command listener table.
    Command { handlers: usize },
    /// The frame went to an event listener table.
    Event { handlers: usize },
}

/// Routes frames to [`Listeners`].
#[derive(Clone)]
pub struct Dispatcher {
    listeners: Listeners,
    prefix: char,
}

impl Dispatcher {
    pub fn new(listeners: Listeners, prefix: char) -> Self {
        Self { listeners, prefix }
    }

    pub fn listeners(&self) -> &Listeners {
        &self.listeners
    }

    /// Parse and dispatch one raw text frame.
    pub fn dispatch_text(&self, text: &str) -> Result<Dispatch, RobinError> {
        let frame = InboundFrame::parse(text)?;
        Ok(self.dispatch(frame))
    }

    pub fn dispatch(&self, frame: InboundFrame) -> Dispatch {
        match classify(frame, self.prefix) {
            Route::Merge => Dispatch::Merge,
            Route::Command(command) => {
                let handlers = self.listeners.emit_command(&command);
                trace!(command = %command.name, from = %command.from, handlers, "command dispatched");
                Dispatch::Command { handlers }
            }
            Route::Event { kind, payload } => {
                let handlers = self.listeners.emit_event(&kind, &payload);
                trace!(kind = %kind, handlers, "event dispatched");
                Dispatch::Event { handlers }
            }
        }
    }
}
