//! The room client: login, setup, the socket loop and merge recovery.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --init()--> Connected --merge frame--> Reconnecting --> Connected
//!                      |                           |
//!                      +--close / error--> Closed <+-- rejoin failed
//! ```
//!
//! [`RobinClient::run`] is the only place frames are read. Each frame is
//! dispatched to completion, including a full merge rejoin, before the next
//! one is read, so handlers observe frames strictly in arrival order and
//! never see a frame from a socket that is being torn down.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::actions::{RoomActions, RoomContext};
use crate::auth::{self, Session};
use crate::config::{Credentials, RobinConfig};
use crate::dispatch::{Dispatch, Dispatcher, Listeners, SubscriptionId};
use crate::error::RobinError;
use crate::http::{HttpClient, ReqwestClient};
use crate::setup::{self, RoomSetup};
use crate::transport::{Connection, Transport, WsTransport};

/// Where the client is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not initialized yet.
    Idle,
    /// A socket is open against the current room setup.
    Connected,
    /// A merge arrived; the old socket is closed and the new room is being
    /// resolved.
    Reconnecting,
    /// No socket and none coming. Needs a fresh `init()`.
    Closed,
}

/// Client for one Robin room.
pub struct RobinClient {
    config: Arc<RobinConfig>,
    credentials: Credentials,
    http: Arc<dyn HttpClient>,
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    context: watch::Sender<Option<Arc<RoomContext>>>,
    connection: Option<Box<dyn Connection>>,
    state: ConnectionState,
}

impl RobinClient {
    /// Client using reqwest for HTTP and tungstenite for the socket.
    pub fn new(config: RobinConfig, credentials: Credentials) -> Result<Self, RobinError> {
        let http = Arc::new(ReqwestClient::new(&config.user_agent)?);
        Ok(Self::with_parts(config, credentials, http, Arc::new(WsTransport)))
    }

    /// Client over caller-supplied HTTP and transport implementations.
    pub fn with_parts(
        config: RobinConfig,
        credentials: Credentials,
        http: Arc<dyn HttpClient>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let (context, _) = watch::channel(None);
        let dispatcher = Dispatcher::new(Listeners::new(), config.command_prefix);
        Self {
            config: Arc::new(config),
            credentials,
            http,
            transport,
            dispatcher,
            context,
            connection: None,
            state: ConnectionState::Idle,
        }
    }

    pub fn config(&self) -> &RobinConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Session and room setup currently in effect.
    pub fn context(&self) -> Option<Arc<RoomContext>> {
        self.context.borrow().clone()
    }

    /// Shared listener tables. Clones can be moved into handlers.
    pub fn listeners(&self) -> Listeners {
        self.dispatcher.listeners().clone()
    }

    /// Handle for posting to whatever room the client is in.
    pub fn actions(&self) -> RoomActions {
        RoomActions::new(
            Arc::clone(&self.http),
            Arc::clone(&self.config),
            self.context.subscribe(),
        )
    }

    pub fn on<F>(&self, kind: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.dispatcher.listeners().on(kind, handler)
    }

    pub fn on_command<F>(&self, name: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&[String], &str) + Send + Sync + 'static,
    {
        self.dispatcher.listeners().on_command(name, handler)
    }

    pub fn on_disconnect<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&RobinError) + Send + Sync + 'static,
    {
        self.dispatcher.listeners().on_disconnect(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.dispatcher.listeners().unsubscribe(id)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Log in, resolve the room setup and open the socket.
    pub async fn init(&mut self) -> Result<(), RobinError> {
        info!("Initializing bot...");
        let session = auth::login(&*self.http, &self.config, &self.credentials).await?;
        let setup = setup::retrieve_setup(&*self.http, &self.config, &session).await?;
        self.connect(session, setup).await
    }

    /// Read and dispatch frames until the stream ends.
    ///
    /// Merges are handled inline. Malformed frames are logged and skipped.
    /// Returns [`RobinError::Disconnected`] when the stream ends without a
    /// merge, with the socket error as its cause if the connection failed,
    /// and [`RobinError::MergeRecovery`] when a rejoin fails.
    pub async fn run(&mut self) -> Result<(), RobinError> {
        loop {
            let conn = self.connection.as_mut().ok_or(RobinError::NotInitialized)?;
            let next = conn.recv().await;
            match next {
                Some(Ok(text)) => self.handle_text(&text).await?,
                Some(Err(e)) if !e.is_fatal() => {
                    warn!(error = %e, "Dropping unreadable frame");
                }
                Some(Err(e)) => return Err(self.lose_connection(Some(e))),
                None => return Err(self.lose_connection(None)),
            }
        }
    }

    /// Close the socket, if any, and stop.
    pub async fn shutdown(&mut self) -> Result<(), RobinError> {
        self.state = ConnectionState::Closed;
        match self.connection.take() {
            Some(mut conn) => conn.close().await,
            None => Ok(()),
        }
    }

    async fn handle_text(&mut self, text: &str) -> Result<(), RobinError> {
        match self.dispatcher.dispatch_text(text) {
            Ok(Dispatch::Merge) => self.handle_merge().await,
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Dropping malformed frame");
                Ok(())
            }
        }
    }

    async fn handle_merge(&mut self) -> Result<(), RobinError> {
        info!("Room is merging...");
        self.state = ConnectionState::Reconnecting;
        self.close_current().await;

        match self.rejoin().await {
            Ok(()) => Ok(()),
            Err(e) => {
                // The old room id is gone server-side; stop actions from using it.
                self.context.send_replace(None);
                self.state = ConnectionState::Closed;
                Err(RobinError::MergeRecovery(Box::new(e)))
            }
        }
    }

    async fn rejoin(&mut self) -> Result<(), RobinError> {
        let session = self
            .context()
            .map(|c| c.session.clone())
            .ok_or(RobinError::NotInitialized)?;
        let setup = setup::retrieve_setup(&*self.http, &self.config, &session).await?;
        self.connect(session, setup).await
    }

    /// Publish the new context and open a socket against it. Any previous
    /// socket is closed first.
    async fn connect(&mut self, session: Session, setup: RoomSetup) -> Result<(), RobinError> {
        self.close_current().await;

        let ctx = Arc::new(RoomContext { session, setup });
        self.context.send_replace(Some(Arc::clone(&ctx)));

        info!("Connecting to room...");
        match self.transport.open(&ctx.setup.websocket_url).await {
            Ok(conn) => {
                self.connection = Some(conn);
                self.state = ConnectionState::Connected;
                info!(
                    room_id = %ctx.setup.room_id,
                    "Connected to {}...",
                    ctx.setup.display_name(self.config.room_name_display_len)
                );
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    async fn close_current(&mut self) {
        if let Some(mut old) = self.connection.take() {
            if let Err(e) = old.close().await {
                debug!(error = %e, "error while closing previous socket");
            }
        }
    }

    fn lose_connection(&mut self, cause: Option<RobinError>) -> RobinError {
        let room = self
            .context()
            .map(|c| c.setup.room_name.clone())
            .unwrap_or_default();
        match &cause {
            Some(e) => warn!(error = %e, room = %room, "Room connection failed"),
            None => warn!(room = %room, "Room stream closed by server"),
        }
        let err = RobinError::Disconnected {
            room,
            cause: cause.map(Box::new),
        };
        self.connection = None;
        self.state = ConnectionState::Closed;
        self.dispatcher.listeners().emit_disconnect(&err);
        err
    }
}
