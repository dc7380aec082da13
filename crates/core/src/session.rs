//! Session Factory
//!
//! Turns a [`TokenSource`] into a shared [`SessionHandle`]. Each token source
//! variant gets its own credential handler here; the realtime connection itself
//! is delegated to a [`RoomConnector`].

use crate::{
    error::BootstrapError,
    memo::Memo,
    token_source::{ConnectionDetails, TokenSource, TokenSourceKind},
    transport::HttpTransport,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify, broadcast, watch};
use tracing::{info, instrument};

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events published by a session to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged(ConnectionState),
    /// The agent failed and the session cannot continue.
    AgentFailed { reasons: Vec<String> },
    /// A runtime error that did not end the session.
    Error { message: String },
}

/// A live room connection returned by a [`RoomConnector`].
#[async_trait]
pub trait RoomLink: Send + Sync {
    async fn close(&mut self);
}

/// The realtime layer that joins a room with fetched credentials.
///
/// Implementations publish runtime failures on `events` for as long as the
/// link stays open.
#[async_trait]
pub trait RoomConnector: Send + Sync {
    async fn connect(
        &self,
        details: &ConnectionDetails,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Box<dyn RoomLink>, BootstrapError>;
}

/// A session shared with every consumer that needs it.
pub type SessionHandle = Arc<Session>;

struct ActiveRoom {
    details: ConnectionDetails,
    link: Box<dyn RoomLink>,
}

/// One realtime agent session, established lazily by [`Session::start`].
pub struct Session {
    id: u64,
    source: TokenSource,
    agent_name: Option<String>,
    transport: Arc<dyn HttpTransport>,
    connector: Arc<dyn RoomConnector>,
    state_tx: watch::Sender<ConnectionState>,
    events_tx: broadcast::Sender<SessionEvent>,
    room: Mutex<Option<ActiveRoom>>,
    abandon: Notify,
}

impl Session {
    fn new(
        id: u64,
        source: TokenSource,
        agent_name: Option<String>,
        transport: Arc<dyn HttpTransport>,
        connector: Arc<dyn RoomConnector>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let (events_tx, _) = broadcast::channel(64);
        Self {
            id,
            source,
            agent_name,
            transport,
            connector,
            state_tx,
            events_tx,
            room: Mutex::new(None),
            abandon: Notify::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn token_source(&self) -> &TokenSource {
        &self.source
    }

    /// The agent-name hint this session was created with, if any.
    pub fn agent_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Publishes an event to the session's subscribers.
    pub fn emit(&self, event: SessionEvent) {
        // No subscribers is not an error.
        let _ = self.events_tx.send(event);
    }

    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
        self.emit(SessionEvent::StateChanged(state));
    }

    /// Fetches credentials and joins the room.
    ///
    /// Starting an already connected session returns its existing details.
    /// Failures are returned untouched and leave the session disconnected.
    /// A start still in flight when [`Session::end`] is called is dropped and
    /// fails with [`BootstrapError::Connect`].
    #[instrument(name = "session_start", skip_all, fields(session_id = self.id, agent_name = ?self.agent_name))]
    pub async fn start(&self) -> Result<ConnectionDetails, BootstrapError> {
        // Registered before locking so an `end` racing the lock still reaches it.
        let abandoned = self.abandon.notified();
        let mut room = self.room.lock().await;
        if let Some(active) = room.as_ref() {
            return Ok(active.details.clone());
        }

        self.set_state(ConnectionState::Connecting);
        let attempt = async {
            let details = self.fetch_connection_details().await?;
            let link = self
                .connector
                .connect(&details, self.events_tx.clone())
                .await?;
            Ok::<_, BootstrapError>(ActiveRoom { details, link })
        };
        let connected = tokio::select! {
            connected = attempt => connected,
            _ = abandoned => {
                info!("Session ended while connecting");
                Err(BootstrapError::Connect("the session was ended while connecting".to_string()))
            }
        };

        match connected {
            Ok(active) => {
                let details = active.details.clone();
                *room = Some(active);
                self.set_state(ConnectionState::Connected);
                info!(room = %details.room_name, server_url = %details.server_url, "Session connected");
                Ok(details)
            }
            Err(e) => {
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    /// Leaves the room and abandons any start still in flight.
    ///
    /// A no-op when the session is neither connected nor connecting.
    pub async fn end(&self) {
        self.abandon.notify_waiters();
        let active = self.room.lock().await.take();
        if let Some(mut active) = active {
            active.link.close().await;
            self.set_state(ConnectionState::Disconnected);
            info!(session_id = self.id, room = %active.details.room_name, "Session ended");
        }
    }

    async fn fetch_connection_details(&self) -> Result<ConnectionDetails, BootstrapError> {
        match self.source.kind() {
            TokenSourceKind::Sandbox(sandbox) => {
                let payload = self.transport.post_json(sandbox.request()).await?;
                ConnectionDetails::from_value(payload)
            }
            TokenSourceKind::Endpoint(endpoint) => {
                let request = endpoint.request(self.agent_name.as_deref());
                let payload = self.transport.post_json(request).await?;
                ConnectionDetails::from_value(payload)
            }
            TokenSourceKind::Custom(custom) => custom.fetch().await,
        }
    }
}

#[derive(PartialEq)]
struct SessionKey {
    source: TokenSource,
    agent_name: Option<String>,
}

/// Creates sessions, reusing the current one while its inputs are unchanged.
pub struct SessionFactory {
    transport: Arc<dyn HttpTransport>,
    connector: Arc<dyn RoomConnector>,
    sessions: Memo<SessionKey, SessionHandle>,
    created: u64,
}

impl SessionFactory {
    pub fn new(transport: Arc<dyn HttpTransport>, connector: Arc<dyn RoomConnector>) -> Self {
        Self {
            transport,
            connector,
            sessions: Memo::new(),
            created: 0,
        }
    }

    /// Returns the session for `(source, agent_name)`.
    ///
    /// A new session is created only when the token source identity or the
    /// hint differs from the previous call. Empty hints count as no hint.
    pub fn use_session(&mut self, source: &TokenSource, agent_name: Option<&str>) -> SessionHandle {
        let key = SessionKey {
            source: source.clone(),
            agent_name: agent_name.filter(|name| !name.is_empty()).map(str::to_owned),
        };
        let created = &mut self.created;
        let transport = &self.transport;
        let connector = &self.connector;
        self.sessions.get_or_compute(key, |key| {
            *created += 1;
            info!(
                session_id = *created,
                token_source = ?key.source.descriptor().variant,
                agent_name = ?key.agent_name,
                "Creating session"
            );
            Arc::new(Session::new(
                *created,
                key.source.clone(),
                key.agent_name.clone(),
                transport.clone(),
                connector.clone(),
            ))
        })
    }

    /// Number of sessions created so far.
    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn current(&self) -> Option<SessionHandle> {
        self.sessions.current().cloned()
    }

    /// Forgets the current session and returns it for teardown.
    pub fn release(&mut self) -> Option<SessionHandle> {
        self.sessions.take()
    }
}
