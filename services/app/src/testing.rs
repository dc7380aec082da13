//! In-process fakes for the transport and connector seams.

use async_trait::async_trait;
use coach_core::{
    BootstrapError, ConnectionDetails, SessionEvent, TransportError,
    session::{RoomConnector, RoomLink},
    transport::{HttpTransport, PostRequest},
};
use serde_json::{Value, json};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use tokio::sync::broadcast;

pub fn details_json() -> Value {
    json!({
        "serverUrl": "wss://coach.livekit.cloud",
        "roomName": "voice_assistant_room_7",
        "participantName": "voice_assistant_user_3",
        "participantToken": "token-xyz"
    })
}

/// Records every request and answers with [`details_json`].
#[derive(Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<PostRequest>>,
}

impl RecordingTransport {
    pub fn requests(&self) -> Vec<PostRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn post_json(&self, request: PostRequest) -> Result<Value, TransportError> {
        self.requests.lock().unwrap().push(request);
        Ok(details_json())
    }
}

pub struct FakeLink {
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl RoomLink for FakeLink {
    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Accepts every connection and keeps the latest event sender around.
#[derive(Default)]
pub struct FakeConnector {
    pub connects: AtomicUsize,
    pub closed: Arc<AtomicBool>,
    events: Mutex<Option<broadcast::Sender<SessionEvent>>>,
}

impl FakeConnector {
    /// Publishes `event` as if it came from the room.
    pub fn push(&self, event: SessionEvent) {
        if let Some(events) = self.events.lock().unwrap().as_ref() {
            let _ = events.send(event);
        }
    }
}

#[async_trait]
impl RoomConnector for FakeConnector {
    async fn connect(
        &self,
        _details: &ConnectionDetails,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Box<dyn RoomLink>, BootstrapError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        *self.events.lock().unwrap() = Some(events);
        Ok(Box::new(FakeLink {
            closed: self.closed.clone(),
        }))
    }
}
