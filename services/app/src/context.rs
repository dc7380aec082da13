//! Explicit session context shared with the app subtree.

use coach_core::{SessionEvent, SessionHandle};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, mpsc, watch};

/// A provided session with an event receiver opened at the moment it was
/// provided.
pub type Followed = (SessionHandle, broadcast::Receiver<SessionEvent>);

/// Publishes the current session to every consumer that subscribed.
///
/// Consumers only read; the session mutates itself.
pub struct SessionProvider {
    tx: watch::Sender<Option<SessionHandle>>,
    followers: Mutex<Vec<mpsc::UnboundedSender<Option<Followed>>>>,
}

impl Default for SessionProvider {
    fn default() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            tx,
            followers: Mutex::new(Vec::new()),
        }
    }
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn followers(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<Option<Followed>>>> {
        self.followers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes `session` current. Subscribers are only woken when it changed.
    ///
    /// Followers are subscribed to the new session's events before this
    /// returns.
    pub fn provide(&self, session: &SessionHandle) {
        let mut followers = self.followers();
        let changed = self.tx.send_if_modified(|current| {
            let unchanged = current
                .as_ref()
                .is_some_and(|existing| Arc::ptr_eq(existing, session));
            if !unchanged {
                *current = Some(session.clone());
            }
            !unchanged
        });
        if changed {
            followers.retain(|follower| {
                follower
                    .send(Some((session.clone(), session.subscribe())))
                    .is_ok()
            });
        }
    }

    pub fn current(&self) -> Option<SessionHandle> {
        self.tx.borrow().clone()
    }

    /// Streams every session made current from now on, starting with the
    /// current one. `None` means the session was withdrawn.
    pub fn follow(&self) -> mpsc::UnboundedReceiver<Option<Followed>> {
        let mut followers = self.followers();
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(session) = self.current() {
            let _ = tx.send(Some((session.clone(), session.subscribe())));
        }
        followers.push(tx);
        rx
    }

    /// Withdraws the current session.
    pub fn clear(&self) -> Option<SessionHandle> {
        let mut followers = self.followers();
        let previous = self.tx.send_replace(None);
        if previous.is_some() {
            followers.retain(|follower| follower.send(None).is_ok());
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, RecordingTransport};
    use coach_core::{SessionFactory, TokenSource};

    fn sessions() -> SessionFactory {
        SessionFactory::new(
            Arc::new(RecordingTransport::default()),
            Arc::new(FakeConnector::default()),
        )
    }

    #[test]
    fn test_follow_subscribes_before_provide_returns() {
        let mut sessions = sessions();
        let provider = SessionProvider::new();
        let first = sessions.use_session(&TokenSource::endpoint("/api/connection-details"), None);
        provider.provide(&first);

        let mut updates = provider.follow();
        let (seeded, _) = updates.try_recv().unwrap().unwrap();
        assert!(Arc::ptr_eq(&seeded, &first));

        let second = sessions.use_session(&TokenSource::endpoint("/api/connection-details"), None);
        provider.provide(&second);
        provider.provide(&second);
        second.emit(SessionEvent::Error {
            message: "emitted right after provide".to_string(),
        });

        let (followed, mut events) = updates.try_recv().unwrap().unwrap();
        assert!(Arc::ptr_eq(&followed, &second));
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::Error {
                message: "emitted right after provide".to_string()
            }
        );
        assert!(updates.try_recv().is_err());

        assert!(provider.clear().is_some());
        assert!(updates.try_recv().unwrap().is_none());
        assert!(provider.current().is_none());
    }
}
