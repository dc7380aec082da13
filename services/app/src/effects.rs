//! Bootstrap Effects
//!
//! Setup that runs once per mount and keeps running in the background:
//! debug tracing of session events and surfacing of agent failures as
//! notifications. Both follow whichever session the context currently
//! provides, so a re-created session is picked up without re-firing.

use crate::{
    config::BuildMode,
    context::{Followed, SessionProvider},
    notify::Notifier,
};
use coach_core::{SessionEvent, SessionHandle};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

/// Aborts the effect's background task when dropped.
pub struct EffectGuard {
    task: JoinHandle<()>,
}

impl Drop for EffectGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum Next {
    Switched(Option<Option<Followed>>),
    Event(Result<SessionEvent, RecvError>),
}

/// Yields events from the session currently held by the context.
struct SessionFollower {
    updates: mpsc::UnboundedReceiver<Option<Followed>>,
    current: Option<Followed>,
}

impl SessionFollower {
    fn new(provider: &SessionProvider) -> Self {
        Self {
            updates: provider.follow(),
            current: None,
        }
    }

    async fn next(&mut self) -> Option<(SessionHandle, SessionEvent)> {
        loop {
            let next = match &mut self.current {
                // A switch wins over events still queued by the superseded session.
                Some((_, events)) => tokio::select! {
                    biased;
                    update = self.updates.recv() => Next::Switched(update),
                    event = events.recv() => Next::Event(event),
                },
                None => Next::Switched(self.updates.recv().await),
            };

            match next {
                Next::Switched(None) => return None,
                Next::Switched(Some(followed)) => self.current = followed,
                Next::Event(Ok(event)) => {
                    if let Some((session, _)) = &self.current {
                        return Some((session.clone(), event));
                    }
                }
                Next::Event(Err(RecvError::Lagged(skipped))) => {
                    warn!(skipped, "Session event subscriber lagged behind.");
                }
                Next::Event(Err(RecvError::Closed)) => self.current = None,
            }
        }
    }
}

/// Traces every session event at debug level. Inactive in production builds.
pub fn activate_debug_mode(build_mode: BuildMode, provider: &SessionProvider) -> Option<EffectGuard> {
    if build_mode.is_production() {
        return None;
    }
    info!("Debug mode enabled: tracing session events.");
    let mut follower = SessionFollower::new(provider);
    let task = tokio::spawn(async move {
        while let Some((session, event)) = follower.next().await {
            debug!(session_id = session.id(), event = ?event, "Session event");
        }
    });
    Some(EffectGuard { task })
}

fn describe_failure(reasons: &[String]) -> String {
    if reasons.is_empty() {
        "The agent failed without reporting a reason.".to_string()
    } else {
        reasons.join("\n")
    }
}

/// Routes agent failures and runtime errors to the notification surface.
///
/// An agent failure also ends the session it came from.
pub fn activate_agent_errors(provider: &SessionProvider, notifier: Notifier) -> EffectGuard {
    let mut follower = SessionFollower::new(provider);
    let task = tokio::spawn(async move {
        while let Some((session, event)) = follower.next().await {
            match event {
                SessionEvent::AgentFailed { reasons } => {
                    warn!(session_id = session.id(), reasons = ?reasons, "Agent failed, ending session.");
                    notifier.warning("Session ended", describe_failure(&reasons));
                    session.end().await;
                }
                SessionEvent::Error { message } => {
                    warn!(session_id = session.id(), %message, "Session runtime error.");
                    notifier.warning("Session error", message);
                }
                SessionEvent::StateChanged(_) => {}
            }
        }
    });
    EffectGuard { task }
}

/// Mount-scoped owner of the bootstrap effects.
#[derive(Default)]
pub struct AppSetup {
    guards: Option<Vec<EffectGuard>>,
    activations: usize,
}

impl AppSetup {
    /// Activates both effects. Later calls do nothing until [`AppSetup::unmount`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn mount(&mut self, build_mode: BuildMode, provider: &SessionProvider, notifier: &Notifier) {
        if self.guards.is_some() {
            return;
        }
        let mut guards = Vec::with_capacity(2);
        guards.extend(activate_debug_mode(build_mode, provider));
        guards.push(activate_agent_errors(provider, notifier.clone()));
        self.guards = Some(guards);
        self.activations += 1;
    }

    pub fn is_mounted(&self) -> bool {
        self.guards.is_some()
    }

    /// How many times the effects were activated.
    pub fn activations(&self) -> usize {
        self.activations
    }

    pub fn unmount(&mut self) {
        self.guards = None;
    }
}
