//! Composition Root
//!
//! Wires identity resolution, token source selection and the session factory
//! together, publishes the session through the [`SessionProvider`] and mounts
//! the bootstrap effects and presentation leaves. Errors from the bootstrap
//! path are never caught here.

use crate::{
    config::{BuildMode, Config},
    context::SessionProvider,
    effects::AppSetup,
    notify::{Notification, Notifier, Toaster, notification_channel},
    views::{StartAudioButton, ViewController},
};
use coach_core::{
    AppConfig, EffectiveConfig, SessionFactory, SessionHandle, SourceEnv, TokenSource,
    identity::{mode_from_url, resolve_agent_name},
    memo::Memo,
    select_token_source,
    session::RoomConnector,
    token_source::TokenSourceKind,
    transport::HttpTransport,
};
use reqwest::Url;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Everything mounted by one render.
pub struct AppTree {
    pub session: SessionHandle,
    pub view_controller: ViewController,
    pub start_audio: StartAudioButton,
    pub toaster: Toaster,
}

pub struct App {
    source_env: SourceEnv,
    build_mode: BuildMode,
    transport: Arc<dyn HttpTransport>,
    effective_config: Memo<(AppConfig, String), EffectiveConfig>,
    token_source: Memo<(EffectiveConfig, String), TokenSource>,
    sessions: SessionFactory,
    provider: SessionProvider,
    setup: AppSetup,
    notifier: Notifier,
    notifications: Option<mpsc::UnboundedReceiver<Notification>>,
}

impl App {
    pub fn new(
        source_env: SourceEnv,
        build_mode: BuildMode,
        transport: Arc<dyn HttpTransport>,
        connector: Arc<dyn RoomConnector>,
    ) -> Self {
        let (notifier, notifications) = notification_channel();
        Self {
            source_env,
            build_mode,
            sessions: SessionFactory::new(transport.clone(), connector),
            transport,
            effective_config: Memo::new(),
            token_source: Memo::new(),
            provider: SessionProvider::new(),
            setup: AppSetup::default(),
            notifier,
            notifications: Some(notifications),
        }
    }

    pub fn from_config(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        connector: Arc<dyn RoomConnector>,
    ) -> Self {
        Self::new(config.source_env.clone(), config.build_mode, transport, connector)
    }

    /// Derives the session for the current URL state and mounts the tree.
    ///
    /// Re-rendering with the same inputs returns the same session. Must be
    /// called from within a Tokio runtime.
    pub fn render(&mut self, app_config: &AppConfig, page_url: &Url) -> AppTree {
        let mode = mode_from_url(page_url);
        let agent_name = resolve_agent_name(mode.as_deref(), &app_config.agent_name);

        let effective = self.effective_config.get_or_compute(
            (app_config.clone(), agent_name.clone()),
            |(app, agent_name)| EffectiveConfig::with_agent_name(app, agent_name.clone()),
        );

        let source_env = &self.source_env;
        let transport = &self.transport;
        let token_source = self
            .token_source
            .get_or_compute((effective, agent_name.clone()), |(config, _)| {
                select_token_source(source_env, config, transport.clone())
            });

        // Only a bare endpoint needs the agent name handed to the session.
        let hint = match token_source.kind() {
            TokenSourceKind::Endpoint(_) => Some(agent_name.as_str()),
            TokenSourceKind::Sandbox(_) | TokenSourceKind::Custom(_) => None,
        };
        let session = self.sessions.use_session(&token_source, hint);
        self.provider.provide(&session);
        self.setup
            .mount(self.build_mode, &self.provider, &self.notifier);
        debug!(session_id = session.id(), mode = ?mode, agent_name = %agent_name, "Rendered app");

        AppTree {
            session,
            view_controller: ViewController::new(app_config.clone(), mode),
            start_audio: StartAudioButton::default(),
            toaster: Toaster::default(),
        }
    }

    pub fn context(&self) -> &SessionProvider {
        &self.provider
    }

    /// Hands out the receiving end of the notification surface. Only once.
    pub fn take_notifications(&mut self) -> Option<mpsc::UnboundedReceiver<Notification>> {
        self.notifications.take()
    }

    pub fn sessions_created(&self) -> u64 {
        self.sessions.created()
    }

    pub fn is_mounted(&self) -> bool {
        self.setup.is_mounted()
    }

    /// Stops the effects and ends the current session.
    pub async fn unmount(mut self) {
        self.setup.unmount();
        self.provider.clear();
        if let Some(session) = self.sessions.release() {
            session.end().await;
        }
    }
}
