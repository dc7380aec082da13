//! Main Entrypoint for the Coach Session Client
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Rendering the app for the requested page URL and starting its session.
//! 4. Presenting notifications until the session ends or Ctrl+C is pressed.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use coach_app::{app::App, config::Config, connector::SignalConnector};
use coach_core::{
    ConnectionState, EndpointStrategy,
    identity::{MODE_PARAM, REVIEW_MODE},
    transport::ReqwestTransport,
};
use reqwest::Url;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StrategyArg {
    /// Post to the connection-details route from a custom token source.
    Custom,
    /// Hand the route to the session and let it post with the agent name.
    Endpoint,
}

impl From<StrategyArg> for EndpointStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Custom => EndpointStrategy::CustomFetch,
            StrategyArg::Endpoint => EndpointStrategy::DirectEndpoint,
        }
    }
}

#[derive(Parser, Debug)]
#[command(version, about = "Starts a voice coaching session")]
struct Args {
    /// Page URL to render. Its `mode` query parameter selects the agent.
    #[arg(long)]
    url: Option<String>,
    /// Start the weekly review coach instead of the default agent.
    #[arg(long)]
    review: bool,
    /// Override TOKEN_SOURCE_STRATEGY.
    #[arg(long, value_enum)]
    strategy: Option<StrategyArg>,
}

/// Listens for the `Ctrl+C` signal to end the session gracefully.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal. Ending session...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // --- 1. Load Configuration ---
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(strategy) = args.strategy {
        config.source_env.strategy = strategy.into();
    }

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!(
        origin = %config.origin,
        sandbox = config.source_env.is_sandbox(),
        strategy = ?config.source_env.strategy,
        build_mode = ?config.build_mode,
        "Configuration loaded."
    );

    // --- 3. Render and Start ---
    let mut page_url = match &args.url {
        Some(url) => Url::parse(url).context("Invalid --url")?,
        None => config.origin.clone(),
    };
    if args.review {
        page_url
            .query_pairs_mut()
            .append_pair(MODE_PARAM, REVIEW_MODE);
    }

    let transport = Arc::new(ReqwestTransport::new(config.origin.clone()));
    let mut app = App::from_config(&config, transport, Arc::new(SignalConnector));
    let mut notifications = app
        .take_notifications()
        .context("Notification surface already taken")?;

    let tree = app.render(&config.app, &page_url);
    info!(
        page_url = %page_url,
        view = ?tree.view_controller.view(tree.session.state()),
        start_audio = tree.start_audio.label,
        "App mounted."
    );

    let details = tree
        .session
        .start()
        .await
        .context("Failed to start session")?;
    info!(
        room = %details.room_name,
        participant = %details.participant_name,
        view = ?tree.view_controller.view(tree.session.state()),
        "Session started."
    );

    // --- 4. Run Until Done ---
    let mut state = tree.session.watch_state();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            Some(notification) = notifications.recv() => {
                warn!(position = tree.toaster.position, title = %notification.title, description = %notification.description, "Notification");
            }
            changed = state.changed() => {
                if changed.is_err() || *state.borrow() == ConnectionState::Disconnected {
                    info!("Session disconnected.");
                    break;
                }
            }
        }
    }

    while let Ok(notification) = notifications.try_recv() {
        warn!(title = %notification.title, description = %notification.description, "Notification");
    }
    app.unmount().await;
    info!("Client has shut down.");
    Ok(())
}
