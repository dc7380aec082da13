//! Token Source Selection
//!
//! A [`TokenSource`] is a deferred producer of connection credentials. Selecting
//! one never talks to the network: requests are only issued when a session
//! starts and asks the source for its details.

use crate::{
    error::BootstrapError,
    identity::EffectiveConfig,
    transport::{HttpTransport, PostRequest},
};
use futures::{FutureExt, future::BoxFuture};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::{fmt, sync::Arc};
use tracing::debug;

/// The same-origin route that mints connection details.
pub const CONNECTION_DETAILS_PATH: &str = "/api/connection-details";
/// Header naming the sandbox when fetching from a sandbox endpoint.
pub const SANDBOX_ID_HEADER: &str = "X-Sandbox-Id";

/// Credentials returned by a connection-details endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub server_url: String,
    #[serde(default)]
    pub room_name: String,
    #[serde(default)]
    pub participant_name: String,
    pub participant_token: String,
}

impl ConnectionDetails {
    pub fn from_value(payload: Value) -> Result<Self, BootstrapError> {
        serde_json::from_value(payload).map_err(BootstrapError::InvalidPayload)
    }
}

/// Builds the JSON body posted to a connection-details endpoint.
///
/// With an agent name the body dispatches that agent into the room; without
/// one it is an empty object.
pub fn connection_details_body(agent_name: Option<&str>) -> Value {
    match agent_name.filter(|name| !name.is_empty()) {
        Some(agent_name) => json!({
            "room_config": { "agents": [{ "agent_name": agent_name }] }
        }),
        None => json!({}),
    }
}

/// Future returned by a custom token source.
pub type DetailsFuture = BoxFuture<'static, Result<ConnectionDetails, BootstrapError>>;
/// A zero-argument asynchronous credential fetch.
pub type CustomFetch = Arc<dyn Fn() -> DetailsFuture + Send + Sync>;

/// Fetches from a sandbox token server configured at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxSource {
    pub endpoint: String,
    pub sandbox_id: String,
    pub agent_name: Option<String>,
}

impl SandboxSource {
    pub fn new(endpoint: impl Into<String>, config: &EffectiveConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            sandbox_id: config.sandbox_id().unwrap_or_default().to_string(),
            agent_name: config.dispatch_agent_name().map(str::to_owned),
        }
    }

    pub fn request(&self) -> PostRequest {
        PostRequest::new(
            self.endpoint.clone(),
            connection_details_body(self.agent_name.as_deref()),
        )
        .with_header(SANDBOX_ID_HEADER, self.sandbox_id.clone())
    }
}

/// A literal route reference. The session posts to it itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRef {
    pub path: String,
}

impl EndpointRef {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    pub fn request(&self, agent_name: Option<&str>) -> PostRequest {
        PostRequest::new(self.path.clone(), connection_details_body(agent_name))
    }
}

/// A source backed by an arbitrary async function.
#[derive(Clone)]
pub struct CustomSource {
    agent_name: Option<String>,
    fetch: CustomFetch,
}

impl CustomSource {
    pub fn new<F>(agent_name: Option<String>, fetch: F) -> Self
    where
        F: Fn() -> DetailsFuture + Send + Sync + 'static,
    {
        Self {
            agent_name,
            fetch: Arc::new(fetch),
        }
    }

    pub fn agent_name(&self) -> Option<&str> {
        self.agent_name.as_deref()
    }

    pub async fn fetch(&self) -> Result<ConnectionDetails, BootstrapError> {
        (self.fetch)().await
    }
}

impl fmt::Debug for CustomSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomSource")
            .field("agent_name", &self.agent_name)
            .finish_non_exhaustive()
    }
}

/// The three ways credentials can be obtained.
#[derive(Debug)]
pub enum TokenSourceKind {
    Sandbox(SandboxSource),
    Endpoint(EndpointRef),
    Custom(CustomSource),
}

/// Tag of a [`TokenSourceKind`], used for behavioural comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSourceVariant {
    Sandbox,
    Endpoint,
    Custom,
}

/// What a token source does, independent of which instance it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSourceDescriptor {
    pub variant: TokenSourceVariant,
    pub agent_name: Option<String>,
}

/// A shared handle to a token source.
///
/// Clones point at the same source, and equality is identity: two handles are
/// equal only when they share the same underlying source.
#[derive(Debug, Clone)]
pub struct TokenSource {
    kind: Arc<TokenSourceKind>,
}

impl TokenSource {
    pub fn sandbox(source: SandboxSource) -> Self {
        Self::from_kind(TokenSourceKind::Sandbox(source))
    }

    pub fn endpoint(path: impl Into<String>) -> Self {
        Self::from_kind(TokenSourceKind::Endpoint(EndpointRef::new(path)))
    }

    pub fn custom<F>(fetch: F) -> Self
    where
        F: Fn() -> DetailsFuture + Send + Sync + 'static,
    {
        Self::from_kind(TokenSourceKind::Custom(CustomSource::new(None, fetch)))
    }

    fn from_kind(kind: TokenSourceKind) -> Self {
        Self {
            kind: Arc::new(kind),
        }
    }

    pub fn kind(&self) -> &TokenSourceKind {
        &self.kind
    }

    pub fn descriptor(&self) -> TokenSourceDescriptor {
        match self.kind() {
            TokenSourceKind::Sandbox(source) => TokenSourceDescriptor {
                variant: TokenSourceVariant::Sandbox,
                agent_name: source.agent_name.clone(),
            },
            TokenSourceKind::Endpoint(_) => TokenSourceDescriptor {
                variant: TokenSourceVariant::Endpoint,
                agent_name: None,
            },
            TokenSourceKind::Custom(source) => TokenSourceDescriptor {
                variant: TokenSourceVariant::Custom,
                agent_name: source.agent_name.clone(),
            },
        }
    }
}

impl PartialEq for TokenSource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.kind, &other.kind)
    }
}

impl Eq for TokenSource {}

/// How the non-sandbox path reaches the connection-details route.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EndpointStrategy {
    /// Wrap the POST in a custom source that embeds the agent name.
    #[default]
    CustomFetch,
    /// Hand a bare route reference to the session, which posts with its hint.
    DirectEndpoint,
}

/// Build-time inputs to token source selection. Read once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceEnv {
    /// Sandbox connection-details endpoint. Its presence turns sandbox mode on.
    pub sandbox_endpoint: Option<String>,
    pub strategy: EndpointStrategy,
}

impl SourceEnv {
    pub fn is_sandbox(&self) -> bool {
        self.sandbox_endpoint.is_some()
    }
}

/// Picks the token source for an effective configuration.
pub fn select_token_source(
    env: &SourceEnv,
    config: &EffectiveConfig,
    transport: Arc<dyn HttpTransport>,
) -> TokenSource {
    if let Some(endpoint) = &env.sandbox_endpoint {
        debug!(%endpoint, agent_name = %config.agent_name(), "Selected sandbox token source");
        return TokenSource::sandbox(SandboxSource::new(endpoint.clone(), config));
    }

    match env.strategy {
        EndpointStrategy::DirectEndpoint => {
            debug!("Selected direct endpoint token source");
            TokenSource::endpoint(CONNECTION_DETAILS_PATH)
        }
        EndpointStrategy::CustomFetch => {
            let agent_name = config.dispatch_agent_name().map(str::to_owned);
            debug!(agent_name = ?agent_name, "Selected custom token source");
            let body = connection_details_body(agent_name.as_deref());
            let source = CustomSource::new(agent_name, move || {
                let transport = transport.clone();
                let request = PostRequest::new(CONNECTION_DETAILS_PATH, body.clone());
                async move {
                    let payload = transport.post_json(request).await?;
                    ConnectionDetails::from_value(payload)
                }
                .boxed()
            });
            TokenSource::from_kind(TokenSourceKind::Custom(source))
        }
    }
}
