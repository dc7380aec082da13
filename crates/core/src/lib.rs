//! Coach Session Bootstrap
//!
//! The policy that decides which agent a client talks to and how it obtains
//! connection credentials, plus the memoized factory that turns that decision
//! into a shared session.

pub mod error;
pub mod identity;
pub mod memo;
pub mod session;
pub mod token_source;
pub mod transport;

pub use error::{BootstrapError, TransportError};
pub use identity::{AppConfig, EffectiveConfig, resolve_agent_name};
pub use session::{ConnectionState, SessionEvent, SessionFactory, SessionHandle};
pub use token_source::{ConnectionDetails, EndpointStrategy, SourceEnv, TokenSource, select_token_source};
