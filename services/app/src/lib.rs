//! Coach App Library Crate
//!
//! The runtime side of the session client: configuration, the composition
//! root, bootstrap effects, the notification surface, presentation leaves and
//! the signalling connector. The `coach` binary is a thin wrapper around this
//! library.

pub mod app;
pub mod config;
pub mod connector;
pub mod context;
pub mod effects;
pub mod notify;
pub mod views;

#[cfg(test)]
mod testing;
