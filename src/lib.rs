//! Library crate for nexus-display-back, exposing modules for binaries and tests.

/// Environment-driven process configuration.
pub mod config;
/// Remote database client and on-disk stores.
pub mod dao;
/// Wire types.
pub mod dto;
/// Per-command error taxonomy.
pub mod error;
/// HTTP and WebSocket routes.
pub mod routes;
/// Command handling and background tasks.
pub mod services;
/// Shared process state.
pub mod state;
