//! Client for the remote competition database and its identity provider.

mod client;
mod config;
mod credential;
mod error;

pub use client::{NexusClient, QueryOptions};
pub use config::NexusConfig;
pub use credential::Credential;
pub use error::{NexusDaoError, NexusResult};
