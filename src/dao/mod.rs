/// Data access capability shared by the coordinator and its test doubles.
pub mod access;
/// Persistence of the refresh credential.
pub mod credential_store;
/// Remote data projections and persisted records.
pub mod models;
/// Client for the remote competition database and identity provider.
pub mod nexus;
/// Persistence of the selected event.
pub mod selection_store;
/// Storage error shared by the on-disk stores.
pub mod storage;
