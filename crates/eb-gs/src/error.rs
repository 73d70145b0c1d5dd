//! Bridge error types

use thiserror::Error;

/// Errors surfaced by the bridge lifecycle and the freeze path.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("invalid configuration: {0}")]
    Config(#[from] eb_core::ConfigError),
    #[error("renderer backend failed to open: {0}")]
    BackendOpen(String),
    #[error("backend freeze failed: {0}")]
    BackendFreeze(String),
    #[error("failed to spawn render thread: {0}")]
    ThreadSpawn(#[from] std::io::Error),
}

/// Errors from serializing or restoring parser snapshots.
#[derive(Debug, Error)]
pub enum SaveStateError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] bincode::error::EncodeError),
    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] bincode::error::DecodeError),
}
