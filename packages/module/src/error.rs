//! Error types for the database module.

use dbjson_table_store::StoreError;

use crate::protocol::Handle;

/// Failures of the connection registry.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The handle is already bound to an open connection.
    #[error("handle {0} is already registered")]
    AlreadyExists(Handle),

    /// No open connection has this handle.
    #[error("handle {0} is not registered")]
    NotFound(Handle),

    /// The backing store failed while opening or closing.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of a known operation, reported back to the host in the
/// response's `error` field.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("Database ID exists!")]
    DatabaseExists(Handle),

    #[error("Database ID not found.")]
    DatabaseNotFound(Handle),

    #[error("invalid payload for {operation}: {source}")]
    InvalidPayload {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to encode result: {0}")]
    Encode(serde_json::Error),
}

impl From<RegistryError> for CallError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::AlreadyExists(handle) => CallError::DatabaseExists(handle),
            RegistryError::NotFound(handle) => CallError::DatabaseNotFound(handle),
            RegistryError::Store(e) => CallError::Store(e),
        }
    }
}

/// Failures that end the module's run loop.
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    /// The first message from the host was not a handshake.
    #[error("expected a handshake as the first message, got {received}")]
    Handshake { received: String },

    /// The host side of the channel went away.
    #[error("channel closed")]
    ChannelClosed,
}

/// Result alias for run-loop operations.
pub type Result<T> = std::result::Result<T, ModuleError>;
