//! Routes calls from the host to registry and store operations.
//!
//! Every [`CallEnvelope`] produces exactly one [`ResponseEnvelope`]:
//!
//! - unknown operation → `found: false`, no error
//! - known operation that succeeds → `found: true`, result payload
//! - known operation that fails → `found: true`, `error` set, null payload
//!
//! Storage failures inside `get_data` and `set_data` are not failures of
//! the call; they come back as `{"success": false}` results. Storage
//! failures of every other operation are reported in `error`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::{CallError, RegistryError};
use crate::protocol::{
    CallEnvelope, ConnectRequest, ConnectResult, DefaultConfig, GetResult, Handle, HandleRequest,
    RecordRequest, ResponseEnvelope, SetRequest, SuccessResult, TableRequest,
};
use crate::registry::{Connection, ConnectionRegistry, StoreFactory};

/// The operations this module answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    DefaultCfg,
    ListDb,
    ConnectDb,
    GetData,
    SetData,
    DeleteData,
    DeleteTable,
    Disconnect,
}

impl Operation {
    pub const ALL: [Operation; 8] = [
        Operation::DefaultCfg,
        Operation::ListDb,
        Operation::ConnectDb,
        Operation::GetData,
        Operation::SetData,
        Operation::DeleteData,
        Operation::DeleteTable,
        Operation::Disconnect,
    ];

    /// Name used in `call_cmd`.
    pub fn name(self) -> &'static str {
        match self {
            Operation::DefaultCfg => "default_cfg",
            Operation::ListDb => "list_db",
            Operation::ConnectDb => "connect_db",
            Operation::GetData => "get_data",
            Operation::SetData => "set_data",
            Operation::DeleteData => "delete_data",
            Operation::DeleteTable => "delete_table",
            Operation::Disconnect => "disconnect",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The operation name is not one this module provides.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// Settings the dispatcher needs to resolve calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Relative database files named by `connect_db` are resolved here.
    pub data_dir: PathBuf,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
        }
    }
}

fn decode<T: DeserializeOwned>(operation: Operation, payload: Value) -> Result<T, CallError> {
    serde_json::from_value(payload).map_err(|source| CallError::InvalidPayload {
        operation: operation.name(),
        source,
    })
}

fn encode<T: Serialize>(result: T) -> Result<Value, CallError> {
    serde_json::to_value(result).map_err(CallError::Encode)
}

/// Answers calls against its own connection registry.
pub struct Dispatcher<F: StoreFactory> {
    registry: ConnectionRegistry<F>,
    config: DispatcherConfig,
}

impl<F: StoreFactory> Dispatcher<F> {
    pub fn new(factory: F, config: DispatcherConfig) -> Self {
        Self {
            registry: ConnectionRegistry::new(factory),
            config,
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry<F> {
        &self.registry
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Answer one call. Never fails: every outcome is a response.
    pub async fn dispatch(&mut self, call: CallEnvelope) -> ResponseEnvelope {
        let operation = match call.operation.parse::<Operation>() {
            Ok(operation) => operation,
            Err(e) => {
                tracing::debug!("{}", e);
                return ResponseEnvelope::not_found(&call);
            }
        };

        tracing::debug!(%operation, "handling call");
        match self.handle(operation, call.payload.clone()).await {
            Ok(payload) => ResponseEnvelope::ok(&call, payload),
            Err(e) => {
                tracing::debug!(%operation, error = %e, "call failed");
                ResponseEnvelope::failed(&call, e.to_string())
            }
        }
    }

    /// Close every connection, logging flushes that fail.
    pub async fn shutdown(&mut self) -> Vec<(Handle, RegistryError)> {
        let failures = self.registry.close_all().await;
        for (handle, e) in &failures {
            tracing::error!(handle, "failed to close database: {}", e);
        }
        failures
    }

    fn connection(&mut self, handle: Handle) -> Result<&mut Connection, CallError> {
        self.registry
            .get_mut(handle)
            .ok_or(CallError::DatabaseNotFound(handle))
    }

    async fn handle(&mut self, operation: Operation, payload: Value) -> Result<Value, CallError> {
        match operation {
            Operation::DefaultCfg => encode(DefaultConfig::default()),
            Operation::ListDb => encode(self.registry.list()),
            Operation::ConnectDb => {
                let request: ConnectRequest = decode(operation, payload)?;
                let location = self.config.data_dir.join(&request.params.file);

                self.registry
                    .open(request.handle, &location, request.display_name)
                    .await?;
                tracing::info!(
                    handle = request.handle,
                    "connected database {}",
                    location.display()
                );

                encode(ConnectResult {
                    success: true,
                    handle: request.handle,
                })
            }
            Operation::GetData => {
                let request: RecordRequest = decode(operation, payload)?;
                let connection = self.connection(request.handle)?;

                let result = match connection.store().read(&request.table, &request.key).await {
                    Ok(data) => GetResult {
                        success: true,
                        data: data.unwrap_or(Value::Null),
                    },
                    Err(e) => {
                        tracing::warn!(handle = request.handle, "read failed: {}", e);
                        GetResult {
                            success: false,
                            data: Value::Null,
                        }
                    }
                };
                encode(result)
            }
            Operation::SetData => {
                let request: SetRequest = decode(operation, payload)?;
                let connection = self.connection(request.handle)?;

                let success = match connection
                    .store()
                    .write(&request.table, &request.key, request.value)
                    .await
                {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(handle = request.handle, "write failed: {}", e);
                        false
                    }
                };
                encode(SuccessResult { success })
            }
            Operation::DeleteData => {
                let request: RecordRequest = decode(operation, payload)?;
                self.connection(request.handle)?
                    .store()
                    .delete_key(&request.table, &request.key)
                    .await?;
                encode(SuccessResult { success: true })
            }
            Operation::DeleteTable => {
                let request: TableRequest = decode(operation, payload)?;
                self.connection(request.handle)?
                    .store()
                    .delete_table(&request.table)
                    .await?;
                encode(SuccessResult { success: true })
            }
            Operation::Disconnect => {
                let request: HandleRequest = decode(operation, payload)?;
                self.registry.close(request.handle).await?;
                tracing::info!(handle = request.handle, "disconnected database");
                Ok(Value::Null)
            }
        }
    }
}
