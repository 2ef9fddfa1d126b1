//! # dbjson-module
//!
//! A database backend module. A host process talks to it over a message
//! channel, opens JSON-backed databases under caller-chosen handles, and
//! reads and writes values addressed by table and key.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐  NDJSON   ┌─────────┐  CallEnvelope  ┌────────────┐
//! │   host   │ ────────► │ Module  │ ─────────────► │ Dispatcher │
//! │          │ ◄──────── │ (run)   │ ◄───────────── │            │
//! └──────────┘           └─────────┘ ResponseEnvelope└─────┬──────┘
//!                                                         │
//!                                              ┌──────────▼─────────┐
//!                                              │ ConnectionRegistry │
//!                                              │ handle → TableStore│
//!                                              └────────────────────┘
//! ```
//!
//! - [`protocol`]: wire messages and per-operation payloads
//! - [`channel`] and [`stdio`]: the module end of the host channel
//! - [`registry`]: open connections keyed by handle
//! - [`dispatcher`]: operation routing and error mapping
//! - [`module`]: handshake, call loop and teardown

pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod module;
pub mod protocol;
pub mod registry;
pub mod stdio;

pub use channel::{pair, HostChannel, ModuleChannel};
pub use config::ModuleConfig;
pub use dispatcher::{Dispatcher, DispatcherConfig, Operation};
pub use error::{CallError, ModuleError, RegistryError, Result};
pub use module::Module;
pub use protocol::{CallEnvelope, Handle, HostMessage, ModuleMessage, ResponseEnvelope};
pub use registry::{ConnectionInfo, ConnectionRegistry, InMemoryFactory, JsonFileFactory, StoreFactory};
