//! # dbjson-table-store
//!
//! Key-value-within-table stores for the dbjson database module.
//!
//! A store holds named tables; each table maps string keys to arbitrary JSON
//! values. Tables are created implicitly by the first write and removed only
//! by an explicit `delete_table`.
//!
//! ## Implementations
//!
//! - [`JsonFileStore`] keeps every table in memory and persists them as one
//!   JSON file, either on every write, on explicit flush, or from a periodic
//!   autosave task whose overlapping saves are coalesced.
//! - [`InMemoryTableStore`] never touches the disk.

pub mod error;
pub mod in_memory;
pub mod local_disk;
pub mod tables;
pub mod traits;

pub use error::{Result, StoreError};
pub use in_memory::InMemoryTableStore;
pub use local_disk::{JsonFileStore, StoreOptions};
pub use tables::Tables;
pub use traits::{FlushOutcome, TableStore};
