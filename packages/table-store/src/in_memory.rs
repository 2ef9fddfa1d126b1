//! In-memory table store with no backing file.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::tables::{self, Tables};
use crate::traits::{FlushOutcome, TableStore};

/// A table store that lives entirely in memory.
///
/// # Example
///
/// ```rust,ignore
/// use dbjson_table_store::{InMemoryTableStore, TableStore};
/// use serde_json::json;
///
/// let mut store = InMemoryTableStore::new();
/// store.write("users", "alice", json!({"age": 30})).await?;
///
/// let value = store.read("users", "alice").await?;
/// assert_eq!(value, Some(json!({"age": 30})));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryTableStore {
    tables: Tables,
    closed: bool,
}

impl InMemoryTableStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with initial tables.
    pub fn with_tables(tables: Tables) -> Self {
        Self {
            tables,
            closed: false,
        }
    }

    fn open_tables(&mut self) -> Result<&mut Tables> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        Ok(&mut self.tables)
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn read(&mut self, table: &str, key: &str) -> Result<Option<Value>> {
        let tables = self.open_tables()?;
        Ok(tables::get(tables, table, key)?.cloned())
    }

    async fn write(&mut self, table: &str, key: &str, value: Value) -> Result<()> {
        tables::set(self.open_tables()?, table, key, value)
    }

    async fn delete_key(&mut self, table: &str, key: &str) -> Result<()> {
        tables::remove_key(self.open_tables()?, table, key)?;
        Ok(())
    }

    async fn delete_table(&mut self, table: &str) -> Result<()> {
        tables::remove_table(self.open_tables()?, table);
        Ok(())
    }

    async fn tables(&mut self) -> Result<Vec<String>> {
        Ok(tables::table_names(self.open_tables()?))
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<String>> {
        tables::table_keys(self.open_tables()?, table)
    }

    async fn flush(&mut self) -> Result<FlushOutcome> {
        self.open_tables()?;
        Ok(FlushOutcome::Clean)
    }

    async fn flush_and_close(&mut self) -> Result<()> {
        self.open_tables()?;
        self.closed = true;
        Ok(())
    }
}
