//! The table store contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// What a call to [`TableStore::flush`] actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The table map was written to its backing storage.
    Written,
    /// Nothing changed since the last save.
    Clean,
    /// Another save was already in flight; this request was dropped.
    Coalesced,
}

/// A key-value-within-table store backing one database connection.
///
/// Tables are implicit: they come into existence on the first `write` and
/// only go away through `delete_table`. Removing the last key of a table
/// leaves an empty table behind.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn TableStore>`.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Read the value stored under `key` in `table`.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - The table or the key does not exist.
    /// * `Ok(Some(value))` - The stored value.
    /// * `Err(StoreError)` - The table could not be read.
    async fn read(&mut self, table: &str, key: &str) -> Result<Option<Value>>;

    /// Store `value` under `key` in `table`, creating the table if needed.
    async fn write(&mut self, table: &str, key: &str, value: Value) -> Result<()>;

    /// Remove `key` from `table`. Missing tables and keys are not an error.
    async fn delete_key(&mut self, table: &str, key: &str) -> Result<()>;

    /// Remove `table` and every key in it. Missing tables are not an error.
    async fn delete_table(&mut self, table: &str) -> Result<()>;

    /// Names of all tables, including empty ones.
    async fn tables(&mut self) -> Result<Vec<String>>;

    /// Keys of `table`; empty when the table does not exist.
    async fn keys(&mut self, table: &str) -> Result<Vec<String>>;

    /// Persist pending changes.
    async fn flush(&mut self) -> Result<FlushOutcome>;

    /// Persist pending changes and release the store.
    ///
    /// Any later call returns [`StoreError::Closed`](crate::StoreError::Closed).
    async fn flush_and_close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: TableStore + ?Sized> TableStore for Box<T> {
    async fn read(&mut self, table: &str, key: &str) -> Result<Option<Value>> {
        self.as_mut().read(table, key).await
    }

    async fn write(&mut self, table: &str, key: &str, value: Value) -> Result<()> {
        self.as_mut().write(table, key, value).await
    }

    async fn delete_key(&mut self, table: &str, key: &str) -> Result<()> {
        self.as_mut().delete_key(table, key).await
    }

    async fn delete_table(&mut self, table: &str) -> Result<()> {
        self.as_mut().delete_table(table).await
    }

    async fn tables(&mut self) -> Result<Vec<String>> {
        self.as_mut().tables().await
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<String>> {
        self.as_mut().keys(table).await
    }

    async fn flush(&mut self) -> Result<FlushOutcome> {
        self.as_mut().flush().await
    }

    async fn flush_and_close(&mut self) -> Result<()> {
        self.as_mut().flush_and_close().await
    }
}
