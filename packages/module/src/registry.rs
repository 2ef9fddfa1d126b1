//! Registry of open database connections keyed by caller-assigned handles.
//!
//! The registry is the single source of truth for which handles are live:
//! - `open` binds a fresh store to an unused handle
//! - `close` flushes the store and frees the handle for reuse
//! - `list` returns a snapshot in the order connections were opened

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use dbjson_table_store::{InMemoryTableStore, JsonFileStore, StoreError, StoreOptions, TableStore};
use serde::{Deserialize, Serialize};

use crate::error::RegistryError;
use crate::protocol::Handle;

/// Creates the store behind a new connection.
#[async_trait]
pub trait StoreFactory: Send + Sync {
    async fn create(&self, location: &Path) -> Result<Box<dyn TableStore>, StoreError>;
}

/// Opens [`JsonFileStore`]s with fixed options.
#[derive(Debug, Clone, Default)]
pub struct JsonFileFactory {
    options: StoreOptions,
}

impl JsonFileFactory {
    pub fn new(options: StoreOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl StoreFactory for JsonFileFactory {
    async fn create(&self, location: &Path) -> Result<Box<dyn TableStore>, StoreError> {
        let store = JsonFileStore::open(location, self.options.clone()).await?;
        Ok(Box::new(store))
    }
}

/// Ignores the location and hands out empty in-memory stores.
#[derive(Debug, Clone, Copy, Default)]
pub struct InMemoryFactory;

#[async_trait]
impl StoreFactory for InMemoryFactory {
    async fn create(&self, _location: &Path) -> Result<Box<dyn TableStore>, StoreError> {
        Ok(Box::new(InMemoryTableStore::new()))
    }
}

/// Public view of a registered connection, as returned by `list_db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub handle: Handle,
    pub display_name: String,
}

/// An open database connection.
pub struct Connection {
    handle: Handle,
    display_name: String,
    location: PathBuf,
    store: Box<dyn TableStore>,
}

impl Connection {
    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn store(&mut self) -> &mut dyn TableStore {
        self.store.as_mut()
    }

    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            handle: self.handle,
            display_name: self.display_name.clone(),
        }
    }
}

/// Maps handles to open connections, one connection per handle.
pub struct ConnectionRegistry<F: StoreFactory> {
    factory: F,
    connections: Vec<Connection>,
}

impl<F: StoreFactory> ConnectionRegistry<F> {
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            connections: Vec::new(),
        }
    }

    /// Open a store at `location` and register it under `handle`.
    ///
    /// Fails with [`RegistryError::AlreadyExists`] if `handle` is live; the
    /// existing connection is left untouched.
    pub async fn open(
        &mut self,
        handle: Handle,
        location: impl Into<PathBuf>,
        display_name: impl Into<String>,
    ) -> Result<(), RegistryError> {
        if self.contains(handle) {
            return Err(RegistryError::AlreadyExists(handle));
        }

        let location = location.into();
        let store = self.factory.create(&location).await?;

        self.connections.push(Connection {
            handle,
            display_name: display_name.into(),
            location,
            store,
        });
        Ok(())
    }

    /// Snapshot of the open connections in the order they were opened.
    pub fn list(&self) -> Vec<ConnectionInfo> {
        self.connections.iter().map(Connection::info).collect()
    }

    pub fn get(&self, handle: Handle) -> Option<&Connection> {
        self.connections.iter().find(|c| c.handle == handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.handle == handle)
    }

    /// Unregister `handle` and flush its store.
    ///
    /// The handle is free again once this returns, even when the final
    /// flush fails; the flush error is still returned.
    pub async fn close(&mut self, handle: Handle) -> Result<(), RegistryError> {
        let index = self
            .connections
            .iter()
            .position(|c| c.handle == handle)
            .ok_or(RegistryError::NotFound(handle))?;

        let mut connection = self.connections.remove(index);
        connection.store.flush_and_close().await?;
        Ok(())
    }

    /// Close every connection, returning the ones whose final flush failed.
    pub async fn close_all(&mut self) -> Vec<(Handle, RegistryError)> {
        let mut failures = Vec::new();
        for mut connection in std::mem::take(&mut self.connections) {
            if let Err(e) = connection.store.flush_and_close().await {
                failures.push((connection.handle, RegistryError::from(e)));
            }
        }
        failures
    }

    pub fn contains(&self, handle: Handle) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn registry() -> ConnectionRegistry<InMemoryFactory> {
        ConnectionRegistry::new(InMemoryFactory)
    }

    struct FailingFactory;

    #[async_trait]
    impl StoreFactory for FailingFactory {
        async fn create(&self, location: &Path) -> Result<Box<dyn TableStore>, StoreError> {
            Err(StoreError::Corrupt {
                path: location.to_owned(),
                message: "unreadable".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn open_and_get() {
        let mut reg = registry();
        reg.open(1, "a.json", "main").await.unwrap();

        let conn = reg.get(1).unwrap();
        assert_eq!(conn.handle(), 1);
        assert_eq!(conn.display_name(), "main");
        assert_eq!(conn.location(), Path::new("a.json"));
        assert!(reg.get(2).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn duplicate_handle_keeps_existing_connection() {
        let mut reg = registry();
        reg.open(1, "a.json", "first").await.unwrap();
        reg.get_mut(1)
            .unwrap()
            .store()
            .write("t", "k", json!("kept"))
            .await
            .unwrap();

        let err = reg.open(1, "b.json", "second").await.unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyExists(1)));

        let conn = reg.get_mut(1).unwrap();
        assert_eq!(conn.display_name(), "first");
        assert_eq!(conn.location(), Path::new("a.json"));
        assert_eq!(
            conn.store().read("t", "k").await.unwrap(),
            Some(json!("kept"))
        );
        assert_eq!(reg.len(), 1);
    }

    #[tokio::test]
    async fn close_frees_handle_for_reuse() {
        let mut reg = registry();
        reg.open(7, "a.json", "db").await.unwrap();
        reg.close(7).await.unwrap();

        assert!(!reg.contains(7));
        assert!(reg.is_empty());
        reg.open(7, "a.json", "db again").await.unwrap();
        assert_eq!(reg.get(7).unwrap().display_name(), "db again");
    }

    #[tokio::test]
    async fn close_unknown_handle() {
        let mut reg = registry();
        assert!(matches!(
            reg.close(3).await,
            Err(RegistryError::NotFound(3))
        ));
    }

    #[tokio::test]
    async fn list_is_in_open_order() {
        let mut reg = registry();
        reg.open(2, "b.json", "second").await.unwrap();
        reg.open(1, "a.json", "first").await.unwrap();

        let handles: Vec<_> = reg.list().into_iter().map(|c| c.handle).collect();
        assert_eq!(handles, vec![2, 1]);

        reg.close(2).await.unwrap();
        assert_eq!(
            reg.list(),
            vec![ConnectionInfo {
                handle: 1,
                display_name: "first".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn factory_failure_registers_nothing() {
        let mut reg = ConnectionRegistry::new(FailingFactory);
        let err = reg.open(1, "a.json", "db").await.unwrap_err();

        assert!(matches!(err, RegistryError::Store(StoreError::Corrupt { .. })));
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn close_all_empties_registry() {
        let mut reg = registry();
        reg.open(1, "a.json", "a").await.unwrap();
        reg.open(2, "b.json", "b").await.unwrap();

        assert!(reg.close_all().await.is_empty());
        assert!(reg.is_empty());
    }

    #[tokio::test]
    async fn json_file_factory_persists_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.json");
        let factory = JsonFileFactory::new(StoreOptions {
            autosave_interval: None,
            ..StoreOptions::default()
        });

        let mut reg = ConnectionRegistry::new(factory);
        reg.open(1, &path, "db").await.unwrap();
        reg.get_mut(1)
            .unwrap()
            .store()
            .write("users", "alice", json!(42))
            .await
            .unwrap();
        reg.close(1).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"users": {"alice": 42}}));
    }

    #[test]
    fn connection_info_wire_names() {
        let info = ConnectionInfo {
            handle: 5,
            display_name: "main".to_string(),
        };
        assert_eq!(
            serde_json::to_value(info).unwrap(),
            json!({"handle": 5, "displayName": "main"})
        );
    }

    proptest! {
        #[test]
        fn replaying_distinct_handles(
            entries in prop::collection::btree_map(any::<i64>(), "[a-z]{0,8}", 0..16)
        ) {
            let rt = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();
            let listed = rt.block_on(async {
                let mut reg = registry();
                for (handle, name) in &entries {
                    reg.open(*handle, format!("{}.json", handle), name.clone())
                        .await
                        .unwrap();
                }
                reg.list()
            });

            let expected: Vec<ConnectionInfo> = entries
                .iter()
                .map(|(handle, name)| ConnectionInfo {
                    handle: *handle,
                    display_name: name.clone(),
                })
                .collect();
            prop_assert_eq!(listed, expected);
        }
    }
}
