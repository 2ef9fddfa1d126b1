//! JSON-file-backed table store.
//!
//! The whole table map is loaded into memory on open and written back as a
//! single JSON object on flush. Saves go through a temp file and a rename so
//! a crash mid-save never leaves a truncated database behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::error::{Result, StoreError};
use crate::tables::{self, Tables};
use crate::traits::{FlushOutcome, TableStore};

/// Persistence knobs for [`JsonFileStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Save after every mutation instead of waiting for a flush.
    pub save_on_write: bool,
    /// Pretty-print the database file.
    pub human_readable: bool,
    /// Flush in the background at this interval. Ignored when
    /// `save_on_write` is set.
    pub autosave_interval: Option<Duration>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            save_on_write: false,
            human_readable: false,
            autosave_interval: Some(Duration::from_secs(5)),
        }
    }
}

/// State shared between the store and its autosave task.
#[derive(Debug)]
struct Shared {
    path: PathBuf,
    human_readable: bool,
    tables: Mutex<Tables>,
    dirty: AtomicBool,
    saving: AtomicBool,
}

/// Clears the in-flight flag when a save ends, and puts the dirty mark back
/// if the save did not complete.
struct SaveGuard<'a> {
    shared: &'a Shared,
    committed: bool,
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.shared.dirty.store(true, Ordering::Release);
        }
        self.shared.saving.store(false, Ordering::Release);
    }
}

impl Shared {
    async fn save(&self) -> Result<FlushOutcome> {
        if self.saving.swap(true, Ordering::AcqRel) {
            return Ok(FlushOutcome::Coalesced);
        }
        let mut guard = SaveGuard {
            shared: self,
            committed: true,
        };

        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(FlushOutcome::Clean);
        }
        guard.committed = false;

        let bytes = {
            let tables = self.tables.lock().await;
            if self.human_readable {
                serde_json::to_vec_pretty(&*tables)?
            } else {
                serde_json::to_vec(&*tables)?
            }
        };

        tracing::debug!("Writing {}...", self.path.display());
        write_atomically(&self.path, &bytes).await?;

        guard.committed = true;
        Ok(FlushOutcome::Written)
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| StoreError::io(&tmp_path, e))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

async fn load(path: &Path) -> Result<Option<Tables>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    tracing::debug!("Reading {}...", path.display());
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(Tables::new()));
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(Some(map)),
        Ok(_) => Err(StoreError::Corrupt {
            path: path.to_owned(),
            message: "top-level value must be a JSON object".to_string(),
        }),
        Err(e) => Err(StoreError::Corrupt {
            path: path.to_owned(),
            message: e.to_string(),
        }),
    }
}

struct Autosave {
    task: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

fn spawn_autosave(shared: Arc<Shared>, interval: Duration) -> Autosave {
    let shutdown = Arc::new(Notify::new());
    let stop = shutdown.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match shared.save().await {
                        Ok(FlushOutcome::Coalesced) => {
                            tracing::debug!("autosave of {} skipped, save in progress", shared.path.display());
                        }
                        Ok(_) => {}
                        Err(e) => tracing::warn!("autosave of {} failed: {}", shared.path.display(), e),
                    }
                }
                _ = stop.notified() => break,
            }
        }
    });

    Autosave { task, shutdown }
}

/// A table store persisted as one JSON file.
///
/// File layout is a single object: `{"<table>": {"<key>": <value>, ...}, ...}`.
pub struct JsonFileStore {
    shared: Arc<Shared>,
    options: StoreOptions,
    autosave: Option<Autosave>,
    closed: bool,
}

impl JsonFileStore {
    /// Open (or create) the database file at `path`.
    ///
    /// A missing or empty file opens as an empty store; the file is written
    /// on the first flush. A file that does not hold a JSON object fails with
    /// [`StoreError::Corrupt`].
    pub async fn open(path: impl Into<PathBuf>, options: StoreOptions) -> Result<Self> {
        let path = path.into();
        let loaded = load(&path).await?;
        let existed = loaded.is_some();

        let shared = Arc::new(Shared {
            path,
            human_readable: options.human_readable,
            tables: Mutex::new(loaded.unwrap_or_default()),
            dirty: AtomicBool::new(!existed),
            saving: AtomicBool::new(false),
        });

        let autosave = match options.autosave_interval {
            Some(interval) if !options.save_on_write => {
                Some(spawn_autosave(shared.clone(), interval))
            }
            _ => None,
        };

        Ok(Self {
            shared,
            options,
            autosave,
            closed: false,
        })
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Whether there are changes not yet written to disk.
    pub fn is_dirty(&self) -> bool {
        self.shared.dirty.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    async fn mutate<T>(&mut self, f: impl FnOnce(&mut Tables) -> Result<T> + Send) -> Result<T> {
        self.ensure_open()?;
        let out = {
            let mut tables = self.shared.tables.lock().await;
            let out = f(&mut *tables)?;
            self.shared.dirty.store(true, Ordering::Release);
            out
        };

        if self.options.save_on_write {
            self.shared.save().await?;
        }
        Ok(out)
    }

    async fn stop_autosave(&mut self) {
        if let Some(autosave) = self.autosave.take() {
            autosave.shutdown.notify_one();
            if let Err(e) = autosave.task.await {
                tracing::warn!("autosave task for {} ended abnormally: {}", self.path().display(), e);
            }
        }
    }
}

impl Drop for JsonFileStore {
    fn drop(&mut self) {
        if let Some(autosave) = self.autosave.take() {
            autosave.task.abort();
        }
    }
}

#[async_trait]
impl TableStore for JsonFileStore {
    async fn read(&mut self, table: &str, key: &str) -> Result<Option<Value>> {
        self.ensure_open()?;
        let tables = self.shared.tables.lock().await;
        Ok(tables::get(&tables, table, key)?.cloned())
    }

    async fn write(&mut self, table: &str, key: &str, value: Value) -> Result<()> {
        self.mutate(|tables| tables::set(tables, table, key, value))
            .await
    }

    async fn delete_key(&mut self, table: &str, key: &str) -> Result<()> {
        self.mutate(|tables| tables::remove_key(tables, table, key))
            .await?;
        Ok(())
    }

    async fn delete_table(&mut self, table: &str) -> Result<()> {
        self.mutate(|tables| Ok(tables::remove_table(tables, table)))
            .await?;
        Ok(())
    }

    async fn tables(&mut self) -> Result<Vec<String>> {
        self.ensure_open()?;
        let tables = self.shared.tables.lock().await;
        Ok(tables::table_names(&tables))
    }

    async fn keys(&mut self, table: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let tables = self.shared.tables.lock().await;
        tables::table_keys(&tables, table)
    }

    async fn flush(&mut self) -> Result<FlushOutcome> {
        self.ensure_open()?;
        self.shared.save().await
    }

    async fn flush_and_close(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.stop_autosave().await;
        self.closed = true;
        self.shared.save().await?;
        Ok(())
    }
}
