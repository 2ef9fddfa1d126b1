//! Settings for a module instance.

use std::path::PathBuf;

use dbjson_table_store::StoreOptions;

use crate::dispatcher::DispatcherConfig;

/// Configuration for the database module.
#[derive(Debug, Clone)]
pub struct ModuleConfig {
    /// Directory relative database files are resolved against.
    pub data_dir: PathBuf,

    /// Options every opened store is created with.
    pub store: StoreOptions,

    /// Maximum number of host messages waiting to be handled.
    pub channel_capacity: usize,
}

impl ModuleConfig {
    pub fn dispatcher(&self) -> DispatcherConfig {
        DispatcherConfig {
            data_dir: self.data_dir.clone(),
        }
    }
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            store: StoreOptions::default(),
            channel_capacity: 64,
        }
    }
}
