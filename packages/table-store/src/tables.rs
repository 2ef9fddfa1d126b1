//! Helpers over the in-memory table map shared by every store.
//!
//! The map has one entry per table; each table is a JSON object from key to
//! value. Any other shape under a table name is reported as
//! [`StoreError::NotATable`].

use serde_json::{Map, Value};

use crate::error::{Result, StoreError};

/// Table name → (key → value).
pub type Tables = Map<String, Value>;

fn table<'tree>(tables: &'tree Tables, name: &str) -> Result<Option<&'tree Map<String, Value>>> {
    match tables.get(name) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(StoreError::NotATable {
            table: name.to_owned(),
        }),
    }
}

fn table_mut<'tree>(
    tables: &'tree mut Tables,
    name: &str,
) -> Result<Option<&'tree mut Map<String, Value>>> {
    match tables.get_mut(name) {
        None => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(StoreError::NotATable {
            table: name.to_owned(),
        }),
    }
}

pub fn get<'tree>(tables: &'tree Tables, table_name: &str, key: &str) -> Result<Option<&'tree Value>> {
    Ok(table(tables, table_name)?.and_then(|map| map.get(key)))
}

pub fn set(tables: &mut Tables, table_name: &str, key: &str, value: Value) -> Result<()> {
    if !tables.contains_key(table_name) {
        tables.insert(table_name.to_owned(), Value::Object(Map::new()));
    }

    if let Some(map) = table_mut(tables, table_name)? {
        map.insert(key.to_owned(), value);
    }
    Ok(())
}

/// Returns whether a key was actually removed.
pub fn remove_key(tables: &mut Tables, table_name: &str, key: &str) -> Result<bool> {
    Ok(table_mut(tables, table_name)?
        .map(|map| map.remove(key).is_some())
        .unwrap_or(false))
}

/// Returns whether a table was actually removed.
pub fn remove_table(tables: &mut Tables, table_name: &str) -> bool {
    tables.remove(table_name).is_some()
}

pub fn table_names(tables: &Tables) -> Vec<String> {
    tables.keys().cloned().collect()
}

pub fn table_keys(tables: &Tables, table_name: &str) -> Result<Vec<String>> {
    Ok(table(tables, table_name)?
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default())
}
