// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

// Session token persistence. The store is injected into the client so the
// token survives across separate fmctl invocations.

use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{FmError, FmResult};

/// Slot the FortiManager session token lives in
pub const SESSION_KEY: &str = "session";

/// Key-value context shared between invocations.
/// Implementations do no locking of their own; callers serialise access.
pub trait SessionStore: Send + Sync {
    fn load(&self, key: &str) -> FmResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> FmResult<()>;
}

/// JSON object on disk, one top-level key per slot
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_context(&self) -> FmResult<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            FmError::Store(format!("Failed to read {}: {e}", self.path.display()))
        })?;

        if content.trim().is_empty() {
            return Ok(Map::new());
        }

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) | Err(_) => Err(FmError::Store(format!(
                "Context file {} is not a JSON object",
                self.path.display()
            ))),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self, key: &str) -> FmResult<Option<String>> {
        let context = self.read_context()?;
        Ok(context
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string()))
    }

    fn save(&self, key: &str, value: &str) -> FmResult<()> {
        let mut context = self.read_context()?;
        context.insert(key.to_string(), Value::String(value.to_string()));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = serde_json::to_string_pretty(&Value::Object(context))
            .map_err(|e| FmError::Store(e.to_string()))?;

        // Write-then-rename so an interrupted save never leaves half a file
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content).map_err(|e| {
            FmError::Store(format!("Failed to write {}: {e}", tmp_path.display()))
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|e| {
            FmError::Store(format!("Failed to replace {}: {e}", self.path.display()))
        })?;

        tracing::debug!(path = %self.path.display(), key, "persisted session context");
        Ok(())
    }
}

/// Process-local store, used when nothing should touch the disk
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn with_value(key: &str, value: &str) -> Self {
        let store = Self::new();
        if let Ok(mut values) = store.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        store
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, key: &str) -> FmResult<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| FmError::Store("session store poisoned".to_string()))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> FmResult<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| FmError::Store("session store poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
