// SPDX-FileCopyrightText: GoCortexIO
// SPDX-License-Identifier: AGPL-3.0-or-later

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Single-writer guard around a session context file.
/// Holds `<store>.lock` containing our PID until dropped.
#[derive(Debug)]
pub struct StoreLock {
    lock_path: PathBuf,
}

impl StoreLock {
    pub fn lock_path_for(store_path: &Path) -> PathBuf {
        let mut name = store_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        store_path.with_file_name(name)
    }

    /// Fails when a live process already holds the lock; stale locks are cleared.
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let lock_path = Self::lock_path_for(store_path);

        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }

        if lock_path.exists() {
            match fs::read_to_string(&lock_path) {
                Ok(contents) => match contents.trim().parse::<u32>() {
                    Ok(holder) if Self::is_process_running(holder) => {
                        return Err(anyhow::anyhow!(
                            "Session store {} is locked by another fmctl process (PID {}). \
                             Wait for it to finish or remove {} if the process is stuck.",
                            store_path.display(),
                            holder,
                            lock_path.display()
                        ));
                    }
                    Ok(holder) => {
                        tracing::warn!(pid = holder, "removing stale session lock");
                        fs::remove_file(&lock_path).context("Failed to remove stale lock file")?;
                    }
                    Err(_) => {
                        tracing::warn!(path = %lock_path.display(), "removing unreadable session lock");
                        let _ = fs::remove_file(&lock_path);
                    }
                },
                Err(_) => {
                    tracing::warn!(path = %lock_path.display(), "removing unreadable session lock");
                    let _ = fs::remove_file(&lock_path);
                }
            }
        }

        fs::write(&lock_path, process::id().to_string())
            .with_context(|| format!("Failed to create lock file at {}", lock_path.display()))?;

        Ok(Self { lock_path })
    }

    #[cfg(unix)]
    fn is_process_running(pid: u32) -> bool {
        // Signal 0 probes for existence without touching the process
        process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn is_process_running(pid: u32) -> bool {
        process::Command::new("tasklist")
            .args(["/FI", &format!("PID eq {pid}"), "/NH", "/FO", "CSV"])
            .output()
            .map(|output| String::from_utf8_lossy(&output.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    fn is_process_running(_pid: u32) -> bool {
        true
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            tracing::warn!(path = %self.lock_path.display(), error = %e, "failed to release session lock");
        }
    }
}
