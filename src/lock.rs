// Copyright 2022-2023 Debox Network
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.
//

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant, SystemTime};

use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{DavError, DavResult};

/// An exclusive write lock on one physical path.
#[derive(Debug, Clone)]
pub struct LockEntry {
    pub resource_path: PathBuf,

    /// Opaque `opaquelocktoken:` URI.
    pub token: String,

    /// Time the lock was issued or last refreshed.
    pub issued_at: SystemTime,

    pub timeout: Duration,

    /// Lock owner payload as sent by the client, echoed back verbatim.
    pub owner_xml: String,

    refreshed: Instant,
}

impl LockEntry {
    fn new(path: &Path, timeout: Duration, owner_xml: &str) -> Self {
        Self {
            resource_path: path.to_path_buf(),
            token: format!("opaquelocktoken:{}", Uuid::new_v4().hyphenated()),
            issued_at: SystemTime::now(),
            timeout,
            owner_xml: owner_xml.to_string(),
            refreshed: Instant::now(),
        }
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout.as_secs()
    }

    pub fn is_expired(&self) -> bool {
        self.refreshed.elapsed() > self.timeout
    }

    /// Time left before expiry.
    pub fn remaining(&self) -> Duration {
        self.timeout.saturating_sub(self.refreshed.elapsed())
    }

    // A lock on a collection covers its members, and a locked member pins
    // every collection above it.
    fn overlaps(&self, path: &Path) -> bool {
        path.starts_with(&self.resource_path) || self.resource_path.starts_with(path)
    }
}

/// In-memory lock table. Locks do not survive the process.
///
/// Expired entries are dropped lazily whenever they are looked at, and
/// optionally by a background sweep.
#[derive(Default, Debug)]
pub struct LockManager {
    table: Mutex<HashMap<PathBuf, LockEntry>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<PathBuf, LockEntry>> {
        // Entries are plain data, a panic elsewhere cannot leave one half-written.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the lock on `path`, or refreshes it when `presented` matches the
    /// held token. Never waits for a competitor.
    pub fn acquire(
        &self, path: &Path, timeout: Duration, owner_xml: &str, presented: Option<&str>,
    ) -> DavResult<LockEntry> {
        let table = &mut *self.table();
        if table.get(path).is_some_and(LockEntry::is_expired) {
            debug!("lock on {:?} expired", path);
            table.remove(path);
        }
        if let Some(held) = table.get_mut(path) {
            if presented != Some(held.token.as_str()) {
                return Err(DavError::conflict("resource already locked"));
            }
            held.issued_at = SystemTime::now();
            held.refreshed = Instant::now();
            held.timeout = timeout;
            debug!("lock {} refreshed", held.token);
            return Ok(held.clone());
        }
        let entry = LockEntry::new(path, timeout, owner_xml);
        debug!("lock {} created", entry.token);
        table.insert(path.to_path_buf(), entry.clone());
        Ok(entry)
    }

    pub fn release(&self, path: &Path, token: &str) -> DavResult<()> {
        let table = &mut *self.table();
        let held = table.get(path).ok_or(DavError::NotFound)?;
        if held.is_expired() {
            table.remove(path);
            return Err(DavError::NotFound);
        }
        if held.token != token {
            return Err(DavError::TokenMismatch);
        }
        debug!("lock {} released", token);
        table.remove(path);
        Ok(())
    }

    pub fn is_locked(&self, path: &Path) -> bool {
        self.discover(path).is_some()
    }

    /// The active lock on exactly `path`, if any.
    pub fn discover(&self, path: &Path) -> Option<LockEntry> {
        let table = &mut *self.table();
        if table.get(path)?.is_expired() {
            table.remove(path);
            return None;
        }
        table.get(path).cloned()
    }

    /// Fails with `Locked` when a live lock on `path`, one of its ancestors
    /// or one of its descendants is held under a token not in `presented`.
    pub fn check(&self, path: &Path, presented: &[String]) -> DavResult<()> {
        let table = &mut *self.table();
        table.retain(|_, held| !held.is_expired());
        let blocked = table
            .values()
            .any(|held| held.overlaps(path) && !presented.iter().any(|t| *t == held.token));
        if blocked {
            return Err(DavError::Locked);
        }
        Ok(())
    }

    /// Drops every lock at or below `path`, once the resource is gone.
    pub fn forget(&self, path: &Path) {
        self.table().retain(|p, _| !p.starts_with(path));
    }

    /// Removes expired entries and returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let table = &mut *self.table();
        let before = table.len();
        table.retain(|_, held| !held.is_expired());
        before - table.len()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table().len()
    }

    /// Starts a task purging expired locks every `interval`. The task ends
    /// once the manager is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let Some(locks) = weak.upgrade() else { break };
                let purged = locks.purge_expired();
                if purged > 0 {
                    debug!("swept {} expired locks", purged);
                }
            }
        })
    }
}
