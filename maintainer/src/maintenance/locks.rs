//! Per-application deployment locks

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::nodes::model::ApplicationId;

type AppMutex = Arc<tokio::sync::Mutex<()>>;

#[derive(Debug, Default)]
struct LockTable {
    mutexes: HashMap<ApplicationId, AppMutex>,
    // Applications whose lock is currently granted
    held: HashSet<ApplicationId>,
}

impl LockTable {
    fn prune(&mut self, application: &ApplicationId) {
        // Only the table itself references an idle entry
        if self
            .mutexes
            .get(application)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            self.mutexes.remove(application);
        }
    }
}

/// Table of exclusive locks keyed by application.
///
/// Acquisition never queues behind a busy application for longer than the
/// caller's wait. Entries are removed once nobody holds or waits for them.
#[derive(Debug, Default)]
pub struct ApplicationLocks {
    table: Mutex<LockTable>,
}

impl ApplicationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self) -> MutexGuard<'_, LockTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Take the lock of `application`, waiting at most `wait`. A zero wait
    /// tries exactly once. Returns `None` if the lock is held elsewhere.
    pub async fn try_lock(
        self: &Arc<Self>,
        application: &ApplicationId,
        wait: Duration,
    ) -> Option<ApplicationLock> {
        let mutex = self
            .table()
            .mutexes
            .entry(application.clone())
            .or_default()
            .clone();

        let guard = if wait.is_zero() {
            mutex.try_lock_owned().ok()
        } else {
            tokio::time::timeout(wait, mutex.lock_owned()).await.ok()
        };

        let mut table = self.table();
        match guard {
            Some(guard) => {
                table.held.insert(application.clone());
                Some(ApplicationLock {
                    application: application.clone(),
                    guard: Some(guard),
                    locks: self.clone(),
                })
            }
            None => {
                table.prune(application);
                None
            }
        }
    }

    /// Whether some attempt currently holds the lock of `application`.
    /// Never touches the lock itself.
    pub fn is_locked(&self, application: &ApplicationId) -> bool {
        self.table().held.contains(application)
    }

    /// Number of applications with a live lock entry
    pub fn len(&self) -> usize {
        self.table().mutexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive right to deploy one application. Released on drop.
#[derive(Debug)]
pub struct ApplicationLock {
    application: ApplicationId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<ApplicationLocks>,
}

impl ApplicationLock {
    pub fn application(&self) -> &ApplicationId {
        &self.application
    }
}

impl Drop for ApplicationLock {
    fn drop(&mut self) {
        // Clear the flag and release under the table lock, so a successor
        // can only mark itself held afterwards
        let mut table = self.locks.table();
        table.held.remove(&self.application);
        drop(self.guard.take());
        table.prune(&self.application);
    }
}
