//! Activation control for maintenance jobs
//!
//! Every job asks [`JobControl::is_active`] before each pass. A job is
//! inactive when it has been deactivated by name, or while the global pause
//! switch is on. Both flags live in a [`JobControlStore`] so they can be
//! shared and survive restarts; which jobs are currently running is tracked
//! in memory.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::errors::MaintainerError;
use crate::storage::json_file::JsonFile;

/// Persisted job control flags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobControlState {
    #[serde(default)]
    pub inactive_jobs: BTreeSet<String>,

    #[serde(default)]
    pub paused: bool,
}

/// Backing store for job control flags
#[async_trait]
pub trait JobControlStore: Send + Sync {
    async fn read(&self) -> Result<JobControlState, MaintainerError>;

    async fn write(&self, state: &JobControlState) -> Result<(), MaintainerError>;
}

/// Keeps job control flags in memory
#[derive(Debug, Default)]
pub struct InMemoryJobControlStore {
    state: RwLock<JobControlState>,
}

impl InMemoryJobControlStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobControlStore for InMemoryJobControlStore {
    async fn read(&self) -> Result<JobControlState, MaintainerError> {
        Ok(self.state.read().await.clone())
    }

    async fn write(&self, state: &JobControlState) -> Result<(), MaintainerError> {
        *self.state.write().await = state.clone();
        Ok(())
    }
}

/// Keeps job control flags in a JSON file
#[derive(Debug)]
pub struct FileJobControlStore {
    file: JsonFile<JobControlState>,
}

impl FileJobControlStore {
    pub fn new(file: JsonFile<JobControlState>) -> Self {
        Self { file }
    }
}

#[async_trait]
impl JobControlStore for FileJobControlStore {
    async fn read(&self) -> Result<JobControlState, MaintainerError> {
        self.file.read_or_default().await
    }

    async fn write(&self, state: &JobControlState) -> Result<(), MaintainerError> {
        self.file.write(state).await
    }
}

/// Activity of one running job
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub active: bool,
}

/// Snapshot of job control
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobControlStatus {
    pub paused: bool,
    pub jobs: Vec<JobStatus>,
}

/// Process-wide registry of running jobs and their activation flags
pub struct JobControl {
    store: Arc<dyn JobControlStore>,
    started: Mutex<BTreeSet<String>>,
    // Serializes read-modify-write cycles against the store
    update_lock: tokio::sync::Mutex<()>,
}

impl JobControl {
    pub fn new(store: Arc<dyn JobControlStore>) -> Self {
        Self {
            store,
            started: Mutex::new(BTreeSet::new()),
            update_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryJobControlStore::new()))
    }

    /// Called by a job when its loop starts
    pub fn started(&self, job_name: &str) {
        let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
        started.insert(job_name.to_string());
    }

    /// Called by a job when its loop ends
    pub fn stopped(&self, job_name: &str) {
        let mut started = self.started.lock().unwrap_or_else(|e| e.into_inner());
        started.remove(job_name);
    }

    /// Names of the running jobs
    pub fn jobs(&self) -> Vec<String> {
        let started = self.started.lock().unwrap_or_else(|e| e.into_inner());
        started.iter().cloned().collect()
    }

    /// Whether `job_name` should run its body now
    pub async fn is_active(&self, job_name: &str) -> Result<bool, MaintainerError> {
        let state = self.store.read().await?;
        Ok(!state.paused && !state.inactive_jobs.contains(job_name))
    }

    /// Activate or deactivate a single job
    pub async fn set_active(&self, job_name: &str, active: bool) -> Result<(), MaintainerError> {
        self.update(|state| {
            if active {
                state.inactive_jobs.remove(job_name);
            } else {
                state.inactive_jobs.insert(job_name.to_string());
            }
        })
        .await?;
        info!("Job {} set {}", job_name, if active { "active" } else { "inactive" });
        Ok(())
    }

    /// Stop all jobs from running their body until [`JobControl::resume`]
    pub async fn pause(&self) -> Result<(), MaintainerError> {
        self.update(|state| state.paused = true).await?;
        info!("All maintenance jobs paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), MaintainerError> {
        self.update(|state| state.paused = false).await?;
        info!("Maintenance jobs resumed");
        Ok(())
    }

    pub async fn is_paused(&self) -> Result<bool, MaintainerError> {
        Ok(self.store.read().await?.paused)
    }

    /// Running jobs with their effective activity
    pub async fn status(&self) -> Result<JobControlStatus, MaintainerError> {
        let state = self.store.read().await?;
        let jobs = self
            .jobs()
            .into_iter()
            .map(|name| JobStatus {
                active: !state.paused && !state.inactive_jobs.contains(&name),
                name,
            })
            .collect();
        Ok(JobControlStatus {
            paused: state.paused,
            jobs,
        })
    }

    async fn update(&self, change: impl FnOnce(&mut JobControlState)) -> Result<(), MaintainerError> {
        let _guard = self.update_lock.lock().await;
        let mut state = self.store.read().await?;
        change(&mut state);
        self.store.write(&state).await
    }
}
