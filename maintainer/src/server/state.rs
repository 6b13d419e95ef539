//! Server state

use std::sync::Arc;

use crate::maintenance::job_control::JobControl;
use crate::maintenance::locks::ApplicationLocks;
use crate::nodes::repository::InMemoryNodeRepository;

/// Server state shared across handlers
pub struct ServerState {
    pub job_control: Arc<JobControl>,
    pub nodes: Arc<InMemoryNodeRepository>,
    pub locks: Arc<ApplicationLocks>,
}

impl ServerState {
    pub fn new(
        job_control: Arc<JobControl>,
        nodes: Arc<InMemoryNodeRepository>,
        locks: Arc<ApplicationLocks>,
    ) -> Self {
        Self {
            job_control,
            nodes,
            locks,
        }
    }
}
