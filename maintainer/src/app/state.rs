//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::clock::Clock;
use crate::deploy::command::CommandDeployer;
use crate::deploy::Deployer;
use crate::errors::MaintainerError;
use crate::maintenance::application::MaintainerContext;
use crate::maintenance::job_control::{
    FileJobControlStore, InMemoryJobControlStore, JobControl, JobControlStore,
};
use crate::maintenance::locks::ApplicationLocks;
use crate::nodes::repository::{InMemoryNodeRepository, Inventory};
use crate::storage::json_file::JsonFile;

/// Process-wide collaborators
pub struct AppState {
    pub clock: Arc<dyn Clock>,

    /// Node inventory
    pub nodes: Arc<InMemoryNodeRepository>,

    /// Where the inventory is saved on shutdown, if anywhere
    pub inventory_file: Option<JsonFile<Inventory>>,

    /// Job activation flags
    pub job_control: Arc<JobControl>,

    /// Application locks shared by all maintainers
    pub locks: Arc<ApplicationLocks>,

    pub deployer: Arc<dyn Deployer>,
}

impl AppState {
    /// Initialize application state from options
    pub async fn init(options: &AppOptions, clock: Arc<dyn Clock>) -> Result<Self, MaintainerError> {
        info!("Initializing application state...");

        let inventory_file = JsonFile::new(&options.inventory_file);
        let nodes = Arc::new(InMemoryNodeRepository::load(&inventory_file, clock.clone()).await?);

        let store: Arc<dyn JobControlStore> = match &options.job_control_file {
            Some(path) => Arc::new(FileJobControlStore::new(JsonFile::new(path))),
            None => Arc::new(InMemoryJobControlStore::new()),
        };

        let deployer = Arc::new(CommandDeployer::new(
            options.deploy.program.clone(),
            options.deploy.args.clone(),
        ));

        Ok(Self {
            clock,
            nodes,
            inventory_file: Some(inventory_file),
            job_control: Arc::new(JobControl::new(store)),
            locks: Arc::new(ApplicationLocks::new()),
            deployer,
        })
    }

    /// Collaborators handed to each application maintainer
    pub fn maintainer_context(&self, options: &AppOptions) -> MaintainerContext {
        MaintainerContext {
            nodes: self.nodes.clone(),
            deployer: self.deployer.clone(),
            locks: self.locks.clone(),
            lock_wait: options.lock_wait,
        }
    }

    /// Persist the inventory
    pub async fn shutdown(&self) -> Result<(), MaintainerError> {
        info!("Shutting down application state...");
        if let Some(file) = &self.inventory_file {
            file.write(&self.nodes.inventory().await).await?;
        }
        Ok(())
    }
}
