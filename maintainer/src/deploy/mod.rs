//! Deployment collaborators

pub mod command;

use async_trait::async_trait;

use crate::errors::MaintainerError;
use crate::nodes::model::ApplicationId;

/// A redeployment of one application, bound to the desired state at the
/// time it was created. Handles are never cached between passes.
#[async_trait]
pub trait Deployment: Send + Sync {
    /// Perform the redeployment. May be slow.
    async fn activate(&self) -> Result<(), MaintainerError>;
}

/// Produces deployment handles
#[async_trait]
pub trait Deployer: Send + Sync {
    /// A fresh deployment of `application`, or `None` if it can no longer
    /// be deployed
    async fn deployment_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<Box<dyn Deployment>>, MaintainerError>;
}
