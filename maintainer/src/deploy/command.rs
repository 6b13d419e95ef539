//! Deployer that redeploys by running an external program

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::deploy::{Deployer, Deployment};
use crate::errors::MaintainerError;
use crate::nodes::model::ApplicationId;

/// Runs `program args.. <application-id>` to redeploy an application
#[derive(Debug, Clone, Default)]
pub struct CommandDeployer {
    program: Option<String>,
    args: Vec<String>,
}

impl CommandDeployer {
    pub fn new(program: Option<String>, args: Vec<String>) -> Self {
        if program.is_none() {
            warn!("No deploy program configured, applications will not be redeployed");
        }
        Self { program, args }
    }
}

#[async_trait]
impl Deployer for CommandDeployer {
    async fn deployment_for(
        &self,
        application: &ApplicationId,
    ) -> Result<Option<Box<dyn Deployment>>, MaintainerError> {
        let Some(program) = &self.program else {
            return Ok(None);
        };
        Ok(Some(Box::new(CommandDeployment {
            program: program.clone(),
            args: self.args.clone(),
            application: application.clone(),
        })))
    }
}

struct CommandDeployment {
    program: String,
    args: Vec<String>,
    application: ApplicationId,
}

#[async_trait]
impl Deployment for CommandDeployment {
    async fn activate(&self) -> Result<(), MaintainerError> {
        debug!("Running {} for {}", self.program, self.application);

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(self.application.to_string())
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                MaintainerError::DeployError(format!("Failed to run {}: {}", self.program, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MaintainerError::DeployError(format!(
                "{} exited with {} for {}: {}",
                self.program,
                output.status,
                self.application,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
