//! Application maintainer: redeploys the applications a [`Detector`] flags
//!
//! A pass collapses the flagged nodes to distinct applications, in the order
//! they were first seen, and attempts each one in turn:
//!
//! 1. take the application's lock, skipping it if another attempt holds it
//! 2. skip it if it no longer has active nodes
//! 3. ask the deployer for a fresh deployment, skipping if there is none
//! 4. activate the deployment while holding the lock
//!
//! A failure or panic in one application is logged and does not stop the
//! rest of the pass.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::deploy::Deployer;
use crate::errors::MaintainerError;
use crate::maintenance::job::MaintenanceJob;
use crate::maintenance::locks::ApplicationLocks;
use crate::nodes::model::{ApplicationId, Node, NodeState};
use crate::nodes::repository::NodeRepository;
use crate::utils::panic_message;

/// Decides which nodes need their application redeployed in a pass
#[async_trait]
pub trait Detector: Send + Sync {
    /// Job name of the maintainer using this detector
    fn name(&self) -> &str;

    /// Nodes whose applications must be redeployed this pass. May advance
    /// internal state, exactly once per call.
    async fn nodes_needing_maintenance(
        &self,
        nodes: &dyn NodeRepository,
    ) -> Result<Vec<Node>, MaintainerError>;

    /// Pace deployments. Called after each application but the last.
    async fn throttle(&self, application_count: usize);

    /// Why applications flagged by this detector are redeployed, for logging
    fn reason(&self) -> &str;
}

/// Collaborators shared by every application maintainer
#[derive(Clone)]
pub struct MaintainerContext {
    pub nodes: Arc<dyn NodeRepository>,
    pub deployer: Arc<dyn Deployer>,
    pub locks: Arc<ApplicationLocks>,
    /// Longest wait for a busy application lock
    pub lock_wait: Duration,
}

/// What happened to one application in a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    Deployed,
    /// Another attempt held the application lock
    Busy,
    /// The application no longer has active nodes
    Retired,
    /// The deployer had no deployment for the application
    Missing,
    Failed(String),
}

/// Per-pass tally of deployment outcomes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub applications: usize,
    pub deployed: usize,
    pub busy: usize,
    pub retired: usize,
    pub missing: usize,
    pub failed: usize,
}

impl PassReport {
    fn record(&mut self, outcome: &DeployOutcome) {
        match outcome {
            DeployOutcome::Deployed => self.deployed += 1,
            DeployOutcome::Busy => self.busy += 1,
            DeployOutcome::Retired => self.retired += 1,
            DeployOutcome::Missing => self.missing += 1,
            DeployOutcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Maintenance job redeploying applications flagged by `D`
pub struct ApplicationMaintainer<D> {
    detector: D,
    context: MaintainerContext,
    interval: Duration,
}

impl<D: Detector> ApplicationMaintainer<D> {
    pub fn new(detector: D, context: MaintainerContext, interval: Duration) -> Self {
        Self {
            detector,
            context,
            interval,
        }
    }

    pub fn detector(&self) -> &D {
        &self.detector
    }

    /// Distinct owners of the flagged nodes, in first-seen order
    pub async fn applications_needing_maintenance(
        &self,
    ) -> Result<Vec<ApplicationId>, MaintainerError> {
        let nodes = self
            .detector
            .nodes_needing_maintenance(self.context.nodes.as_ref())
            .await?;

        let mut seen = HashSet::new();
        Ok(nodes
            .iter()
            .filter_map(|node| node.owner())
            .filter(|owner| seen.insert((*owner).clone()))
            .cloned()
            .collect())
    }

    /// Detect and redeploy. Only detection failures are returned as errors.
    pub async fn run_pass(&self) -> Result<PassReport, MaintainerError> {
        let applications = self.applications_needing_maintenance().await?;
        let mut report = PassReport {
            applications: applications.len(),
            ..Default::default()
        };

        for (i, application) in applications.iter().enumerate() {
            let outcome = self.deploy_with_lock(application).await;
            report.record(&outcome);

            if i + 1 < applications.len() {
                self.detector.throttle(applications.len()).await;
            }
        }

        Ok(report)
    }

    async fn deploy_with_lock(&self, application: &ApplicationId) -> DeployOutcome {
        let Some(_lock) = self
            .context
            .locks
            .try_lock(application, self.context.lock_wait)
            .await
        else {
            debug!(
                "Application {} is being deployed elsewhere, skipping",
                application.to_short_string()
            );
            return DeployOutcome::Busy;
        };

        match AssertUnwindSafe(self.deploy(application)).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(
                    "Failed to redeploy {}: {}",
                    application.to_short_string(),
                    e
                );
                DeployOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "Redeploying {} panicked: {}",
                    application.to_short_string(),
                    message
                );
                DeployOutcome::Failed(message)
            }
        }
    }

    async fn deploy(&self, application: &ApplicationId) -> Result<DeployOutcome, MaintainerError> {
        // Flagged nodes may have been deallocated, parked or failed since
        // detection
        let nodes = self.context.nodes.nodes_of(application).await?;
        if !nodes.iter().any(|node| node.state == NodeState::Active) {
            debug!("Application {} has no active nodes left", application.to_short_string());
            return Ok(DeployOutcome::Retired);
        }

        let Some(deployment) = self.context.deployer.deployment_for(application).await? else {
            debug!("No deployment of {}", application.to_short_string());
            return Ok(DeployOutcome::Missing);
        };

        deployment.activate().await?;
        info!(
            "Redeployed application {} {}",
            application.to_short_string(),
            self.detector.reason()
        );
        Ok(DeployOutcome::Deployed)
    }
}

#[async_trait]
impl<D: Detector> MaintenanceJob for ApplicationMaintainer<D> {
    fn name(&self) -> &str {
        self.detector.name()
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn maintain(&self) -> Result<(), MaintainerError> {
        let report = self.run_pass().await?;
        if report.applications > 0 {
            info!(
                applications = report.applications,
                deployed = report.deployed,
                busy = report.busy,
                retired = report.retired,
                missing = report.missing,
                failed = report.failed,
                "Maintenance pass complete"
            );
        } else {
            debug!("No applications need maintenance");
        }
        Ok(())
    }
}
