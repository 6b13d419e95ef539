//! Full reconciliation: periodically redeploy every active application

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::MaintainerError;
use crate::maintenance::application::Detector;
use crate::nodes::model::{Node, NodeState};
use crate::nodes::repository::NodeRepository;

pub const JOB_NAME: &str = "periodic-application-maintainer";

/// Flags every active, allocated node. Deployments are spread over 90% of
/// the interval so a pass does not redeploy everything at once.
pub struct PeriodicDetector {
    interval: Duration,
}

impl PeriodicDetector {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Pause between two deployments of a pass covering `application_count`
    pub fn pause_between(&self, application_count: usize) -> Duration {
        if application_count == 0 {
            return Duration::ZERO;
        }
        let count = u32::try_from(application_count).unwrap_or(u32::MAX);
        let spread = match self.interval.checked_mul(9) {
            Some(scaled) => scaled / 10,
            None => self.interval / 10 * 9,
        };
        spread / count
    }
}

#[async_trait]
impl Detector for PeriodicDetector {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn nodes_needing_maintenance(
        &self,
        nodes: &dyn NodeRepository,
    ) -> Result<Vec<Node>, MaintainerError> {
        Ok(nodes
            .list_nodes()
            .await?
            .into_iter()
            .filter(|node| node.state == NodeState::Active && node.allocation.is_some())
            .collect())
    }

    async fn throttle(&self, application_count: usize) {
        tokio::time::sleep(self.pause_between(application_count)).await;
    }

    fn reason(&self) -> &str {
        "as part of periodic maintenance"
    }
}
