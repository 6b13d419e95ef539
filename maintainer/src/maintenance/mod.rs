//! Maintenance jobs

pub mod application;
pub mod job;
pub mod job_control;
pub mod locks;
pub mod operator_change;
pub mod periodic;

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::maintenance::application::{ApplicationMaintainer, MaintainerContext};
use crate::maintenance::job::MaintenanceJob;
use crate::maintenance::operator_change::OperatorChangeDetector;
use crate::maintenance::periodic::PeriodicDetector;

/// Cadence of the application maintainers
#[derive(Debug, Clone)]
pub struct MaintainerIntervals {
    pub operator_change: Duration,
    pub periodic: Duration,
}

impl Default for MaintainerIntervals {
    fn default() -> Self {
        Self {
            operator_change: Duration::from_secs(60),
            periodic: Duration::from_secs(30 * 60),
        }
    }
}

/// The jobs this process runs. Built once at startup.
pub fn build_maintainers(
    context: MaintainerContext,
    clock: Arc<dyn Clock>,
    intervals: &MaintainerIntervals,
) -> Vec<Arc<dyn MaintenanceJob>> {
    vec![
        Arc::new(ApplicationMaintainer::new(
            PeriodicDetector::new(intervals.periodic),
            context.clone(),
            intervals.periodic,
        )),
        Arc::new(ApplicationMaintainer::new(
            OperatorChangeDetector::new(clock),
            context,
            intervals.operator_change,
        )),
    ]
}
