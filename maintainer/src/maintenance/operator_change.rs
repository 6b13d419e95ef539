//! Fast-path detection of manual operator edits
//!
//! Operator changes to nodes should reach a redeploy much sooner than the
//! periodic maintainer's interval. Instead of rescanning everything, each
//! pass looks only at history events recorded since the previous pass.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::clock::Clock;
use crate::errors::MaintainerError;
use crate::maintenance::application::Detector;
use crate::nodes::model::{Agent, Node};
use crate::nodes::repository::NodeRepository;

pub const JOB_NAME: &str = "operator-change-application-maintainer";

/// The span of history one pass evaluates: events strictly after `start`
/// and at or before `end`. Consecutive windows share their boundary, so
/// every event falls in exactly one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Flags allocated nodes with an operator event in the current window
pub struct OperatorChangeDetector {
    clock: Arc<dyn Clock>,
    previous_run: Mutex<DateTime<Utc>>,
}

impl OperatorChangeDetector {
    /// The first window starts now. Earlier changes are left to the
    /// periodic maintainer's first pass.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            previous_run: Mutex::new(now),
        }
    }

    /// End of the last evaluated window
    pub fn previous_run(&self) -> DateTime<Utc> {
        *self.previous_run.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Close the current window and start the next one at its end
    pub fn advance_window(&self) -> DetectionWindow {
        let now = self.clock.now();
        let mut previous_run = self.previous_run.lock().unwrap_or_else(|e| e.into_inner());
        let start = *previous_run;
        // A clock stepping backwards yields an empty window, never a rewind
        let end = now.max(start);
        *previous_run = end;
        DetectionWindow { start, end }
    }

    /// Hand a window back after a failed pass so its events are seen again
    fn reopen(&self, window: DetectionWindow) {
        let mut previous_run = self.previous_run.lock().unwrap_or_else(|e| e.into_inner());
        if *previous_run == window.end {
            *previous_run = window.start;
        }
    }

    fn changed_by_operator(node: &Node, window: &DetectionWindow) -> bool {
        node.allocation.is_some()
            && node
                .history
                .has_event_between(Agent::Operator, window.start, window.end)
    }
}

#[async_trait]
impl Detector for OperatorChangeDetector {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn nodes_needing_maintenance(
        &self,
        nodes: &dyn NodeRepository,
    ) -> Result<Vec<Node>, MaintainerError> {
        let window = self.advance_window();
        debug!("Looking for operator changes in ({}, {}]", window.start, window.end);

        let all = match nodes.list_nodes().await {
            Ok(all) => all,
            Err(e) => {
                self.reopen(window);
                return Err(e);
            }
        };

        Ok(all
            .into_iter()
            .filter(|node| Self::changed_by_operator(node, &window))
            .collect())
    }

    async fn throttle(&self, _application_count: usize) {}

    fn reason(&self) -> &str {
        "as a manual change was made to its nodes"
    }
}
