//! Maintenance job abstraction and its scheduling loop

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::errors::MaintainerError;
use crate::maintenance::job_control::JobControl;
use crate::utils::{generate_run_id, panic_message};

/// A named unit of reconciliation work run on a fixed interval
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Name used for job control and logging
    fn name(&self) -> &str;

    /// Delay between the end of one pass and the start of the next
    fn interval(&self) -> Duration;

    /// The job body
    async fn maintain(&self) -> Result<(), MaintainerError>;
}

/// Result of one tick of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Job control reported the job inactive, the body did not run
    Skipped,
    Succeeded,
    Failed(String),
}

/// Scheduling options shared by all jobs
#[derive(Debug, Clone)]
pub struct Options {
    /// Delay before the first pass
    pub initial_delay: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
        }
    }
}

/// Run a single pass of `job` if job control allows it.
///
/// Errors and panics from the body are logged and reported in the outcome,
/// never propagated.
pub async fn run_once(job: &dyn MaintenanceJob, job_control: &JobControl) -> PassOutcome {
    let span = info_span!("maintenance", job = job.name(), run_id = %generate_run_id());

    async {
        match job_control.is_active(job.name()).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("Job is inactive, skipping pass");
                return PassOutcome::Skipped;
            }
            Err(e) => {
                error!("Unable to read job control: {}", e);
                return PassOutcome::Failed(e.to_string());
            }
        }

        match AssertUnwindSafe(job.maintain()).catch_unwind().await {
            Ok(Ok(())) => PassOutcome::Succeeded,
            Ok(Err(e)) => {
                warn!(
                    "{} failed. Will retry in {:?}: {}",
                    job.name(),
                    job.interval(),
                    e
                );
                PassOutcome::Failed(e.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "{} panicked. Will retry in {:?}: {}",
                    job.name(),
                    job.interval(),
                    message
                );
                PassOutcome::Failed(message)
            }
        }
    }
    .instrument(span)
    .await
}

/// Run `job` until shutdown.
///
/// Passes never overlap: the interval is measured from the end of one pass
/// to the start of the next. Shutdown is observed between passes.
pub async fn run<S, F>(
    job: &dyn MaintenanceJob,
    job_control: &JobControl,
    options: &Options,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("{} starting with interval {:?}", job.name(), job.interval());
    job_control.started(job.name());

    let mut delay = options.initial_delay;
    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("{} shutting down...", job.name());
                break;
            }
            _ = sleep_fn(delay) => {
                // Continue with pass
            }
        }

        run_once(job, job_control).await;
        delay = job.interval();
    }

    job_control.stopped(job.name());
}
