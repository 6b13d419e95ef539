//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::maintenance::job;
use crate::maintenance::MaintainerIntervals;
use crate::storage::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Node inventory file
    pub inventory_file: PathBuf,

    /// Job control state file, in-memory job control when unset
    pub job_control_file: Option<PathBuf>,

    /// Deployment command
    pub deploy: DeployOptions,

    /// Maintainer intervals
    pub intervals: MaintainerIntervals,

    /// Scheduling options shared by all jobs
    pub job: job::Options,

    /// Longest wait for a busy application lock
    pub lock_wait: Duration,

    /// Enable the administrative HTTP server
    pub enable_admin_server: bool,

    /// Server configuration
    pub server: ServerOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for AppOptions {
    fn from(settings: &Settings) -> Self {
        let maintainers = &settings.maintainers;
        Self {
            lifecycle: LifecycleOptions {
                max_shutdown_delay: Duration::from_secs(settings.shutdown_timeout_secs),
            },
            inventory_file: PathBuf::from(&settings.inventory_file),
            job_control_file: settings.job_control_file.as_ref().map(PathBuf::from),
            deploy: DeployOptions {
                program: settings.deploy.program.clone(),
                args: settings.deploy.args.clone(),
            },
            intervals: MaintainerIntervals {
                operator_change: job_interval(
                    "operator_change_interval_secs",
                    maintainers.operator_change_interval_secs,
                ),
                periodic: job_interval("periodic_interval_secs", maintainers.periodic_interval_secs),
            },
            job: job::Options {
                initial_delay: Duration::from_secs(maintainers.initial_delay_secs),
            },
            lock_wait: Duration::from_millis(maintainers.lock_wait_ms),
            enable_admin_server: settings.admin_server.enabled,
            server: ServerOptions {
                host: settings.admin_server.host.clone(),
                port: settings.admin_server.port,
            },
        }
    }
}

/// Shortest interval a maintenance job may run at
pub const MIN_JOB_INTERVAL: Duration = Duration::from_secs(1);

fn job_interval(setting: &str, secs: u64) -> Duration {
    let interval = Duration::from_secs(secs);
    if interval < MIN_JOB_INTERVAL {
        warn!(
            "{} of {}s is below the minimum, using {:?}",
            setting, secs, MIN_JOB_INTERVAL
        );
        return MIN_JOB_INTERVAL;
    }
    interval
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Program run to redeploy an application
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub program: Option<String>,
    pub args: Vec<String>,
}

/// Administrative HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}
