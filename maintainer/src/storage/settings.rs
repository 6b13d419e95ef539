//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Maintainer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Node inventory file
    #[serde(default = "default_inventory_file")]
    pub inventory_file: String,

    /// File persisting job deactivations and the global pause switch.
    /// Job control is kept in memory only when unset.
    #[serde(default = "default_job_control_file")]
    pub job_control_file: Option<String>,

    /// Deployment command
    #[serde(default)]
    pub deploy: DeploySettings,

    /// Maintenance job cadence
    #[serde(default)]
    pub maintainers: MaintainerSettings,

    /// Administrative HTTP server
    #[serde(default)]
    pub admin_server: AdminServerSettings,

    /// Maximum time to wait for jobs to drain on shutdown
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_inventory_file() -> String {
    "/etc/node-maintainer/inventory.json".to_string()
}

fn default_job_control_file() -> Option<String> {
    Some("/etc/node-maintainer/job-control.json".to_string())
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            inventory_file: default_inventory_file(),
            job_control_file: default_job_control_file(),
            deploy: DeploySettings::default(),
            maintainers: MaintainerSettings::default(),
            admin_server: AdminServerSettings::default(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

/// Program run to redeploy an application. The application id is appended
/// as the last argument.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeploySettings {
    #[serde(default)]
    pub program: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Maintenance job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintainerSettings {
    /// Interval of the operator change maintainer. Raised to 1s if lower.
    #[serde(default = "default_operator_change_interval")]
    pub operator_change_interval_secs: u64,

    /// Interval of the periodic (full) application maintainer. Raised to 1s
    /// if lower.
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_secs: u64,

    /// Delay before a job's first pass
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// How long to wait for a busy application lock. Zero means try once.
    #[serde(default)]
    pub lock_wait_ms: u64,
}

fn default_operator_change_interval() -> u64 {
    60
}

fn default_periodic_interval() -> u64 {
    30 * 60
}

fn default_initial_delay() -> u64 {
    10
}

impl Default for MaintainerSettings {
    fn default() -> Self {
        Self {
            operator_change_interval_secs: default_operator_change_interval(),
            periodic_interval_secs: default_periodic_interval(),
            initial_delay_secs: default_initial_delay(),
            lock_wait_ms: 0,
        }
    }
}

/// Administrative HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_admin_host")]
    pub host: String,

    #[serde(default = "default_admin_port")]
    pub port: u16,
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    8090
}

impl Default for AdminServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_admin_host(),
            port: default_admin_port(),
        }
    }
}
