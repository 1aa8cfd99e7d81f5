//! Controller configuration model.
//!
//! The controller is configured by a single YAML document with `Db`,
//! `Manager` and `Upgrader` sections. Keys are PascalCase to match the
//! deployment tooling that renders the file. Everything here is read-only
//! at runtime.

use std::path::PathBuf;

use serde::Deserialize;

use crate::defaults::{
    DEFAULT_DATABASE_STARTUP_TIMEOUT_SECS, DEFAULT_DB_USER, DEFAULT_MAX_DATABASE_SEED_TRIES,
    DEFAULT_READ_ONLY_USER,
};
use crate::error::{CtrlError, CtrlResult};

/// Top-level controller configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Path where the database daemon's stdout/stderr is teed.
    pub log_file_location: PathBuf,

    /// Path for the controller's PID file, written once the node is ready.
    pub pid_file: PathBuf,

    pub db: DbConfig,
    pub manager: ManagerConfig,
    pub upgrader: UpgraderConfig,
}

/// Database daemon and client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DbConfig {
    /// Privileged user for seed and grant operations.
    #[serde(default = "default_db_user")]
    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Name of the cluster's standard read-only user.
    #[serde(default = "default_read_only_user")]
    pub read_only_user: String,

    #[serde(default)]
    pub read_only_password: String,

    /// Path to the mysqld binary launched in bootstrap/join/standalone mode.
    pub daemon_path: PathBuf,

    /// Path to the mysql client binary used for probes and grants.
    pub client_path: PathBuf,

    /// Path to the schema/seed script, run after the daemon is reachable.
    pub seed_script_path: PathBuf,

    /// Path to the vendor upgrade tool (mysql_upgrade).
    pub upgrade_path: PathBuf,
}

/// Start-manager settings: cluster topology and boot budgets.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagerConfig {
    /// Path of the persisted node-state file.
    pub state_file_location: PathBuf,

    /// Position of this node in the deployment. Node 0 is the only node
    /// that may ever bootstrap.
    pub job_index: usize,

    /// Ordered peer endpoints for health checks, one per node in the
    /// deployment (this node included).
    pub cluster_ips: Vec<String>,

    /// Overall budget for the readiness poll, in seconds.
    #[serde(default = "default_startup_timeout")]
    pub database_startup_timeout: u64,

    /// Attempts allowed for the database seed script.
    #[serde(default = "default_seed_tries")]
    pub max_database_seed_tries: u32,
}

impl ManagerConfig {
    /// Total peers in the deployment.
    pub fn number_of_nodes(&self) -> usize {
        self.cluster_ips.len()
    }
}

/// Upgrader settings: the two version markers compared at boot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpgraderConfig {
    /// Version shipped with the currently installed package.
    pub package_version_file: PathBuf,

    /// Version recorded after the last completed upgrade.
    pub last_upgraded_version_file: PathBuf,
}

impl Config {
    /// Parse a YAML configuration document.
    pub fn from_yaml(raw: &str) -> CtrlResult<Self> {
        serde_yaml::from_str(raw).map_err(|e| CtrlError::Config(e.to_string()))
    }

    /// Reject configurations that cannot produce a sane boot decision.
    /// Called once at startup, before any daemon action.
    pub fn validate(&self) -> CtrlResult<()> {
        if self.manager.cluster_ips.is_empty() {
            return Err(CtrlError::Config(
                "Manager.ClusterIps must list at least one node".to_string(),
            ));
        }
        if self.manager.job_index >= self.manager.cluster_ips.len() {
            return Err(CtrlError::Config(format!(
                "Manager.JobIndex {} is out of range for a {}-node deployment",
                self.manager.job_index,
                self.manager.cluster_ips.len(),
            )));
        }
        if self.manager.state_file_location.as_os_str().is_empty() {
            return Err(CtrlError::Config(
                "Manager.StateFileLocation must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_db_user() -> String {
    DEFAULT_DB_USER.to_string()
}

fn default_read_only_user() -> String {
    DEFAULT_READ_ONLY_USER.to_string()
}

fn default_startup_timeout() -> u64 {
    DEFAULT_DATABASE_STARTUP_TIMEOUT_SECS
}

fn default_seed_tries() -> u32 {
    DEFAULT_MAX_DATABASE_SEED_TRIES
}
