//! MariaDB daemon lifecycle and client operations.
//!
//! Owns the mysqld child process for this node's lifetime: launches it in
//! one of three modes, tees its output to the daemon log, probes it for
//! reachability, and runs the post-start seed and grant operations
//! through the mysql client. Everything that shells out goes through the
//! OS facade so the callers above stay testable.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use marictl_core::config::DbConfig;
use marictl_core::defaults::{
    DAEMON_STOP_GRACE_SECS, REACHABILITY_PROBE_TIMEOUT_SECS, SEED_RETRY_PAUSE_SECS,
};
use marictl_core::error::{CtrlError, CtrlResult};

use crate::os::OsHelper;

/// Mode flags passed to mysqld at launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartMode {
    /// Form a new Primary Component of one.
    Bootstrap,
    /// Contact the configured peers and request a state transfer.
    Join,
    /// Replication off entirely; used for in-place upgrades.
    Standalone,
}

impl StartMode {
    fn name(&self) -> &'static str {
        match self {
            StartMode::Bootstrap => "bootstrap",
            StartMode::Join => "join",
            StartMode::Standalone => "standalone",
        }
    }

    fn args(&self) -> &'static [&'static str] {
        match self {
            StartMode::Bootstrap => &["--wsrep-new-cluster"],
            // Join mode needs no extra flags: the cluster address comes
            // from the server configuration rendered at deploy time.
            StartMode::Join => &[],
            StartMode::Standalone => &["--wsrep-provider=none"],
        }
    }
}

/// Database daemon operations used by the starter, upgrader and manager.
#[async_trait]
pub trait DbHelper: Send + Sync {
    /// Launch the daemon declaring a new Primary Component of one.
    async fn start_in_bootstrap(&self) -> CtrlResult<()>;

    /// Launch the daemon to join the existing Primary Component.
    async fn start_in_join(&self) -> CtrlResult<()>;

    /// Launch the daemon with replication off (upgrade mode).
    async fn start_standalone(&self) -> CtrlResult<()>;

    /// Shut the owned daemon down without affecting the cluster. A no-op
    /// if no daemon is currently owned.
    async fn stop_standalone(&self) -> CtrlResult<()>;

    /// Cheap local connect and trivial query, bounded by a per-attempt
    /// timeout. "Still starting" and "no process at all" both read as
    /// `false`; this never errors.
    async fn is_reachable(&self) -> bool;

    /// Run the schema/seed script, retrying up to the configured number
    /// of attempts. The script itself is idempotent.
    async fn seed(&self) -> CtrlResult<()>;

    /// Create or update the cluster's standard read-only user. Safe to
    /// call on every boot.
    async fn create_read_only_user(&self) -> CtrlResult<()>;

    /// Run the vendor's in-place upgrade tool against a reachable daemon.
    async fn run_upgrade_tool(&self) -> CtrlResult<()>;
}

/// The production implementation, driving a real mysqld.
pub struct MariaDbHelper {
    os: Arc<dyn OsHelper>,
    config: DbConfig,
    log_file: PathBuf,
    max_seed_tries: u32,
    daemon: Mutex<Option<Child>>,
}

impl MariaDbHelper {
    pub fn new(
        os: Arc<dyn OsHelper>,
        config: DbConfig,
        log_file: PathBuf,
        max_seed_tries: u32,
    ) -> Self {
        Self {
            os,
            config,
            log_file,
            max_seed_tries,
            daemon: Mutex::new(None),
        }
    }

    async fn start(&self, mode: StartMode) -> CtrlResult<()> {
        let mut daemon = self.daemon.lock().await;
        if let Some(child) = daemon.as_mut() {
            if child.try_wait()?.is_none() {
                return Err(CtrlError::StartFailure(
                    "a database daemon is already running".to_string(),
                ));
            }
        }

        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file)
            .map_err(|e| {
                CtrlError::StartFailure(format!(
                    "cannot open daemon log {}: {e}",
                    self.log_file.display()
                ))
            })?;
        let stderr_log = log
            .try_clone()
            .map_err(|e| CtrlError::StartFailure(e.to_string()))?;

        let child = Command::new(&self.config.daemon_path)
            .args(mode.args())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(stderr_log))
            .spawn()
            .map_err(|e| {
                CtrlError::StartFailure(format!(
                    "spawning {} in {} mode: {e}",
                    self.config.daemon_path.display(),
                    mode.name()
                ))
            })?;

        info!(
            "mysqld started in {} mode (pid {})",
            mode.name(),
            child.id().map_or_else(|| "?".to_string(), |p| p.to_string()),
        );
        *daemon = Some(child);
        Ok(())
    }

    /// Authentication arguments shared by every mysql client invocation.
    fn client_auth_args(&self) -> Vec<String> {
        let mut args = vec![
            "-u".to_string(),
            self.config.user.clone(),
            "-h".to_string(),
            "127.0.0.1".to_string(),
        ];
        if !self.config.password.is_empty() {
            args.push(format!("-p{}", self.config.password));
        }
        args
    }

    async fn run_sql(&self, sql: &str) -> CtrlResult<String> {
        let client = self.config.client_path.to_string_lossy().into_owned();
        let mut args = self.client_auth_args();
        args.push("-e".to_string());
        args.push(sql.to_string());
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.os.run_command(&client, &arg_refs).await
    }
}

#[async_trait]
impl DbHelper for MariaDbHelper {
    async fn start_in_bootstrap(&self) -> CtrlResult<()> {
        self.start(StartMode::Bootstrap).await
    }

    async fn start_in_join(&self) -> CtrlResult<()> {
        self.start(StartMode::Join).await
    }

    async fn start_standalone(&self) -> CtrlResult<()> {
        self.start(StartMode::Standalone).await
    }

    async fn stop_standalone(&self) -> CtrlResult<()> {
        let mut daemon = self.daemon.lock().await;
        let Some(mut child) = daemon.take() else {
            debug!("no database daemon to stop");
            return Ok(());
        };

        if let Ok(Some(status)) = child.try_wait() {
            info!("mysqld already exited ({status})");
            return Ok(());
        }

        let Some(pid) = child.id() else {
            child.kill().await?;
            return Ok(());
        };

        info!("sending SIGTERM to mysqld (pid {pid})");
        if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
            warn!("SIGTERM to pid {pid} failed: {e}");
        }

        match tokio::time::timeout(
            Duration::from_secs(DAEMON_STOP_GRACE_SECS),
            child.wait(),
        )
        .await
        {
            Ok(Ok(status)) => {
                info!("mysqld exited: {status}");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => {
                warn!("mysqld did not exit within {DAEMON_STOP_GRACE_SECS}s, killing it");
                child.kill().await?;
                Ok(())
            }
        }
    }

    async fn is_reachable(&self) -> bool {
        let probe = self.run_sql("SELECT 1");
        match tokio::time::timeout(
            Duration::from_secs(REACHABILITY_PROBE_TIMEOUT_SECS),
            probe,
        )
        .await
        {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("database not reachable: {e}");
                false
            }
            Err(_) => {
                debug!("reachability probe timed out");
                false
            }
        }
    }

    async fn seed(&self) -> CtrlResult<()> {
        let script = self.config.seed_script_path.to_string_lossy().into_owned();
        let mut last_error = String::new();

        for attempt in 1..=self.max_seed_tries {
            match self.os.run_command("bash", &[&script]).await {
                Ok(_) => {
                    info!("seeding databases succeeded");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "seed attempt {attempt}/{} failed: {e}",
                        self.max_seed_tries
                    );
                    last_error = e.to_string();
                    if attempt < self.max_seed_tries {
                        self.os
                            .sleep(Duration::from_secs(SEED_RETRY_PAUSE_SECS))
                            .await;
                    }
                }
            }
        }

        Err(CtrlError::Seed(format!(
            "gave up after {} attempts: {last_error}",
            self.max_seed_tries
        )))
    }

    async fn create_read_only_user(&self) -> CtrlResult<()> {
        let user = &self.config.read_only_user;
        let password = &self.config.read_only_password;
        // Written to succeed if the user already exists with the same
        // grants; re-run on every boot.
        let sql = format!(
            "CREATE USER IF NOT EXISTS '{user}'@'%' IDENTIFIED BY '{password}'; \
             ALTER USER '{user}'@'%' IDENTIFIED BY '{password}'; \
             GRANT SELECT ON *.* TO '{user}'@'%'; \
             FLUSH PRIVILEGES;"
        );
        match self.run_sql(&sql).await {
            Ok(_) => {
                info!("read-only user '{user}' is in place");
                Ok(())
            }
            Err(e) => Err(CtrlError::Grant(e.to_string())),
        }
    }

    async fn run_upgrade_tool(&self) -> CtrlResult<()> {
        let tool = self.config.upgrade_path.to_string_lossy().into_owned();
        let args = self.client_auth_args();
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();

        match self.os.run_command(&tool, &arg_refs).await {
            Ok(_) => Ok(()),
            // mysql_upgrade exits non-zero when there is nothing to do.
            Err(CtrlError::Command { output, .. }) if output.contains("already upgraded") => {
                info!("data dictionary already up to date");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
