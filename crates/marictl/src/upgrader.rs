//! In-place version upgrades of the on-disk data dictionary.
//!
//! Two version markers are compared at boot: the version shipped with the
//! installed package and the version recorded after the last completed
//! upgrade. When they differ the daemon is brought up with replication
//! off, the vendor's upgrade tool is run against it, and the marker is
//! advanced. A partial upgrade leaves the node unusable, so any failure
//! here is fatal.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use marictl_core::config::UpgraderConfig;
use marictl_core::defaults::STARTUP_POLLING_FREQUENCY_SECS;
use marictl_core::error::{CtrlError, CtrlResult};

use crate::db::DbHelper;
use crate::os::OsHelper;

/// Decides whether the data dictionary needs migration and runs it.
#[async_trait]
pub trait Upgrader: Send + Sync {
    async fn needs_upgrade(&self) -> CtrlResult<bool>;

    async fn upgrade(&self) -> CtrlResult<()>;
}

/// Upgrader driven by the two on-disk version markers.
pub struct VersionFileUpgrader {
    os: Arc<dyn OsHelper>,
    db: Arc<dyn DbHelper>,
    config: UpgraderConfig,
    startup_timeout_secs: u64,
}

impl VersionFileUpgrader {
    pub fn new(
        os: Arc<dyn OsHelper>,
        db: Arc<dyn DbHelper>,
        config: UpgraderConfig,
        startup_timeout_secs: u64,
    ) -> Self {
        Self {
            os,
            db,
            config,
            startup_timeout_secs,
        }
    }

    /// Bounded wait for the standalone daemon to accept connections.
    /// Same budget as the normal boot path; this step is not
    /// interruptible since a partial upgrade is fatal anyway.
    async fn wait_for_standalone(&self) -> CtrlResult<()> {
        let attempts = self.startup_timeout_secs / STARTUP_POLLING_FREQUENCY_SECS;
        for _ in 0..attempts {
            if self.db.is_reachable().await {
                return Ok(());
            }
            self.os
                .sleep(Duration::from_secs(STARTUP_POLLING_FREQUENCY_SECS))
                .await;
        }
        Err(CtrlError::Timeout {
            seconds: self.startup_timeout_secs,
        })
    }

    async fn run_upgrade(&self) -> CtrlResult<()> {
        self.wait_for_standalone().await?;
        self.db.run_upgrade_tool().await?;

        // Advance the marker only once the tool has finished.
        let version = self
            .os
            .read_file(&self.config.package_version_file)
            .await?
            .trim()
            .to_string();
        self.os
            .write_string(&self.config.last_upgraded_version_file, &version)
            .await?;
        info!("data dictionary upgraded to version {version}");
        Ok(())
    }
}

#[async_trait]
impl Upgrader for VersionFileUpgrader {
    async fn needs_upgrade(&self) -> CtrlResult<bool> {
        if !self
            .os
            .file_exists(&self.config.package_version_file)
            .await
        {
            return Err(CtrlError::Config(format!(
                "package version file {} does not exist",
                self.config.package_version_file.display()
            )));
        }

        if !self
            .os
            .file_exists(&self.config.last_upgraded_version_file)
            .await
        {
            info!("no upgrade marker found, this node has never been upgraded");
            return Ok(true);
        }

        let package = self
            .os
            .read_file(&self.config.package_version_file)
            .await?;
        let last = self
            .os
            .read_file(&self.config.last_upgraded_version_file)
            .await?;
        Ok(package.trim() != last.trim())
    }

    async fn upgrade(&self) -> CtrlResult<()> {
        info!("upgrading the data dictionary in standalone mode");
        self.db
            .start_standalone()
            .await
            .map_err(|e| CtrlError::Upgrade(e.to_string()))?;

        let result = self.run_upgrade().await.map_err(|e| match e {
            CtrlError::Upgrade(_) => e,
            other => CtrlError::Upgrade(other.to_string()),
        });

        // The daemon must come back down whether the tool succeeded or
        // not; normal-mode start follows.
        if let Err(e) = self.db.stop_standalone().await {
            warn!("failed to stop standalone daemon after upgrade: {e}");
            result?;
            return Err(CtrlError::Upgrade(e.to_string()));
        }

        result
    }
}
