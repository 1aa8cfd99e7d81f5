//! Node start-state transitions.
//!
//! Given a target state, pick bootstrap or join, launch the daemon, poll
//! it to reachability within a bounded budget, then run the post-start
//! seed and grant operations. Returns the state the node should persist.
//! The starter never stops the daemon itself: on failure the handle
//! stays live and the caller decides.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use marictl_core::defaults::STARTUP_POLLING_FREQUENCY_SECS;
use marictl_core::error::{CtrlError, CtrlResult};
use marictl_core::state::NodeState;

use crate::db::DbHelper;
use crate::health::ClusterHealthChecker;
use crate::os::OsHelper;

enum StartAction {
    Bootstrap,
    Join,
}

/// Drives a single node start from a target state to a persisted state.
pub struct NodeStarter {
    db: Arc<dyn DbHelper>,
    os: Arc<dyn OsHelper>,
    health: Arc<dyn ClusterHealthChecker>,
    startup_timeout_secs: u64,
    shutdown: watch::Receiver<bool>,
}

impl NodeStarter {
    pub fn new(
        db: Arc<dyn DbHelper>,
        os: Arc<dyn OsHelper>,
        health: Arc<dyn ClusterHealthChecker>,
        startup_timeout_secs: u64,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            db,
            os,
            health,
            startup_timeout_secs,
            shutdown,
        }
    }

    /// Start the daemon for `target` and return the state to persist.
    ///
    /// `SingleNode` always bootstraps and stays `SingleNode`. `Clustered`
    /// always joins. `NeedsBootstrap` consults cluster health: if some
    /// peer already has a healthy Primary Component this node joins it
    /// instead of forming a second one; either way the node comes out
    /// `Clustered`.
    pub async fn start(&self, target: NodeState) -> CtrlResult<NodeState> {
        let (action, next) = match target {
            NodeState::SingleNode => (StartAction::Bootstrap, NodeState::SingleNode),
            NodeState::Clustered => (StartAction::Join, NodeState::Clustered),
            NodeState::NeedsBootstrap => {
                if self.health.any_healthy().await {
                    info!("a healthy Primary Component exists, joining instead of bootstrapping");
                    (StartAction::Join, NodeState::Clustered)
                } else {
                    (StartAction::Bootstrap, NodeState::Clustered)
                }
            }
        };

        match action {
            StartAction::Bootstrap => self.db.start_in_bootstrap().await?,
            StartAction::Join => self.db.start_in_join().await?,
        }

        self.wait_until_reachable().await?;

        self.db.seed().await?;
        self.db.create_read_only_user().await?;

        Ok(next)
    }

    /// Bounded readiness poll: up to `timeout / poll-frequency` attempts,
    /// one probe then one sleep per attempt. A shutdown request between
    /// attempts cancels the loop after the in-flight probe completes.
    async fn wait_until_reachable(&self) -> CtrlResult<()> {
        let poll = Duration::from_secs(STARTUP_POLLING_FREQUENCY_SECS);
        let attempts = self.startup_timeout_secs / STARTUP_POLLING_FREQUENCY_SECS;
        let mut shutdown = self.shutdown.clone();

        for attempt in 1..=attempts {
            if *shutdown.borrow() {
                return Err(CtrlError::Cancelled);
            }

            if self.db.is_reachable().await {
                info!("database reachable after {attempt} attempt(s)");
                return Ok(());
            }
            debug!("database not reachable yet (attempt {attempt}/{attempts})");

            tokio::select! {
                _ = self.os.sleep(poll) => {}
                changed = shutdown.changed() => {
                    if changed.is_ok() && *shutdown.borrow() {
                        return Err(CtrlError::Cancelled);
                    }
                    // Sender gone: nobody can cancel us any more, finish
                    // the pause normally.
                    self.os.sleep(poll).await;
                }
            }
        }

        Err(CtrlError::Timeout {
            seconds: self.startup_timeout_secs,
        })
    }
}
