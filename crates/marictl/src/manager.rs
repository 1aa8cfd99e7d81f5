//! The boot decision procedure.
//!
//! Executed exactly once per process lifetime: consult the upgrader,
//! derive the target state from the node index and the persisted state
//! file, hand the target to the starter, and persist the state it
//! returns. The state file is only ever written after the daemon has been
//! observed reachable and both post-start operations have succeeded, so a
//! crash at any earlier point leaves the prior state intact and the next
//! boot re-derives a safe target.

use std::sync::Arc;

use tracing::{error, info, warn};

use marictl_core::config::ManagerConfig;
use marictl_core::error::{CtrlError, CtrlResult};
use marictl_core::state::NodeState;

use crate::db::DbHelper;
use crate::os::OsHelper;
use crate::starter::NodeStarter;
use crate::upgrader::Upgrader;

pub struct StartManager {
    os: Arc<dyn OsHelper>,
    db: Arc<dyn DbHelper>,
    upgrader: Arc<dyn Upgrader>,
    starter: NodeStarter,
    config: ManagerConfig,
}

impl StartManager {
    pub fn new(
        os: Arc<dyn OsHelper>,
        db: Arc<dyn DbHelper>,
        upgrader: Arc<dyn Upgrader>,
        starter: NodeStarter,
        config: ManagerConfig,
    ) -> Self {
        Self {
            os,
            db,
            upgrader,
            starter,
            config,
        }
    }

    /// Run one full boot. Not re-entrant.
    pub async fn execute(&self) -> CtrlResult<()> {
        let needs_upgrade = self.upgrader.needs_upgrade().await.map_err(|e| {
            error!("failed to determine upgrade status: {e}");
            e
        })?;
        if needs_upgrade {
            info!("data dictionary upgrade required");
            self.upgrader.upgrade().await.map_err(|e| {
                error!("upgrade phase failed: {e}");
                e
            })?;
        }

        let target = self.select_target().await?;
        info!("starting node with target state {target}");

        let new_state = match self.starter.start(target).await {
            Ok(state) => state,
            Err(e) => {
                self.stop_after_failed_boot(&e).await;
                return Err(e);
            }
        };

        self.os
            .write_string(&self.config.state_file_location, new_state.as_tag())
            .await?;
        info!("node boot complete, persisted state {new_state}");
        Ok(())
    }

    /// Map (node index, peer count, persisted state) to the target state
    /// handed to the starter.
    async fn select_target(&self) -> CtrlResult<NodeState> {
        // Peer nodes never bootstrap: if node 0 has not formed the
        // Primary Component yet, their join retries until it has.
        if self.config.job_index != 0 {
            return Ok(NodeState::Clustered);
        }

        // Standalone deploy; there is nobody to join.
        if self.config.number_of_nodes() == 1 {
            info!("single node deploy");
            return Ok(NodeState::SingleNode);
        }

        let state_file = &self.config.state_file_location;
        if !self.os.file_exists(state_file).await {
            // The only moment in the cluster's life when a multi-node
            // bootstrap is legitimate with no prior state.
            info!("no state file at {}, first boot of node 0", state_file.display());
            return Ok(NodeState::NeedsBootstrap);
        }

        let raw = self.os.read_file(state_file).await?;
        let prior: NodeState = raw.parse()?;
        info!("state file contains {prior}");

        match prior {
            // Scaled up from one node: node 0 must re-bootstrap to seed
            // the new multi-node Primary Component.
            NodeState::SingleNode => {
                info!("scaling up from a single-node deploy");
                Ok(NodeState::NeedsBootstrap)
            }
            other => Ok(other),
        }
    }

    /// After a post-start failure the daemon handle is still live; take it
    /// down so the supervisor sees a clean failed boot. Launch failures
    /// have nothing to stop.
    async fn stop_after_failed_boot(&self, cause: &CtrlError) {
        match cause {
            CtrlError::Timeout { .. }
            | CtrlError::Seed(_)
            | CtrlError::Grant(_)
            | CtrlError::Cancelled => {
                warn!("stopping database daemon after failed boot: {cause}");
                if let Err(e) = self.db.stop_standalone().await {
                    warn!("failed to stop database daemon: {e}");
                }
            }
            _ => {}
        }
    }
}
