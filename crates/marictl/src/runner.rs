//! Long-lived harness around the start manager.
//!
//! Runs the boot sequence once, then parks until the supervisor asks the
//! process to terminate. Two signals face outward: a `ready` watch that
//! flips to `true` strictly after the state file has been written, and
//! the return value of [`Runner::run`], which carries any fatal boot
//! error. On termination the owned daemon is stopped gracefully.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use marictl_core::error::{CtrlError, CtrlResult};

use crate::db::DbHelper;
use crate::manager::StartManager;

pub struct Runner {
    manager: StartManager,
    db: Arc<dyn DbHelper>,
    ready: watch::Sender<bool>,
    shutdown: watch::Receiver<bool>,
}

impl Runner {
    /// Returns the runner and the receiving half of its ready signal.
    pub fn new(
        manager: StartManager,
        db: Arc<dyn DbHelper>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, watch::Receiver<bool>) {
        let (ready_tx, ready_rx) = watch::channel(false);
        (
            Self {
                manager,
                db,
                ready: ready_tx,
                shutdown,
            },
            ready_rx,
        )
    }

    /// Boot the node, signal ready, wait for termination.
    ///
    /// Returns `Ok(())` only for a clean shutdown requested after ready.
    /// A shutdown that arrives mid-boot stops the daemon and surfaces as
    /// [`CtrlError::Cancelled`].
    pub async fn run(self) -> CtrlResult<()> {
        let mut shutdown = self.shutdown.clone();

        tokio::select! {
            result = self.manager.execute() => result?,
            _ = wait_for_shutdown(&mut shutdown) => {
                info!("shutdown requested during boot");
                if let Err(e) = self.db.stop_standalone().await {
                    warn!("failed to stop database daemon: {e}");
                }
                return Err(CtrlError::Cancelled);
            }
        }

        // The state file is on disk; external observers may now treat
        // this node as part of the cluster.
        let _ = self.ready.send(true);
        info!("node is ready");

        wait_for_shutdown(&mut shutdown).await;
        info!("shutdown requested, stopping database daemon");
        self.db.stop_standalone().await
    }
}

/// Resolves once the shutdown flag is set. A dropped sender counts as a
/// shutdown request so the daemon still gets cleaned up.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
