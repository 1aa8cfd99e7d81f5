//! marictl: cluster bootstrap and lifecycle controller for a
//! Galera-style MariaDB node.
//!
//! One controller process runs on every node of the cluster. At boot it
//! decides whether the local mysqld must bootstrap a new Primary
//! Component or join the existing one, drives it to readiness, seeds the
//! application schemas, then signals ready to the outer supervisor and
//! waits for a termination request.
//!
//! Usage:
//!   marictl --config /var/lib/marictl/marictl.yml

mod db;
mod health;
mod manager;
mod os;
mod runner;
mod starter;
#[cfg(test)]
mod testing;
mod upgrader;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use marictl_core::config::Config;
use marictl_core::defaults::DEFAULT_HEALTH_CHECK_PORT;

use crate::db::{DbHelper, MariaDbHelper};
use crate::health::{ClusterHealthChecker, HttpHealthChecker};
use crate::manager::StartManager;
use crate::os::{OsHelper, SystemOsHelper};
use crate::runner::Runner;
use crate::starter::NodeStarter;
use crate::upgrader::{Upgrader, VersionFileUpgrader};

/// MariaDB Galera cluster bootstrap controller
#[derive(Parser, Debug)]
#[command(name = "marictl", version, about = "MariaDB cluster bootstrap controller")]
struct Args {
    /// Path to the controller configuration file (YAML)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("marictl v{} starting", env!("CARGO_PKG_VERSION"));

    let raw = match std::fs::read_to_string(&args.config) {
        Ok(raw) => raw,
        Err(e) => {
            error!("cannot read config file {}: {e}", args.config.display());
            std::process::exit(1);
        }
    };
    let config = match Config::from_yaml(&raw).and_then(|c| {
        c.validate()?;
        Ok(c)
    }) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    // Wire the capability bundles together, leaves first.
    let os: Arc<dyn OsHelper> = Arc::new(SystemOsHelper);
    let db: Arc<dyn DbHelper> = Arc::new(MariaDbHelper::new(
        os.clone(),
        config.db.clone(),
        config.log_file_location.clone(),
        config.manager.max_database_seed_tries,
    ));
    let health: Arc<dyn ClusterHealthChecker> = Arc::new(HttpHealthChecker::new(
        &config.manager.cluster_ips,
        DEFAULT_HEALTH_CHECK_PORT,
    ));
    let upgrader: Arc<dyn Upgrader> = Arc::new(VersionFileUpgrader::new(
        os.clone(),
        db.clone(),
        config.upgrader.clone(),
        config.manager.database_startup_timeout,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let starter = NodeStarter::new(
        db.clone(),
        os.clone(),
        health,
        config.manager.database_startup_timeout,
        shutdown_rx.clone(),
    );
    let manager = StartManager::new(
        os.clone(),
        db.clone(),
        upgrader,
        starter,
        config.manager.clone(),
    );
    let (runner, mut ready) = Runner::new(manager, db, shutdown_rx);

    let mut boot = tokio::spawn(runner.run());

    // Wait for the boot to complete, fail, or be interrupted.
    tokio::select! {
        changed = ready.changed() => {
            if changed.is_err() || !*ready.borrow() {
                report_boot_result(boot.await);
                std::process::exit(1);
            }
        }
        result = &mut boot => {
            report_boot_result(result);
            std::process::exit(1);
        }
        _ = termination_signal() => {
            info!("terminated before the node was ready");
            let _ = shutdown_tx.send(true);
            let _ = boot.await;
            std::process::exit(1);
        }
    }

    // The node is ready: acquire the PID file and hold until termination.
    if let Err(e) = write_pid_file(&config.pid_file) {
        error!("cannot write PID file {}: {e}", config.pid_file.display());
        let _ = shutdown_tx.send(true);
        let _ = boot.await;
        std::process::exit(1);
    }
    info!("marictl started");

    let code = tokio::select! {
        result = &mut boot => {
            // The runner has no business returning before a shutdown
            // request; whatever happened, report it.
            match result {
                Ok(Ok(())) => 0,
                other => {
                    report_boot_result(other);
                    1
                }
            }
        }
        _ = termination_signal() => {
            let _ = shutdown_tx.send(true);
            match boot.await {
                Ok(Ok(())) => 0,
                other => {
                    report_boot_result(other);
                    1
                }
            }
        }
    };

    let _ = std::fs::remove_file(&config.pid_file);
    info!("marictl stopped");
    std::process::exit(code);
}

fn write_pid_file(path: &Path) -> std::io::Result<()> {
    info!("writing PID to {}", path.display());
    std::fs::write(path, std::process::id().to_string())
}

fn report_boot_result(result: Result<marictl_core::error::CtrlResult<()>, tokio::task::JoinError>) {
    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("boot failed: {e}"),
        Err(e) => error!("controller task panicked: {e}"),
    }
}

/// Resolves on SIGTERM or SIGINT from the supervisor.
async fn termination_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            }
        }
        Err(e) => {
            warn!("cannot install SIGTERM handler: {e}");
            let _ = ctrl_c.await;
            info!("SIGINT received");
        }
    }
}
