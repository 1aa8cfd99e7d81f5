//! Thin OS facade.
//!
//! Pure capability-based indirection over the filesystem, subprocesses
//! and the clock; no policy. The upper layers only ever touch the OS
//! through this trait, so tests can run the whole boot sequence against
//! an in-memory stand-in without touching a real disk or spawning real
//! processes.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use marictl_core::error::{CtrlError, CtrlResult};

/// Operating-system capabilities used by the controller.
#[async_trait]
pub trait OsHelper: Send + Sync {
    async fn file_exists(&self, path: &Path) -> bool;

    async fn read_file(&self, path: &Path) -> CtrlResult<String>;

    async fn write_string(&self, path: &Path, contents: &str) -> CtrlResult<()>;

    /// Run a command to completion and return its stdout. A non-zero exit
    /// surfaces as [`CtrlError::Command`] carrying the combined output.
    async fn run_command(&self, cmd: &str, args: &[&str]) -> CtrlResult<String>;

    async fn sleep(&self, duration: Duration);
}

/// The real thing: tokio fs, process and time.
pub struct SystemOsHelper;

#[async_trait]
impl OsHelper for SystemOsHelper {
    async fn file_exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_file(&self, path: &Path) -> CtrlResult<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write_string(&self, path: &Path, contents: &str) -> CtrlResult<()> {
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn run_command(&self, cmd: &str, args: &[&str]) -> CtrlResult<String> {
        debug!("running command: {} {}", cmd, args.join(" "));
        let output = Command::new(cmd).args(args).output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            Err(CtrlError::Command {
                cmd: cmd.to_string(),
                output: combined.trim().to_string(),
            })
        }
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
