//! In-memory stand-ins for the capability traits.
//!
//! No real filesystem, processes or network: files live in a map,
//! commands pop scripted results, sleeps return immediately and are
//! recorded. Call counts are exposed so tests can assert exactly which
//! operations a boot issued.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use marictl_core::error::{CtrlError, CtrlResult};

use crate::db::DbHelper;
use crate::health::ClusterHealthChecker;
use crate::os::OsHelper;
use crate::upgrader::Upgrader;

// ─── OS facade ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeOsHelper {
    files: Mutex<HashMap<PathBuf, String>>,
    commands: Mutex<Vec<String>>,
    command_results: Mutex<VecDeque<Result<String, String>>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeOsHelper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, path: impl AsRef<Path>, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf(), contents.to_string());
    }

    pub fn file_contents(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Script the outcome of the next `run_command` call. Unscripted
    /// calls succeed with empty output.
    pub fn queue_command_result(&self, result: Result<String, String>) {
        self.command_results.lock().unwrap().push_back(result);
    }

    /// Every command line run so far, as "cmd arg arg…".
    pub fn commands_run(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl OsHelper for FakeOsHelper {
    async fn file_exists(&self, path: &Path) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    async fn read_file(&self, path: &Path) -> CtrlResult<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                CtrlError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no such fake file: {}", path.display()),
                ))
            })
    }

    async fn write_string(&self, path: &Path, contents: &str) -> CtrlResult<()> {
        self.put_file(path, contents);
        Ok(())
    }

    async fn run_command(&self, cmd: &str, args: &[&str]) -> CtrlResult<String> {
        self.commands
            .lock()
            .unwrap()
            .push(format!("{cmd} {}", args.join(" ")));
        match self.command_results.lock().unwrap().pop_front() {
            Some(Ok(stdout)) => Ok(stdout),
            Some(Err(output)) => Err(CtrlError::Command {
                cmd: cmd.to_string(),
                output,
            }),
            None => Ok(String::new()),
        }
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

// ─── DB helper ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeDbHelper {
    bootstrap_calls: AtomicUsize,
    join_calls: AtomicUsize,
    standalone_calls: AtomicUsize,
    stop_calls: AtomicUsize,
    seed_calls: AtomicUsize,
    user_calls: AtomicUsize,
    upgrade_tool_calls: AtomicUsize,
    reachable_calls: AtomicUsize,

    reachable_default: AtomicBool,
    reachable_script: Mutex<VecDeque<bool>>,

    start_error: Mutex<Option<String>>,
    seed_error: Mutex<Option<String>>,
    grant_error: Mutex<Option<String>>,
    upgrade_tool_error: Mutex<Option<String>>,
}

impl FakeDbHelper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reachability result once the script (if any) runs out.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable_default.store(reachable, Ordering::SeqCst);
    }

    /// Per-probe reachability results, consumed in order.
    pub fn script_reachable(&self, results: Vec<bool>) {
        *self.reachable_script.lock().unwrap() = results.into();
    }

    pub fn fail_start(&self, message: &str) {
        *self.start_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_seed(&self, message: &str) {
        *self.seed_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_grant(&self, message: &str) {
        *self.grant_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_upgrade_tool(&self, message: &str) {
        *self.upgrade_tool_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn bootstraps(&self) -> usize {
        self.bootstrap_calls.load(Ordering::SeqCst)
    }

    pub fn joins(&self) -> usize {
        self.join_calls.load(Ordering::SeqCst)
    }

    pub fn standalone_starts(&self) -> usize {
        self.standalone_calls.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn seeds(&self) -> usize {
        self.seed_calls.load(Ordering::SeqCst)
    }

    pub fn user_creates(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub fn upgrade_tool_runs(&self) -> usize {
        self.upgrade_tool_calls.load(Ordering::SeqCst)
    }

    pub fn reachability_probes(&self) -> usize {
        self.reachable_calls.load(Ordering::SeqCst)
    }

    fn start_result(&self) -> CtrlResult<()> {
        match self.start_error.lock().unwrap().as_ref() {
            Some(msg) => Err(CtrlError::StartFailure(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DbHelper for FakeDbHelper {
    async fn start_in_bootstrap(&self) -> CtrlResult<()> {
        self.bootstrap_calls.fetch_add(1, Ordering::SeqCst);
        self.start_result()
    }

    async fn start_in_join(&self) -> CtrlResult<()> {
        self.join_calls.fetch_add(1, Ordering::SeqCst);
        self.start_result()
    }

    async fn start_standalone(&self) -> CtrlResult<()> {
        self.standalone_calls.fetch_add(1, Ordering::SeqCst);
        self.start_result()
    }

    async fn stop_standalone(&self) -> CtrlResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        self.reachable_calls.fetch_add(1, Ordering::SeqCst);
        match self.reachable_script.lock().unwrap().pop_front() {
            Some(scripted) => scripted,
            None => self.reachable_default.load(Ordering::SeqCst),
        }
    }

    async fn seed(&self) -> CtrlResult<()> {
        self.seed_calls.fetch_add(1, Ordering::SeqCst);
        match self.seed_error.lock().unwrap().as_ref() {
            Some(msg) => Err(CtrlError::Seed(msg.clone())),
            None => Ok(()),
        }
    }

    async fn create_read_only_user(&self) -> CtrlResult<()> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        match self.grant_error.lock().unwrap().as_ref() {
            Some(msg) => Err(CtrlError::Grant(msg.clone())),
            None => Ok(()),
        }
    }

    async fn run_upgrade_tool(&self) -> CtrlResult<()> {
        self.upgrade_tool_calls.fetch_add(1, Ordering::SeqCst);
        match self.upgrade_tool_error.lock().unwrap().as_ref() {
            Some(msg) => Err(CtrlError::Command {
                cmd: "mysql_upgrade".to_string(),
                output: msg.clone(),
            }),
            None => Ok(()),
        }
    }
}

// ─── Health checker ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeHealthChecker {
    healthy: AtomicBool,
    probes: AtomicUsize,
}

impl FakeHealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ClusterHealthChecker for FakeHealthChecker {
    async fn any_healthy(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }
}

// ─── Upgrader ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeUpgrader {
    needs: AtomicBool,
    upgrade_calls: AtomicUsize,
    needs_error: Mutex<Option<String>>,
    upgrade_error: Mutex<Option<String>>,
}

impl FakeUpgrader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_needs_upgrade(&self, needs: bool) {
        self.needs.store(needs, Ordering::SeqCst);
    }

    pub fn fail_needs_upgrade(&self, message: &str) {
        *self.needs_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn fail_upgrade(&self, message: &str) {
        *self.upgrade_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn upgrades(&self) -> usize {
        self.upgrade_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Upgrader for FakeUpgrader {
    async fn needs_upgrade(&self) -> CtrlResult<bool> {
        match self.needs_error.lock().unwrap().as_ref() {
            Some(msg) => Err(CtrlError::Config(msg.clone())),
            None => Ok(self.needs.load(Ordering::SeqCst)),
        }
    }

    async fn upgrade(&self) -> CtrlResult<()> {
        self.upgrade_calls.fetch_add(1, Ordering::SeqCst);
        match self.upgrade_error.lock().unwrap().as_ref() {
            Some(msg) => Err(CtrlError::Upgrade(msg.clone())),
            None => Ok(()),
        }
    }
}
