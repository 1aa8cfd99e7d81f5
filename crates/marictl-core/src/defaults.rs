//! Tunable operational defaults for the controller.
//!
//! This module centralizes the configurable defaults that can be
//! overridden via the configuration file or CLI flags. Values that are
//! part of the boot contract (the readiness-attempt count is derived
//! from the polling frequency) live here rather than inline at their
//! call sites.

// ─── Boot / Readiness Polling ───────────────────────────────────────────────

/// Seconds between reachability probes while waiting for mysqld to come up.
/// The maximum attempt count is `DatabaseStartupTimeout / this`.
pub const STARTUP_POLLING_FREQUENCY_SECS: u64 = 5;

/// Default overall budget for the readiness poll (seconds).
pub const DEFAULT_DATABASE_STARTUP_TIMEOUT_SECS: u64 = 60;

/// Per-attempt budget for a single reachability probe (seconds).
pub const REACHABILITY_PROBE_TIMEOUT_SECS: u64 = 3;

// ─── Seeding ────────────────────────────────────────────────────────────────

/// Default number of attempts for the database seed script.
pub const DEFAULT_MAX_DATABASE_SEED_TRIES: u32 = 1;

/// Pause between failed seed attempts (seconds).
pub const SEED_RETRY_PAUSE_SECS: u64 = 1;

// ─── Database Access ────────────────────────────────────────────────────────

/// Default privileged user for seed and grant operations.
pub const DEFAULT_DB_USER: &str = "root";

/// Default name of the cluster-wide read-only user.
pub const DEFAULT_READ_ONLY_USER: &str = "roadmin";

// ─── Peer Health Checks ─────────────────────────────────────────────────────

/// Port of the per-node Galera healthcheck endpoint.
pub const DEFAULT_HEALTH_CHECK_PORT: u16 = 9200;

/// Per-peer budget for one health probe (seconds).
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

// ─── Daemon Shutdown ────────────────────────────────────────────────────────

/// How long to wait for mysqld to exit after SIGTERM before killing it
/// outright (seconds).
pub const DAEMON_STOP_GRACE_SECS: u64 = 30;
