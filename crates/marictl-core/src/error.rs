/// Controller error types.
///
/// Every boot phase that can fail has its own variant so that the fatal
/// log line at the top level can name the phase. Errors are returned
/// verbatim through every layer; only `main` converts them to an exit
/// code.
use thiserror::Error;

/// Unified error type for all controller operations.
#[derive(Debug, Error)]
pub enum CtrlError {
    /// Missing or malformed configuration. Raised before any daemon action.
    #[error("configuration error: {0}")]
    Config(String),

    /// The persisted state file held something other than a known tag.
    #[error("unrecognized node state tag: {0:?}")]
    UnknownState(String),

    /// The in-place data dictionary migration failed. The node is
    /// unusable until an operator intervenes.
    #[error("upgrade failed: {0}")]
    Upgrade(String),

    /// The database daemon process could not be launched.
    #[error("failed to start database daemon: {0}")]
    StartFailure(String),

    /// The daemon launched but never became reachable within the
    /// configured startup budget.
    #[error("Timeout: database not reachable after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// The seed script failed on every allowed attempt.
    #[error("database seeding failed: {0}")]
    Seed(String),

    /// Creating or updating the read-only user failed.
    #[error("read-only user creation failed: {0}")]
    Grant(String),

    /// An external shutdown request arrived while the boot sequence was
    /// still in flight.
    #[error("shutdown requested during boot")]
    Cancelled,

    /// An invoked command exited non-zero.
    #[error("command `{cmd}` failed: {output}")]
    Command { cmd: String, output: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for controller operations.
pub type CtrlResult<T> = Result<T, CtrlError>;
