//! Error types for passbak.
//!
//! Two families, handled differently at the top level: [`ArgsError`] for
//! anything wrong with the invocation itself (printed to the operator,
//! nonzero exit, no notification), and [`WatchdogError`] for everything
//! after startup (reported once via desktop notification, then the
//! process exits nonzero so a supervisor can decide about a restart).

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Startup errors: surfaced before any resource is acquired.
#[derive(Error, Debug)]
pub enum ArgsError {
    #[error("invalid database path {path:?}: not an existing regular file")]
    InvalidDatabase { path: PathBuf },

    #[error("invalid storage mountpoint {path:?}: path does not exist")]
    InvalidMountpoint { path: PathBuf },

    #[error("cannot resolve {path:?}: {source}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "nag re-display interval {interval_ms} ms must be shorter than the notification expiry {expiry_ms} ms"
    )]
    BadNagPolicy { interval_ms: u64, expiry_ms: u64 },

    #[error("cannot read settings file {path:?}: {source}")]
    SettingsRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed settings file {path:?}: {source}")]
    SettingsParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ArgsError {
    /// True when the error concerns the settings file rather than the
    /// command line. The usage text has nothing to say about those.
    pub fn is_settings(&self) -> bool {
        matches!(
            self,
            ArgsError::BadNagPolicy { .. }
                | ArgsError::SettingsRead { .. }
                | ArgsError::SettingsParse { .. }
        )
    }
}

/// Which git operation a history recording failed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitStage {
    Open,
    Stage,
    Commit,
    Push,
}

impl GitStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            GitStage::Open => "open",
            GitStage::Stage => "stage",
            GitStage::Commit => "commit",
            GitStage::Push => "push",
        }
    }
}

impl fmt::Display for GitStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures of the notify-send transport.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("notify-send not found in PATH: {0}")]
    MissingBinary(#[from] which::Error),

    #[error("failed to run notify-send: {0}")]
    Spawn(#[source] io::Error),

    #[error("notify-send exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("notify-send printed an unusable notification id {raw:?}")]
    BadId { raw: String },
}

/// Operational errors: anything encountered once the watchdog is running.
/// None of these are retried internally.
#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error("file watch failed: {0}")]
    Watch(#[from] notify::Error),

    #[error("mount enumeration failed: {source}")]
    Mounts {
        #[source]
        source: io::Error,
    },

    #[error("mountinfo line {line} is malformed")]
    MountinfoParse { line: usize },

    #[error("notification transport failed: {0}")]
    Notify(#[from] NotifyError),

    #[error("condition still false after nagging for {waited:?}")]
    NagTimeout { waited: Duration },

    #[error("copying {path:?} failed: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("git {stage} failed in {repo:?}: {source}")]
    Git {
        stage: GitStage,
        repo: PathBuf,
        #[source]
        source: git2::Error,
    },
}
