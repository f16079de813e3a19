//! Desktop notifications via notify-send.
//!
//! Supports:
//! - Fire-and-forget alerts
//! - Tracked notifications that return the server-assigned id
//! - In-place replacement, so a repeating reminder updates one bubble
//!   instead of stacking copies
//!
//! The daemon and the nag loop depend on the [`Notifier`] trait so tests
//! can record calls instead of spawning processes.

use std::io;
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tracing::debug;

use crate::error::NotifyError;

/// Server-assigned id of a displayed notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationHandle(u32);

impl NotificationHandle {
    pub fn id(self) -> u32 {
        self.0
    }
}

/// Notification transport.
pub trait Notifier {
    /// Displays a notification. `None` leaves the expiry to the server;
    /// a zero timeout asks the server to keep it until dismissed.
    fn send(&self, summary: &str, body: &str, timeout: Option<Duration>)
        -> Result<(), NotifyError>;

    /// Displays a notification and returns its handle for later replacement.
    fn send_tracked(
        &self,
        summary: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<NotificationHandle, NotifyError>;

    /// Replaces the referenced notification in place.
    fn replace(
        &self,
        handle: NotificationHandle,
        summary: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<(), NotifyError>;
}

/// Talks to the session's notification server by running notify-send.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotifySend;

impl NotifySend {
    pub fn new() -> Self {
        Self
    }

    /// Locates notify-send in PATH. Looked up per call so the daemon
    /// keeps working if the binary appears after startup.
    fn command() -> Result<Command, NotifyError> {
        let bin = which::which("notify-send")?;
        Ok(Command::new(bin))
    }

    fn run(mut cmd: Command) -> Result<String, NotifyError> {
        let output = cmd.output().map_err(NotifyError::Spawn)?;
        if !output.status.success() {
            return Err(NotifyError::Failed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Notifier for NotifySend {
    fn send(
        &self,
        summary: &str,
        body: &str,
        timeout: Option<Duration>,
    ) -> Result<(), NotifyError> {
        let mut cmd = Self::command()?;
        if let Some(timeout) = timeout {
            cmd.arg("-t").arg(timeout.as_millis().to_string());
        }
        cmd.arg(summary).arg(body);
        Self::run(cmd)?;
        debug!(summary, "notification sent");
        Ok(())
    }

    fn send_tracked(
        &self,
        summary: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<NotificationHandle, NotifyError> {
        let mut cmd = Self::command()?;
        cmd.arg("-p");
        cmd.arg("-t").arg(timeout.as_millis().to_string());
        cmd.arg(summary).arg(body);
        let stdout = Self::run(cmd)?;
        let raw = stdout.trim();
        let id = raw.parse::<u32>().map_err(|_| NotifyError::BadId {
            raw: raw.to_string(),
        })?;
        debug!(summary, id, "tracked notification sent");
        Ok(NotificationHandle(id))
    }

    fn replace(
        &self,
        handle: NotificationHandle,
        summary: &str,
        body: &str,
        timeout: Duration,
    ) -> Result<(), NotifyError> {
        let mut cmd = Self::command()?;
        cmd.arg("-r").arg(handle.id().to_string());
        cmd.arg("-t").arg(timeout.as_millis().to_string());
        cmd.arg(summary).arg(body);
        Self::run(cmd)?;
        debug!(summary, id = handle.id(), "notification replaced");
        Ok(())
    }
}

// ============================================================================
// Test support
// ============================================================================

/// One operation a [`RecordingNotifier`] was asked to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifierCall {
    Send {
        summary: String,
        body: String,
        timeout: Option<Duration>,
    },
    SendTracked {
        handle: NotificationHandle,
        summary: String,
        body: String,
    },
    Replace {
        handle: NotificationHandle,
        summary: String,
        body: String,
    },
}

/// Records calls instead of talking to a notification server.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<NotifierCall>>,
    next_id: AtomicU32,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything recorded so far, in call order.
    pub fn calls(&self) -> Vec<NotifierCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Makes every subsequent call fail with a spawn error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, call: NotifierCall) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Spawn(io::Error::other("forced failure")));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

impl Notifier for RecordingNotifier {
    fn send(
        &self,
        summary: &str,
        body: &str,
        timeout: Option<Duration>,
    ) -> Result<(), NotifyError> {
        self.record(NotifierCall::Send {
            summary: summary.to_string(),
            body: body.to_string(),
            timeout,
        })
    }

    fn send_tracked(
        &self,
        summary: &str,
        body: &str,
        _timeout: Duration,
    ) -> Result<NotificationHandle, NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Spawn(io::Error::other("forced failure")));
        }
        let handle = NotificationHandle(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.record(NotifierCall::SendTracked {
            handle,
            summary: summary.to_string(),
            body: body.to_string(),
        })?;
        Ok(handle)
    }

    fn replace(
        &self,
        handle: NotificationHandle,
        summary: &str,
        body: &str,
        _timeout: Duration,
    ) -> Result<(), NotifyError> {
        self.record(NotifierCall::Replace {
            handle,
            summary: summary.to_string(),
            body: body.to_string(),
        })
    }
}
