//! Shared types for the passbak components.
//!
//! Configuration, the error taxonomy, and the desktop-notification
//! transport live here so the daemon stays focused on the watch loop.

pub mod config;
pub mod error;
pub mod notifier;

pub use config::{BackupPlan, Settings};
pub use error::{ArgsError, GitStage, NotifyError, WatchdogError};
pub use notifier::{NotificationHandle, Notifier, NotifySend};
