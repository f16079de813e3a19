//! Passbak daemon library - exposes modules for testing.

pub mod backup;
pub mod daemon;
pub mod mounts;
pub mod nag;
pub mod watcher;
