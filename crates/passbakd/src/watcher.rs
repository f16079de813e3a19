//! File watch loop - waits for the guarded database to change on disk.
//!
//! Password managers replace the database atomically (write a temp file,
//! rename it over the old one), so the watched inode often disappears
//! instead of being written in place. Removal therefore counts as a
//! change, same as a data write; renames and metadata churn do not.

use std::path::Path;

use notify::event::ModifyKind;
use notify::{Event, EventKind, RecursiveMode, Watcher as NotifyWatcher};
use tokio::sync::mpsc;
use tracing::debug;

use passbak_common::WatchdogError;

/// Returns true for events that mean the database contents changed.
pub fn is_change_event(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Remove(_) | EventKind::Modify(ModifyKind::Data(_))
    )
}

/// Registers a watch on `path` and resolves once a qualifying change
/// arrives. The watch is dropped before returning, so a burst of writes
/// coalesces into the single cycle the caller runs next.
pub async fn wait_for_change(path: &Path) -> Result<(), WatchdogError> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        let _ = tx.send(res);
    })?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    debug!(path = %path.display(), "watching database");

    while let Some(res) = rx.recv().await {
        let event = res?;
        if is_change_event(&event) {
            debug!(kind = ?event.kind, "database changed");
            return Ok(());
        }
    }
    Err(WatchdogError::Watch(notify::Error::generic(
        "watch event channel closed",
    )))
}

/// Registers and immediately drops a watch, proving the path is watchable.
/// Run once at startup so a bad path fails before the first change.
pub fn establish_watch(path: &Path) -> Result<(), WatchdogError> {
    let mut watcher = notify::recommended_watcher(|_res: Result<Event, notify::Error>| {})?;
    watcher.watch(path, RecursiveMode::NonRecursive)?;
    Ok(())
}
