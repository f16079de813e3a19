//! Orchestrator - the watch, verify, back up cycle.
//!
//! One cycle: wait for the database to change on disk, make sure the
//! backup medium is mounted (reminding the user until it is), copy the
//! database across, then record history if a remote is configured. The
//! loop has no successful end; the first operational error stops it.

use std::time::Duration;

use tracing::{error, info, warn};

use passbak_common::config::Settings;
use passbak_common::{ArgsError, BackupPlan, Notifier, WatchdogError};

use crate::backup::{self, BackupOutcome};
use crate::mounts::{self, MountSource};
use crate::nag::{NagPolicy, NagSession};
use crate::watcher;

/// Summary of the repeating mount reminder.
pub const NAG_SUMMARY: &str = "Backup medium is not mounted";

/// Summary of the one-off notice sent before each backup.
pub const BACKUP_NOTICE_SUMMARY: &str = "Backing up the db";

/// Summary of the report sent when the watchdog dies.
pub const FAILURE_SUMMARY: &str = "passbakd error";

/// Reports a fatal error on the desktop, best effort. The zero timeout
/// keeps the report up until the user dismisses it.
pub fn report_failure<N: Notifier>(notifier: &N, err: &WatchdogError) {
    error!(error = %err, "watchdog failed");
    if let Err(notify_err) = notifier.send(FAILURE_SUMMARY, &err.to_string(), Some(Duration::ZERO))
    {
        warn!(error = %notify_err, "could not report the failure on the desktop");
    }
}

pub struct Daemon<M, N> {
    plan: BackupPlan,
    settings: Settings,
    policy: NagPolicy,
    mounts: M,
    notifier: N,
}

impl<M: MountSource, N: Notifier> Daemon<M, N> {
    pub fn new(
        plan: BackupPlan,
        settings: Settings,
        mounts: M,
        notifier: N,
    ) -> Result<Self, ArgsError> {
        let policy = NagPolicy::from_settings(&settings.nag)?;
        Ok(Self {
            plan,
            settings,
            policy,
            mounts,
            notifier,
        })
    }

    /// The notifier the daemon reports through.
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Runs cycles until something fails.
    pub async fn run(&self) -> Result<(), WatchdogError> {
        info!(
            database = %self.plan.database.display(),
            mountpoint = %self.plan.mountpoint.display(),
            "watchdog started"
        );
        loop {
            let outcome = self.cycle().await?;
            info!(
                destination = %outcome.destination.display(),
                bytes = outcome.bytes_copied,
                committed = outcome.committed,
                "backup complete"
            );
        }
    }

    /// One full watch, verify, back up pass.
    pub async fn cycle(&self) -> Result<BackupOutcome, WatchdogError> {
        watcher::wait_for_change(&self.plan.database).await?;
        info!(path = %self.plan.database.display(), "database change detected");

        self.ensure_medium_mounted().await?;

        // Best effort; a lost notice is not worth losing the backup over.
        // Zero timeout, so the notice stays up while the copy runs.
        let notice_body = if self.plan.git_remote.is_some() {
            "Copying to backup drive.\nPushing changes to remote."
        } else {
            "Copying to backup drive."
        };
        if let Err(err) =
            self.notifier
                .send(BACKUP_NOTICE_SUMMARY, notice_body, Some(Duration::ZERO))
        {
            warn!(error = %err, "could not announce the backup");
        }

        backup::run(&self.plan, &self.settings.backup.commit_message)
    }

    async fn ensure_medium_mounted(&self) -> Result<(), WatchdogError> {
        if mounts::is_mounted(&self.mounts, &self.plan.mountpoint)? {
            return Ok(());
        }

        info!(
            mountpoint = %self.plan.mountpoint.display(),
            "backup medium is not mounted, reminding"
        );
        let body = format!(
            "Please plug in and mount the backup drive at {}",
            self.plan.mountpoint.display()
        );
        NagSession::new(&self.notifier, self.policy)
            .run(NAG_SUMMARY, &body, || {
                mounts::is_mounted(&self.mounts, &self.plan.mountpoint)
            })
            .await
    }
}
