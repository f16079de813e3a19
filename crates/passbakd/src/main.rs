//! passbakd - password database backup watchdog.
//!
//! Watches a password database file and, on every change, copies it to a
//! mounted backup medium and optionally commits and pushes it to a git
//! remote. If the medium is missing the user is reminded on the desktop
//! until they mount it.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use passbak_common::config::{Settings, CONFIG_PATH_ENV, SYSTEM_CONFIG_PATH};
use passbak_common::{ArgsError, BackupPlan, NotifySend, WatchdogError};
use passbakd::daemon::{self, Daemon};
use passbakd::mounts::ProcMounts;
use passbakd::watcher;

#[derive(Parser, Debug)]
#[command(name = "passbakd")]
#[command(about = "Password database backup watchdog", long_about = None)]
#[command(version)]
#[command(
    after_help = "When GIT_REMOTE is given, the database's directory must be a git \
                  repository with that remote configured."
)]
struct Args {
    /// Password database file to guard
    database_path: PathBuf,

    /// Mountpoint the backup medium appears at
    storage_mount_point: PathBuf,

    /// Git remote to push history to (omit to skip history recording)
    git_remote: Option<String>,
}

fn startup_exit(err: &ArgsError) -> ExitCode {
    eprintln!("passbakd: {err}");
    if err.is_settings() {
        eprintln!(
            "Settings are read from {SYSTEM_CONFIG_PATH}, or the file named by ${CONFIG_PATH_ENV}."
        );
    } else {
        eprintln!("Run passbakd --help for usage.");
    }
    ExitCode::from(2)
}

fn fail(err: &WatchdogError) -> ExitCode {
    daemon::report_failure(&NotifySend::new(), err);
    ExitCode::FAILURE
}

#[tokio::main]
async fn main() -> ExitCode {
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_level(true)
        .without_time()
        .init();

    let args = Args::parse();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(err) => return startup_exit(&err),
    };
    let plan = match BackupPlan::resolve(
        args.database_path,
        args.storage_mount_point,
        args.git_remote,
    ) {
        Ok(plan) => plan,
        Err(err) => return startup_exit(&err),
    };

    // Prove the database is watchable before settling in. A failure here
    // is operational, so it is reported like one from the loop.
    if let Err(err) = watcher::establish_watch(&plan.database) {
        return fail(&err);
    }

    let daemon = match Daemon::new(plan, settings, ProcMounts::new(), NotifySend::new()) {
        Ok(daemon) => daemon,
        Err(err) => return startup_exit(&err),
    };

    tokio::select! {
        result = daemon.run() => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(err) => fail(&err),
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted, shutting down");
            ExitCode::SUCCESS
        }
    }
}
