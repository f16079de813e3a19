//! Backup executor - copies the database to the medium and records history.
//!
//! Two stages, always in this order:
//! 1. Copy the database onto the mounted medium, overwriting the
//!    previous backup under the same file name.
//! 2. If a git remote is configured, commit the database in the
//!    repository containing it and push to that remote.
//!
//! The copy is the part that must not be lost, so it runs first; a git
//! failure leaves the fresh copy in place and is reported with the stage
//! it died at.

use std::ffi::OsStr;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use git2::Repository;
use tracing::debug;

use passbak_common::{BackupPlan, GitStage, WatchdogError};

/// What a completed backup did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    /// Where the copy landed on the medium.
    pub destination: PathBuf,
    /// Size of the copied database.
    pub bytes_copied: u64,
    /// Whether a history commit was made and pushed.
    pub committed: bool,
}

/// Runs a full backup for `plan`.
pub fn run(plan: &BackupPlan, commit_message: &str) -> Result<BackupOutcome, WatchdogError> {
    let (destination, bytes_copied) = copy_to_medium(plan)?;
    debug!(bytes = bytes_copied, path = %destination.display(), "database copied");

    let committed = match plan.git_remote.as_deref() {
        Some(remote) => {
            record_history(plan, remote, commit_message)?;
            true
        }
        None => false,
    };

    Ok(BackupOutcome {
        destination,
        bytes_copied,
        committed,
    })
}

fn backup_file_name(database: &Path) -> Result<&OsStr, WatchdogError> {
    database.file_name().ok_or_else(|| WatchdogError::Copy {
        path: database.to_path_buf(),
        source: io::Error::new(
            io::ErrorKind::InvalidInput,
            "database path has no file name",
        ),
    })
}

/// Copies the database to the medium, overwriting any previous backup.
/// Returns the destination path and the byte count.
pub fn copy_to_medium(plan: &BackupPlan) -> Result<(PathBuf, u64), WatchdogError> {
    let destination = plan.mountpoint.join(backup_file_name(&plan.database)?);

    let mut db = File::open(&plan.database).map_err(|source| WatchdogError::Copy {
        path: plan.database.clone(),
        source,
    })?;
    let mut out = File::create(&destination).map_err(|source| WatchdogError::Copy {
        path: destination.clone(),
        source,
    })?;
    let bytes = io::copy(&mut db, &mut out).map_err(|source| WatchdogError::Copy {
        path: destination.clone(),
        source,
    })?;

    Ok((destination, bytes))
}

fn git_err(stage: GitStage, repo: &Path, source: git2::Error) -> WatchdogError {
    WatchdogError::Git {
        stage,
        repo: repo.to_path_buf(),
        source,
    }
}

/// Commits the database in the repository containing it and pushes the
/// current branch to `remote_name`.
///
/// The commit is made even when nothing changed since the last one, same
/// as the copy overwriting an identical backup. An unborn HEAD (fresh
/// repository) yields a parentless first commit.
pub fn record_history(
    plan: &BackupPlan,
    remote_name: &str,
    message: &str,
) -> Result<(), WatchdogError> {
    let repo_dir = match plan.database.parent() {
        Some(parent) => parent,
        None => {
            return Err(git_err(
                GitStage::Open,
                &plan.database,
                git2::Error::from_str("database path has no parent directory"),
            ))
        }
    };

    let repo = Repository::open(repo_dir).map_err(|e| git_err(GitStage::Open, repo_dir, e))?;

    let rel = Path::new(backup_file_name(&plan.database)?);
    let mut index = repo
        .index()
        .map_err(|e| git_err(GitStage::Stage, repo_dir, e))?;
    index
        .add_path(rel)
        .map_err(|e| git_err(GitStage::Stage, repo_dir, e))?;
    index
        .write()
        .map_err(|e| git_err(GitStage::Stage, repo_dir, e))?;

    let tree_id = index
        .write_tree()
        .map_err(|e| git_err(GitStage::Commit, repo_dir, e))?;
    let tree = repo
        .find_tree(tree_id)
        .map_err(|e| git_err(GitStage::Commit, repo_dir, e))?;
    let signature = repo
        .signature()
        .map_err(|e| git_err(GitStage::Commit, repo_dir, e))?;
    let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .map_err(|e| git_err(GitStage::Commit, repo_dir, e))?;

    let head = repo
        .head()
        .map_err(|e| git_err(GitStage::Push, repo_dir, e))?;
    let branch = head.shorthand().unwrap_or("master");
    let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
    let mut remote = repo
        .find_remote(remote_name)
        .map_err(|e| git_err(GitStage::Push, repo_dir, e))?;
    remote
        .push(&[refspec.as_str()], None)
        .map_err(|e| git_err(GitStage::Push, repo_dir, e))?;
    debug!(remote = remote_name, branch, "history pushed");

    Ok(())
}
