//! Daemon configuration.
//!
//! Settings come from an optional TOML file and every field has a
//! default, so a missing file is not an error. The backup plan itself
//! (which file, which medium, which remote) always comes from the
//! command line and is validated once at startup.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ArgsError;

/// Default location of the settings file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/passbak/config.toml";

/// Environment variable overriding [`SYSTEM_CONFIG_PATH`].
pub const CONFIG_PATH_ENV: &str = "PASSBAK_CONFIG";

fn default_redisplay_interval_ms() -> u64 {
    4500
}

fn default_expiry_ms() -> u64 {
    6000
}

fn default_commit_message() -> String {
    "Update to db".to_string()
}

/// Tuning for the mount reminder loop.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NagSettings {
    /// How often the reminder is re-displayed while the medium is absent.
    #[serde(default = "default_redisplay_interval_ms")]
    pub redisplay_interval_ms: u64,

    /// Expiry handed to the notification server for each display. Must
    /// stay above the re-display interval or the reminder flickers.
    #[serde(default = "default_expiry_ms")]
    pub expiry_ms: u64,

    /// Give up and fail after this long without the medium, if set.
    /// Unset means the reminder repeats until the medium appears.
    #[serde(default)]
    pub give_up_after_secs: Option<u64>,
}

impl Default for NagSettings {
    fn default() -> Self {
        Self {
            redisplay_interval_ms: default_redisplay_interval_ms(),
            expiry_ms: default_expiry_ms(),
            give_up_after_secs: None,
        }
    }
}

/// Tuning for the backup step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BackupSettings {
    /// Commit message used when recording history.
    #[serde(default = "default_commit_message")]
    pub commit_message: String,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            commit_message: default_commit_message(),
        }
    }
}

/// Root of the settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub nag: NagSettings,
    pub backup: BackupSettings,
}

impl Settings {
    /// Loads settings from [`CONFIG_PATH_ENV`] or the system path.
    ///
    /// An explicitly configured path must exist. The system path is
    /// optional and falls back to the defaults when absent.
    pub fn load() -> Result<Self, ArgsError> {
        if let Some(raw) = env::var_os(CONFIG_PATH_ENV) {
            return Self::load_from(Path::new(&raw));
        }
        let system = Path::new(SYSTEM_CONFIG_PATH);
        if !system.exists() {
            return Ok(Self::default());
        }
        Self::load_from(system)
    }

    pub fn load_from(path: &Path) -> Result<Self, ArgsError> {
        let raw = fs::read_to_string(path).map_err(|source| ArgsError::SettingsRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ArgsError::SettingsParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// What to back up and where, validated and resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    /// Absolute path of the database file being guarded.
    pub database: PathBuf,
    /// Mountpoint the backup medium is expected at.
    pub mountpoint: PathBuf,
    /// Git remote to push history to, if any.
    pub git_remote: Option<String>,
}

impl BackupPlan {
    /// Validates the raw paths and absolutizes the database path.
    ///
    /// The database must be an existing regular file (watching a
    /// directory would fire on unrelated activity) and the mountpoint
    /// must at least exist as a path, mounted or not.
    pub fn resolve(
        database: PathBuf,
        mountpoint: PathBuf,
        git_remote: Option<String>,
    ) -> Result<Self, ArgsError> {
        if !database.is_file() {
            return Err(ArgsError::InvalidDatabase { path: database });
        }
        let database = match std::path::absolute(&database) {
            Ok(resolved) => resolved,
            Err(source) => {
                return Err(ArgsError::Resolve {
                    path: database,
                    source,
                })
            }
        };
        if !mountpoint.exists() {
            return Err(ArgsError::InvalidMountpoint { path: mountpoint });
        }
        Ok(Self {
            database,
            mountpoint,
            git_remote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs::File;

    use tempfile::tempdir;

    #[test]
    fn empty_settings_file_yields_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.nag.redisplay_interval_ms, 4500);
        assert_eq!(settings.nag.expiry_ms, 6000);
        assert_eq!(settings.nag.give_up_after_secs, None);
        assert_eq!(settings.backup.commit_message, "Update to db");
    }

    #[test]
    fn parses_full_settings_file() {
        let raw = r#"
            [nag]
            redisplay_interval_ms = 2000
            expiry_ms = 3000
            give_up_after_secs = 600

            [backup]
            commit_message = "db snapshot"
        "#;
        let settings: Settings = toml::from_str(raw).unwrap();
        assert_eq!(settings.nag.redisplay_interval_ms, 2000);
        assert_eq!(settings.nag.expiry_ms, 3000);
        assert_eq!(settings.nag.give_up_after_secs, Some(600));
        assert_eq!(settings.backup.commit_message, "db snapshot");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let raw = "[nag]\nredisplay_interval_ms = 1000\n";
        let settings: Settings = toml::from_str(raw).unwrap();
        assert_eq!(settings.nag.redisplay_interval_ms, 1000);
        assert_eq!(settings.nag.expiry_ms, 6000);
        assert_eq!(settings.backup.commit_message, "Update to db");
    }

    #[test]
    fn load_from_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = Settings::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ArgsError::SettingsRead { .. }));
    }

    #[test]
    fn load_from_malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[nag\nbroken").unwrap();
        let err = Settings::load_from(&path).unwrap_err();
        assert!(matches!(err, ArgsError::SettingsParse { .. }));
    }

    #[test]
    fn settings_errors_are_told_apart_from_argument_errors() {
        let dir = tempdir().unwrap();

        let read = Settings::load_from(&dir.path().join("nope.toml")).unwrap_err();
        assert!(read.is_settings());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[nag\nbroken").unwrap();
        let parse = Settings::load_from(&path).unwrap_err();
        assert!(parse.is_settings());

        let bad_db = BackupPlan::resolve(
            dir.path().join("absent.kdbx"),
            dir.path().to_path_buf(),
            None,
        )
        .unwrap_err();
        assert!(!bad_db.is_settings());

        let db = dir.path().join("db.kdbx");
        File::create(&db).unwrap();
        let bad_mount = BackupPlan::resolve(db, dir.path().join("no-mount"), None).unwrap_err();
        assert!(!bad_mount.is_settings());
    }

    #[test]
    fn resolve_rejects_missing_database() {
        let dir = tempdir().unwrap();
        let err = BackupPlan::resolve(
            dir.path().join("absent.kdbx"),
            dir.path().to_path_buf(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, ArgsError::InvalidDatabase { .. }));
    }

    #[test]
    fn resolve_rejects_directory_as_database() {
        let dir = tempdir().unwrap();
        let err = BackupPlan::resolve(dir.path().to_path_buf(), dir.path().to_path_buf(), None)
            .unwrap_err();
        assert!(matches!(err, ArgsError::InvalidDatabase { .. }));
    }

    #[test]
    fn resolve_rejects_missing_mountpoint() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db.kdbx");
        File::create(&db).unwrap();
        let err = BackupPlan::resolve(db, dir.path().join("no-mount"), None).unwrap_err();
        assert!(matches!(err, ArgsError::InvalidMountpoint { .. }));
    }

    #[test]
    fn resolve_accepts_valid_plan_and_absolutizes() {
        let dir = tempdir().unwrap();
        let db = dir.path().join("db.kdbx");
        File::create(&db).unwrap();
        let plan = BackupPlan::resolve(
            db.clone(),
            dir.path().to_path_buf(),
            Some("origin".to_string()),
        )
        .unwrap();
        assert!(plan.database.is_absolute());
        assert_eq!(plan.database, db);
        assert_eq!(plan.mountpoint, dir.path());
        assert_eq!(plan.git_remote.as_deref(), Some("origin"));
    }
}
