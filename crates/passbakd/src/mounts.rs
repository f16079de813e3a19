//! Mount checker - decides whether the backup medium is present.
//!
//! Reads the kernel mount table from /proc/self/mountinfo instead of
//! matching path prefixes: a directory below a mountpoint is not the
//! medium itself, and a stale directory left behind at the mountpoint
//! must not pass for one.

use std::fs;
use std::path::{Path, PathBuf};

use passbak_common::WatchdogError;

/// Kernel mount table of the current process.
pub const MOUNTINFO_PATH: &str = "/proc/self/mountinfo";

/// Source of the currently mounted mountpoints.
///
/// The daemon depends on this trait so tests can script mount state
/// instead of touching the real system.
pub trait MountSource {
    fn mount_points(&self) -> Result<Vec<PathBuf>, WatchdogError>;
}

/// Reads mountpoints from [`MOUNTINFO_PATH`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMounts;

impl ProcMounts {
    pub fn new() -> Self {
        Self
    }
}

impl MountSource for ProcMounts {
    fn mount_points(&self) -> Result<Vec<PathBuf>, WatchdogError> {
        let raw = fs::read_to_string(MOUNTINFO_PATH)
            .map_err(|source| WatchdogError::Mounts { source })?;
        parse_mountinfo(&raw)
    }
}

/// Parse mountinfo content into the list of mountpoints (field 5).
///
/// Expected format (one mount per line):
/// ```text
/// 26 29 0:5 / /proc rw,nosuid,nodev,noexec shared:13 - proc proc rw
/// 36 29 8:17 / /mnt/backup rw,relatime shared:110 - ext4 /dev/sdb1 rw
/// ```
///
/// Mountpoints with special characters are octal-escaped by the kernel
/// (`\040` for a space) and are unescaped here.
pub fn parse_mountinfo(raw: &str) -> Result<Vec<PathBuf>, WatchdogError> {
    let mut mounts = Vec::new();

    for (line_idx, line) in raw.lines().enumerate() {
        let line_num = line_idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 5 {
            return Err(WatchdogError::MountinfoParse { line: line_num });
        }
        mounts.push(PathBuf::from(unescape_mount_path(fields[4])));
    }

    Ok(mounts)
}

/// Undo the kernel's octal escaping of whitespace and backslashes.
fn unescape_mount_path(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escape = bytes[i] == b'\\'
            && i + 3 < bytes.len()
            && bytes[i + 1..=i + 3]
                .iter()
                .all(|b| (b'0'..=b'7').contains(b));
        if escape {
            let value = u16::from(bytes[i + 1] - b'0') * 64
                + u16::from(bytes[i + 2] - b'0') * 8
                + u16::from(bytes[i + 3] - b'0');
            out.push(value as u8);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// True when `candidate` names the same directory as any listed mount,
/// after resolving symlinks on both sides.
///
/// A candidate that does not exist (or cannot be resolved) is simply
/// not mounted. Listed mounts that cannot be resolved are skipped.
pub fn path_is_among(candidate: &Path, mounts: &[PathBuf]) -> bool {
    let resolved = match candidate.canonicalize() {
        Ok(resolved) => resolved,
        Err(_) => return false,
    };
    mounts
        .iter()
        .filter_map(|mount| mount.canonicalize().ok())
        .any(|mount| mount == resolved)
}

/// Checks whether `mountpoint` currently appears in the mount table.
pub fn is_mounted<M: MountSource>(source: &M, mountpoint: &Path) -> Result<bool, WatchdogError> {
    let mounts = source.mount_points()?;
    Ok(path_is_among(mountpoint, &mounts))
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;

    use tempfile::tempdir;

    const STANDARD: &str = "\
26 29 0:5 / /proc rw,nosuid,nodev,noexec,relatime shared:13 - proc proc rw
29 1 8:2 / / rw,relatime shared:1 - ext4 /dev/sda2 rw
36 29 8:17 / /mnt/backup rw,relatime shared:110 - ext4 /dev/sdb1 rw
";

    #[test]
    fn golden_parse_mountinfo_standard() {
        let mounts = parse_mountinfo(STANDARD).unwrap();
        assert_eq!(
            mounts,
            vec![
                PathBuf::from("/proc"),
                PathBuf::from("/"),
                PathBuf::from("/mnt/backup"),
            ]
        );
    }

    #[test]
    fn golden_parse_mountinfo_escaped_paths() {
        let raw = "40 29 8:33 / /mnt/usb\\040stick rw,relatime shared:120 - vfat /dev/sdc1 rw\n\
                   41 29 8:34 / /mnt/odd\\134name rw,relatime shared:121 - vfat /dev/sdc2 rw\n";
        let mounts = parse_mountinfo(raw).unwrap();
        assert_eq!(
            mounts,
            vec![
                PathBuf::from("/mnt/usb stick"),
                PathBuf::from("/mnt/odd\\name"),
            ]
        );
    }

    #[test]
    fn golden_parse_mountinfo_malformed_line() {
        let raw = "26 29 0:5 / /proc rw - proc proc rw\n12 34 0:6\n";
        let err = parse_mountinfo(raw).unwrap_err();
        assert!(matches!(err, WatchdogError::MountinfoParse { line: 2 }));
    }

    #[test]
    fn parse_mountinfo_skips_blank_lines() {
        let raw = "\n26 29 0:5 / /proc rw - proc proc rw\n\n";
        let mounts = parse_mountinfo(raw).unwrap();
        assert_eq!(mounts, vec![PathBuf::from("/proc")]);
    }

    #[test]
    fn unescapes_tab_and_newline() {
        assert_eq!(unescape_mount_path("a\\011b\\012c"), "a\tb\nc");
        assert_eq!(unescape_mount_path("plain"), "plain");
        // A trailing lone backslash stays as-is.
        assert_eq!(unescape_mount_path("odd\\"), "odd\\");
    }

    #[test]
    fn candidate_matching_a_mount_is_among() {
        let dir = tempdir().unwrap();
        let mounts = vec![dir.path().to_path_buf()];
        assert!(path_is_among(dir.path(), &mounts));
    }

    #[test]
    fn subdirectory_of_a_mount_is_not_among() {
        let dir = tempdir().unwrap();
        let sub = dir.path().join("below");
        std::fs::create_dir(&sub).unwrap();
        let mounts = vec![dir.path().to_path_buf()];
        assert!(!path_is_among(&sub, &mounts));
    }

    #[test]
    fn missing_candidate_is_not_among() {
        let dir = tempdir().unwrap();
        let mounts = vec![dir.path().to_path_buf()];
        assert!(!path_is_among(&dir.path().join("absent"), &mounts));
    }

    #[test]
    fn symlinked_candidate_resolves_to_its_mount() {
        let dir = tempdir().unwrap();
        let real = dir.path().join("media");
        std::fs::create_dir(&real).unwrap();
        let link = dir.path().join("backup-link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mounts = vec![real.clone()];
        assert!(path_is_among(&link, &mounts));

        let mounts_via_link = vec![link];
        assert!(path_is_among(&real, &mounts_via_link));
    }

    struct ScriptedMounts(Vec<PathBuf>);

    impl MountSource for ScriptedMounts {
        fn mount_points(&self) -> Result<Vec<PathBuf>, WatchdogError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenMounts;

    impl MountSource for BrokenMounts {
        fn mount_points(&self) -> Result<Vec<PathBuf>, WatchdogError> {
            Err(WatchdogError::Mounts {
                source: io::Error::other("no table"),
            })
        }
    }

    #[test]
    fn is_mounted_consults_the_source() {
        let dir = tempdir().unwrap();
        let mounted = ScriptedMounts(vec![dir.path().to_path_buf()]);
        assert!(is_mounted(&mounted, dir.path()).unwrap());

        let unmounted = ScriptedMounts(vec![PathBuf::from("/proc")]);
        assert!(!is_mounted(&unmounted, dir.path()).unwrap());
    }

    #[test]
    fn is_mounted_propagates_source_errors() {
        let dir = tempdir().unwrap();
        let err = is_mounted(&BrokenMounts, dir.path()).unwrap_err();
        assert!(matches!(err, WatchdogError::Mounts { .. }));
    }
}
