//! Process-level guards checked before the service starts accepting traffic.

use std::fs;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use anyhow::{Context, bail};
use log::{info, warn};

const WRITE_CHECK_FILE: &str = ".write-check";

/// Effective owner of the running process, read from `/proc/self`.
pub fn current_uid() -> anyhow::Result<u32> {
    let meta = fs::metadata("/proc/self").context("Failed to stat /proc/self")?;
    Ok(meta.uid())
}

/// Refuses to run as uid 0 unless explicitly allowed.
pub fn ensure_not_root(allow_root: bool) -> anyhow::Result<()> {
    let uid = match current_uid() {
        Ok(uid) => uid,
        Err(e) => {
            warn!("Could not determine process uid, skipping root check: {e:#}");
            return Ok(());
        }
    };
    check_uid(uid, allow_root)
}

fn check_uid(uid: u32, allow_root: bool) -> anyhow::Result<()> {
    if uid != 0 {
        return Ok(());
    }
    if allow_root {
        warn!("Running as root because ALLOW_ROOT is set");
        return Ok(());
    }
    bail!("Refusing to run as root; start the service as an unprivileged user or set ALLOW_ROOT=true")
}

/// Creates the private scratch directory and confirms it is writable.
pub fn prepare_scratch_dir(path: &Path) -> anyhow::Result<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create scratch dir {}", path.display()))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))
        .with_context(|| format!("Failed to restrict permissions on {}", path.display()))?;

    let marker = path.join(WRITE_CHECK_FILE);
    fs::write(&marker, b"ok")
        .with_context(|| format!("Scratch dir {} is not writable", path.display()))?;
    fs::remove_file(&marker)
        .with_context(|| format!("Failed to clean up {}", marker.display()))?;

    info!("Scratch dir ready at {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_rejected_unless_allowed() {
        assert!(check_uid(0, false).is_err());
        check_uid(0, true).expect("root allowed by flag");
        check_uid(10001, false).expect("unprivileged uid accepted");
    }

    #[test]
    fn scratch_dir_is_created_private_and_empty() {
        let base = tempfile::tempdir().unwrap();
        let dir = base.path().join("nested").join("tmp");

        prepare_scratch_dir(&dir).unwrap();

        let meta = fs::metadata(&dir).unwrap();
        assert!(meta.is_dir());
        assert_eq!(meta.permissions().mode() & 0o777, 0o700);
        assert!(!dir.join(WRITE_CHECK_FILE).exists());
    }

    #[test]
    fn scratch_dir_on_a_file_fails() {
        let base = tempfile::tempdir().unwrap();
        let file = base.path().join("occupied");
        fs::write(&file, b"x").unwrap();

        assert!(prepare_scratch_dir(&file).is_err());
    }
}
