//! Filesystem mutations that may need elevated privileges.
//!
//! The binary supplies a sudo-backed implementation; `LocalOps` performs the
//! same operations directly and backs user-writable installs and tests.

use std::fs;
use std::io;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::Path;

use crate::error::InstallError;

pub trait PrivilegedOps: Send + Sync {
    /// Create a directory and any missing parents.
    fn create_dir_all(&self, path: &Path) -> Result<(), InstallError>;
    /// Set the permission bits of a file or directory.
    fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError>;
    /// Move a file into place, replacing any existing destination.
    fn move_file(&self, from: &Path, to: &Path) -> Result<(), InstallError>;
    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), InstallError>;
    /// Point `link` at `target`, replacing an existing link.
    fn symlink(&self, target: &Path, link: &Path) -> Result<(), InstallError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LocalOps;

impl PrivilegedOps for LocalOps {
    fn create_dir_all(&self, path: &Path) -> Result<(), InstallError> {
        fs::create_dir_all(path).map_err(|err| InstallError::io_at("create", path, err))
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
            .map_err(|err| InstallError::io_at("set permissions on", path, err))
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), InstallError> {
        finish_move(from, to, fs::rename(from, to))
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), InstallError> {
        fs::copy(from, to)
            .map(|_| ())
            .map_err(|err| InstallError::io_at("copy to", to, err))
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<(), InstallError> {
        if link.symlink_metadata().is_ok() {
            fs::remove_file(link).map_err(|err| InstallError::io_at("replace", link, err))?;
        }
        symlink(target, link).map_err(|err| InstallError::io_at("create symlink", link, err))
    }
}

/// Settle a rename attempt; a rename across filesystems falls back to
/// copy + remove.
fn finish_move(from: &Path, to: &Path, renamed: io::Result<()>) -> Result<(), InstallError> {
    match renamed {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to).map_err(|err| InstallError::io_at("copy to", to, err))?;
            fs::remove_file(from).map_err(|err| InstallError::io_at("remove", from, err))
        }
        Err(err) => Err(InstallError::io_at("move into", to, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn symlink_replaces_existing_link() {
        let dir = TempDir::new().expect("tempdir");
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        let link = dir.path().join("link");
        fs::write(&first, b"1").expect("write first");
        fs::write(&second, b"2").expect("write second");

        LocalOps.symlink(&first, &link).expect("first link");
        LocalOps.symlink(&second, &link).expect("relink");

        assert_eq!(fs::read_link(&link).expect("read link"), second);
    }

    #[test]
    fn move_file_overwrites_destination() {
        let dir = TempDir::new().expect("tempdir");
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::write(&from, b"new").expect("write from");
        fs::write(&to, b"old").expect("write to");

        LocalOps.move_file(&from, &to).expect("move");

        assert!(!from.exists());
        assert_eq!(fs::read(&to).expect("read"), b"new");
    }

    #[test]
    fn cross_device_rename_falls_back_to_copy() {
        let dir = TempDir::new().expect("tempdir");
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::write(&from, b"payload").expect("write from");

        let renamed = Err(io::Error::from(io::ErrorKind::CrossesDevices));
        finish_move(&from, &to, renamed).expect("fallback");

        assert!(!from.exists());
        assert_eq!(fs::read(&to).expect("read"), b"payload");
    }

    #[test]
    fn other_rename_failures_are_reported() {
        let dir = TempDir::new().expect("tempdir");
        let from = dir.path().join("from");
        let to = dir.path().join("to");
        fs::write(&from, b"payload").expect("write from");

        let renamed = Err(io::Error::from(io::ErrorKind::NotFound));
        let err = finish_move(&from, &to, renamed).expect_err("must fail");

        assert!(matches!(err, InstallError::Io { .. }));
        assert!(from.exists());
        assert!(!to.exists());
    }
}
