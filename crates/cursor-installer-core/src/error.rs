//! Error taxonomy for installation runs.
//!
//! Payloads are rendered strings so errors can be cloned into pipeline state
//! and shipped across the worker channel unchanged.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Guidance appended to permission failures.
pub const PERMISSION_HINT: &str =
    "re-run from a terminal where sudo can prompt, or set install.privilege = \"none\" for a user-writable install_dir";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    #[error("network error: {0}")]
    Network(String),
    #[error("permission denied: {detail} ({hint})")]
    Permission { detail: String, hint: &'static str },
    #[error("{0} is already installed without metadata (legacy). Use --force to reinstall")]
    ConflictingInstall(String),
    #[error("installation metadata is corrupt: {0}")]
    Corruption(String),
    #[error("{context}: {detail}")]
    Io { context: String, detail: String },
    #[error("command failed: {label}{}", format_detail(.detail))]
    Command { label: String, detail: String },
    #[error("no downloaded artifact available for {0}")]
    MissingArtifact(&'static str),
    #[error("cannot compare versions: {0}")]
    VersionUnknown(String),
    #[error("installation state changed since planning ({0}); re-run the installer")]
    StateChanged(String),
}

impl InstallError {
    pub fn permission(detail: impl Into<String>) -> Self {
        Self::Permission {
            detail: detail.into(),
            hint: PERMISSION_HINT,
        }
    }

    /// Wrap an I/O error, promoting `PermissionDenied` to the permission class.
    pub fn io(context: impl Into<String>, err: io::Error) -> Self {
        let context = context.into();
        if err.kind() == io::ErrorKind::PermissionDenied {
            return Self::permission(format!("{context}: {err}"));
        }
        Self::Io {
            context,
            detail: err.to_string(),
        }
    }

    pub fn io_at(action: &str, path: &Path, err: io::Error) -> Self {
        Self::io(format!("failed to {action} {}", path.display()), err)
    }

    pub fn is_permission(&self) -> bool {
        matches!(self, Self::Permission { .. })
    }
}

fn format_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(" ({detail})")
    }
}
