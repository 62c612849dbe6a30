//! Version reconciliation between the metadata record and the download server.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::InstallError;
use crate::metadata::MetadataStore;
use crate::INSTALLER_VERSION;

/// Label used when the server does not say which version it serves.
pub const UNKNOWN_REMOTE_VERSION: &str = "latest";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RemoteVersion {
    Known(String),
    /// The server exposed neither a version header nor a parseable filename.
    Unknown,
}

impl RemoteVersion {
    pub fn label(&self) -> &str {
        match self {
            RemoteVersion::Known(version) => version,
            RemoteVersion::Unknown => UNKNOWN_REMOTE_VERSION,
        }
    }
}

/// Lightweight remote lookup of the version currently served.
pub trait VersionProbe {
    fn latest_version(&self) -> Result<RemoteVersion, InstallError>;
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ReconciliationResult {
    NotInstalled,
    /// An artifact exists at the install location but no record was written.
    LegacyInstallNoMetadata,
    UpToDate(String),
    UpdateAvailable(String),
}

impl ReconciliationResult {
    pub fn is_up_to_date(&self) -> bool {
        matches!(self, ReconciliationResult::UpToDate(_))
    }

    pub fn has_existing_install(&self) -> bool {
        !matches!(self, ReconciliationResult::NotInstalled)
    }
}

/// Verdict of the pre-mutation installation check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum InstallCheck {
    Proceed(ReconciliationResult),
    UpToDate(String),
}

pub struct VersionReconciler<'a> {
    store: &'a MetadataStore,
    probe: &'a dyn VersionProbe,
    artifact_path: PathBuf,
}

impl<'a> VersionReconciler<'a> {
    pub fn new(
        store: &'a MetadataStore,
        probe: &'a dyn VersionProbe,
        artifact_path: PathBuf,
    ) -> Self {
        Self {
            store,
            probe,
            artifact_path,
        }
    }

    pub fn store(&self) -> &MetadataStore {
        self.store
    }

    pub fn probe(&self) -> &dyn VersionProbe {
        self.probe
    }

    pub fn classify(&self) -> Result<ReconciliationResult, InstallError> {
        let Some(metadata) = self.store.read()? else {
            let result = if artifact_exists(&self.artifact_path)? {
                ReconciliationResult::LegacyInstallNoMetadata
            } else {
                ReconciliationResult::NotInstalled
            };
            debug!(?result, "no installation metadata");
            return Ok(result);
        };

        let remote = self.probe.latest_version()?;
        let result = match remote {
            RemoteVersion::Known(latest) if latest == metadata.version => {
                ReconciliationResult::UpToDate(latest)
            }
            RemoteVersion::Known(latest) => ReconciliationResult::UpdateAvailable(latest),
            RemoteVersion::Unknown => {
                warn!(
                    installed = %metadata.version,
                    "download server did not report a version; assuming an update is available"
                );
                ReconciliationResult::UpdateAvailable(UNKNOWN_REMOTE_VERSION.to_string())
            }
        };
        debug!(?result, installed = %metadata.version, "reconciled installed version");
        Ok(result)
    }

    /// Re-validate state right before mutation begins.
    pub fn check(&self, force: bool) -> Result<InstallCheck, InstallError> {
        let classification = self.classify()?;
        match classification {
            ReconciliationResult::LegacyInstallNoMetadata if !force => Err(
                InstallError::ConflictingInstall(self.artifact_path.display().to_string()),
            ),
            ReconciliationResult::UpToDate(version) if !force => {
                Ok(InstallCheck::UpToDate(version))
            }
            other => Ok(InstallCheck::Proceed(other)),
        }
    }
}

fn artifact_exists(path: &Path) -> Result<bool, InstallError> {
    match fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(InstallError::io_at("check installation at", path, err)),
    }
}

/// Read-only summary for `--version`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionInfo {
    pub installed_version: Option<String>,
    pub installer_version: &'static str,
    pub is_installed: bool,
}

pub fn version_info(
    store: &MetadataStore,
    artifact_path: &Path,
) -> Result<VersionInfo, InstallError> {
    let mut info = VersionInfo {
        installed_version: None,
        installer_version: INSTALLER_VERSION,
        is_installed: false,
    };
    if !artifact_exists(artifact_path)? {
        return Ok(info);
    }
    info.is_installed = true;
    info.installed_version = store.read()?.map(|metadata| metadata.version);
    Ok(info)
}

/// Recover the version from a `Content-Disposition` filename such as
/// `attachment; filename="cursor-0.42.3x86_64.AppImage"`.
pub fn version_from_content_disposition(header: &str, prefix: &str) -> Option<String> {
    let (_, tail) = header.split_once("filename=")?;
    let filename = tail.split(';').next()?.trim().trim_matches('"');
    if filename.len() < prefix.len() || !filename.is_char_boundary(prefix.len()) {
        return None;
    }
    let (head, rest) = filename.split_at(prefix.len());
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let stem = rest.strip_suffix(".AppImage")?;
    let stem = stem.strip_suffix("x86_64").unwrap_or(stem);
    let version = stem.trim_end_matches(&['-', '_', '.'][..]);
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
