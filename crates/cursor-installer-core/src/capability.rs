//! Side-effecting collaborators invoked by the step dispatcher.
//!
//! Each method is one blocking operation with no branching of its own.

use std::path::PathBuf;

use crate::error::InstallError;
use crate::metadata::InstallMetadata;

/// A freshly downloaded artifact waiting to be installed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DownloadedArtifact {
    pub path: PathBuf,
    /// Version parsed from the download response, when the server named it.
    pub version: Option<String>,
}

pub trait Capabilities {
    fn download(&mut self) -> Result<DownloadedArtifact, InstallError>;
    fn make_executable(&mut self, artifact: &DownloadedArtifact) -> Result<(), InstallError>;
    /// Remove a download that turned out to be unnecessary.
    fn discard_download(&mut self, artifact: &DownloadedArtifact) -> Result<(), InstallError>;
    fn move_to_install_location(&mut self, artifact: &DownloadedArtifact)
        -> Result<(), InstallError>;
    fn extract_icon(&mut self) -> Result<(), InstallError>;
    fn write_desktop_entry(&mut self) -> Result<(), InstallError>;
    fn create_symlink(&mut self) -> Result<(), InstallError>;
    fn persist_metadata(&mut self, metadata: &InstallMetadata) -> Result<(), InstallError>;

    /// Progress note for the presenter's log pane.
    fn note(&mut self, _line: String) {}
}
