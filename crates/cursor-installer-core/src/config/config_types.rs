//! Configuration types and defaults for the installer.
//!
//! Every URL and path the installer touches is listed here so tests and
//! alternate targets can override them without code changes.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from config.toml.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallerConfig {
    pub general: GeneralConfig,
    pub source: SourceConfig,
    pub install: InstallConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Artifact download endpoint; redirects are followed.
    pub download_url: String,
    /// Response header carrying the remote version, when the server sends one.
    pub version_header: String,
    /// Filename prefix stripped from `Content-Disposition` to recover the version.
    pub artifact_prefix: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            download_url: "https://downloader.cursor.sh/linux/appImage/x64".to_string(),
            version_header: "X-Version".to_string(),
            artifact_prefix: "cursor-".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivilegeMode {
    /// Run filesystem mutations outside $HOME through `sudo -n`.
    #[default]
    Sudo,
    /// Mutate directly; install_dir and targets must be writable.
    None,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct InstallConfig {
    pub app_name: String,
    pub install_dir: PathBuf,
    pub artifact_name: String,
    pub icon_name: String,
    /// Icon location inside the extracted AppImage.
    pub icon_source: String,
    pub desktop_entry_path: PathBuf,
    pub symlink_path: PathBuf,
    pub categories: String,
    /// Where the artifact lands before install; unset means the working directory.
    pub download_dir: Option<PathBuf>,
    pub privilege: PrivilegeMode,
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            app_name: "Cursor".to_string(),
            install_dir: PathBuf::from("/opt/cursor"),
            artifact_name: "Cursor.AppImage".to_string(),
            icon_name: "cursor.png".to_string(),
            icon_source: "usr/share/icons/hicolor/512x512/apps/cursor.png".to_string(),
            desktop_entry_path: PathBuf::from("/usr/share/applications/cursor.desktop"),
            symlink_path: PathBuf::from("/usr/local/bin/cursor"),
            categories: "Development;".to_string(),
            download_dir: None,
            privilege: PrivilegeMode::Sudo,
        }
    }
}

impl InstallConfig {
    /// Installed artifact location.
    pub fn artifact_path(&self) -> PathBuf {
        self.install_dir.join(&self.artifact_name)
    }

    pub fn icon_path(&self) -> PathBuf {
        self.install_dir.join(&self.icon_name)
    }

    /// The metadata record sits next to the installed artifact.
    pub fn metadata_path(&self) -> PathBuf {
        self.install_dir.join("metadata.json")
    }
}
