//! Concrete capabilities: download, install, and desktop integration.

use std::fs;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use cursor_installer_core::{
    Capabilities, DownloadedArtifact, InstallConfig, InstallError, InstallMetadata,
    MetadataStore, PrivilegedOps, SourceConfig,
};
use reqwest::blocking::Client;
use tempfile::TempDir;
use tracing::info;

use crate::paths::format_with_home;

use super::{download_artifact, run_command, LogSink};

const EXECUTABLE_MODE: u32 = 0o755;
const READABLE_MODE: u32 = 0o644;

pub struct SystemCapabilities {
    client: Client,
    source: SourceConfig,
    install: InstallConfig,
    download_dir: PathBuf,
    ops: Arc<dyn PrivilegedOps>,
    store: MetadataStore,
    log: LogSink,
}

impl SystemCapabilities {
    pub fn new(
        client: Client,
        source: SourceConfig,
        install: InstallConfig,
        download_dir: PathBuf,
        ops: Arc<dyn PrivilegedOps>,
        log: LogSink,
    ) -> Self {
        let store = MetadataStore::new(install.metadata_path(), ops.clone());
        Self {
            client,
            source,
            install,
            download_dir,
            ops,
            store,
            log,
        }
    }

    fn place_file(
        &self,
        scratch: &Path,
        destination: &Path,
        mode: u32,
    ) -> Result<(), InstallError> {
        if let Some(parent) = destination.parent() {
            self.ops.create_dir_all(parent)?;
        }
        self.ops.move_file(scratch, destination)?;
        self.ops.set_mode(destination, mode)
    }
}

impl Capabilities for SystemCapabilities {
    fn download(&mut self) -> Result<DownloadedArtifact, InstallError> {
        fs::create_dir_all(&self.download_dir)
            .map_err(|err| InstallError::io_at("create", &self.download_dir, err))?;
        let target = self.download_dir.join(&self.install.artifact_name);
        download_artifact(&self.client, &self.source, &target, &self.log)
    }

    fn make_executable(&mut self, artifact: &DownloadedArtifact) -> Result<(), InstallError> {
        // The download is owned by the invoking user.
        fs::set_permissions(&artifact.path, fs::Permissions::from_mode(EXECUTABLE_MODE))
            .map_err(|err| InstallError::io_at("set permissions on", &artifact.path, err))
    }

    fn discard_download(&mut self, artifact: &DownloadedArtifact) -> Result<(), InstallError> {
        fs::remove_file(&artifact.path)
            .map_err(|err| InstallError::io_at("remove", &artifact.path, err))?;
        self.log.line(format!(
            "Removed redundant download {}",
            format_with_home(&artifact.path)
        ));
        Ok(())
    }

    fn move_to_install_location(
        &mut self,
        artifact: &DownloadedArtifact,
    ) -> Result<(), InstallError> {
        let destination = self.install.artifact_path();
        self.ops.create_dir_all(&self.install.install_dir)?;
        self.ops.set_mode(&self.install.install_dir, EXECUTABLE_MODE)?;
        self.ops.move_file(&artifact.path, &destination)?;
        self.ops.set_mode(&destination, EXECUTABLE_MODE)?;
        info!(path = %destination.display(), "artifact installed");
        self.log.line(format!("Installed {}", format_with_home(&destination)));
        Ok(())
    }

    fn extract_icon(&mut self) -> Result<(), InstallError> {
        let artifact = self.install.artifact_path();
        let scratch = TempDir::new()
            .map_err(|err| InstallError::io("failed to create extraction directory", err))?;

        let mut command = Command::new(&artifact);
        command
            .arg("--appimage-extract")
            .arg(&self.install.icon_source);
        let label = format!(
            "{} --appimage-extract {}",
            artifact.display(),
            self.install.icon_source
        );
        run_command(&self.log, &label, command, Some(scratch.path()))?;

        let extracted = scratch
            .path()
            .join("squashfs-root")
            .join(&self.install.icon_source);
        if !extracted.exists() {
            return Err(InstallError::Io {
                context: "icon missing from extracted AppImage".to_string(),
                detail: self.install.icon_source.clone(),
            });
        }

        let icon = self.install.icon_path();
        self.ops.copy_file(&extracted, &icon)?;
        self.ops.set_mode(&icon, READABLE_MODE)?;
        self.log.line(format!("Icon saved to {}", icon.display()));
        Ok(())
    }

    fn write_desktop_entry(&mut self) -> Result<(), InstallError> {
        let contents = desktop_entry(&self.install);
        let mut scratch = tempfile::Builder::new()
            .prefix("cursor-desktop-")
            .suffix(".desktop")
            .tempfile()
            .map_err(|err| InstallError::io("failed to create desktop entry", err))?;
        scratch
            .write_all(contents.as_bytes())
            .map_err(|err| InstallError::io_at("write", scratch.path(), err))?;
        let scratch = scratch.into_temp_path();

        let destination = &self.install.desktop_entry_path;
        self.place_file(&scratch, destination, READABLE_MODE)?;
        self.log
            .line(format!("Desktop entry written to {}", destination.display()));
        Ok(())
    }

    fn create_symlink(&mut self) -> Result<(), InstallError> {
        let link = &self.install.symlink_path;
        if let Some(parent) = link.parent() {
            self.ops.create_dir_all(parent)?;
        }
        self.ops.symlink(&self.install.artifact_path(), link)?;
        self.log.line(format!(
            "Linked {} -> {}",
            link.display(),
            self.install.artifact_path().display()
        ));
        Ok(())
    }

    fn persist_metadata(&mut self, metadata: &InstallMetadata) -> Result<(), InstallError> {
        let written = self.store.write(metadata)?;
        self.log.line(format!(
            "Recorded version {} in {}",
            written.version,
            self.store.path().display()
        ));
        Ok(())
    }

    fn note(&mut self, line: String) {
        self.log.line(line);
    }
}

fn desktop_entry(install: &InstallConfig) -> String {
    [
        "[Desktop Entry]".to_string(),
        format!("Name={}", install.app_name),
        format!("Exec={}", install.artifact_path().display()),
        format!("Icon={}", install.icon_path().display()),
        "Type=Application".to_string(),
        format!("Categories={}", install.categories),
        String::new(),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursor_installer_core::LocalOps;
    use std::sync::mpsc;

    fn capabilities(root: &Path) -> SystemCapabilities {
        let install = InstallConfig {
            install_dir: root.join("opt"),
            desktop_entry_path: root.join("share").join("cursor.desktop"),
            symlink_path: root.join("bin").join("cursor"),
            ..InstallConfig::default()
        };
        let (tx, _rx) = mpsc::channel();
        SystemCapabilities::new(
            Client::new(),
            SourceConfig::default(),
            install,
            root.join("downloads"),
            Arc::new(LocalOps),
            LogSink::new(tx),
        )
    }

    #[test]
    fn desktop_entry_points_at_installed_files() {
        let entry = desktop_entry(&InstallConfig::default());
        assert_eq!(
            entry,
            "[Desktop Entry]\nName=Cursor\nExec=/opt/cursor/Cursor.AppImage\n\
             Icon=/opt/cursor/cursor.png\nType=Application\nCategories=Development;\n"
        );
    }

    #[test]
    fn install_moves_artifact_and_links_it() {
        let dir = TempDir::new().expect("tempdir");
        let mut caps = capabilities(dir.path());
        let download = dir.path().join("Cursor.AppImage");
        fs::write(&download, b"appimage").expect("write download");
        let artifact = DownloadedArtifact {
            path: download.clone(),
            version: Some("0.42.3".to_string()),
        };

        caps.make_executable(&artifact).expect("chmod");
        caps.move_to_install_location(&artifact).expect("install");
        caps.create_symlink().expect("symlink");
        caps.write_desktop_entry().expect("desktop entry");

        let installed = dir.path().join("opt").join("Cursor.AppImage");
        assert!(!download.exists());
        let mode = fs::metadata(&installed).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, EXECUTABLE_MODE);
        assert_eq!(
            fs::read_link(dir.path().join("bin").join("cursor")).expect("link"),
            installed
        );
        let entry = fs::read_to_string(dir.path().join("share").join("cursor.desktop"))
            .expect("desktop entry");
        assert!(entry.contains(&format!("Exec={}", installed.display())));
    }

    #[test]
    fn discard_removes_the_download() {
        let dir = TempDir::new().expect("tempdir");
        let mut caps = capabilities(dir.path());
        let download = dir.path().join("Cursor.AppImage");
        fs::write(&download, b"appimage").expect("write download");

        caps.discard_download(&DownloadedArtifact {
            path: download.clone(),
            version: None,
        })
        .expect("discard");

        assert!(!download.exists());
    }
}
