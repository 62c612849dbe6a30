//! HTTP access to the download server.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use cursor_installer_core::{
    version_from_content_disposition, DownloadedArtifact, InstallError, RemoteVersion,
    SourceConfig, VersionProbe, INSTALLER_VERSION,
};
use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};
use tracing::{debug, info};

use crate::paths::format_with_home;

use super::LogSink;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

pub fn http_client() -> Result<Client, InstallError> {
    Client::builder()
        .user_agent(format!("cursor-installer/{INSTALLER_VERSION}"))
        .connect_timeout(CONNECT_TIMEOUT)
        // Artifacts are a few hundred MiB; only the connect phase is bounded.
        .timeout(Option::<Duration>::None)
        .build()
        .map_err(network)
}

fn network(err: reqwest::Error) -> InstallError {
    InstallError::Network(err.to_string())
}

/// Resolves the served version with a HEAD request against the download URL.
pub struct HttpVersionProbe {
    client: Client,
    source: SourceConfig,
}

impl HttpVersionProbe {
    pub fn new(client: Client, source: SourceConfig) -> Self {
        Self { client, source }
    }
}

impl VersionProbe for HttpVersionProbe {
    fn latest_version(&self) -> Result<RemoteVersion, InstallError> {
        let response = self
            .client
            .head(&self.source.download_url)
            .send()
            .and_then(Response::error_for_status)
            .map_err(network)?;
        let version = remote_version(response.headers(), &self.source);
        debug!(?version, url = %response.url(), "probed remote version");
        Ok(version)
    }
}

/// Version named by the response: explicit header first, then the attachment filename.
pub fn remote_version(headers: &HeaderMap, source: &SourceConfig) -> RemoteVersion {
    let from_header = headers
        .get(source.version_header.as_str())
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if let Some(version) = from_header {
        return RemoteVersion::Known(version.to_string());
    }

    headers
        .get(CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| version_from_content_disposition(value, &source.artifact_prefix))
        .map_or(RemoteVersion::Unknown, RemoteVersion::Known)
}

/// Stream the artifact to `<target>.part`, then rename it into place.
pub fn download_artifact(
    client: &Client,
    source: &SourceConfig,
    target: &Path,
    log: &LogSink,
) -> Result<DownloadedArtifact, InstallError> {
    log.line(format!("Downloading {}", source.download_url));
    let mut response = client
        .get(&source.download_url)
        .send()
        .and_then(Response::error_for_status)
        .map_err(network)?;

    let version = match remote_version(response.headers(), source) {
        RemoteVersion::Known(version) => Some(version),
        RemoteVersion::Unknown => None,
    };

    let partial = partial_path(target);
    let written = write_body(&mut response, &partial).and_then(|bytes| {
        fs::rename(&partial, target)
            .map_err(|err| InstallError::io_at("move download to", target, err))?;
        Ok(bytes)
    });
    let bytes = match written {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = fs::remove_file(&partial);
            return Err(err);
        }
    };

    info!(bytes, path = %target.display(), ?version, "download complete");
    log.line(format!(
        "Downloaded {} to {}",
        format_size(bytes),
        format_with_home(target)
    ));
    if let Some(version) = &version {
        log.line(format!("Server reports version {version}"));
    }

    Ok(DownloadedArtifact {
        path: target.to_path_buf(),
        version,
    })
}

fn write_body(response: &mut Response, partial: &Path) -> Result<u64, InstallError> {
    let mut file =
        File::create(partial).map_err(|err| InstallError::io_at("create", partial, err))?;
    response.copy_to(&mut file).map_err(network)
}

fn partial_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

fn format_size(bytes: u64) -> String {
    const MIB: f64 = 1024.0 * 1024.0;
    format!("{:.1} MiB", bytes as f64 / MIB)
}
