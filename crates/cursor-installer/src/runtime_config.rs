//! Configuration loading and tracing setup for the installer binary.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use cursor_installer_core::InstallerConfig;
use tracing_subscriber::EnvFilter;

/// Where tracing output goes for the chosen presenter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum LogTarget {
    Stderr,
    // The TUI owns the terminal, so records go to the state directory instead.
    StateFile,
}

pub(super) fn load_config(path: Option<&Path>) -> Result<InstallerConfig> {
    match path {
        Some(path) => InstallerConfig::load_from_path(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => InstallerConfig::load_default().context("failed to load config"),
    }
}

/// Install the global subscriber; returns the log file path when logging to a file.
pub(super) fn init_tracing(config: &InstallerConfig, target: LogTarget) -> Result<Option<PathBuf>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .general
                .log_level
                .clone()
                .unwrap_or_else(|| "info".to_string()),
        )
    });

    match target {
        LogTarget::Stderr => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
            Ok(None)
        }
        LogTarget::StateFile => {
            let dir = InstallerConfig::default_state_dir()?;
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            let path = dir.join("installer.log");
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
            Ok(Some(path))
        }
    }
}
