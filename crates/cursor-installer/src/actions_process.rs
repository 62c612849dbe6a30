//! Subprocess execution, log streaming, and sudo-backed filesystem ops.

use std::collections::VecDeque;
use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use cursor_installer_core::util::log_snippet;
use cursor_installer_core::{
    program_in_path, InstallConfig, InstallError, LocalOps, PrivilegeMode, PrivilegedOps,
};
use tracing::{debug, info};

use crate::events::{UiMessage, WorkerEvent};

// Lines of stderr kept for the error message of a failed command.
const STDERR_TAIL: usize = 4;

const SUDO_AUTH_MARKERS: [&str; 5] = [
    "a password is required",
    "a terminal is required",
    "no tty present",
    "is not in the sudoers file",
    "incorrect password",
];

/// Forwards progress lines to whichever presenter owns the channel.
#[derive(Clone)]
pub struct LogSink {
    tx: Sender<UiMessage>,
}

impl LogSink {
    pub fn new(tx: Sender<UiMessage>) -> Self {
        Self { tx }
    }

    pub fn line(&self, line: impl AsRef<str>) {
        let _ = self
            .tx
            .send(UiMessage::Worker(WorkerEvent::LogLine(log_snippet(
                line.as_ref(),
            ))));
    }
}

pub fn run_command(
    log: &LogSink,
    label: &str,
    mut command: Command,
    cwd: Option<&Path>,
) -> Result<(), InstallError> {
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    debug!(command = label, "running command");
    log.line(format!("$ {label}"));

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| InstallError::Command {
            label: label.to_string(),
            detail: format!("failed to start: {err}"),
        })?;

    let stdout_handle = child.stdout.take().map(|stream| {
        let log = log.clone();
        thread::spawn(move || read_stream(stream, &log))
    });
    let stderr_handle = child.stderr.take().map(|stream| {
        let log = log.clone();
        thread::spawn(move || read_stream(stream, &log))
    });

    let status = child.wait().map_err(|err| InstallError::Command {
        label: label.to_string(),
        detail: format!("failed to wait: {err}"),
    })?;

    if let Some(handle) = stdout_handle {
        let _ = handle.join();
    }
    let stderr_tail = stderr_handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if status.success() {
        Ok(())
    } else {
        Err(classify_failure(label, &stderr_tail))
    }
}

fn read_stream(stream: impl Read, log: &LogSink) -> Vec<String> {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);
    for line in BufReader::new(stream).lines().map_while(Result::ok) {
        let line = line.replace('\r', "");
        if line.trim().is_empty() {
            continue;
        }
        log.line(&line);
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into()
}

fn classify_failure(label: &str, stderr_tail: &[String]) -> InstallError {
    let detail = stderr_tail.join("; ");
    let auth_failure = label.starts_with("sudo")
        && SUDO_AUTH_MARKERS
            .iter()
            .any(|marker| detail.contains(marker));
    if auth_failure || detail.contains("Permission denied") {
        return InstallError::permission(format!("{label}: {detail}"));
    }
    InstallError::Command {
        label: label.to_string(),
        detail,
    }
}

/// Runs each mutation as `sudo -n <command>`; credentials must already be cached.
pub struct SudoOps {
    log: LogSink,
}

impl SudoOps {
    pub fn new(log: LogSink) -> Self {
        Self { log }
    }

    fn sudo(&self, program: &str, args: &[&OsStr]) -> Result<(), InstallError> {
        let mut command = Command::new("sudo");
        command.arg("-n").arg(program).args(args);
        let rendered = args
            .iter()
            .map(|arg| arg.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ");
        let label = format!("sudo -n {program} {rendered}");
        run_command(&self.log, &label, command, None)
    }
}

impl PrivilegedOps for SudoOps {
    fn create_dir_all(&self, path: &Path) -> Result<(), InstallError> {
        self.sudo("mkdir", &[OsStr::new("-p"), path.as_os_str()])
    }

    fn set_mode(&self, path: &Path, mode: u32) -> Result<(), InstallError> {
        let mode = format!("{mode:o}");
        self.sudo("chmod", &[OsStr::new(&mode), path.as_os_str()])
    }

    fn move_file(&self, from: &Path, to: &Path) -> Result<(), InstallError> {
        self.sudo("mv", &[OsStr::new("-f"), from.as_os_str(), to.as_os_str()])
    }

    fn copy_file(&self, from: &Path, to: &Path) -> Result<(), InstallError> {
        self.sudo("cp", &[OsStr::new("-f"), from.as_os_str(), to.as_os_str()])
    }

    fn symlink(&self, target: &Path, link: &Path) -> Result<(), InstallError> {
        self.sudo("ln", &[OsStr::new("-sf"), target.as_os_str(), link.as_os_str()])
    }
}

fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

/// Whether mutations outside the user's files go through sudo.
pub fn uses_sudo(install: &InstallConfig) -> bool {
    install.privilege == PrivilegeMode::Sudo && !running_as_root()
}

pub fn privileged_ops(install: &InstallConfig, log: &LogSink) -> Arc<dyn PrivilegedOps> {
    if uses_sudo(install) {
        Arc::new(SudoOps::new(log.clone()))
    } else {
        debug!("privileged operations run directly");
        Arc::new(LocalOps)
    }
}

/// Cache sudo credentials while the terminal can still prompt.
pub fn prime_sudo(install: &InstallConfig) -> Result<()> {
    if !uses_sudo(install) {
        return Ok(());
    }
    if !program_in_path("sudo") {
        return Err(anyhow!(
            "sudo is not installed; set install.privilege = \"none\" and use a writable install_dir"
        ));
    }
    info!("requesting sudo credentials");
    let status = Command::new("sudo")
        .arg("-v")
        .status()
        .context("failed to run sudo -v")?;
    if !status.success() {
        return Err(InstallError::permission("sudo -v did not authenticate").into());
    }
    Ok(())
}
