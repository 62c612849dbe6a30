//! Side-effecting collaborators bound to the installation engine.

#[path = "actions_download.rs"]
mod actions_download;
#[path = "actions_install.rs"]
mod actions_install;
#[path = "actions_process.rs"]
mod actions_process;

pub use actions_download::{http_client, HttpVersionProbe};
pub use actions_install::SystemCapabilities;
pub use actions_process::{privileged_ops, prime_sudo, LogSink};

pub(super) use actions_download::download_artifact;
pub(super) use actions_process::run_command;
