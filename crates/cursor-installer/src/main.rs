//! Cursor installer entrypoint: plans the run, then hands it to a presenter.

mod actions;
mod app;
mod events;
mod model;
mod paths;
mod plain;
mod runtime_config;
mod shutdown_signal;
mod terminal;
mod tui;
mod ui;
mod version_view;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use cursor_installer_core::{
    plan, CancelFlag, InstallationStep, InstallerConfig, MetadataStore, PipelineState,
    PlanFlags, PrivilegedOps, ReconciliationResult, StepDispatcher, StepExecutor, Terminal,
    VersionReconciler,
};
use reqwest::blocking::Client;
use tracing::info;

use crate::actions::{
    http_client, prime_sudo, privileged_ops, HttpVersionProbe, LogSink, SystemCapabilities,
};
use crate::app::App;
use crate::events::{UiMessage, WorkerEvent};
use crate::paths::format_with_home;
use crate::runtime_config::LogTarget;

#[derive(Parser, Debug)]
#[command(
    name = "cursor-installer",
    about = "Install and update the Cursor AppImage",
    disable_version_flag = true
)]
struct Args {
    /// Download the AppImage without installing it
    #[arg(short = 'd', long)]
    download_only: bool,

    /// Reinstall even when the installed version is current
    #[arg(short, long)]
    force: bool,

    /// Show installed and installer versions
    #[arg(short = 'v', long)]
    version: bool,

    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print progress lines instead of the interactive screen
    #[arg(long)]
    plain: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = runtime_config::load_config(args.config.as_deref())?;

    if args.version {
        return version_view::print_versions(&config);
    }

    let interactive = !args.plain && io::stdout().is_terminal() && io::stdin().is_terminal();
    let log_target = if interactive {
        LogTarget::StateFile
    } else {
        LogTarget::Stderr
    };
    let log_file = runtime_config::init_tracing(&config, log_target)?;

    let flags = PlanFlags {
        force: args.force,
        download_only: args.download_only,
    };
    let (ui_tx, ui_rx) = mpsc::channel();
    let log = LogSink::new(ui_tx.clone());
    let client = http_client()?;
    let ops = privileged_ops(&config.install, &log);
    let probe = HttpVersionProbe::new(client.clone(), config.source.clone());
    let store = MetadataStore::new(config.install.metadata_path(), ops.clone());

    let classification = VersionReconciler::new(&store, &probe, config.install.artifact_path())
        .classify()
        .context("failed to inspect the existing installation")?;
    let steps = plan(flags, &classification);
    info!(?classification, ?flags, steps = steps.len(), "planned installation");

    if steps.iter().any(|step| step.kind.needs_privilege()) {
        prime_sudo(&config.install)?;
    }

    let download_dir = paths::download_dir(config.install.download_dir.as_deref());
    let cancel = CancelFlag::new();
    let outcome = Outcome {
        app_name: config.install.app_name.clone(),
        download_path: download_dir.join(&config.install.artifact_name),
        artifact_path: config.install.artifact_path(),
        symlink_path: config.install.symlink_path.clone(),
        download_only: flags.download_only,
    };

    let worker = spawn_worker(
        Job {
            steps: steps.clone(),
            planned: classification.clone(),
            flags,
            config,
            client,
            download_dir,
            ops,
            store,
            probe,
            log: log.clone(),
        },
        cancel.clone(),
        ui_tx.clone(),
    );

    if interactive {
        let mut app = App::new(title(flags, &classification, &outcome.app_name), &steps);
        tui::run(&mut app, &ui_tx, &ui_rx, &cancel, &worker)?;
    } else {
        shutdown_signal::cancel_on_signal(cancel.clone(), log);
        plain::run(&steps, &ui_rx, &worker);
    }

    let state = worker
        .join()
        .map_err(|_| anyhow!("installer worker panicked"))?;
    let failed_step = state
        .steps()
        .get(state.current_index())
        .map(|step| step.name);
    let result = outcome.report(state.terminal(), failed_step);
    if let (Err(_), Some(path)) = (&result, &log_file) {
        eprintln!("Details were logged to {}", format_with_home(path));
    }
    result
}

fn title(flags: PlanFlags, classification: &ReconciliationResult, app_name: &str) -> String {
    let action = if flags.download_only {
        "Download"
    } else if classification.has_existing_install() {
        "Update"
    } else {
        "Install"
    };
    format!("{action} {app_name}")
}

/// Everything the worker thread needs to execute a plan.
struct Job {
    steps: Vec<InstallationStep>,
    planned: ReconciliationResult,
    flags: PlanFlags,
    config: InstallerConfig,
    client: Client,
    download_dir: PathBuf,
    ops: Arc<dyn PrivilegedOps>,
    store: MetadataStore,
    probe: HttpVersionProbe,
    log: LogSink,
}

fn spawn_worker(
    job: Job,
    cancel: CancelFlag,
    ui_tx: Sender<UiMessage>,
) -> JoinHandle<PipelineState> {
    thread::spawn(move || {
        let Job {
            steps,
            planned,
            flags,
            config,
            client,
            download_dir,
            ops,
            store,
            probe,
            log,
        } = job;
        let install_path = config.install.artifact_path();
        let mut capabilities = SystemCapabilities::new(
            client,
            config.source,
            config.install,
            download_dir,
            ops,
            log,
        );
        let reconciler = VersionReconciler::new(&store, &probe, install_path.clone());
        let mut dispatcher =
            StepDispatcher::new(&mut capabilities, reconciler, planned, install_path, flags);

        let mut executor = StepExecutor::new(steps);
        executor.run(&mut dispatcher, &cancel, &mut |event| {
            let _ = ui_tx.send(UiMessage::Worker(WorkerEvent::Pipeline(event)));
        });
        executor.into_state()
    })
}

/// Final one-line summary printed after the presenter exits.
struct Outcome {
    app_name: String,
    download_path: PathBuf,
    artifact_path: PathBuf,
    symlink_path: PathBuf,
    download_only: bool,
}

impl Outcome {
    /// `step` names the step the run stopped on, if any.
    fn report(&self, terminal: &Terminal, step: Option<&str>) -> Result<()> {
        match terminal {
            Terminal::Done if self.download_only => {
                println!(
                    "{} downloaded to {}",
                    self.app_name,
                    format_with_home(&self.download_path)
                );
                Ok(())
            }
            Terminal::Done => {
                println!(
                    "{} installed to {}; launch it with {}",
                    self.app_name,
                    self.artifact_path.display(),
                    self.symlink_path.display()
                );
                Ok(())
            }
            Terminal::UpToDate(version) => {
                println!("{} {} is already up to date.", self.app_name, version);
                Ok(())
            }
            Terminal::Failed(err) => {
                let err = anyhow::Error::new(err.clone());
                Err(match step {
                    Some(name) => err.context(format!("step {name} failed")),
                    None => err,
                })
            }
            Terminal::Cancelled => Err(anyhow!("installation cancelled")),
            Terminal::Running => Err(anyhow!("installation stopped before finishing")),
        }
    }
}
