//! Line-oriented presenter for non-interactive runs.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::Duration;

use cursor_installer_core::{InstallationStep, PipelineEvent, PipelineState};

use crate::events::{UiMessage, WorkerEvent};

const TICK: Duration = Duration::from_millis(250);

pub(super) fn run(
    steps: &[InstallationStep],
    ui_rx: &Receiver<UiMessage>,
    worker: &JoinHandle<PipelineState>,
) {
    loop {
        match ui_rx.recv_timeout(TICK) {
            Ok(UiMessage::Worker(event)) => {
                if let Some(line) = render_event(steps, event) {
                    println!("{line}");
                }
            }
            Ok(UiMessage::Input(_)) => {}
            Err(RecvTimeoutError::Timeout) => {
                if worker.is_finished() {
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn render_event(steps: &[InstallationStep], event: WorkerEvent) -> Option<String> {
    let name = |index: usize| steps.get(index).map_or("?", |step| step.name);
    let line = match event {
        WorkerEvent::LogLine(line) => format!("    {line}"),
        WorkerEvent::Pipeline(PipelineEvent::StepStarted(index)) => {
            let description = steps.get(index).map_or("", |step| step.description);
            format!("[{}/{}] {}: {}", index + 1, steps.len(), name(index), description)
        }
        WorkerEvent::Pipeline(PipelineEvent::StepCompleted(index)) => {
            format!("[ok] {}", name(index))
        }
        WorkerEvent::Pipeline(PipelineEvent::Failed { index, error }) => {
            format!("[!!] {}: {}", name(index), error)
        }
        WorkerEvent::Pipeline(PipelineEvent::Cancelled { index }) => {
            format!("Cancelled before {}.", name(index))
        }
        // Terminal summaries are printed once the worker has been joined.
        WorkerEvent::Pipeline(PipelineEvent::UpToDate(_) | PipelineEvent::Done) => return None,
    };
    Some(line)
}
