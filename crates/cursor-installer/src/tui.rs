//! Interactive progress screen driven by worker and input events.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use cursor_installer_core::{CancelFlag, PipelineState};

use crate::app::App;
use crate::events::UiMessage;
use crate::terminal::TerminalGuard;
use crate::ui;

const TICK: Duration = Duration::from_millis(250);

pub(super) fn run(
    app: &mut App,
    ui_tx: &Sender<UiMessage>,
    ui_rx: &Receiver<UiMessage>,
    cancel: &CancelFlag,
    worker: &JoinHandle<PipelineState>,
) -> Result<()> {
    let mut terminal_guard = TerminalGuard::new()?;
    spawn_input_thread(ui_tx.clone());
    let result = event_loop(&mut terminal_guard, app, ui_rx, cancel, worker);
    terminal_guard.restore()?;
    result
}

fn event_loop(
    terminal_guard: &mut TerminalGuard,
    app: &mut App,
    ui_rx: &Receiver<UiMessage>,
    cancel: &CancelFlag,
    worker: &JoinHandle<PipelineState>,
) -> Result<()> {
    loop {
        terminal_guard
            .terminal_mut()
            .draw(|frame| ui::draw(frame, app))?;

        match ui_rx.recv_timeout(TICK) {
            Ok(UiMessage::Input(input)) => {
                if handle_event(app, cancel, input) {
                    return Ok(());
                }
            }
            Ok(UiMessage::Worker(event)) => app.apply(event),
            Err(RecvTimeoutError::Timeout) => {
                // Channel is drained; a finished worker without a verdict panicked.
                if app.is_running() && worker.is_finished() {
                    app.worker_stopped();
                }
            }
            Err(RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

/// Returns true when the screen should close.
fn handle_event(app: &mut App, cancel: &CancelFlag, event: Event) -> bool {
    let Event::Key(key) = event else {
        return false;
    };
    if key.kind != KeyEventKind::Press {
        return false;
    }

    let ctrl_c = key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL);
    if app.is_running() {
        if ctrl_c || key.code == KeyCode::Esc {
            cancel.cancel();
            app.request_cancel();
        }
        return false;
    }

    ctrl_c
        || matches!(
            key.code,
            KeyCode::Enter | KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q')
        )
}

fn spawn_input_thread(ui_tx: Sender<UiMessage>) {
    // Forward blocking terminal events to the UI thread; exit on channel close.
    thread::spawn(move || {
        while let Ok(event) = event::read() {
            if ui_tx.send(UiMessage::Input(event)).is_err() {
                break;
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ProgressState;
    use crossterm::event::KeyEvent;
    use cursor_installer_core::{plan, PlanFlags, ReconciliationResult};

    fn app() -> App {
        App::new(
            "Install Cursor",
            &plan(PlanFlags::default(), &ReconciliationResult::NotInstalled),
        )
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn ctrl_c_while_running_requests_cancellation() {
        let mut app = app();
        let cancel = CancelFlag::new();

        let close = handle_event(
            &mut app,
            &cancel,
            key(KeyCode::Char('c'), KeyModifiers::CONTROL),
        );

        assert!(!close);
        assert!(cancel.is_cancelled());
        assert!(app.cancel_requested);
    }

    #[test]
    fn enter_closes_only_after_a_terminal_state() {
        let mut app = app();
        let cancel = CancelFlag::new();
        assert!(!handle_event(&mut app, &cancel, key(KeyCode::Enter, KeyModifiers::NONE)));

        app.progress_state = ProgressState::Completed;
        assert!(handle_event(&mut app, &cancel, key(KeyCode::Enter, KeyModifiers::NONE)));
        assert!(!cancel.is_cancelled());
    }
}
