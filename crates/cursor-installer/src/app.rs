//! Presenter state for the installer TUI.

use cursor_installer_core::{InstallationStep, PipelineEvent};

use crate::events::WorkerEvent;
use crate::model::{steps_from_plan, ActionStep, StepStatus};

// Bound log memory usage by trimming old entries.
const MAX_LOG_LINES: usize = 200;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProgressState {
    // Worker is executing steps.
    Running,
    // Every planned step completed.
    Completed,
    // Installed version is current; nothing changed.
    UpToDate(String),
    // A step failed; see last_error.
    Failed,
    // Stopped at a step boundary after a cancel request.
    Cancelled,
}

pub struct App {
    // Header line, e.g. "Install Cursor".
    pub title: String,

    // Steps for the planned run.
    pub steps: Vec<ActionStep>,

    // Index of the step most recently started.
    pub current: Option<usize>,

    // Log lines for the log pane.
    pub logs: Vec<String>,

    pub progress_state: ProgressState,

    // Last error message for failure display.
    pub last_error: Option<String>,

    // Set once the user asked to stop.
    pub cancel_requested: bool,
}

impl App {
    pub fn new(title: impl Into<String>, plan: &[InstallationStep]) -> Self {
        Self {
            title: title.into(),
            steps: steps_from_plan(plan),
            current: None,
            logs: Vec::new(),
            progress_state: ProgressState::Running,
            last_error: None,
            cancel_requested: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.progress_state == ProgressState::Running
    }

    pub fn current_description(&self) -> Option<&'static str> {
        self.current
            .and_then(|index| self.steps.get(index))
            .map(|step| step.description)
    }

    pub fn request_cancel(&mut self) {
        if !self.cancel_requested {
            self.cancel_requested = true;
            self.append_log("Cancellation requested; stopping after the current step.".to_string());
        }
    }

    /// The worker exited without reporting a terminal state.
    pub fn worker_stopped(&mut self) {
        self.mark_current(StepStatus::Failed);
        self.last_error = Some("installer worker stopped unexpectedly".to_string());
        self.progress_state = ProgressState::Failed;
    }

    pub fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::LogLine(line) => self.append_log(line),
            WorkerEvent::Pipeline(event) => self.apply_pipeline(event),
        }
    }

    fn apply_pipeline(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::StepStarted(index) => {
                self.current = Some(index);
                self.set_status(index, StepStatus::Running);
            }
            PipelineEvent::StepCompleted(index) => self.set_status(index, StepStatus::Done),
            PipelineEvent::UpToDate(version) => {
                self.mark_current(StepStatus::Done);
                self.append_log(format!("Version {version} is already installed."));
                self.progress_state = ProgressState::UpToDate(version);
            }
            PipelineEvent::Failed { index, error } => {
                self.set_status(index, StepStatus::Failed);
                let message = error.to_string();
                self.append_log(format!("Error: {message}"));
                self.last_error = Some(message);
                self.progress_state = ProgressState::Failed;
            }
            PipelineEvent::Cancelled { index } => {
                let name = self.steps.get(index).map_or("the next step", |step| step.name);
                self.append_log(format!("Cancelled before {name}."));
                self.progress_state = ProgressState::Cancelled;
            }
            PipelineEvent::Done => self.progress_state = ProgressState::Completed,
        }
    }

    fn set_status(&mut self, index: usize, status: StepStatus) {
        if let Some(step) = self.steps.get_mut(index) {
            step.status = status;
        }
    }

    fn mark_current(&mut self, status: StepStatus) {
        if let Some(index) = self.current {
            self.set_status(index, status);
        }
    }

    pub fn append_log(&mut self, line: String) {
        self.logs.push(line);
        if self.logs.len() > MAX_LOG_LINES {
            let excess = self.logs.len() - MAX_LOG_LINES;
            self.logs.drain(0..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cursor_installer_core::{plan, InstallError, PlanFlags, ReconciliationResult};

    fn app() -> App {
        App::new(
            "Install Cursor",
            &plan(PlanFlags::default(), &ReconciliationResult::NotInstalled),
        )
    }

    fn statuses(app: &App) -> Vec<StepStatus> {
        app.steps.iter().map(|step| step.status).collect()
    }

    #[test]
    fn failure_marks_the_step_and_keeps_the_error() {
        let mut app = app();
        for event in [
            PipelineEvent::StepStarted(0),
            PipelineEvent::StepCompleted(0),
            PipelineEvent::StepStarted(1),
            PipelineEvent::StepCompleted(1),
            PipelineEvent::StepStarted(2),
            PipelineEvent::Failed {
                index: 2,
                error: InstallError::Network("timed out".to_string()),
            },
        ] {
            app.apply(WorkerEvent::Pipeline(event));
        }

        assert_eq!(app.progress_state, ProgressState::Failed);
        assert_eq!(app.last_error.as_deref(), Some("network error: timed out"));
        assert_eq!(
            &statuses(&app)[..4],
            &[
                StepStatus::Done,
                StepStatus::Done,
                StepStatus::Failed,
                StepStatus::Pending,
            ]
        );
    }

    #[test]
    fn up_to_date_finishes_the_running_step() {
        let mut app = app();
        app.apply(WorkerEvent::Pipeline(PipelineEvent::StepStarted(0)));
        app.apply(WorkerEvent::Pipeline(PipelineEvent::UpToDate("1.2.0".to_string())));

        assert_eq!(app.progress_state, ProgressState::UpToDate("1.2.0".to_string()));
        assert_eq!(app.steps[0].status, StepStatus::Done);
        assert!(!app.is_running());
    }

    #[test]
    fn log_pane_is_bounded() {
        let mut app = app();
        for index in 0..(MAX_LOG_LINES + 25) {
            app.apply(WorkerEvent::LogLine(format!("line {index}")));
        }
        assert_eq!(app.logs.len(), MAX_LOG_LINES);
        assert_eq!(app.logs[0], "line 25");
    }

    #[test]
    fn cancel_request_is_logged_once() {
        let mut app = app();
        app.request_cancel();
        app.request_cancel();
        assert!(app.cancel_requested);
        assert_eq!(app.logs.len(), 1);
    }
}
