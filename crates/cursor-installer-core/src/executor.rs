//! Sequential step execution.
//!
//! Steps run strictly one at a time. Once the pipeline leaves `Running` it
//! never resumes; completed steps are not rolled back on failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::InstallError;
use crate::plan::InstallationStep;

/// Outcome of a step action that did not fail.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    Completed,
    /// Nothing to do; the installed version is current.
    UpToDate(String),
}

pub type StepResult = Result<StepOutcome, InstallError>;

/// Binds planned steps to their actions.
pub trait StepRunner {
    /// Re-check installation state just before the first step runs.
    fn revalidate(&mut self) -> StepResult;
    fn run(&mut self, step: &InstallationStep) -> StepResult;
}

/// Cooperative cancellation, observed only between steps.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Terminal {
    Running,
    Done,
    Failed(InstallError),
    UpToDate(String),
    Cancelled,
}

impl Terminal {
    pub fn is_running(&self) -> bool {
        matches!(self, Terminal::Running)
    }

    /// Done and UpToDate both count as a successful run.
    pub fn is_success(&self) -> bool {
        matches!(self, Terminal::Done | Terminal::UpToDate(_))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PipelineEvent {
    StepStarted(usize),
    StepCompleted(usize),
    UpToDate(String),
    Failed { index: usize, error: InstallError },
    Cancelled { index: usize },
    Done,
}

#[derive(Clone, Debug)]
pub struct PipelineState {
    steps: Vec<InstallationStep>,
    current_index: usize,
    completed: Vec<bool>,
    terminal: Terminal,
}

impl PipelineState {
    pub fn new(steps: Vec<InstallationStep>) -> Self {
        let completed = vec![false; steps.len()];
        Self {
            steps,
            current_index: 0,
            completed,
            terminal: Terminal::Running,
        }
    }

    pub fn steps(&self) -> &[InstallationStep] {
        &self.steps
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn completed(&self) -> &[bool] {
        &self.completed
    }

    pub fn terminal(&self) -> &Terminal {
        &self.terminal
    }
}

pub struct StepExecutor {
    state: PipelineState,
}

impl StepExecutor {
    pub fn new(steps: Vec<InstallationStep>) -> Self {
        Self {
            state: PipelineState::new(steps),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn into_state(self) -> PipelineState {
        self.state
    }

    /// Drive the pipeline until it reaches a terminal state.
    pub fn run(
        &mut self,
        runner: &mut dyn StepRunner,
        cancel: &CancelFlag,
        emit: &mut dyn FnMut(PipelineEvent),
    ) -> &Terminal {
        while self.state.terminal.is_running() {
            self.advance(runner, cancel, emit);
        }
        &self.state.terminal
    }

    /// Perform a single transition out of `Running(current_index)`.
    pub fn advance(
        &mut self,
        runner: &mut dyn StepRunner,
        cancel: &CancelFlag,
        emit: &mut dyn FnMut(PipelineEvent),
    ) {
        if !self.state.terminal.is_running() {
            return;
        }

        let index = self.state.current_index;
        let Some(step) = self.state.steps.get(index).cloned() else {
            info!(steps = self.state.steps.len(), "installation pipeline finished");
            self.state.terminal = Terminal::Done;
            emit(PipelineEvent::Done);
            return;
        };

        if cancel.is_cancelled() {
            warn!(index, step = step.name, "installation cancelled before step");
            self.state.terminal = Terminal::Cancelled;
            emit(PipelineEvent::Cancelled { index });
            return;
        }

        emit(PipelineEvent::StepStarted(index));
        debug!(index, step = step.name, "running step");

        if index == 0 {
            match runner.revalidate() {
                Ok(StepOutcome::Completed) => {}
                other => {
                    self.settle(index, other, emit);
                    return;
                }
            }
        }

        let result = runner.run(&step);
        self.settle(index, result, emit);
    }

    fn settle(
        &mut self,
        index: usize,
        result: StepResult,
        emit: &mut dyn FnMut(PipelineEvent),
    ) {
        match result {
            Ok(StepOutcome::Completed) => {
                self.state.completed[index] = true;
                self.state.current_index = index + 1;
                emit(PipelineEvent::StepCompleted(index));
            }
            Ok(StepOutcome::UpToDate(version)) => {
                info!(%version, "already up to date");
                self.state.terminal = Terminal::UpToDate(version.clone());
                emit(PipelineEvent::UpToDate(version));
            }
            Err(error) => {
                warn!(index, %error, "step failed");
                self.state.terminal = Terminal::Failed(error.clone());
                emit(PipelineEvent::Failed { index, error });
            }
        }
    }
}
