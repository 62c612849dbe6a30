//! Event types used to coordinate the presenter and the worker thread.

use crossterm::event::Event;
use cursor_installer_core::PipelineEvent;

pub enum UiMessage {
    Input(Event),
    Worker(WorkerEvent),
}

pub enum WorkerEvent {
    Pipeline(PipelineEvent),
    LogLine(String),
}
