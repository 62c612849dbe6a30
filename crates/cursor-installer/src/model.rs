//! Step rows shown by the presenters.

use cursor_installer_core::InstallationStep;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepStatus {
    Pending,
    Running,
    Done,
    Failed,
}

pub struct ActionStep {
    pub name: &'static str,
    pub description: &'static str,
    pub status: StepStatus,
}

pub fn steps_from_plan(plan: &[InstallationStep]) -> Vec<ActionStep> {
    plan.iter()
        .map(|step| ActionStep {
            name: step.name,
            description: step.description,
            status: StepStatus::Pending,
        })
        .collect()
}
