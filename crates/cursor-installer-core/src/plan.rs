//! Step planning for an installation run.
//!
//! The planner returns plain data; binding a step to its side effect happens
//! in `dispatch`. Same flags and classification always yield the same list.

use crate::reconcile::ReconciliationResult;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PlanFlags {
    pub force: bool,
    pub download_only: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepKind {
    CheckInstallation,
    CheckUpdates,
    Download,
    Install,
    ExtractIcon,
    DesktopEntry,
    Symlink,
    UpdateMetadata,
}

impl StepKind {
    /// Whether the step mutates locations outside the user's files.
    pub fn needs_privilege(self) -> bool {
        matches!(
            self,
            StepKind::Install
                | StepKind::ExtractIcon
                | StepKind::DesktopEntry
                | StepKind::Symlink
                | StepKind::UpdateMetadata
        )
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstallationStep {
    pub kind: StepKind,
    pub name: &'static str,
    pub description: &'static str,
}

impl InstallationStep {
    fn new(kind: StepKind, name: &'static str, description: &'static str) -> Self {
        Self {
            kind,
            name,
            description,
        }
    }
}

const INSTALL_SUFFIX: [(StepKind, &str, &str); 5] = [
    (
        StepKind::Install,
        "Install",
        "Moving the application into the install directory...",
    ),
    (
        StepKind::ExtractIcon,
        "Extract Icon",
        "Extracting application icon...",
    ),
    (
        StepKind::DesktopEntry,
        "Desktop Entry",
        "Creating desktop entry...",
    ),
    (
        StepKind::Symlink,
        "Create Symlink",
        "Creating launcher symlink...",
    ),
    (
        StepKind::UpdateMetadata,
        "Update Metadata",
        "Recording installation information...",
    ),
];

pub fn plan(flags: PlanFlags, classification: &ReconciliationResult) -> Vec<InstallationStep> {
    let check_description = if flags.download_only {
        "Preparing to download..."
    } else {
        "Checking if the application is already installed..."
    };
    let mut steps = vec![InstallationStep::new(
        StepKind::CheckInstallation,
        "Check Installation",
        check_description,
    )];

    if classification.is_up_to_date() && !flags.force {
        // The check step reports the up-to-date outcome on its own.
        return steps;
    }

    if classification.has_existing_install() && !flags.force {
        let name = if flags.download_only {
            "Download"
        } else {
            "Check Updates"
        };
        steps.push(InstallationStep::new(
            StepKind::CheckUpdates,
            name,
            "Checking for available updates...",
        ));
    } else {
        steps.push(InstallationStep::new(
            StepKind::Download,
            "Download",
            "Downloading the latest version...",
        ));
    }

    if !flags.download_only {
        steps.extend(
            INSTALL_SUFFIX
                .iter()
                .map(|&(kind, name, description)| InstallationStep::new(kind, name, description)),
        );
    }

    steps
}
