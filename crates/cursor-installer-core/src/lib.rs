//! Installation engine shared by the cursor-installer binary.
//!
//! Owns the decision logic: metadata persistence, version reconciliation,
//! step planning, and sequential step execution. Side effects live behind the
//! traits in `capability` and `ops`.

pub mod capability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod ops;
pub mod plan;
pub mod reconcile;
pub mod util;

pub use capability::{Capabilities, DownloadedArtifact};
pub use config::*;
pub use dispatch::StepDispatcher;
pub use error::InstallError;
pub use executor::{
    CancelFlag, PipelineEvent, PipelineState, StepExecutor, StepOutcome, StepResult, StepRunner,
    Terminal,
};
pub use metadata::{InstallMetadata, MetadataStore};
pub use ops::{LocalOps, PrivilegedOps};
pub use plan::{plan, InstallationStep, PlanFlags, StepKind};
pub use reconcile::{
    version_from_content_disposition, version_info, InstallCheck, ReconciliationResult,
    RemoteVersion, VersionInfo, VersionProbe, VersionReconciler,
};
pub use util::program_in_path;

/// Version of the installer itself, reported by `--version`.
pub const INSTALLER_VERSION: &str = env!("CARGO_PKG_VERSION");
