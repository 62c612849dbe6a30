//! Maps planned steps onto the bound collaborators.
//!
//! State carried between steps (the downloaded artifact, the last check
//! verdict) lives in explicit fields rather than captured closures.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::capability::{Capabilities, DownloadedArtifact};
use crate::error::InstallError;
use crate::executor::{StepOutcome, StepResult, StepRunner};
use crate::metadata::InstallMetadata;
use crate::plan::{InstallationStep, PlanFlags, StepKind};
use crate::reconcile::{InstallCheck, ReconciliationResult, VersionReconciler};

pub struct StepDispatcher<'a, C: Capabilities + ?Sized> {
    caps: &'a mut C,
    reconciler: VersionReconciler<'a>,
    install_path: PathBuf,
    /// Classification the plan was built from.
    planned: ReconciliationResult,
    flags: PlanFlags,
    clock: fn() -> DateTime<Utc>,
    downloaded: Option<DownloadedArtifact>,
    last_check: Option<ReconciliationResult>,
}

impl<'a, C: Capabilities + ?Sized> StepDispatcher<'a, C> {
    pub fn new(
        caps: &'a mut C,
        reconciler: VersionReconciler<'a>,
        planned: ReconciliationResult,
        install_path: PathBuf,
        flags: PlanFlags,
    ) -> Self {
        Self {
            caps,
            reconciler,
            install_path,
            planned,
            flags,
            clock: Utc::now,
            downloaded: None,
            last_check: None,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    /// Artifact produced by the download or update step, if any.
    pub fn downloaded(&self) -> Option<&DownloadedArtifact> {
        self.downloaded.as_ref()
    }

    fn report_check(&mut self) -> StepResult {
        let line = match &self.last_check {
            Some(ReconciliationResult::NotInstalled) | None => {
                "No existing installation found.".to_string()
            }
            Some(ReconciliationResult::LegacyInstallNoMetadata) => {
                "Existing installation without metadata; reinstalling (--force).".to_string()
            }
            Some(ReconciliationResult::UpToDate(version)) => {
                format!("Version {version} is current; reinstalling (--force).")
            }
            Some(ReconciliationResult::UpdateAvailable(version)) => {
                format!("Update available: {version}")
            }
        };
        self.caps.note(line);
        Ok(StepOutcome::Completed)
    }

    fn check_updates(&mut self) -> StepResult {
        let Some(metadata) = self.reconciler.store().read()? else {
            return Err(InstallError::VersionUnknown(
                "no installation metadata found".to_string(),
            ));
        };

        let artifact = self.caps.download()?;
        match artifact.version.as_deref() {
            Some(latest) if latest == metadata.version => {
                self.caps.discard_download(&artifact)?;
                return Ok(StepOutcome::UpToDate(metadata.version));
            }
            Some(latest) => {
                self.caps
                    .note(format!("Updating {} -> {}", metadata.version, latest));
            }
            None => {
                warn!(
                    installed = %metadata.version,
                    "downloaded artifact carries no version; treating it as an update"
                );
                self.caps
                    .note("Server did not name the downloaded version; installing it.".to_string());
            }
        }

        if let Err(err) = self.caps.make_executable(&artifact) {
            if let Err(cleanup) = self.caps.discard_download(&artifact) {
                warn!(
                    path = %artifact.path.display(),
                    %cleanup,
                    "failed to remove download after chmod failure"
                );
            }
            return Err(err);
        }
        self.downloaded = Some(artifact);
        Ok(StepOutcome::Completed)
    }

    fn download(&mut self) -> StepResult {
        let artifact = self.caps.download()?;
        self.caps.make_executable(&artifact)?;
        self.downloaded = Some(artifact);
        Ok(StepOutcome::Completed)
    }

    fn install(&mut self) -> StepResult {
        let artifact = self
            .downloaded
            .as_ref()
            .ok_or(InstallError::MissingArtifact("install"))?;
        self.caps.move_to_install_location(artifact)?;
        Ok(StepOutcome::Completed)
    }

    /// A plan built for an up-to-date install holds only the check step, so
    /// it cannot carry out work the re-check now asks for.
    fn ensure_plan_covers(&self, current: &ReconciliationResult) -> Result<(), InstallError> {
        let ReconciliationResult::UpToDate(planned) = &self.planned else {
            return Ok(());
        };
        if self.flags.force {
            return Ok(());
        }
        let detail = match current {
            ReconciliationResult::UpdateAvailable(latest) => {
                format!("{planned} was current, {latest} is now available")
            }
            ReconciliationResult::NotInstalled => {
                format!("{planned} was installed, no installation is present now")
            }
            ReconciliationResult::LegacyInstallNoMetadata => {
                format!("{planned} was installed, its metadata is gone now")
            }
            ReconciliationResult::UpToDate(version) => {
                format!("{planned} was current, {version} is current now")
            }
        };
        Err(InstallError::StateChanged(detail))
    }

    fn update_metadata(&mut self) -> StepResult {
        let version = match self.downloaded.as_ref().and_then(|artifact| artifact.version.clone()) {
            Some(version) => version,
            None => self.reconciler.probe().latest_version()?.label().to_string(),
        };
        let metadata = InstallMetadata::new(version, self.install_path.clone(), (self.clock)());
        self.caps.persist_metadata(&metadata)?;
        Ok(StepOutcome::Completed)
    }
}

impl<C: Capabilities + ?Sized> StepRunner for StepDispatcher<'_, C> {
    fn revalidate(&mut self) -> StepResult {
        match self.reconciler.check(self.flags.force)? {
            InstallCheck::UpToDate(version) => Ok(StepOutcome::UpToDate(version)),
            InstallCheck::Proceed(classification) => {
                if let Err(err) = self.ensure_plan_covers(&classification) {
                    warn!(%err, "re-check disagrees with the planned classification");
                    return Err(err);
                }
                self.last_check = Some(classification);
                Ok(StepOutcome::Completed)
            }
        }
    }

    fn run(&mut self, step: &InstallationStep) -> StepResult {
        match step.kind {
            StepKind::CheckInstallation => self.report_check(),
            StepKind::CheckUpdates => self.check_updates(),
            StepKind::Download => self.download(),
            StepKind::Install => self.install(),
            StepKind::ExtractIcon => self.caps.extract_icon().map(|()| StepOutcome::Completed),
            StepKind::DesktopEntry => self
                .caps
                .write_desktop_entry()
                .map(|()| StepOutcome::Completed),
            StepKind::Symlink => self.caps.create_symlink().map(|()| StepOutcome::Completed),
            StepKind::UpdateMetadata => self.update_metadata(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{CancelFlag, StepExecutor, Terminal};
    use crate::metadata::MetadataStore;
    use crate::ops::LocalOps;
    use crate::plan::plan;
    use crate::reconcile::{RemoteVersion, VersionProbe};
    use chrono::TimeZone;
    use std::cell::Cell;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct StaticProbe(RemoteVersion);

    impl VersionProbe for StaticProbe {
        fn latest_version(&self) -> Result<RemoteVersion, InstallError> {
            Ok(self.0.clone())
        }
    }

    /// Serves `versions` in order, repeating the last one.
    struct SteppingProbe {
        versions: Vec<&'static str>,
        calls: Cell<usize>,
    }

    impl VersionProbe for SteppingProbe {
        fn latest_version(&self) -> Result<RemoteVersion, InstallError> {
            let call = self.calls.get();
            self.calls.set(call + 1);
            let index = call.min(self.versions.len() - 1);
            Ok(RemoteVersion::Known(self.versions[index].to_string()))
        }
    }

    #[derive(Default)]
    struct FakeCapabilities {
        download_version: Option<String>,
        fail: Option<&'static str>,
        calls: HashMap<&'static str, usize>,
        persisted: Vec<InstallMetadata>,
        notes: Vec<String>,
    }

    impl FakeCapabilities {
        fn record(&mut self, name: &'static str) -> Result<(), InstallError> {
            *self.calls.entry(name).or_default() += 1;
            if self.fail == Some(name) {
                return Err(InstallError::permission(format!("{name} denied")));
            }
            Ok(())
        }

        fn count(&self, name: &str) -> usize {
            self.calls.get(name).copied().unwrap_or(0)
        }
    }

    impl Capabilities for FakeCapabilities {
        fn download(&mut self) -> Result<DownloadedArtifact, InstallError> {
            self.record("download")?;
            Ok(DownloadedArtifact {
                path: PathBuf::from("Cursor.AppImage"),
                version: self.download_version.clone(),
            })
        }

        fn make_executable(&mut self, _artifact: &DownloadedArtifact) -> Result<(), InstallError> {
            self.record("make_executable")
        }

        fn discard_download(&mut self, _artifact: &DownloadedArtifact) -> Result<(), InstallError> {
            self.record("discard_download")
        }

        fn move_to_install_location(
            &mut self,
            _artifact: &DownloadedArtifact,
        ) -> Result<(), InstallError> {
            self.record("move_to_install_location")
        }

        fn extract_icon(&mut self) -> Result<(), InstallError> {
            self.record("extract_icon")
        }

        fn write_desktop_entry(&mut self) -> Result<(), InstallError> {
            self.record("write_desktop_entry")
        }

        fn create_symlink(&mut self) -> Result<(), InstallError> {
            self.record("create_symlink")
        }

        fn persist_metadata(&mut self, metadata: &InstallMetadata) -> Result<(), InstallError> {
            self.record("persist_metadata")?;
            self.persisted.push(metadata.clone());
            Ok(())
        }

        fn note(&mut self, line: String) {
            self.notes.push(line);
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    struct Harness {
        dir: TempDir,
        store: MetadataStore,
    }

    impl Harness {
        fn new() -> Self {
            let dir = TempDir::new().expect("tempdir");
            let store = MetadataStore::new(dir.path().join("metadata.json"), Arc::new(LocalOps));
            Self { dir, store }
        }

        fn artifact_path(&self) -> PathBuf {
            self.dir.path().join("Cursor.AppImage")
        }

        fn installed(&self, version: &str) {
            fs::write(self.artifact_path(), b"appimage").expect("write artifact");
            self.store
                .write(&InstallMetadata::new(version, self.artifact_path(), fixed_now()))
                .expect("write metadata");
        }

        fn run(
            &self,
            flags: PlanFlags,
            probe: &dyn VersionProbe,
            caps: &mut FakeCapabilities,
        ) -> StepExecutor {
            let reconciler = VersionReconciler::new(&self.store, probe, self.artifact_path());
            let classification = reconciler.classify().expect("classify");
            let mut executor = StepExecutor::new(plan(flags, &classification));
            let mut dispatcher = StepDispatcher::new(
                caps,
                reconciler,
                classification,
                self.artifact_path(),
                flags,
            )
            .with_clock(fixed_now);
            executor.run(&mut dispatcher, &CancelFlag::new(), &mut |_| {});
            executor
        }
    }

    #[test]
    fn fresh_install_invokes_every_capability_once() {
        let harness = Harness::new();
        let probe = StaticProbe(RemoteVersion::Known("0.42.3".to_string()));
        let mut caps = FakeCapabilities {
            download_version: Some("0.42.3".to_string()),
            ..Default::default()
        };

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        assert_eq!(executor.state().terminal(), &Terminal::Done);
        for name in [
            "download",
            "make_executable",
            "move_to_install_location",
            "extract_icon",
            "write_desktop_entry",
            "create_symlink",
            "persist_metadata",
        ] {
            assert_eq!(caps.count(name), 1, "{name}");
        }
        assert_eq!(caps.persisted[0].version, "0.42.3");
        assert_eq!(caps.persisted[0].install_path, harness.artifact_path());
        assert_eq!(caps.persisted[0].last_update_date, fixed_now());
    }

    #[test]
    fn up_to_date_install_short_circuits_after_the_check() {
        let harness = Harness::new();
        harness.installed("1.2.0");
        let probe = StaticProbe(RemoteVersion::Known("1.2.0".to_string()));
        let mut caps = FakeCapabilities::default();

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        assert_eq!(
            executor.state().terminal(),
            &Terminal::UpToDate("1.2.0".to_string())
        );
        assert!(caps.calls.is_empty());
    }

    #[test]
    fn failing_install_step_leaves_later_capabilities_untouched() {
        let harness = Harness::new();
        let probe = StaticProbe(RemoteVersion::Known("0.42.3".to_string()));
        let mut caps = FakeCapabilities {
            fail: Some("move_to_install_location"),
            ..Default::default()
        };

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        assert!(matches!(
            executor.state().terminal(),
            Terminal::Failed(InstallError::Permission { .. })
        ));
        assert_eq!(
            executor.state().completed(),
            &[true, true, false, false, false, false, false]
        );
        for name in [
            "extract_icon",
            "write_desktop_entry",
            "create_symlink",
            "persist_metadata",
        ] {
            assert_eq!(caps.count(name), 0, "{name}");
        }
    }

    #[test]
    fn update_check_discards_download_of_current_version() {
        let harness = Harness::new();
        harness.installed("1.2.0");
        // Probe lags behind the artifact the server actually hands out.
        let probe = StaticProbe(RemoteVersion::Unknown);
        let mut caps = FakeCapabilities {
            download_version: Some("1.2.0".to_string()),
            ..Default::default()
        };

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        assert_eq!(
            executor.state().terminal(),
            &Terminal::UpToDate("1.2.0".to_string())
        );
        assert_eq!(caps.count("discard_download"), 1);
        assert_eq!(caps.count("make_executable"), 0);
        assert_eq!(caps.count("move_to_install_location"), 0);
    }

    #[test]
    fn update_installs_newer_download_and_keeps_install_date() {
        let harness = Harness::new();
        harness.installed("1.2.0");
        let probe = StaticProbe(RemoteVersion::Known("1.3.0".to_string()));
        let mut caps = FakeCapabilities {
            download_version: Some("1.3.0".to_string()),
            ..Default::default()
        };

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        assert_eq!(executor.state().terminal(), &Terminal::Done);
        assert_eq!(executor.state().steps()[1].kind, StepKind::CheckUpdates);
        assert_eq!(caps.count("download"), 1);
        assert_eq!(caps.persisted[0].version, "1.3.0");
        assert!(caps.notes.iter().any(|line| line.contains("1.2.0 -> 1.3.0")));
    }

    #[test]
    fn metadata_falls_back_to_probe_label_without_download_version() {
        let harness = Harness::new();
        let probe = StaticProbe(RemoteVersion::Known("2.0.0".to_string()));
        let mut caps = FakeCapabilities::default();

        harness.run(PlanFlags::default(), &probe, &mut caps);

        assert_eq!(caps.persisted[0].version, "2.0.0");
    }

    #[test]
    fn download_only_stops_after_download() {
        let harness = Harness::new();
        let probe = StaticProbe(RemoteVersion::Unknown);
        let mut caps = FakeCapabilities::default();
        let flags = PlanFlags {
            force: false,
            download_only: true,
        };

        let executor = harness.run(flags, &probe, &mut caps);

        assert_eq!(executor.state().terminal(), &Terminal::Done);
        assert_eq!(executor.state().steps().len(), 2);
        assert_eq!(caps.count("download"), 1);
        assert_eq!(caps.count("move_to_install_location"), 0);
        assert_eq!(caps.count("persist_metadata"), 0);
    }

    #[test]
    fn legacy_install_requires_force() {
        let harness = Harness::new();
        fs::write(harness.artifact_path(), b"appimage").expect("write artifact");
        let probe = StaticProbe(RemoteVersion::Unknown);

        let mut caps = FakeCapabilities::default();
        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);
        assert!(matches!(
            executor.state().terminal(),
            Terminal::Failed(InstallError::ConflictingInstall(_))
        ));
        assert!(caps.calls.is_empty());

        let mut forced = FakeCapabilities::default();
        let flags = PlanFlags {
            force: true,
            download_only: false,
        };
        let executor = harness.run(flags, &probe, &mut forced);
        assert_eq!(executor.state().terminal(), &Terminal::Done);
        assert_eq!(forced.count("move_to_install_location"), 1);
    }

    #[test]
    fn update_appearing_after_planning_fails_the_check() {
        let harness = Harness::new();
        harness.installed("1.2.0");
        let probe = SteppingProbe {
            versions: vec!["1.2.0", "1.3.0"],
            calls: Cell::new(0),
        };
        let mut caps = FakeCapabilities::default();

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        assert_eq!(executor.state().steps().len(), 1);
        match executor.state().terminal() {
            Terminal::Failed(InstallError::StateChanged(detail)) => {
                assert!(detail.contains("1.3.0"), "{detail}");
            }
            other => panic!("unexpected terminal: {other:?}"),
        }
        assert_eq!(executor.state().completed(), &[false]);
        assert!(caps.calls.is_empty());
        assert!(caps.notes.is_empty());
    }

    #[test]
    fn forced_plan_absorbs_a_changed_version() {
        let harness = Harness::new();
        harness.installed("1.2.0");
        let probe = SteppingProbe {
            versions: vec!["1.2.0", "1.3.0"],
            calls: Cell::new(0),
        };
        let mut caps = FakeCapabilities {
            download_version: Some("1.3.0".to_string()),
            ..Default::default()
        };
        let flags = PlanFlags {
            force: true,
            download_only: false,
        };

        let executor = harness.run(flags, &probe, &mut caps);

        assert_eq!(executor.state().terminal(), &Terminal::Done);
        assert_eq!(caps.count("move_to_install_location"), 1);
    }

    #[test]
    fn chmod_failure_discards_download_and_keeps_the_error() {
        let harness = Harness::new();
        harness.installed("1.2.0");
        let probe = StaticProbe(RemoteVersion::Known("1.3.0".to_string()));
        let mut caps = FakeCapabilities {
            download_version: Some("1.3.0".to_string()),
            fail: Some("make_executable"),
            ..Default::default()
        };

        let executor = harness.run(PlanFlags::default(), &probe, &mut caps);

        match executor.state().terminal() {
            Terminal::Failed(InstallError::Permission { detail, .. }) => {
                assert_eq!(detail, "make_executable denied");
            }
            other => panic!("unexpected terminal: {other:?}"),
        }
        assert_eq!(caps.count("discard_download"), 1);
        assert_eq!(caps.count("move_to_install_location"), 0);
    }
}
