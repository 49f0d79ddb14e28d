//! State of a single installation attempt.

use crate::InstallError;
use std::path::{Path, PathBuf};

/// Where a job is in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum JobState {
    /// Submitted, nothing done yet.
    Idle,
    /// Attaching the disk image.
    Mounting,
    /// Looking for the bundle on the volume.
    Discovering,
    /// Waiting for a replace-or-skip decision.
    AwaitingConfirmation,
    /// Checking the destination.
    Validating,
    /// Copying the bundle.
    Copying,
    /// Clearing attributes and revealing the result.
    PostProcessing,
    /// Detaching the volume.
    Unmounting,
    /// Trashing the source image.
    Cleanup,
    /// Finished; see the job's [`Outcome`].
    Terminal,
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The bundle is installed at `path`. `skipped` means an existing
    /// installation was kept and nothing was copied.
    Success {
        /// Bundle name.
        bundle: String,
        /// Installed location.
        path: PathBuf,
        /// Whether the copy was skipped at the user's request.
        skipped: bool,
    },
    /// The installer declined to act; the user should install by hand.
    ManualFallback {
        /// Why the installer gave up.
        reason: String,
        /// What the user can do.
        fix: String,
    },
    /// The installation failed.
    Error {
        /// What went wrong.
        message: String,
        /// What the user can do.
        fix: String,
    },
}

impl Outcome {
    /// Whether the job succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<&InstallError> for Outcome {
    fn from(error: &InstallError) -> Self {
        if error.is_manual_fallback() {
            Self::ManualFallback {
                reason: error.to_string(),
                fix: error.fix_suggestion(),
            }
        } else {
            Self::Error {
                message: error.to_string(),
                fix: error.fix_suggestion(),
            }
        }
    }
}

/// One installation attempt, owned by the orchestrator while it runs.
#[derive(Debug, Clone)]
pub(crate) struct DiskImageJob {
    image: PathBuf,
    destination: PathBuf,
    mount_point: Option<PathBuf>,
    was_mounted: bool,
    candidates: Vec<PathBuf>,
    selected: Option<PathBuf>,
    state: JobState,
    history: Vec<JobState>,
}

impl DiskImageJob {
    pub(crate) fn new(image: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
            destination: destination.into(),
            mount_point: None,
            was_mounted: false,
            candidates: Vec::new(),
            selected: None,
            state: JobState::Idle,
            history: vec![JobState::Idle],
        }
    }

    pub(crate) fn image(&self) -> &Path {
        &self.image
    }

    pub(crate) fn transition(&mut self, next: JobState) {
        tracing::debug!(
            from = %self.state,
            to = %next,
            image = %self.image.display(),
            "job state"
        );
        self.state = next;
        self.history.push(next);
    }

    /// Record the mount point. A job holds at most one; a second is ignored.
    pub(crate) fn set_mount_point(&mut self, mount_point: PathBuf) {
        if let Some(existing) = &self.mount_point {
            tracing::warn!(
                existing = %existing.display(),
                ignored = %mount_point.display(),
                "job already has a mount point"
            );
            return;
        }
        self.mount_point = Some(mount_point);
        self.was_mounted = true;
    }

    /// Forget the mount point once detach has been attempted.
    pub(crate) fn release_mount_point(&mut self) -> Option<PathBuf> {
        self.mount_point.take()
    }

    pub(crate) fn set_candidates(&mut self, candidates: Vec<PathBuf>) {
        self.candidates = candidates;
    }

    pub(crate) fn select(&mut self, bundle: PathBuf) {
        self.selected = Some(bundle);
    }

    pub(crate) fn into_report(self, outcome: Outcome) -> JobReport {
        JobReport {
            image: self.image,
            destination: self.destination,
            was_mounted: self.was_mounted,
            candidates: self.candidates,
            selected: self.selected,
            history: self.history,
            outcome,
        }
    }
}

/// What is left of a job once it reached a terminal state.
///
/// On a manual fallback, `candidates` lists what was found on the volume so
/// the caller can point the user at the right bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// The source disk image.
    pub image: PathBuf,
    /// The directory the bundle was to be installed into.
    pub destination: PathBuf,
    /// Whether the image was ever mounted.
    pub was_mounted: bool,
    /// Every bundle found on the volume, before helper filtering.
    pub candidates: Vec<PathBuf>,
    /// The bundle chosen for installation, if discovery settled on one.
    pub selected: Option<PathBuf>,
    /// Every state the job passed through, ending in [`JobState::Terminal`].
    pub history: Vec<JobState>,
    /// How the job ended.
    pub outcome: Outcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ValidationError;

    #[test]
    fn test_new_job_is_idle() {
        let job = DiskImageJob::new("/tmp/MyApp.dmg", "/Applications");
        assert_eq!(job.state, JobState::Idle);
        assert_eq!(job.history, [JobState::Idle]);
        assert!(job.mount_point.is_none());
        assert!(!job.was_mounted);
    }

    #[test]
    fn test_single_mount_point() {
        let mut job = DiskImageJob::new("/tmp/MyApp.dmg", "/Applications");
        job.set_mount_point(PathBuf::from("/Volumes/MyApp"));
        job.set_mount_point(PathBuf::from("/Volumes/Other"));
        assert_eq!(job.mount_point.as_deref(), Some(Path::new("/Volumes/MyApp")));

        assert_eq!(job.release_mount_point(), Some(PathBuf::from("/Volumes/MyApp")));
        assert!(job.mount_point.is_none());
        assert!(job.was_mounted);
    }

    #[test]
    fn test_history_records_transitions() {
        let mut job = DiskImageJob::new("/tmp/MyApp.dmg", "/Applications");
        job.transition(JobState::Mounting);
        job.transition(JobState::Terminal);
        let report = job.into_report(Outcome::ManualFallback {
            reason: "r".into(),
            fix: "f".into(),
        });
        assert_eq!(
            report.history,
            [JobState::Idle, JobState::Mounting, JobState::Terminal]
        );
    }

    #[test]
    fn test_report_keeps_discovery_results() {
        let mut job = DiskImageJob::new("/tmp/MyApp.dmg", "/Applications");
        job.set_mount_point(PathBuf::from("/Volumes/MyApp"));
        job.set_candidates(vec![
            PathBuf::from("/Volumes/MyApp/MyApp.app"),
            PathBuf::from("/Volumes/MyApp/MyApp Uninstaller.app"),
        ]);
        job.select(PathBuf::from("/Volumes/MyApp/MyApp.app"));

        let report = job.into_report(Outcome::Error {
            message: "m".into(),
            fix: "f".into(),
        });
        assert_eq!(report.destination, PathBuf::from("/Applications"));
        assert_eq!(report.candidates.len(), 2);
        assert_eq!(
            report.selected,
            Some(PathBuf::from("/Volumes/MyApp/MyApp.app"))
        );
        assert!(report.was_mounted);
    }

    #[test]
    fn test_outcome_from_errors() {
        let fallback = InstallError::DiscoveryAmbiguous {
            candidates: vec![],
            fix: "Install by hand".into(),
        };
        assert!(matches!(Outcome::from(&fallback), Outcome::ManualFallback { .. }));

        let error = InstallError::Validation(ValidationError::NotWritable {
            path: PathBuf::from("/Applications"),
        });
        match Outcome::from(&error) {
            Outcome::Error { message, .. } => assert!(message.contains("not writable")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
