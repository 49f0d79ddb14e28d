//! The installation pipeline.
//!
//! [`Orchestrator::install`] takes one disk image from submission to a
//! terminal [`Outcome`]: mount, pick the bundle, confirm replacement,
//! validate, copy, finish up, unmount and clean up.
//!
//! Two rules hold on every path. Only one job runs at a time; a second
//! submission is rejected, not queued. And once a mount point was obtained,
//! a detach is issued before the job ends, whatever happened in between.

use crate::bundle_info::bundle_version;
use crate::confirm::{AutoGate, ConfirmationGate, ReplaceDecision, ReplacePrompt};
use crate::copy::copy_bundle;
use crate::discovery::{discover, select_bundle, BundleCandidate};
use crate::fallback::with_fallback_messages;
use crate::job::{DiskImageJob, JobReport, JobState, Outcome};
use crate::process::{
    clear_attribute_args, is_resource_busy, DiskImageTool, MountResult, ProcessRunner, SystemRunner,
};
use crate::progress::{Feedback, InstallStage, NoFeedback, Notifier, ProgressReporter};
use crate::validation::{bundle_size, space_covers, DestinationProbe, SystemProbe};
use crate::workspace::{SystemWorkspace, Workspace};
use crate::{InstallError, InstallerOptions, Preferences, PreferencesSource, ValidationError};
use semver::Version;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Everything outside the core the orchestrator talks to.
///
/// The default wires up the real system: `hdiutil` through
/// [`SystemRunner`], the real filesystem, `~/.Trash`, no progress display,
/// and a gate that always keeps existing installations.
pub struct Collaborators {
    /// Spawns external tools.
    pub runner: Arc<dyn ProcessRunner>,
    /// Receives stage messages in progress mode.
    pub reporter: Arc<dyn ProgressReporter>,
    /// Receives the closing message in notification mode.
    pub notifier: Arc<dyn Notifier>,
    /// Decides whether existing installations are replaced.
    pub gate: Arc<dyn ConfirmationGate>,
    /// User preferences, read once per job.
    pub preferences: Arc<dyn PreferencesSource>,
    /// File browser and trash.
    pub workspace: Arc<dyn Workspace>,
    /// Destination checks.
    pub probe: Arc<dyn DestinationProbe>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            runner: Arc::new(SystemRunner),
            reporter: Arc::new(NoFeedback),
            notifier: Arc::new(NoFeedback),
            gate: Arc::new(AutoGate(ReplaceDecision::Skip)),
            preferences: Arc::new(Preferences::default()),
            workspace: Arc::new(SystemWorkspace::default()),
            probe: Arc::new(SystemProbe),
        }
    }
}

/// How a pipeline run that did not fail ended.
enum Completion {
    Installed { bundle: String, path: PathBuf },
    Skipped { bundle: String, path: PathBuf },
}

impl Completion {
    fn outcome(&self) -> Outcome {
        match self {
            Self::Installed { bundle, path } => Outcome::Success {
                bundle: bundle.clone(),
                path: path.clone(),
                skipped: false,
            },
            Self::Skipped { bundle, path } => Outcome::Success {
                bundle: bundle.clone(),
                path: path.clone(),
                skipped: true,
            },
        }
    }
}

/// Holds the single-job slot and frees it when dropped.
struct ActiveJob<'a>(&'a AtomicBool);

impl<'a> ActiveJob<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ActiveJob<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Runs installation jobs, one at a time.
///
/// # Example
///
/// ```rust,no_run
/// use dmg_installer::{Collaborators, InstallerOptions, Orchestrator, Outcome};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let orchestrator = Orchestrator::new(InstallerOptions::default(), Collaborators::default());
///     match orchestrator.install("/Users/me/Downloads/MyApp.dmg").await {
///         Ok(report) => match report.outcome {
///             Outcome::Success { path, .. } => println!("Installed at {}", path.display()),
///             Outcome::ManualFallback { reason, fix } => println!("{}. {}", reason, fix),
///             Outcome::Error { message, fix } => println!("Failed: {}. {}", message, fix),
///         },
///         Err(e) => println!("Not started: {}", e),
///     }
/// }
/// ```
pub struct Orchestrator {
    options: InstallerOptions,
    collaborators: Collaborators,
    active: AtomicBool,
}

impl Orchestrator {
    /// Create an orchestrator with the given configuration and collaborators.
    pub fn new(options: InstallerOptions, collaborators: Collaborators) -> Self {
        Self {
            options,
            collaborators,
            active: AtomicBool::new(false),
        }
    }

    /// The configuration jobs run with.
    pub fn options(&self) -> &InstallerOptions {
        &self.options
    }

    /// Whether a job is running right now.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Install the application bundle inside `image`.
    ///
    /// Returns the job's report once it reached a terminal state. The only
    /// error is [`InstallError::JobAlreadyActive`], when another job is
    /// still running; every failure inside the pipeline ends up in the
    /// report's [`Outcome`] instead.
    pub async fn install(&self, image: impl Into<PathBuf>) -> Result<JobReport, InstallError> {
        let Some(_active) = ActiveJob::claim(&self.active) else {
            tracing::warn!("rejecting submission, an installation is already running");
            return Err(InstallError::JobAlreadyActive {
                fix: "Wait for the current installation to finish".to_string(),
            });
        };

        let prefs = self.collaborators.preferences.snapshot();
        let feedback = Feedback::new(
            prefs.feedback_mode,
            self.collaborators.reporter.clone(),
            self.collaborators.notifier.clone(),
        );
        let mut job = DiskImageJob::new(image, self.options.destination.clone());
        tracing::info!(
            image = %job.image().display(),
            mode = %prefs.feedback_mode,
            "installation started"
        );

        let result = self.run_pipeline(&mut job, &prefs, &feedback).await;

        if let Some(mount_point) = job.release_mount_point() {
            job.transition(JobState::Unmounting);
            let stage = InstallStage::Unmounting;
            feedback.stage(stage, stage.description());
            let unmounted = with_fallback_messages(
                self.unmount(&mount_point),
                &self.options.fallback_delays,
                stage.fallback_messages(),
                &feedback,
            )
            .await;
            if let Err(e) = unmounted {
                tracing::warn!(error = %e, fix = %e.fix_suggestion(), "volume left mounted");
            }
        }

        if result.is_ok() && prefs.auto_trash {
            job.transition(JobState::Cleanup);
            feedback.stage(InstallStage::Cleanup, InstallStage::Cleanup.description());
            let workspace = self.collaborators.workspace.clone();
            let image = job.image().to_path_buf();
            match tokio::task::spawn_blocking(move || workspace.trash(&image)).await {
                Ok(Ok(moved)) => {
                    tracing::info!(to = %moved.display(), "disk image moved to trash")
                }
                Ok(Err(e)) => tracing::warn!(
                    image = %job.image().display(),
                    error = %e,
                    "could not trash disk image"
                ),
                Err(e) => tracing::warn!(error = %e, "trash task failed"),
            }
        }

        job.transition(JobState::Terminal);
        let outcome = match &result {
            Ok(completion) => completion.outcome(),
            Err(e) => Outcome::from(e),
        };
        self.announce(&outcome, &feedback);
        Ok(job.into_report(outcome))
    }

    async fn run_pipeline(
        &self,
        job: &mut DiskImageJob,
        prefs: &Preferences,
        feedback: &Feedback,
    ) -> Result<Completion, InstallError> {
        job.transition(JobState::Mounting);
        let stage = InstallStage::Mounting;
        feedback.stage(stage, &format!("Opening {}", file_name(job.image())));
        let tool = self.disk_image_tool();
        let mounted = with_fallback_messages(
            tool.attach(job.image()),
            &self.options.fallback_delays,
            stage.fallback_messages(),
            feedback,
        )
        .await;
        let mount_point = match mounted {
            MountResult::Mounted(mount_point) => mount_point,
            MountResult::Failed { reason, output } => {
                tracing::warn!(reason = %reason, status = output.status, "mount failed");
                return Err(InstallError::MountFailed {
                    message: reason,
                    exit_code: output.status,
                    stderr: non_empty(output.stderr),
                    fix: "Open the disk image yourself and drag the application into Applications"
                        .to_string(),
                });
            }
        };
        tracing::info!(mount_point = %mount_point.display(), "disk image mounted");
        job.set_mount_point(mount_point.clone());

        job.transition(JobState::Discovering);
        feedback.stage(InstallStage::Discovering, InstallStage::Discovering.description());
        let bundle = self.choose_bundle(job, &mount_point).await?;
        let target = self.options.destination.join(&bundle.name);

        if tokio::fs::symlink_metadata(&target).await.is_ok() {
            job.transition(JobState::AwaitingConfirmation);
            let (installed_version, incoming_version) = versions(&target, &bundle.path).await;
            let prompt = ReplacePrompt {
                bundle_name: bundle.name.clone(),
                existing_path: target.clone(),
                installed_version,
                incoming_version,
            };
            let decision = self.collaborators.gate.ask_replace_or_skip(&prompt).await;
            tracing::info!(bundle = %bundle.name, decision = %decision, "existing installation");
            match decision {
                ReplaceDecision::Skip => {
                    return Ok(Completion::Skipped {
                        bundle: bundle.name,
                        path: target,
                    })
                }
                ReplaceDecision::Replace => self.remove_existing(&target, &bundle.name).await?,
            }
        }

        job.transition(JobState::Validating);
        feedback.stage(InstallStage::Validating, InstallStage::Validating.description());
        self.validate(&bundle).await?;

        job.transition(JobState::Copying);
        let stage = InstallStage::Copying;
        feedback.stage(stage, &format!("Installing {}", bundle.name));
        with_fallback_messages(
            self.copy(&bundle, &target),
            &self.options.fallback_delays,
            stage.fallback_messages(),
            feedback,
        )
        .await?;
        tracing::info!(bundle = %bundle.name, to = %target.display(), "bundle copied");
        self.clear_quarantine(&target).await;

        job.transition(JobState::PostProcessing);
        feedback.stage(InstallStage::Finalizing, InstallStage::Finalizing.description());
        if prefs.reveal_after_install {
            self.collaborators.workspace.reveal(&target);
        }

        Ok(Completion::Installed {
            bundle: bundle.name,
            path: target,
        })
    }

    async fn choose_bundle(
        &self,
        job: &mut DiskImageJob,
        mount_point: &Path,
    ) -> Result<BundleCandidate, InstallError> {
        let (volume, suffix) = (mount_point.to_path_buf(), self.options.bundle_suffix.clone());
        let candidates = tokio::task::spawn_blocking(move || discover(&volume, &suffix))
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "could not list volume");
                Vec::new()
            });
        job.set_candidates(candidates.iter().map(|c| c.path.clone()).collect());

        match select_bundle(&candidates) {
            Some(bundle) => {
                tracing::debug!(bundle = %bundle.name, found = candidates.len(), "bundle selected");
                job.select(bundle.path.clone());
                Ok(bundle)
            }
            None => {
                let fix = if candidates.is_empty() {
                    "The disk image holds no application; \
                     open it and follow the instructions inside"
                } else {
                    "Open the disk image and drag the application you want into Applications"
                };
                Err(InstallError::DiscoveryAmbiguous {
                    candidates: candidates.into_iter().map(|c| c.name).collect(),
                    fix: fix.to_string(),
                })
            }
        }
    }

    async fn validate(&self, bundle: &BundleCandidate) -> Result<(), InstallError> {
        let probe = self.collaborators.probe.clone();
        let destination = self.options.destination.clone();
        let path = bundle.path.clone();
        let measured = tokio::task::spawn_blocking(move || {
            probe.validate_directory(&destination)?;
            Ok::<_, ValidationError>((bundle_size(&path), probe.available_space(&destination)))
        })
        .await;

        let (size, available) = match measured {
            Ok(checked) => checked?,
            Err(e) => {
                return Err(ValidationError::Unchecked {
                    path: self.options.destination.clone(),
                    reason: e.to_string(),
                }
                .into())
            }
        };
        if !space_covers(size, available, self.options.safety_margin) {
            return Err(ValidationError::InsufficientSpace {
                required: size.saturating_add(self.options.safety_margin),
                available: available.unwrap_or(0),
            }
            .into());
        }
        Ok(())
    }

    async fn copy(&self, bundle: &BundleCandidate, target: &Path) -> Result<(), InstallError> {
        let failed = |message: String| InstallError::CopyFailed {
            bundle: bundle.name.clone(),
            message,
            fix: format!(
                "Check space and permissions in {}; remove any partial copy before retrying",
                self.options.destination.display()
            ),
        };

        if let Some(ditto) = &self.options.tools.ditto {
            let args = vec![bundle.path.as_os_str().to_owned(), target.as_os_str().to_owned()];
            let output = self.collaborators.runner.run(ditto, &args).await;
            if !output.success() {
                return Err(failed(format!(
                    "ditto exited with status {}: {}",
                    output.status,
                    output.stderr.trim()
                )));
            }
            return Ok(());
        }

        let (source, destination) = (bundle.path.clone(), target.to_path_buf());
        match tokio::task::spawn_blocking(move || copy_bundle(&source, &destination)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(failed(e.to_string())),
            Err(e) => Err(failed(e.to_string())),
        }
    }

    async fn clear_quarantine(&self, target: &Path) {
        let args = clear_attribute_args(&self.options.quarantine_attribute, target);
        let output = self.collaborators.runner.run(&self.options.tools.xattr, &args).await;
        if !output.success() {
            tracing::warn!(
                path = %target.display(),
                status = output.status,
                stderr = %output.stderr.trim(),
                "could not clear quarantine attribute"
            );
        }
    }

    /// Detach, retrying once if busy, then force. Only the forced detach
    /// failing is reported.
    async fn unmount(&self, mount_point: &Path) -> Result<(), InstallError> {
        let tool = self.disk_image_tool();

        let mut output = tool.detach(mount_point, false).await;
        if output.success() {
            tracing::info!(mount_point = %mount_point.display(), "volume detached");
            return Ok(());
        }

        if is_resource_busy(&output) {
            tracing::debug!(mount_point = %mount_point.display(), "volume busy, retrying detach");
            tokio::time::sleep(self.options.busy_retry_delay).await;
            output = tool.detach(mount_point, false).await;
            if output.success() {
                tracing::info!(mount_point = %mount_point.display(), "volume detached on retry");
                return Ok(());
            }
        }

        tracing::warn!(
            mount_point = %mount_point.display(),
            stderr = %output.stderr.trim(),
            "detach failed, forcing"
        );
        let forced = tool.detach(mount_point, true).await;
        if forced.success() {
            return Ok(());
        }
        Err(InstallError::UnmountFailed {
            mount_point: mount_point.to_path_buf(),
            stderr: non_empty(forced.stderr),
            fix: "Eject the volume in Finder once nothing is using it".to_string(),
        })
    }

    async fn remove_existing(&self, target: &Path, bundle: &str) -> Result<(), InstallError> {
        let workspace = self.collaborators.workspace.clone();
        let path = target.to_path_buf();
        let removed = match tokio::task::spawn_blocking(move || workspace.remove(&path)).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        removed.map_err(|message| InstallError::RemovalFailed {
            path: target.to_path_buf(),
            message,
            fix: format!("Quit {} if it is running and try again", bundle_stem(bundle)),
        })?;
        tracing::info!(path = %target.display(), "removed existing installation");
        Ok(())
    }

    fn disk_image_tool(&self) -> DiskImageTool<'_> {
        DiskImageTool::new(
            self.collaborators.runner.as_ref(),
            &self.options.tools.hdiutil,
            &self.options.volume_prefix,
        )
    }

    fn announce(&self, outcome: &Outcome, feedback: &Feedback) {
        match outcome {
            Outcome::Success { bundle, path, skipped } => {
                let name = bundle_stem(bundle);
                if *skipped {
                    tracing::info!(bundle = %bundle, "kept existing installation");
                    feedback.finish(
                        &format!("{} was not changed", name),
                        "The existing installation was kept",
                    );
                } else {
                    tracing::info!(
                        bundle = %bundle,
                        path = %path.display(),
                        "installation succeeded"
                    );
                    feedback.stage(InstallStage::Completed, InstallStage::Completed.description());
                    feedback.finish(
                        &format!("Installed {}", name),
                        &format!("{} is ready in {}", name, self.options.destination.display()),
                    );
                }
            }
            Outcome::ManualFallback { reason, fix } => {
                tracing::info!(reason = %reason, "handing installation back to the user");
                feedback.finish("Manual installation needed", &format!("{}. {}", reason, fix));
            }
            Outcome::Error { message, fix } => {
                tracing::error!(message = %message, "installation failed");
                feedback.finish("Installation failed", &format!("{}. {}", message, fix));
            }
        }
    }
}

async fn versions(installed: &Path, incoming: &Path) -> (Option<Version>, Option<Version>) {
    let (installed, incoming) = (installed.to_path_buf(), incoming.to_path_buf());
    tokio::task::spawn_blocking(move || (bundle_version(&installed), bundle_version(&incoming)))
        .await
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, "could not read bundle versions");
            (None, None)
        })
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn bundle_stem(bundle: &str) -> &str {
    Path::new(bundle)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(bundle)
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CommandOutput;
    use futures::future::BoxFuture;
    use std::ffi::OsString;
    use std::sync::Mutex;

    /// Answers detach calls from a script, everything else with success.
    struct DetachScript {
        detach: Mutex<Vec<CommandOutput>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ProcessRunner for DetachScript {
        fn run<'a>(
            &'a self,
            _program: &'a Path,
            args: &'a [OsString],
        ) -> BoxFuture<'a, CommandOutput> {
            let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().into_owned()).collect();
            let output = if args.first().map(String::as_str) == Some("detach") {
                let mut script = self.detach.lock().unwrap();
                if script.is_empty() {
                    CommandOutput::new(0, "", "")
                } else {
                    script.remove(0)
                }
            } else {
                CommandOutput::new(0, "", "")
            };
            self.calls.lock().unwrap().push(args);
            Box::pin(async move { output })
        }
    }

    fn orchestrator(script: Vec<CommandOutput>) -> (Arc<DetachScript>, Orchestrator) {
        let runner = Arc::new(DetachScript {
            detach: Mutex::new(script),
            calls: Mutex::new(Vec::new()),
        });
        let collaborators = Collaborators {
            runner: runner.clone(),
            ..Default::default()
        };
        (runner, Orchestrator::new(InstallerOptions::default(), collaborators))
    }

    fn detach_calls(runner: &DetachScript) -> Vec<Vec<String>> {
        runner.calls.lock().unwrap().clone()
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_first_try() {
        let (runner, orch) = orchestrator(vec![]);
        assert!(orch.unmount(Path::new("/Volumes/A")).await.is_ok());
        assert_eq!(detach_calls(&runner), vec![vec!["detach", "/Volumes/A"]]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_busy_retries_once() {
        let stderr = "hdiutil: couldn't unmount \"disk4\" - Resource busy";
        let busy = CommandOutput::new(16, "", stderr);
        let (runner, orch) = orchestrator(vec![busy]);
        let start = tokio::time::Instant::now();
        assert!(orch.unmount(Path::new("/Volumes/A")).await.is_ok());
        assert!(start.elapsed() >= orch.options.busy_retry_delay);
        assert_eq!(
            detach_calls(&runner),
            vec![vec!["detach", "/Volumes/A"], vec!["detach", "/Volumes/A"]]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_busy_twice_forces() {
        let busy = CommandOutput::new(16, "", "Resource busy");
        let (runner, orch) = orchestrator(vec![busy.clone(), busy]);
        assert!(orch.unmount(Path::new("/Volumes/A")).await.is_ok());
        let calls = detach_calls(&runner);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[2], vec!["detach", "/Volumes/A", "-force"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_other_failure_forces_without_retry() {
        let (runner, orch) = orchestrator(vec![CommandOutput::new(1, "", "no such volume")]);
        assert!(orch.unmount(Path::new("/Volumes/A")).await.is_ok());
        let calls = detach_calls(&runner);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], vec!["detach", "/Volumes/A", "-force"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_force_failure_reported() {
        let fail = CommandOutput::new(1, "", "still mounted");
        let (_, orch) = orchestrator(vec![fail.clone(), fail]);
        match orch.unmount(Path::new("/Volumes/A")).await {
            Err(InstallError::UnmountFailed { stderr, .. }) => {
                assert_eq!(stderr.as_deref(), Some("still mounted"))
            }
            other => panic!("expected UnmountFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_active_job_slot() {
        let flag = AtomicBool::new(false);
        let first = ActiveJob::claim(&flag);
        assert!(first.is_some());
        assert!(ActiveJob::claim(&flag).is_none());
        drop(first);
        assert!(ActiveJob::claim(&flag).is_some());
    }

    #[test]
    fn test_bundle_stem() {
        assert_eq!(bundle_stem("MyApp.app"), "MyApp");
        assert_eq!(bundle_stem("My.Fancy App.app"), "My.Fancy App");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty("  \n".to_string()), None);
        assert_eq!(non_empty(" busy\n".to_string()), Some("busy".to_string()));
    }
}
