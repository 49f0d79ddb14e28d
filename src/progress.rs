//! Progress reporting for installation jobs.
//!
//! The pipeline reports through [`InstallStage`] values. How they reach the
//! user depends on the job's [`FeedbackMode`]: a [`ProgressReporter`]
//! display, a [`Notifier`] message at the end, or nothing at all.

use crate::FeedbackMode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Stages of an installation job.
///
/// # Example
///
/// ```rust
/// use dmg_installer::InstallStage;
///
/// let stage = InstallStage::Copying;
/// assert_eq!(stage.description(), "Copying application");
/// assert!(stage.fraction() > InstallStage::Validating.fraction());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
pub enum InstallStage {
    /// Attaching the disk image.
    Mounting,
    /// Looking for the bundle on the volume.
    Discovering,
    /// Checking the destination.
    Validating,
    /// Copying the bundle.
    Copying,
    /// Clearing attributes and revealing the result.
    Finalizing,
    /// Detaching the volume.
    Unmounting,
    /// Trashing the source image.
    Cleanup,
    /// The job is done.
    Completed,
}

impl InstallStage {
    /// Human-readable description of the stage.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Mounting => "Opening disk image",
            Self::Discovering => "Looking for the application",
            Self::Validating => "Checking destination",
            Self::Copying => "Copying application",
            Self::Finalizing => "Finishing installation",
            Self::Unmounting => "Ejecting disk image",
            Self::Cleanup => "Cleaning up",
            Self::Completed => "Installation complete",
        }
    }

    /// Overall job progress when this stage starts, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        match self {
            Self::Mounting => 0.05,
            Self::Discovering => 0.2,
            Self::Validating => 0.3,
            Self::Copying => 0.4,
            Self::Finalizing => 0.85,
            Self::Unmounting => 0.9,
            Self::Cleanup => 0.95,
            Self::Completed => 1.0,
        }
    }

    /// Messages shown, in order, while a slow stage is still running.
    pub fn fallback_messages(&self) -> &'static [&'static str] {
        match self {
            Self::Mounting => &[
                "Still opening the disk image…",
                "Verifying the disk image, this can take a while for large images…",
                "Almost there, still waiting for the disk image…",
            ],
            Self::Copying => &[
                "Still copying…",
                "Large application, still copying…",
                "Almost done copying…",
            ],
            Self::Unmounting => &[
                "Still ejecting the disk image…",
                "Waiting for the volume to be released…",
                "Still trying to eject…",
            ],
            _ => &[],
        }
    }
}

/// Receives stage messages and a progress fraction for display.
pub trait ProgressReporter: Send + Sync {
    /// Make the display visible.
    fn show(&self, message: &str, fraction: f64);
    /// Change the message and fraction of a visible display.
    fn update(&self, message: &str, fraction: f64);
    /// Remove the display.
    fn hide(&self);
}

/// Delivers a one-off system notification. Fire-and-forget.
pub trait Notifier: Send + Sync {
    /// Post a notification.
    fn notify(&self, title: &str, message: &str);
}

/// Reporter and notifier that drop everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFeedback;

impl ProgressReporter for NoFeedback {
    fn show(&self, _message: &str, _fraction: f64) {}
    fn update(&self, _message: &str, _fraction: f64) {}
    fn hide(&self) {}
}

impl Notifier for NoFeedback {
    fn notify(&self, _title: &str, _message: &str) {}
}

#[derive(Debug, Default)]
struct DisplayState {
    shown: bool,
    fraction: f64,
}

/// Per-job feedback sink.
///
/// Routes messages according to the job's mode, keeps the fraction from
/// ever going backwards, and goes quiet once [`finish`](Self::finish) ran.
pub(crate) struct Feedback {
    mode: FeedbackMode,
    reporter: Arc<dyn ProgressReporter>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<DisplayState>,
    finished: AtomicBool,
}

impl Feedback {
    pub(crate) fn new(
        mode: FeedbackMode,
        reporter: Arc<dyn ProgressReporter>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            mode,
            reporter,
            notifier,
            state: Mutex::new(DisplayState::default()),
            finished: AtomicBool::new(false),
        }
    }

    /// Announce the start of `stage` with `message`.
    pub(crate) fn stage(&self, stage: InstallStage, message: &str) {
        self.display(message, Some(stage.fraction()));
    }

    /// Replace the message, keeping the current fraction.
    pub(crate) fn message(&self, message: &str) {
        self.display(message, None);
    }

    fn display(&self, message: &str, fraction: Option<f64>) {
        if self.mode != FeedbackMode::Progress || self.finished.load(Ordering::SeqCst) {
            return;
        }
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(f) = fraction {
            state.fraction = state.fraction.max(f.clamp(0.0, 1.0));
        }
        if state.shown {
            self.reporter.update(message, state.fraction);
        } else {
            state.shown = true;
            self.reporter.show(message, state.fraction);
        }
    }

    /// Close the display or post the closing notification. Later calls do nothing.
    pub(crate) fn finish(&self, title: &str, message: &str) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        match self.mode {
            FeedbackMode::Progress => {
                let shown = self.state.lock().map(|s| s.shown).unwrap_or(false);
                if shown {
                    self.reporter.hide();
                }
            }
            FeedbackMode::Notification => self.notifier.notify(title, message),
            FeedbackMode::Silent => {}
        }
    }
}
