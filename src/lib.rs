//! # dmg-installer
//!
//! Installs the application bundle shipped inside a disk image: mounts the
//! image, finds the bundle, copies it into the applications directory and
//! cleans up. Whenever the image is ambiguous or broken the installer stops
//! and hands the job back to the user instead of guessing.
//!
//! ## Features
//!
//! - [`Orchestrator`] runs the whole pipeline, one job at a time
//! - [`discover`] and [`filter_helpers`] pick the bundle off a mounted volume
//! - [`validate_destination_directory`] and [`has_sufficient_space`] check the destination
//! - [`ProcessRunner`] is the seam every external tool call goes through
//! - [`ProgressReporter`], [`Notifier`], [`ConfirmationGate`] and [`Workspace`]
//!   connect the pipeline to whatever front end drives it
//!
//! ## Example
//!
//! ```rust,no_run
//! use dmg_installer::{
//!     AutoGate, Collaborators, FeedbackMode, InstallerOptions, Orchestrator, Preferences,
//!     ReplaceDecision,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let collaborators = Collaborators {
//!         gate: Arc::new(AutoGate(ReplaceDecision::Replace)),
//!         preferences: Arc::new(Preferences {
//!             feedback_mode: FeedbackMode::Silent,
//!             auto_trash: true,
//!             reveal_after_install: false,
//!         }),
//!         ..Default::default()
//!     };
//!     let orchestrator = Orchestrator::new(InstallerOptions::default(), collaborators);
//!
//!     let report = orchestrator.install("/Users/me/Downloads/MyApp.dmg").await.unwrap();
//!     println!("{:?}", report.outcome);
//! }
//! ```

mod bundle_info;
mod confirm;
mod copy;
mod discovery;
mod errors;
mod fallback;
mod job;
mod options;
mod orchestrator;
mod preferences;
mod process;
mod progress;
mod validation;
mod workspace;

pub use bundle_info::bundle_version;
pub use confirm::{
    AutoGate, ChannelGate, ConfirmationGate, PendingConfirmation, ReplaceDecision, ReplacePrompt,
};
pub use copy::copy_bundle;
pub use discovery::{discover, filter_helpers, select_bundle, BundleCandidate};
pub use errors::{InstallError, ValidationError};
pub use job::{JobReport, JobState, Outcome};
pub use options::{InstallerOptions, DEFAULT_SAFETY_MARGIN};
pub use orchestrator::{Collaborators, Orchestrator};
pub use preferences::{FeedbackMode, Preferences, PreferencesSource};
pub use process::{
    find_tool, CommandOutput, DiskImageTool, MountResult, ProcessRunner, SystemRunner, ToolPaths,
    SPAWN_FAILURE_STATUS,
};
pub use progress::{InstallStage, NoFeedback, Notifier, ProgressReporter};
pub use validation::{
    available_space, bundle_size, has_sufficient_space, space_covers,
    validate_destination_directory, DestinationProbe, SystemProbe,
};
pub use workspace::{SystemWorkspace, Workspace};
