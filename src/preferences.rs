//! User preferences read by the installer.
//!
//! Preferences are owned by the presentation layer. The orchestrator reads
//! them once at the start of each job through [`PreferencesSource`] and
//! never writes them back.

use serde::{Deserialize, Serialize};

/// How a job reports its progress to the user.
///
/// Parses from `"progress"`, `"notification"` or `"silent"`:
///
/// ```rust
/// use dmg_installer::FeedbackMode;
/// use std::str::FromStr;
///
/// assert_eq!(FeedbackMode::from_str("silent").unwrap(), FeedbackMode::Silent);
/// assert_eq!(FeedbackMode::Notification.to_string(), "notification");
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FeedbackMode {
    /// Show a progress display with stage messages and a fraction.
    #[default]
    Progress,
    /// Post a system notification when the job ends.
    Notification,
    /// Report nothing.
    Silent,
}

/// Snapshot of the preferences that affect one job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
    /// How progress is reported.
    pub feedback_mode: FeedbackMode,
    /// Move the source image to the trash after a successful install.
    pub auto_trash: bool,
    /// Reveal the installed bundle in the file browser afterwards.
    pub reveal_after_install: bool,
}

/// Read-only access to user preferences.
pub trait PreferencesSource: Send + Sync {
    /// Feedback mode for the next job.
    fn feedback_mode(&self) -> FeedbackMode;

    /// Whether the source image is trashed after success.
    fn auto_trash(&self) -> bool;

    /// Whether the installed bundle is revealed after success.
    fn reveal_after_install(&self) -> bool;

    /// Take a snapshot that stays fixed for the lifetime of one job.
    fn snapshot(&self) -> Preferences {
        Preferences {
            feedback_mode: self.feedback_mode(),
            auto_trash: self.auto_trash(),
            reveal_after_install: self.reveal_after_install(),
        }
    }
}

impl PreferencesSource for Preferences {
    fn feedback_mode(&self) -> FeedbackMode {
        self.feedback_mode
    }

    fn auto_trash(&self) -> bool {
        self.auto_trash
    }

    fn reveal_after_install(&self) -> bool {
        self.reveal_after_install
    }
}
