//! Error types for disk image installation.
//!
//! Every fatal condition the pipeline can hit is an [`InstallError`] variant
//! carrying an actionable `fix` suggestion. Destination problems found before
//! copying are reported through the nested [`ValidationError`].

use std::path::PathBuf;
use thiserror::Error;

/// Reasons the destination directory cannot accept the bundle.
///
/// Each failing check of [`validate_destination_directory`] and the free
/// space check yields its own kind, so callers can tell them apart.
///
/// [`validate_destination_directory`]: crate::validate_destination_directory
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// The destination directory does not exist.
    #[error("Destination does not exist: {path}")]
    Missing {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The destination exists but is a file, not a directory.
    #[error("Destination is not a directory: {path}")]
    NotADirectory {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The destination directory cannot be written to.
    #[error("Destination is not writable: {path}")]
    NotWritable {
        /// Path that was checked.
        path: PathBuf,
    },

    /// The destination volume lacks room for the bundle plus safety margin.
    #[error("Not enough free space: {required} bytes required, {available} bytes available")]
    InsufficientSpace {
        /// Bundle size plus safety margin.
        required: u64,
        /// Free bytes reported for the destination volume.
        available: u64,
    },

    /// The checks themselves could not run to completion.
    #[error("Destination could not be checked: {path} ({reason})")]
    Unchecked {
        /// Path that was checked.
        path: PathBuf,
        /// Why the checks stopped.
        reason: String,
    },
}

impl ValidationError {
    /// Get an actionable suggestion for fixing this validation failure.
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::Missing { path } => {
                format!("Create {} or choose another destination", path.display())
            }
            Self::NotADirectory { path } => {
                format!("Remove the file at {} so the directory can be used", path.display())
            }
            Self::NotWritable { path } => {
                format!(
                    "Grant write access to {} or run with sufficient privileges",
                    path.display()
                )
            }
            Self::InsufficientSpace { required, available } => format!(
                "Free at least {} MiB on the destination volume",
                required.saturating_sub(*available) / (1024 * 1024) + 1
            ),
            Self::Unchecked { path, .. } => {
                format!("Make sure {} is reachable and try again", path.display())
            }
        }
    }
}

/// Errors that can end an installation job.
///
/// Mount and discovery problems route the job to manual fallback (the user
/// finishes by hand); everything else is a hard error.
///
/// # Example
///
/// ```rust
/// use dmg_installer::InstallError;
///
/// let error = InstallError::DiscoveryAmbiguous {
///     candidates: vec!["A.app".into(), "B.app".into()],
///     fix: "Drag the application you want into Applications".to_string(),
/// };
/// assert!(error.is_manual_fallback());
/// assert!(error.fix_suggestion().contains("Applications"));
/// ```
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InstallError {
    /// Another job is already running; submissions are not queued.
    #[error("An installation is already in progress")]
    JobAlreadyActive {
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The attach tool failed, printed suspicious output, or gave no mount point.
    #[error("Failed to mount disk image: {message}")]
    MountFailed {
        /// Description of the failure.
        message: String,
        /// Exit code from the attach tool.
        exit_code: i32,
        /// Standard error from the attach tool, if any.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// Zero candidates, or several that filtering could not narrow down.
    #[error("Could not determine which application to install ({} candidates)", candidates.len())]
    DiscoveryAmbiguous {
        /// Bundle names found on the volume.
        candidates: Vec<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The destination failed validation.
    #[error("Destination check failed: {0}")]
    Validation(#[from] ValidationError),

    /// Duplicating the bundle failed. A partial copy may remain.
    #[error("Failed to copy {bundle}: {message}")]
    CopyFailed {
        /// Name of the bundle being copied.
        bundle: String,
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// An existing installation could not be removed before replacing it.
    #[error("Failed to remove existing {path}: {message}")]
    RemovalFailed {
        /// The installation that could not be removed.
        path: PathBuf,
        /// Description of the failure.
        message: String,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },

    /// The volume could not be detached, even by force.
    ///
    /// The orchestrator only logs this; it never fails a job.
    #[error("Failed to unmount {mount_point}")]
    UnmountFailed {
        /// The volume that stayed mounted.
        mount_point: PathBuf,
        /// Standard error from the last detach attempt.
        stderr: Option<String>,
        /// Actionable suggestion for resolving the issue.
        fix: String,
    },
}

impl InstallError {
    /// Get an actionable suggestion for fixing this error.
    pub fn fix_suggestion(&self) -> String {
        match self {
            Self::JobAlreadyActive { fix } => fix.clone(),
            Self::MountFailed { fix, .. } => fix.clone(),
            Self::DiscoveryAmbiguous { fix, .. } => fix.clone(),
            Self::Validation(e) => e.fix_suggestion(),
            Self::CopyFailed { fix, .. } => fix.clone(),
            Self::RemovalFailed { fix, .. } => fix.clone(),
            Self::UnmountFailed { fix, .. } => fix.clone(),
        }
    }

    /// Whether this error hands the job back to the user instead of failing it.
    pub fn is_manual_fallback(&self) -> bool {
        matches!(self, Self::MountFailed { .. } | Self::DiscoveryAmbiguous { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::NotWritable {
            path: PathBuf::from("/Applications"),
        };
        assert_eq!(error.to_string(), "Destination is not writable: /Applications");
    }

    #[test]
    fn test_insufficient_space_fix_rounds_up() {
        let error = ValidationError::InsufficientSpace {
            required: 10 * 1024 * 1024,
            available: 9 * 1024 * 1024 + 1,
        };
        assert_eq!(
            error.fix_suggestion(),
            "Free at least 1 MiB on the destination volume"
        );
    }

    #[test]
    fn test_unchecked_destination_fix_names_path() {
        let error = ValidationError::Unchecked {
            path: PathBuf::from("/Volumes/Apps"),
            reason: "task panicked".to_string(),
        };
        assert!(error.to_string().contains("task panicked"));
        assert!(error.fix_suggestion().contains("/Volumes/Apps"));
    }

    #[test]
    fn test_validation_converts_into_install_error() {
        let error: InstallError = ValidationError::Missing {
            path: PathBuf::from("/nowhere"),
        }
        .into();
        assert!(matches!(error, InstallError::Validation(ValidationError::Missing { .. })));
        assert!(error.to_string().starts_with("Destination check failed"));
        assert!(error.fix_suggestion().contains("/nowhere"));
    }

    #[test]
    fn test_manual_fallback_classification() {
        let mount = InstallError::MountFailed {
            message: "exit 1".to_string(),
            exit_code: 1,
            stderr: None,
            fix: "Open the image in Finder".to_string(),
        };
        assert!(mount.is_manual_fallback());

        let copy = InstallError::CopyFailed {
            bundle: "MyApp.app".to_string(),
            message: "disk full".to_string(),
            fix: "Free space".to_string(),
        };
        assert!(!copy.is_manual_fallback());

        let removal = InstallError::RemovalFailed {
            path: PathBuf::from("/Applications/MyApp.app"),
            message: "busy".to_string(),
            fix: "Quit MyApp".to_string(),
        };
        assert!(!removal.is_manual_fallback());
    }

    #[test]
    fn test_discovery_ambiguous_display_counts_candidates() {
        let error = InstallError::DiscoveryAmbiguous {
            candidates: vec!["A.app".to_string(), "B.app".to_string()],
            fix: "Pick one by hand".to_string(),
        };
        assert!(error.to_string().contains("2 candidates"));
    }

    #[test]
    fn test_all_variants_have_fix() {
        let errors = vec![
            InstallError::JobAlreadyActive {
                fix: "Wait for the current installation".to_string(),
            },
            InstallError::MountFailed {
                message: "corrupt".to_string(),
                exit_code: 1,
                stderr: Some("hdiutil: attach failed".to_string()),
                fix: "Re-download the image".to_string(),
            },
            InstallError::DiscoveryAmbiguous {
                candidates: vec![],
                fix: "Install manually".to_string(),
            },
            InstallError::Validation(ValidationError::NotADirectory {
                path: PathBuf::from("/Applications"),
            }),
            InstallError::CopyFailed {
                bundle: "MyApp.app".to_string(),
                message: "io".to_string(),
                fix: "Retry".to_string(),
            },
            InstallError::RemovalFailed {
                path: PathBuf::from("/Applications/MyApp.app"),
                message: "io".to_string(),
                fix: "Quit the app".to_string(),
            },
            InstallError::UnmountFailed {
                mount_point: PathBuf::from("/Volumes/MyApp"),
                stderr: None,
                fix: "Eject in Finder".to_string(),
            },
        ];

        for error in errors {
            assert!(
                !error.fix_suggestion().is_empty(),
                "fix_suggestion() should return non-empty string for {:?}",
                error
            );
        }
    }
}
