//! Pre-copy checks on the destination.

use crate::ValidationError;
use std::path::Path;
use walkdir::WalkDir;

/// Filesystem queries the orchestrator makes about the destination.
pub trait DestinationProbe: Send + Sync {
    /// See [`validate_destination_directory`].
    fn validate_directory(&self, destination: &Path) -> Result<(), ValidationError>;

    /// See [`available_space`].
    fn available_space(&self, destination: &Path) -> Option<u64>;
}

/// [`DestinationProbe`] that asks the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProbe;

impl DestinationProbe for SystemProbe {
    fn validate_directory(&self, destination: &Path) -> Result<(), ValidationError> {
        validate_destination_directory(destination)
    }

    fn available_space(&self, destination: &Path) -> Option<u64> {
        available_space(destination)
    }
}

/// Check that `destination` exists as a writable directory.
pub fn validate_destination_directory(destination: &Path) -> Result<(), ValidationError> {
    let metadata = std::fs::metadata(destination).map_err(|_| ValidationError::Missing {
        path: destination.to_path_buf(),
    })?;
    if !metadata.is_dir() {
        return Err(ValidationError::NotADirectory {
            path: destination.to_path_buf(),
        });
    }
    if !is_writable(destination) {
        return Err(ValidationError::NotWritable {
            path: destination.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    rustix::fs::access(path, rustix::fs::Access::WRITE_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path)
        .map(|m| !m.permissions().readonly())
        .unwrap_or(false)
}

/// Total size in bytes of every regular file under `path`.
///
/// Symbolic links are not followed; unreadable entries are skipped.
pub fn bundle_size(path: &Path) -> u64 {
    WalkDir::new(path)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|m| m.len())
        .sum()
}

/// Free bytes available to unprivileged users on the volume holding `path`.
#[cfg(unix)]
pub fn available_space(path: &Path) -> Option<u64> {
    match rustix::fs::statvfs(path) {
        Ok(stat) => Some(stat.f_bavail.saturating_mul(stat.f_frsize)),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "statvfs failed");
            None
        }
    }
}

#[cfg(not(unix))]
pub fn available_space(_path: &Path) -> Option<u64> {
    None
}

/// Whether the volume holding `destination` has room for `required` bytes plus `margin`.
///
/// If free space cannot be determined the answer is `true`; see [`space_covers`].
pub fn has_sufficient_space(required: u64, destination: &Path, margin: u64) -> bool {
    space_covers(required, available_space(destination), margin)
}

/// Whether `available` bytes cover `required` plus `margin`.
///
/// Fails open: an unknown free-space figure counts as sufficient.
pub fn space_covers(required: u64, available: Option<u64>, margin: u64) -> bool {
    match available {
        Some(available) => available >= required.saturating_add(margin),
        None => {
            tracing::warn!("free space unknown, assuming it is sufficient");
            true
        }
    }
}
