//! Finding the installable bundle on a mounted volume.

use std::path::{Path, PathBuf};

/// Name fragments that mark a bundle as a helper rather than the application.
const HELPER_MARKERS: &[&str] = &["uninstall", "installer", "helper", "readme"];

/// Leading character of hidden entries.
const HIDDEN_MARKER: char = '.';

/// A top-level bundle found on a volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleCandidate {
    /// File name, e.g. `MyApp.app`.
    pub name: String,
    /// Full path on the mounted volume.
    pub path: PathBuf,
}

impl BundleCandidate {
    /// Build a candidate for `name` inside `dir`.
    pub fn new(dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: dir.join(&name),
            name,
        }
    }
}

/// List the bundles at the top level of `mount_point`.
///
/// Only entries whose name ends with `suffix` and does not start with a dot
/// are returned, sorted by name. Subdirectories are never searched. A
/// directory that cannot be read yields an empty list.
pub fn discover(mount_point: &Path, suffix: &str) -> Vec<BundleCandidate> {
    let entries = match std::fs::read_dir(mount_point) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(mount_point = %mount_point.display(), error = %e, "cannot read volume");
            return Vec::new();
        }
    };

    let mut candidates: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(suffix) && !name.starts_with(HIDDEN_MARKER))
        .map(|name| BundleCandidate::new(mount_point, name))
        .collect();
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    candidates
}

/// Drop uninstallers, helper tools and readme bundles.
pub fn filter_helpers(candidates: &[BundleCandidate]) -> Vec<BundleCandidate> {
    candidates
        .iter()
        .filter(|c| {
            let lower = c.name.to_lowercase();
            !HELPER_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .cloned()
        .collect()
}

/// Pick the bundle to install, or `None` when the choice is ambiguous.
///
/// A single survivor of [`filter_helpers`] wins. Otherwise the unfiltered
/// list decides: exactly one entry is used, zero or several are ambiguous.
pub fn select_bundle(candidates: &[BundleCandidate]) -> Option<BundleCandidate> {
    let filtered = filter_helpers(candidates);
    if filtered.len() == 1 {
        return filtered.into_iter().next();
    }
    match candidates {
        [only] => Some(only.clone()),
        _ => None,
    }
}
