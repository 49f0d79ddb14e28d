//! Installer configuration.
//!
//! This module provides the [`InstallerOptions`] struct for configuring the
//! installation pipeline: where bundles go, how much headroom to keep, and
//! when "still working" messages appear during slow steps.

use crate::process::{find_tool, ToolPaths};
use std::path::PathBuf;
use std::time::Duration;

/// Default extra space required on the destination volume beyond the bundle size.
pub const DEFAULT_SAFETY_MARGIN: u64 = 500 * 1024 * 1024;

/// Configuration options for the installation pipeline.
///
/// # Default Behavior
///
/// Bundles ending in `.app` found on a volume mounted under `/Volumes/` are
/// installed into `/Applications`, keeping 500 MiB of headroom. Fallback
/// messages appear after 4, 8 and 12 seconds of a slow step, and a busy
/// volume is retried once after 250 ms.
///
/// # Example
///
/// ```rust
/// use dmg_installer::InstallerOptions;
/// use std::path::PathBuf;
///
/// let opts = InstallerOptions {
///     destination: PathBuf::from("/tmp/apps"),
///     ..Default::default()
/// };
/// assert_eq!(opts.bundle_suffix, ".app");
/// ```
#[derive(Debug, Clone)]
pub struct InstallerOptions {
    /// Directory the selected bundle is copied into.
    ///
    /// Default: `/Applications`
    pub destination: PathBuf,

    /// Suffix identifying an installable bundle.
    ///
    /// Default: `.app`
    pub bundle_suffix: String,

    /// Prefix every mount point printed by the attach tool starts with.
    ///
    /// Default: `/Volumes/`
    pub volume_prefix: String,

    /// Bytes kept free on the destination volume on top of the bundle size.
    ///
    /// Default: 500 MiB
    pub safety_margin: u64,

    /// Delays after which progressively different "still working"
    /// messages are shown for mount, copy and unmount.
    ///
    /// Default: 4 s, 8 s, 12 s
    pub fallback_delays: Vec<Duration>,

    /// Wait before retrying a detach that failed because the volume was busy.
    ///
    /// Default: 250 ms
    pub busy_retry_delay: Duration,

    /// Extended attribute cleared from the installed bundle.
    ///
    /// Default: `com.apple.quarantine`
    pub quarantine_attribute: String,

    /// External tools used by the pipeline.
    pub tools: ToolPaths,
}

impl Default for InstallerOptions {
    fn default() -> Self {
        Self {
            destination: PathBuf::from("/Applications"),
            bundle_suffix: ".app".to_string(),
            volume_prefix: "/Volumes/".to_string(),
            safety_margin: DEFAULT_SAFETY_MARGIN,
            fallback_delays: vec![
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(12),
            ],
            busy_retry_delay: Duration::from_millis(250),
            quarantine_attribute: "com.apple.quarantine".to_string(),
            tools: ToolPaths {
                hdiutil: find_tool("hdiutil"),
                xattr: find_tool("xattr"),
                ditto: which::which("ditto").ok(),
            },
        }
    }
}
