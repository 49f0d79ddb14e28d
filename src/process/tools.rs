//! Locating the command line tools the installer drives.

use std::path::PathBuf;

/// System locations checked when a tool is not on PATH.
const FALLBACK_PATHS: &[&str] = &["/usr/bin", "/usr/sbin", "/bin"];

/// Paths of the external tools used by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    /// Disk image attach/detach tool.
    pub hdiutil: PathBuf,
    /// Extended attribute tool.
    pub xattr: PathBuf,
    /// Attribute-preserving copy tool. When absent the bundle is copied natively.
    pub ditto: Option<PathBuf>,
}

/// Find a tool by name.
///
/// Looks the name up on PATH via the `which` crate, then in fixed system
/// directories. If neither has it the bare name is returned, so spawning
/// it later fails with a reportable status rather than here.
pub fn find_tool(name: &str) -> PathBuf {
    if let Ok(path) = which::which(name) {
        return path;
    }

    for dir in FALLBACK_PATHS {
        let path = PathBuf::from(dir).join(name);
        if path.exists() {
            return path;
        }
    }

    PathBuf::from(name)
}
