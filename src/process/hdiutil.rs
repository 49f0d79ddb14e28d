//! Disk image attach and detach.

use super::{CommandOutput, ProcessRunner};
use regex::Regex;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Words in attach output that mark a failed mount even on exit status zero.
const FAILURE_KEYWORDS: &[&str] = &["error", "failed", "invalid"];

/// Outcome of attaching a disk image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MountResult {
    /// The image is attached at this mount point.
    Mounted(PathBuf),
    /// The image could not be attached.
    Failed {
        /// Why the attach was rejected.
        reason: String,
        /// What the attach tool reported.
        output: CommandOutput,
    },
}

/// Drives the disk image tool through a [`ProcessRunner`].
pub struct DiskImageTool<'a> {
    runner: &'a dyn ProcessRunner,
    hdiutil: &'a Path,
    volume_prefix: &'a str,
}

impl<'a> DiskImageTool<'a> {
    /// Create a driver for the tool at `hdiutil`, expecting mount points under `volume_prefix`.
    pub fn new(runner: &'a dyn ProcessRunner, hdiutil: &'a Path, volume_prefix: &'a str) -> Self {
        Self {
            runner,
            hdiutil,
            volume_prefix,
        }
    }

    /// Attach `image` read-only without browsing or auto-opening it.
    ///
    /// There is no retry: a failed attach is reported as is.
    pub async fn attach(&self, image: &Path) -> MountResult {
        let args = vec![
            OsString::from("attach"),
            image.as_os_str().to_owned(),
            OsString::from("-nobrowse"),
            OsString::from("-readonly"),
            OsString::from("-noautoopen"),
        ];
        let output = self.runner.run(self.hdiutil, &args).await;

        if !output.success() {
            return MountResult::Failed {
                reason: format!("attach exited with status {}", output.status),
                output,
            };
        }
        if let Some(word) = failure_keyword(&output) {
            return MountResult::Failed {
                reason: format!("attach output mentions \"{}\"", word),
                output,
            };
        }
        match parse_mount_point(&output.stdout, self.volume_prefix) {
            Some(mount_point) => MountResult::Mounted(mount_point),
            None => MountResult::Failed {
                reason: "no mount point in attach output".to_string(),
                output,
            },
        }
    }

    /// Detach the volume at `mount_point`, optionally by force.
    pub async fn detach(&self, mount_point: &Path, force: bool) -> CommandOutput {
        let mut args = vec![OsString::from("detach"), mount_point.as_os_str().to_owned()];
        if force {
            args.push(OsString::from("-force"));
        }
        self.runner.run(self.hdiutil, &args).await
    }
}

/// Arguments that recursively delete `attribute` from everything under `path`.
pub(crate) fn clear_attribute_args(attribute: &str, path: &Path) -> Vec<OsString> {
    vec![
        OsString::from("-r"),
        OsString::from("-d"),
        OsString::from(attribute),
        path.as_os_str().to_owned(),
    ]
}

/// Whether a failed detach was refused because the volume is in use.
pub(crate) fn is_resource_busy(output: &CommandOutput) -> bool {
    output.stderr.to_lowercase().contains("resource busy")
}

fn failure_keyword(output: &CommandOutput) -> Option<&'static str> {
    let text = format!("{}\n{}", output.stdout, output.stderr).to_lowercase();
    FAILURE_KEYWORDS.iter().copied().find(|word| text.contains(word))
}

/// Extract the first path starting with `prefix`, cut at the next tab or newline.
fn parse_mount_point(stdout: &str, prefix: &str) -> Option<PathBuf> {
    let re = Regex::new(&format!(r"{}[^\t\r\n]*", regex::escape(prefix))).ok()?;
    let found = re.find(stdout)?.as_str().trim_end();
    if found.len() <= prefix.len() {
        return None;
    }
    Some(PathBuf::from(found))
}
