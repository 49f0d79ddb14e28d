//! File browser and trash integration.

use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// The desktop's file handling, as far as the installer needs it.
pub trait Workspace: Send + Sync {
    /// Show `path` in the file browser. Fire-and-forget.
    fn reveal(&self, path: &Path);

    /// Open `path` with its default handler. Fire-and-forget.
    fn open(&self, path: &Path);

    /// Move `path` to the trash and return where it ended up.
    fn trash(&self, path: &Path) -> io::Result<PathBuf>;

    /// Delete `path` for good. Directories go with everything inside them;
    /// symbolic links are removed, not followed.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`Workspace`] backed by `open` and the user's `~/.Trash`.
#[derive(Debug, Clone, Default)]
pub struct SystemWorkspace {
    trash_dir: Option<PathBuf>,
}

impl SystemWorkspace {
    /// Use `dir` instead of `~/.Trash`.
    pub fn with_trash_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            trash_dir: Some(dir.into()),
        }
    }

    fn trash_dir(&self) -> io::Result<PathBuf> {
        if let Some(dir) = &self.trash_dir {
            return Ok(dir.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".Trash"))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no home directory"))
    }

    fn spawn_open(args: &[&OsStr]) {
        let result = Command::new("open")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to launch open");
        }
    }
}

impl Workspace for SystemWorkspace {
    fn reveal(&self, path: &Path) {
        Self::spawn_open(&[OsStr::new("-R"), path.as_os_str()]);
    }

    fn open(&self, path: &Path) {
        Self::spawn_open(&[path.as_os_str()]);
    }

    fn trash(&self, path: &Path) -> io::Result<PathBuf> {
        let dir = self.trash_dir()?;
        let target = unique_target(&dir, path)?;
        std::fs::rename(path, &target)?;
        Ok(target)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        if std::fs::symlink_metadata(path)?.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        }
    }
}

/// Pick a name in `dir` for `path` that does not exist yet: `X.dmg`, `X 2.dmg`, ...
fn unique_target(dir: &Path, path: &Path) -> io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let first = dir.join(name);
    if std::fs::symlink_metadata(&first).is_err() {
        return Ok(first);
    }

    let stem = path.file_stem().unwrap_or(name).to_string_lossy();
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    (2..10_000)
        .map(|n| dir.join(format!("{} {}{}", stem, n, ext)))
        .find(|candidate| std::fs::symlink_metadata(candidate).is_err())
        .ok_or_else(|| io::Error::new(io::ErrorKind::AlreadyExists, "trash is full of copies"))
}
