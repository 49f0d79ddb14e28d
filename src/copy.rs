//! Structure-preserving recursive copy.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Copy the bundle at `source` to `destination`, which must not exist yet.
///
/// Directories, regular files and symbolic links are reproduced as they
/// are; anything else (sockets, FIFOs, devices) fails the copy. Links are
/// recreated with their original target and never followed. Permission bits
/// of every file and directory are carried over, as are file modification
/// times. Directory permissions are applied last so
/// read-only directories can still be filled.
pub fn copy_bundle(source: &Path, destination: &Path) -> io::Result<()> {
    let mut directories: Vec<(PathBuf, fs::Permissions)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = destination.join(relative);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            copy_symlink(entry.path(), &target)?;
        } else if file_type.is_dir() {
            fs::create_dir(&target)?;
            directories.push((target, entry.metadata().map_err(io::Error::from)?.permissions()));
        } else if file_type.is_file() {
            fs::copy(entry.path(), &target)?;
            keep_modified(&entry, &target);
        } else {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("cannot copy special file {}", entry.path().display()),
            ));
        }
    }

    for (dir, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&dir, permissions)?;
    }
    Ok(())
}

fn keep_modified(entry: &walkdir::DirEntry, target: &Path) {
    let modified = entry.metadata().ok().and_then(|m| m.modified().ok());
    let Some(modified) = modified else {
        return;
    };
    if let Err(e) = fs::File::open(target).and_then(|f| f.set_modified(modified)) {
        tracing::debug!(
            path = %target.display(),
            error = %e,
            "could not keep modification time"
        );
    }
}

#[cfg(unix)]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(link)?, target)
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, target: &Path) -> io::Result<()> {
    fs::copy(link, target).map(|_| ())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};
    use std::time::{Duration, UNIX_EPOCH};

    fn build_bundle(root: &Path) -> PathBuf {
        let bundle = root.join("MyApp.app");
        fs::create_dir_all(bundle.join("Contents/MacOS")).unwrap();
        fs::create_dir_all(bundle.join("Contents/Frameworks/Kit.framework/Versions/A")).unwrap();
        fs::write(bundle.join("Contents/Info.plist"), "<plist/>").unwrap();
        fs::write(bundle.join("Contents/MacOS/MyApp"), b"\x7fELF binary").unwrap();
        fs::set_permissions(
            bundle.join("Contents/MacOS/MyApp"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();
        fs::write(
            bundle.join("Contents/Frameworks/Kit.framework/Versions/A/Kit"),
            "kit",
        )
        .unwrap();
        symlink(
            "A",
            bundle.join("Contents/Frameworks/Kit.framework/Versions/Current"),
        )
        .unwrap();
        symlink(
            "Versions/Current/Kit",
            bundle.join("Contents/Frameworks/Kit.framework/Kit"),
        )
        .unwrap();
        bundle
    }

    #[test]
    fn test_copy_preserves_structure_and_bytes() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bundle = build_bundle(src.path());
        let target = dst.path().join("MyApp.app");

        copy_bundle(&bundle, &target).unwrap();

        assert_eq!(
            fs::read(target.join("Contents/MacOS/MyApp")).unwrap(),
            b"\x7fELF binary"
        );
        assert_eq!(
            fs::read_to_string(target.join("Contents/Info.plist")).unwrap(),
            "<plist/>"
        );
    }

    #[test]
    fn test_copy_recreates_symlinks() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bundle = build_bundle(src.path());
        let target = dst.path().join("MyApp.app");

        copy_bundle(&bundle, &target).unwrap();

        let link = target.join("Contents/Frameworks/Kit.framework/Kit");
        assert!(fs::symlink_metadata(&link).unwrap().file_type().is_symlink());
        assert_eq!(fs::read_link(&link).unwrap(), PathBuf::from("Versions/Current/Kit"));
        assert_eq!(fs::read_to_string(&link).unwrap(), "kit");
    }

    #[test]
    fn test_copy_preserves_permissions() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bundle = build_bundle(src.path());
        let macos = bundle.join("Contents/MacOS");
        fs::set_permissions(&macos, fs::Permissions::from_mode(0o555)).unwrap();
        let target = dst.path().join("MyApp.app");

        copy_bundle(&bundle, &target).unwrap();

        let exe = fs::metadata(target.join("Contents/MacOS/MyApp")).unwrap();
        assert_eq!(exe.permissions().mode() & 0o777, 0o755);
        let dir = fs::metadata(target.join("Contents/MacOS")).unwrap();
        assert_eq!(dir.permissions().mode() & 0o777, 0o555);

        fs::set_permissions(&macos, fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(
            target.join("Contents/MacOS"),
            fs::Permissions::from_mode(0o755),
        )
        .unwrap();
    }

    #[test]
    fn test_copy_keeps_file_modification_time() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bundle = build_bundle(src.path());
        let plist = bundle.join("Contents/Info.plist");
        let then = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        fs::File::options()
            .write(true)
            .open(&plist)
            .unwrap()
            .set_modified(then)
            .unwrap();
        let target = dst.path().join("MyApp.app");

        copy_bundle(&bundle, &target).unwrap();

        let copied = fs::metadata(target.join("Contents/Info.plist")).unwrap();
        assert_eq!(copied.modified().unwrap(), then);
    }

    #[test]
    fn test_copy_rejects_special_files() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bundle = build_bundle(src.path());
        let _socket =
            std::os::unix::net::UnixListener::bind(bundle.join("Contents/agent.sock")).unwrap();
        let target = dst.path().join("MyApp.app");

        let err = copy_bundle(&bundle, &target).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(err.to_string().contains("agent.sock"));
    }

    #[test]
    fn test_copy_refuses_existing_destination() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let bundle = build_bundle(src.path());
        let target = dst.path().join("MyApp.app");
        fs::create_dir(&target).unwrap();

        let err = copy_bundle(&bundle, &target).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
    }

    #[test]
    fn test_copy_missing_source_fails() {
        let dst = tempfile::tempdir().unwrap();
        let missing = Path::new("/nonexistent/MyApp.app");
        assert!(copy_bundle(missing, &dst.path().join("X.app")).is_err());
    }
}
