//! Filesystem helpers for the road-network cache, built on `cap-std` and
//! `camino`.
//!
//! Every helper opens an ambient directory handle for the parent of the
//! target path and performs the operation relative to that handle.
#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::Component;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

/// Open a file for reading using ambient authority.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Read the whole file at `path`.
pub fn read_bytes(path: &Utf8Path) -> io::Result<Vec<u8>> {
    let (dir, name) = parent_dir_and_name(path)?;
    dir.read(name.as_str())
}

/// Open the parent directory of `path` and return it with the file name.
pub fn parent_dir_and_name(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = match path.parent() {
        Some(p) if !p.as_str().is_empty() => p,
        _ => Utf8Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, format!("{path} has no file name")))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, name))
}

/// Create `dir` and any missing ancestors.
pub fn ensure_dir(dir: &Utf8Path) -> io::Result<()> {
    if dir.as_str().is_empty() || dir == Utf8Path::new("/") {
        return Ok(());
    }
    let (base, relative) = base_dir_and_relative(dir)?;
    if relative.as_str().is_empty() {
        return Ok(());
    }
    base.create_dir_all(&relative)
}

/// Create the directory that will hold `path`.
pub fn ensure_parent_dir(path: &Utf8Path) -> io::Result<()> {
    path.parent().map_or(Ok(()), ensure_dir)
}

/// Whether `path` exists and is a regular file.
///
/// A missing file or parent directory yields `Ok(false)`.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = match parent_dir_and_name(path) {
        Ok(found) => found,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };
    match dir.metadata(name.as_str()) {
        Ok(meta) => Ok(meta.is_file()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Replace the contents of `path` with `bytes`.
///
/// The bytes are written to a hidden sibling file, flushed to disk and
/// renamed over the target, so readers never observe a partial file. Missing
/// parent directories are created.
pub fn write_atomic(path: &Utf8Path, bytes: &[u8]) -> io::Result<()> {
    ensure_parent_dir(path)?;
    let (dir, name) = parent_dir_and_name(path)?;
    let staging = format!(".{name}.partial");
    let result = stage_and_rename(&dir, &staging, &name, bytes);
    if result.is_err() {
        // Report the write failure, not a cleanup failure.
        dir.remove_file(staging.as_str()).ok();
    }
    result
}

fn stage_and_rename(dir: &fs_utf8::Dir, staging: &str, name: &str, bytes: &[u8]) -> io::Result<()> {
    let mut file = dir.create(staging)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    dir.rename(staging, dir, name)
}

/// Split a directory path into an ambient base directory and the relative
/// remainder beneath it.
pub fn base_dir_and_relative(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let (base, relative) = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            let base = Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR_STR);
            let relative = path
                .strip_prefix(&base)
                .or_else(|_| path.strip_prefix(prefix))
                .map_err(|_| io::Error::other(format!("cannot strip {prefix} from {path}")))?
                .to_owned();
            (base, relative)
        }
        Some(Component::RootDir) => {
            let base = Utf8PathBuf::from(std::path::MAIN_SEPARATOR_STR);
            let relative = path
                .strip_prefix(&base)
                .map_err(|_| io::Error::other(format!("cannot strip root from {path}")))?
                .to_owned();
            (base, relative)
        }
        _ => (Utf8PathBuf::from("."), path.to_owned()),
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&base, ambient_authority())?;
    Ok((dir, relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};
    use tempfile::TempDir;

    #[fixture]
    fn root() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("create temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        (dir, path)
    }

    #[rstest]
    fn write_atomic_creates_parents_and_replaces(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let target = root.join("nested/deeper/graph.bin");
        write_atomic(&target, b"first").expect("first write");
        write_atomic(&target, b"second").expect("second write");
        assert_eq!(read_bytes(&target).expect("read back"), b"second");
        assert!(!file_is_file(&root.join("nested/deeper/.graph.bin.partial")).expect("stat"));
    }

    #[rstest]
    fn file_is_file_reports_missing_paths(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        assert!(!file_is_file(&root.join("absent.bin")).expect("stat"));
        assert!(!file_is_file(&root.join("no/such/dir/absent.bin")).expect("stat"));
    }

    #[rstest]
    fn file_is_file_rejects_directories(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let sub = root.join("sub");
        ensure_dir(&sub).expect("create dir");
        assert!(!file_is_file(&sub).expect("stat"));
    }

    #[rstest]
    fn ensure_dir_is_idempotent(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let sub = root.join("a/b/c");
        ensure_dir(&sub).expect("create");
        ensure_dir(&sub).expect("create again");
        assert!(sub.is_dir());
    }

    #[rstest]
    fn base_dir_and_relative_splits_absolute_paths(#[from(root)] (_dir, root): (TempDir, Utf8PathBuf)) {
        let (_base, relative) = base_dir_and_relative(&root).expect("split");
        assert!(relative.is_relative());
        assert!(root.as_str().ends_with(relative.as_str()));
    }
}
