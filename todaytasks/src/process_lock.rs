//! Process-level lock so two interactive instances never write the same
//! work store.
//!
//! The lock is an advisory OS file lock (flock) on a file in the runtime
//! directory, named after a hash of the data file path, and held for the
//! process lifetime.

use anyhow::{Context, Result};
use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{self, Seek, SeekFrom, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "todaytasks.lock";

/// Held for as long as this process owns the data file.
pub struct ProcessLock {
    file: File,
    path: PathBuf,
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        let _ = unlock_file(&self.file);
        let _ = fs::remove_file(&self.path);
    }
}

/// Take the lock for `data_file`, failing when another instance holds it.
pub fn acquire(data_file: &Path) -> Result<ProcessLock> {
    match try_acquire(data_file, &lock_dir())? {
        Some(lock) => Ok(lock),
        None => anyhow::bail!(
            "another todaytasks instance is already using {}",
            data_file.display()
        ),
    }
}

fn try_acquire(data_file: &Path, dir: &Path) -> Result<Option<ProcessLock>> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create runtime lock directory: {}", dir.display()))?;

    let path = dir.join(scoped_lock_filename(data_file));
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("failed to open lock file: {}", path.display()))?;

    match lock_file_nonblocking(&file) {
        Ok(()) => {
            // owner info for debugging
            let _ = file.set_len(0);
            let _ = file.seek(SeekFrom::Start(0));
            let _ = writeln!(file, "pid={}", std::process::id());
            let _ = writeln!(file, "data_file={}", data_file.display());
            let _ = file.flush();

            tracing::debug!(lock = %path.display(), "Process lock acquired");
            Ok(Some(ProcessLock { file, path }))
        }
        Err(e) if is_lock_busy(&e) => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to lock file: {}", path.display())),
    }
}

fn lock_dir() -> PathBuf {
    let mut dir = match std::env::var_os("XDG_RUNTIME_DIR") {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => std::env::temp_dir(),
    };
    dir.push("todaytasks");
    dir
}

fn scoped_lock_filename(data_file: &Path) -> String {
    let mut hasher = DefaultHasher::new();
    data_file.to_string_lossy().hash(&mut hasher);
    format!("{LOCK_FILE}.{:016x}", hasher.finish())
}

fn is_lock_busy(error: &io::Error) -> bool {
    matches!(error.kind(), io::ErrorKind::WouldBlock)
        || matches!(error.raw_os_error(), Some(11) | Some(35))
}

#[cfg(unix)]
fn lock_file_nonblocking(file: &File) -> io::Result<()> {
    const LOCK_EX: i32 = 2;
    const LOCK_NB: i32 = 4;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_EX | LOCK_NB) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock_file(file: &File) -> io::Result<()> {
    const LOCK_UN: i32 = 8;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
extern "C" {
    fn flock(fd: i32, operation: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("todaytasks process locks currently require Unix (Linux/macOS)");

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_on_same_file_is_refused() {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("tasks.json");

        let first = try_acquire(&data, dir.path()).unwrap();
        assert!(first.is_some());
        assert!(try_acquire(&data, dir.path()).unwrap().is_none());

        let other = dir.path().join("other.json");
        assert!(try_acquire(&other, dir.path()).unwrap().is_some());

        drop(first);
        assert!(try_acquire(&data, dir.path()).unwrap().is_some());
    }
}
