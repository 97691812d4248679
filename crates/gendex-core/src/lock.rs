//! Advisory lock marker guarding mirror synchronisation.
//!
//! The marker is a plain file; holding it means nothing to the kernel.
//! Waiting is a bounded poll: a caller gives up with [`Error::LockTimeout`]
//! instead of spinning forever behind a marker left by a crashed process.
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::{Error, Result};

#[derive(Debug)]
pub struct LockMarker {
    path: PathBuf,
}

impl LockMarker {
    /// Polls every `poll` until the marker is absent, then creates it.
    /// Creation uses `create_new`, so two waiters cannot both win.
    pub fn acquire(path: impl Into<PathBuf>, timeout: Duration, poll: Duration) -> Result<Self> {
        let path = path.into();
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{}", std::process::id()) {
                        warn!(path = %path.display(), error = %e, "could not record owner pid in lock marker");
                    }
                    debug!(path = %path.display(), "lock marker acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let waited = started.elapsed();
                    if waited >= timeout {
                        warn!(path = %path.display(), ?waited, "gave up waiting for lock marker");
                        return Err(Error::LockTimeout { path, waited });
                    }
                    thread::sleep(poll.min(timeout - waited));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockMarker {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "lock marker released"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove lock marker"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn marker_exists_while_held() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("write.lock");
        {
            let guard = LockMarker::acquire(&path, Duration::from_millis(50), Duration::from_millis(5)).unwrap();
            assert!(guard.path().exists());
            let owner = fs::read_to_string(guard.path()).unwrap();
            assert_eq!(owner.trim(), std::process::id().to_string());
        }
        assert!(!path.exists());
    }

    #[test]
    fn second_acquire_times_out() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("write.lock");
        let _held = LockMarker::acquire(&path, Duration::from_millis(50), Duration::from_millis(5)).unwrap();
        let err = LockMarker::acquire(&path, Duration::from_millis(30), Duration::from_millis(5)).unwrap_err();
        assert!(matches!(err, Error::LockTimeout { .. }));
    }

    #[test]
    fn waiter_proceeds_once_marker_disappears() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("write.lock");
        fs::write(&path, "stale").unwrap();
        let remover = {
            let path = path.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                fs::remove_file(path).unwrap();
            })
        };
        let guard = LockMarker::acquire(&path, Duration::from_secs(5), Duration::from_millis(5)).unwrap();
        remover.join().unwrap();
        assert!(guard.path().exists());
    }
}
