//! Advisory claiming of message files
//!
//! A claim is an open handle holding a non-blocking exclusive lock on the
//! message file, plus the file's contents read under that lock. Locks are
//! advisory, so a claim also re-checks that the path still names the file
//! that was locked: a competing poller that deleted it in the meantime makes
//! the claim fail as [`ClaimAttempt::Gone`] instead of re-delivering it.

use crate::io::error::TransportError;
use fs2::FileExt;
use std::fs::{self, File};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// A message file exclusively held by this process until dropped
#[derive(Debug)]
pub struct ClaimedFile {
    file: File,
    path: PathBuf,
    contents: Vec<u8>,
}

impl ClaimedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Delete the file while still holding the lock.
    ///
    /// A file that is already gone counts as removed. A file that was
    /// renamed over the claimed path is someone else's message and is left
    /// in place.
    pub fn remove(self) -> Result<(), TransportError> {
        if !self.still_held()? {
            debug!("Message file {:?} was replaced; leaving it", self.path);
            return Ok(());
        }

        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Message file {:?} already removed", self.path);
                Ok(())
            }
            Err(e) => Err(TransportError::io(&self.path, e)),
        }
    }

    /// Move the file aside to `<name>.<suffix>` so pollers stop seeing it.
    ///
    /// Returns `None` when the path no longer names the claimed file.
    pub fn set_aside(self, suffix: &str) -> Result<Option<PathBuf>, TransportError> {
        if !self.still_held()? {
            return Ok(None);
        }

        let mut target = self.path.clone().into_os_string();
        target.push(".");
        target.push(suffix);
        let target = PathBuf::from(target);

        fs::rename(&self.path, &target).map_err(|e| TransportError::io(&self.path, e))?;
        Ok(Some(target))
    }

    fn still_held(&self) -> Result<bool, TransportError> {
        match still_linked(&self.file, &self.path) {
            Ok(linked) => Ok(linked),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TransportError::io(&self.path, e)),
        }
    }
}

impl Drop for ClaimedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Result of a single claim attempt
#[derive(Debug)]
pub enum ClaimAttempt {
    Claimed(ClaimedFile),
    /// Locked or unreadable right now; worth retrying
    Busy,
    /// Deleted or replaced by someone else; move on
    Gone,
}

/// Try once to claim `path` without blocking.
pub fn try_claim(path: &Path) -> ClaimAttempt {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return ClaimAttempt::Gone,
        Err(e) => {
            debug!("Cannot open message file {path:?}: {e}");
            return ClaimAttempt::Busy;
        }
    };

    if let Err(e) = file.try_lock_exclusive() {
        if e.raw_os_error() != fs2::lock_contended_error().raw_os_error() {
            debug!("Cannot lock message file {path:?}: {e}");
        }
        return ClaimAttempt::Busy;
    }

    match still_linked(&file, path) {
        Ok(true) => {}
        Ok(false) => return ClaimAttempt::Gone,
        Err(e) if e.kind() == ErrorKind::NotFound => return ClaimAttempt::Gone,
        Err(e) => {
            debug!("Cannot stat message file {path:?}: {e}");
            return ClaimAttempt::Busy;
        }
    }

    let mut contents = Vec::new();
    if let Err(e) = (&file).read_to_end(&mut contents) {
        debug!("Cannot read message file {path:?}: {e}");
        return ClaimAttempt::Busy;
    }

    ClaimAttempt::Claimed(ClaimedFile {
        file,
        path: path.to_path_buf(),
        contents,
    })
}

/// Claim `path`, retrying a busy file up to `attempts` times with a fixed
/// `delay` in between.
///
/// Returns `None` when the file stayed busy or disappeared; neither is an
/// error for the caller, which should simply move on to another file.
pub fn claim_with_retry(path: &Path, attempts: u32, delay: Duration) -> Option<ClaimedFile> {
    let attempts = attempts.max(1);
    for attempt in 0..attempts {
        match try_claim(path) {
            ClaimAttempt::Claimed(claimed) => return Some(claimed),
            ClaimAttempt::Gone => return None,
            ClaimAttempt::Busy => {
                if attempt + 1 < attempts {
                    std::thread::sleep(delay);
                }
            }
        }
    }

    debug!("Skipping busy message file {path:?} after {attempts} attempts");
    None
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> std::io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    let current = fs::metadata(path)?;
    Ok(held.dev() == current.dev() && held.ino() == current.ino() && held.nlink() > 0)
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> std::io::Result<bool> {
    fs::metadata(path).map(|_| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_claim_reads_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.msg");
        fs::write(&path, b"payload").unwrap();

        let claimed = claim_with_retry(&path, 3, Duration::from_millis(10)).unwrap();
        assert_eq!(claimed.contents(), b"payload");
        assert_eq!(claimed.path(), path);
    }

    #[test]
    fn test_claim_missing_file_is_gone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing.msg");
        assert!(matches!(try_claim(&path), ClaimAttempt::Gone));
        assert!(claim_with_retry(&path, 3, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn test_held_claim_makes_others_busy() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.msg");
        fs::write(&path, b"payload").unwrap();

        let held = claim_with_retry(&path, 1, Duration::ZERO).unwrap();
        assert!(matches!(try_claim(&path), ClaimAttempt::Busy));
        assert!(claim_with_retry(&path, 3, Duration::from_millis(1)).is_none());

        drop(held);
        assert!(matches!(try_claim(&path), ClaimAttempt::Claimed(_)));
    }

    #[test]
    fn test_claim_after_remove_is_gone() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.msg");
        fs::write(&path, b"payload").unwrap();

        let held = claim_with_retry(&path, 1, Duration::ZERO).unwrap();
        held.remove().unwrap();
        assert!(!path.exists());
        assert!(matches!(try_claim(&path), ClaimAttempt::Gone));
    }

    #[cfg(unix)]
    #[test]
    fn test_remove_leaves_replacement_in_place() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.msg");
        fs::write(&path, b"first").unwrap();

        let held = claim_with_retry(&path, 1, Duration::ZERO).unwrap();
        let replacement = temp_dir.path().join(".a.msg.tmp");
        fs::write(&replacement, b"second").unwrap();
        fs::rename(&replacement, &path).unwrap();

        held.remove().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
    }

    #[cfg(unix)]
    #[test]
    fn test_set_aside_skips_replacement() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.msg");
        fs::write(&path, b"garbage").unwrap();

        let held = claim_with_retry(&path, 1, Duration::ZERO).unwrap();
        fs::remove_file(&path).unwrap();
        fs::write(&path, b"fresh").unwrap();

        assert!(held.set_aside("bad").unwrap().is_none());
        assert_eq!(fs::read(&path).unwrap(), b"fresh");
        assert!(!temp_dir.path().join("a.msg.bad").exists());
    }

    #[test]
    fn test_set_aside_renames() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("a.msg");
        fs::write(&path, b"garbage").unwrap();

        let claimed = claim_with_retry(&path, 1, Duration::ZERO).unwrap();
        let moved = claimed.set_aside("bad").unwrap().unwrap();
        assert_eq!(moved, temp_dir.path().join("a.msg.bad"));
        assert!(!path.exists());
        assert!(moved.exists());
    }

    #[test]
    fn test_racing_claimers_at_most_one_removes() {
        let temp_dir = TempDir::new().unwrap();
        let path = Arc::new(temp_dir.path().join("race.msg"));
        fs::write(path.as_ref(), b"payload").unwrap();
        let barrier = Arc::new(Barrier::new(4));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = Arc::clone(&path);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    match claim_with_retry(&path, 3, Duration::from_millis(10)) {
                        Some(claimed) => {
                            thread::sleep(Duration::from_millis(50));
                            claimed.remove().unwrap();
                            1
                        }
                        None => 0,
                    }
                })
            })
            .collect();

        let winners: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(winners, 1);
        assert!(!path.exists());
    }
}
