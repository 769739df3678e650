//! Working-root discovery
//!
//! The working root is the directory tree shared between machines, typically
//! a marker directory on removable media. It can appear and disappear at any
//! time, so locators are consulted on every operation and never cache.

use std::fs;
use std::path::{Path, PathBuf};

/// Default name of the marker directory at the top of a volume.
pub const DEFAULT_MARKER: &str = "pigeonhole";

/// Finds the currently available working root.
///
/// Implementations must be cheap enough to call on every poll, must not
/// cache, and report "not mounted right now" as `None` rather than an error.
pub trait RootLocator: Send + Sync {
    fn locate(&self) -> Option<PathBuf>;
}

impl<F> RootLocator for F
where
    F: Fn() -> Option<PathBuf> + Send + Sync,
{
    fn locate(&self) -> Option<PathBuf> {
        self()
    }
}

/// A fixed directory that counts as available while it exists.
#[derive(Debug, Clone)]
pub struct FixedRoot {
    path: PathBuf,
}

impl FixedRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RootLocator for FixedRoot {
    fn locate(&self) -> Option<PathBuf> {
        self.path.is_dir().then(|| self.path.clone())
    }
}

/// Probes candidate volumes for a marker directory.
///
/// Candidates are the explicit `volumes` followed by, for every mount parent,
/// each child directory and each grandchild directory (covering layouts like
/// `/media/<user>/<label>`). Directory listings are sorted so the choice is
/// deterministic; the first candidate containing the marker wins.
#[derive(Debug, Clone)]
pub struct MarkerRoot {
    marker: String,
    volumes: Vec<PathBuf>,
    mount_parents: Vec<PathBuf>,
}

impl MarkerRoot {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            volumes: Vec::new(),
            mount_parents: Vec::new(),
        }
    }

    /// Add a directory that is itself a volume root.
    pub fn with_volume(mut self, volume: impl Into<PathBuf>) -> Self {
        self.volumes.push(volume.into());
        self
    }

    /// Add a directory under which volumes get mounted.
    pub fn with_mount_parent(mut self, parent: impl Into<PathBuf>) -> Self {
        self.mount_parents.push(parent.into());
        self
    }

    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// All candidate volume roots, in probe order.
    pub fn candidate_volumes(&self) -> Vec<PathBuf> {
        let mut candidates = self.volumes.clone();
        for parent in &self.mount_parents {
            for child in sorted_subdirs(parent) {
                let grandchildren = sorted_subdirs(&child);
                candidates.push(child);
                candidates.extend(grandchildren);
            }
        }
        candidates
    }
}

impl Default for MarkerRoot {
    fn default() -> Self {
        default_mount_parents()
            .into_iter()
            .fold(Self::new(DEFAULT_MARKER), MarkerRoot::with_mount_parent)
    }
}

impl RootLocator for MarkerRoot {
    fn locate(&self) -> Option<PathBuf> {
        self.candidate_volumes()
            .into_iter()
            .map(|volume| volume.join(&self.marker))
            .find(|candidate| candidate.is_dir())
    }
}

/// Conventional removable-media mount points for the current platform.
pub fn default_mount_parents() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![PathBuf::from("/Volumes")]
    } else if cfg!(windows) {
        ('D'..='Z')
            .map(|letter| PathBuf::from(format!("{letter}:\\")))
            .collect()
    } else {
        vec![
            PathBuf::from("/media"),
            PathBuf::from("/run/media"),
            PathBuf::from("/mnt"),
        ]
    }
}

/// Unreadable or missing directories yield no entries.
fn sorted_subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    dirs.sort();
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_fixed_root_tracks_existence() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("shared");
        let locator = FixedRoot::new(&root);

        assert!(locator.locate().is_none());
        fs::create_dir(&root).unwrap();
        assert_eq!(locator.locate(), Some(root.clone()));
        fs::remove_dir(&root).unwrap();
        assert!(locator.locate().is_none());
    }

    #[test]
    fn test_marker_root_in_explicit_volume() {
        let temp_dir = TempDir::new().unwrap();
        let volume = temp_dir.path().join("usb");
        fs::create_dir_all(volume.join("pigeonhole")).unwrap();

        let locator = MarkerRoot::new("pigeonhole").with_volume(&volume);
        assert_eq!(locator.locate(), Some(volume.join("pigeonhole")));
    }

    #[test]
    fn test_marker_root_under_mount_parent_per_user() {
        let temp_dir = TempDir::new().unwrap();
        let media = temp_dir.path().join("media");
        fs::create_dir_all(media.join("alice/EMPTY")).unwrap();
        fs::create_dir_all(media.join("alice/STICK/pigeonhole")).unwrap();

        let locator = MarkerRoot::new("pigeonhole").with_mount_parent(&media);
        assert_eq!(
            locator.locate(),
            Some(media.join("alice/STICK/pigeonhole"))
        );
    }

    #[test]
    fn test_marker_root_requires_marker() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir_all(temp_dir.path().join("mnt/disk/other")).unwrap();

        let locator = MarkerRoot::new("pigeonhole").with_mount_parent(temp_dir.path().join("mnt"));
        assert!(locator.locate().is_none());
    }

    #[test]
    fn test_marker_root_missing_parent_is_unavailable() {
        let locator = MarkerRoot::new("pigeonhole").with_mount_parent("/definitely/not/here");
        assert!(locator.locate().is_none());
    }

    #[test]
    fn test_closure_locator_sees_every_transition() {
        let temp_dir = TempDir::new().unwrap();
        let mounted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&mounted);
        let path = temp_dir.path().to_path_buf();
        let locator = move || flag.load(Ordering::SeqCst).then(|| path.clone());

        assert!(locator.locate().is_none());
        mounted.store(true, Ordering::SeqCst);
        assert_eq!(locator.locate(), Some(temp_dir.path().to_path_buf()));
        mounted.store(false, Ordering::SeqCst);
        assert!(locator.locate().is_none());
    }
}
