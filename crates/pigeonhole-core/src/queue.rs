//! Queue directory layout: `<root>/<machine>/<queue>/<id>.<ext>`

use crate::io::TransportError;
use crate::io::atomic::is_temporary;
use crate::schema::Address;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default message file extension.
pub const DEFAULT_EXTENSION: &str = "msg";

/// Suffix appended to message files that failed to decode.
pub const MALFORMED_SUFFIX: &str = "bad";

/// Maps addresses to queue directories and message ids to file names
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueLayout {
    local_machine: String,
    extension: String,
}

impl QueueLayout {
    pub fn new(local_machine: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        Self {
            local_machine: local_machine.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Layout for this host's name with the default extension.
    pub fn for_local_host() -> Self {
        Self::new(local_machine_name(), DEFAULT_EXTENSION)
    }

    pub fn local_machine(&self) -> &str {
        &self.local_machine
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Queue directory path for `address`, without touching the filesystem.
    pub fn queue_dir(&self, root: &Path, address: &Address) -> PathBuf {
        root.join(address.machine_or(&self.local_machine))
            .join(address.queue())
    }

    /// Queue directory for `address`, created (with parents) if missing.
    ///
    /// Safe to call concurrently from many processes for the same address.
    pub fn resolve_queue_dir(
        &self,
        root: &Path,
        address: &Address,
    ) -> Result<PathBuf, TransportError> {
        let dir = self.queue_dir(root, address);
        fs::create_dir_all(&dir).map_err(|e| TransportError::io(&dir, e))?;
        Ok(dir)
    }

    /// File name for a message id.
    pub fn file_name(&self, id: &str) -> Result<String, TransportError> {
        let invalid = id.trim().is_empty()
            || id.starts_with('.')
            || id.contains(['/', '\\', '\0', '\n', '\r']);
        if invalid {
            return Err(TransportError::InvalidMessageId(id.to_string()));
        }
        Ok(format!("{id}.{}", self.extension))
    }

    /// Whether `path` looks like a deliverable message file.
    ///
    /// Hidden files (in-progress writes) and files set aside as malformed
    /// are excluded.
    pub fn is_message_file(&self, path: &Path) -> bool {
        if is_temporary(path) {
            return false;
        }
        let hidden = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_none_or(|name| name.starts_with('.'));
        !hidden && path.extension().and_then(|ext| ext.to_str()) == Some(self.extension.as_str())
    }

    /// Message files currently in `dir`, in whatever order the filesystem yields.
    pub fn message_files(&self, dir: &Path) -> Result<Vec<PathBuf>, TransportError> {
        let entries = fs::read_dir(dir).map_err(|e| TransportError::io(dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TransportError::io(dir, e))?;
            let path = entry.path();
            if self.is_message_file(&path) && path.is_file() {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Delete every file in `dir`, including stale temporaries and files
    /// set aside as malformed. Returns how many files were removed.
    pub fn purge_dir(&self, dir: &Path) -> Result<usize, TransportError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(TransportError::io(dir, e)),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry.map_err(|e| TransportError::io(dir, e))?.path();
            if !path.is_file() {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("{path:?} vanished during purge");
                }
                Err(e) => return Err(TransportError::io(&path, e)),
            }
        }
        Ok(removed)
    }
}

/// This host's name, as used for addresses without an explicit machine.
pub fn local_machine_name() -> String {
    match hostname::get() {
        Ok(name) => name.to_string_lossy().into_owned(),
        Err(e) => {
            warn!("Could not determine host name, using 'localhost': {e}");
            "localhost".to_string()
        }
    }
}
