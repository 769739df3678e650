//! Write-then-rename file creation

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically create (or replace) `dir/file_name` with `content`.
///
/// The content is written and fsynced under a hidden temporary name in the
/// same directory, then renamed into place, so readers scanning `dir` see
/// either no file or the complete file. The temporary is removed on failure.
pub fn write_atomic(dir: &Path, file_name: &str, content: &[u8]) -> std::io::Result<PathBuf> {
    let final_path = dir.join(file_name);
    let tmp_path = dir.join(format!(
        ".{file_name}.tmp-{}",
        uuid::Uuid::new_v4().simple()
    ));

    let result = write_and_rename(&tmp_path, &final_path, content);
    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result.map(|()| final_path)
}

fn write_and_rename(tmp_path: &Path, final_path: &Path, content: &[u8]) -> std::io::Result<()> {
    {
        let mut tmp_file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp_path)?;
        tmp_file.write_all(content)?;
        tmp_file.sync_all()?;
    }

    fs::rename(tmp_path, final_path)
}

/// Whether `path` names an in-progress temporary written by [`write_atomic`].
pub fn is_temporary(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with('.') && name.contains(".tmp-"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_atomic(temp_dir.path(), "a.msg", b"content").unwrap();

        assert_eq!(path, temp_dir.path().join("a.msg"));
        assert_eq!(fs::read(&path).unwrap(), b"content");
    }

    #[test]
    fn test_write_atomic_leaves_no_temporaries() {
        let temp_dir = TempDir::new().unwrap();
        write_atomic(temp_dir.path(), "a.msg", b"one").unwrap();
        write_atomic(temp_dir.path(), "b.msg", b"two").unwrap();

        let mut names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.msg", "b.msg"]);
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let temp_dir = TempDir::new().unwrap();
        write_atomic(temp_dir.path(), "a.msg", b"old").unwrap();
        let path = write_atomic(temp_dir.path(), "a.msg", b"new").unwrap();
        assert_eq!(fs::read(path).unwrap(), b"new");
    }

    #[test]
    fn test_write_atomic_missing_dir_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("gone");
        assert!(write_atomic(&missing, "a.msg", b"x").is_err());
        assert!(!missing.exists());
    }

    #[test]
    fn test_is_temporary() {
        assert!(is_temporary(Path::new("/q/.abc.msg.tmp-0123")));
        assert!(!is_temporary(Path::new("/q/abc.msg")));
        assert!(!is_temporary(Path::new("/q/.hidden")));
    }
}
