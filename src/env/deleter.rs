//! Scoped removal of temporary files
//!
//! The guard deletes its path when dropped, on every exit path of the
//! enclosing function, unless it was cancelled first.

use std::path::{Path, PathBuf};

use super::Env;

/// Deletes a file when dropped unless `cancel` was called.
pub struct ScopedFileDeleter<'a> {
    env: &'a dyn Env,
    path: PathBuf,
    should_delete: bool,
}

impl<'a> ScopedFileDeleter<'a> {
    /// Arms a deleter for `path`.
    pub fn new(env: &'a dyn Env, path: impl Into<PathBuf>) -> Self {
        Self {
            env,
            path: path.into(),
            should_delete: true,
        }
    }

    /// Path that will be removed on drop.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Disarms the guard. The file is left in place.
    pub fn cancel(&mut self) {
        self.should_delete = false;
    }
}

impl Drop for ScopedFileDeleter<'_> {
    fn drop(&mut self) {
        if !self.should_delete {
            return;
        }
        if let Err(e) = self.env.delete_file(&self.path) {
            tracing::warn!(
                target: "pbcontainer",
                path = %self.path.display(),
                error = %e,
                "could not delete temporary file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::DiskEnv;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_deletes_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("victim");
        fs::write(&path, b"x").unwrap();

        {
            let _deleter = ScopedFileDeleter::new(&DiskEnv, &path);
        }

        assert!(!path.exists());
    }

    #[test]
    fn test_cancel_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("survivor");
        fs::write(&path, b"x").unwrap();

        {
            let mut deleter = ScopedFileDeleter::new(&DiskEnv, &path);
            deleter.cancel();
        }

        assert!(path.exists());
    }

    #[test]
    fn test_missing_file_does_not_panic() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("never_created");

        let deleter = ScopedFileDeleter::new(&DiskEnv, &path);
        assert_eq!(deleter.path(), path.as_path());
        drop(deleter);
    }
}
