//! Atomic file replacement
//!
//! A target path is replaced by writing the new content to a uniquely named
//! temp file next to it, then renaming the temp file over the target:
//!
//! 1. Create temp file (same directory, so the rename stays on one file system)
//! 2. Arm a scoped deleter for the temp path
//! 3. Let the caller fill the temp file
//! 4. fsync the temp file (`SyncMode::Sync` only)
//! 5. Close the temp file
//! 6. Rename temp -> target
//! 7. Disarm the deleter
//! 8. fsync the parent directory (`SyncMode::Sync` only)
//!
//! Any failure before step 6 leaves the target untouched and the deleter
//! removes the temp file on the way out. A crash before step 6 can leave an
//! orphaned temp file behind; cleaning those up is the caller's job.

mod options;

pub use options::{AtomicWriteOptions, SyncMode, DEFAULT_TMP_SUFFIX};

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::container::{ContainerError, ContainerResult};
use crate::crash_point::{maybe_crash, points};
use crate::env::{Env, ScopedFileDeleter, WritableFile};

/// Something that owns an open temp file and can make it durable and close it.
pub trait DurableSink {
    /// Makes everything written so far durable. Errors name the file.
    fn sync(&mut self) -> ContainerResult<()>;

    /// Closes the underlying file. Errors name the file.
    fn close(&mut self) -> ContainerResult<()>;
}

impl DurableSink for Box<dyn WritableFile> {
    fn sync(&mut self) -> ContainerResult<()> {
        let path = self.filename().display().to_string();
        WritableFile::sync(self.as_mut())
            .map_err(|e| ContainerError::io_error(format!("Failed to Sync() {}", path), e))
    }

    fn close(&mut self) -> ContainerResult<()> {
        let path = self.filename().display().to_string();
        WritableFile::close(self.as_mut())
            .map_err(|e| ContainerError::io_error(format!("Failed to Close() {}", path), e))
    }
}

/// Builds the temp file template for `path`: the target name plus `suffix`.
pub fn temp_template(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Replaces `path` with whatever `write` puts into a fresh temp file.
///
/// `write` receives the open temp file and hands back the sink that now owns
/// it (the file itself, or a writer wrapped around it).
pub fn write_atomically<S, F>(
    env: &dyn Env,
    path: &Path,
    sync: SyncMode,
    write: F,
) -> ContainerResult<()>
where
    S: DurableSink,
    F: FnOnce(Box<dyn WritableFile>) -> ContainerResult<S>,
{
    write_atomically_with_options(env, path, &AtomicWriteOptions::with_sync(sync), write)
}

/// `write_atomically` with an explicit temp suffix.
pub fn write_atomically_with_options<S, F>(
    env: &dyn Env,
    path: &Path,
    options: &AtomicWriteOptions,
    write: F,
) -> ContainerResult<()>
where
    S: DurableSink,
    F: FnOnce(Box<dyn WritableFile>) -> ContainerResult<S>,
{
    options.validate()?;

    let template = temp_template(path, &options.tmp_suffix);
    let (tmp_path, file) = env.new_temp_writable_file(&template).map_err(|e| {
        ContainerError::io_error(
            format!("Failed to create temp file from template {}", template.display()),
            e,
        )
    })?;
    let mut tmp_deleter = ScopedFileDeleter::new(env, &tmp_path);
    maybe_crash(points::ATOMIC_AFTER_TEMP_CREATE);

    let mut sink = write(file)?;
    maybe_crash(points::ATOMIC_AFTER_WRITE);

    if options.sync == SyncMode::Sync {
        sink.sync()?;
    }
    sink.close()?;
    drop(sink);

    maybe_crash(points::ATOMIC_BEFORE_RENAME);
    env.rename_file(&tmp_path, path).map_err(|e| {
        ContainerError::io_error(
            format!("Failed to rename tmp file to {}", path.display()),
            e,
        )
    })?;
    tmp_deleter.cancel();
    maybe_crash(points::ATOMIC_AFTER_RENAME);

    if options.sync == SyncMode::Sync {
        let dir = path.parent().unwrap_or_else(|| Path::new(""));
        env.sync_dir(dir).map_err(|e| {
            ContainerError::io_error(
                format!("Failed to SyncDir() parent of {}", path.display()),
                e,
            )
        })?;
    }

    tracing::debug!(
        target: "pbcontainer",
        path = %path.display(),
        sync = ?options.sync,
        "atomically replaced file"
    );
    Ok(())
}
