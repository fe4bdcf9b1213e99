//! File I/O service used by the container layer
//!
//! The container reader and writer never touch `std::fs` directly. They are
//! handed an already-open file through one of the traits below and own it
//! exclusively for the rest of their lifetime.
//!
//! # Surface
//!
//! - `WritableFile`: append-only sink with flush, fsync and close
//! - `RandomAccessFile`: positional reads with a known total size
//! - `Env`: file creation, rename, delete and directory sync
//!
//! `DiskEnv` is the std-backed implementation. Tests wrap it to inject faults.

mod deleter;
mod disk;

pub use deleter::ScopedFileDeleter;
pub use disk::DiskEnv;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// How far a flush should push buffered bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushMode {
    /// Hand buffered bytes to the OS without waiting for durability.
    Async,
    /// Hand buffered bytes to the OS and wait for them to reach stable storage.
    Sync,
}

/// An append-only file opened for writing.
pub trait WritableFile: Send {
    /// Appends `data` at the end of the file.
    fn append(&mut self, data: &[u8]) -> io::Result<()>;

    /// Pushes buffered bytes towards the OS.
    fn flush(&mut self, mode: FlushMode) -> io::Result<()>;

    /// Makes everything appended so far durable.
    fn sync(&mut self) -> io::Result<()>;

    /// Flushes and releases the handle. Calling it again is a no-op.
    fn close(&mut self) -> io::Result<()>;

    /// Number of bytes appended so far.
    fn size(&self) -> u64;

    /// Path this file was opened at.
    fn filename(&self) -> &Path;
}

/// A file opened for reads at explicit offsets.
pub trait RandomAccessFile: Send {
    /// Total size of the file in bytes.
    fn size(&self) -> io::Result<u64>;

    /// Reads up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns the number of bytes read. A result shorter than `buf.len()`
    /// only happens when end of file is reached.
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

    /// Path this file was opened at.
    fn filename(&self) -> &Path;
}

/// File-system operations needed by the atomic writer and path helpers.
pub trait Env {
    /// Creates a new file from `template`, whose trailing `X` characters are
    /// replaced to make the name unique. Returns the chosen path and the
    /// open file.
    fn new_temp_writable_file(&self, template: &Path)
        -> io::Result<(PathBuf, Box<dyn WritableFile>)>;

    /// Opens `path` for positional reads.
    fn new_random_access_file(&self, path: &Path) -> io::Result<Box<dyn RandomAccessFile>>;

    /// Opens `path` for a single front-to-back read.
    fn new_sequential_file(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Atomically renames `src` to `dst`, replacing `dst` if it exists.
    fn rename_file(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Removes the file at `path`.
    fn delete_file(&self, path: &Path) -> io::Result<()>;

    /// Makes directory entry changes (creates, renames) in `dir` durable.
    fn sync_dir(&self, dir: &Path) -> io::Result<()>;
}
