//! Container writer
//!
//! Lifecycle: `new` -> `init` -> `append`* -> `close`. There is no way back
//! from closed. Appending, flushing or syncing before `init` or after
//! `close` is a programming error and panics.
//!
//! Each header and each record reaches the sink in a single append.

use std::path::Path;

use super::checksum::compute_checksum;
use super::errors::{ContainerError, ContainerResult};
use super::{CHECKSUM_LEN, CONTAINER_VERSION, DATA_SIZE_LEN, HEADER_LEN, MAGIC_LEN};
use crate::env::{FlushMode, WritableFile};
use crate::message::{initialization_error_message, serialize_exact, PbMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Created,
    Initialized,
    Closed,
}

/// Writes a container file to a sink it owns exclusively.
pub struct WritablePbContainerFile {
    state: WriterState,
    writer: Box<dyn WritableFile>,
}

impl WritablePbContainerFile {
    /// Takes ownership of an open sink. Nothing is written until `init`.
    pub fn new(writer: Box<dyn WritableFile>) -> Self {
        Self {
            state: WriterState::Created,
            writer,
        }
    }

    /// Writes the header: `magic` followed by the format version.
    ///
    /// # Panics
    ///
    /// If `magic` is not exactly `MAGIC_LEN` bytes, or `init` already succeeded.
    pub fn init(&mut self, magic: &str) -> ContainerResult<()> {
        assert_eq!(
            self.state,
            WriterState::Created,
            "init() called on a container writer that is not freshly created"
        );
        assert_eq!(
            magic.len(),
            MAGIC_LEN,
            "Magic number string incorrect length"
        );

        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(magic.as_bytes());
        buf.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        debug_assert_eq!(buf.len(), HEADER_LEN, "Serialized unexpected number of total bytes");

        self.writer
            .append(&buf)
            .map_err(|e| ContainerError::io_error("Failed to Append() header to file", e))?;

        self.state = WriterState::Initialized;
        Ok(())
    }

    /// Appends one record holding the serialized form of `msg`.
    ///
    /// # Panics
    ///
    /// If the writer is not initialized or already closed, or if `msg`
    /// changes size while it is being serialized.
    pub fn append<M: PbMessage>(&mut self, msg: &M) -> ContainerResult<()> {
        self.assert_writable("append");
        debug_assert!(
            msg.initialization_errors().is_empty(),
            "{}",
            initialization_error_message("serialize", msg)
        );

        let data_size = msg.byte_size();
        let encoded_size = u32::try_from(data_size).map_err(|_| {
            ContainerError::io_error_no_source(format!(
                "Message of type \"{}\" is too large for a container record: {} bytes",
                msg.type_name(),
                data_size
            ))
        })?;

        let mut buf = vec![0u8; DATA_SIZE_LEN + data_size + CHECKSUM_LEN];
        buf[..DATA_SIZE_LEN].copy_from_slice(&encoded_size.to_le_bytes());

        let body_end = DATA_SIZE_LEN + data_size;
        serialize_exact(msg, &mut buf[DATA_SIZE_LEN..body_end]).map_err(|e| {
            ContainerError::io_error_with_details("Failed to serialize PB to array", e.to_string())
        })?;

        let checksum = compute_checksum(&buf[..body_end]);
        buf[body_end..].copy_from_slice(&checksum.to_le_bytes());

        self.writer
            .append(&buf)
            .map_err(|e| ContainerError::io_error("Failed to Append() data to file", e))
    }

    /// Asks the OS to start writing buffered bytes. Not durable.
    pub fn flush(&mut self) -> ContainerResult<()> {
        self.assert_writable("flush");
        self.writer
            .flush(FlushMode::Async)
            .map_err(|e| ContainerError::io_error("Failed to Flush() file", e))
    }

    /// Makes everything appended so far durable.
    pub fn sync(&mut self) -> ContainerResult<()> {
        self.assert_writable("sync");
        let path = self.writer.filename().display().to_string();
        self.writer
            .sync()
            .map_err(|e| ContainerError::io_error(format!("Failed to Sync() {}", path), e))
    }

    /// Closes the sink. Only the first call does anything.
    ///
    /// The writer counts as closed even when closing the sink fails.
    pub fn close(&mut self) -> ContainerResult<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        self.state = WriterState::Closed;
        let path = self.writer.filename().display().to_string();
        self.writer
            .close()
            .map_err(|e| ContainerError::io_error(format!("Failed to Close() {}", path), e))
    }

    /// Returns whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state == WriterState::Closed
    }

    /// Number of bytes handed to the sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.writer.size()
    }

    /// Path of the underlying sink.
    pub fn filename(&self) -> &Path {
        self.writer.filename()
    }

    fn assert_writable(&self, op: &str) {
        match self.state {
            WriterState::Initialized => {}
            WriterState::Created => panic!("{}() called before init() on container writer", op),
            WriterState::Closed => panic!("{}() called on closed container writer", op),
        }
    }
}

impl crate::atomic::DurableSink for WritablePbContainerFile {
    fn sync(&mut self) -> ContainerResult<()> {
        WritablePbContainerFile::sync(self)
    }

    fn close(&mut self) -> ContainerResult<()> {
        WritablePbContainerFile::close(self)
    }
}

impl Drop for WritablePbContainerFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(
                target: "pbcontainer",
                path = %self.writer.filename().display(),
                error = %e,
                "Could not Close() when destroying file"
            );
        }
    }
}
