//! Container reader with strict corruption detection
//!
//! Every read is bounds-checked against the file size before any bytes are
//! fetched, so an announced record length larger than the file is reported
//! as truncation without allocating for it.
//!
//! The read cursor only moves forward. Records come back in the order they
//! were appended.

use std::path::{Path, PathBuf};

use super::checksum::Crc32c;
use super::errors::{ContainerError, ContainerResult};
use super::{
    decode_fixed32, escape_magic, CHECKSUM_LEN, CONTAINER_VERSION, DATA_SIZE_LEN, HEADER_LEN,
    MAGIC_LEN,
};
use crate::env::RandomAccessFile;
use crate::message::PbMessage;

/// What running past the end of the file means for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EofPolicy {
    /// The stream ended cleanly; report end of stream.
    Acceptable,
    /// The file is truncated; report corruption.
    Error,
}

/// Reads a container file from a source it owns exclusively.
pub struct ReadablePbContainerFile {
    /// Absolute position of the next read
    offset: u64,
    /// Set once the header has been validated
    initialized: bool,
    /// Released on close
    reader: Option<Box<dyn RandomAccessFile>>,
    /// Kept for error messages after close
    path: PathBuf,
}

impl ReadablePbContainerFile {
    /// Takes ownership of an open source. Nothing is read until `init`.
    pub fn new(reader: Box<dyn RandomAccessFile>) -> Self {
        let path = reader.filename().to_path_buf();
        Self {
            offset: 0,
            initialized: false,
            reader: Some(reader),
            path,
        }
    }

    /// Reads and validates the header.
    ///
    /// # Errors
    ///
    /// - Corruption if the file is shorter than the header or the magic differs
    /// - UnsupportedVersion if the version is not `CONTAINER_VERSION`
    ///
    /// # Panics
    ///
    /// If `magic` is not exactly `MAGIC_LEN` bytes, or the header was already read.
    pub fn init(&mut self, magic: &str) -> ContainerResult<()> {
        assert_eq!(
            magic.len(),
            MAGIC_LEN,
            "Magic number string incorrect length"
        );
        assert!(
            !self.initialized,
            "init() called twice on container reader for {}",
            self.path.display()
        );

        let header = self
            .validate_and_read(HEADER_LEN, EofPolicy::Error)
            .map_err(|e| {
                e.prepend(format!(
                    "Could not read header for proto container file {}",
                    self.path.display()
                ))
            })?;

        let file_magic = &header[..MAGIC_LEN];
        if file_magic != magic.as_bytes() {
            return Err(ContainerError::corruption_with_details(
                "Invalid magic number",
                format!(
                    "Expected: {}, found: {}",
                    escape_magic(magic.as_bytes()),
                    escape_magic(file_magic)
                ),
            ));
        }

        let version = decode_fixed32(&header[MAGIC_LEN..]);
        if version != CONTAINER_VERSION {
            return Err(ContainerError::unsupported_version(version, CONTAINER_VERSION));
        }

        self.initialized = true;
        Ok(())
    }

    /// Reads the next record and parses it as `M`.
    ///
    /// # Errors
    ///
    /// - EndOfStream when the file ends exactly at a record boundary
    /// - Corruption when a record is truncated or its checksum does not match
    /// - IoError when intact bytes do not parse as `M`
    pub fn read_next_pb<M: PbMessage>(&mut self) -> ContainerResult<M> {
        assert!(
            self.initialized,
            "read_next_pb() called before init() on container reader for {}",
            self.path.display()
        );

        let size = self
            .validate_and_read(DATA_SIZE_LEN, EofPolicy::Acceptable)
            .map_err(|e| {
                e.prepend(format!(
                    "Could not read data size from proto container file {}",
                    self.path.display()
                ))
            })?;
        let data_size = decode_fixed32(&size) as usize;

        let body = self
            .validate_and_read(data_size, EofPolicy::Error)
            .map_err(|e| {
                e.prepend(format!(
                    "Could not read body from proto container file {}",
                    self.path.display()
                ))
            })?;

        let encoded_checksum = self
            .validate_and_read(CHECKSUM_LEN, EofPolicy::Error)
            .map_err(|e| {
                e.prepend(format!(
                    "Could not read checksum from proto container file {}",
                    self.path.display()
                ))
            })?;
        let expected_checksum = decode_fixed32(&encoded_checksum);

        let mut crc = Crc32c::new();
        crc.update(&size);
        crc.update(&body);
        let actual_checksum = crc.finalize();
        if actual_checksum != expected_checksum {
            return Err(ContainerError::corruption(format!(
                "Incorrect checksum of file {}: actually {}, expected {}",
                self.path.display(),
                actual_checksum,
                expected_checksum
            )));
        }

        M::parse_from(&body).map_err(|e| {
            ContainerError::io_error_with_details(
                "Unable to parse PB from path",
                format!("{}: {}", self.path.display(), e),
            )
        })
    }

    /// Reads exactly `length` bytes at the cursor and advances it.
    ///
    /// The range is checked against the file size first. Running past the
    /// end is end of stream or corruption depending on `eof`.
    pub(crate) fn validate_and_read(
        &mut self,
        length: usize,
        eof: EofPolicy,
    ) -> ContainerResult<Vec<u8>> {
        let reader = self.source("validate_and_read");

        let file_size = reader.size().map_err(|e| {
            ContainerError::io_error(
                format!("Could not get size of proto container file {}", self.path.display()),
                e,
            )
        })?;

        let end = self.offset.checked_add(length as u64);
        if end.map_or(true, |end| end > file_size) {
            return Err(match eof {
                EofPolicy::Acceptable => ContainerError::end_of_stream("Reached end of file"),
                EofPolicy::Error => ContainerError::corruption_with_details(
                    "File size not large enough to be valid",
                    format!(
                        "Proto container file {}: tried to read {} bytes at offset {} \
                         but file size is only {}",
                        self.path.display(),
                        length,
                        self.offset,
                        file_size
                    ),
                ),
            });
        }

        let mut buf = vec![0u8; length];
        let read = reader.read_at(self.offset, &mut buf).map_err(|e| {
            ContainerError::io_error(
                format!(
                    "Could not read {} bytes at offset {} from proto container file {}",
                    length,
                    self.offset,
                    self.path.display()
                ),
                e,
            )
        })?;

        if read < length {
            return Err(ContainerError::corruption_with_details(
                "Unexpected short read",
                format!(
                    "Proto container file {}: tried to read {} bytes; got {} bytes",
                    self.path.display(),
                    length,
                    read
                ),
            ));
        }

        self.offset += read as u64;
        Ok(buf)
    }

    /// Releases the source. Only the first call does anything.
    pub fn close(&mut self) -> ContainerResult<()> {
        self.reader.take();
        Ok(())
    }

    /// Returns whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    /// Absolute position of the next read.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Path of the underlying source.
    pub fn filename(&self) -> &Path {
        &self.path
    }

    fn source(&self, op: &str) -> &dyn RandomAccessFile {
        match self.reader.as_deref() {
            Some(reader) => reader,
            None => panic!(
                "{}() called on closed container reader for {}",
                op,
                self.path.display()
            ),
        }
    }
}

impl Drop for ReadablePbContainerFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(
                target: "pbcontainer",
                path = %self.path.display(),
                error = %e,
                "Could not Close() when destroying file"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{compute_checksum, WritablePbContainerFile};
    use crate::env::{DiskEnv, Env};
    use std::fs;
    use tempfile::TempDir;

    #[derive(Clone, PartialEq, prost::Message)]
    struct TabletMeta {
        #[prost(string, tag = "1")]
        tablet_id: String,
        #[prost(uint32, tag = "2")]
        schema_version: u32,
    }

    fn meta(id: &str) -> TabletMeta {
        TabletMeta {
            tablet_id: id.to_string(),
            schema_version: 3,
        }
    }

    fn write_container(temp_dir: &TempDir, records: &[TabletMeta]) -> PathBuf {
        let template = temp_dir.path().join("meta.XXXXXX");
        let (path, file) = DiskEnv.new_temp_writable_file(&template).unwrap();
        let mut writer = WritablePbContainerFile::new(file);
        writer.init("TESTMAGX").unwrap();
        for record in records {
            writer.append(record).unwrap();
        }
        writer.close().unwrap();
        path
    }

    fn open_reader(path: &Path) -> ReadablePbContainerFile {
        ReadablePbContainerFile::new(DiskEnv.new_random_access_file(path).unwrap())
    }

    #[test]
    fn test_read_single_record() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[meta("t1")]);

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();
        assert_eq!(reader.offset(), HEADER_LEN as u64);

        let record: TabletMeta = reader.read_next_pb().unwrap();
        assert_eq!(record, meta("t1"));

        let err = reader.read_next_pb::<TabletMeta>().unwrap_err();
        assert!(err.is_end_of_stream());
    }

    #[test]
    fn test_header_only_file_is_end_of_stream() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[]);

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();
        assert!(reader.read_next_pb::<TabletMeta>().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_wrong_magic_reports_both_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[meta("t1")]);

        let mut reader = open_reader(&path);
        let err = reader.init("OTHERMAG").unwrap_err();
        assert!(err.is_corruption());
        let text = err.to_string();
        assert!(text.contains("TESTMAGX"));
        assert!(text.contains("OTHERMAG"));
    }

    #[test]
    fn test_empty_file_header_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty");
        fs::write(&path, b"").unwrap();

        let mut reader = open_reader(&path);
        let err = reader.init("TESTMAGX").unwrap_err();
        assert!(err.is_corruption());
        assert!(err.message().starts_with("Could not read header for proto container file"));
        assert!(err.details().unwrap().contains("file size is only 0"));
    }

    #[test]
    fn test_unsupported_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("v2");
        let mut contents = b"TESTMAGX".to_vec();
        contents.extend_from_slice(&2u32.to_le_bytes());
        fs::write(&path, contents).unwrap();

        let mut reader = open_reader(&path);
        let err = reader.init("TESTMAGX").unwrap_err();
        assert!(err.is_unsupported_version());
    }

    #[test]
    fn test_truncated_body_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[meta("tablet-with-a-long-id")]);

        let contents = fs::read(&path).unwrap();
        fs::write(&path, &contents[..HEADER_LEN + DATA_SIZE_LEN + 3]).unwrap();

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();
        let err = reader.read_next_pb::<TabletMeta>().unwrap_err();
        assert!(err.is_corruption());
        assert!(err.message().contains("Could not read body"));
    }

    #[test]
    fn test_missing_checksum_is_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[meta("t1")]);

        let contents = fs::read(&path).unwrap();
        fs::write(&path, &contents[..contents.len() - 1]).unwrap();

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();
        let err = reader.read_next_pb::<TabletMeta>().unwrap_err();
        assert!(err.is_corruption());
        assert!(err.message().contains("Could not read checksum"));
    }

    #[test]
    fn test_checksum_mismatch_reports_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[meta("t1")]);

        let mut contents = fs::read(&path).unwrap();
        let last = contents.len() - 1;
        contents[last] ^= 0x01;
        fs::write(&path, contents).unwrap();

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();
        let err = reader.read_next_pb::<TabletMeta>().unwrap_err();
        assert!(err.is_corruption());
        assert!(err.message().contains("Incorrect checksum"));
        assert!(err.message().contains("actually"));
    }

    #[test]
    fn test_valid_checksum_over_garbage_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("garbage");

        let body = [0xFFu8, 0xFF, 0xFF];
        let mut record = (body.len() as u32).to_le_bytes().to_vec();
        record.extend_from_slice(&body);
        let checksum = compute_checksum(&record);

        let mut contents = b"TESTMAGX".to_vec();
        contents.extend_from_slice(&CONTAINER_VERSION.to_le_bytes());
        contents.extend_from_slice(&record);
        contents.extend_from_slice(&checksum.to_le_bytes());
        fs::write(&path, contents).unwrap();

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();
        let err = reader.read_next_pb::<TabletMeta>().unwrap_err();
        assert_eq!(err.code(), crate::container::ContainerErrorCode::IoError);
        assert!(err.to_string().contains("Unable to parse PB from path"));
    }

    #[test]
    fn test_validate_and_read_policies() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[]);

        let mut reader = open_reader(&path);
        reader.init("TESTMAGX").unwrap();

        assert!(reader
            .validate_and_read(1, EofPolicy::Acceptable)
            .unwrap_err()
            .is_end_of_stream());
        assert!(reader
            .validate_and_read(1, EofPolicy::Error)
            .unwrap_err()
            .is_corruption());
        assert_eq!(reader.offset(), HEADER_LEN as u64);

        assert!(reader.validate_and_read(0, EofPolicy::Error).unwrap().is_empty());
    }

    #[test]
    fn test_close_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[]);

        let mut reader = open_reader(&path);
        reader.close().unwrap();
        reader.close().unwrap();
        assert!(reader.is_closed());
        assert_eq!(reader.filename(), path.as_path());
    }

    #[test]
    #[should_panic(expected = "called on closed container reader")]
    fn test_read_after_close_panics() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_container(&temp_dir, &[]);

        let mut reader = open_reader(&path);
        reader.close().unwrap();
        let _ = reader.init("TESTMAGX");
    }
}
