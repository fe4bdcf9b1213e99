//! Protobuf container file format
//!
//! A container file is a fixed header followed by zero or more checksummed,
//! length-prefixed records:
//!
//! ```text
//! +------------------+
//! | Magic            | (8 bytes, caller supplied)
//! +------------------+
//! | Version          | (u32 LE, always 1)
//! +------------------+
//! | Data Size        | (u32 LE)          \
//! +------------------+                   |
//! | Payload          | (data_size bytes) | repeated
//! +------------------+                   |
//! | Checksum         | (u32 LE)          /
//! +------------------+
//! ```
//!
//! The checksum is CRC32C over the 4 raw data size bytes followed by the
//! payload. Records are self-delimiting; there is no padding.
//!
//! # Failure semantics
//!
//! - Wrong magic or a bad checksum is corruption
//! - Any version other than `CONTAINER_VERSION` is rejected
//! - End of file exactly at a record boundary is the end of the stream
//! - End of file anywhere inside a record is corruption

mod checksum;
mod errors;
mod reader;
mod writer;

pub use checksum::{compute_checksum, Crc32c};
pub use errors::{ContainerError, ContainerErrorCode, ContainerResult};
pub use reader::ReadablePbContainerFile;
pub use writer::WritablePbContainerFile;

/// The only container version that is written or accepted.
pub const CONTAINER_VERSION: u32 = 1;

/// Length of the magic tag at the start of every container file.
pub const MAGIC_LEN: usize = 8;

/// Magic followed by the version.
pub const HEADER_LEN: usize = MAGIC_LEN + std::mem::size_of::<u32>();

/// Length of the data size prefix of every record.
pub const DATA_SIZE_LEN: usize = std::mem::size_of::<u32>();

/// Length of the checksum trailer of every record.
pub const CHECKSUM_LEN: usize = std::mem::size_of::<u32>();

/// Decodes a little-endian u32 from the first 4 bytes of `buf`.
pub(crate) fn decode_fixed32(buf: &[u8]) -> u32 {
    u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]])
}

/// Renders a magic tag for error messages, escaping anything unprintable.
pub(crate) fn escape_magic(magic: &[u8]) -> String {
    magic
        .iter()
        .flat_map(|b| std::ascii::escape_default(*b))
        .map(char::from)
        .collect()
}
