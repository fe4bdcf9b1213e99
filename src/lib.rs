//! pbcontainer - checksummed protobuf container files with atomic replacement
//!
//! Persists serialized messages in a self-describing container format
//! (magic, version, then length-prefixed CRC32C-checked records) and replaces
//! files on disk via write-to-temp, fsync, rename.
//!
//! # Modules
//!
//! - `container`: the on-disk format, writer and reader
//! - `atomic`: crash-safe replacement of a file's contents
//! - `path`: one-call read/write of a single message at a path
//! - `env`: the file service the layers above are written against
//! - `message`: the serialization seam (any `prost::Message`)

pub mod atomic;
pub mod container;
pub mod crash_point;
pub mod env;
pub mod message;
pub mod path;

pub use atomic::{write_atomically, AtomicWriteOptions, DurableSink, SyncMode};
pub use container::{
    ContainerError, ContainerErrorCode, ContainerResult, ReadablePbContainerFile,
    WritablePbContainerFile,
};
pub use env::{DiskEnv, Env};
pub use message::PbMessage;
pub use path::{
    read_pb_container_from_path, read_pb_from_path, write_pb_container_to_path, write_pb_to_path,
};
