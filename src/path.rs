//! Path-level read and write helpers
//!
//! The container variants store exactly one record behind a header:
//! `write_pb_container_to_path` replaces the file atomically, and
//! `read_pb_container_from_path` returns the first record without looking
//! at anything after it. Callers that keep several records in one file drive
//! `ReadablePbContainerFile` themselves.
//!
//! The bare variants store the serialized message with no framing at all.

use std::io::Read;
use std::path::Path;

use crate::atomic::{write_atomically, SyncMode};
use crate::container::{
    ContainerError, ContainerResult, ReadablePbContainerFile, WritablePbContainerFile,
};
use crate::env::{Env, FlushMode};
use crate::message::{serialize_to_vec, PbMessage};

/// Atomically replaces `path` with a container holding `msg` as its only record.
pub fn write_pb_container_to_path<M: PbMessage>(
    env: &dyn Env,
    path: &Path,
    magic: &str,
    msg: &M,
    sync: SyncMode,
) -> ContainerResult<()> {
    write_atomically(env, path, sync, |file| {
        let mut pb_file = WritablePbContainerFile::new(file);
        pb_file.init(magic)?;
        pb_file.append(msg)?;
        Ok(pb_file)
    })
}

/// Reads the first record of the container at `path`.
pub fn read_pb_container_from_path<M: PbMessage>(
    env: &dyn Env,
    path: &Path,
    magic: &str,
) -> ContainerResult<M> {
    let file = env.new_random_access_file(path).map_err(|e| {
        ContainerError::io_error(format!("Failed to open {}", path.display()), e)
    })?;

    let mut pb_file = ReadablePbContainerFile::new(file);
    pb_file.init(magic)?;
    let msg = pb_file.read_next_pb()?;
    pb_file.close()?;
    Ok(msg)
}

/// Atomically replaces `path` with the bare serialized form of `msg`.
pub fn write_pb_to_path<M: PbMessage>(
    env: &dyn Env,
    path: &Path,
    msg: &M,
    sync: SyncMode,
) -> ContainerResult<()> {
    write_atomically(env, path, sync, |mut file| {
        let mut buf = Vec::new();
        serialize_to_vec(msg, &mut buf).map_err(|e| {
            ContainerError::io_error_with_details("Unable to serialize PB to file", e.to_string())
        })?;
        file.append(&buf)
            .and_then(|_| file.flush(FlushMode::Async))
            .map_err(|e| ContainerError::io_error("Unable to serialize PB to file", e))?;
        Ok(file)
    })
}

/// Reads a bare serialized message from `path`.
pub fn read_pb_from_path<M: PbMessage>(env: &dyn Env, path: &Path) -> ContainerResult<M> {
    let mut file = env.new_sequential_file(path).map_err(|e| {
        ContainerError::io_error(format!("Failed to open {}", path.display()), e)
    })?;

    let mut contents = Vec::new();
    file.read_to_end(&mut contents).map_err(|e| {
        ContainerError::io_error(format!("Failed to read {}", path.display()), e)
    })?;

    M::parse_from(&contents).map_err(|e| {
        ContainerError::io_error_with_details(
            "Unable to parse PB from path",
            format!("{}: {}", path.display(), e),
        )
    })
}
