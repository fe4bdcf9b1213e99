//! Serialized message seam
//!
//! The container layer frames opaque serialized messages. Everything it needs
//! to know about a message goes through `PbMessage`, which is implemented for
//! every `prost::Message`.
//!
//! Serialization measures the message first, then encodes into a buffer of
//! exactly that size. If the two disagree the message changed shape while it
//! was being written, and the process panics rather than persist bytes that
//! do not match the announced length.

use thiserror::Error;

use crate::container::{ContainerError, ContainerResult};

/// Errors produced by the serialization library.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error("decode failed: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// A message that can be stored as a container record.
pub trait PbMessage: Sized {
    /// Fully qualified type name, for diagnostics.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Names of required fields that are not set. Empty when the message
    /// can be serialized.
    fn initialization_errors(&self) -> Vec<String> {
        Vec::new()
    }

    /// Exact number of bytes `serialize_into` will produce.
    fn byte_size(&self) -> usize;

    /// Serializes into `buf`, returning the number of bytes produced.
    fn serialize_into(&self, buf: &mut [u8]) -> Result<usize, CodecError>;

    /// Parses a message from `bytes`.
    fn parse_from(bytes: &[u8]) -> Result<Self, CodecError>;
}

impl<M> PbMessage for M
where
    M: prost::Message + Default,
{
    fn byte_size(&self) -> usize {
        self.encoded_len()
    }

    fn serialize_into(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        let capacity = buf.len();
        let mut cursor: &mut [u8] = buf;
        self.encode(&mut cursor)?;
        Ok(capacity - cursor.len())
    }

    fn parse_from(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(M::decode(bytes)?)
    }
}

/// Describes why `msg` cannot be handled by `action`.
pub fn initialization_error_message<M: PbMessage>(action: &str, msg: &M) -> String {
    format!(
        "Can't {} message of type \"{}\" because it is missing required fields: {}",
        action,
        msg.type_name(),
        msg.initialization_errors().join(", ")
    )
}

/// Panics with a message that tells a concurrent modification apart from
/// a size calculation bug.
fn byte_size_consistency_error(before: usize, after: usize, produced: usize) -> ! {
    assert_eq!(
        before, after,
        "Protocol message was modified concurrently during serialization."
    );
    assert_eq!(
        produced, before,
        "Byte size calculation and serialization were inconsistent. This may indicate a bug \
         in the serialization library or it may be caused by concurrent modification of the \
         message."
    );
    panic!("byte size consistency check failed although all sizes are equal");
}

/// Serializes `msg` into `buf`, whose length must be the `byte_size` measured
/// by the caller.
///
/// A serialization failure is returned only when the message size is still
/// the measured one. Any size disagreement panics.
pub(crate) fn serialize_exact<M: PbMessage>(msg: &M, buf: &mut [u8]) -> Result<(), CodecError> {
    let byte_size = buf.len();
    match msg.serialize_into(buf) {
        Ok(produced) if produced == byte_size => Ok(()),
        Ok(produced) => byte_size_consistency_error(byte_size, msg.byte_size(), produced),
        Err(e) => {
            let after = msg.byte_size();
            if after != byte_size {
                byte_size_consistency_error(byte_size, after, byte_size);
            }
            Err(e)
        }
    }
}

/// Appends the serialized form of `msg` to `out`.
pub fn append_to_vec<M: PbMessage>(msg: &M, out: &mut Vec<u8>) -> Result<(), CodecError> {
    debug_assert!(
        msg.initialization_errors().is_empty(),
        "{}",
        initialization_error_message("serialize", msg)
    );

    let old_len = out.len();
    out.resize(old_len + msg.byte_size(), 0);
    if let Err(e) = serialize_exact(msg, &mut out[old_len..]) {
        out.truncate(old_len);
        return Err(e);
    }
    Ok(())
}

/// Replaces the contents of `out` with the serialized form of `msg`.
pub fn serialize_to_vec<M: PbMessage>(msg: &M, out: &mut Vec<u8>) -> Result<(), CodecError> {
    out.clear();
    append_to_vec(msg, out)
}

/// Parses a message from bytes that are expected to be intact.
///
/// Failure is reported as corruption.
pub fn parse_from_slice<M: PbMessage + Default>(bytes: &[u8]) -> ContainerResult<M> {
    M::parse_from(bytes).map_err(|e| {
        ContainerError::corruption_with_details(
            "Error parsing msg",
            format!(
                "{} ({})",
                initialization_error_message("parse", &M::default()),
                e
            ),
        )
    })
}
