//! # Versioned Serializers
//!
//! Fixed-layout binary serializers for values kept in checkpointed state,
//! plus the snapshots that describe how those bytes were written.
//!
//! On restore, the snapshot persisted with the old bytes is asked whether the
//! serializer configured now can read them. Anything but
//! [`SchemaCompatibility::CompatibleAsIs`] must fail the restore.
//!
//! ## Persisted snapshot layout
//!
//! ```text
//! [version: i32 BE][serializer-specific payload]
//! ```

use std::any::Any;
use std::fmt::Debug;
use std::io::{Read, Write};

mod error;
mod timestamp;

pub use error::*;
pub use timestamp::*;

/// Outcome of checking a restored snapshot against a newly configured serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaCompatibility {
    /// The new serializer reads the old bytes unchanged.
    CompatibleAsIs,
    /// The old bytes cannot be read; restoring must fail.
    Incompatible,
}

impl SchemaCompatibility {
    pub fn is_compatible_as_is(self) -> bool {
        matches!(self, Self::CompatibleAsIs)
    }

    pub fn is_incompatible(self) -> bool {
        matches!(self, Self::Incompatible)
    }
}

/// Binary serializer for values of type `T`.
pub trait TypeSerializer<T>: Debug + Send + Sync {
    /// Whether values of `T` can be shared instead of copied.
    fn is_immutable_type(&self) -> bool;

    /// A default value of `T`.
    fn create_instance(&self) -> T;

    /// An independent copy of `from`.
    fn copy(&self, from: &T) -> T;

    /// Encoded size in bytes, if fixed.
    fn length(&self) -> Option<usize>;

    /// Encode `value`. `None` is rejected before anything is written.
    fn serialize(&self, value: Option<&T>, writer: &mut dyn Write) -> Result<(), SerializerError>;

    fn deserialize(&self, reader: &mut dyn Read) -> Result<T, SerializerError>;

    /// Re-encode one value read from `reader` into `writer`.
    fn copy_stream(
        &self,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
    ) -> Result<(), SerializerError> {
        let value = self.deserialize(reader)?;
        self.serialize(Some(&value), writer)
    }

    /// Describe this serializer's configuration for persisting alongside state.
    fn snapshot_configuration(&self) -> Box<dyn TypeSerializerSnapshot<T>>;

    fn as_any(&self) -> &dyn Any;
}

/// Persistable description of a [`TypeSerializer`] configuration.
pub trait TypeSerializerSnapshot<T>: Debug + Send + Sync {
    /// Format version written in front of the payload.
    fn current_version(&self) -> i32;

    /// Write the payload (without the version).
    fn write_snapshot(&self, writer: &mut dyn Write) -> Result<(), SerializerError>;

    /// Read a payload written at `version`.
    fn read_snapshot(&mut self, version: i32, reader: &mut dyn Read)
        -> Result<(), SerializerError>;

    /// A serializer that reads bytes written under this snapshot.
    fn restore_serializer(&self) -> Result<Box<dyn TypeSerializer<T>>, SerializerError>;

    fn resolve_schema_compatibility(
        &self,
        new_serializer: &dyn TypeSerializer<T>,
    ) -> SchemaCompatibility;
}

/// Write `[version][payload]` for `snapshot`.
pub fn write_versioned_snapshot<T>(
    snapshot: &dyn TypeSerializerSnapshot<T>,
    writer: &mut dyn Write,
) -> Result<(), SerializerError> {
    let mut bytes = snapshot.current_version().to_be_bytes().to_vec();
    snapshot.write_snapshot(&mut bytes)?;
    writer.write_all(&bytes)?;
    Ok(())
}

/// Read `[version][payload]` into a fresh `S`.
pub fn read_versioned_snapshot<T, S>(reader: &mut dyn Read) -> Result<S, SerializerError>
where
    S: TypeSerializerSnapshot<T> + Default,
{
    let version = read_i32(reader)?;
    let mut snapshot = S::default();
    snapshot.read_snapshot(version, reader)?;
    Ok(snapshot)
}

fn read_i32(reader: &mut dyn Read) -> Result<i32, SerializerError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_be_bytes(buf))
}

fn read_i64(reader: &mut dyn Read) -> Result<i64, SerializerError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_be_bytes(buf))
}

#[cfg(test)]
#[path = "tests/serializer_tests.rs"]
mod tests;
