//! The high-level entry points.
//!
//! [`Binform`] pairs a shared [`Schema`] with walk options and exposes the
//! serialize/deserialize operations. The engine is stateless across calls:
//! every operation owns its value graph, stream framing, and accumulators,
//! so one `Binform` (or one `Arc<Schema>`) can serve concurrent callers.

use crate::de::deserialize_record;
use crate::error::{BinformError, Result};
use crate::event::WalkObserver;
use crate::schema::Schema;
use crate::ser::serialize_record;
use crate::stream::InputStream;
use crate::value::{Record, TypeId, Value};
use std::io::{Cursor, Read, Seek, Write};
use std::sync::Arc;

/// The engine façade: a schema plus per-engine options.
#[derive(Clone)]
pub struct Binform {
    schema: Arc<Schema>,
    observers: Vec<Arc<dyn WalkObserver>>,
}

impl std::fmt::Debug for Binform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binform")
            .field("schema", &self.schema)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Binform {
    /// Wraps a schema into an engine with default options.
    pub fn new(schema: Schema) -> Self {
        Self::with_schema(Arc::new(schema))
    }

    /// Wraps an already shared schema.
    pub fn with_schema(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            observers: Vec::new(),
        }
    }

    /// Subscribes a walk observer; events are published synchronously on the
    /// walking thread.
    pub fn observer(mut self, observer: Arc<dyn WalkObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// The underlying schema.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Serializes a record to a fresh byte vector.
    pub fn serialize(&self, record: &Record) -> Result<Vec<u8>> {
        serialize_record(&self.schema, &self.observers, record)
    }

    /// Serializes a record into a writer; the frame is assembled in memory
    /// (write-back needs patching) and flushed once.
    pub fn serialize_into<W: Write>(&self, record: &Record, mut writer: W) -> Result<()> {
        let bytes = self.serialize(record)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    /// Deserializes a record of `type_id` from an in-memory buffer.
    pub fn deserialize(&self, type_id: impl Into<TypeId>, bytes: &[u8]) -> Result<Record> {
        let mut cursor = Cursor::new(bytes);
        self.deserialize_from_seek(type_id, &mut cursor)
    }

    /// Deserializes from a seekable reader; every framer feature is
    /// available.
    pub fn deserialize_from_seek<R: Read + Seek>(
        &self,
        type_id: impl Into<TypeId>,
        reader: &mut R,
    ) -> Result<Record> {
        let input = InputStream::seekable(reader);
        self.run_deserialize(type_id.into(), input)
    }

    /// Deserializes from a plain reader; offsets, sentinel peeking,
    /// until-item deferral, and deferred endianness are unavailable and fail
    /// with [`BinformError::NotSeekable`].
    pub fn deserialize_from<R: Read>(
        &self,
        type_id: impl Into<TypeId>,
        reader: &mut R,
    ) -> Result<Record> {
        let input = InputStream::plain(reader);
        self.run_deserialize(type_id.into(), input)
    }

    fn run_deserialize(&self, type_id: TypeId, input: InputStream<'_>) -> Result<Record> {
        match deserialize_record(&self.schema, &self.observers, &type_id, input)? {
            Value::Record(record) => Ok(record),
            other => Err(BinformError::TypeMismatch {
                expected: "record",
                found: other.kind_name(),
            }),
        }
    }
}
