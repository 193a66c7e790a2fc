//! Byte-level encoding of the record stream.
//!
//! All integers are little-endian. Value blobs go through `bincode` with
//! fixed-width integers; on read, the decoder bounds bincode by the bytes that
//! are actually left so that a corrupt length can never allocate past the
//! buffer.

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DeserializeError, SerializeError};
use crate::tag::TypeTag;

/// Slot index written for an empty reference.
pub const NULL_SLOT: u32 = u32::MAX;

fn blob_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Append-only writer for one save call.
#[derive(Default)]
pub(crate) struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_tag(&mut self, tag: TypeTag) {
        self.bytes.extend_from_slice(&tag.to_bytes());
    }

    pub fn write_slot(&mut self, slot: Option<u32>) {
        self.write_u32(slot.unwrap_or(NULL_SLOT));
    }

    pub fn write_len(&mut self, len: usize) -> Result<(), SerializeError> {
        let len = u32::try_from(len).map_err(|_| SerializeError::SlotOverflow)?;
        self.write_u32(len);
        Ok(())
    }

    pub fn write_value<V: Serialize>(
        &mut self,
        field: &'static str,
        value: &V,
    ) -> Result<(), SerializeError> {
        blob_options()
            .serialize_into(&mut self.bytes, value)
            .map_err(|e| SerializeError::Value {
                field,
                message: e.to_string(),
            })
    }

    pub fn write_pod_slice<V: bytemuck::Pod>(&mut self, values: &[V]) {
        self.bytes.extend_from_slice(bytemuck::cast_slice(values));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// Bounds-checked cursor over a loaded buffer.
pub(crate) struct Decoder<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> Decoder<'b> {
    pub fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    pub fn is_at_end(&self) -> bool {
        self.pos == self.bytes.len()
    }

    fn truncated(&self, needed: usize) -> DeserializeError {
        DeserializeError::TruncatedStream {
            offset: self.pos,
            needed: needed - self.remaining(),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'b [u8], DeserializeError> {
        if self.remaining() < len {
            return Err(self.truncated(len));
        }
        let out = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    pub fn read_u32(&mut self) -> Result<u32, DeserializeError> {
        let raw = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn read_tag(&mut self) -> Result<TypeTag, DeserializeError> {
        self.read_u32().map(TypeTag::new)
    }

    pub fn read_slot(&mut self) -> Result<Option<u32>, DeserializeError> {
        let slot = self.read_u32()?;
        Ok((slot != NULL_SLOT).then_some(slot))
    }

    pub fn read_value<V: DeserializeOwned>(
        &mut self,
        field: &'static str,
    ) -> Result<V, DeserializeError> {
        let mut rest = &self.bytes[self.pos..];
        let available = rest.len();
        let result = blob_options()
            .with_limit(available as u64)
            .deserialize_from(&mut rest);
        match result {
            Ok(value) => {
                self.pos += available - rest.len();
                Ok(value)
            }
            // The limit equals the bytes left, so running short surfaces as
            // `SizeLimit` before bincode reads past the end.
            Err(e) => match *e {
                bincode::ErrorKind::SizeLimit => Err(DeserializeError::TruncatedStream {
                    offset: self.pos + available - rest.len(),
                    needed: 1,
                }),
                bincode::ErrorKind::Io(ref io)
                    if io.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    Err(DeserializeError::TruncatedStream {
                        offset: self.bytes.len(),
                        needed: 1,
                    })
                }
                other => Err(DeserializeError::Value {
                    field,
                    message: other.to_string(),
                }),
            },
        }
    }

    pub fn read_pod_vec<V: bytemuck::Pod>(&mut self, count: usize) -> Result<Vec<V>, DeserializeError> {
        let width = std::mem::size_of::<V>();
        let len = count
            .checked_mul(width)
            .ok_or_else(|| self.truncated(usize::MAX))?;
        let raw = self.read_bytes(len)?;
        if width == 0 {
            return Ok(vec![<V as bytemuck::Zeroable>::zeroed(); count]);
        }
        Ok(raw
            .chunks_exact(width)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }
}
