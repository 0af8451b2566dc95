//! Field-level wire encoding
//!
//! Layout rules, fixed for the whole protocol:
//!
//! - integers: big-endian
//! - `bool`: one byte, `0` or `1`; anything else is malformed
//! - `String`: `u32` byte length followed by UTF-8
//! - `Option<String>`: one flag byte (`0` absent, `1` present), then the string
//! - `Bytes`: `u32` length followed by raw bytes
//! - lists and maps: `u32` element count, then the elements in order
//!
//! Lengths and counts are `u32` on the wire, so a single string, byte field
//! or collection is capped at [`MAX_FIELD_LEN`] elements. Encoding anything
//! larger panics rather than writing a truncated prefix.
//!
//! Every read checks the remaining length before touching the buffer, so a
//! lying length prefix surfaces as [`CodecError::Malformed`] instead of a
//! panic or an oversized allocation.

use crate::error::{CodecError, CodecResult};
use bytes::{BufMut, Bytes, BytesMut};
use std::collections::BTreeMap;
use types::CoreMessage;

/// Cursor over one encoded packet (tag included)
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
    tag: u8,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            tag: 0,
        }
    }

    /// Read the leading type tag
    pub fn read_tag(&mut self) -> CodecResult<u8> {
        let tag = self.read_u8("type tag")?;
        self.tag = tag;
        Ok(tag)
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Fail unless every byte of the packet was consumed
    pub fn finish(&self) -> CodecResult<()> {
        if self.remaining() != 0 {
            return Err(CodecError::malformed(
                self.tag,
                self.pos,
                0,
                self.remaining(),
                "trailing bytes after last field",
            ));
        }
        Ok(())
    }

    fn take(&mut self, need: usize, field: &str) -> CodecResult<&'a [u8]> {
        if self.remaining() < need {
            return Err(CodecError::malformed(
                self.tag,
                self.pos,
                need,
                self.remaining(),
                format!("field {}", field),
            ));
        }
        let data = self.data;
        let slice = &data[self.pos..self.pos + need];
        self.pos += need;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self, field: &str) -> CodecResult<[u8; N]> {
        let slice = self.take(N, field)?;
        let mut array = [0u8; N];
        array.copy_from_slice(slice);
        Ok(array)
    }

    pub fn read_u8(&mut self, field: &str) -> CodecResult<u8> {
        Ok(self.take(1, field)?[0])
    }

    pub fn read_bool(&mut self, field: &str) -> CodecResult<bool> {
        let offset = self.pos;
        match self.read_u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CodecError::malformed(
                self.tag,
                offset,
                1,
                self.remaining(),
                format!("field {}: invalid boolean byte {:#04x}", field, other),
            )),
        }
    }

    pub fn read_u32(&mut self, field: &str) -> CodecResult<u32> {
        Ok(u32::from_be_bytes(self.take_array(field)?))
    }

    pub fn read_i32(&mut self, field: &str) -> CodecResult<i32> {
        Ok(i32::from_be_bytes(self.take_array(field)?))
    }

    pub fn read_i64(&mut self, field: &str) -> CodecResult<i64> {
        Ok(i64::from_be_bytes(self.take_array(field)?))
    }

    /// Read a `u32` length and check it fits in what is left
    fn read_len(&mut self, field: &str) -> CodecResult<usize> {
        let len = self.read_u32(field)? as usize;
        if len > self.remaining() {
            return Err(CodecError::malformed(
                self.tag,
                self.pos,
                len,
                self.remaining(),
                format!("field {}: declared length exceeds packet", field),
            ));
        }
        Ok(len)
    }

    /// Read a `u32` element count; every element needs at least `min_element` bytes
    fn read_count(&mut self, field: &str, min_element: usize) -> CodecResult<usize> {
        let count = self.read_u32(field)? as usize;
        let need = count.saturating_mul(min_element);
        if need > self.remaining() {
            return Err(CodecError::malformed(
                self.tag,
                self.pos,
                need,
                self.remaining(),
                format!("field {}: {} elements cannot fit", field, count),
            ));
        }
        Ok(count)
    }

    pub fn read_string(&mut self, field: &str) -> CodecResult<String> {
        let len = self.read_len(field)?;
        let offset = self.pos;
        let raw = self.take(len, field)?;
        String::from_utf8(raw.to_vec()).map_err(|e| {
            CodecError::malformed(
                self.tag,
                offset,
                len,
                self.remaining(),
                format!("field {}: invalid UTF-8 ({})", field, e),
            )
        })
    }

    pub fn read_nullable_string(&mut self, field: &str) -> CodecResult<Option<String>> {
        if self.read_bool(field)? {
            Ok(Some(self.read_string(field)?))
        } else {
            Ok(None)
        }
    }

    pub fn read_bytes(&mut self, field: &str) -> CodecResult<Bytes> {
        let len = self.read_len(field)?;
        Ok(Bytes::copy_from_slice(self.take(len, field)?))
    }
}

/// Largest length or element count a single field can carry
pub const MAX_FIELD_LEN: usize = u32::MAX as usize;

/// Wire form of a length prefix
///
/// # Panics
///
/// When `len` exceeds [`MAX_FIELD_LEN`].
pub fn wire_len(len: usize) -> u32 {
    match u32::try_from(len) {
        Ok(len) => len,
        Err(_) => panic!("field length {} exceeds wire limit {}", len, MAX_FIELD_LEN),
    }
}

#[inline]
fn put_len(out: &mut BytesMut, len: usize) {
    out.put_u32(wire_len(len));
}

/// A value with a fixed wire layout
pub trait WireField: Sized {
    fn write_to(&self, out: &mut BytesMut);
    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self>;

    /// Decode over an existing value, keeping whatever it pre-allocated
    fn read_into(
        &mut self,
        reader: &mut PacketReader<'_>,
        field: &'static str,
    ) -> CodecResult<()> {
        *self = Self::read_from(reader, field)?;
        Ok(())
    }
}

impl WireField for u8 {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(*self);
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_u8(field)
    }
}

impl WireField for bool {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_u8(u8::from(*self));
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_bool(field)
    }
}

impl WireField for i32 {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_i32(*self);
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_i32(field)
    }
}

impl WireField for i64 {
    fn write_to(&self, out: &mut BytesMut) {
        out.put_i64(*self);
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_i64(field)
    }
}

impl WireField for String {
    fn write_to(&self, out: &mut BytesMut) {
        put_len(out, self.len());
        out.put_slice(self.as_bytes());
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_string(field)
    }
}

impl WireField for Option<String> {
    fn write_to(&self, out: &mut BytesMut) {
        match self {
            Some(value) => {
                out.put_u8(1);
                value.write_to(out);
            }
            None => out.put_u8(0),
        }
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_nullable_string(field)
    }
}

impl WireField for Bytes {
    fn write_to(&self, out: &mut BytesMut) {
        put_len(out, self.len());
        out.put_slice(self);
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        reader.read_bytes(field)
    }
}

impl WireField for Vec<String> {
    fn write_to(&self, out: &mut BytesMut) {
        put_len(out, self.len());
        for value in self {
            value.write_to(out);
        }
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        let count = reader.read_count(field, 4)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(reader.read_string(field)?);
        }
        Ok(values)
    }
}

impl WireField for Vec<i64> {
    fn write_to(&self, out: &mut BytesMut) {
        put_len(out, self.len());
        for value in self {
            out.put_i64(*value);
        }
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        let count = reader.read_count(field, 8)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(reader.read_i64(field)?);
        }
        Ok(values)
    }
}

impl WireField for BTreeMap<String, String> {
    fn write_to(&self, out: &mut BytesMut) {
        put_len(out, self.len());
        for (key, value) in self {
            key.write_to(out);
            value.write_to(out);
        }
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        let count = reader.read_count(field, 8)?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = reader.read_string(field)?;
            let value = reader.read_string(field)?;
            map.insert(key, value);
        }
        Ok(map)
    }
}

impl WireField for CoreMessage {
    fn write_to(&self, out: &mut BytesMut) {
        self.message_id.write_to(out);
        self.address.write_to(out);
        self.durable.write_to(out);
        self.priority.write_to(out);
        self.timestamp.write_to(out);
        self.properties.write_to(out);
        self.body.write_to(out);
    }

    fn read_from(reader: &mut PacketReader<'_>, field: &'static str) -> CodecResult<Self> {
        let mut message = CoreMessage::shell();
        message.read_into(reader, field)?;
        Ok(message)
    }

    /// Fills the shell a packet factory pre-allocated
    fn read_into(
        &mut self,
        reader: &mut PacketReader<'_>,
        _field: &'static str,
    ) -> CodecResult<()> {
        self.message_id = reader.read_i64("message.message_id")?;
        self.address = reader.read_nullable_string("message.address")?;
        self.durable = reader.read_bool("message.durable")?;
        self.priority = reader.read_u8("message.priority")?;
        self.timestamp = reader.read_i64("message.timestamp")?;
        self.properties = BTreeMap::read_from(reader, "message.properties")?;
        self.body = reader.read_bytes("message.body")?;
        Ok(())
    }
}
