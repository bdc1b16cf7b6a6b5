use thiserror::Error;

use crate::{
    math::{Rot, Vec3},
    types::{EntityId, TicketId, ViewId, WorldId},
};

/// Errors that can occur while deserializing wire data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Ran out of input while a value was still being read (SECURITY:
    /// truncated or malicious payload)
    #[error("Unexpected end of input while reading")]
    UnexpectedEnd,

    /// A variant discriminant outside the valid range was received
    #[error("Invalid discriminant {value} for {type_name}")]
    InvalidDiscriminant { value: u8, type_name: &'static str },

    /// A variable-length integer exceeded 64 bits
    #[error("Variable-length integer exceeds 64 bits")]
    VarintOverflow,

    /// A frame length prefix exceeded the 3-byte limit
    #[error("Frame length prefix longer than 3 bytes")]
    FramePrefixTooLong,
}

/// Growable byte-level writer for outbound messages
pub struct ByteWriter {
    buffer: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(u8::from(value));
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    /// LEB128-style variable-length unsigned integer
    pub fn write_varint(&mut self, mut value: u64) {
        loop {
            let mut byte = (value & 0x7f) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.buffer.push(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Length-prefixed byte slice
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_varint(bytes.len() as u64);
        self.buffer.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn to_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Cursor over inbound wire data
pub struct ByteReader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], SerdeErr> {
        // Checked: `count` comes straight off the wire and may be huge
        if count > self.buffer.len() - self.cursor {
            return Err(SerdeErr::UnexpectedEnd);
        }
        let slice = &self.buffer[self.cursor..self.cursor + count];
        self.cursor += count;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, SerdeErr> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, SerdeErr> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, SerdeErr> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, SerdeErr> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f32(&mut self) -> Result<f32, SerdeErr> {
        let bytes = self.take(4)?;
        Ok(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_f64(&mut self) -> Result<f64, SerdeErr> {
        let bytes = self.take(8)?;
        Ok(f64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]))
    }

    pub fn read_varint(&mut self) -> Result<u64, SerdeErr> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            if shift >= 64 {
                return Err(SerdeErr::VarintOverflow);
            }
            let byte = self.read_u8()?;
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    pub fn read_bytes(&mut self) -> Result<Vec<u8>, SerdeErr> {
        let length = self.read_varint()? as usize;
        Ok(self.take(length)?.to_vec())
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

/// Byte-level serialization for wire values
pub trait Serde: Sized {
    fn ser(&self, writer: &mut ByteWriter);
    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr>;
}

impl Serde for ViewId {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_u16(self.value());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(ViewId::new(reader.read_u16()?))
    }
}

impl Serde for WorldId {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_u16(self.value());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(WorldId::new(reader.read_u16()?))
    }
}

impl Serde for EntityId {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_u32(self.value());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(EntityId::new(reader.read_u32()?))
    }
}

impl Serde for TicketId {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_u32(self.value());
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(TicketId::new(reader.read_u32()?))
    }
}

impl Serde for Vec3 {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_f64(self.x);
        writer.write_f64(self.y);
        writer.write_f64(self.z);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Vec3::new(
            reader.read_f64()?,
            reader.read_f64()?,
            reader.read_f64()?,
        ))
    }
}

impl Serde for Rot {
    fn ser(&self, writer: &mut ByteWriter) {
        writer.write_f32(self.yaw);
        writer.write_f32(self.pitch);
    }

    fn de(reader: &mut ByteReader) -> Result<Self, SerdeErr> {
        Ok(Rot::new(reader.read_f32()?, reader.read_f32()?))
    }
}
