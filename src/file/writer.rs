//! Blob writer for metadata signature encoding.
//!
//! [`BlobWriter`] is the symmetric inverse of [`crate::file::parser::Parser`]: it emits
//! primitive values, ECMA-335 compressed integers, compressed `TypeDefOrRef` coded
//! indices and serialized UTF-8 strings into a growable buffer.

use crate::{
    error::malformed_error,
    metadata::token::{TableId, Token},
    Result,
};

/// Maximum value representable by the 4-byte compressed uint encoding.
const MAX_COMPRESSED_UINT: u32 = 0x1FFF_FFFF;

/// An append-only buffer with ECMA-335 compressed encodings.
///
/// The writer never fails on capacity; encoding errors only occur for values that the
/// compressed formats cannot represent.
#[derive(Debug, Default)]
pub struct BlobWriter {
    buffer: Vec<u8>,
}

impl BlobWriter {
    /// Create a new empty writer
    #[must_use]
    pub fn new() -> Self {
        BlobWriter { buffer: Vec::new() }
    }

    /// Number of bytes written so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if nothing has been written
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Borrow the written bytes
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the written bytes
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    /// Write a single byte
    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Write raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Write a `u16` in little-endian
    pub fn write_u16_le(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a `u64` in little-endian
    pub fn write_u64_le(&mut self, value: u64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Write a compressed unsigned integer as defined in §II.23.2
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the value exceeds the
    /// 29-bit range of the compressed format
    pub fn write_compressed_uint(&mut self, value: u32) -> Result<()> {
        if value < 0x80 {
            self.buffer.push(value as u8);
        } else if value < 0x4000 {
            self.buffer.push(0x80 | (value >> 8) as u8);
            self.buffer.push((value & 0xFF) as u8);
        } else if value <= MAX_COMPRESSED_UINT {
            self.buffer.push(0xC0 | (value >> 24) as u8);
            self.buffer.push(((value >> 16) & 0xFF) as u8);
            self.buffer.push(((value >> 8) & 0xFF) as u8);
            self.buffer.push((value & 0xFF) as u8);
        } else {
            return Err(malformed_error!(
                "Value does not fit a compressed uint - {}",
                value
            ));
        }

        Ok(())
    }

    /// Write a compressed signed integer as defined in §II.23.2
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the rotated value exceeds the
    /// compressed range
    pub fn write_compressed_int(&mut self, value: i32) -> Result<()> {
        // Rotate-left-by-one sign encoding, §II.23.2
        let unsigned = if value >= 0 {
            (value as u32) << 1
        } else {
            (((-(i64::from(value)) - 1) as u32) << 1) | 1
        };

        self.write_compressed_uint(unsigned)
    }

    /// Encode a [`Token`] as a compressed `TypeDefOrRef` coded index
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the token's table is not
    /// `TypeDef`, `TypeRef` or `TypeSpec`
    pub fn write_compressed_token(&mut self, token: Token) -> Result<()> {
        let tag = match token.table() {
            TableId::TYPE_DEF => 0,
            TableId::TYPE_REF => 1,
            TableId::TYPE_SPEC => 2,
            table => {
                return Err(malformed_error!(
                    "Table 0x{:02X} cannot be encoded as TypeDefOrRef",
                    table
                ))
            }
        };

        self.write_compressed_uint((token.rid() << 2) | tag)
    }

    /// Write a length-prefixed UTF-8 serialized string; `None` encodes the null string
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the string is longer than the
    /// compressed length prefix allows
    pub fn write_ser_string(&mut self, value: Option<&str>) -> Result<()> {
        match value {
            None => {
                self.buffer.push(0xFF);
                Ok(())
            }
            Some(text) => {
                let bytes = text.as_bytes();
                let length = u32::try_from(bytes.len())
                    .map_err(|_| malformed_error!("SerString too long - {} bytes", bytes.len()))?;
                self.write_compressed_uint(length)?;
                self.buffer.extend_from_slice(bytes);
                Ok(())
            }
        }
    }
}
