//! Frame packing
//!
//! A [`FieldLayout`] says where a signal lives inside a PGN payload. It is
//! chosen once when the catalog is loaded, so packing never re-inspects the
//! bit length. Multi-byte fields are little-endian.
//!
//! Packing mutates the caller's buffer in place and touches only the bits of
//! the field, so successive writes to different signals of the same PGN
//! compose without clobbering each other.

use crate::error::PackError;

/// Position and width of a signal within a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLayout {
    /// 1-7 bits inside a single byte
    Bits {
        start_byte: usize,
        start_bit: u8,
        length: u8,
    },
    /// One whole byte
    Byte { start_byte: usize },
    /// Two bytes, little-endian
    Word { start_byte: usize },
    /// Four bytes, little-endian
    DoubleWord { start_byte: usize },
}

impl FieldLayout {
    /// Select the layout for a catalog position and bit length
    pub fn new(start_byte: usize, start_bit: u8, length: u8) -> Result<Self, PackError> {
        let layout = match length {
            1..=7 => {
                if start_bit as u32 + length as u32 > 8 {
                    return Err(PackError::InvalidStartBit { start_bit, length });
                }
                return Ok(Self::Bits {
                    start_byte,
                    start_bit,
                    length,
                });
            }
            8 => Self::Byte { start_byte },
            16 => Self::Word { start_byte },
            32 => Self::DoubleWord { start_byte },
            other => return Err(PackError::UnsupportedLength(other)),
        };
        if start_bit != 0 {
            return Err(PackError::InvalidStartBit { start_bit, length });
        }
        Ok(layout)
    }

    /// Byte holding the least significant bits of the field
    pub fn start_byte(&self) -> usize {
        match *self {
            Self::Bits { start_byte, .. }
            | Self::Byte { start_byte }
            | Self::Word { start_byte }
            | Self::DoubleWord { start_byte } => start_byte,
        }
    }

    /// Bit offset within the start byte (0 for byte-aligned fields)
    pub fn start_bit(&self) -> u8 {
        match *self {
            Self::Bits { start_bit, .. } => start_bit,
            _ => 0,
        }
    }

    /// Field width in bits
    pub fn length(&self) -> u8 {
        match *self {
            Self::Bits { length, .. } => length,
            Self::Byte { .. } => 8,
            Self::Word { .. } => 16,
            Self::DoubleWord { .. } => 32,
        }
    }

    /// Number of payload bytes spanned by the field
    pub fn byte_len(&self) -> usize {
        match self {
            Self::Bits { .. } | Self::Byte { .. } => 1,
            Self::Word { .. } => 2,
            Self::DoubleWord { .. } => 4,
        }
    }

    /// Offset of the first bit after the field, from the start of the payload
    pub fn end_bit(&self) -> usize {
        self.start_byte()
            .saturating_mul(8)
            .saturating_add(self.start_bit() as usize + self.length() as usize)
    }

    /// Largest raw value the field can hold
    pub fn max_raw(&self) -> u32 {
        match self.length() {
            32 => u32::MAX,
            length => (1u32 << length) - 1,
        }
    }

    /// Write `raw` into the field, leaving every other bit untouched
    pub fn pack(&self, buffer: &mut [u8], raw: u32) -> Result<(), PackError> {
        if raw > self.max_raw() {
            return Err(PackError::ValueOutOfRange {
                raw,
                length: self.length(),
            });
        }
        let bytes = self.field_bytes_mut(buffer)?;

        match *self {
            Self::Bits {
                start_bit, length, ..
            } => {
                let mask = bit_mask(start_bit, length);
                bytes[0] = (bytes[0] & !mask) | ((raw as u8) << start_bit & mask);
            }
            Self::Byte { .. } => bytes[0] = raw as u8,
            Self::Word { .. } => {
                bytes[0] = (raw & 0xFF) as u8;
                bytes[1] = (raw >> 8 & 0xFF) as u8;
            }
            Self::DoubleWord { .. } => {
                bytes[0] = (raw & 0xFF) as u8;
                bytes[1] = (raw >> 8 & 0xFF) as u8;
                bytes[2] = (raw >> 16 & 0xFF) as u8;
                bytes[3] = (raw >> 24 & 0xFF) as u8;
            }
        }
        Ok(())
    }

    /// Read the field's raw value
    pub fn unpack(&self, buffer: &[u8]) -> Result<u32, PackError> {
        let bytes = self.field_bytes(buffer)?;

        let raw = match *self {
            Self::Bits {
                start_bit, length, ..
            } => ((bytes[0] & bit_mask(start_bit, length)) >> start_bit) as u32,
            Self::Byte { .. } => bytes[0] as u32,
            Self::Word { .. } => u16::from_le_bytes([bytes[0], bytes[1]]) as u32,
            Self::DoubleWord { .. } => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        };
        Ok(raw)
    }

    fn field_bytes<'a>(&self, buffer: &'a [u8]) -> Result<&'a [u8], PackError> {
        let start = self.start_byte();
        let end = start.saturating_add(self.byte_len());
        buffer.get(start..end).ok_or(PackError::BufferTooShort {
            needed: end,
            available: buffer.len(),
        })
    }

    fn field_bytes_mut<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], PackError> {
        let start = self.start_byte();
        let end = start.saturating_add(self.byte_len());
        let available = buffer.len();
        buffer.get_mut(start..end).ok_or(PackError::BufferTooShort {
            needed: end,
            available,
        })
    }
}

/// `length` ones shifted up to `start_bit`
fn bit_mask(start_bit: u8, length: u8) -> u8 {
    (((1u16 << length) - 1) << start_bit) as u8
}
