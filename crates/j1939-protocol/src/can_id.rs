//! 29-bit J1939 CAN identifiers
//!
//! A J1939 identifier packs the message priority, the Parameter Group Number
//! and the sender's source address:
//!
//! ```text
//!  28  26 25                      8 7          0
//! +------+-------------------------+------------+
//! | prio |           PGN           |   source   |
//! +------+-------------------------+------------+
//! ```
//!
//! Identifiers produced here are always sent as extended (29-bit) frames.

use std::fmt;

use crate::error::CanIdError;

/// Largest PGN that fits in the 18-bit PGN field
pub const MAX_PGN: u32 = 0x3_FFFF;

/// Largest valid J1939 priority
pub const MAX_PRIORITY: u8 = 7;

/// Extended 29-bit CAN identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CanId(pub u32);

impl CanId {
    /// Compose `(priority << 26) | (pgn << 8) | source_address`
    pub fn compose(priority: u8, pgn: u32, source_address: u8) -> Result<Self, CanIdError> {
        if priority > MAX_PRIORITY {
            return Err(CanIdError::InvalidPriority(priority));
        }
        if pgn > MAX_PGN {
            return Err(CanIdError::InvalidPgn(pgn));
        }
        Ok(Self(
            (priority as u32) << 26 | pgn << 8 | source_address as u32,
        ))
    }

    /// Get the raw identifier value
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Priority (3 bits)
    pub fn priority(&self) -> u8 {
        ((self.0 >> 26) & 0x07) as u8
    }

    /// PGN field (18 bits) as it was composed
    pub fn pgn(&self) -> u32 {
        (self.0 >> 8) & MAX_PGN
    }

    /// Source address (8 bits)
    pub fn source_address(&self) -> u8 {
        (self.0 & 0xFF) as u8
    }
}

impl fmt::Display for CanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}
