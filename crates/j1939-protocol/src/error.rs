//! Error types for J1939 catalog loading, signal coding and frame packing

use thiserror::Error;

/// Errors raised while composing a 29-bit CAN identifier
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanIdError {
    /// Priority does not fit in 3 bits
    #[error("invalid priority {0}: must be 0-7")]
    InvalidPriority(u8),

    /// PGN does not fit in 18 bits
    #[error("invalid PGN {0}: must fit in 18 bits")]
    InvalidPgn(u32),
}

/// Errors raised by the signal codec
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A numeric decode/encode was attempted on a discrete (ENUM) signal
    #[error("SPN {spn} is a discrete signal and has no numeric scale")]
    NotNumeric { spn: u32 },

    /// A label lookup was attempted on a numeric signal
    #[error("SPN {spn} is a numeric signal and has no discrete labels")]
    NotDiscrete { spn: u32 },

    /// No raw code maps to the requested label
    #[error("label {label:?} not found for SPN {spn}")]
    LabelNotFound { spn: u32, label: String },
}

/// Errors raised while placing or extracting a raw value in a payload
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PackError {
    /// Bit length is not one of 1-8, 16 or 32
    #[error("unsupported field length: {0} bits")]
    UnsupportedLength(u8),

    /// Start bit must be 0-7, and 0 for byte-aligned fields
    #[error("invalid start bit {start_bit} for a {length} bit field")]
    InvalidStartBit { start_bit: u8, length: u8 },

    /// Raw value has bits set above the field width
    #[error("raw value {raw:#X} does not fit in {length} bits")]
    ValueOutOfRange { raw: u32, length: u8 },

    /// Payload buffer ends before the field does
    #[error("buffer too short: field needs {needed} bytes, buffer has {available}")]
    BufferTooShort { needed: usize, available: usize },
}

/// Errors raised while loading the protocol catalog
#[derive(Debug, Error)]
pub enum CatalogError {
    /// PGN record failed validation
    #[error("invalid PGN {pgn}: {reason}")]
    InvalidPgn { pgn: u32, reason: String },

    /// SPN record failed validation
    #[error("invalid SPN {spn} in PGN {pgn}: {reason}")]
    InvalidSpn { pgn: u32, spn: u32, reason: String },

    /// Catalog document could not be parsed
    #[cfg(feature = "serde")]
    #[error("catalog parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog file could not be read
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
}
