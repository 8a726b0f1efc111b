//! Error types for the transmit engine

use j1939_protocol::{CanIdError, PackError};
use thiserror::Error;

/// Errors returned by the scheduler
#[derive(Debug, Error)]
pub enum TxError {
    /// PGN has not been registered
    #[error("PGN {0} is not registered")]
    UnknownPgn(u32),

    /// PGN was registered before
    #[error("PGN {0} is already registered")]
    AlreadyRegistered(u32),

    /// PGN is missing from the protocol catalog
    #[error("PGN {0} is not in the protocol catalog")]
    PgnNotInCatalog(u32),

    /// SPN is not carried by the PGN
    #[error("SPN {spn} is not part of PGN {pgn}")]
    SpnNotInPgn {
        /// Parameter group
        pgn: u32,
        /// Missing signal
        spn: u32,
    },

    /// Transmission period must be non-zero
    #[error("invalid transmission period for PGN {0}: must be at least 1 ms")]
    InvalidPeriod(u32),

    /// Periodic tasks need a tokio runtime
    #[error("no tokio runtime available to start the transmit task")]
    NoRuntime,

    /// A mode flag holds a value no setter writes
    #[error("inconsistent {field} value {value:#04X}")]
    InconsistentMode {
        /// Which flag was corrupt
        field: &'static str,
        /// Value found
        value: u8,
    },

    /// CAN identifier could not be composed
    #[error("CAN identifier error: {0}")]
    CanId(#[from] CanIdError),

    /// Signal could not be packed
    #[error("pack error: {0}")]
    Pack(#[from] PackError),
}

/// A single send failed on the bus
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// No bus is attached
    #[error("transport not connected")]
    NotConnected,

    /// The bus rejected the frame
    #[error("send failed: {0}")]
    SendFailed(String),
}
