//! Error types for the simulated node

use j1939_protocol::CodecError;
use j1939_tx::TxError;
use thiserror::Error;

/// Errors raised while loading or checking the node configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or written
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file is not valid JSON for this schema
    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Neither `$XDG_CONFIG_HOME` nor a home directory is available
    #[error("could not determine the config directory")]
    NoConfigDir,

    /// Config names a PGN the catalog does not have
    #[error("PGN {0} is not in the protocol catalog")]
    UnknownPgn(u32),

    /// Config names an SPN the PGN does not carry
    #[error("SPN {spn} is not part of PGN {pgn}")]
    UnknownSpn {
        /// Parameter group
        pgn: u32,
        /// Missing signal
        spn: u32,
    },

    /// Same PGN listed twice
    #[error("PGN {0} is configured more than once")]
    DuplicatePgn(u32),
}

/// Errors raised by [`crate::SimulatedNode`]
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration problem
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Scheduler rejected the operation
    #[error(transparent)]
    Tx(#[from] TxError),

    /// Signal could not be encoded or labelled
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// PGN is not simulated by this node
    #[error("PGN {0} is not simulated by this node")]
    UnknownPgn(u32),

    /// SPN is not part of the simulated PGN
    #[error("SPN {spn} is not part of PGN {pgn}")]
    UnknownSpn {
        /// Parameter group
        pgn: u32,
        /// Missing signal
        spn: u32,
    },

    /// Decoded value lies outside the signal's valid range
    #[error("value {value} is out of range for SPN {spn} of PGN {pgn}")]
    OutOfRange {
        /// Parameter group
        pgn: u32,
        /// Signal
        spn: u32,
        /// Rejected value
        value: f64,
    },
}
