//! Transmit event stream
//!
//! Monitors (a traffic view, a test harness) subscribe to a broadcast channel
//! and see every frame sent, every failed send and every mode change.

use std::time::Duration;

use j1939_protocol::CanFrame;

use crate::arbiter::{EntryTxMode, GlobalTxMode};

/// Capacity of the broadcast channel; slow subscribers lag past this
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something observable happened in the scheduler
#[derive(Debug, Clone, PartialEq)]
pub enum TxEvent {
    /// A frame was handed to the transport successfully
    FrameSent {
        /// Parameter group
        pgn: u32,
        /// Frame as sent
        frame: CanFrame,
        /// Whether this send consumed a one-shot request
        once: bool,
    },

    /// The transport rejected a frame
    SendFailed {
        /// Parameter group
        pgn: u32,
        /// Transport error text
        error: String,
    },

    /// The global mode changed
    GlobalModeChanged {
        /// New mode
        mode: GlobalTxMode,
    },

    /// An entry's mode changed or a one-shot was armed
    EntryModeChanged {
        /// Parameter group
        pgn: u32,
        /// New effective mode
        mode: EntryTxMode,
    },

    /// An entry's period changed
    RateChanged {
        /// Parameter group
        pgn: u32,
        /// New period
        period: Duration,
    },
}
