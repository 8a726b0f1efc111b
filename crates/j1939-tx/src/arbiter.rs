//! Transmit mode arbitration
//!
//! Every tick a periodic task combines the process-wide [`GlobalTxMode`] with
//! its entry's [`EntryTxMode`] to decide whether to put a frame on the bus.
//!
//! | global        | entry         | decision        |
//! |---------------|---------------|-----------------|
//! | any           | OnceRequested | TransmitOnce    |
//! | TransmitAll   | Stop/Cont.    | Transmit        |
//! | PerEntry      | Continuous    | Transmit        |
//! | PerEntry      | Stop          | Skip            |
//! | StopAll       | Stop/Cont.    | Skip            |
//!
//! Both modes live in `AtomicU8` cells. The entry cell keeps the base mode
//! (Stop or Continuous) and the one-shot request as separate bits so the tick
//! can consume a one-shot with a single `fetch_and`.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::TxError;

/// Process-wide transmit policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalTxMode {
    /// Nothing is sent except one-shot requests
    StopAll,
    /// Every entry is sent every period
    TransmitAll,
    /// Each entry's own mode decides
    PerEntry,
}

impl GlobalTxMode {
    fn to_u8(self) -> u8 {
        match self {
            Self::StopAll => 0,
            Self::TransmitAll => 1,
            Self::PerEntry => 2,
        }
    }

    fn from_u8(value: u8) -> Result<Self, TxError> {
        match value {
            0 => Ok(Self::StopAll),
            1 => Ok(Self::TransmitAll),
            2 => Ok(Self::PerEntry),
            value => Err(TxError::InconsistentMode {
                field: "global tx mode",
                value,
            }),
        }
    }
}

impl fmt::Display for GlobalTxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopAll => write!(f, "Stop All"),
            Self::TransmitAll => write!(f, "Transmit All"),
            Self::PerEntry => write!(f, "Per PGN"),
        }
    }
}

/// Transmit mode of a single entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryTxMode {
    /// Not sent under per-entry policy
    Stop,
    /// Sent every period under per-entry policy
    Continuous,
    /// Sent on the next tick whatever the global mode, then cleared
    OnceRequested,
}

impl fmt::Display for EntryTxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "Stop"),
            Self::Continuous => write!(f, "Continuous"),
            Self::OnceRequested => write!(f, "Once"),
        }
    }
}

/// Outcome of arbitration for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDecision {
    /// Send the frame
    Transmit,
    /// Send the frame, consuming a one-shot request
    TransmitOnce,
    /// Do not send this tick
    Skip,
}

impl TxDecision {
    /// Whether a frame goes out
    pub fn transmits(self) -> bool {
        !matches!(self, Self::Skip)
    }
}

/// Decide what to do this tick
pub fn arbitrate(global: GlobalTxMode, entry: EntryTxMode) -> TxDecision {
    use EntryTxMode::*;
    use GlobalTxMode::*;

    match (global, entry) {
        (_, OnceRequested) => TxDecision::TransmitOnce,
        (TransmitAll, Stop | Continuous) => TxDecision::Transmit,
        (PerEntry, Continuous) => TxDecision::Transmit,
        (PerEntry, Stop) => TxDecision::Skip,
        (StopAll, Stop | Continuous) => TxDecision::Skip,
    }
}

/// Atomic holder of the global mode
#[derive(Debug)]
pub struct GlobalModeCell {
    mode: AtomicU8,
}

impl GlobalModeCell {
    /// Create a cell in [`GlobalTxMode::StopAll`]
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(GlobalTxMode::StopAll.to_u8()),
        }
    }

    /// Current mode
    pub fn load(&self) -> Result<GlobalTxMode, TxError> {
        GlobalTxMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    /// Replace the mode
    pub fn store(&self, mode: GlobalTxMode) {
        self.mode.store(mode.to_u8(), Ordering::Release);
    }
}

impl Default for GlobalModeCell {
    fn default() -> Self {
        Self::new()
    }
}

const CONTINUOUS_BIT: u8 = 0b01;
const ONCE_BIT: u8 = 0b10;
const VALID_BITS: u8 = CONTINUOUS_BIT | ONCE_BIT;

/// Atomic holder of an entry's mode
#[derive(Debug, Default)]
pub struct EntryModeCell {
    bits: AtomicU8,
}

impl EntryModeCell {
    /// Create a cell in [`EntryTxMode::Stop`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Effective mode without consuming a one-shot
    pub fn load(&self) -> Result<EntryTxMode, TxError> {
        Self::decode(self.bits.load(Ordering::Acquire))
    }

    /// Set the base mode, dropping any pending one-shot
    pub fn set_continuous(&self, continuous: bool) {
        let bits = if continuous { CONTINUOUS_BIT } else { 0 };
        self.bits.store(bits, Ordering::Release);
    }

    /// Arm a one-shot, keeping the base mode
    pub fn arm_once(&self) {
        self.bits.fetch_or(ONCE_BIT, Ordering::AcqRel);
    }

    /// Effective mode, clearing a pending one-shot in the same step
    pub fn take(&self) -> Result<EntryTxMode, TxError> {
        Self::decode(self.bits.fetch_and(!ONCE_BIT, Ordering::AcqRel))
    }

    fn decode(bits: u8) -> Result<EntryTxMode, TxError> {
        if bits & !VALID_BITS != 0 {
            return Err(TxError::InconsistentMode {
                field: "entry tx mode",
                value: bits,
            });
        }
        Ok(if bits & ONCE_BIT != 0 {
            EntryTxMode::OnceRequested
        } else if bits & CONTINUOUS_BIT != 0 {
            EntryTxMode::Continuous
        } else {
            EntryTxMode::Stop
        })
    }
}
