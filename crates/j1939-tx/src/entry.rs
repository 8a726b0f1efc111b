//! Per-PGN transmit state

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use j1939_protocol::{CanFrame, CanId, FieldLayout, PackError};
use parking_lot::Mutex;
use tracing::trace;

use crate::arbiter::EntryModeCell;

/// One registered PGN: identifier, period, mode and the live payload
///
/// The payload is only touched under its lock, both by packer writes and by
/// the snapshot taken for each send, so a frame never carries a half-written
/// multi-byte field.
#[derive(Debug)]
pub struct TxEntry {
    pgn: u32,
    can_id: CanId,
    period_ms: AtomicU64,
    mode: EntryModeCell,
    payload: Mutex<Vec<u8>>,
}

impl TxEntry {
    /// Create a stopped entry with a zero-filled payload
    pub fn new(pgn: u32, can_id: CanId, period: Duration, length: usize) -> Self {
        Self {
            pgn,
            can_id,
            period_ms: AtomicU64::new(duration_ms(period)),
            mode: EntryModeCell::new(),
            payload: Mutex::new(vec![0; length]),
        }
    }

    /// Parameter group
    pub fn pgn(&self) -> u32 {
        self.pgn
    }

    /// Identifier the frames are sent with
    pub fn can_id(&self) -> CanId {
        self.can_id
    }

    /// Period the task sleeps for on its next cycle
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms.load(Ordering::Acquire))
    }

    /// Change the period; takes effect on the next cycle
    pub fn set_period(&self, period: Duration) {
        self.period_ms.store(duration_ms(period), Ordering::Release);
    }

    /// Mode flags
    pub fn mode(&self) -> &EntryModeCell {
        &self.mode
    }

    /// Write a raw value into the payload
    pub fn pack(&self, layout: &FieldLayout, raw: u32) -> Result<(), PackError> {
        let mut payload = self.payload.lock();
        layout.pack(&mut payload, raw)?;
        trace!(
            "PGN {} payload after write at byte {}: {:02X?}",
            self.pgn,
            layout.start_byte(),
            &payload[..]
        );
        Ok(())
    }

    /// Read a raw value from the payload
    pub fn unpack(&self, layout: &FieldLayout) -> Result<u32, PackError> {
        layout.unpack(&self.payload.lock())
    }

    /// Copy of the current payload
    pub fn payload(&self) -> Vec<u8> {
        self.payload.lock().clone()
    }

    /// Frame built from the current payload
    pub fn frame(&self) -> Option<CanFrame> {
        CanFrame::new(self.can_id, &self.payload.lock())
    }
}

fn duration_ms(period: Duration) -> u64 {
    u64::try_from(period.as_millis()).unwrap_or(u64::MAX)
}
