//! Transport that writes frames to the log instead of a bus

use std::sync::atomic::{AtomicU64, Ordering};

use j1939_protocol::display::format_frame;
use j1939_protocol::CanFrame;
use j1939_tx::{FrameTransport, TransportError};
use tracing::info;

/// Logs every frame at `info` and counts them
#[derive(Debug, Default)]
pub struct LogTransport {
    sent: AtomicU64,
}

impl LogTransport {
    /// Create a transport with a zero count
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames logged so far
    pub fn frames_sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl FrameTransport for LogTransport {
    fn transmit(&self, frame: &CanFrame) -> Result<(), TransportError> {
        self.sent.fetch_add(1, Ordering::Relaxed);
        info!("{}", format_frame(frame));
        Ok(())
    }
}
