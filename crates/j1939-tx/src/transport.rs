//! Bus transport seam
//!
//! The scheduler never talks to a CAN interface directly. It hands finished
//! frames to a [`FrameTransport`] shared by all periodic tasks.

use j1939_protocol::CanFrame;

use crate::error::TransportError;

/// Something that can put a frame on a CAN bus
///
/// Called from periodic tasks, so implementations must not block for long.
/// A returned error is logged and the tick is skipped; it never stops the task.
pub trait FrameTransport: Send + Sync {
    /// Send one frame
    fn transmit(&self, frame: &CanFrame) -> Result<(), TransportError>;
}

/// Transport with no bus attached; every send fails with
/// [`TransportError::NotConnected`]
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedTransport;

impl FrameTransport for DisconnectedTransport {
    fn transmit(&self, _frame: &CanFrame) -> Result<(), TransportError> {
        Err(TransportError::NotConnected)
    }
}
