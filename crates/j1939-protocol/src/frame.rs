//! CAN frames handed to the transport

use crate::can_id::CanId;
use crate::catalog::MAX_PAYLOAD_LEN;

/// A single classic CAN frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanFrame {
    /// Identifier
    pub id: CanId,
    /// Whether the identifier is 29-bit (always true for J1939)
    pub extended: bool,
    data: [u8; MAX_PAYLOAD_LEN],
    len: usize,
}

impl CanFrame {
    /// Build an extended frame from a payload of at most 8 bytes
    ///
    /// Returns `None` if the payload is empty or longer than 8 bytes.
    pub fn new(id: CanId, payload: &[u8]) -> Option<Self> {
        if payload.is_empty() || payload.len() > MAX_PAYLOAD_LEN {
            return None;
        }
        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);
        Some(Self {
            id,
            extended: true,
            data,
            len: payload.len(),
        })
    }

    /// Payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Payload length (DLC)
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; frames carry at least one byte
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
