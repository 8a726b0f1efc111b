//! Text rendering of raw signal values and frames
//!
//! Multi-byte fields are shown in wire order with the ends labelled, so an
//! operator can match the rendering against a bus trace byte for byte.

use std::fmt::Write;

use crate::frame::CanFrame;
use crate::layout::FieldLayout;

/// Render a raw value as hex sized to its field
///
/// - 1-4 bits: one nibble, `[A]`
/// - 5-8 bits: one byte, `[0A]`
/// - 16 bits: `LSB[34 12]MSB`
/// - 32 bits: `LSB[78 56 34 12]MSB`
pub fn format_raw_hex(raw: u32, layout: &FieldLayout) -> String {
    match layout {
        FieldLayout::Bits { length, .. } if *length <= 4 => format!("[{:X}]", raw & 0xF),
        FieldLayout::Bits { .. } | FieldLayout::Byte { .. } => format!("[{:02X}]", raw & 0xFF),
        FieldLayout::Word { .. } => wire_order(&(raw as u16).to_le_bytes()),
        FieldLayout::DoubleWord { .. } => wire_order(&raw.to_le_bytes()),
    }
}

fn wire_order(bytes: &[u8]) -> String {
    format!("LSB[{}]MSB", hex_bytes(bytes))
}

fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02X}", byte);
    }
    out
}

/// Render a raw value as zero-padded binary of `length` digits
pub fn format_raw_binary(raw: u32, length: u8) -> String {
    format!("{:0width$b}", raw, width = length as usize)
}

/// One-line rendering of a frame, `CAN ID: 0CF00400  DATA: 00 11 22`
pub fn format_frame(frame: &CanFrame) -> String {
    format!("CAN ID: {}  DATA: {}", frame.id, hex_bytes(frame.data()))
}
