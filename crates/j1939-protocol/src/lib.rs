//! J1939 Protocol Library
//!
//! Pure, synchronous building blocks for simulating a J1939 node:
//!
//! - **Catalog**: validated PGN and SPN definitions loaded from the Digital
//!   Annex conversion
//! - **Codec**: raw value to engineering unit conversion and discrete labels
//! - **Layout**: bit-exact placement of signals inside a frame payload
//! - **CAN ID**: 29-bit identifier composition
//!
//! Nothing here performs I/O except [`ProtocolCatalog::load`].
//!
//! # Example
//!
//! ```rust
//! use j1939_protocol::{CanId, FieldLayout, LinearScale};
//!
//! // Engine speed: 16 bits at byte 3, 0.125 rpm/bit
//! let layout = FieldLayout::new(3, 0, 16).unwrap();
//! let scale = LinearScale::new(0.125, 0.0);
//!
//! let mut payload = [0xFF; 8];
//! let raw = scale.encode(582.5) as u32;
//! layout.pack(&mut payload, raw).unwrap();
//! assert_eq!(payload[3..5], [0x34, 0x12]);
//!
//! let id = CanId::compose(3, 61444, 0x00).unwrap();
//! assert_eq!(id.to_string(), "0CF00400");
//! ```

pub mod can_id;
pub mod catalog;
pub mod codec;
pub mod display;
pub mod error;
pub mod frame;
pub mod layout;

pub use can_id::CanId;
pub use catalog::{PgnSpec, ProtocolCatalog, RejectedPgn, RejectedSpn, SpnSpec};
pub use codec::{DiscreteValues, LinearScale, SignalEncoding};
pub use error::{CanIdError, CatalogError, CodecError, PackError};
pub use frame::CanFrame;
pub use layout::FieldLayout;
