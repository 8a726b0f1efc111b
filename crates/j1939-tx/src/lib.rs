//! J1939 Transmit Engine
//!
//! Periodically puts J1939 frames on a bus under a layered transmit policy:
//!
//! - A process-wide [`GlobalTxMode`]: stop everything, transmit everything,
//!   or defer to each PGN
//! - A per-PGN [`EntryTxMode`]: stop, continuous, or one-shot
//!
//! [`TxScheduler`] runs one tokio task per registered PGN. Callers change a
//! PGN's payload with [`TxScheduler::modify_data`] while its task keeps
//! sending; the payload is locked for every write and every send.
//!
//! The bus itself is abstracted behind [`FrameTransport`]. Send failures are
//! logged and reported on the event stream; they never stop a task.

pub mod arbiter;
pub mod entry;
pub mod error;
pub mod events;
pub mod scheduler;
pub mod transport;

pub use arbiter::{arbitrate, EntryTxMode, GlobalTxMode, TxDecision};
pub use entry::TxEntry;
pub use error::{TransportError, TxError};
pub use events::TxEvent;
pub use scheduler::{TickOutcome, TxScheduler};
pub use transport::{DisconnectedTransport, FrameTransport};
