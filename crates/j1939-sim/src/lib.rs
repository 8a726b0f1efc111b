//! Simulated J1939 node
//!
//! Ties the protocol catalog and the transmit engine together into a node
//! that can be driven in engineering units, configured from a JSON file and
//! run from the `j1939sim` command line tool.

pub mod config;
pub mod error;
pub mod node;
pub mod transport;

pub use config::{GlobalModeSetting, PgnConfig, PgnModeSetting, SignalValue, SimConfig};
pub use error::{ConfigError, NodeError};
pub use node::{ReadingValue, SignalReading, SimulatedNode};
pub use transport::LogTransport;

/// Log filter used when neither `RUST_LOG` nor the config sets one
pub const DEFAULT_LOG_FILTER: &str =
    "j1939sim=info,j1939_protocol=info,j1939_tx=info,j1939_sim=info";
