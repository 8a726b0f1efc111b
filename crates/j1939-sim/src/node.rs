//! Simulated J1939 node
//!
//! [`SimulatedNode`] sits on top of the transmit scheduler and speaks in
//! engineering units: callers set "Engine Speed = 1500 rpm" or "Torque Mode =
//! Accelerator pedal" and the node encodes, range-checks and packs the value
//! into the live payload.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use j1939_protocol::display::{format_raw_binary, format_raw_hex};
use j1939_protocol::{CanId, ProtocolCatalog, SpnSpec};
use j1939_tx::{EntryTxMode, FrameTransport, GlobalTxMode, TxEvent, TxScheduler};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::{SignalValue, SimConfig};
use crate::error::NodeError;

/// What a signal's raw value means
#[derive(Debug, Clone, PartialEq)]
pub enum ReadingValue {
    /// Decoded engineering-unit value
    Decoded(f64),
    /// Label of a discrete code (empty when unallocated)
    Label(String),
}

/// Current state of one signal, ready to show an operator
#[derive(Debug, Clone, PartialEq)]
pub struct SignalReading {
    /// Signal number
    pub spn: u32,
    /// Signal name
    pub name: String,
    /// Raw value in the payload
    pub raw: u32,
    /// Decoded value or label
    pub value: ReadingValue,
    /// Engineering unit
    pub unit: String,
    /// Raw value as hex in wire order
    pub hex: String,
    /// Raw value as binary (discrete signals only)
    pub binary: Option<String>,
    /// Decimal places implied by the scale
    pub decimals: usize,
}

impl fmt::Display for SignalReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPN {} {}: ", self.spn, self.name)?;
        match &self.value {
            ReadingValue::Decoded(v) => {
                write!(f, "{:.*}", self.decimals, v)?;
                if !self.unit.is_empty() {
                    write!(f, " {}", self.unit)?;
                }
            }
            ReadingValue::Label(label) => write!(f, "{:?}", label)?,
        }
        write!(f, " {}", self.hex)?;
        if let Some(binary) = &self.binary {
            write!(f, " ({}b)", binary)?;
        }
        Ok(())
    }
}

/// A node that periodically transmits a configured set of PGNs
pub struct SimulatedNode {
    scheduler: TxScheduler,
    catalog: Arc<ProtocolCatalog>,
    source_address: u8,
    exposed: BTreeMap<u32, Vec<u32>>,
}

impl SimulatedNode {
    /// Create a node with nothing registered
    pub fn new(
        catalog: Arc<ProtocolCatalog>,
        transport: Arc<dyn FrameTransport>,
        source_address: u8,
    ) -> Self {
        Self {
            scheduler: TxScheduler::new(catalog.clone(), transport),
            catalog,
            source_address,
            exposed: BTreeMap::new(),
        }
    }

    /// Build a node from a config, registering and initialising every PGN
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(
        config: &SimConfig,
        catalog: Arc<ProtocolCatalog>,
        transport: Arc<dyn FrameTransport>,
    ) -> Result<Self, NodeError> {
        config.validate(&catalog)?;
        let mut node = Self::new(catalog, transport, config.source_address);

        for pgn_config in &config.pgns {
            let pgn = pgn_config.pgn;
            node.add_pgn(
                pgn,
                pgn_config.priority,
                pgn_config.period_ms.map(Duration::from_millis),
                &pgn_config.spns,
            )?;
            for (&spn, value) in &pgn_config.values {
                let raw = match value {
                    SignalValue::Raw { raw } => {
                        node.set_raw(pgn, spn, *raw)?;
                        *raw
                    }
                    SignalValue::Decoded(v) => node.set_decoded(pgn, spn, *v)?,
                    SignalValue::Label(label) => node.set_label(pgn, spn, label)?,
                };
                debug!("PGN {} SPN {} initialised to raw {}", pgn, spn, raw);
            }
            node.set_pgn_mode(pgn, pgn_config.mode.into())?;
        }
        node.set_global_mode(config.global_mode.into())?;

        info!(
            "Simulated node at source address {:#04X} with {} PGNs",
            node.source_address,
            node.exposed.len()
        );
        Ok(node)
    }

    /// Register a PGN with catalog defaults unless overridden
    ///
    /// An empty `spns` exposes every SPN the catalog knows for the PGN.
    pub fn add_pgn(
        &mut self,
        pgn: u32,
        priority: Option<u8>,
        period: Option<Duration>,
        spns: &[u32],
    ) -> Result<CanId, NodeError> {
        let spec = self
            .catalog
            .get(pgn)
            .ok_or(NodeError::UnknownPgn(pgn))?;
        let exposed = if spns.is_empty() {
            spec.spn_numbers()
        } else {
            for &spn in spns {
                if spec.spn(spn).is_none() {
                    return Err(NodeError::UnknownSpn { pgn, spn });
                }
            }
            spns.to_vec()
        };

        let can_id = self.scheduler.register(
            pgn,
            priority.unwrap_or(spec.priority),
            self.source_address,
            period.unwrap_or(spec.period),
        )?;
        self.exposed.insert(pgn, exposed);
        Ok(can_id)
    }

    /// Underlying scheduler
    pub fn scheduler(&self) -> &TxScheduler {
        &self.scheduler
    }

    /// Source address frames are sent from
    pub fn source_address(&self) -> u8 {
        self.source_address
    }

    /// Simulated PGNs in ascending order
    pub fn pgns(&self) -> impl Iterator<Item = u32> + '_ {
        self.exposed.keys().copied()
    }

    /// SPNs exposed for a PGN
    pub fn spns(&self, pgn: u32) -> Result<&[u32], NodeError> {
        self.exposed
            .get(&pgn)
            .map(Vec::as_slice)
            .ok_or(NodeError::UnknownPgn(pgn))
    }

    /// Subscribe to transmit events
    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.scheduler.subscribe()
    }

    fn spn_spec(&self, pgn: u32, spn: u32) -> Result<&SpnSpec, NodeError> {
        if !self.exposed.contains_key(&pgn) {
            return Err(NodeError::UnknownPgn(pgn));
        }
        self.catalog
            .spn(pgn, spn)
            .ok_or(NodeError::UnknownSpn { pgn, spn })
    }

    // ------------------------------------------------------------------------
    // Signals
    // ------------------------------------------------------------------------

    /// Set a numeric signal in engineering units
    ///
    /// Non-finite values and values that encode outside the signal's valid
    /// raw range are rejected.
    pub fn set_decoded(&self, pgn: u32, spn: u32, value: f64) -> Result<u32, NodeError> {
        let spec = self.spn_spec(pgn, spn)?;
        if !value.is_finite() {
            return Err(NodeError::OutOfRange { pgn, spn, value });
        }
        let encoded = spec.encode(value)?;
        let range = spec.raw_range();
        let raw = u32::try_from(encoded)
            .ok()
            .filter(|raw| range.contains(raw))
            .ok_or(NodeError::OutOfRange { pgn, spn, value })?;
        self.scheduler.modify_data(pgn, spn, raw)?;
        debug!("PGN {} SPN {} set to {} (raw {})", pgn, spn, value, raw);
        Ok(raw)
    }

    /// Set a discrete signal by label
    pub fn set_label(&self, pgn: u32, spn: u32, label: &str) -> Result<u32, NodeError> {
        let raw = self.spn_spec(pgn, spn)?.label_value(label)?;
        self.scheduler.modify_data(pgn, spn, raw)?;
        debug!("PGN {} SPN {} set to {:?} (raw {})", pgn, spn, label, raw);
        Ok(raw)
    }

    /// Set a signal's raw value directly
    pub fn set_raw(&self, pgn: u32, spn: u32, raw: u32) -> Result<(), NodeError> {
        self.spn_spec(pgn, spn)?;
        self.scheduler.modify_data(pgn, spn, raw)?;
        Ok(())
    }

    /// Current state of a signal
    pub fn reading(&self, pgn: u32, spn: u32) -> Result<SignalReading, NodeError> {
        let spec = self.spn_spec(pgn, spn)?;
        let raw = self.scheduler.read_data(pgn, spn)?;

        let (value, binary, decimals) = match spec.scale() {
            Some(scale) => (ReadingValue::Decoded(scale.decode(raw)), None, scale.decimals()),
            None => (
                ReadingValue::Label(spec.label(raw)?.to_string()),
                Some(format_raw_binary(raw, spec.length_bits())),
                0,
            ),
        };

        Ok(SignalReading {
            spn,
            name: spec.name.clone(),
            raw,
            value,
            unit: spec.unit.clone(),
            hex: format_raw_hex(raw, &spec.layout),
            binary,
            decimals,
        })
    }

    /// Readings of every exposed SPN of a PGN
    pub fn readings(&self, pgn: u32) -> Result<Vec<SignalReading>, NodeError> {
        self.spns(pgn)?
            .iter()
            .map(|&spn| self.reading(pgn, spn))
            .collect()
    }

    // ------------------------------------------------------------------------
    // Transmission control
    // ------------------------------------------------------------------------

    /// Change the global mode
    pub fn set_global_mode(&self, mode: GlobalTxMode) -> Result<(), NodeError> {
        match mode {
            GlobalTxMode::StopAll => self.scheduler.set_tx_mode_stop(None)?,
            GlobalTxMode::TransmitAll => self.scheduler.set_tx_mode_continuous(None)?,
            GlobalTxMode::PerEntry => self.scheduler.set_tx_mode_per_entry(),
        }
        Ok(())
    }

    /// Change one PGN's mode; [`EntryTxMode::OnceRequested`] arms a one-shot
    pub fn set_pgn_mode(&self, pgn: u32, mode: EntryTxMode) -> Result<(), NodeError> {
        match mode {
            EntryTxMode::Stop => self.scheduler.set_tx_mode_stop(Some(pgn))?,
            EntryTxMode::Continuous => self.scheduler.set_tx_mode_continuous(Some(pgn))?,
            EntryTxMode::OnceRequested => self.scheduler.set_tx_once(Some(pgn))?,
        }
        Ok(())
    }

    /// Send every PGN once
    pub fn transmit_all_once(&self) -> Result<(), NodeError> {
        self.scheduler.set_tx_once(None)?;
        Ok(())
    }

    /// Change a PGN's period
    pub fn set_period(&self, pgn: u32, period: Duration) -> Result<(), NodeError> {
        self.scheduler.modify_rate(pgn, period)?;
        Ok(())
    }

    /// Stop every transmit task
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
