//! Transmission scheduler
//!
//! [`TxScheduler`] owns one [`TxEntry`] per registered PGN and one tokio task
//! per entry. Each task sleeps for its entry's period, runs the arbiter
//! against the current global and entry modes and, when the decision says so,
//! hands a snapshot of the payload to the transport.
//!
//! Tasks are independent: there is no central loop and no ordering between
//! PGNs whose deadlines coincide.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use j1939_tx::TxScheduler;
//!
//! let scheduler = TxScheduler::new(catalog, transport);
//! scheduler.register(61444, 3, 0x00, Duration::from_millis(20))?;
//! scheduler.modify_data(61444, 190, 0x1234)?;
//! scheduler.set_tx_mode_continuous(None)?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use j1939_protocol::{CanId, ProtocolCatalog, SpnSpec};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use crate::arbiter::{arbitrate, EntryTxMode, GlobalModeCell, GlobalTxMode, TxDecision};
use crate::entry::TxEntry;
use crate::error::TxError;
use crate::events::{TxEvent, EVENT_CHANNEL_CAPACITY};
use crate::transport::FrameTransport;

/// Commands understood by a periodic task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxTaskCommand {
    /// Stop the task after the current tick
    Shutdown,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Frame sent under a continuous mode
    Sent,
    /// Frame sent, consuming a one-shot request
    SentOnce,
    /// Arbitration said not to send
    Skipped,
    /// Arbitration said send, the transport failed
    SendFailed,
}

struct TaskHandle {
    cmd_tx: mpsc::Sender<TxTaskCommand>,
    join: JoinHandle<()>,
}

/// State shared between the scheduler and its tasks
struct Shared {
    catalog: Arc<ProtocolCatalog>,
    transport: Arc<dyn FrameTransport>,
    global_mode: GlobalModeCell,
    event_tx: broadcast::Sender<TxEvent>,
}

impl Shared {
    fn tick(&self, entry: &TxEntry) -> Result<TickOutcome, TxError> {
        // Consume a one-shot before reading the global mode so a concurrent
        // request is either sent now or left armed for the next tick.
        let entry_mode = entry.mode().take()?;
        let global_mode = self.global_mode.load()?;
        let decision = arbitrate(global_mode, entry_mode);

        trace!(
            "PGN {} tick: global={:?} entry={:?} -> {:?}",
            entry.pgn(),
            global_mode,
            entry_mode,
            decision
        );

        if !decision.transmits() {
            return Ok(TickOutcome::Skipped);
        }

        let once = decision == TxDecision::TransmitOnce;
        if once {
            let _ = self.event_tx.send(TxEvent::EntryModeChanged {
                pgn: entry.pgn(),
                mode: entry.mode().load()?,
            });
        }

        let Some(frame) = entry.frame() else {
            warn!("PGN {} has an empty payload, nothing to send", entry.pgn());
            return Ok(TickOutcome::SendFailed);
        };

        match self.transport.transmit(&frame) {
            Ok(()) => {
                debug!("Sent PGN {} as {:?}", entry.pgn(), frame);
                let _ = self.event_tx.send(TxEvent::FrameSent {
                    pgn: entry.pgn(),
                    frame,
                    once,
                });
                Ok(if once {
                    TickOutcome::SentOnce
                } else {
                    TickOutcome::Sent
                })
            }
            Err(e) => {
                warn!("Transmit of PGN {} failed: {}", entry.pgn(), e);
                let _ = self.event_tx.send(TxEvent::SendFailed {
                    pgn: entry.pgn(),
                    error: e.to_string(),
                });
                Ok(TickOutcome::SendFailed)
            }
        }
    }
}

/// Periodic transmitter for a set of PGNs
pub struct TxScheduler {
    shared: Arc<Shared>,
    entries: RwLock<BTreeMap<u32, Arc<TxEntry>>>,
    tasks: Mutex<HashMap<u32, TaskHandle>>,
}

impl TxScheduler {
    /// Create a scheduler in [`GlobalTxMode::StopAll`] with no entries
    pub fn new(catalog: Arc<ProtocolCatalog>, transport: Arc<dyn FrameTransport>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                catalog,
                transport,
                global_mode: GlobalModeCell::new(),
                event_tx,
            }),
            entries: RwLock::new(BTreeMap::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Catalog the scheduler resolves PGNs and SPNs against
    pub fn catalog(&self) -> &ProtocolCatalog {
        &self.shared.catalog
    }

    /// Subscribe to transmit events
    pub fn subscribe(&self) -> broadcast::Receiver<TxEvent> {
        self.shared.event_tx.subscribe()
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Register a PGN and start its periodic task
    ///
    /// The entry starts in [`EntryTxMode::Stop`] with a zero-filled payload
    /// sized from the catalog. Must be called from within a tokio runtime.
    pub fn register(
        &self,
        pgn: u32,
        priority: u8,
        source_address: u8,
        period: Duration,
    ) -> Result<CanId, TxError> {
        let spec = self
            .shared
            .catalog
            .get(pgn)
            .ok_or(TxError::PgnNotInCatalog(pgn))?;
        check_period(pgn, period)?;
        let can_id = CanId::compose(priority, pgn, source_address)?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| TxError::NoRuntime)?;

        let entry = {
            let mut entries = self.entries.write();
            if entries.contains_key(&pgn) {
                return Err(TxError::AlreadyRegistered(pgn));
            }
            let entry = Arc::new(TxEntry::new(pgn, can_id, period, spec.length));
            entries.insert(pgn, entry.clone());
            entry
        };

        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let join = runtime.spawn(run_tx_task(self.shared.clone(), entry, cmd_rx));
        self.tasks.lock().insert(pgn, TaskHandle { cmd_tx, join });

        info!(
            "Registered PGN {} ({}) as {} every {:?}",
            pgn, spec.acronym, can_id, period
        );
        Ok(can_id)
    }

    /// Registered PGNs in ascending order
    pub fn registered_pgns(&self) -> Vec<u32> {
        self.entries.read().keys().copied().collect()
    }

    fn entry(&self, pgn: u32) -> Result<Arc<TxEntry>, TxError> {
        self.entries
            .read()
            .get(&pgn)
            .cloned()
            .ok_or(TxError::UnknownPgn(pgn))
    }

    fn spn_spec(&self, pgn: u32, spn: u32) -> Result<&SpnSpec, TxError> {
        self.shared
            .catalog
            .spn(pgn, spn)
            .ok_or(TxError::SpnNotInPgn { pgn, spn })
    }

    // ------------------------------------------------------------------------
    // Modes
    // ------------------------------------------------------------------------

    /// Stop everything (`None`) or set one entry to Stop
    pub fn set_tx_mode_stop(&self, pgn: Option<u32>) -> Result<(), TxError> {
        match pgn {
            None => {
                self.set_global_mode(GlobalTxMode::StopAll);
                Ok(())
            }
            Some(pgn) => self.set_entry_continuous(pgn, false),
        }
    }

    /// Transmit everything (`None`) or set one entry to Continuous
    pub fn set_tx_mode_continuous(&self, pgn: Option<u32>) -> Result<(), TxError> {
        match pgn {
            None => {
                self.set_global_mode(GlobalTxMode::TransmitAll);
                Ok(())
            }
            Some(pgn) => self.set_entry_continuous(pgn, true),
        }
    }

    /// Let each entry's own mode decide
    pub fn set_tx_mode_per_entry(&self) {
        self.set_global_mode(GlobalTxMode::PerEntry);
    }

    fn set_global_mode(&self, mode: GlobalTxMode) {
        self.shared.global_mode.store(mode);
        info!("Global tx mode set to {}", mode);
        let _ = self
            .shared
            .event_tx
            .send(TxEvent::GlobalModeChanged { mode });
    }

    fn set_entry_continuous(&self, pgn: u32, continuous: bool) -> Result<(), TxError> {
        let entry = self.entry(pgn)?;
        entry.mode().set_continuous(continuous);
        let mode = entry.mode().load()?;
        info!("PGN {} tx mode set to {}", pgn, mode);
        let _ = self
            .shared
            .event_tx
            .send(TxEvent::EntryModeChanged { pgn, mode });
        Ok(())
    }

    /// Send every entry (`None`) or one entry exactly once on its next tick
    pub fn set_tx_once(&self, pgn: Option<u32>) -> Result<(), TxError> {
        let targets = match pgn {
            None => self.entries.read().values().cloned().collect(),
            Some(pgn) => vec![self.entry(pgn)?],
        };
        for entry in targets {
            entry.mode().arm_once();
            debug!("PGN {} armed for one transmission", entry.pgn());
            let _ = self.shared.event_tx.send(TxEvent::EntryModeChanged {
                pgn: entry.pgn(),
                mode: EntryTxMode::OnceRequested,
            });
        }
        Ok(())
    }

    /// Current global mode
    pub fn global_tx_mode(&self) -> Result<GlobalTxMode, TxError> {
        self.shared.global_mode.load()
    }

    /// Current effective mode of an entry
    pub fn entry_tx_mode(&self, pgn: u32) -> Result<EntryTxMode, TxError> {
        self.entry(pgn)?.mode().load()
    }

    // ------------------------------------------------------------------------
    // Rate and data
    // ------------------------------------------------------------------------

    /// Change an entry's period; the task picks it up on its next cycle
    pub fn modify_rate(&self, pgn: u32, period: Duration) -> Result<(), TxError> {
        check_period(pgn, period)?;
        self.entry(pgn)?.set_period(period);
        info!("PGN {} period set to {:?}", pgn, period);
        let _ = self
            .shared
            .event_tx
            .send(TxEvent::RateChanged { pgn, period });
        Ok(())
    }

    /// Current period of an entry
    pub fn period(&self, pgn: u32) -> Result<Duration, TxError> {
        Ok(self.entry(pgn)?.period())
    }

    /// Identifier an entry is sent with
    pub fn can_id(&self, pgn: u32) -> Result<CanId, TxError> {
        Ok(self.entry(pgn)?.can_id())
    }

    /// Write a raw SPN value into an entry's payload
    pub fn modify_data(&self, pgn: u32, spn: u32, raw: u32) -> Result<(), TxError> {
        let entry = self.entry(pgn)?;
        let spec = self.spn_spec(pgn, spn)?;
        entry.pack(&spec.layout, raw)?;
        debug!("PGN {} SPN {} set to raw {:#X}", pgn, spn, raw);
        Ok(())
    }

    /// Read a raw SPN value from an entry's payload
    pub fn read_data(&self, pgn: u32, spn: u32) -> Result<u32, TxError> {
        let entry = self.entry(pgn)?;
        let spec = self.spn_spec(pgn, spn)?;
        Ok(entry.unpack(&spec.layout)?)
    }

    /// Copy of an entry's current payload
    pub fn payload(&self, pgn: u32) -> Result<Vec<u8>, TxError> {
        Ok(self.entry(pgn)?.payload())
    }

    // ------------------------------------------------------------------------
    // Ticks and lifecycle
    // ------------------------------------------------------------------------

    /// Run one arbitration and send step for an entry now
    ///
    /// This is the periodic task's body without the sleep.
    pub fn tick(&self, pgn: u32) -> Result<TickOutcome, TxError> {
        let entry = self.entry(pgn)?;
        self.shared.tick(&entry)
    }

    /// Stop one entry's periodic task and wait for it to finish
    ///
    /// The entry itself stays registered; its modes and payload remain usable.
    pub async fn cancel(&self, pgn: u32) -> Result<(), TxError> {
        let handle = self
            .tasks
            .lock()
            .remove(&pgn)
            .ok_or(TxError::UnknownPgn(pgn))?;
        stop_task(pgn, handle).await;
        Ok(())
    }

    /// Stop every periodic task and wait for them to finish
    pub async fn shutdown(&self) {
        let handles: Vec<(u32, TaskHandle)> = self.tasks.lock().drain().collect();
        info!("Stopping {} transmit tasks", handles.len());
        for (pgn, handle) in handles {
            stop_task(pgn, handle).await;
        }
    }
}

/// Periods are kept in whole milliseconds, so anything shorter is rejected
fn check_period(pgn: u32, period: Duration) -> Result<(), TxError> {
    if period.as_millis() == 0 {
        return Err(TxError::InvalidPeriod(pgn));
    }
    Ok(())
}

async fn stop_task(pgn: u32, handle: TaskHandle) {
    let _ = handle.cmd_tx.try_send(TxTaskCommand::Shutdown);
    drop(handle.cmd_tx);
    if let Err(e) = handle.join.await {
        warn!("Transmit task for PGN {} ended abnormally: {}", pgn, e);
    }
}

/// Periodic transmit task for one entry
///
/// Runs until it receives [`TxTaskCommand::Shutdown`], its command channel
/// closes, or the mode flags turn out to be inconsistent.
async fn run_tx_task(
    shared: Arc<Shared>,
    entry: Arc<TxEntry>,
    mut cmd_rx: mpsc::Receiver<TxTaskCommand>,
) {
    info!("Starting transmit task for PGN {} ({})", entry.pgn(), entry.can_id());

    loop {
        let period = entry.period();
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(TxTaskCommand::Shutdown) => {
                        debug!("Shutdown requested for PGN {}", entry.pgn());
                        break;
                    }
                    None => {
                        debug!("Command channel closed for PGN {}", entry.pgn());
                        break;
                    }
                }
            }

            _ = tokio::time::sleep(period) => {
                if let Err(e) = shared.tick(&entry) {
                    error!("Transmit task for PGN {} stopped: {}", entry.pgn(), e);
                    break;
                }
            }
        }
    }

    info!("Transmit task ended for PGN {}", entry.pgn());
}
