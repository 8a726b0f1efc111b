//! Integration tests for the transmit engine
//!
//! These tests drive the scheduler end to end:
//! - CAN identifier composition and payload packing through registration
//! - The arbitration table as seen from real ticks
//! - Periodic tasks under paused time, including rate changes and shutdown
//! - Transport failures that must not stop a task
//! - Concurrent writers never producing a torn multi-byte field

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use j1939_protocol::{
    CanFrame, CanId, DiscreteValues, FieldLayout, LinearScale, PgnSpec, ProtocolCatalog, SpnSpec,
};
use j1939_tx::{
    EntryTxMode, FrameTransport, GlobalTxMode, TickOutcome, TransportError, TxEvent, TxScheduler,
};
use parking_lot::Mutex;

// ============================================================================
// Helper Functions
// ============================================================================

mod helpers {
    use super::*;

    /// Transport that records every frame it is given
    #[derive(Default)]
    pub struct RecordingTransport {
        frames: Mutex<Vec<CanFrame>>,
    }

    impl RecordingTransport {
        pub fn frames(&self) -> Vec<CanFrame> {
            self.frames.lock().clone()
        }

        pub fn count(&self) -> usize {
            self.frames.lock().len()
        }
    }

    impl FrameTransport for RecordingTransport {
        fn transmit(&self, frame: &CanFrame) -> Result<(), TransportError> {
            self.frames.lock().push(*frame);
            Ok(())
        }
    }

    /// Transport whose every send fails
    #[derive(Default)]
    pub struct FailingTransport {
        pub attempts: AtomicUsize,
    }

    impl FrameTransport for FailingTransport {
        fn transmit(&self, _frame: &CanFrame) -> Result<(), TransportError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::SendFailed("bus off".to_string()))
        }
    }

    /// EEC1 with engine speed and two 3-bit fields sharing byte 0, plus ET1
    pub fn catalog() -> Arc<ProtocolCatalog> {
        let torque_mode: DiscreteValues = (0..8u32).map(|raw| (raw, format!("mode {raw}"))).collect();
        let eec1 = PgnSpec::new(61444, 3, 8, Duration::from_millis(20))
            .unwrap()
            .with_names("Electronic Engine Controller 1", "EEC1")
            .with_spn(SpnSpec::discrete(
                899,
                "Engine Torque Mode",
                FieldLayout::new(0, 0, 3).unwrap(),
                torque_mode.clone(),
            ))
            .unwrap()
            .with_spn(SpnSpec::discrete(
                4154,
                "Actual Engine - Percent Torque (Fractional)",
                FieldLayout::new(0, 4, 3).unwrap(),
                torque_mode,
            ))
            .unwrap()
            .with_spn(
                SpnSpec::linear(
                    190,
                    "Engine Speed",
                    FieldLayout::new(3, 0, 16).unwrap(),
                    LinearScale::new(0.125, 0.0),
                )
                .with_range(0.0, 8031.875)
                .with_unit("rpm"),
            )
            .unwrap();
        let et1 = PgnSpec::new(65262, 6, 8, Duration::from_secs(1))
            .unwrap()
            .with_spn(SpnSpec::linear(
                110,
                "Engine Coolant Temperature",
                FieldLayout::new(0, 0, 8).unwrap(),
                LinearScale::new(1.0, -40.0),
            ))
            .unwrap();
        Arc::new(ProtocolCatalog::from_pgns([eec1, et1]))
    }

    pub fn recording_scheduler() -> (Arc<TxScheduler>, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        let scheduler = Arc::new(TxScheduler::new(catalog(), transport.clone()));
        (scheduler, transport)
    }

    /// Period long enough that the background task never fires during a test
    pub const IDLE: Duration = Duration::from_secs(3600);
}

use helpers::*;

// ============================================================================
// End-to-end scenario
// ============================================================================

#[tokio::test]
async fn test_eec1_end_to_end() {
    let (scheduler, transport) = recording_scheduler();

    let can_id = scheduler.register(61444, 3, 0x00, IDLE).unwrap();
    assert_eq!(can_id, CanId(0x0CF0_0400));
    assert_eq!(scheduler.entry_tx_mode(61444).unwrap(), EntryTxMode::Stop);
    assert_eq!(scheduler.global_tx_mode().unwrap(), GlobalTxMode::StopAll);
    assert_eq!(scheduler.payload(61444).unwrap(), vec![0; 8]);

    scheduler.modify_data(61444, 190, 0x1234).unwrap();
    scheduler.set_tx_mode_per_entry();
    scheduler.set_tx_mode_continuous(Some(61444)).unwrap();

    assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::Sent);
    let frames = transport.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].id.as_u32(), 0x0CF0_0400);
    assert!(frames[0].extended);
    assert_eq!(frames[0].data(), &[0, 0, 0, 0x34, 0x12, 0, 0, 0]);

    scheduler.set_tx_mode_stop(Some(61444)).unwrap();
    for _ in 0..3 {
        assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::Skipped);
    }
    assert_eq!(transport.count(), 1);

    scheduler.set_tx_once(Some(61444)).unwrap();
    assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::SentOnce);
    assert_eq!(transport.count(), 2);

    for _ in 0..3 {
        assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::Skipped);
    }
    assert_eq!(transport.count(), 2);

    scheduler.shutdown().await;
}

// ============================================================================
// Arbitration through the scheduler
// ============================================================================

#[tokio::test]
async fn test_all_nine_mode_combinations() {
    let (scheduler, transport) = recording_scheduler();
    scheduler.register(61444, 3, 0x00, IDLE).unwrap();

    let globals = [
        GlobalTxMode::StopAll,
        GlobalTxMode::TransmitAll,
        GlobalTxMode::PerEntry,
    ];
    let entries = [
        EntryTxMode::Stop,
        EntryTxMode::Continuous,
        EntryTxMode::OnceRequested,
    ];

    for global in globals {
        for entry in entries {
            match global {
                GlobalTxMode::StopAll => scheduler.set_tx_mode_stop(None).unwrap(),
                GlobalTxMode::TransmitAll => scheduler.set_tx_mode_continuous(None).unwrap(),
                GlobalTxMode::PerEntry => scheduler.set_tx_mode_per_entry(),
            }
            match entry {
                EntryTxMode::Stop => scheduler.set_tx_mode_stop(Some(61444)).unwrap(),
                EntryTxMode::Continuous => scheduler.set_tx_mode_continuous(Some(61444)).unwrap(),
                EntryTxMode::OnceRequested => {
                    scheduler.set_tx_mode_stop(Some(61444)).unwrap();
                    scheduler.set_tx_once(Some(61444)).unwrap();
                }
            }

            let expected = match (global, entry) {
                (_, EntryTxMode::OnceRequested) => TickOutcome::SentOnce,
                (GlobalTxMode::TransmitAll, _) => TickOutcome::Sent,
                (GlobalTxMode::PerEntry, EntryTxMode::Continuous) => TickOutcome::Sent,
                _ => TickOutcome::Skipped,
            };

            let before = transport.count();
            assert_eq!(
                scheduler.tick(61444).unwrap(),
                expected,
                "{global:?} x {entry:?}"
            );
            let sent = transport.count() - before;
            assert_eq!(sent, usize::from(expected != TickOutcome::Skipped));

            // a one-shot is gone after exactly one transmit
            assert_ne!(
                scheduler.entry_tx_mode(61444).unwrap(),
                EntryTxMode::OnceRequested
            );
        }
    }

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_once_on_continuous_entry_keeps_it_continuous() {
    let (scheduler, transport) = recording_scheduler();
    scheduler.register(61444, 3, 0x00, IDLE).unwrap();
    scheduler.set_tx_mode_per_entry();
    scheduler.set_tx_mode_continuous(Some(61444)).unwrap();

    scheduler.set_tx_once(Some(61444)).unwrap();
    assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::SentOnce);
    assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::Sent);
    assert_eq!(
        scheduler.entry_tx_mode(61444).unwrap(),
        EntryTxMode::Continuous
    );
    assert_eq!(transport.count(), 2);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn test_tx_all_once_arms_every_entry() {
    let (scheduler, transport) = recording_scheduler();
    scheduler.register(61444, 3, 0x00, IDLE).unwrap();
    scheduler.register(65262, 6, 0x00, IDLE).unwrap();

    scheduler.set_tx_once(None).unwrap();
    assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::SentOnce);
    assert_eq!(scheduler.tick(65262).unwrap(), TickOutcome::SentOnce);
    assert_eq!(scheduler.tick(61444).unwrap(), TickOutcome::Skipped);
    assert_eq!(scheduler.tick(65262).unwrap(), TickOutcome::Skipped);

    let ids: Vec<u32> = transport.frames().iter().map(|f| f.id.as_u32()).collect();
    assert_eq!(ids, vec![0x0CF0_0400, 0x18FE_EE00]);

    scheduler.shutdown().await;
}

// ============================================================================
// Payload
// ============================================================================

#[tokio::test]
async fn test_shared_byte_fields_compose() {
    let (scheduler, _) = recording_scheduler();
    scheduler.register(61444, 3, 0x00, IDLE).unwrap();

    scheduler.modify_data(61444, 899, 0b101).unwrap();
    scheduler.modify_data(61444, 4154, 0b011).unwrap();
    assert_eq!(scheduler.read_data(61444, 899).unwrap(), 0b101);
    assert_eq!(scheduler.read_data(61444, 4154).unwrap(), 0b011);
    assert_eq!(scheduler.payload(61444).unwrap()[0], 0b0011_0101);

    scheduler.modify_data(61444, 899, 0b010).unwrap();
    assert_eq!(scheduler.payload(61444).unwrap()[0], 0b0011_0010);

    scheduler.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_writes_never_tear() {
    let (scheduler, transport) = recording_scheduler();
    scheduler.register(61444, 3, 0x00, IDLE).unwrap();
    scheduler.set_tx_mode_continuous(None).unwrap();

    let writer = {
        let scheduler = scheduler.clone();
        std::thread::spawn(move || {
            for i in 0..2000 {
                let raw = if i % 2 == 0 { 0x0000 } else { 0xFFFF };
                scheduler.modify_data(61444, 190, raw).unwrap();
            }
        })
    };
    for _ in 0..2000 {
        scheduler.tick(61444).unwrap();
    }
    writer.join().unwrap();

    for frame in transport.frames() {
        let speed = &frame.data()[3..5];
        assert!(speed == [0x00, 0x00] || speed == [0xFF, 0xFF], "torn: {speed:02X?}");
    }

    scheduler.shutdown().await;
}

// ============================================================================
// Periodic tasks
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_periodic_task_follows_rate_and_stops() {
    let (scheduler, transport) = recording_scheduler();
    scheduler
        .register(61444, 3, 0x00, Duration::from_millis(100))
        .unwrap();
    scheduler.set_tx_mode_continuous(None).unwrap();

    // ticks at 100, 200, 300
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(transport.count(), 3);

    // current sleep ends at 400, then every 50: 400, 450
    scheduler
        .modify_rate(61444, Duration::from_millis(50))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(transport.count(), 5);

    scheduler.shutdown().await;
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(transport.count(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_stopped_global_mode_sends_nothing() {
    let (scheduler, transport) = recording_scheduler();
    scheduler
        .register(61444, 3, 0x00, Duration::from_millis(100))
        .unwrap();
    scheduler.set_tx_mode_continuous(Some(61444)).unwrap();

    tokio::time::sleep(Duration::from_millis(550)).await;
    assert_eq!(transport.count(), 0);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_transport_errors_do_not_stop_the_task() {
    let transport = Arc::new(FailingTransport::default());
    let scheduler = TxScheduler::new(catalog(), transport.clone());
    let mut events = scheduler.subscribe();

    scheduler
        .register(61444, 3, 0x00, Duration::from_millis(100))
        .unwrap();
    scheduler.set_tx_mode_continuous(None).unwrap();

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 3);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.attempts.load(Ordering::SeqCst), 5);

    let mut failures = 0;
    while let Ok(event) = events.try_recv() {
        if let TxEvent::SendFailed { pgn, .. } = event {
            assert_eq!(pgn, 61444);
            failures += 1;
        }
    }
    assert_eq!(failures, 5);

    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_one_task_only() {
    let (scheduler, transport) = recording_scheduler();
    scheduler
        .register(61444, 3, 0x00, Duration::from_millis(100))
        .unwrap();
    scheduler
        .register(65262, 6, 0x00, Duration::from_millis(100))
        .unwrap();
    scheduler.set_tx_mode_continuous(None).unwrap();

    scheduler.cancel(61444).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    let frames = transport.frames();
    assert_eq!(frames.len(), 3);
    assert!(frames.iter().all(|f| f.id.pgn() == 65262));

    scheduler.shutdown().await;
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_event_stream() {
    let (scheduler, _) = recording_scheduler();
    let mut events = scheduler.subscribe();
    scheduler.register(61444, 3, 0x00, IDLE).unwrap();

    scheduler.set_tx_mode_per_entry();
    scheduler.set_tx_once(Some(61444)).unwrap();
    scheduler.tick(61444).unwrap();
    scheduler
        .modify_rate(61444, Duration::from_millis(50))
        .unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        TxEvent::GlobalModeChanged {
            mode: GlobalTxMode::PerEntry
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        TxEvent::EntryModeChanged {
            pgn: 61444,
            mode: EntryTxMode::OnceRequested
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        TxEvent::EntryModeChanged {
            pgn: 61444,
            mode: EntryTxMode::Stop
        }
    );
    assert!(matches!(
        events.try_recv().unwrap(),
        TxEvent::FrameSent { pgn: 61444, once: true, .. }
    ));
    assert_eq!(
        events.try_recv().unwrap(),
        TxEvent::RateChanged {
            pgn: 61444,
            period: Duration::from_millis(50)
        }
    );

    scheduler.shutdown().await;
}
