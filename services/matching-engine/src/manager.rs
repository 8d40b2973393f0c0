//! Engine manager
//!
//! Routes commands to per-instrument workers, maintains the halted set for
//! O(1) admission control, and owns lifecycle: one worker thread is spawned
//! per configured instrument at construction, and `stop` shuts them down
//! cooperatively (stop flag, close channels, drain, join).
//!
//! The routing map and halted set are read-mostly and sit behind
//! `parking_lot::RwLock`; nothing else is shared with the workers.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{error, info, warn};

use types::ids::{InstrumentId, OrderId};
use types::order::Order;

use crate::bus::{EventBus, EventSubscriber};
use crate::config::EngineConfig;
use crate::depth::DepthView;
use crate::oracle::ReferencePriceSource;
use crate::worker::{BookState, CommandReceipt, EngineWorker, WorkerRequest};

/// Errors surfaced by the manager's command interface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ── domain ──────────────────────────────────────────────────────
    #[error("instrument {0} is not registered")]
    InstrumentNotRegistered(InstrumentId),

    #[error("orderbook for instrument {0} is halted")]
    OrderbookHalted(InstrumentId),

    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error("engine for instrument {0} is faulted and refuses commands")]
    EngineFaulted(InstrumentId),

    #[error("engine is stopped")]
    EngineStopped,

    // ── infrastructure ──────────────────────────────────────────────
    #[error("timed out submitting or awaiting a command")]
    Timeout,

    #[error("engine channel closed")]
    ChannelClosed,

    #[error("{failed} engine workers failed to join cleanly")]
    Shutdown { failed: usize },
}

struct WorkerHandle {
    sender: Sender<WorkerRequest>,
    thread: JoinHandle<()>,
}

/// Router and lifecycle owner mapping instrument id → worker
pub struct EngineManager {
    workers: RwLock<HashMap<InstrumentId, WorkerHandle>>,
    halted: RwLock<HashSet<InstrumentId>>,
    bus: EventBus,
    running: Arc<AtomicBool>,
    submit_timeout: Duration,
    depth_levels: usize,
}

impl EngineManager {
    /// Create the manager and spawn one worker per configured instrument
    pub fn new(config: EngineConfig) -> Self {
        Self::with_reference_sources(config, HashMap::new())
    }

    /// Like [`EngineManager::new`], with per-instrument reference-price
    /// overrides. Instruments without an entry use last-trade.
    pub fn with_reference_sources(
        config: EngineConfig,
        mut references: HashMap<InstrumentId, Arc<dyn ReferencePriceSource>>,
    ) -> Self {
        info!(
            instruments = config.instruments.len(),
            "starting engine manager"
        );
        let bus = EventBus::new(config.event_bus_capacity);
        let mut workers = HashMap::with_capacity(config.instruments.len());

        for instrument in &config.instruments {
            let reference = references.remove(&instrument.instrument_id);
            let (sender, thread) = EngineWorker::spawn(
                instrument.clone(),
                config.depth_levels,
                config.command_queue_capacity,
                bus.clone(),
                reference,
            );
            workers.insert(instrument.instrument_id, WorkerHandle { sender, thread });
            info!(instrument = %instrument.instrument_id, "engine worker registered");
        }

        Self {
            workers: RwLock::new(workers),
            halted: RwLock::new(HashSet::new()),
            bus,
            running: Arc::new(AtomicBool::new(true)),
            submit_timeout: Duration::from_millis(config.submit_timeout_ms),
            depth_levels: config.depth_levels,
        }
    }

    /// Place an order on its instrument's book.
    ///
    /// Returns the final order state and the trades the command produced,
    /// or a domain/infrastructure error. An expired submission timeout
    /// before the command was enqueued means it was never applied.
    pub fn place(&self, order: Order) -> Result<CommandReceipt, EngineError> {
        let instrument_id = order.instrument_id;
        self.admit(instrument_id)?;

        let deadline = Instant::now() + self.submit_timeout;
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(
            instrument_id,
            WorkerRequest::Place {
                order,
                reply: Some(reply_tx),
            },
            deadline,
        )?;
        recv_deadline(&reply_rx, deadline)?
    }

    /// Cancel an order. Allowed while the instrument is halted.
    pub fn cancel(
        &self,
        instrument_id: InstrumentId,
        order_id: OrderId,
    ) -> Result<CommandReceipt, EngineError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(EngineError::EngineStopped);
        }

        let deadline = Instant::now() + self.submit_timeout;
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(
            instrument_id,
            WorkerRequest::Cancel {
                order_id,
                reply: Some(reply_tx),
            },
            deadline,
        )?;
        recv_deadline(&reply_rx, deadline)?
    }

    /// Halt the given instruments: new places are rejected, cancels pass
    pub fn halt(&self, instruments: &[InstrumentId]) {
        self.halted.write().extend(instruments.iter().copied());
        for instrument_id in instruments {
            self.send_control(*instrument_id, WorkerRequest::Halt);
        }
    }

    /// Resume the given instruments
    pub fn resume(&self, instruments: &[InstrumentId]) {
        {
            let mut halted = self.halted.write();
            for instrument_id in instruments {
                halted.remove(instrument_id);
            }
        }
        for instrument_id in instruments {
            self.send_control(*instrument_id, WorkerRequest::Resume);
        }
    }

    /// Aggregated depth snapshot with at most `depth` levels per side.
    /// `depth` of None uses the configured default.
    pub fn snapshot(
        &self,
        instrument_id: InstrumentId,
        depth: Option<usize>,
    ) -> Result<DepthView, EngineError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(EngineError::EngineStopped);
        }
        let deadline = Instant::now() + self.submit_timeout;
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(
            instrument_id,
            WorkerRequest::Snapshot {
                levels: depth.unwrap_or(self.depth_levels),
                reply: reply_tx,
            },
            deadline,
        )?;
        recv_deadline(&reply_rx, deadline)?
    }

    /// Current lifecycle state of one instrument's worker
    pub fn status(&self, instrument_id: InstrumentId) -> Result<BookState, EngineError> {
        let deadline = Instant::now() + self.submit_timeout;
        let (reply_tx, reply_rx) = bounded(1);
        self.submit(instrument_id, WorkerRequest::Status { reply: reply_tx }, deadline)?;
        match reply_rx.recv_deadline(deadline) {
            Ok(state) => Ok(state),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::ChannelClosed),
        }
    }

    /// Subscribe to the engine event stream
    pub fn subscribe(&self) -> EventSubscriber {
        self.bus.subscribe()
    }

    /// Registered instrument ids
    pub fn instruments(&self) -> Vec<InstrumentId> {
        self.workers.read().keys().copied().collect()
    }

    /// The manager is live immediately after construction
    pub fn start(&self) -> Result<(), EngineError> {
        if self.running.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(EngineError::EngineStopped)
        }
    }

    /// Cooperative shutdown: set the stop flag, close every command
    /// channel, let workers drain, then join them.
    pub fn stop(&self) -> Result<(), EngineError> {
        if !self.running.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        info!("stopping engine manager");

        let handles: Vec<(InstrumentId, WorkerHandle)> =
            self.workers.write().drain().collect();

        for (_, handle) in &handles {
            let _ = handle
                .sender
                .send_timeout(WorkerRequest::Shutdown, self.submit_timeout);
        }

        let mut failed = 0;
        for (instrument_id, handle) in handles {
            // Dropping the sender closes the channel even if the shutdown
            // message never fit in the queue
            drop(handle.sender);
            if handle.thread.join().is_err() {
                error!(instrument = %instrument_id, "engine worker panicked");
                failed += 1;
            }
        }

        if failed == 0 {
            info!("engine manager stopped");
            Ok(())
        } else {
            Err(EngineError::Shutdown { failed })
        }
    }

    // ── internals ───────────────────────────────────────────────────

    /// Admission control for places: engine running and instrument live
    fn admit(&self, instrument_id: InstrumentId) -> Result<(), EngineError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(EngineError::EngineStopped);
        }
        if self.halted.read().contains(&instrument_id) {
            return Err(EngineError::OrderbookHalted(instrument_id));
        }
        Ok(())
    }

    /// Enqueue a request on the target worker's bounded channel, giving up
    /// at `deadline`. A timeout here means the command was never applied.
    fn submit(
        &self,
        instrument_id: InstrumentId,
        request: WorkerRequest,
        deadline: Instant,
    ) -> Result<(), EngineError> {
        let sender = {
            let workers = self.workers.read();
            workers
                .get(&instrument_id)
                .map(|handle| handle.sender.clone())
                .ok_or(EngineError::InstrumentNotRegistered(instrument_id))?
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        sender.send_timeout(request, remaining).map_err(|e| match e {
            SendTimeoutError::Timeout(_) => EngineError::Timeout,
            SendTimeoutError::Disconnected(_) => EngineError::ChannelClosed,
        })
    }

    /// Fire-and-forget control message
    fn send_control(&self, instrument_id: InstrumentId, request: WorkerRequest) {
        let workers = self.workers.read();
        match workers.get(&instrument_id) {
            Some(handle) => {
                if handle
                    .sender
                    .send_timeout(request, self.submit_timeout)
                    .is_err()
                {
                    warn!(instrument = %instrument_id, "control message dropped");
                }
            }
            None => warn!(instrument = %instrument_id, "control message for unknown instrument"),
        }
    }
}

impl Drop for EngineManager {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn recv_deadline<T>(
    receiver: &crossbeam_channel::Receiver<Result<T, EngineError>>,
    deadline: Instant,
) -> Result<Result<T, EngineError>, EngineError> {
    match receiver.recv_deadline(deadline) {
        Ok(result) => Ok(result),
        Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout),
        Err(RecvTimeoutError::Disconnected) => Err(EngineError::ChannelClosed),
    }
}
