//! Engine worker
//!
//! One worker owns exactly one instrument: its matcher (book + depth), its
//! trigger pool, its reference price, and its event sequence. The worker
//! runs on a dedicated OS thread consuming a bounded command channel, so
//! the matching hot path sees no shared mutable state and takes no locks.
//!
//! Events for a command are published before its reply is sent, so a caller
//! that observes the reply can already find the command's events buffered
//! on the bus.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use types::errors::RejectReason;
use types::ids::{InstrumentId, OrderId};
use types::numeric::Price;
use types::order::{Order, OrderStatus};
use types::trade::Trade;

use crate::book::BookError;
use crate::bus::EventBus;
use crate::config::InstrumentConfig;
use crate::depth::DepthView;
use crate::events::{EngineEvent, EventPayload};
use crate::manager::EngineError;
use crate::matching::{Matcher, MatchingError, ProcessOutcome, TriggerPool};
use crate::oracle::ReferencePriceSource;

/// Worker lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookState {
    /// Accepting all commands
    Running,
    /// Rejecting places; cancels still allowed
    Halted,
    /// Invariant violation detected; refusing everything (terminal)
    Faulted,
}

/// Successful result of a place or cancel command
#[derive(Debug, Clone)]
pub struct CommandReceipt {
    /// Final state of the order the command was about
    pub order: Order,
    /// Trades produced by this command (triggered stops report their own)
    pub trades: Vec<Trade>,
    /// Set when the order failed validation and was never placed
    pub reject_reason: Option<RejectReason>,
}

type Reply<T> = Sender<Result<T, EngineError>>;

/// Requests routed to a worker by the manager
pub(crate) enum WorkerRequest {
    Place {
        order: Order,
        reply: Option<Reply<CommandReceipt>>,
    },
    Cancel {
        order_id: OrderId,
        reply: Option<Reply<CommandReceipt>>,
    },
    Snapshot {
        levels: usize,
        reply: Reply<DepthView>,
    },
    Status {
        reply: Sender<BookState>,
    },
    Halt,
    Resume,
    Shutdown,
}

/// Single-threaded executor owning one instrument
pub(crate) struct EngineWorker {
    config: InstrumentConfig,
    matcher: Matcher,
    triggers: TriggerPool,
    bus: EventBus,
    /// External reference source; None means last-trade
    reference: Option<Arc<dyn ReferencePriceSource>>,
    last_trade_price: Option<Price>,
    /// Per-instrument event sequence, starting at 1
    sequence: u64,
    state: BookState,
    depth_levels: usize,
}

impl EngineWorker {
    /// Spawn the worker thread; returns the command sender and the handle.
    pub(crate) fn spawn(
        config: InstrumentConfig,
        depth_levels: usize,
        queue_capacity: usize,
        bus: EventBus,
        reference: Option<Arc<dyn ReferencePriceSource>>,
    ) -> (Sender<WorkerRequest>, JoinHandle<()>) {
        let (command_tx, command_rx) = bounded(queue_capacity);
        let instrument_id = config.instrument_id;

        let handle = thread::Builder::new()
            .name(format!("engine-{instrument_id}"))
            .spawn(move || {
                let mut worker = EngineWorker {
                    matcher: Matcher::new(config.clone()),
                    triggers: TriggerPool::new(),
                    bus,
                    reference,
                    last_trade_price: None,
                    sequence: 0,
                    state: BookState::Running,
                    depth_levels,
                    config,
                };
                worker.run(command_rx);
            })
            .expect("failed to spawn engine worker thread");

        (command_tx, handle)
    }

    fn run(&mut self, commands: Receiver<WorkerRequest>) {
        info!(instrument = %self.config.instrument_id, "engine worker started");
        while let Ok(request) = commands.recv() {
            if self.handle(request) {
                // Shutdown requested: drain what is already queued, then exit
                while let Ok(request) = commands.try_recv() {
                    self.handle(request);
                }
                break;
            }
        }
        info!(instrument = %self.config.instrument_id, "engine worker stopped");
    }

    /// Process one request; returns true when the worker should exit
    fn handle(&mut self, request: WorkerRequest) -> bool {
        match request {
            WorkerRequest::Place { order, reply } => {
                let result = self.handle_place(order);
                send_reply(reply, result);
            }
            WorkerRequest::Cancel { order_id, reply } => {
                let result = self.handle_cancel(order_id);
                send_reply(reply, result);
            }
            WorkerRequest::Snapshot { levels, reply } => {
                let view = self.matcher.depth_snapshot(levels, now_nanos());
                let _ = reply.send(Ok(view));
            }
            WorkerRequest::Status { reply } => {
                let _ = reply.send(self.state);
            }
            WorkerRequest::Halt => {
                if self.state == BookState::Running {
                    self.state = BookState::Halted;
                    info!(instrument = %self.config.instrument_id, "book halted");
                    self.publish(EventPayload::BookHalted);
                }
            }
            WorkerRequest::Resume => {
                if self.state == BookState::Halted {
                    self.state = BookState::Running;
                    info!(instrument = %self.config.instrument_id, "book resumed");
                    self.publish(EventPayload::BookResumed);
                }
            }
            WorkerRequest::Shutdown => return true,
        }
        false
    }

    fn handle_place(&mut self, order: Order) -> Result<CommandReceipt, EngineError> {
        match self.state {
            BookState::Faulted => {
                return Err(EngineError::EngineFaulted(self.config.instrument_id))
            }
            // Admission failure: domain error, no event
            BookState::Halted => {
                return Err(EngineError::OrderbookHalted(self.config.instrument_id))
            }
            BookState::Running => {}
        }

        let now = now_nanos();
        let reference = self.current_reference();
        let outcome = match self.matcher.process_place(order, reference, now) {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fault(e)),
        };

        self.publish_outcome(&outcome, true);
        self.update_last_trade(&outcome);
        if outcome.taker.status == OrderStatus::WaitingTrigger {
            self.triggers.insert(outcome.taker.clone());
        }

        let mut book_mutated = outcome.rested || !outcome.trades.is_empty();
        match self.run_triggers(now) {
            Ok(cascade_mutated) => book_mutated |= cascade_mutated,
            Err(e) => return Err(self.fault(e)),
        }

        if book_mutated {
            self.publish_depth(now);
        }

        Ok(CommandReceipt {
            reject_reason: outcome.reject_reason,
            trades: outcome.trades,
            order: outcome.taker,
        })
    }

    fn handle_cancel(&mut self, order_id: OrderId) -> Result<CommandReceipt, EngineError> {
        if self.state == BookState::Faulted {
            return Err(EngineError::EngineFaulted(self.config.instrument_id));
        }

        let now = now_nanos();
        match self.matcher.process_cancel(order_id, now) {
            Ok(outcome) => {
                self.publish_cancel(&outcome);
                self.publish_depth(now);
                Ok(CommandReceipt {
                    order: outcome.taker,
                    trades: Vec::new(),
                    reject_reason: None,
                })
            }
            Err(MatchingError::OrderNotFound(_)) => {
                // Not in the book; it may be a parked conditional order
                if let Some(mut waiting) = self.triggers.remove(order_id) {
                    let previous = waiting.status;
                    if waiting.cancel(now).is_err() {
                        return Err(self.fault(BookError::CorruptIndex(order_id)));
                    }
                    let outcome = ProcessOutcome::cancelled(waiting, previous);
                    self.publish_cancel(&outcome);
                    return Ok(CommandReceipt {
                        order: outcome.taker,
                        trades: Vec::new(),
                        reject_reason: None,
                    });
                }
                self.publish(EventPayload::OrderCancelRejected {
                    order_id,
                    reason: "order not found".to_string(),
                });
                Err(EngineError::OrderNotFound(order_id))
            }
            Err(MatchingError::Book(e)) => Err(self.fault(e)),
        }
    }

    /// Fire every trigger the current reference price has crossed,
    /// re-processing each inline. Trades produced by a fired stop can move
    /// the reference again, so the loop re-reads it between pops.
    fn run_triggers(&mut self, now: i64) -> Result<bool, BookError> {
        let mut mutated = false;
        loop {
            let Some(reference) = self.current_reference() else {
                break;
            };
            let Some(waiting) = self.triggers.pop_eligible(reference) else {
                break;
            };
            let outcome = self.matcher.process_place(waiting, Some(reference), now)?;
            self.publish_outcome(&outcome, false);
            self.update_last_trade(&outcome);
            mutated |= outcome.rested || !outcome.trades.is_empty();
        }
        Ok(mutated)
    }

    fn current_reference(&self) -> Option<Price> {
        match &self.reference {
            Some(source) => source.reference_price(self.config.instrument_id),
            None => self.last_trade_price,
        }
    }

    fn update_last_trade(&mut self, outcome: &ProcessOutcome) {
        if let Some(trade) = outcome.trades.last() {
            self.last_trade_price = Some(trade.price);
        }
    }

    /// Publish all events for a place outcome.
    ///
    /// Order of emission: acceptance (fresh commands only), trigger marker,
    /// then per match TradeExecuted before OrderMatched for taker and maker,
    /// then the rested remainder, then the status transitions. The coalesced
    /// depth event is published separately, once per command.
    fn publish_outcome(&mut self, outcome: &ProcessOutcome, fresh: bool) {
        if let Some(reason) = outcome.reject_reason {
            warn!(
                instrument = %self.config.instrument_id,
                order_id = %outcome.taker.id,
                %reason,
                "order rejected"
            );
            self.publish(EventPayload::OrderRejected {
                order: outcome.taker.clone(),
                reason: reason.to_string(),
            });
            for change in &outcome.status_changes {
                self.publish(EventPayload::OrderStatusChanged {
                    order_id: change.order_id,
                    previous: change.previous,
                    current: change.current,
                });
            }
            return;
        }

        if fresh {
            self.publish(EventPayload::OrderAccepted {
                order: outcome.taker.clone(),
            });
        }
        if let Some(reference_price) = outcome.trigger_fired {
            self.publish(EventPayload::TriggerFired {
                order: outcome.taker.clone(),
                reference_price,
            });
        }

        for (trade, maker) in outcome.trades.iter().zip(outcome.makers.iter()) {
            self.publish(EventPayload::TradeExecuted {
                trade: trade.clone(),
            });
            self.publish(EventPayload::OrderMatched {
                order: outcome.taker.clone(),
                matched_base: trade.base_amount,
            });
            self.publish(EventPayload::OrderMatched {
                order: maker.clone(),
                matched_base: trade.base_amount,
            });
        }

        if outcome.rested {
            self.publish(EventPayload::OrderAdded {
                order: outcome.taker.clone(),
            });
        }

        for change in &outcome.status_changes {
            self.publish(EventPayload::OrderStatusChanged {
                order_id: change.order_id,
                previous: change.previous,
                current: change.current,
            });
        }
    }

    fn publish_cancel(&mut self, outcome: &ProcessOutcome) {
        self.publish(EventPayload::OrderCancelled {
            order: outcome.taker.clone(),
        });
        for change in &outcome.status_changes {
            self.publish(EventPayload::OrderStatusChanged {
                order_id: change.order_id,
                previous: change.previous,
                current: change.current,
            });
        }
    }

    fn publish_depth(&mut self, now: i64) {
        let depth = self.matcher.depth_snapshot(self.depth_levels, now);
        self.publish(EventPayload::DepthUpdated { depth });
    }

    fn publish(&mut self, payload: EventPayload) {
        self.sequence += 1;
        self.bus.publish(EngineEvent {
            sequence: self.sequence,
            instrument_id: self.config.instrument_id,
            timestamp: now_nanos(),
            payload,
        });
    }

    /// Record the diagnostic, poison the instrument, and report the error.
    fn fault(&mut self, error: BookError) -> EngineError {
        error!(
            instrument = %self.config.instrument_id,
            %error,
            "book invariant violation; isolating instrument"
        );
        self.state = BookState::Faulted;
        self.publish(EventPayload::BookFaulted {
            message: error.to_string(),
        });
        EngineError::EngineFaulted(self.config.instrument_id)
    }
}

fn send_reply<T>(reply: Option<Reply<T>>, result: Result<T, EngineError>) {
    if let Some(reply) = reply {
        // A caller that timed out has dropped its receiver; nothing to do
        let _ = reply.send(result);
    }
}

/// Current wall-clock time in unix nanoseconds (saturates far in the future)
pub(crate) fn now_nanos() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX)
}
