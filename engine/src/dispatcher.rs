//! Dispatch actor for streaming VWAP computation.
//!
//! The actor is the single owner of every [`VwapAggregator`]. It runs in one
//! tokio task and consumes a single typed channel of [`MarketEvent`]s, so each
//! instrument sees at most one update at a time without any lock.
//!
//! Per event:
//! - Heartbeat → advance the instrument's watermark (unknown instrument: ignored)
//! - Trade     → sequence check, add, average, write to the [`ResultSink`]
//!
//! Every per-event failure (stale, unknown, invalid, undefined average, sink
//! write) is logged, counted and dropped. Only the shutdown token, the upstream
//! cancellation token, or a closed input channel end the loop.
//!
//! Shutdown is two-phase: [`ActorHandle::signal_shutdown`] cancels the actor's
//! token, [`ActorHandle::wait`] joins the task. [`ActorHandle::shutdown`] does
//! both and returns only once the loop has exited and the inbound receiver is
//! dropped. Buffered events are abandoned, never drained.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use corelib::models::{AverageResult, Heartbeat, MarketEvent, TradeEvent};
use tokio::sync::Mutex;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, error, info, info_span, trace, warn};

use crate::aggregator::VwapAggregator;
use crate::error::EngineError;
use crate::metrics::{Counters, CountersSnapshot};
use crate::sink::ResultSink;

/// Why the actor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// `ActorHandle::shutdown` / `signal_shutdown` was called.
    Shutdown,
    /// The upstream token passed to `spawn` was cancelled.
    Cancelled,
    /// Every producer dropped its sender.
    InputClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActorState {
    /// Waiting for the next event or a stop signal.
    Running = 0,
    /// Handling one event. This is the lifecycle's draining phase: the loop
    /// only leaves it between events, never mid-event.
    Processing = 1,
    /// Stop requested, loop not yet exited.
    ShuttingDown = 2,
    Stopped = 3,
}

impl ActorState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ActorState::Running,
            1 => ActorState::Processing,
            2 => ActorState::ShuttingDown,
            _ => ActorState::Stopped,
        }
    }
}

/// Returned once the loop has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorReport {
    pub exit: ExitReason,
    pub counters: CountersSnapshot,
}

pub struct DispatchActor<S> {
    /// Aggregators keyed by instrument id. Fixed once spawned.
    aggregators: HashMap<String, VwapAggregator>,
    sink: S,
    counters: Counters,
    span: Span,
}

impl<S: ResultSink> DispatchActor<S> {
    pub fn new(sink: S) -> Self {
        Self {
            aggregators: HashMap::new(),
            sink,
            counters: Counters::default(),
            span: info_span!("dispatch"),
        }
    }

    /// Span the actor task runs under.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Share externally owned counters instead of a private set.
    pub fn with_counters(mut self, counters: Counters) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Register an instrument with a fixed window capacity.
    ///
    /// Events for instruments that were never registered are dropped as
    /// `UnknownInstrument`; nothing is created lazily.
    pub fn register(
        &mut self,
        instrument_id: impl Into<String>,
        capacity: usize,
    ) -> Result<(), EngineError> {
        let instrument_id = instrument_id.into();
        if self.aggregators.contains_key(&instrument_id) {
            return Err(EngineError::DuplicateInstrument(instrument_id));
        }

        let aggregator = VwapAggregator::new(capacity)?;
        debug!(instrument = %instrument_id, capacity, "instrument registered");
        self.aggregators.insert(instrument_id, aggregator);
        Ok(())
    }

    pub fn aggregator(&self, instrument_id: &str) -> Option<&VwapAggregator> {
        self.aggregators.get(instrument_id)
    }

    pub fn instruments(&self) -> impl Iterator<Item = &str> {
        self.aggregators.keys().map(String::as_str)
    }

    /// Move the actor into its own task.
    ///
    /// `cancel` is the upstream token: cancelling it stops the loop exactly
    /// like a shutdown, without anyone waiting on the result.
    pub fn spawn(self, rx: Receiver<MarketEvent>, cancel: CancellationToken) -> ActorHandle {
        let shutdown = CancellationToken::new();
        let state = Arc::new(AtomicU8::new(ActorState::Running as u8));

        let span = self.span.clone();
        let task = tokio::spawn(
            self.run(rx, shutdown.clone(), cancel, Arc::clone(&state))
                .instrument(span),
        );

        ActorHandle {
            shutdown,
            state,
            join: Mutex::new(JoinState {
                task: Some(task),
                outcome: None,
            }),
        }
    }

    async fn run(
        mut self,
        mut rx: Receiver<MarketEvent>,
        shutdown: CancellationToken,
        cancel: CancellationToken,
        state: Arc<AtomicU8>,
    ) -> ActorReport {
        info!(
            instruments = self.aggregators.len(),
            "dispatch actor started"
        );

        let exit = loop {
            tokio::select! {
                // Stop signals win over buffered input.
                biased;

                _ = shutdown.cancelled() => break ExitReason::Shutdown,
                _ = cancel.cancelled() => break ExitReason::Cancelled,

                maybe = rx.recv() => match maybe {
                    Some(event) => {
                        state.store(ActorState::Processing as u8, Ordering::Release);
                        self.process(event).await;
                        state.store(ActorState::Running as u8, Ordering::Release);
                    }
                    None => break ExitReason::InputClosed,
                },
            }
        };

        // Producers must observe a closed channel before the handle reports Stopped.
        drop(rx);
        state.store(ActorState::Stopped as u8, Ordering::Release);

        let counters = self.counters.snapshot();
        info!(?exit, ?counters, "dispatch actor stopped");

        ActorReport { exit, counters }
    }

    async fn process(&mut self, event: MarketEvent) {
        match event {
            MarketEvent::Heartbeat(hb) => self.on_heartbeat(hb),
            MarketEvent::Trade(trade) => match self.on_trade(&trade).await {
                Ok(result) => trace!(
                    instrument = %result.instrument_id,
                    sequence = trade.sequence,
                    average = result.average,
                    total_points = result.total_points,
                    "average emitted"
                ),
                Err(e) => self.record_failure(&trade, e),
            },
        }
    }

    fn on_heartbeat(&mut self, hb: Heartbeat) {
        let Some(aggregator) = self.aggregators.get_mut(&hb.instrument_id) else {
            Counters::bump(&self.counters.unknown_heartbeat);
            debug!(
                instrument = %hb.instrument_id,
                sequence = hb.sequence,
                "heartbeat for unregistered instrument ignored"
            );
            return;
        };

        Counters::bump(&self.counters.heartbeats);

        match aggregator.process_heartbeat(hb.sequence) {
            Some(previous) if previous > hb.sequence => warn!(
                instrument = %hb.instrument_id,
                sequence = hb.sequence,
                previous,
                "heartbeat moved the watermark backwards"
            ),
            _ => trace!(
                instrument = %hb.instrument_id,
                sequence = hb.sequence,
                "heartbeat applied"
            ),
        }
    }

    async fn on_trade(&mut self, trade: &TradeEvent) -> Result<AverageResult, EngineError> {
        let aggregator = self
            .aggregators
            .get_mut(&trade.instrument_id)
            .ok_or_else(|| EngineError::UnknownInstrument(trade.instrument_id.clone()))?;

        let outcome = aggregator.process_trade(trade);
        if matches!(outcome, Ok(_) | Err(EngineError::UndefinedAverage)) {
            Counters::bump(&self.counters.trades_accepted);
        }
        let snapshot = outcome?;

        let result = AverageResult {
            instrument_id: trade.instrument_id.clone(),
            timestamp: trade.timestamp,
            average: snapshot.average,
            total_points: snapshot.total_points,
        };

        self.sink.write(&result).await?;
        Counters::bump(&self.counters.results_written);

        Ok(result)
    }

    fn record_failure(&self, trade: &TradeEvent, err: EngineError) {
        match &err {
            EngineError::StaleSequence {
                received,
                last_seen,
            } => {
                Counters::bump(&self.counters.stale_rejected);
                warn!(
                    instrument = %trade.instrument_id,
                    received,
                    last_seen,
                    "stale trade dropped"
                );
            }
            EngineError::UnknownInstrument(instrument) => {
                Counters::bump(&self.counters.unknown_instrument);
                warn!(
                    instrument = %instrument,
                    sequence = trade.sequence,
                    "trade for unregistered instrument dropped"
                );
            }
            EngineError::InvalidTrade { price, volume } => {
                Counters::bump(&self.counters.invalid_trade);
                warn!(
                    instrument = %trade.instrument_id,
                    sequence = trade.sequence,
                    price,
                    volume,
                    "invalid trade dropped"
                );
            }
            EngineError::UndefinedAverage => {
                Counters::bump(&self.counters.undefined_average);
                debug!(
                    instrument = %trade.instrument_id,
                    sequence = trade.sequence,
                    "window holds no volume; nothing emitted"
                );
            }
            EngineError::SinkWrite(e) => {
                Counters::bump(&self.counters.sink_failures);
                warn!(
                    instrument = %trade.instrument_id,
                    sequence = trade.sequence,
                    error = %e,
                    "cannot write average to sink"
                );
            }
            other => error!(
                instrument = %trade.instrument_id,
                error = %other,
                "unexpected error while processing trade"
            ),
        }
    }
}

struct JoinState {
    task: Option<JoinHandle<ActorReport>>,
    outcome: Option<Result<ActorReport, String>>,
}

/// Control handle for a spawned [`DispatchActor`].
///
/// Safe to share (`Arc<ActorHandle>`) and to call `shutdown` from several
/// places: the first caller joins the task, later or concurrent callers wait
/// on the same join and receive the same report.
pub struct ActorHandle {
    shutdown: CancellationToken,
    state: Arc<AtomicU8>,
    join: Mutex<JoinState>,
}

impl ActorHandle {
    /// Phase one: ask the loop to stop. Returns immediately.
    pub fn signal_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Phase two: wait until the loop has fully exited.
    pub async fn wait(&self) -> Result<ActorReport, EngineError> {
        let mut join = self.join.lock().await;

        if let Some(task) = join.task.as_mut() {
            let outcome = task.await.map_err(|e| e.to_string());
            join.task = None;
            join.outcome = Some(outcome);
        }

        match &join.outcome {
            Some(outcome) => outcome.clone().map_err(EngineError::ActorFailed),
            None => Err(EngineError::ActorFailed("actor was never joined".into())),
        }
    }

    /// Signal, then wait. Idempotent.
    pub async fn shutdown(&self) -> Result<ActorReport, EngineError> {
        self.signal_shutdown();
        let report = self.wait().await?;
        info!(exit = ?report.exit, "dispatch actor shut down");
        Ok(report)
    }

    pub fn state(&self) -> ActorState {
        let state = ActorState::from_u8(self.state.load(Ordering::Acquire));
        if state != ActorState::Stopped && self.shutdown.is_cancelled() {
            ActorState::ShuttingDown
        } else {
            state
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == ActorState::Stopped
    }
}
