//! Connectable subscriber: buffer events until the downstream is connected
//!
//! A `ConnectableSubscriber` wraps a downstream `Subscriber` and accepts
//! events before that downstream is ready to see them. Events primed with
//! `push_first` / `push_iterable` are replayed first on `connect()`, then the
//! events the producer sent through `on_next` before connecting, then a
//! terminal signal scheduled with `push_complete` / `push_error`. Only after
//! all of that has been acknowledged does the subscriber switch to the fast
//! path and forward `on_next` straight to the downstream.
//!
//! ## Synchronization
//!
//! Buffer, scheduled terminal, phase and the pre-connect acknowledgment
//! chain live behind one mutex. The `connected` flag is the only state read
//! without it. It is stored once, with `Release`, while holding the mutex
//! and after `stopped` and the cleared buffer were written; readers load it
//! with `Acquire` and therefore observe both.

mod downstream;
mod drain;
mod state;

pub use state::ConnectionState;

use self::downstream::Downstream;
use self::drain::DrainSubscriber;
use self::state::{State, Terminal};
use crate::ack::{Ack, AckPromise, Acknowledgment};
use crate::cancelable::Cancelable;
use crate::config::ConnectableConfig;
use crate::error::{Result, StreamError};
use crate::scheduler::Scheduler;
use crate::source::{DrainSource, IterSource};
use crate::subscriber::Subscriber;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Subscriber that buffers until `connect()` and then drains in order
///
/// Cloning yields another handle to the same subscriber.
pub struct ConnectableSubscriber<T, S> {
    inner: Arc<Inner<T, S>>,
}

struct Inner<T, S> {
    id: String,
    name: String,
    downstream: Arc<Downstream<T, S>>,
    state: Mutex<State<T>>,

    /// Fast path enabled; written once
    connected: AtomicBool,

    /// Forwarding permanently disabled
    stopped: Arc<AtomicBool>,

    /// Last live acknowledgment that was not resolved when returned
    last_live: Mutex<Acknowledgment>,

    /// Root of the pre-connect chain, resolved with the drain outcome
    gate: AckPromise,
    gate_ack: Acknowledgment,
}

impl<T, S> ConnectableSubscriber<T, S>
where
    T: Send + 'static,
    S: Subscriber<T> + 'static,
{
    /// Wrap `downstream` with the default configuration
    pub fn new(downstream: S) -> Self {
        Self::with_config(downstream, &ConnectableConfig::default())
    }

    /// Wrap `downstream`
    pub fn with_config(downstream: S, config: &ConnectableConfig) -> Self {
        let id = format!("conn-{}", uuid::Uuid::new_v4());
        let (gate, gate_ack) = AckPromise::new();

        Self {
            inner: Arc::new(Inner {
                downstream: Arc::new(Downstream::new(
                    downstream,
                    id.clone(),
                    config.report_dropped_errors,
                )),
                id,
                name: config.name.clone(),
                state: Mutex::new(State::new(gate_ack.clone(), config.buffer_capacity)),
                connected: AtomicBool::new(false),
                stopped: Arc::new(AtomicBool::new(false)),
                last_live: Mutex::new(Acknowledgment::CONTINUE),
                gate,
                gate_ack,
            }),
        }
    }

    /// Start draining the primed buffer into the downstream
    ///
    /// Only the first call subscribes the drain; every call returns a handle
    /// to that same subscription. Canceling it stops the drain and disables
    /// forwarding.
    pub fn connect(&self) -> Cancelable {
        let mut state = self.inner.lock_state();
        if let Some(handle) = &state.cancelable {
            return handle.clone();
        }

        state.phase = ConnectionState::Connecting;
        let buffer = state.buffer.take().unwrap_or_default();
        let buffered = buffer.len();

        let (drained, drained_ack) = AckPromise::new();
        let drain = DrainSubscriber::new(self.inner.downstream.clone(), drained.clone());
        let subscription = IterSource::from(buffer).subscribe(drain);

        let connection = self.inner.id.clone();
        let handle = Cancelable::new(move || {
            subscription.cancel();
            if drained.try_complete(Ack::Stop) {
                tracing::info!(connection = %connection, "Drain canceled");
            }
        });
        state.cancelable = Some(handle.clone());

        tracing::info!(
            connection = %self.inner.id,
            name = %self.inner.name,
            buffered,
            scheduled = state.scheduled.as_ref().map(Terminal::kind),
            pending = state.links,
            "Connecting subscriber"
        );

        let inner = self.inner.clone();
        self.inner.scheduler().spawn(async move {
            let outcome = drained_ack.await;
            inner.settle(outcome).await;
        });

        handle
    }

    /// Append one event to the replay buffer
    pub fn push_first(&self, item: T) -> Result<()> {
        self.push_iterable(std::iter::once(item))
    }

    /// Append events to the replay buffer, in order
    ///
    /// Fails once `connect()` was called; ignored if a terminal signal is
    /// already scheduled.
    pub fn push_iterable<I>(&self, items: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        let mut state = self.inner.lock_state();
        state.ensure_idle("push events")?;

        if state.scheduled.is_some() {
            tracing::trace!(
                connection = %self.inner.id,
                "Terminal already scheduled, events not buffered"
            );
            return Ok(());
        }
        if let Some(buffer) = state.buffer.as_mut() {
            buffer.extend(items);
        }
        Ok(())
    }

    /// Schedule completion after the replayed events
    pub fn push_complete(&self) -> Result<()> {
        self.schedule(Terminal::Complete, "push_complete")
    }

    /// Schedule an error after the replayed events
    pub fn push_error(&self, error: StreamError) -> Result<()> {
        self.schedule(Terminal::Error(error), "push_error")
    }

    fn schedule(&self, terminal: Terminal, op: &str) -> Result<()> {
        let mut state = self.inner.lock_state();
        state.ensure_idle(op)?;

        // First terminal wins
        if state.scheduled.is_none() {
            state.scheduled = Some(terminal);
        }
        Ok(())
    }

    /// Detailed connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.lock_state().phase
    }

    /// Whether the fast path is enabled
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Whether forwarding has been permanently disabled
    pub fn is_stopped(&self) -> bool {
        self.inner.stopped.load(Ordering::Acquire)
    }

    /// Whether a terminal signal has reached the downstream
    pub fn is_terminated(&self) -> bool {
        self.inner.downstream.is_terminated()
    }

    /// Outcome of the buffered drain: `Continue` when every primed event was
    /// accepted, `Stop` otherwise
    pub fn connection(&self) -> Acknowledgment {
        self.inner.gate_ack.clone()
    }

    /// Instance identifier used in log records
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The wrapped subscriber
    pub fn downstream(&self) -> &S {
        self.inner.downstream.subscriber()
    }
}

impl<T, S> Inner<T, S>
where
    T: Send + 'static,
    S: Subscriber<T> + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scheduler(&self) -> &Scheduler {
        self.downstream.scheduler()
    }

    fn forward(&self, item: T) -> Acknowledgment {
        if self.stopped.load(Ordering::Acquire) {
            return Acknowledgment::STOP;
        }

        let ack = self.downstream.on_next(item);
        match ack.value() {
            Some(Ack::Continue) => ack,
            Some(Ack::Stop) => {
                stop(&self.stopped, &self.id);
                ack
            }
            None => {
                // The flag is set before any awaiter observes the resolution
                let stopped = self.stopped.clone();
                let connection = self.id.clone();
                let ack = Acknowledgment::spawn(self.scheduler(), async move {
                    let outcome = ack.await;
                    if outcome == Ack::Stop {
                        stop(&stopped, &connection);
                    }
                    outcome
                });
                *self.last_live.lock().unwrap_or_else(PoisonError::into_inner) = ack.clone();
                ack
            }
        }
    }

    /// Queue `item` behind every pending link of the pre-connect chain
    fn append_next(&self, state: &mut State<T>, item: T) -> Acknowledgment {
        if state.upstream_terminal.is_some() || state.chain.is_stop() {
            return Acknowledgment::STOP;
        }

        let downstream = self.downstream.clone();
        let prev = std::mem::replace(&mut state.chain, Acknowledgment::STOP);
        let link = prev.chain(self.scheduler(), move || downstream.on_next(item));
        state.chain = link.clone();
        state.links += 1;
        link
    }

    /// Queue `terminal` as the last link; it always resolves `Stop`
    fn append_terminal(&self, state: &mut State<T>, terminal: Terminal) {
        let downstream = self.downstream.clone();
        let prev = std::mem::replace(&mut state.chain, Acknowledgment::STOP);
        state.chain = Acknowledgment::spawn(self.scheduler(), async move {
            match prev.await {
                Ack::Continue => downstream.terminate(terminal),
                Ack::Stop => downstream.discard(terminal),
            }
            Ack::Stop
        });
        state.links += 1;
    }

    fn terminate(&self, terminal: Terminal) {
        let terminal = {
            let mut state = self.lock_state();
            if self.connected.load(Ordering::Acquire) {
                state.phase = ConnectionState::Connected(Ack::Stop);
                terminal
            } else if state.drain_finished {
                self.append_terminal(&mut state, terminal);
                return;
            } else if state.upstream_terminal.is_none() {
                // Replayed after the drain, behind the pending chain
                state.upstream_terminal = Some(terminal);
                return;
            } else {
                drop(state);
                self.downstream.reject(terminal);
                return;
            }
        };

        if self.stopped.swap(true, Ordering::AcqRel) {
            self.downstream.discard(terminal);
            return;
        }

        let last = self
            .last_live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let downstream = self.downstream.clone();
        last.on_complete(self.scheduler(), move |ack| match ack {
            Ack::Continue => downstream.terminate(terminal),
            Ack::Stop => downstream.discard(terminal),
        });
    }

    /// Runs once the drain resolved
    async fn settle(self: Arc<Self>, drained: Ack) {
        if drained == Ack::Stop {
            let dropped = {
                let mut state = self.lock_state();
                state.buffer = None;
                state.drain_finished = true;
                let dropped = [state.scheduled.take(), state.upstream_terminal.take()];
                state.chain = Acknowledgment::STOP;
                state.phase = ConnectionState::Connected(Ack::Stop);
                self.stopped.store(true, Ordering::Release);
                self.connected.store(true, Ordering::Release);
                dropped
            };
            for terminal in dropped.into_iter().flatten() {
                self.downstream.discard(terminal);
            }
            self.gate.try_complete(Ack::Stop);
            tracing::info!(
                connection = %self.id,
                "Subscriber connected, downstream stopped during drain"
            );
            return;
        }

        let rejected = {
            let mut state = self.lock_state();
            state.buffer = None;
            state.drain_finished = true;
            let scheduled = state.scheduled.take();
            let upstream = state.upstream_terminal.take();
            let (terminal, rejected) = match (scheduled, upstream) {
                (Some(scheduled), Some(upstream)) => (Some(scheduled), Some(upstream)),
                (scheduled, upstream) => (scheduled.or(upstream), None),
            };
            if let Some(terminal) = terminal {
                self.append_terminal(&mut state, terminal);
            }
            rejected
        };
        if let Some(terminal) = rejected {
            self.downstream.reject(terminal);
        }
        self.gate.try_complete(Ack::Continue);

        let outcome = self.await_pending_chain().await;
        tracing::info!(
            connection = %self.id,
            outcome = ?outcome,
            "Subscriber connected"
        );
    }

    /// Wait until the pre-connect chain stops growing, then enable the
    /// fast path
    async fn await_pending_chain(&self) -> Ack {
        loop {
            let (tail, links) = {
                let state = self.lock_state();
                (state.chain.clone(), state.links)
            };
            let outcome = tail.await;

            let settled = {
                let mut state = self.lock_state();
                if state.links != links {
                    false
                } else {
                    state.phase = ConnectionState::Connected(outcome);
                    state.chain = Acknowledgment::Ready(outcome);
                    *self.last_live.lock().unwrap_or_else(PoisonError::into_inner) =
                        Acknowledgment::Ready(outcome);
                    if outcome == Ack::Stop {
                        self.stopped.store(true, Ordering::Release);
                    }
                    self.connected.store(true, Ordering::Release);
                    true
                }
            };
            if settled {
                return outcome;
            }
        }
    }
}

fn stop(stopped: &AtomicBool, connection: &str) {
    if !stopped.swap(true, Ordering::AcqRel) {
        tracing::debug!(connection = %connection, "Downstream stopped");
    }
}

impl<T, S> Subscriber<T> for ConnectableSubscriber<T, S>
where
    T: Send + 'static,
    S: Subscriber<T> + 'static,
{
    fn on_next(&self, item: T) -> Acknowledgment {
        if self.inner.connected.load(Ordering::Acquire) {
            return self.inner.forward(item);
        }

        let mut state = self.inner.lock_state();
        if self.inner.connected.load(Ordering::Acquire) {
            drop(state);
            return self.inner.forward(item);
        }
        self.inner.append_next(&mut state, item)
    }

    fn on_complete(&self) {
        self.inner.terminate(Terminal::Complete);
    }

    fn on_error(&self, error: StreamError) {
        self.inner.terminate(Terminal::Error(error));
    }

    fn scheduler(&self) -> &Scheduler {
        self.inner.scheduler()
    }
}

impl<T, S> Clone for ConnectableSubscriber<T, S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, S> std::fmt::Debug for ConnectableSubscriber<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectableSubscriber")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("connected", &self.inner.connected.load(Ordering::Acquire))
            .field("stopped", &self.inner.stopped.load(Ordering::Acquire))
            .finish()
    }
}
