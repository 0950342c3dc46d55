//! Acknowledgment protocol: the backpressure signal of every `on_next`
//!
//! A subscriber answers each event with an `Acknowledgment` that resolves,
//! now or later, to `Ack::Continue` ("keep sending") or `Ack::Stop`
//! ("stop sending"). Producers must not send the next event before the
//! previous acknowledgment resolved to `Continue`.

use crate::scheduler::Scheduler;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Resolved value of an acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ack {
    /// The subscriber accepts more events
    Continue,
    /// The subscriber refuses any further events
    Stop,
}

/// An acknowledgment that may resolve immediately or later
///
/// Cloning is cheap; all clones observe the same resolution. Awaiting a
/// `Pending` acknowledgment polls the shared inner future.
#[derive(Clone)]
pub enum Acknowledgment {
    /// Already resolved
    Ready(Ack),
    /// Resolves asynchronously
    Pending(Shared<BoxFuture<'static, Ack>>),
}

impl Acknowledgment {
    /// Synchronous `Continue`
    pub const CONTINUE: Self = Self::Ready(Ack::Continue);

    /// Synchronous `Stop`
    pub const STOP: Self = Self::Ready(Ack::Stop);

    /// Wrap a future; it only makes progress when polled
    pub fn from_future<F>(fut: F) -> Self
    where
        F: Future<Output = Ack> + Send + 'static,
    {
        Self::Pending(fut.boxed().shared())
    }

    /// Wrap a future and drive it on the scheduler, so it resolves even if
    /// nobody awaits the returned acknowledgment
    pub fn spawn<F>(scheduler: &Scheduler, fut: F) -> Self
    where
        F: Future<Output = Ack> + Send + 'static,
    {
        let shared = fut.boxed().shared();
        scheduler.spawn(shared.clone().map(|_| ()));
        Self::Pending(shared)
    }

    /// The resolved value, if already known
    pub fn value(&self) -> Option<Ack> {
        match self {
            Self::Ready(ack) => Some(*ack),
            Self::Pending(fut) => fut.peek().copied(),
        }
    }

    /// Whether this acknowledgment is known to be `Stop`
    pub fn is_stop(&self) -> bool {
        self.value() == Some(Ack::Stop)
    }

    /// Run `f` only once this resolved to `Continue`; propagate `Stop`
    /// without running it
    ///
    /// Runs `f` synchronously when already resolved.
    pub fn flat_map_continue<F>(self, scheduler: &Scheduler, f: F) -> Acknowledgment
    where
        F: FnOnce() -> Acknowledgment + Send + 'static,
    {
        match self.value() {
            Some(Ack::Continue) => f(),
            Some(Ack::Stop) => Self::STOP,
            None => self.chain(scheduler, f),
        }
    }

    /// Like `flat_map_continue`, but `f` always runs in a spawned
    /// continuation, never on the calling stack
    pub(crate) fn chain<F>(self, scheduler: &Scheduler, f: F) -> Acknowledgment
    where
        F: FnOnce() -> Acknowledgment + Send + 'static,
    {
        Self::spawn(scheduler, async move {
            match self.await {
                Ack::Continue => f().await,
                Ack::Stop => Ack::Stop,
            }
        })
    }

    /// Run `f` with the resolved value
    pub fn on_complete<F>(self, scheduler: &Scheduler, f: F)
    where
        F: FnOnce(Ack) + Send + 'static,
    {
        match self.value() {
            Some(ack) => f(ack),
            None => {
                scheduler.spawn(async move { f(self.await) });
            }
        }
    }

    /// Run `f` only if this resolves to `Stop`
    pub fn on_stop<F>(self, scheduler: &Scheduler, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_complete(scheduler, move |ack| {
            if ack == Ack::Stop {
                f();
            }
        });
    }
}

impl From<Ack> for Acknowledgment {
    fn from(ack: Ack) -> Self {
        Self::Ready(ack)
    }
}

impl Future for Acknowledgment {
    type Output = Ack;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Ack> {
        match self.get_mut() {
            Self::Ready(ack) => Poll::Ready(*ack),
            Self::Pending(fut) => fut.poll_unpin(cx),
        }
    }
}

impl std::fmt::Debug for Acknowledgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready(ack) => f.debug_tuple("Ready").field(ack).finish(),
            Self::Pending(fut) => f.debug_tuple("Pending").field(&fut.peek()).finish(),
        }
    }
}

/// Write side of a one-shot acknowledgment
///
/// The first `try_complete` wins; later calls are ignored. Dropping every
/// clone without completing resolves the acknowledgment to `Stop`.
#[derive(Clone)]
pub struct AckPromise {
    tx: Arc<Mutex<Option<oneshot::Sender<Ack>>>>,
}

impl AckPromise {
    /// Create a promise and the acknowledgment it resolves
    pub fn new() -> (Self, Acknowledgment) {
        let (tx, rx) = oneshot::channel();
        let ack = Acknowledgment::from_future(rx.map(|res| res.unwrap_or(Ack::Stop)));
        let promise = Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (promise, ack)
    }

    /// Resolve the acknowledgment; returns false if it was already resolved
    pub fn try_complete(&self, ack: Ack) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        match tx {
            Some(tx) => {
                // Receiver may be gone; the resolution still counts as ours
                let _ = tx.send(ack);
                true
            }
            None => false,
        }
    }

    /// Whether the acknowledgment has been resolved through this promise
    pub fn is_completed(&self) -> bool {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).is_none()
    }
}
