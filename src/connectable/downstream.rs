//! Guarded access to the wrapped subscriber
//!
//! Both the drain and the adapter's own chain deliver to the same
//! downstream; this wrapper makes sure at most one terminal signal ever
//! reaches it.

use super::state::Terminal;
use crate::ack::Acknowledgment;
use crate::scheduler::Scheduler;
use crate::subscriber::Subscriber;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) struct Downstream<T, S> {
    subscriber: S,
    connection: String,
    terminated: AtomicBool,
    report_dropped: bool,
    _item: PhantomData<fn(T)>,
}

impl<T, S> Downstream<T, S>
where
    S: Subscriber<T>,
{
    pub(crate) fn new(subscriber: S, connection: String, report_dropped: bool) -> Self {
        Self {
            subscriber,
            connection,
            terminated: AtomicBool::new(false),
            report_dropped,
            _item: PhantomData,
        }
    }

    pub(crate) fn subscriber(&self) -> &S {
        &self.subscriber
    }

    pub(crate) fn scheduler(&self) -> &Scheduler {
        self.subscriber.scheduler()
    }

    pub(crate) fn on_next(&self, item: T) -> Acknowledgment {
        self.subscriber.on_next(item)
    }

    /// Deliver a terminal signal unless one was already delivered
    pub(crate) fn terminate(&self, terminal: Terminal) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            self.reject(terminal);
            return;
        }

        tracing::debug!(
            connection = %self.connection,
            terminal = terminal.kind(),
            "Delivering terminal signal"
        );
        match terminal {
            Terminal::Complete => self.subscriber.on_complete(),
            Terminal::Error(error) => self.subscriber.on_error(error),
        }
    }

    /// A terminal that lost to another one; errors go to the failure hook
    pub(crate) fn reject(&self, terminal: Terminal) {
        match terminal {
            Terminal::Complete => {
                tracing::debug!(
                    connection = %self.connection,
                    "Duplicate completion ignored"
                );
            }
            Terminal::Error(error) => self.scheduler().report_failure(error),
        }
    }

    /// A terminal dropped because the downstream already returned `Stop`
    ///
    /// Once a terminal was delivered, a late one is a duplicate and goes
    /// through `reject` instead.
    pub(crate) fn discard(&self, terminal: Terminal) {
        if self.is_terminated() {
            self.reject(terminal);
            return;
        }
        match terminal {
            Terminal::Error(error) if self.report_dropped => {
                self.scheduler().report_failure(error)
            }
            terminal => {
                tracing::debug!(
                    connection = %self.connection,
                    terminal = terminal.kind(),
                    "Terminal signal dropped after downstream stop"
                );
            }
        }
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}
