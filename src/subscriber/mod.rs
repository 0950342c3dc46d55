//! Subscriber trait, the consumer capability every pipeline stage implements
//!
//! Producers call `on_next` for each event and wait for the returned
//! acknowledgment before sending the next one. `on_complete` and `on_error`
//! are terminal: each is called at most once, and never followed by
//! another `on_next`.

use crate::ack::Acknowledgment;
use crate::error::StreamError;
use crate::scheduler::Scheduler;
use std::sync::Arc;

pub mod channel;

/// Consumer of a stream of events
///
/// Calls on one subscriber instance are not made concurrently by the same
/// upstream. Implementations use interior mutability where they keep state.
pub trait Subscriber<T>: Send + Sync {
    /// Deliver one event, returning the backpressure acknowledgment
    fn on_next(&self, item: T) -> Acknowledgment;

    /// Signal the end of the stream
    fn on_complete(&self);

    /// Signal that the stream failed
    fn on_error(&self, error: StreamError);

    /// Execution context for continuations and undeliverable failures
    fn scheduler(&self) -> &Scheduler;
}

impl<T, S> Subscriber<T> for Arc<S>
where
    S: Subscriber<T> + ?Sized,
{
    fn on_next(&self, item: T) -> Acknowledgment {
        (**self).on_next(item)
    }

    fn on_complete(&self) {
        (**self).on_complete()
    }

    fn on_error(&self, error: StreamError) {
        (**self).on_error(error)
    }

    fn scheduler(&self) -> &Scheduler {
        (**self).scheduler()
    }
}

/// A signal as observed by a subscriber
#[derive(Debug)]
pub enum Notification<T> {
    /// An event
    Next(T),
    /// Normal end of stream
    Complete,
    /// Stream failure
    Error(StreamError),
}

impl<T> Notification<T> {
    /// Whether this is a terminal signal
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Next(_))
    }

    /// The event, if this is `Next`
    pub fn into_item(self) -> Option<T> {
        match self {
            Self::Next(item) => Some(item),
            _ => None,
        }
    }
}
