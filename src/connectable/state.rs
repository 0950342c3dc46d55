//! Pre-connection state of a connectable subscriber

use crate::ack::{Ack, Acknowledgment};
use crate::cancelable::Cancelable;
use crate::error::{Result, StreamError};

/// Detailed connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; priming is allowed
    Idle,
    /// `connect()` was called; the buffer is draining or pre-connect
    /// events are still being delivered
    Connecting,
    /// Pass-through mode; `Stop` means forwarding is disabled for good
    Connected(Ack),
}

/// A terminal signal waiting to be replayed
#[derive(Debug)]
pub(crate) enum Terminal {
    Complete,
    Error(StreamError),
}

impl Terminal {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Error(_) => "error",
        }
    }
}

/// Everything guarded by the subscriber mutex
pub(crate) struct State<T> {
    pub(crate) phase: ConnectionState,

    /// Primed events; taken by the drain at `connect()`
    pub(crate) buffer: Option<Vec<T>>,

    /// Terminal scheduled with `push_complete` / `push_error`
    pub(crate) scheduled: Option<Terminal>,

    /// Terminal received through `on_complete` / `on_error` before the
    /// fast path was enabled
    pub(crate) upstream_terminal: Option<Terminal>,

    /// Tail of the pre-connect acknowledgment chain
    pub(crate) chain: Acknowledgment,

    /// Number of links ever appended to `chain`
    pub(crate) links: u64,

    /// Drain subscription handle, set once by the first `connect()`
    pub(crate) cancelable: Option<Cancelable>,

    /// The drain resolved and replayed terminals were queued
    pub(crate) drain_finished: bool,
}

impl<T> State<T> {
    pub(crate) fn new(gate: Acknowledgment, buffer_capacity: usize) -> Self {
        Self {
            phase: ConnectionState::Idle,
            buffer: Some(Vec::with_capacity(buffer_capacity)),
            scheduled: None,
            upstream_terminal: None,
            chain: gate,
            links: 0,
            cancelable: None,
            drain_finished: false,
        }
    }

    /// Fail with `InvalidState` unless priming is still allowed
    pub(crate) fn ensure_idle(&self, op: &str) -> Result<()> {
        if self.phase == ConnectionState::Idle {
            Ok(())
        } else {
            Err(StreamError::InvalidState(format!(
                "subscriber was already connected, cannot {}",
                op
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_state_is_idle() {
        let state = State::<u32>::new(Acknowledgment::CONTINUE, 4);
        assert_eq!(state.phase, ConnectionState::Idle);
        assert!(state.buffer.as_ref().unwrap().capacity() >= 4);
        assert!(state.scheduled.is_none());
        assert!(state.ensure_idle("push_first").is_ok());
    }

    #[test]
    fn test_ensure_idle_after_connect() {
        let mut state = State::<u32>::new(Acknowledgment::CONTINUE, 0);
        state.phase = ConnectionState::Connecting;

        let err = state.ensure_idle("push_complete").unwrap_err();
        assert!(matches!(err, StreamError::InvalidState(_)));
        assert!(err.to_string().contains("push_complete"));

        state.phase = ConnectionState::Connected(Ack::Continue);
        assert!(state.ensure_idle("push_first").is_err());
    }

    #[test]
    fn test_terminal_kind() {
        assert_eq!(Terminal::Complete.kind(), "complete");
        assert_eq!(Terminal::Error(StreamError::upstream("x")).kind(), "error");
    }
}
