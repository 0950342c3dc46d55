//! Subscriber that replays the primed buffer into the downstream

use super::downstream::Downstream;
use super::state::Terminal;
use crate::ack::{Ack, AckPromise, Acknowledgment};
use crate::error::StreamError;
use crate::scheduler::Scheduler;
use crate::subscriber::Subscriber;
use std::sync::Arc;

/// Forwards buffered events and resolves `drained` with the outcome:
/// `Continue` once the source is exhausted, `Stop` as soon as the
/// downstream refuses an event or the source fails.
pub(crate) struct DrainSubscriber<T, S> {
    downstream: Arc<Downstream<T, S>>,
    drained: AckPromise,
}

impl<T, S> DrainSubscriber<T, S> {
    pub(crate) fn new(downstream: Arc<Downstream<T, S>>, drained: AckPromise) -> Self {
        Self {
            downstream,
            drained,
        }
    }
}

impl<T, S> Subscriber<T> for DrainSubscriber<T, S>
where
    T: Send + 'static,
    S: Subscriber<T> + 'static,
{
    fn on_next(&self, item: T) -> Acknowledgment {
        let ack = self.downstream.on_next(item);
        let drained = self.drained.clone();
        ack.clone().on_stop(self.scheduler(), move || {
            drained.try_complete(Ack::Stop);
        });
        ack
    }

    fn on_complete(&self) {
        self.drained.try_complete(Ack::Continue);
    }

    fn on_error(&self, error: StreamError) {
        if self.drained.try_complete(Ack::Stop) {
            self.downstream.terminate(Terminal::Error(error));
        } else {
            self.scheduler().report_failure(error);
        }
    }

    fn scheduler(&self) -> &Scheduler {
        self.downstream.scheduler()
    }
}
