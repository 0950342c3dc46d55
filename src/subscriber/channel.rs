//! Channel-backed subscriber
//!
//! Forwards every signal into a bounded tokio mpsc channel. Channel capacity
//! is the backpressure: `on_next` acknowledges immediately while there is
//! room and otherwise resolves once the event is enqueued.

use super::{Notification, Subscriber};
use crate::ack::{Ack, Acknowledgment};
use crate::error::StreamError;
use crate::scheduler::Scheduler;
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_stream::wrappers::ReceiverStream;

/// Subscriber writing notifications into a bounded channel
pub struct ChannelSubscriber<T> {
    tx: mpsc::Sender<Notification<T>>,
    scheduler: Scheduler,

    /// Last acknowledgment that had to wait for capacity
    pending: Mutex<Acknowledgment>,
}

impl<T: Send + 'static> ChannelSubscriber<T> {
    /// Create a subscriber and the stream of notifications it produces
    ///
    /// A `capacity` of zero is treated as one.
    pub fn new(scheduler: Scheduler, capacity: usize) -> (Self, ReceiverStream<Notification<T>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let subscriber = Self {
            tx,
            scheduler,
            pending: Mutex::new(Acknowledgment::CONTINUE),
        };
        (subscriber, ReceiverStream::new(rx))
    }

    fn enqueue(&self, notification: Notification<T>) -> Acknowledgment {
        match self.tx.try_send(notification) {
            Ok(()) => Acknowledgment::CONTINUE,
            Err(TrySendError::Closed(notification)) => {
                tracing::debug!(
                    terminal = notification.is_terminal(),
                    "Notification receiver dropped"
                );
                Acknowledgment::STOP
            }
            Err(TrySendError::Full(notification)) => {
                let tx = self.tx.clone();
                let ack = Acknowledgment::spawn(&self.scheduler, async move {
                    match tx.send(notification).await {
                        Ok(()) => Ack::Continue,
                        Err(_) => Ack::Stop,
                    }
                });
                *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = ack.clone();
                ack
            }
        }
    }

    fn terminate(&self, notification: Notification<T>) {
        let last = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if last.value().is_some() {
            self.enqueue(notification);
            return;
        }

        // Terminal signals may arrive before the last event got capacity
        let tx = self.tx.clone();
        self.scheduler.spawn(async move {
            last.await;
            let _ = tx.send(notification).await;
        });
    }
}

impl<T: Send + 'static> Subscriber<T> for ChannelSubscriber<T> {
    fn on_next(&self, item: T) -> Acknowledgment {
        self.enqueue(Notification::Next(item))
    }

    fn on_complete(&self) {
        self.terminate(Notification::Complete);
    }

    fn on_error(&self, error: StreamError) {
        self.terminate(Notification::Error(error));
    }

    fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    #[tokio::test]
    async fn test_forwards_in_order() {
        let (sub, mut stream) = ChannelSubscriber::new(Scheduler::current().unwrap(), 8);

        assert_eq!(sub.on_next("a").await, Ack::Continue);
        assert_eq!(sub.on_next("b").await, Ack::Continue);
        sub.on_complete();

        assert_eq!(stream.next().await.unwrap().into_item(), Some("a"));
        assert_eq!(stream.next().await.unwrap().into_item(), Some("b"));
        assert!(matches!(stream.next().await, Some(Notification::Complete)));
    }

    #[tokio::test]
    async fn test_full_channel_acks_later() {
        let (sub, mut stream) = ChannelSubscriber::new(Scheduler::current().unwrap(), 1);

        assert_eq!(sub.on_next(1).value(), Some(Ack::Continue));
        let ack = sub.on_next(2);
        assert_eq!(ack.value(), None);

        assert_eq!(stream.next().await.unwrap().into_item(), Some(1));
        assert_eq!(ack.await, Ack::Continue);
        assert_eq!(stream.next().await.unwrap().into_item(), Some(2));
    }

    #[tokio::test]
    async fn test_error_after_pending_event() {
        let (sub, mut stream) = ChannelSubscriber::new(Scheduler::current().unwrap(), 1);

        sub.on_next(1);
        let _pending = sub.on_next(2);
        sub.on_error(StreamError::upstream("boom"));

        assert_eq!(stream.next().await.unwrap().into_item(), Some(1));
        assert_eq!(stream.next().await.unwrap().into_item(), Some(2));
        match stream.next().await {
            Some(Notification::Error(e)) => assert!(e.to_string().contains("boom")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops() {
        let (sub, stream) = ChannelSubscriber::<u32>::new(Scheduler::current().unwrap(), 4);
        drop(stream);
        assert_eq!(sub.on_next(1).value(), Some(Ack::Stop));
    }
}
