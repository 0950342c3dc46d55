//! Drain sources: push a finite sequence through a subscriber
//!
//! A `DrainSource` delivers every element in order, waiting for each
//! acknowledgment before sending the next, then signals completion. A `Stop`
//! acknowledgment halts delivery without a terminal signal. A fallible
//! source ends with `on_error` at its first failed element.

use crate::ack::Ack;
use crate::cancelable::Cancelable;
use crate::error::StreamError;
use crate::subscriber::Subscriber;

/// A finite source that can be drained into one subscriber
pub trait DrainSource<T> {
    /// Start delivering to `subscriber`; delivery happens on the subscriber's
    /// scheduler, never on the calling stack
    fn subscribe<S>(self, subscriber: S) -> Cancelable
    where
        S: Subscriber<T> + 'static;
}

/// Drain source over any finite ordered sequence
#[derive(Debug, Clone)]
pub struct IterSource<I> {
    items: I,
}

impl<I> IterSource<I> {
    /// Create a source from a sequence
    pub fn new(items: I) -> Self {
        Self { items }
    }
}

impl<T> From<Vec<T>> for IterSource<Vec<T>> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T, I> DrainSource<T> for IterSource<I>
where
    T: Send + 'static,
    I: IntoIterator<Item = T> + Send + 'static,
    I::IntoIter: Send,
{
    fn subscribe<S>(self, subscriber: S) -> Cancelable
    where
        S: Subscriber<T> + 'static,
    {
        let scheduler = subscriber.scheduler().clone();
        let task = scheduler.spawn(async move {
            let mut delivered = 0usize;
            for item in self.items {
                if subscriber.on_next(item).await == Ack::Stop {
                    tracing::debug!(delivered = delivered + 1, "Drain stopped by subscriber");
                    return;
                }
                delivered += 1;
            }
            tracing::trace!(delivered, "Drain source exhausted");
            subscriber.on_complete();
        });
        Cancelable::new(move || task.abort())
    }
}

/// Drain source over a sequence of `Result`s
#[derive(Debug, Clone)]
pub struct TryIterSource<I> {
    items: I,
}

impl<I> TryIterSource<I> {
    /// Create a source from a fallible sequence
    pub fn new(items: I) -> Self {
        Self { items }
    }
}

impl<T, E, I> DrainSource<T> for TryIterSource<I>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    I: IntoIterator<Item = std::result::Result<T, E>> + Send + 'static,
    I::IntoIter: Send,
{
    fn subscribe<S>(self, subscriber: S) -> Cancelable
    where
        S: Subscriber<T> + 'static,
    {
        let scheduler = subscriber.scheduler().clone();
        let task = scheduler.spawn(async move {
            let mut delivered = 0usize;
            for item in self.items {
                let item = match item {
                    Ok(item) => item,
                    Err(err) => {
                        tracing::debug!(delivered, error = %err, "Drain source failed");
                        subscriber.on_error(StreamError::source(err));
                        return;
                    }
                };
                if subscriber.on_next(item).await == Ack::Stop {
                    tracing::debug!(delivered = delivered + 1, "Drain stopped by subscriber");
                    return;
                }
                delivered += 1;
            }
            subscriber.on_complete();
        });
        Cancelable::new(move || task.abort())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ack::Acknowledgment;
    use crate::scheduler::Scheduler;
    use std::sync::{Arc, Mutex};

    struct Recorder {
        items: Mutex<Vec<u32>>,
        failure: Mutex<Option<String>>,
        completed: tokio::sync::Notify,
        stop_at: Option<u32>,
        scheduler: Scheduler,
    }

    impl Recorder {
        fn new(stop_at: Option<u32>) -> Arc<Self> {
            Arc::new(Self {
                items: Mutex::new(Vec::new()),
                failure: Mutex::new(None),
                completed: tokio::sync::Notify::new(),
                stop_at,
                scheduler: Scheduler::current().unwrap(),
            })
        }
    }

    impl Subscriber<u32> for Recorder {
        fn on_next(&self, item: u32) -> Acknowledgment {
            self.items.lock().unwrap().push(item);
            if self.stop_at == Some(item) {
                Acknowledgment::STOP
            } else {
                Acknowledgment::CONTINUE
            }
        }

        fn on_complete(&self) {
            self.completed.notify_one();
        }

        fn on_error(&self, error: StreamError) {
            *self.failure.lock().unwrap() = Some(error.to_string());
            self.completed.notify_one();
        }

        fn scheduler(&self) -> &Scheduler {
            &self.scheduler
        }
    }

    #[tokio::test]
    async fn test_drains_all_then_completes() {
        let recorder = Recorder::new(None);
        IterSource::from(vec![1, 2, 3]).subscribe(recorder.clone());

        recorder.completed.notified().await;
        assert_eq!(*recorder.items.lock().unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stop_halts_without_complete() {
        let recorder = Recorder::new(Some(2));
        IterSource::new(1..=5).subscribe(recorder.clone());

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(*recorder.items.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let recorder = Recorder::new(None);
        let handle = IterSource::from(vec![1, 2, 3]).subscribe(recorder.clone());
        handle.cancel();

        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(recorder.items.lock().unwrap().is_empty());
        assert!(handle.is_canceled());
    }

    #[tokio::test]
    async fn test_try_source_ends_at_first_error() {
        let recorder = Recorder::new(None);
        let items: Vec<std::result::Result<u32, std::io::Error>> = vec![
            Ok(1),
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone")),
            Ok(3),
        ];
        TryIterSource::new(items).subscribe(recorder.clone());

        recorder.completed.notified().await;
        assert_eq!(*recorder.items.lock().unwrap(), vec![1]);
        let failure = recorder.failure.lock().unwrap().clone().unwrap();
        assert!(failure.starts_with("Source error"));
        assert!(failure.contains("disk gone"));
    }

    #[tokio::test]
    async fn test_try_source_all_ok_completes() {
        let recorder = Recorder::new(None);
        let items: Vec<std::result::Result<u32, std::io::Error>> = vec![Ok(1), Ok(2)];
        TryIterSource::new(items).subscribe(recorder.clone());

        recorder.completed.notified().await;
        assert_eq!(*recorder.items.lock().unwrap(), vec![1, 2]);
        assert!(recorder.failure.lock().unwrap().is_none());
    }
}
