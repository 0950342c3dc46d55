//! # a3s-connectable
//!
//! Buffer, replay and drain events into a backpressured subscriber for the
//! A3S ecosystem.
//!
//! ## Overview
//!
//! `a3s-connectable` lets a producer start emitting events before the
//! consumer is wired up. A `ConnectableSubscriber` buffers early events,
//! lets the caller splice replay events in front of them, and on `connect()`
//! drains everything into the real subscriber in order before switching to
//! direct forwarding. Backpressure is preserved end to end: every event is
//! answered with an `Acknowledgment` resolving to `Continue` or `Stop`.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_connectable::{ChannelSubscriber, ConnectableSubscriber, Notification, Scheduler, Subscriber};
//! use tokio_stream::StreamExt;
//!
//! # async fn example() -> a3s_connectable::Result<()> {
//! let (downstream, mut events) = ChannelSubscriber::new(Scheduler::current()?, 16);
//! let subscriber = ConnectableSubscriber::new(downstream);
//!
//! // Replay events go in front of anything the producer sends
//! subscriber.push_iterable(["snapshot-1", "snapshot-2"])?;
//! let _ack = subscriber.on_next("live-1");
//!
//! subscriber.connect();
//!
//! while let Some(Notification::Next(event)) = events.next().await {
//!     println!("{}", event);
//!     if event == "live-1" {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **Subscriber** trait: consumer capability every stage implements
//! - **Acknowledgment**: asynchronous `Continue` / `Stop` backpressure signal
//! - **Scheduler**: tokio runtime handle plus failure hook
//! - **DrainSource**: pushes a finite sequence through a subscriber
//! - **Cancelable**: idempotent disposal handle
//! - **ConnectableSubscriber**: the buffering / draining adapter

pub mod ack;
pub mod cancelable;
pub mod config;
pub mod connectable;
pub mod error;
pub mod scheduler;
pub mod source;
pub mod subscriber;

// Re-export core types
pub use ack::{Ack, AckPromise, Acknowledgment};
pub use cancelable::Cancelable;
pub use config::ConnectableConfig;
pub use connectable::{ConnectableSubscriber, ConnectionState};
pub use error::{Result, StreamError};
pub use scheduler::{FailureReporter, LogReporter, MemoryFailureReporter, ReportedFailure, Scheduler};
pub use source::{DrainSource, IterSource, TryIterSource};
pub use subscriber::channel::ChannelSubscriber;
pub use subscriber::{Notification, Subscriber};
