// src/subject/mod.rs

//! A single-producer, single-consumer handoff subject with capacity one.
//!
//! The producer feeds values one at a time through [`Subject::push`] and ends
//! the sequence with [`Subject::finish`]. The consumer obtains a
//! [`Subscription`] once via [`Subject::subscribe`] and pulls values in push
//! order, either with [`Subscription::pull`] or through its
//! [`Stream`](futures_core::Stream) implementation.
//!
//! ## Behavior
//!
//! - **Capacity One**: At most one value may be waiting. Pushing again before
//!   it is pulled fails with [`FeedError::Unconsumed`] and hands the value
//!   back. Finishing with a value waiting fails with
//!   [`FinishError::Unconsumed`]; the value is never silently dropped.
//! - **Wake on Push**: If the consumer is suspended in a pull, a push wakes it.
//!   The value still counts as unconsumed until that pull actually returns it.
//! - **Awaitable Backpressure**: Every successful push returns a [`Delivery`]
//!   that resolves once the value has been claimed, so a producer can simply
//!   write `subject.push(v)?.await?`.
//! - **Single Iteration**: Only the first [`Subject::subscribe`] yields values.
//!   Any later subscription yields [`PullError::AlreadyIterated`] on its first
//!   pull and then ends.
//! - **Teardown**: [`Subject::cancel`] wakes a suspended pull with
//!   [`PullError::Cancelled`]. Dropping an unfinished `Subject` lets the consumer
//!   drain what is pending and then yields [`PullError::Disconnected`].
//!   Dropping the active subscription closes the subject for the producer.
//!
//! # Examples
//!
//! ```
//! use fibre_handoff::Subject;
//! use futures_util::StreamExt;
//!
//! tokio::runtime::Runtime::new().unwrap().block_on(async {
//!     let subject = Subject::new();
//!     let mut subscription = subject.subscribe();
//!
//!     let consumer = tokio::spawn(async move {
//!         let mut seen = Vec::new();
//!         while let Some(item) = subscription.next().await {
//!             seen.push(item.unwrap());
//!         }
//!         seen
//!     });
//!
//!     for n in 1..=3 {
//!         // Resolves once the consumer has claimed `n`.
//!         subject.push(n).unwrap().await.unwrap();
//!     }
//!     subject.finish().unwrap();
//!
//!     assert_eq!(consumer.await.unwrap(), vec![1, 2, 3]);
//! });
//! ```
//!
//! ```
//! use fibre_handoff::Subject;
//! use fibre_handoff::error::{FeedError, FinishError};
//!
//! let subject = Subject::new();
//! let _delivery = subject.push(1).unwrap();
//!
//! match subject.push(2) {
//!     Err(FeedError::Unconsumed(rejected)) => assert_eq!(rejected, 2),
//!     _ => panic!("second push should be rejected"),
//! }
//! assert_eq!(subject.finish(), Err(FinishError::Unconsumed));
//! assert!(subject.is_pending());
//! ```

pub use crate::error::{CancelError, DeliveryError, FeedError, FinishError, PullError};

mod core;

use self::core::{Phase, SubjectShared};

use futures_core::stream::{FusedStream, Stream};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// The producer side of a handoff channel and the entry point for its single
/// consumer.
///
/// Dropping a `Subject` that was never finished disconnects it; see the
/// [module docs](self).
pub struct Subject<T> {
  shared: Arc<SubjectShared<T>>,
}

impl<T> fmt::Debug for Subject<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subject").field("shared", &self.shared).finish()
  }
}

impl<T> Default for Subject<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Subject<T> {
  /// Creates an empty, open subject with no subscription.
  pub fn new() -> Self {
    Subject {
      shared: Arc::new(SubjectShared::new()),
    }
  }

  /// Feeds `value` to the consumer.
  ///
  /// The value waits in the slot until a pull returns it; a suspended pull is
  /// woken. Until then further pushes fail with [`FeedError::Unconsumed`]. This never
  /// blocks; it either succeeds immediately or returns the value inside a
  /// [`FeedError`].
  ///
  /// The returned [`Delivery`] resolves once the value has been claimed. It
  /// may be dropped if the acknowledgement is not needed.
  pub fn push(&self, value: T) -> Result<Delivery<T>, FeedError<T>> {
    let seq = self.shared.push(value)?;
    Ok(Delivery {
      shared: Arc::clone(&self.shared),
      seq,
    })
  }

  /// Ends the sequence. The consumer sees end-of-sequence once it has pulled
  /// everything before it.
  ///
  /// Fails with [`FinishError::Unconsumed`] while a pushed value is still
  /// waiting; the value stays deliverable.
  pub fn finish(&self) -> Result<(), FinishError> {
    self.shared.finish()
  }

  /// Tears the subject down without finishing it.
  ///
  /// Any value still waiting in the slot is dropped and its [`Delivery`]
  /// resolves with [`DeliveryError::Discarded`]. The consumer's next pull
  /// yields [`PullError::Cancelled`] and the sequence then ends.
  pub fn cancel(&self) -> Result<(), CancelError> {
    self.shared.cancel()
  }

  /// Begins the one and only iteration over this subject.
  ///
  /// Calling this again returns a subscription whose first pull fails with
  /// [`PullError::AlreadyIterated`]; the first subscription is unaffected.
  pub fn subscribe(&self) -> Subscription<T> {
    let state = if self.shared.try_start_iteration() {
      PullState::Streaming
    } else {
      PullState::Rejected
    };
    Subscription {
      shared: Arc::clone(&self.shared),
      active: state == PullState::Streaming,
      state,
    }
  }

  /// Returns `true` if a pushed value is waiting to be pulled.
  pub fn is_pending(&self) -> bool {
    self.shared.is_pending()
  }

  /// Returns `true` once [`finish`](Self::finish) has succeeded.
  pub fn is_finished(&self) -> bool {
    self.shared.phase() == Phase::Finished
  }

  /// Returns `true` if the subject no longer accepts values, whether it was
  /// finished, cancelled or abandoned by its consumer.
  pub fn is_closed(&self) -> bool {
    self.shared.phase() != Phase::Open
  }

  /// Returns `true` if [`subscribe`](Self::subscribe) has been called.
  pub fn is_subscribed(&self) -> bool {
    self.shared.is_subscribed()
  }
}

impl<T> Drop for Subject<T> {
  fn drop(&mut self) {
    self.shared.producer_dropped();
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PullState {
  Streaming,
  Rejected,
  Done,
}

/// The consuming side of a [`Subject`], obtained from [`Subject::subscribe`].
///
/// Yields `Ok(value)` for every pushed value in order. A terminal error is
/// yielded at most once, after which the sequence ends.
pub struct Subscription<T> {
  shared: Arc<SubjectShared<T>>,
  // Whether this subscription won the iteration claim.
  active: bool,
  state: PullState,
}

impl<T> fmt::Debug for Subscription<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Subscription")
      .field("active", &self.active)
      .field("state", &self.state)
      .field("shared", &self.shared)
      .finish()
  }
}

impl<T> Subscription<T> {
  /// Waits for the next value.
  ///
  /// Resolves to `None` once the sequence has ended.
  pub fn pull(&mut self) -> Pull<'_, T> {
    Pull { subscription: self }
  }

  /// Returns `true` once the sequence has ended.
  pub fn is_terminated(&self) -> bool {
    self.state == PullState::Done
  }

  fn poll_pull(&mut self, cx: &mut Context<'_>) -> Poll<Option<Result<T, PullError>>> {
    match self.state {
      PullState::Done => Poll::Ready(None),
      PullState::Rejected => {
        self.state = PullState::Done;
        Poll::Ready(Some(Err(PullError::AlreadyIterated)))
      }
      PullState::Streaming => match self.shared.poll_pull(cx) {
        Poll::Ready(Ok(Some(value))) => Poll::Ready(Some(Ok(value))),
        Poll::Ready(Ok(None)) => {
          tracing::trace!(subject = self.shared.id(), "iteration ended");
          self.state = PullState::Done;
          Poll::Ready(None)
        }
        Poll::Ready(Err(e)) => {
          tracing::trace!(subject = self.shared.id(), error = %e, "iteration terminated");
          self.state = PullState::Done;
          Poll::Ready(Some(Err(e)))
        }
        Poll::Pending => Poll::Pending,
      },
    }
  }
}

impl<T> Drop for Subscription<T> {
  fn drop(&mut self) {
    if self.active {
      self.shared.consumer_dropped();
    }
  }
}

impl<T> Stream for Subscription<T> {
  type Item = Result<T, PullError>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    self.get_mut().poll_pull(cx)
  }
}

impl<T> FusedStream for Subscription<T> {
  fn is_terminated(&self) -> bool {
    self.state == PullState::Done
  }
}

/// Future returned by [`Subscription::pull`].
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct Pull<'a, T> {
  subscription: &'a mut Subscription<T>,
}

impl<'a, T> fmt::Debug for Pull<'a, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Pull").field("subscription", &self.subscription).finish()
  }
}

impl<'a, T> Future for Pull<'a, T> {
  type Output = Option<Result<T, PullError>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    self.get_mut().subscription.poll_pull(cx)
  }
}

/// Acknowledgement for one pushed value, returned by [`Subject::push`].
///
/// Resolves to `Ok(())` once the consumer has claimed the value, or to
/// [`DeliveryError::Discarded`] if the value was dropped unclaimed.
pub struct Delivery<T> {
  shared: Arc<SubjectShared<T>>,
  seq: u64,
}

impl<T> fmt::Debug for Delivery<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Delivery")
      .field("subject", &self.shared.id())
      .field("seq", &self.seq)
      .finish()
  }
}

impl<T> Delivery<T> {
  /// Returns `true` if the value has already been claimed.
  pub fn is_claimed(&self) -> bool {
    self.shared.is_claimed(self.seq)
  }
}

impl<T> Future for Delivery<T> {
  type Output = Result<(), DeliveryError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    this.shared.poll_delivery(this.seq, cx)
  }
}
