// src/subject/core.rs

use crate::error::{CancelError, DeliveryError, FeedError, FinishError, PullError};
use crate::telemetry;

use core::task::{Context, Poll, Waker};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static NEXT_SUBJECT_ID: AtomicU64 = AtomicU64::new(1);

const LOCATION: &str = "subject";

/// Lifecycle phase of a subject. Everything but `Open` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Phase {
  Open,
  /// `finish` was called with nothing pending.
  Finished,
  /// `cancel` was called.
  Cancelled,
  /// The active subscription was dropped.
  ConsumerGone,
  /// The subject was dropped while still open.
  Disconnected,
}

struct CoreState<T> {
  phase: Phase,
  // Unconsumed until a pull yields it, even if a suspended pull was woken for it.
  slot: Option<T>,
  // Set by a pull that registered its waker. May be stale if that pull's
  // future was dropped, so it only ever causes a spurious wake.
  consumer_waiting: bool,
  consumer_waker: Option<Waker>,
  producer_waker: Option<Waker>,
  pushed: u64,
  claimed: u64,
}

impl<T> CoreState<T> {
  fn register_consumer(&mut self, waker: &Waker) {
    match &self.consumer_waker {
      Some(existing) if existing.will_wake(waker) => {}
      _ => self.consumer_waker = Some(waker.clone()),
    }
    self.consumer_waiting = true;
  }

  fn register_producer(&mut self, waker: &Waker) {
    match &self.producer_waker {
      Some(existing) if existing.will_wake(waker) => {}
      _ => self.producer_waker = Some(waker.clone()),
    }
  }

  fn take_waiting_consumer(&mut self) -> Option<Waker> {
    if self.consumer_waiting {
      self.consumer_waiting = false;
      self.consumer_waker.take()
    } else {
      None
    }
  }
}

/// Shared core behind a [`Subject`](super::Subject) and its
/// [`Subscription`](super::Subscription).
///
/// All state lives behind one lock. Wakers and discarded values are moved out
/// under the lock and woken/dropped after it is released.
pub(super) struct SubjectShared<T> {
  id: u64,
  state: Mutex<CoreState<T>>,
  iteration_started: AtomicBool,
}

impl<T> fmt::Debug for SubjectShared<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let state = self.state.lock();
    f.debug_struct("SubjectShared")
      .field("id", &self.id)
      .field("phase", &state.phase)
      .field("pending", &state.slot.is_some())
      .field("consumer_waiting", &state.consumer_waiting)
      .field("pushed", &state.pushed)
      .field("claimed", &state.claimed)
      .field("iteration_started", &self.iteration_started.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl<T> SubjectShared<T> {
  pub(super) fn new() -> Self {
    let id = NEXT_SUBJECT_ID.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(subject = id, "subject created");
    SubjectShared {
      id,
      state: Mutex::new(CoreState {
        phase: Phase::Open,
        slot: None,
        consumer_waiting: false,
        consumer_waker: None,
        producer_waker: None,
        pushed: 0,
        claimed: 0,
      }),
      iteration_started: AtomicBool::new(false),
    }
  }

  #[inline]
  pub(super) fn id(&self) -> u64 {
    self.id
  }

  pub(super) fn phase(&self) -> Phase {
    self.state.lock().phase
  }

  pub(super) fn is_pending(&self) -> bool {
    self.state.lock().slot.is_some()
  }

  pub(super) fn is_subscribed(&self) -> bool {
    self.iteration_started.load(Ordering::Acquire)
  }

  /// Claims the single iteration. Only the first caller gets `true`.
  pub(super) fn try_start_iteration(&self) -> bool {
    let claimed = self
      .iteration_started
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_ok();
    if !claimed {
      tracing::debug!(subject = self.id, "rejected second iteration");
      telemetry::increment_counter(LOCATION, "double_iteration");
    }
    claimed
  }

  /// Accepts `value` and returns its delivery sequence number.
  pub(super) fn push(&self, value: T) -> Result<u64, FeedError<T>> {
    let mut state = self.state.lock();
    match state.phase {
      Phase::Open => {}
      Phase::Finished => {
        drop(state);
        tracing::debug!(subject = self.id, "push after finish rejected");
        return Err(FeedError::Finished(value));
      }
      Phase::Cancelled | Phase::ConsumerGone | Phase::Disconnected => {
        drop(state);
        tracing::debug!(subject = self.id, "push on closed subject rejected");
        return Err(FeedError::Closed(value));
      }
    }

    if state.slot.is_some() {
      drop(state);
      tracing::debug!(subject = self.id, "push rejected: previous value unconsumed");
      telemetry::increment_counter(LOCATION, "feed_unconsumed");
      telemetry::log_event(Some(self.id), "subject::push", "FeedUnconsumed", None);
      return Err(FeedError::Unconsumed(value));
    }

    state.pushed += 1;
    let seq = state.pushed;
    state.slot = Some(value);
    let waker = state.take_waiting_consumer();
    drop(state);

    telemetry::increment_counter(LOCATION, "push");
    if let Some(w) = waker {
      tracing::trace!(subject = self.id, seq, "value pending, waking consumer");
      telemetry::increment_counter(LOCATION, "handoff");
      w.wake();
    } else {
      tracing::trace!(subject = self.id, seq, "value pending");
    }
    Ok(seq)
  }

  pub(super) fn finish(&self) -> Result<(), FinishError> {
    let mut state = self.state.lock();
    match state.phase {
      Phase::Open => {}
      Phase::Finished => {
        drop(state);
        tracing::debug!(subject = self.id, "finish after finish rejected");
        return Err(FinishError::AlreadyFinished);
      }
      Phase::Cancelled | Phase::ConsumerGone | Phase::Disconnected => {
        drop(state);
        tracing::debug!(subject = self.id, "finish on closed subject rejected");
        return Err(FinishError::Closed);
      }
    }
    if state.slot.is_some() {
      drop(state);
      tracing::debug!(subject = self.id, "finish rejected: previous value unconsumed");
      telemetry::increment_counter(LOCATION, "finish_unconsumed");
      telemetry::log_event(Some(self.id), "subject::finish", "FinishUnconsumed", None);
      return Err(FinishError::Unconsumed);
    }
    state.phase = Phase::Finished;
    let waker = state.take_waiting_consumer();
    drop(state);

    tracing::trace!(subject = self.id, woke_consumer = waker.is_some(), "subject finished");
    telemetry::increment_counter(LOCATION, "finish");
    if let Some(w) = waker {
      w.wake();
    }
    Ok(())
  }

  pub(super) fn cancel(&self) -> Result<(), CancelError> {
    let mut state = self.state.lock();
    if state.phase != Phase::Open {
      return Err(CancelError);
    }
    state.phase = Phase::Cancelled;
    let discarded = state.slot.take();
    let consumer = state.take_waiting_consumer();
    let producer = state.producer_waker.take();
    drop(state);

    tracing::debug!(subject = self.id, discarded = discarded.is_some(), "subject cancelled");
    telemetry::increment_counter(LOCATION, "cancel");
    drop(discarded);
    if let Some(w) = consumer {
      w.wake();
    }
    if let Some(w) = producer {
      w.wake();
    }
    Ok(())
  }

  /// Called when the `Subject` handle is dropped.
  pub(super) fn producer_dropped(&self) {
    let mut state = self.state.lock();
    if state.phase != Phase::Open {
      return;
    }
    state.phase = Phase::Disconnected;
    let waker = state.take_waiting_consumer();
    // Nobody can subscribe any more, so a pending value would never be claimed.
    let (discarded, producer) = if self.iteration_started.load(Ordering::Acquire) {
      (None, None)
    } else {
      (state.slot.take(), state.producer_waker.take())
    };
    drop(state);

    tracing::trace!(subject = self.id, "subject dropped while open");
    drop(discarded);
    if let Some(w) = waker {
      w.wake();
    }
    if let Some(w) = producer {
      w.wake();
    }
  }

  /// Called when the active subscription is dropped.
  pub(super) fn consumer_dropped(&self) {
    let mut state = self.state.lock();
    if state.phase == Phase::Open || state.phase == Phase::Disconnected {
      state.phase = Phase::ConsumerGone;
    }
    let discarded = state.slot.take();
    state.consumer_waiting = false;
    state.consumer_waker = None;
    let producer = state.producer_waker.take();
    drop(state);

    tracing::trace!(subject = self.id, discarded = discarded.is_some(), "subscription dropped");
    drop(discarded);
    if let Some(w) = producer {
      w.wake();
    }
  }

  /// One step of the active subscription.
  ///
  /// `Ok(None)` ends the sequence cleanly; an `Err` is a terminal signal the
  /// caller reports once before ending the sequence.
  pub(super) fn poll_pull(&self, cx: &mut Context<'_>) -> Poll<Result<Option<T>, PullError>> {
    let mut state = self.state.lock();

    if let Some(value) = state.slot.take() {
      state.claimed += 1;
      state.consumer_waiting = false;
      let seq = state.claimed;
      let producer = state.producer_waker.take();
      drop(state);

      tracing::trace!(subject = self.id, seq, "pending value claimed");
      telemetry::increment_counter(LOCATION, "claim");
      if let Some(w) = producer {
        w.wake();
      }
      return Poll::Ready(Ok(Some(value)));
    }

    match state.phase {
      Phase::Open => {
        state.register_consumer(cx.waker());
        Poll::Pending
      }
      Phase::Finished | Phase::ConsumerGone => Poll::Ready(Ok(None)),
      Phase::Cancelled => Poll::Ready(Err(PullError::Cancelled)),
      Phase::Disconnected => Poll::Ready(Err(PullError::Disconnected)),
    }
  }

  pub(super) fn is_claimed(&self, seq: u64) -> bool {
    self.state.lock().claimed >= seq
  }

  pub(super) fn poll_delivery(&self, seq: u64, cx: &mut Context<'_>) -> Poll<Result<(), DeliveryError>> {
    let mut state = self.state.lock();
    if state.claimed >= seq {
      return Poll::Ready(Ok(()));
    }
    // Capacity one: an unclaimed `seq` can only be the value sitting in the slot.
    if state.slot.is_some() && state.pushed == seq {
      state.register_producer(cx.waker());
      return Poll::Pending;
    }
    Poll::Ready(Err(DeliveryError::Discarded))
  }
}
