//! Capacity-one async handoff between a single producer and a single consumer.
//!
//! A [`Subject`] lets one producer feed a slow asynchronous consumer value by
//! value without an unbounded buffer. The producer may never get more than one
//! value ahead, and the stream of values can be iterated exactly once. See the
//! [`subject`] module for the full behavior.

pub mod error;
pub mod subject;
pub mod telemetry;

pub use error::{CancelError, DeliveryError, FeedError, FinishError, PullError};
pub use subject::{Delivery, Pull, Subject, Subscription};

// Helper function to check if a type is Send + Sync.
#[allow(dead_code)]
fn assert_send_sync<T: Send + Sync>() {}

#[allow(dead_code)]
fn handles_are_send_sync() {
  assert_send_sync::<Subject<String>>();
  assert_send_sync::<Subscription<String>>();
  assert_send_sync::<Delivery<String>>();
}
