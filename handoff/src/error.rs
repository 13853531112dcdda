// src/error.rs

use core::fmt;

// Generates `into_inner`, `Display` and `Error` for error enums that hand the
// rejected value back to the caller.
macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the value that could not be fed.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param> std::error::Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by [`Subject::push`](crate::Subject::push) when the value
/// cannot be accepted. The rejected value is returned to the caller.
#[derive(PartialEq, Eq, Clone)]
pub enum FeedError<T> {
  /// A previously pushed value has not been pulled yet.
  Unconsumed(T),
  /// [`Subject::finish`](crate::Subject::finish) was already called.
  Finished(T),
  /// The subject was cancelled, or its consumer dropped the subscription.
  Closed(T),
}

impl<T> FeedError<T> {
  /// Returns `true` if the push was rejected because the slot is still occupied.
  #[inline]
  pub fn is_unconsumed(&self) -> bool {
    matches!(self, FeedError::Unconsumed(_))
  }
}

impl<T> fmt::Debug for FeedError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FeedError::Unconsumed(_) => write!(f, "FeedError::Unconsumed(..)"),
      FeedError::Finished(_) => write!(f, "FeedError::Finished(..)"),
      FeedError::Closed(_) => write!(f, "FeedError::Closed(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  FeedError<T>,
  Unconsumed("Cannot feed value--previous value(s) are unconsumed"),
  Finished("Cannot feed value--subject is already finished"),
  Closed("Cannot feed value--subject is closed"),
);

/// Error returned by [`Subject::finish`](crate::Subject::finish).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum FinishError {
  /// A pushed value is still waiting to be pulled. It stays deliverable.
  Unconsumed,
  /// The subject has already been finished.
  AlreadyFinished,
  /// The subject was cancelled, or its consumer dropped the subscription.
  Closed,
}
impl std::error::Error for FinishError {}
impl fmt::Display for FinishError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FinishError::Unconsumed => write!(f, "Cannot finish--previous value(s) are unconsumed"),
      FinishError::AlreadyFinished => write!(f, "Cannot finish--subject is already finished"),
      FinishError::Closed => write!(f, "Cannot finish--subject is closed"),
    }
  }
}

/// Error yielded by a [`Subscription`](crate::Subscription) pull.
///
/// Each of these is yielded at most once; the pull after it ends the sequence.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PullError {
  /// The subject had already been subscribed to.
  AlreadyIterated,
  /// The producer cancelled the subject.
  Cancelled,
  /// The producer dropped the subject without finishing it.
  Disconnected,
}
impl std::error::Error for PullError {}
impl fmt::Display for PullError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      PullError::AlreadyIterated => write!(f, "Cannot iterate more than once"),
      PullError::Cancelled => write!(f, "iteration cancelled by the producer"),
      PullError::Disconnected => write!(f, "subject dropped before finishing"),
    }
  }
}

/// Error returned by a [`Delivery`](crate::Delivery) future.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum DeliveryError {
  /// The value was dropped before the consumer claimed it.
  Discarded,
}
impl std::error::Error for DeliveryError {}
impl fmt::Display for DeliveryError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DeliveryError::Discarded => write!(f, "value discarded before it was claimed"),
    }
  }
}

/// Error returned when cancelling a subject that is no longer open.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CancelError;
impl std::error::Error for CancelError {}
impl fmt::Display for CancelError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "subject is already finished or closed")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn messages_match_contract_text() {
    assert_eq!(
      FeedError::Unconsumed(1).to_string(),
      "Cannot feed value--previous value(s) are unconsumed"
    );
    assert_eq!(
      FinishError::Unconsumed.to_string(),
      "Cannot finish--previous value(s) are unconsumed"
    );
    assert_eq!(PullError::AlreadyIterated.to_string(), "Cannot iterate more than once");
  }

  #[test]
  fn feed_error_returns_value() {
    let err = FeedError::Closed(String::from("kept"));
    assert_eq!(format!("{:?}", err), "FeedError::Closed(..)");
    assert_eq!(err.into_inner(), "kept");
    assert!(FeedError::Unconsumed(()).is_unconsumed());
    assert!(!FeedError::Finished(()).is_unconsumed());
  }
}
