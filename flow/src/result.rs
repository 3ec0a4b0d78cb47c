// src/result.rs

//! The tagged outcome of a channel operation.

use crate::error::Cause;
use core::fmt;

/// Why a non-suspending operation could not complete although the channel is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
  /// Nothing to receive right now.
  Empty,
  /// No room to send right now.
  Full,
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Failure::Empty => write!(f, "channel empty"),
      Failure::Full => write!(f, "channel full"),
    }
  }
}

impl std::error::Error for Failure {}

/// Outcome of a receive attempt.
///
/// Exactly one variant is active. `Closed` is kept distinct from a successful
/// receive of any value, and from `Failed`, which only non-suspending
/// operations produce while the channel is still open.
#[derive(Debug, Clone)]
pub enum ChannelResult<T> {
  /// An item was received.
  Success(T),
  /// The channel is closed and drained, optionally with the cause it was
  /// closed with.
  Closed(Option<Cause>),
  /// The channel is open but the operation could not proceed immediately.
  Failed(Failure),
}

impl<T> ChannelResult<T> {
  /// `true` for `Success`.
  #[inline]
  pub fn is_success(&self) -> bool {
    matches!(self, ChannelResult::Success(_))
  }

  /// `true` for `Closed`.
  #[inline]
  pub fn is_closed(&self) -> bool {
    matches!(self, ChannelResult::Closed(_))
  }

  /// `true` for `Failed` and `Closed`: the operation did not produce a value.
  #[inline]
  pub fn is_failure(&self) -> bool {
    !self.is_success()
  }

  /// `true` if a non-blocking send failed only because the channel had no room.
  #[inline]
  pub fn is_full(&self) -> bool {
    matches!(self, ChannelResult::Failed(Failure::Full))
  }

  /// Returns the received value, discarding any failure information.
  pub fn ok(self) -> Option<T> {
    match self {
      ChannelResult::Success(v) => Some(v),
      _ => None,
    }
  }

  /// Returns the close cause, if the channel was closed with one.
  pub fn cause(&self) -> Option<&Cause> {
    match self {
      ChannelResult::Closed(cause) => cause.as_ref(),
      _ => None,
    }
  }

  /// Maps the success value.
  pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ChannelResult<U> {
    match self {
      ChannelResult::Success(v) => ChannelResult::Success(f(v)),
      ChannelResult::Closed(cause) => ChannelResult::Closed(cause),
      ChannelResult::Failed(failure) => ChannelResult::Failed(failure),
    }
  }
}

impl<T> From<ChannelResult<T>> for Option<T> {
  fn from(result: ChannelResult<T>) -> Self {
    result.ok()
  }
}
