// src/error.rs

use core::fmt;
use std::any::Any;
use std::error::Error;
use std::sync::Arc;

/// The reason a channel was closed or a combinator failed.
///
/// A `Cause` is a shared handle to an arbitrary error object. Cloning it is
/// cheap and every clone refers to the same underlying error, so a receiver
/// observing a closed channel sees the exact error the closing side attached.
/// Any `std::error::Error + Send + Sync + 'static` converts into a `Cause`.
#[derive(Clone)]
pub struct Cause(Arc<dyn Error + Send + Sync + 'static>);

impl Cause {
  /// Wraps an error into a new `Cause`.
  pub fn new<E>(error: E) -> Self
  where
    E: Error + Send + Sync + 'static,
  {
    Cause(Arc::new(error))
  }

  /// Returns `true` if both causes refer to the same error object.
  pub fn ptr_eq(&self, other: &Cause) -> bool {
    std::ptr::eq(
      Arc::as_ptr(&self.0) as *const (),
      Arc::as_ptr(&other.0) as *const (),
    )
  }

  /// Returns `true` if the underlying error is of type `E`.
  pub fn is<E: Error + 'static>(&self) -> bool {
    self.0.is::<E>()
  }

  /// Attempts to downcast the underlying error to a concrete type.
  pub fn downcast_ref<E: Error + 'static>(&self) -> Option<&E> {
    self.0.downcast_ref::<E>()
  }

  /// Returns `true` if this cause records a cancellation rather than a failure.
  pub fn is_cancellation(&self) -> bool {
    self.is::<Cancelled>()
  }

  /// Borrows the underlying error.
  pub fn as_error(&self) -> &(dyn Error + Send + Sync + 'static) {
    &*self.0
  }
}

impl<E> From<E> for Cause
where
  E: Error + Send + Sync + 'static,
{
  fn from(error: E) -> Self {
    Cause::new(error)
  }
}

impl fmt::Debug for Cause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Debug::fmt(&*self.0, f)
  }
}

impl fmt::Display for Cause {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt::Display::fmt(&*self.0, f)
  }
}

/// Attached as the close cause when a guarded body or a background task is
/// cancelled before it finished (its future was dropped or its task aborted).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("scope was cancelled")]
pub struct Cancelled;

/// Attached as the close cause when a guarded body panicked.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("guarded body panicked: {message}")]
pub struct Panicked {
  message: String,
}

impl Panicked {
  pub(crate) fn new(message: impl Into<String>) -> Self {
    Self {
      message: message.into(),
    }
  }

  /// Extracts a readable message from a panic payload.
  pub(crate) fn from_payload(payload: &(dyn Any + Send)) -> Self {
    let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
      (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
      s.clone()
    } else {
      "non-string panic payload".to_string()
    };
    Self { message }
  }

  /// The panic message, if it was a string.
  pub fn message(&self) -> &str {
    &self.message
  }
}

macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the item that could not be sent.
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

        impl<$generic_param> Error for $enum_name<$generic_param> {}
    };
}

/// Error returned by `try_send` when the item could not be handed over
/// immediately. The item is returned.
#[derive(PartialEq, Eq, Clone)]
pub enum TrySendError<T> {
  /// No buffer space. Always the case for an open rendezvous channel.
  Full(T),
  /// The channel is closed for sending.
  Closed(T),
}

impl<T> TrySendError<T> {
  /// `true` if the send failed only because the channel had no room.
  pub fn is_full(&self) -> bool {
    matches!(self, TrySendError::Full(_))
  }

  /// `true` if the channel was closed.
  pub fn is_closed(&self) -> bool {
    matches!(self, TrySendError::Closed(_))
  }
}

impl<T> fmt::Debug for TrySendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TrySendError::Full(_) => write!(f, "TrySendError::Full(..)"),
      TrySendError::Closed(_) => write!(f, "TrySendError::Closed(..)"),
    }
  }
}

impl_error_for_enum_with_inner!(
  TrySendError<T>,
  Full("channel full"),
  Closed("channel closed"),
);

/// Error returned by a suspending `send`.
pub enum SendError<T> {
  /// The channel was closed before the item could be accepted.
  Closed {
    /// The item that was not delivered.
    item: T,
    /// The cause the channel was closed with, if any.
    cause: Option<Cause>,
  },
  /// The buffer was full and the channel's overflow policy is
  /// [`BufferOverflow::Fail`](crate::BufferOverflow::Fail).
  Full(T),
}

impl<T> SendError<T> {
  /// Consumes the error, returning the item that could not be sent.
  pub fn into_inner(self) -> T {
    match self {
      SendError::Closed { item, .. } => item,
      SendError::Full(item) => item,
    }
  }

  /// The close cause, if the channel was closed with one.
  pub fn cause(&self) -> Option<&Cause> {
    match self {
      SendError::Closed { cause, .. } => cause.as_ref(),
      SendError::Full(_) => None,
    }
  }

  /// `true` if the channel was closed.
  pub fn is_closed(&self) -> bool {
    matches!(self, SendError::Closed { .. })
  }
}

impl<T> fmt::Debug for SendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SendError::Closed { cause, .. } => f
        .debug_struct("SendError::Closed")
        .field("cause", cause)
        .finish_non_exhaustive(),
      SendError::Full(_) => write!(f, "SendError::Full(..)"),
    }
  }
}

impl<T> fmt::Display for SendError<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SendError::Closed { cause: None, .. } => write!(f, "channel closed"),
      SendError::Closed {
        cause: Some(cause), ..
      } => write!(f, "channel closed: {}", cause),
      SendError::Full(_) => write!(f, "channel full"),
    }
  }
}

impl<T> Error for SendError<T> {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match self.cause() {
      Some(cause) => Some(cause.as_error()),
      None => None,
    }
  }
}

/// Error returned by the throwing `recv` once the channel is closed and drained.
#[derive(Debug, Clone)]
pub struct RecvError {
  cause: Option<Cause>,
}

impl RecvError {
  pub(crate) fn new(cause: Option<Cause>) -> Self {
    Self { cause }
  }

  /// The cause the channel was closed with, if any.
  pub fn cause(&self) -> Option<&Cause> {
    self.cause.as_ref()
  }

  /// Consumes the error, returning the close cause.
  pub fn into_cause(self) -> Option<Cause> {
    self.cause
  }
}

impl fmt::Display for RecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.cause {
      None => write!(f, "channel closed"),
      Some(cause) => write!(f, "channel closed: {}", cause),
    }
  }
}

impl Error for RecvError {
  fn source(&self) -> Option<&(dyn Error + 'static)> {
    match &self.cause {
      Some(cause) => Some(cause.as_error()),
      None => None,
    }
  }
}

/// Error returned when attempting to close an already closed channel.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CloseError;
impl Error for CloseError {}
impl fmt::Display for CloseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "channel is already closed")
  }
}

/// Failure of a background task launched on a [`Scope`](crate::Scope).
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowError {
  /// The sink was closed while the task was still forwarding into it.
  #[error("sink closed while forwarding{}", fmt_cause(.cause))]
  SinkClosed {
    /// The cause the sink was closed with.
    cause: Option<Cause>,
  },
  /// The sink rejected an item because it was full and does not suspend.
  #[error("sink rejected an item: channel full")]
  SinkFull,
  /// The task panicked.
  #[error("task `{task}` panicked: {message}")]
  Panicked {
    /// Name the task was launched with.
    task: String,
    /// The panic message.
    message: String,
  },
  /// The task failed with an arbitrary error.
  #[error("{0}")]
  Failed(Cause),
}

fn fmt_cause(cause: &Option<Cause>) -> String {
  match cause {
    Some(cause) => format!(": {}", cause),
    None => String::new(),
  }
}

impl<T> From<SendError<T>> for FlowError {
  fn from(err: SendError<T>) -> Self {
    match err {
      SendError::Closed { cause, .. } => FlowError::SinkClosed { cause },
      SendError::Full(_) => FlowError::SinkFull,
    }
  }
}

impl From<Cause> for FlowError {
  fn from(cause: Cause) -> Self {
    FlowError::Failed(cause)
  }
}
