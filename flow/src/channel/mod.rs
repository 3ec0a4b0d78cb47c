// src/channel/mod.rs

//! Closable, capacity-bounded async channels.
//!
//! A channel is one FIFO buffer split into a [`Sender`] and a [`Receiver`].
//! Both handles can be cloned; closing or cancelling acts on the whole
//! channel, not just the handle it was called on.
//!
//! ### Suspension contract
//!
//! `Sender::send`, `Receiver::recv` and `Receiver::recv_catching` (and a
//! [`Select`](crate::Select) built over them) are the only operations that
//! suspend. Everything else (`try_send`, `try_recv`, `close`, `cancel`, the
//! queries) completes immediately.
//!
//! ### Closing
//!
//! - `Sender::close` / `close_with` close the channel for sending. Items
//!   already buffered stay receivable; once they are drained, receives report
//!   `Closed` with the cause given to the first close.
//! - `Receiver::cancel` / `cancel_with` close the channel and discard the
//!   buffer.
//! - Dropping the last `Sender` closes without a cause. Dropping the last
//!   `Receiver` cancels.

use crate::error::{Cause, CloseError, TrySendError};
use crate::result::{ChannelResult, Failure};

pub use async_impl::{RecvCatchingFuture, RecvFuture, SendFuture};
pub use config::{BufferOverflow, Capacity, ChannelBuilder, ChannelConfig, DEFAULT_BUFFER};

mod async_impl;
mod config;
pub(crate) mod core;

use self::core::ChannelShared;
use std::fmt;
use std::sync::Arc;

// --- Public Structs ---

/// The sending half of a channel.
pub struct Sender<T: Send> {
  pub(crate) shared: Arc<ChannelShared<T>>,
}

/// The receiving half of a channel.
///
/// Also a [`Stream`](futures_core::Stream) that ends when the channel is
/// closed and drained.
pub struct Receiver<T: Send> {
  pub(crate) shared: Arc<ChannelShared<T>>,
  /// Waiter registration used by the `Stream` implementation.
  pub(crate) stream_waiter: Option<u64>,
}

// --- Channel Constructors ---

/// Creates a channel with the given capacity and overflow policy and returns
/// its two endpoints.
pub fn channels<T: Send>(capacity: Capacity, overflow: BufferOverflow) -> (Sender<T>, Receiver<T>) {
  let (capacity, overflow) = ChannelConfig { capacity, overflow }.resolve();
  let shared = Arc::new(ChannelShared::new(capacity, overflow));
  (
    Sender {
      shared: Arc::clone(&shared),
    },
    Receiver {
      shared,
      stream_waiter: None,
    },
  )
}

/// Creates a rendezvous channel: a send completes only when it meets a receiver.
pub fn rendezvous<T: Send>() -> (Sender<T>, Receiver<T>) {
  channels(Capacity::Rendezvous, BufferOverflow::Suspend)
}

/// Creates a channel buffering up to `capacity` items, suspending senders when full.
///
/// A capacity of `0` creates a rendezvous channel.
pub fn bounded<T: Send>(capacity: usize) -> (Sender<T>, Receiver<T>) {
  channels(Capacity::Bounded(capacity), BufferOverflow::Suspend)
}

/// Creates a channel whose sends never suspend.
///
/// In reality, the channel is bounded by available memory.
pub fn unbounded<T: Send>() -> (Sender<T>, Receiver<T>) {
  channels(Capacity::Unbounded, BufferOverflow::Suspend)
}

/// Creates a channel that only ever holds the latest item sent.
pub fn conflated<T: Send>() -> (Sender<T>, Receiver<T>) {
  channels(Capacity::Conflated, BufferOverflow::DropOldest)
}

// --- Trait Implementations ---

impl<T: Send> Clone for Sender<T> {
  fn clone(&self) -> Self {
    self.shared.internal.lock().sender_count += 1;
    Sender {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T: Send> Clone for Receiver<T> {
  fn clone(&self) -> Self {
    self.shared.internal.lock().receiver_count += 1;
    Receiver {
      shared: Arc::clone(&self.shared),
      stream_waiter: None,
    }
  }
}

impl<T: Send> fmt::Debug for Sender<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Sender")
      .field("capacity", &self.capacity())
      .field("closed", &self.is_closed_for_send())
      .finish_non_exhaustive()
  }
}

impl<T: Send> fmt::Debug for Receiver<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Receiver")
      .field("capacity", &self.capacity())
      .field("len", &self.len())
      .field("closed", &self.is_closed_for_receive())
      .finish_non_exhaustive()
  }
}

// --- Public API Method Implementations ---

impl<T: Send> Sender<T> {
  /// Sends a value, suspending until it is accepted or the channel is closed.
  ///
  /// Under a non-suspending overflow policy this completes immediately.
  pub fn send(&self, item: T) -> SendFuture<'_, T> {
    SendFuture::new(self, item)
  }

  /// Attempts to send a value without suspending.
  ///
  /// Only free buffer space counts: on an open rendezvous channel this always
  /// fails with [`TrySendError::Full`], because a hand-off completes only
  /// when a receiver takes the item from a waiting `send`.
  pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    self.shared.try_send(item)
  }

  /// Attempts to send a value without suspending, reporting the outcome as a
  /// [`ChannelResult`].
  ///
  /// Returns [`Failed(Full)`](crate::Failure::Full) when there is no room
  /// and [`ChannelResult::Closed`] with the close cause once the channel is
  /// closed. An item that was not sent is dropped; use
  /// [`try_send`](Self::try_send) to get it back.
  pub fn try_send_catching(&self, item: T) -> ChannelResult<()> {
    match self.shared.try_send(item) {
      Ok(()) => ChannelResult::Success(()),
      Err(TrySendError::Full(_)) => ChannelResult::Failed(Failure::Full),
      Err(TrySendError::Closed(_)) => ChannelResult::Closed(self.shared.close_cause().flatten()),
    }
  }

  /// Closes the channel for sending, without a cause.
  ///
  /// Buffered items remain receivable. Parked senders fail with
  /// [`SendError::Closed`](crate::SendError::Closed).
  ///
  /// # Errors
  ///
  /// Returns `Err(CloseError)` if the channel is already closed. The earlier
  /// close, and its cause, stand.
  pub fn close(&self) -> Result<(), CloseError> {
    self.close_inner(None)
  }

  /// Closes the channel for sending, recording `cause` for receivers to observe.
  ///
  /// # Errors
  ///
  /// Returns `Err(CloseError)` if the channel is already closed.
  pub fn close_with(&self, cause: impl Into<Cause>) -> Result<(), CloseError> {
    self.close_inner(Some(cause.into()))
  }

  pub(crate) fn close_inner(&self, cause: Option<Cause>) -> Result<(), CloseError> {
    if self.shared.close(cause) {
      Ok(())
    } else {
      Err(CloseError)
    }
  }

  /// Returns `true` once the channel has been closed (from either side).
  pub fn is_closed_for_send(&self) -> bool {
    self.shared.is_closed_for_send()
  }

  /// Returns the close state: `None` while open, `Some(cause)` once closed.
  pub fn close_cause(&self) -> Option<Option<Cause>> {
    self.shared.close_cause()
  }

  /// Returns the capacity of the channel. `None` for unbounded channels.
  pub fn capacity(&self) -> Option<usize> {
    capacity_of(&self.shared)
  }

  /// Returns the number of items currently in the channel's buffer.
  #[inline]
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  /// Returns `true` if the channel's buffer is empty.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Returns `true` if the channel's buffer is full.
  /// For "unbounded" channels, this will always be `false`.
  #[inline]
  pub fn is_full(&self) -> bool {
    match self.capacity() {
      None => false,
      Some(capacity) => self.len() >= capacity,
    }
  }
}

impl<T: Send> Drop for Sender<T> {
  fn drop(&mut self) {
    let last = {
      let mut guard = self.shared.internal.lock();
      guard.sender_count -= 1;
      guard.sender_count == 0
    };
    if last {
      self.shared.close(None);
    }
  }
}

impl<T: Send> Receiver<T> {
  /// Receives a value, suspending until one is available.
  ///
  /// Resolves to `Err(RecvError)` once the channel is closed and drained; the
  /// error carries the close cause.
  pub fn recv(&self) -> RecvFuture<'_, T> {
    RecvFuture::new(self)
  }

  /// Receives a value, suspending until one is available, reporting closure
  /// as [`ChannelResult::Closed`] instead of an error.
  pub fn recv_catching(&self) -> RecvCatchingFuture<'_, T> {
    RecvCatchingFuture::new(self)
  }

  /// Attempts to receive a value without suspending.
  ///
  /// Returns [`ChannelResult::Failed`] with
  /// [`Failure::Empty`](crate::Failure::Empty) if the channel is open but
  /// empty.
  pub fn try_recv(&self) -> ChannelResult<T> {
    self.shared.try_recv()
  }

  /// Cancels the channel: closes it (if still open) and discards every
  /// buffered item.
  pub fn cancel(&self) {
    self.shared.cancel(None);
  }

  /// Cancels the channel, recording `cause` if this call is the one that
  /// closes it.
  pub fn cancel_with(&self, cause: impl Into<Cause>) {
    self.shared.cancel(Some(cause.into()));
  }

  pub(crate) fn cancel_inner(&self, cause: Option<Cause>) {
    self.shared.cancel(cause);
  }

  /// Returns `true` if the channel is closed and no buffered items remain.
  pub fn is_closed_for_receive(&self) -> bool {
    self.shared.is_closed_for_receive()
  }

  /// Returns `true` if the channel was cancelled from the receive side.
  pub fn is_cancelled(&self) -> bool {
    self.shared.is_cancelled()
  }

  /// Returns the close state: `None` while open, `Some(cause)` once closed.
  pub fn close_cause(&self) -> Option<Option<Cause>> {
    self.shared.close_cause()
  }

  /// Returns the capacity of the channel. `None` for unbounded channels.
  pub fn capacity(&self) -> Option<usize> {
    capacity_of(&self.shared)
  }

  /// Returns the number of items currently in the channel's buffer.
  #[inline]
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  /// Returns `true` if the channel's buffer is empty.
  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: Send> Drop for Receiver<T> {
  fn drop(&mut self) {
    let last = {
      let mut guard = self.shared.internal.lock();
      if let Some(id) = self.stream_waiter.take() {
        guard.waiting_receivers.remove(id);
      }
      guard.receiver_count -= 1;
      guard.receiver_count == 0
    };
    if last {
      self.shared.cancel(None);
    }
  }
}

fn capacity_of<T: Send>(shared: &ChannelShared<T>) -> Option<usize> {
  if shared.capacity == usize::MAX {
    None
  } else {
    Some(shared.capacity)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn capacity_one_round_trip() {
    let (tx, rx) = bounded::<u32>(1);
    tx.try_send(10).unwrap();
    assert!(tx.is_full());
    assert!(matches!(tx.try_send(11), Err(TrySendError::Full(11))));

    assert!(matches!(rx.try_recv(), ChannelResult::Success(10)));
    assert!(matches!(rx.try_recv(), ChannelResult::Failed(Failure::Empty)));
    tx.try_send(11).unwrap();
    assert!(matches!(rx.try_recv(), ChannelResult::Success(11)));
  }

  #[test]
  fn dropping_last_sender_closes() {
    let (tx, rx) = bounded::<u32>(2);
    let tx2 = tx.clone();
    tx.try_send(1).unwrap();
    drop(tx);
    assert!(!rx.is_closed_for_receive());
    drop(tx2);
    assert!(matches!(rx.try_recv(), ChannelResult::Success(1)));
    assert!(matches!(rx.try_recv(), ChannelResult::Closed(None)));
  }

  #[test]
  fn dropping_last_receiver_cancels() {
    let (tx, rx) = bounded::<u32>(2);
    tx.try_send(1).unwrap();
    let rx2 = rx.clone();
    drop(rx);
    assert!(!tx.is_closed_for_send());
    drop(rx2);
    assert!(tx.is_closed_for_send());
    assert_eq!(tx.len(), 0);
    assert!(matches!(tx.try_send(2), Err(TrySendError::Closed(2))));
  }

  #[test]
  fn close_is_idempotent_and_first_cause_wins() {
    #[derive(Debug, thiserror::Error)]
    #[error("first")]
    struct First;
    #[derive(Debug, thiserror::Error)]
    #[error("second")]
    struct Second;

    let (tx, rx) = unbounded::<u32>();
    assert!(tx.close_with(First).is_ok());
    assert_eq!(tx.close_with(Second), Err(CloseError));
    assert_eq!(tx.close(), Err(CloseError));

    match rx.try_recv() {
      ChannelResult::Closed(Some(cause)) => assert!(cause.is::<First>()),
      other => panic!("expected closed with cause, got {:?}", other.is_success()),
    }
  }

  #[test]
  fn capacity_reports_unbounded_as_none() {
    let (tx, _rx) = unbounded::<u8>();
    assert_eq!(tx.capacity(), None);
    let (tx, _rx) = conflated::<u8>();
    assert_eq!(tx.capacity(), Some(1));
    let (tx, _rx) = rendezvous::<u8>();
    assert_eq!(tx.capacity(), Some(0));
  }

  #[test]
  fn try_send_catching_reports_full_then_closed() {
    #[derive(Debug, thiserror::Error)]
    #[error("shutting down")]
    struct ShuttingDown;

    let (tx, rx) = bounded::<u32>(1);
    assert!(tx.try_send_catching(1).is_success());

    let full = tx.try_send_catching(2);
    assert!(full.is_full());
    assert!(!full.is_closed());
    assert_eq!(rx.len(), 1);

    let cause = Cause::new(ShuttingDown);
    tx.close_with(cause.clone()).unwrap();
    let closed = tx.try_send_catching(3);
    assert!(closed.is_closed() && !closed.is_full());
    assert!(closed.cause().unwrap().ptr_eq(&cause));
  }

  #[test]
  fn rendezvous_try_send_needs_a_waiting_send() {
    let (tx, rx) = rendezvous::<u32>();
    assert!(tx.try_send_catching(1).is_full());
    assert!(matches!(rx.try_recv(), ChannelResult::Failed(Failure::Empty)));
  }
}
