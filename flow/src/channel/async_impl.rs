// src/channel/async_impl.rs

//! Implementation of the Future-based send and receive logic.

use futures_core::Stream;

use super::{Receiver, Sender};
use crate::error::{RecvError, SendError};
use crate::result::ChannelResult;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

// --- SendFuture ---

/// A future that completes when a value has been accepted by the channel.
///
/// Dropping it before completion withdraws the send; the item is dropped
/// with the future and never reaches a receiver. If a receiver already took
/// the item, the send has completed and dropping the future changes nothing.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct SendFuture<'a, T: Send> {
  sender: &'a Sender<T>,
  // Moves into the channel while the send is parked.
  item: Option<T>,
  waiter: Option<u64>,
}

impl<'a, T: Send> SendFuture<'a, T> {
  pub(super) fn new(sender: &'a Sender<T>, item: T) -> Self {
    Self {
      sender,
      item: Some(item),
      waiter: None,
    }
  }
}

// The item is never pinned; it is moved out by value when the send commits.
impl<T: Send> Unpin for SendFuture<'_, T> {}

impl<T: Send> Future for SendFuture<'_, T> {
  type Output = Result<(), SendError<T>>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    this.sender.shared.poll_send(cx, &mut this.item, &mut this.waiter, None)
  }
}

impl<T: Send> Drop for SendFuture<'_, T> {
  fn drop(&mut self) {
    if let Some(id) = self.waiter.take() {
      drop(self.sender.shared.withdraw_send(id));
    }
  }
}

impl<T: Send> fmt::Debug for SendFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SendFuture")
      .field("unsent_item", &self.item.is_some())
      .field("parked", &self.waiter.is_some())
      .finish()
  }
}

// --- RecvFuture ---

/// A future that completes with the next value, or `Err(RecvError)` once the
/// channel is closed and drained.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvFuture<'a, T: Send> {
  receiver: &'a Receiver<T>,
  waiter: Option<u64>,
}

impl<'a, T: Send> RecvFuture<'a, T> {
  pub(super) fn new(receiver: &'a Receiver<T>) -> Self {
    Self {
      receiver,
      waiter: None,
    }
  }
}

impl<T: Send> Future for RecvFuture<'_, T> {
  type Output = Result<T, RecvError>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    this
      .receiver
      .shared
      .poll_recv(cx, &mut this.waiter, None)
      .map(|res| res.map_err(RecvError::new))
  }
}

impl<T: Send> Drop for RecvFuture<'_, T> {
  fn drop(&mut self) {
    if let Some(id) = self.waiter.take() {
      self.receiver.shared.deregister_receiver(id);
    }
  }
}

impl<T: Send> fmt::Debug for RecvFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecvFuture")
      .field("parked", &self.waiter.is_some())
      .finish()
  }
}

// --- RecvCatchingFuture ---

/// A future that completes with the next value or with
/// [`ChannelResult::Closed`] once the channel is closed and drained.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct RecvCatchingFuture<'a, T: Send> {
  inner: RecvFuture<'a, T>,
}

impl<'a, T: Send> RecvCatchingFuture<'a, T> {
  pub(super) fn new(receiver: &'a Receiver<T>) -> Self {
    Self {
      inner: RecvFuture::new(receiver),
    }
  }
}

impl<T: Send> Future for RecvCatchingFuture<'_, T> {
  type Output = ChannelResult<T>;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    let this = self.get_mut();
    this
      .inner
      .receiver
      .shared
      .poll_recv(cx, &mut this.inner.waiter, None)
      .map(|res| match res {
        Ok(item) => ChannelResult::Success(item),
        Err(cause) => ChannelResult::Closed(cause),
      })
  }
}

impl<T: Send> fmt::Debug for RecvCatchingFuture<'_, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RecvCatchingFuture")
      .field("parked", &self.inner.waiter.is_some())
      .finish()
  }
}

// --- Stream ---

impl<T: Send> Stream for Receiver<T> {
  type Item = T;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let this = self.get_mut();
    this
      .shared
      .poll_recv(cx, &mut this.stream_waiter, None)
      .map(|res| res.ok())
  }
}
