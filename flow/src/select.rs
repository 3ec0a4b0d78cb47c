// src/select.rs

//! Waiting on several channel operations at once.
//!
//! A [`Select`] is a future built from receive and send clauses. Polling it
//! polls every clause; the first clause that can complete commits and its
//! callback produces the select's output. Every other clause is withdrawn
//! without side effects: a receive clause that did not win took nothing, and
//! a send clause that did not win leaves its item in the caller's slot.
//!
//! All clauses share one commit token. A receiver elsewhere that takes the
//! item of a parked send clause commits the whole select through it, so a
//! select never completes two clauses, not even when the winning hand-off
//! happens on another task.
//!
//! When several clauses are ready at the same time an unbiased select picks
//! one at random, so no channel is systematically preferred. A
//! [`Select::biased`] select always prefers the clause declared first.

use crate::channel::{Receiver, Sender};
use crate::error::SendError;
use crate::internal::rng::SELECT_RNG;
use crate::internal::waiter::Claim;
use crate::result::ChannelResult;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

trait Clause<R> {
  /// Polls the clause. Once it returns `Ready` it has committed and must not
  /// be polled again.
  fn poll_clause(&mut self, cx: &mut Context<'_>) -> Poll<R>;
}

struct RecvClause<'a, T: Send, F> {
  receiver: &'a Receiver<T>,
  claim: Arc<Claim>,
  waiter: Option<u64>,
  on_result: Option<F>,
}

impl<T: Send, F, R> Clause<R> for RecvClause<'_, T, F>
where
  F: FnOnce(ChannelResult<T>) -> R,
{
  fn poll_clause(&mut self, cx: &mut Context<'_>) -> Poll<R> {
    if self.on_result.is_none() {
      return Poll::Pending;
    }
    let result = match self.receiver.shared.poll_recv(cx, &mut self.waiter, Some(&self.claim)) {
      Poll::Pending => return Poll::Pending,
      Poll::Ready(Ok(item)) => ChannelResult::Success(item),
      Poll::Ready(Err(cause)) => ChannelResult::Closed(cause),
    };
    match self.on_result.take() {
      Some(on_result) => Poll::Ready(on_result(result)),
      None => Poll::Pending,
    }
  }
}

impl<T: Send, F> Drop for RecvClause<'_, T, F> {
  fn drop(&mut self) {
    if let Some(id) = self.waiter.take() {
      self.receiver.shared.deregister_receiver(id);
    }
  }
}

struct SendClause<'a, T: Send, F> {
  sender: &'a Sender<T>,
  // Empty while the item is parked in the channel.
  slot: &'a mut Option<T>,
  claim: Arc<Claim>,
  waiter: Option<u64>,
  on_sent: Option<F>,
}

impl<T: Send, F, R> Clause<R> for SendClause<'_, T, F>
where
  F: FnOnce(Result<(), SendError<T>>) -> R,
{
  fn poll_clause(&mut self, cx: &mut Context<'_>) -> Poll<R> {
    if self.on_sent.is_none() || (self.slot.is_none() && self.waiter.is_none()) {
      return Poll::Pending;
    }
    let result = match self.sender.shared.poll_send(cx, self.slot, &mut self.waiter, Some(&self.claim)) {
      Poll::Pending => return Poll::Pending,
      Poll::Ready(result) => result,
    };
    match self.on_sent.take() {
      Some(on_sent) => Poll::Ready(on_sent(result)),
      None => Poll::Pending,
    }
  }
}

impl<T: Send, F> Drop for SendClause<'_, T, F> {
  fn drop(&mut self) {
    if let Some(id) = self.waiter.take() {
      if let Some(item) = self.sender.shared.withdraw_send(id) {
        *self.slot = Some(item);
      }
    }
  }
}

/// A future that completes with the outcome of exactly one of its clauses.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fibre_flow::{bounded, ChannelResult, Select};
///
/// let (tx_a, rx_a) = bounded::<u32>(1);
/// let (_tx_b, rx_b) = bounded::<u32>(1);
/// tx_a.send(7).await.unwrap();
///
/// let mut select = Select::new();
/// select.recv(&rx_a, |res| ("a", res.ok()));
/// select.recv(&rx_b, |res| ("b", res.ok()));
/// assert_eq!(select.await, ("a", Some(7)));
/// # }
/// ```
///
/// A select with no clauses never completes.
///
/// Dropping a select before it completes withdraws every clause. A send
/// clause whose item a receiver took just before the drop has been sent, and
/// its slot stays empty.
#[must_use = "futures do nothing unless you .await or poll them"]
pub struct Select<'a, R> {
  clauses: Vec<Box<dyn Clause<R> + Send + 'a>>,
  claim: Arc<Claim>,
  biased: bool,
}

impl<'a, R> Select<'a, R> {
  /// Creates an empty select that picks randomly among ready clauses.
  pub fn new() -> Self {
    Self {
      clauses: Vec::new(),
      claim: Arc::new(Claim::new()),
      biased: false,
    }
  }

  /// Creates an empty select that always prefers the earliest ready clause.
  pub fn biased() -> Self {
    Self {
      clauses: Vec::new(),
      claim: Arc::new(Claim::new()),
      biased: true,
    }
  }

  /// Adds a clause that receives from `receiver`.
  ///
  /// `on_result` gets the received item, or [`ChannelResult::Closed`] if the
  /// channel is closed and drained.
  pub fn recv<T, F>(&mut self, receiver: &'a Receiver<T>, on_result: F) -> &mut Self
  where
    T: Send + 'a,
    F: FnOnce(ChannelResult<T>) -> R + Send + 'a,
  {
    self.clauses.push(Box::new(RecvClause {
      receiver,
      claim: Arc::clone(&self.claim),
      waiter: None,
      on_result: Some(on_result),
    }));
    self
  }

  /// Adds a clause that sends the item held in `slot` to `sender`.
  ///
  /// The item is taken out of `slot` only if this clause wins; otherwise it
  /// is still there after the select completes. An empty slot disables the
  /// clause.
  pub fn send<T, F>(&mut self, sender: &'a Sender<T>, slot: &'a mut Option<T>, on_sent: F) -> &mut Self
  where
    T: Send + 'a,
    F: FnOnce(Result<(), SendError<T>>) -> R + Send + 'a,
  {
    self.clauses.push(Box::new(SendClause {
      sender,
      slot,
      claim: Arc::clone(&self.claim),
      waiter: None,
      on_sent: Some(on_sent),
    }));
    self
  }

  /// The number of clauses.
  pub fn len(&self) -> usize {
    self.clauses.len()
  }

  /// Returns `true` if no clause was added.
  pub fn is_empty(&self) -> bool {
    self.clauses.is_empty()
  }
}

impl<R> Default for Select<'_, R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<R> Future for Select<'_, R> {
  type Output = R;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<R> {
    let this = self.get_mut();
    let n = this.clauses.len();
    if n == 0 {
      return Poll::Pending;
    }

    let start = if this.biased { 0 } else { SELECT_RNG.below(n) };
    for offset in 0..n {
      let idx = (start + offset) % n;
      if let Poll::Ready(out) = this.clauses[idx].poll_clause(cx) {
        // Withdraw every other clause.
        this.clauses.clear();
        return Poll::Ready(out);
      }
    }
    Poll::Pending
  }
}

impl<R> fmt::Debug for Select<'_, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Select")
      .field("clauses", &self.clauses.len())
      .field("biased", &self.biased)
      .finish()
  }
}
