// src/combinators/scoped.rs

//! Running a body with endpoints that are guaranteed to be closed afterwards.

use super::guard::ScopeStack;
use crate::channel::{Receiver, Sender};
use crate::error::Cause;

use std::future::Future;

// --- Single endpoint ---

/// Runs `body` with a handle to `sender`, then closes the channel.
///
/// The channel is closed exactly once, however the body ends:
///
/// - `Ok(_)` closes without a cause.
/// - `Err(e)` closes with `e` as the cause and returns `Err(e)` unchanged.
/// - A panic closes with a [`Panicked`](crate::Panicked) cause and keeps
///   unwinding.
/// - Dropping the returned future closes with a
///   [`Cancelled`](crate::Cancelled) cause.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fibre_flow::{unbounded, use_sender, Cause};
///
/// let (tx, rx) = unbounded::<u32>();
/// let sent: Result<(), Cause> = use_sender(tx, |tx| async move {
///   tx.send(1).await.map_err(Cause::new)?;
///   tx.send(2).await.map_err(Cause::new)?;
///   Ok(())
/// })
/// .await;
///
/// assert!(sent.is_ok());
/// assert_eq!(rx.recv().await.unwrap(), 1);
/// assert_eq!(rx.recv().await.unwrap(), 2);
/// assert!(rx.recv().await.is_err());
/// # }
/// ```
pub async fn use_sender<T, F, Fut, R, E>(sender: Sender<T>, body: F) -> Result<R, E>
where
  T: Send,
  F: FnOnce(Sender<T>) -> Fut,
  Fut: Future<Output = Result<R, E>>,
  E: Clone + Into<Cause>,
{
  let mut stack = ScopeStack::new();
  stack.push(sender.clone());
  stack.run(body(sender)).await
}

/// Runs `body` with a handle to `receiver`, then cancels the channel,
/// discarding anything still buffered.
///
/// The cause rules are the same as for [`use_sender`].
pub async fn consume<T, F, Fut, R, E>(receiver: Receiver<T>, body: F) -> Result<R, E>
where
  T: Send,
  F: FnOnce(Receiver<T>) -> Fut,
  Fut: Future<Output = Result<R, E>>,
  E: Clone + Into<Cause>,
{
  let mut stack = ScopeStack::new();
  stack.push(receiver.clone());
  stack.run(body(receiver)).await
}

// --- Many endpoints ---

/// Runs `body` with every receiver in `receivers`, then cancels them in
/// reverse order.
///
/// With no receivers the body simply runs.
pub async fn consume_all<T, F, Fut, R, E>(receivers: Vec<Receiver<T>>, body: F) -> Result<R, E>
where
  T: Send,
  F: FnOnce(Vec<Receiver<T>>) -> Fut,
  Fut: Future<Output = Result<R, E>>,
  E: Clone + Into<Cause>,
{
  if receivers.is_empty() {
    return body(receivers).await;
  }
  let mut stack = ScopeStack::new();
  for receiver in &receivers {
    stack.push(receiver.clone());
  }
  stack.run(body(receivers)).await
}

/// Like [`consume_all`], but the receivers are produced by a fallible, lazy
/// source.
///
/// Receivers are pulled from `sources` one at a time. If pulling one yields
/// `Err(e)`, the receivers acquired so far are cancelled in reverse order
/// with `e` as the cause, nothing further is pulled, and `Err(e)` is
/// returned without running the body.
pub async fn try_consume_all<T, I, F, Fut, R, E>(sources: I, body: F) -> Result<R, E>
where
  T: Send,
  I: IntoIterator<Item = Result<Receiver<T>, E>>,
  F: FnOnce(Vec<Receiver<T>>) -> Fut,
  Fut: Future<Output = Result<R, E>>,
  E: Clone + Into<Cause>,
{
  let mut stack = ScopeStack::new();
  let mut acquired = Vec::new();
  for source in sources {
    match source {
      Ok(receiver) => {
        stack.push(receiver.clone());
        acquired.push(receiver);
      }
      Err(err) => {
        tracing::debug!(acquired = acquired.len(), "acquiring receivers failed");
        stack.release(Some(err.clone().into()));
        return Err(err);
      }
    }
  }
  stack.run(body(acquired)).await
}

/// Runs `body` with every sender in `senders`, then closes them in reverse
/// order.
///
/// `None` entries are passed through to the body untouched and have nothing
/// to close.
pub async fn use_all<T, F, Fut, R, E>(senders: Vec<Option<Sender<T>>>, body: F) -> Result<R, E>
where
  T: Send,
  F: FnOnce(Vec<Option<Sender<T>>>) -> Fut,
  Fut: Future<Output = Result<R, E>>,
  E: Clone + Into<Cause>,
{
  let mut stack = ScopeStack::new();
  for sender in senders.iter().flatten() {
    stack.push(sender.clone());
  }
  stack.run(body(senders)).await
}
