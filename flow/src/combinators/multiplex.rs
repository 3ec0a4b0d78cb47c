// src/combinators/multiplex.rs

//! Fair consumption of several receivers at once.
//!
//! Each round builds one unbiased [`Select`] over the receivers that are still
//! open, so whichever channel has data first is served first and no channel
//! is starved by another that always has data. Items from one channel arrive
//! in that channel's order; the interleaving between channels is whatever the
//! producers and the scheduler make it.

use super::scoped::consume_all;
use crate::channel::Receiver;
use crate::error::Cause;
use crate::result::ChannelResult;
use crate::select::Select;

use std::future::Future;

/// Waits for the next event on any receiver that is not yet closed and
/// drained. Returns `None` once every receiver is.
async fn next_round<T: Send>(receivers: &[Receiver<T>]) -> Option<(usize, ChannelResult<T>)> {
  let mut select = Select::new();
  for (index, receiver) in receivers.iter().enumerate() {
    if !receiver.is_closed_for_receive() {
      select.recv(receiver, move |result| (index, result));
    }
  }
  if select.is_empty() {
    return None;
  }
  Some(select.await)
}

async fn select_rounds<T, F, Fut, E>(receivers: &[Receiver<T>], on_round: &mut F) -> Result<(), E>
where
  T: Send,
  F: FnMut(usize, ChannelResult<T>) -> Fut,
  Fut: Future<Output = Result<bool, E>>,
{
  let mut rounds = 0u64;
  while let Some((index, result)) = next_round(receivers).await {
    rounds += 1;
    if !on_round(index, result).await? {
      tracing::trace!(rounds, "round handler stopped the multiplexer");
      return Ok(());
    }
  }
  tracing::trace!(rounds, "every receiver is closed");
  Ok(())
}

/// Consumes `receivers` one select round at a time.
///
/// Every round waits for whichever open receiver produces an event first and
/// hands `on_round` the index of that receiver together with the result: an
/// item, or [`ChannelResult::Closed`] once that channel is closed and
/// drained. A receiver that is already closed and drained when a round
/// starts is skipped, so each receiver reports `Closed` at most once.
///
/// The loop ends when every receiver is closed, when `on_round` returns
/// `Ok(false)`, or when it fails. All receivers are then cancelled as by
/// [`consume_all`].
pub async fn consume_all_and_select<T, F, Fut, E>(receivers: Vec<Receiver<T>>, mut on_round: F) -> Result<(), E>
where
  T: Send,
  F: FnMut(usize, ChannelResult<T>) -> Fut,
  Fut: Future<Output = Result<bool, E>>,
  E: Clone + Into<Cause>,
{
  consume_all(receivers, move |receivers| async move { select_rounds(&receivers, &mut on_round).await }).await
}

/// Runs `action` on every item received from any of `receivers` until all of
/// them are closed.
///
/// Items from the same receiver are handled in order. Closing of an
/// individual receiver is not reported. If `action` fails, the remaining
/// receivers are cancelled with that error as the cause and the error is
/// returned.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fibre_flow::{consume_each, unbounded, Cause};
///
/// let (tx_a, rx_a) = unbounded::<u32>();
/// let (tx_b, rx_b) = unbounded::<u32>();
/// tx_a.send(1).await.unwrap();
/// tx_b.send(2).await.unwrap();
/// drop((tx_a, tx_b));
///
/// let mut sum = 0;
/// let done: Result<(), Cause> = consume_each(vec![rx_a, rx_b], |n| {
///   sum += n;
///   async { Ok(()) }
/// })
/// .await;
/// assert!(done.is_ok());
/// assert_eq!(sum, 3);
/// # }
/// ```
pub async fn consume_each<T, F, Fut, E>(receivers: Vec<Receiver<T>>, mut action: F) -> Result<(), E>
where
  T: Send,
  F: FnMut(T) -> Fut,
  Fut: Future<Output = Result<(), E>>,
  E: Clone + Into<Cause>,
{
  consume_all_and_select(receivers, move |_, result| {
    let handled = match result {
      ChannelResult::Success(item) => Some(action(item)),
      ChannelResult::Closed(_) | ChannelResult::Failed(_) => None,
    };
    async move {
      match handled {
        Some(handled) => handled.await.map(|()| true),
        None => Ok(true),
      }
    }
  })
  .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel::{bounded, unbounded};
  use std::time::Duration;

  #[derive(Debug, Clone, PartialEq, thiserror::Error)]
  #[error("handler gave up at {0}")]
  struct GaveUp(u32);

  #[tokio::test]
  async fn drained_receivers_leave_the_rotation() {
    let (tx_a, rx_a) = unbounded::<u32>();
    let (tx_b, rx_b) = unbounded::<u32>();
    tx_a.send(1).await.unwrap();
    drop(tx_a);
    let closer = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      drop(tx_b);
    });

    let mut events = Vec::new();
    let out: Result<(), GaveUp> = consume_all_and_select(vec![rx_a, rx_b], |index, result| {
      events.push((index, result.ok()));
      async { Ok(true) }
    })
    .await;
    closer.await.unwrap();
    assert!(out.is_ok());

    // `rx_a` drains with its last item and is never polled again; `rx_b`
    // closes while the round is waiting on it.
    assert_eq!(events, vec![(0, Some(1)), (1, None)]);
  }

  #[tokio::test]
  async fn handler_can_stop_early() {
    let (tx, rx) = unbounded::<u32>();
    for i in 0..5 {
      tx.send(i).await.unwrap();
    }

    let mut seen = 0;
    let out: Result<(), GaveUp> = consume_all_and_select(vec![rx], |_, _| {
      seen += 1;
      let keep_going = seen < 2;
      async move { Ok(keep_going) }
    })
    .await;
    assert!(out.is_ok());
    assert_eq!(seen, 2);
    // The receivers were cancelled on exit.
    assert!(tx.is_closed_for_send());
  }

  #[tokio::test]
  async fn action_failure_cancels_every_receiver() {
    let (tx_a, rx_a) = bounded::<u32>(4);
    let (tx_b, rx_b) = bounded::<u32>(4);
    tx_a.send(7).await.unwrap();

    let out = consume_each(vec![rx_a, rx_b], |n| async move { Err::<(), _>(GaveUp(n)) }).await;
    assert_eq!(out, Err(GaveUp(7)));
    for tx in [&tx_a, &tx_b] {
      match tx.close_cause() {
        Some(Some(cause)) => assert!(cause.is::<GaveUp>()),
        other => panic!("expected close with cause, got {:?}", other),
      }
    }
  }

  #[tokio::test]
  async fn waits_for_late_producers() {
    let (tx, rx) = bounded::<u32>(1);
    let producer = tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(10)).await;
      tx.send(42).await.unwrap();
    });

    let mut got = Vec::new();
    let out: Result<(), GaveUp> = consume_each(vec![rx], |n| {
      got.push(n);
      async { Ok(()) }
    })
    .await;
    producer.await.unwrap();
    assert!(out.is_ok());
    assert_eq!(got, vec![42]);
  }
}
