// src/combinators/debounce.rs

use super::guard::ScopeStack;
use crate::channel::{Receiver, Sender};
use crate::error::FlowError;
use crate::scope::Scope;

use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::trace;

/// Forwards every item from `source` to `sink`, pausing for `interval` after
/// each one.
///
/// No item is dropped: this limits the rate, it does not collapse bursts.
/// Two consecutive sends to `sink` are always at least `interval` apart, so
/// a fast producer is held to one item per `interval` by backpressure on
/// `source`.
///
/// When `source` closes, `sink` is closed with the same cause and the task
/// finishes. If `sink` is closed first, the task fails with
/// [`FlowError::SinkClosed`] and cancels `source`.
pub fn debounce<T>(scope: &Scope, source: Receiver<T>, sink: Sender<T>, interval: Duration) -> AbortHandle
where
  T: Send + 'static,
{
  let mut stack = ScopeStack::new();
  stack.push(sink.clone());
  stack.push(source.clone());
  scope.launch("debounce", async move {
    stack.run(forward_spaced(&source, &sink, interval)).await
  })
}

async fn forward_spaced<T: Send>(source: &Receiver<T>, sink: &Sender<T>, interval: Duration) -> Result<(), FlowError> {
  loop {
    match source.recv().await {
      Ok(item) => {
        sink.send(item).await?;
        trace!(?interval, "forwarded item, pausing");
        tokio::time::sleep(interval).await;
      }
      Err(closed) => {
        let _ = sink.close_inner(closed.into_cause());
        return Ok(());
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel::{rendezvous, unbounded};
  use crate::error::Cause;
  use tokio::time::Instant;

  #[derive(Debug, thiserror::Error)]
  #[error("feed dropped")]
  struct FeedDropped;

  #[tokio::test(start_paused = true)]
  async fn sends_are_spaced_by_interval() {
    let scope = Scope::new();
    let (tx, source) = unbounded::<u32>();
    let (sink, out) = unbounded::<u32>();
    let interval = Duration::from_millis(100);
    debounce(&scope, source, sink, interval);

    for i in 0..4 {
      tx.send(i).await.unwrap();
    }
    drop(tx);

    let mut stamps = Vec::new();
    let mut items = Vec::new();
    while let Ok(item) = out.recv().await {
      stamps.push(Instant::now());
      items.push(item);
    }
    assert_eq!(items, vec![0, 1, 2, 3]);
    for pair in stamps.windows(2) {
      assert!(pair[1] - pair[0] >= interval);
    }
    scope.join().await.unwrap();
  }

  #[tokio::test]
  async fn source_cause_reaches_sink() {
    let scope = Scope::new();
    let (tx, source) = rendezvous::<u32>();
    let (sink, out) = unbounded::<u32>();
    debounce(&scope, source, sink, Duration::from_millis(1));

    let cause = Cause::new(FeedDropped);
    tx.close_with(cause.clone()).unwrap();
    let err = out.recv().await.unwrap_err();
    assert!(err.cause().unwrap().ptr_eq(&cause));
    scope.join().await.unwrap();
  }
}
