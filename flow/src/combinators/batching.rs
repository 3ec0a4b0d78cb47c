// src/combinators/batching.rs

use super::guard::ScopeStack;
use crate::channel::{Receiver, Sender};
use crate::error::{FlowError, SendError};
use crate::result::ChannelResult;
use crate::scope::Scope;
use crate::select::Select;

use tokio::task::AbortHandle;
use tracing::trace;

/// Groups items from `source` into batches sent to `sink`.
///
/// The task launched on `scope` keeps receiving while a batch is pending, so
/// a slow sink makes batches larger rather than slowing the source down. The
/// pending batch is not bounded: a sink that never accepts lets it grow
/// without limit.
///
/// When `source` closes, whatever has accumulated (possibly nothing) is sent
/// as one final batch, then `sink` is closed with the source's close cause.
/// If `sink` is closed first, the task fails with
/// [`FlowError::SinkClosed`] and cancels `source`.
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use fibre_flow::{batching, unbounded, Scope};
///
/// let scope = Scope::new();
/// let (tx, source) = unbounded::<u32>();
/// let (sink, batches) = unbounded::<Vec<u32>>();
/// batching(&scope, source, sink);
///
/// for i in 1..=3 {
///   tx.send(i).await.unwrap();
/// }
/// drop(tx);
///
/// let mut all = Vec::new();
/// while let Ok(batch) = batches.recv().await {
///   all.extend(batch);
/// }
/// assert_eq!(all, vec![1, 2, 3]);
/// scope.join().await.unwrap();
/// # }
/// ```
pub fn batching<T>(scope: &Scope, source: Receiver<T>, sink: Sender<Vec<T>>) -> AbortHandle
where
  T: Send + 'static,
{
  // The guard exists before the task first runs, so aborting it early still
  // closes both channels with a cancellation cause.
  let mut stack = ScopeStack::new();
  stack.push(sink.clone());
  stack.push(source.clone());
  scope.launch("batching", async move { stack.run(forward_batches(&source, &sink)).await })
}

enum Step<T> {
  Received(ChannelResult<T>),
  Flushed(Result<(), SendError<Vec<T>>>),
}

async fn forward_batches<T: Send>(source: &Receiver<T>, sink: &Sender<Vec<T>>) -> Result<(), FlowError> {
  let mut batch: Vec<T> = Vec::new();
  loop {
    // Offered to the sink only while there is something to flush.
    let mut outgoing = if batch.is_empty() {
      None
    } else {
      Some(std::mem::take(&mut batch))
    };

    let step = {
      let mut select = Select::new();
      select.recv(source, Step::Received);
      if outgoing.is_some() {
        select.send(sink, &mut outgoing, Step::Flushed);
      }
      select.await
    };

    match step {
      Step::Received(ChannelResult::Success(item)) => {
        batch = outgoing.unwrap_or_default();
        batch.push(item);
      }
      // A receive clause only ever ends in an item or a close.
      Step::Received(closed) => {
        let cause = closed.cause().cloned();
        let last = outgoing.unwrap_or_default();
        trace!(items = last.len(), "source closed, sending final batch");
        sink.send(last).await?;
        let _ = sink.close_inner(cause);
        return Ok(());
      }
      Step::Flushed(result) => {
        result?;
        trace!("batch flushed");
      }
    }
  }
}
