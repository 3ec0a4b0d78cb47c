// src/combinators/guard.rs

//! The close guard shared by every scoped combinator.
//!
//! A [`ScopeStack`] holds the endpoints a body owns. When the body finishes
//! the endpoints are released in reverse order of acquisition: senders are
//! closed and receivers are cancelled. The cause passed to the release
//! depends on how the body ended.
//!
//! | body outcome        | release cause   |
//! |---------------------|-----------------|
//! | `Ok(_)`             | none            |
//! | `Err(e)`            | `e`             |
//! | panic               | `Panicked`      |
//! | dropped mid-flight  | `Cancelled`     |

use crate::channel::{Receiver, Sender};
use crate::error::{Cancelled, Cause, Panicked};

use futures_util::FutureExt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

/// An endpoint that can be shut down by a guard.
pub(crate) trait Release: Send {
  fn release(&self, cause: Option<Cause>);
}

impl<T: Send> Release for Sender<T> {
  fn release(&self, cause: Option<Cause>) {
    // A channel closed earlier keeps its first cause.
    let _ = self.close_inner(cause);
  }
}

impl<T: Send> Release for Receiver<T> {
  fn release(&self, cause: Option<Cause>) {
    self.cancel_inner(cause);
  }
}

/// Endpoints acquired in order and released in reverse, exactly once.
pub(crate) struct ScopeStack<'a> {
  acquired: Vec<Box<dyn Release + 'a>>,
  released: bool,
}

impl<'a> ScopeStack<'a> {
  pub(crate) fn new() -> Self {
    Self {
      acquired: Vec::new(),
      released: false,
    }
  }

  pub(crate) fn push<E>(&mut self, endpoint: E)
  where
    E: Release + 'a,
  {
    self.acquired.push(Box::new(endpoint));
  }

  pub(crate) fn len(&self) -> usize {
    self.acquired.len()
  }

  /// Releases every endpoint, most recently acquired first.
  pub(crate) fn release(&mut self, cause: Option<Cause>) {
    if self.released {
      return;
    }
    self.released = true;
    if let Some(cause) = &cause {
      tracing::debug!(endpoints = self.len(), %cause, "releasing scope with cause");
    }
    while let Some(endpoint) = self.acquired.pop() {
      endpoint.release(cause.clone());
    }
  }

  /// Runs `body` to completion, then releases the stack according to how the
  /// body ended. A body error is attached as the close cause and returned
  /// unchanged. A panic is resumed after the release.
  pub(crate) async fn run<F, R, E>(mut self, body: F) -> Result<R, E>
  where
    F: Future<Output = Result<R, E>>,
    E: Clone + Into<Cause>,
  {
    match AssertUnwindSafe(body).catch_unwind().await {
      Ok(Ok(value)) => {
        self.release(None);
        Ok(value)
      }
      Ok(Err(err)) => {
        self.release(Some(err.clone().into()));
        Err(err)
      }
      Err(payload) => {
        let panicked = Panicked::from_payload(&*payload);
        self.release(Some(Cause::new(panicked)));
        panic::resume_unwind(payload)
      }
    }
  }
}

impl Drop for ScopeStack<'_> {
  fn drop(&mut self) {
    if self.released {
      return;
    }
    let cause = if thread::panicking() {
      Cause::new(Panicked::new("unwinding through a scoped body"))
    } else {
      Cause::new(Cancelled)
    };
    self.release(Some(cause));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel::bounded;
  use crate::result::ChannelResult;

  #[derive(Debug, Clone, thiserror::Error)]
  #[error("body failed")]
  struct BodyFailed;

  #[tokio::test]
  async fn releases_in_reverse_order() {
    let order = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));

    struct Recording(&'static str, std::sync::Arc<parking_lot::Mutex<Vec<&'static str>>>);
    impl Release for Recording {
      fn release(&self, _cause: Option<Cause>) {
        self.1.lock().push(self.0);
      }
    }

    let mut stack = ScopeStack::new();
    stack.push(Recording("first", order.clone()));
    stack.push(Recording("second", order.clone()));
    stack.push(Recording("third", order.clone()));
    assert_eq!(stack.len(), 3);
    let out: Result<(), BodyFailed> = stack.run(async { Ok(()) }).await;
    assert!(out.is_ok());
    assert_eq!(*order.lock(), vec!["third", "second", "first"]);
  }

  #[tokio::test]
  async fn body_error_becomes_close_cause() {
    let (tx, rx) = bounded::<u8>(1);
    let mut stack = ScopeStack::new();
    stack.push(tx.clone());
    let out: Result<(), BodyFailed> = stack.run(async { Err(BodyFailed) }).await;
    assert!(out.is_err());
    match rx.try_recv() {
      ChannelResult::Closed(Some(cause)) => assert!(cause.is::<BodyFailed>()),
      other => panic!("expected close with cause, success={}", other.is_success()),
    }
  }

  #[test]
  fn dropping_unrun_stack_releases_with_cancelled() {
    let (tx, rx) = bounded::<u8>(1);
    let mut stack = ScopeStack::new();
    stack.push(tx.clone());
    drop(stack);
    match rx.try_recv() {
      ChannelResult::Closed(Some(cause)) => assert!(cause.is_cancellation()),
      other => panic!("expected cancelled close, success={}", other.is_success()),
    }
  }
}
