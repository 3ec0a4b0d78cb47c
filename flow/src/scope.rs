// src/scope.rs

//! The task launcher background combinators run on.
//!
//! A [`Scope`] owns every task launched through it. Cancelling the scope, or
//! dropping it, aborts those tasks; an aborted task drops its future, which
//! runs the close guards of the channels it owns. [`Scope::join`] waits for
//! all tasks and surfaces the first failure, aborting the remaining tasks
//! when one fails.

use crate::error::{FlowError, Panicked};

use futures_util::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tokio::runtime::Handle;
use tokio::task::{AbortHandle, JoinSet};
use tracing::{debug, warn};

/// A lifetime boundary for background tasks.
pub struct Scope {
  handle: Handle,
  tasks: Mutex<JoinSet<Result<(), FlowError>>>,
}

impl Scope {
  /// Creates a scope that launches tasks on the current Tokio runtime.
  ///
  /// # Panics
  ///
  /// Panics if called outside of a Tokio runtime.
  pub fn new() -> Self {
    Self::with_handle(Handle::current())
  }

  /// Creates a scope that launches tasks on the given runtime.
  pub fn with_handle(handle: Handle) -> Self {
    Self {
      handle,
      tasks: Mutex::new(JoinSet::new()),
    }
  }

  /// Launches a background task owned by this scope.
  ///
  /// A panic inside the task is caught and reported by [`join`](Self::join)
  /// as [`FlowError::Panicked`].
  pub fn launch<F>(&self, name: &str, future: F) -> AbortHandle
  where
    F: Future<Output = Result<(), FlowError>> + Send + 'static,
  {
    let task = name.to_string();
    debug!(task = %task, "launching task");
    let supervised = async move {
      match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => {
          debug!(task = %task, "task finished");
          Ok(())
        }
        Ok(Err(err)) => {
          debug!(task = %task, error = %err, "task failed");
          Err(err)
        }
        Err(payload) => {
          let panicked = Panicked::from_payload(&*payload);
          Err(FlowError::Panicked {
            task,
            message: panicked.message().to_string(),
          })
        }
      }
    };
    self.tasks.lock().spawn_on(supervised, &self.handle)
  }

  /// Aborts every task launched so far.
  ///
  /// Aborted tasks release their channels with a
  /// [`Cancelled`](crate::Cancelled) cause. They are not reported as failures
  /// by [`join`](Self::join).
  pub fn cancel(&self) {
    let mut tasks = self.tasks.lock();
    if !tasks.is_empty() {
      debug!(tasks = tasks.len(), "cancelling scope");
    }
    tasks.abort_all();
  }

  /// The number of tasks launched and not yet joined.
  pub fn len(&self) -> usize {
    self.tasks.lock().len()
  }

  /// Returns `true` if no launched task is left to join.
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Waits for every task launched so far.
  ///
  /// Returns the first failure. Once a task fails, the remaining tasks are
  /// aborted. Dropping the returned future aborts every task it was waiting
  /// on.
  pub async fn join(&self) -> Result<(), FlowError> {
    let mut tasks = std::mem::take(&mut *self.tasks.lock());
    let mut first_error = None;

    while let Some(joined) = tasks.join_next().await {
      let err = match joined {
        Ok(Ok(())) => continue,
        Ok(Err(err)) => err,
        Err(join_err) if join_err.is_cancelled() => continue,
        Err(join_err) => FlowError::Panicked {
          task: "<unnamed>".to_string(),
          message: join_err.to_string(),
        },
      };
      if first_error.is_none() {
        warn!(error = %err, "task failed, cancelling the rest of the scope");
        tasks.abort_all();
        first_error = Some(err);
      }
    }

    match first_error {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

impl Default for Scope {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Scope")
      .field("tasks", &self.len())
      .finish_non_exhaustive()
  }
}

impl Drop for Scope {
  fn drop(&mut self) {
    // JoinSet aborts on drop as well; this just makes it visible.
    let tasks = self.tasks.get_mut();
    if !tasks.is_empty() {
      debug!(tasks = tasks.len(), "scope dropped with live tasks");
      tasks.abort_all();
    }
  }
}
