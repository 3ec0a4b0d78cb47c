// src/internal/waiter.rs

//! Registry of parked tasks waiting on one side of a channel.
//!
//! Every parked future (a plain `recv`/`send` or a single clause of a
//! `Select`) owns a registration id. The id stays with the future across
//! polls so re-registering only refreshes the stored waker. Waking is a
//! broadcast: the whole list is drained and each woken task re-checks its
//! clause under the channel lock, re-registering if it still has to wait.
//!
//! A [`Claim`] is the commit token of one `Select`. Every clause of the select
//! shares it, and so does every counterparty that takes one of its parked
//! sends, which is how at most one clause ever commits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::task::Waker;

/// Source of registration ids, unique per channel.
#[derive(Debug, Default)]
pub(crate) struct WaiterIds {
  next: AtomicU64,
}

impl WaiterIds {
  #[inline]
  pub(crate) fn next(&self) -> u64 {
    self.next.fetch_add(1, Ordering::Relaxed)
  }
}

#[derive(Debug)]
struct WaiterEntry {
  id: u64,
  waker: Waker,
}

/// Parked wakers for one side (senders or receivers) of a channel.
#[derive(Debug, Default)]
pub(crate) struct WaiterList {
  entries: VecDeque<WaiterEntry>,
}

/// Wakers drained from a `WaiterList`, to be woken after the lock is released.
#[derive(Debug, Default)]
#[must_use = "drained waiters must be woken"]
pub(crate) struct Wakeups {
  wakers: Vec<Waker>,
}

impl Wakeups {
  pub(crate) fn push(&mut self, waker: Waker) {
    self.wakers.push(waker);
  }

  pub(crate) fn extend(&mut self, other: Wakeups) {
    self.wakers.extend(other.wakers);
  }

  /// Wakes every collected waiter. Call this outside the channel lock.
  pub(crate) fn wake_all(self) {
    for waker in self.wakers {
      waker.wake();
    }
  }
}

impl WaiterList {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.entries.len()
  }

  #[cfg(test)]
  pub(crate) fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Registers (or refreshes) the waiter identified by `slot`, allocating an
  /// id on first use. Returns `true` if the waiter was not already parked.
  pub(crate) fn register(&mut self, slot: &mut Option<u64>, waker: &Waker, ids: &WaiterIds) -> bool {
    let id = *slot.get_or_insert_with(|| ids.next());
    if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
      if !entry.waker.will_wake(waker) {
        entry.waker = waker.clone();
      }
      return false;
    }
    self.entries.push_back(WaiterEntry {
      id,
      waker: waker.clone(),
    });
    true
  }

  /// Removes the waiter with the given id, if it is still parked.
  pub(crate) fn remove(&mut self, id: u64) {
    self.entries.retain(|e| e.id != id);
  }

  /// Drains every parked waiter.
  pub(crate) fn take_all(&mut self) -> Wakeups {
    Wakeups {
      wakers: self.entries.drain(..).map(|e| e.waker).collect(),
    }
  }
}

// --- Claim ---

const OPEN: u8 = 0;
const RESERVED: u8 = 1;
const DONE: u8 = 2;

/// Commit token shared by the clauses of one `Select`.
///
/// `OPEN` until a clause commits, then `DONE` for good. A receiving clause
/// that takes another select's parked send has to win both tokens; it holds
/// its own as `RESERVED` while it tries, and puts it back if it loses.
#[derive(Debug, Default)]
pub(crate) struct Claim {
  state: AtomicU8,
}

impl Claim {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  /// `OPEN -> DONE` in one step.
  pub(crate) fn commit(&self) -> bool {
    self
      .state
      .compare_exchange(OPEN, DONE, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  /// `OPEN -> RESERVED`. Must be followed by `confirm` or `release`.
  pub(crate) fn reserve(&self) -> bool {
    self
      .state
      .compare_exchange(OPEN, RESERVED, Ordering::AcqRel, Ordering::Acquire)
      .is_ok()
  }

  pub(crate) fn confirm(&self) {
    self.state.store(DONE, Ordering::Release);
  }

  pub(crate) fn release(&self) {
    self.state.store(OPEN, Ordering::Release);
  }

  pub(crate) fn is_done(&self) -> bool {
    self.state.load(Ordering::Acquire) == DONE
  }
}

/// Commits an optional claim. Plain futures carry none and always commit.
#[inline]
pub(crate) fn commit(claim: Option<&std::sync::Arc<Claim>>) -> bool {
  claim.map_or(true, |claim| claim.commit())
}
