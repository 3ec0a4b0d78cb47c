// src/channel/core.rs

//! The core shared state and logic of a channel.
//!
//! ### Design Principles:
//!
//! 1.  **Central Mutex**: A `parking_lot::Mutex` guards the buffer, the close
//!     state, the parked sends and the receiver waiter list. Combinators never
//!     touch this state; they go through the endpoint API.
//! 2.  **Broadcast Wake-ups**: Anything a receiver may be waiting for (an
//!     item pushed, a send parked, a close) drains the receiver waiter list.
//!     Woken tasks re-check their own clause under the lock, which is what
//!     lets a single task wait on several channels at once in a `Select`. A
//!     parked sender is woken when its item is taken or the channel closes.
//! 3.  **Hand-off, Not Room**: Only buffer space counts as room. A send that
//!     finds none parks together with its item, and receivers take parked
//!     items directly (a rendezvous channel has no buffer, so this is the
//!     only way an item crosses it). A receiver that was merely registered,
//!     or that gave up waiting, never lets a send complete.
//! 4.  **One Commit per Select**: Every clause of a `Select` carries its
//!     `Claim`. Taking an item, buffering one, or reporting a close commits
//!     the claim first, so exactly one clause of a select ever takes effect,
//!     even when a receiver on another task takes one of its parked sends.
//! 5.  **Wake Outside the Lock**: Wakers and evicted items are collected while
//!     locked and only woken/dropped after the guard is released.

use super::config::BufferOverflow;
use crate::error::{Cause, SendError, TrySendError};
use crate::internal::waiter::{commit, Claim, WaiterIds, WaiterList, Wakeups};
use crate::result::{ChannelResult, Failure};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// The close state of a channel.
#[derive(Debug)]
pub(crate) struct Closed {
  pub(crate) cause: Option<Cause>,
}

/// A send waiting for room. The channel holds its item so that a receiver can
/// take it directly.
#[derive(Debug)]
pub(crate) struct ParkedSend<T> {
  id: u64,
  /// `None` once a receiver has taken the item.
  item: Option<T>,
  waker: Waker,
  /// The claim of the select this send belongs to, if any.
  claim: Option<Arc<Claim>>,
}

/// The state of the channel, protected by a single `Mutex`.
#[derive(Debug)]
pub(crate) struct ChannelInternal<T> {
  /// Buffered items, never more than the capacity.
  pub(crate) queue: VecDeque<T>,
  /// Sends waiting for room or for a receiver, oldest first.
  pub(crate) parked_sends: VecDeque<ParkedSend<T>>,
  /// `Some` once the channel is closed for sending.
  pub(crate) closed: Option<Closed>,
  /// Set when the receive side cancelled the channel and discarded its buffer.
  pub(crate) cancelled: bool,
  pub(crate) waiting_receivers: WaiterList,
  /// The number of live `Sender` handles.
  pub(crate) sender_count: usize,
  /// The number of live `Receiver` handles.
  pub(crate) receiver_count: usize,
}

/// Outcome of offering an item to the buffer while holding the lock.
enum Offer<T> {
  /// The item was accepted. Carries an item that must be dropped outside the
  /// lock: the evicted oldest item, or the rejected newest one.
  Accepted(Option<T>),
  /// No room and the policy is to suspend.
  Full(T),
  /// No room and the policy is to fail.
  Rejected(T),
  Closed(T, Option<Cause>),
  /// Another clause of the same select already committed.
  Lost(T),
}

/// Outcome of trying to take an item while holding the lock.
enum Take<T> {
  Item(T),
  Nothing,
  /// Another clause of the same select already committed.
  Lost,
  /// Nothing taken, but the picture may change without a wake-up. Poll again.
  Retry,
}

/// Takes the item of the oldest parked send that can still commit.
///
/// `own` is the claim of the receiving select, if any. A parked send of the
/// same select is never taken, and neither is one whose select already
/// committed elsewhere.
fn take_parked<T>(
  parked: &mut VecDeque<ParkedSend<T>>,
  own: Option<&Arc<Claim>>,
  wakeups: &mut Wakeups,
) -> Take<T> {
  let mut reserved = false;
  let mut contended = false;
  for send in parked.iter_mut() {
    if send.item.is_none() {
      continue;
    }
    let theirs = match &send.claim {
      None => None,
      Some(claim) if own.is_some_and(|own| Arc::ptr_eq(own, claim)) => continue,
      Some(claim) if claim.is_done() => continue,
      Some(claim) => Some(claim),
    };
    if let Some(own) = own {
      if !reserved {
        if !own.reserve() {
          return Take::Lost;
        }
        reserved = true;
      }
    }
    if commit(theirs) {
      if let Some(own) = own {
        own.confirm();
      }
      wakeups.push(send.waker.clone());
      return match send.item.take() {
        Some(item) => Take::Item(item),
        None => Take::Nothing,
      };
    }
    contended |= theirs.is_some_and(|claim| !claim.is_done());
  }
  if reserved {
    if let Some(own) = own {
      own.release();
    }
  }
  // Reservations are short-lived. Whoever ran into one, on either side,
  // polls again instead of waiting for a wake-up that may never come.
  if reserved || contended {
    Take::Retry
  } else {
    Take::Nothing
  }
}

/// The shared owner of the channel's state, designed to be wrapped in an `Arc`.
#[derive(Debug)]
pub(crate) struct ChannelShared<T> {
  pub(crate) internal: Mutex<ChannelInternal<T>>,
  /// Effective buffer size. `usize::MAX` means unbounded.
  pub(crate) capacity: usize,
  pub(crate) overflow: BufferOverflow,
  ids: WaiterIds,
}

impl<T: Send> ChannelShared<T> {
  pub(crate) fn new(capacity: usize, overflow: BufferOverflow) -> Self {
    ChannelShared {
      internal: Mutex::new(ChannelInternal {
        queue: VecDeque::with_capacity(if capacity == usize::MAX { 32 } else { capacity.min(1024) }),
        parked_sends: VecDeque::new(),
        closed: None,
        cancelled: false,
        waiting_receivers: WaiterList::new(),
        sender_count: 1, // Starts with one producer and one consumer
        receiver_count: 1,
      }),
      capacity,
      overflow,
      ids: WaiterIds::default(),
    }
  }

  fn offer_locked(
    &self,
    guard: &mut ChannelInternal<T>,
    item: T,
    claim: Option<&Arc<Claim>>,
    wakeups: &mut Wakeups,
  ) -> Offer<T> {
    if let Some(closed) = &guard.closed {
      let cause = closed.cause.clone();
      return if commit(claim) {
        Offer::Closed(item, cause)
      } else {
        Offer::Lost(item)
      };
    }

    if guard.queue.len() < self.capacity {
      if !commit(claim) {
        return Offer::Lost(item);
      }
      guard.queue.push_back(item);
      wakeups.extend(guard.waiting_receivers.take_all());
      return Offer::Accepted(None);
    }

    match self.overflow {
      BufferOverflow::Suspend => Offer::Full(item),
      // Every other policy settles the send right away.
      _ if !commit(claim) => Offer::Lost(item),
      BufferOverflow::Fail => Offer::Rejected(item),
      BufferOverflow::DropLatest => Offer::Accepted(Some(item)),
      BufferOverflow::DropOldest => {
        let evicted = guard.queue.pop_front();
        guard.queue.push_back(item);
        wakeups.extend(guard.waiting_receivers.take_all());
        Offer::Accepted(evicted)
      }
    }
  }

  /// Attempts to send without suspending.
  ///
  /// Only buffer space is room here: a rendezvous channel reports `Full`
  /// while it is open, since a hand-off needs the sender to wait for the
  /// receiver to take the item.
  pub(crate) fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    let mut wakeups = Wakeups::default();
    let offer = {
      let mut guard = self.internal.lock();
      self.offer_locked(&mut guard, item, None, &mut wakeups)
    };
    wakeups.wake_all();
    match offer {
      Offer::Accepted(_discarded) => Ok(()),
      Offer::Full(item) | Offer::Rejected(item) | Offer::Lost(item) => Err(TrySendError::Full(item)),
      Offer::Closed(item, _) => Err(TrySendError::Closed(item)),
    }
  }

  /// Polls a send of the item held in `slot`.
  ///
  /// When the send has to wait, the item moves from `slot` into the channel
  /// and the send is parked under the id stored in `waiter`. From then on a
  /// receiver may take it at any time; [`withdraw_send`](Self::withdraw_send)
  /// gives it back if nobody did.
  pub(crate) fn poll_send(
    &self,
    cx: &mut Context<'_>,
    slot: &mut Option<T>,
    waiter: &mut Option<u64>,
    claim: Option<&Arc<Claim>>,
  ) -> Poll<Result<(), SendError<T>>> {
    let mut wakeups = Wakeups::default();
    let mut guard = self.internal.lock();
    let (poll, discarded) = match *waiter {
      Some(id) => (self.repoll_parked_locked(&mut guard, cx, id, waiter, claim, &mut wakeups), None),
      None => match slot.take() {
        None => (Poll::Ready(Ok(())), None),
        Some(item) => match self.offer_locked(&mut guard, item, claim, &mut wakeups) {
          Offer::Accepted(discarded) => (Poll::Ready(Ok(())), discarded),
          Offer::Rejected(item) => (Poll::Ready(Err(SendError::Full(item))), None),
          Offer::Closed(item, cause) => (Poll::Ready(Err(SendError::Closed { item, cause })), None),
          Offer::Lost(item) => {
            *slot = Some(item);
            (Poll::Pending, None)
          }
          Offer::Full(item) => {
            let id = self.ids.next();
            *waiter = Some(id);
            guard.parked_sends.push_back(ParkedSend {
              id,
              item: Some(item),
              waker: cx.waker().clone(),
              claim: claim.cloned(),
            });
            // A receiver may already be waiting for exactly this.
            wakeups.extend(guard.waiting_receivers.take_all());
            (Poll::Pending, None)
          }
        },
      },
    };
    drop(guard);
    wakeups.wake_all();
    drop(discarded);
    poll
  }

  fn repoll_parked_locked(
    &self,
    guard: &mut ChannelInternal<T>,
    cx: &mut Context<'_>,
    id: u64,
    waiter: &mut Option<u64>,
    claim: Option<&Arc<Claim>>,
    wakeups: &mut Wakeups,
  ) -> Poll<Result<(), SendError<T>>> {
    // Parked sends are only ever removed by their owner.
    let Some(pos) = guard.parked_sends.iter().position(|send| send.id == id) else {
      *waiter = None;
      return Poll::Ready(Ok(()));
    };

    if guard.parked_sends[pos].item.is_none() {
      guard.parked_sends.remove(pos);
      *waiter = None;
      return Poll::Ready(Ok(()));
    }

    let closed_cause = guard.closed.as_ref().map(|closed| closed.cause.clone());
    let has_room = guard.queue.len() < self.capacity;
    if (closed_cause.is_some() || has_room) && commit(claim) {
      *waiter = None;
      if let Some(item) = guard.parked_sends.remove(pos).and_then(|send| send.item) {
        match closed_cause {
          Some(cause) => return Poll::Ready(Err(SendError::Closed { item, cause })),
          None => {
            guard.queue.push_back(item);
            wakeups.extend(guard.waiting_receivers.take_all());
          }
        }
      }
      return Poll::Ready(Ok(()));
    }

    let send = &mut guard.parked_sends[pos];
    if !send.waker.will_wake(cx.waker()) {
      send.waker = cx.waker().clone();
    }
    Poll::Pending
  }

  /// Removes a parked send. Returns its item unless a receiver already took it.
  pub(crate) fn withdraw_send(&self, id: u64) -> Option<T> {
    let mut guard = self.internal.lock();
    let pos = guard.parked_sends.iter().position(|send| send.id == id)?;
    guard.parked_sends.remove(pos).and_then(|send| send.item)
  }

  /// Moves parked items into free buffer space.
  fn promote_locked(&self, guard: &mut ChannelInternal<T>, wakeups: &mut Wakeups) {
    while guard.queue.len() < self.capacity {
      match take_parked(&mut guard.parked_sends, None, wakeups) {
        Take::Item(item) => guard.queue.push_back(item),
        _ => break,
      }
    }
  }

  fn take_locked(&self, guard: &mut ChannelInternal<T>, claim: Option<&Arc<Claim>>, wakeups: &mut Wakeups) -> Take<T> {
    if !guard.queue.is_empty() {
      if !commit(claim) {
        return Take::Lost;
      }
      let item = guard.queue.pop_front();
      if guard.closed.is_none() {
        self.promote_locked(guard, wakeups);
      }
      return match item {
        Some(item) => Take::Item(item),
        None => Take::Nothing,
      };
    }
    // Parked senders of a closed channel get their items back.
    if guard.closed.is_some() {
      return Take::Nothing;
    }
    take_parked(&mut guard.parked_sends, claim, wakeups)
  }

  /// Attempts to receive without suspending.
  pub(crate) fn try_recv(&self) -> ChannelResult<T> {
    let mut wakeups = Wakeups::default();
    let result = {
      let mut guard = self.internal.lock();
      match self.take_locked(&mut guard, None, &mut wakeups) {
        Take::Item(item) => ChannelResult::Success(item),
        _ => match &guard.closed {
          Some(closed) => ChannelResult::Closed(closed.cause.clone()),
          None => ChannelResult::Failed(Failure::Empty),
        },
      }
    };
    wakeups.wake_all();
    result
  }

  /// Polls a receive. Resolves to `Err(cause)` once the channel is closed and
  /// drained.
  pub(crate) fn poll_recv(
    &self,
    cx: &mut Context<'_>,
    waiter: &mut Option<u64>,
    claim: Option<&Arc<Claim>>,
  ) -> Poll<Result<T, Option<Cause>>> {
    let mut wakeups = Wakeups::default();
    let mut guard = self.internal.lock();

    let result = match self.take_locked(&mut guard, claim, &mut wakeups) {
      Take::Item(item) => Some(Ok(item)),
      Take::Nothing => match &guard.closed {
        Some(closed) => {
          let cause = closed.cause.clone();
          commit(claim).then_some(Err(cause))
        }
        None => None,
      },
      Take::Lost => None,
      Take::Retry => {
        cx.waker().wake_by_ref();
        None
      }
    };

    let Some(result) = result else {
      guard.waiting_receivers.register(waiter, cx.waker(), &self.ids);
      drop(guard);
      wakeups.wake_all();
      return Poll::Pending;
    };
    if let Some(id) = waiter.take() {
      guard.waiting_receivers.remove(id);
    }
    drop(guard);
    wakeups.wake_all();
    Poll::Ready(result)
  }

  pub(crate) fn deregister_receiver(&self, id: u64) {
    self.internal.lock().waiting_receivers.remove(id);
  }

  /// Closes the channel for sending. Returns `false` if it was already closed.
  pub(crate) fn close(&self, cause: Option<Cause>) -> bool {
    let wakeups = {
      let mut guard = self.internal.lock();
      if guard.closed.is_some() {
        return false;
      }
      Self::close_locked(&mut guard, cause)
    };
    wakeups.wake_all();
    true
  }

  fn close_locked(guard: &mut ChannelInternal<T>, cause: Option<Cause>) -> Wakeups {
    match &cause {
      Some(cause) => tracing::debug!(%cause, "channel closed with cause"),
      None => tracing::trace!("channel closed"),
    }
    guard.closed = Some(Closed { cause });
    let mut wakeups = guard.waiting_receivers.take_all();
    for send in &guard.parked_sends {
      wakeups.push(send.waker.clone());
    }
    wakeups
  }

  /// Cancels the channel from the receive side: closes it (if still open) and
  /// discards every buffered item. Returns `false` if it was already closed,
  /// in which case the cause is not replaced but the buffer is still drained.
  pub(crate) fn cancel(&self, cause: Option<Cause>) -> bool {
    let (newly_closed, discarded, wakeups) = {
      let mut guard = self.internal.lock();
      let discarded = std::mem::take(&mut guard.queue);
      guard.cancelled = true;
      if guard.closed.is_some() {
        (false, discarded, Wakeups::default())
      } else {
        let wakeups = Self::close_locked(&mut guard, cause);
        (true, discarded, wakeups)
      }
    };
    wakeups.wake_all();
    drop(discarded);
    newly_closed
  }

  pub(crate) fn close_cause(&self) -> Option<Option<Cause>> {
    self.internal.lock().closed.as_ref().map(|c| c.cause.clone())
  }

  pub(crate) fn is_closed_for_send(&self) -> bool {
    self.internal.lock().closed.is_some()
  }

  pub(crate) fn is_closed_for_receive(&self) -> bool {
    let guard = self.internal.lock();
    guard.closed.is_some() && guard.queue.is_empty()
  }

  pub(crate) fn is_cancelled(&self) -> bool {
    self.internal.lock().cancelled
  }

  pub(crate) fn len(&self) -> usize {
    self.internal.lock().queue.len()
  }
}
