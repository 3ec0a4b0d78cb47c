// src/channel/config.rs

use super::{Receiver, Sender};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default buffer size of [`Capacity::Buffered`].
pub const DEFAULT_BUFFER: usize = 64;

/// How many items a channel may buffer before its overflow policy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Capacity {
  /// No buffer: a send completes only when a receiver takes its item.
  #[default]
  Rendezvous,
  /// A buffer of exactly `n` items. `Bounded(0)` is a rendezvous channel.
  Bounded(usize),
  /// A buffer of [`DEFAULT_BUFFER`] items.
  Buffered,
  /// No limit other than available memory. Sends never suspend.
  Unbounded,
  /// A buffer of one item that always keeps the latest value. Implies
  /// [`BufferOverflow::DropOldest`] regardless of the configured policy.
  Conflated,
}

/// What a send does when the buffer is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BufferOverflow {
  /// Suspend the sender until room is available.
  #[default]
  Suspend,
  /// Evict the oldest buffered item to make room. Never suspends.
  DropOldest,
  /// Discard the item being sent, reporting success. Never suspends.
  DropLatest,
  /// Reject the item being sent with an error. Never suspends.
  Fail,
}

/// Plain-data description of a channel's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ChannelConfig {
  /// The buffer capacity.
  pub capacity: Capacity,
  /// The overflow policy.
  pub overflow: BufferOverflow,
}

impl ChannelConfig {
  /// Resolves the configuration to the effective buffer size (`usize::MAX`
  /// for unbounded) and overflow policy the channel core runs with.
  pub(crate) fn resolve(self) -> (usize, BufferOverflow) {
    match self.capacity {
      Capacity::Conflated => (1, BufferOverflow::DropOldest),
      Capacity::Unbounded => (usize::MAX, BufferOverflow::Suspend),
      Capacity::Buffered => (DEFAULT_BUFFER, self.overflow),
      Capacity::Rendezvous | Capacity::Bounded(0) => match self.overflow {
        BufferOverflow::Suspend => (0, BufferOverflow::Suspend),
        // There is nothing to drop from an empty buffer, so a
        // non-suspending rendezvous channel gets a single slot.
        other => (1, other),
      },
      Capacity::Bounded(n) => (n, self.overflow),
    }
  }
}

/// A builder for channel pairs.
///
/// ```
/// use fibre_flow::{BufferOverflow, Capacity, ChannelBuilder};
///
/// let (tx, rx) = ChannelBuilder::new()
///   .capacity(Capacity::Bounded(8))
///   .overflow(BufferOverflow::DropOldest)
///   .build::<u32>();
/// assert_eq!(tx.capacity(), Some(8));
/// # drop(rx);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelBuilder {
  config: ChannelConfig,
}

impl ChannelBuilder {
  /// Starts from a rendezvous, suspending channel.
  pub fn new() -> Self {
    Self::default()
  }

  /// Starts from an existing configuration.
  pub fn from_config(config: ChannelConfig) -> Self {
    Self { config }
  }

  /// Sets the buffer capacity.
  pub fn capacity(mut self, capacity: Capacity) -> Self {
    self.config.capacity = capacity;
    self
  }

  /// Shorthand for `capacity(Capacity::Bounded(n))`.
  pub fn bounded(self, n: usize) -> Self {
    self.capacity(Capacity::Bounded(n))
  }

  /// Sets the overflow policy.
  pub fn overflow(mut self, overflow: BufferOverflow) -> Self {
    self.config.overflow = overflow;
    self
  }

  /// The configuration built so far.
  pub fn config(&self) -> ChannelConfig {
    self.config
  }

  /// Creates the channel.
  pub fn build<T: Send>(self) -> (Sender<T>, Receiver<T>) {
    super::channels(self.config.capacity, self.config.overflow)
  }
}

impl From<ChannelConfig> for ChannelBuilder {
  fn from(config: ChannelConfig) -> Self {
    Self::from_config(config)
  }
}
