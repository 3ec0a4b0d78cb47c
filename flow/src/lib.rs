//! Channel combinators for cooperative async tasks.
//!
//! `fibre_flow` provides closable, capacity-bounded channels and the
//! combinators that make them safe to compose:
//!
//! - **Scoped closing**: `use_sender`, `consume` and their multi-endpoint
//!   forms close every endpoint exactly once, whether the body returns, fails,
//!   panics or is cancelled. A body error becomes the close cause that the
//!   other side observes.
//! - **Fair multiplexing**: `consume_each` and `consume_all_and_select`
//!   drain several receivers without starving any of them.
//! - **Batching and rate limiting**: `batching` and `debounce` run as
//!   background tasks on a [`Scope`] and forward close causes downstream.
//! - **Select**: wait on several sends and receives at once with exactly one
//!   of them taking effect.
//!
//! ```
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! use fibre_flow::{batching, consume_each, unbounded, Cause, Scope};
//!
//! let scope = Scope::new();
//! let (tx, source) = unbounded::<u32>();
//! let (sink, batches) = unbounded::<Vec<u32>>();
//! batching(&scope, source, sink);
//!
//! tokio::spawn(async move {
//!   for i in 0..100 {
//!     tx.send(i).await.unwrap();
//!   }
//! });
//!
//! let mut total = 0;
//! let drained: Result<(), Cause> = consume_each(vec![batches], |batch| {
//!   total += batch.len();
//!   async { Ok(()) }
//! })
//! .await;
//! assert!(drained.is_ok());
//! assert_eq!(total, 100);
//! scope.join().await.unwrap();
//! # }
//! ```

pub mod channel;
pub mod combinators;
pub mod error;
pub mod result;
pub mod scope;
pub mod select;

mod internal;

pub use channel::{
  bounded, channels, conflated, rendezvous, unbounded, BufferOverflow, Capacity, ChannelBuilder, ChannelConfig,
  Receiver, Sender,
};
pub use combinators::{
  batching, consume, consume_all, consume_all_and_select, consume_each, debounce, try_consume_all, use_all,
  use_sender,
};
pub use error::{Cancelled, Cause, CloseError, FlowError, Panicked, RecvError, SendError, TrySendError};
pub use result::{ChannelResult, Failure};
pub use scope::Scope;
pub use select::Select;
