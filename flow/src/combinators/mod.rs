// src/combinators/mod.rs

//! Combinators built on channels, [`Select`](crate::Select) and
//! [`Scope`](crate::Scope).
//!
//! The scoped combinators (`use_sender`, `consume`, `consume_all`,
//! `try_consume_all`, `use_all`) and the multiplexers built on them run a
//! body inline and close the endpoints they were given once it ends. The
//! background combinators (`batching`, `debounce`) launch a task on a scope
//! and own their source and sink for as long as that task runs.

mod batching;
mod debounce;
mod guard;
mod multiplex;
mod scoped;

pub use batching::batching;
pub use debounce::debounce;
pub use multiplex::{consume_all_and_select, consume_each};
pub use scoped::{consume, consume_all, try_consume_all, use_all, use_sender};
