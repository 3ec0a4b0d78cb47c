pub(crate) mod rng;
pub(crate) mod waiter;
